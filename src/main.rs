/*!
 * Tripwire CLI - inspect and simulate circuit breakers
 */

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tripwire::{
    cli_style,
    config::{AppConfig, BreakerSettings, LogLevel, Preset},
    error::{Result, TripwireError, EXIT_SUCCESS},
    logging, run_scenario, Scenario, ScenarioSummary, StepReport,
};
use tripwire_core_breaker::{BreakerStats, CircuitBreaker};

#[derive(Parser)]
#[command(name = "tripwire")]
#[command(version, about = "Inspect and simulate circuit breakers", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long = "log-level", value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Log to a file (JSON) instead of stderr
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose logging (shows half-open and recovery transitions)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show built-in breaker presets
    Presets,

    /// Show the breakers defined in the configuration file
    Stats {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run a scripted sequence of calls against one breaker
    Simulate {
        /// Breaker name; taken from the config file when defined there
        #[arg(short = 'b', long = "breaker", default_value = "simulated")]
        breaker: String,

        /// Preset for a breaker not defined in the config file
        #[arg(long, value_enum)]
        preset: Option<PresetArg>,

        /// Override the failure threshold
        #[arg(long)]
        failure_threshold: Option<u32>,

        /// Override the reset timeout in milliseconds
        #[arg(long)]
        reset_timeout_ms: Option<u64>,

        /// Override the half-open trial limit
        #[arg(long)]
        half_open_trial_limit: Option<u32>,

        /// Steps: s, f, wait:<ms>, check, reset (comma or space separated)
        #[arg(short = 's', long = "script", value_name = "STEPS")]
        script: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    Default,
    Strict,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Default => Preset::Default,
            PresetArg::Strict => Preset::Strict,
        }
    }
}

#[derive(Serialize)]
struct SimulationOutput<'a> {
    breaker: &'a str,
    steps: &'a [StepReport],
    summary: ScenarioSummary,
    final_stats: BreakerStats,
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log.clone();
    }
    config.verbose |= cli.verbose;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    match cli.command {
        Commands::Presets => {
            println!("{}", cli_style::preset_table(&Preset::all()));
            Ok(())
        }
        Commands::Stats { json } => show_stats(&config, json),
        Commands::Simulate {
            breaker,
            preset,
            failure_threshold,
            reset_timeout_ms,
            half_open_trial_limit,
            script,
            json,
        } => {
            let mut settings = match preset {
                Some(p) => BreakerSettings::from_preset(p.into()),
                None => config.breakers.get(&breaker).cloned().unwrap_or_default(),
            };
            settings.failure_threshold = failure_threshold.or(settings.failure_threshold);
            settings.reset_timeout_ms = reset_timeout_ms.or(settings.reset_timeout_ms);
            settings.half_open_trial_limit =
                half_open_trial_limit.or(settings.half_open_trial_limit);

            simulate(&breaker, &settings, &script, json)
        }
    }
}

fn show_stats(config: &AppConfig, json: bool) -> Result<()> {
    let registry = config.build_registry()?;
    if registry.is_empty() {
        tracing::info!("no breakers configured");
    }

    let stats = registry.all_stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", cli_style::stats_table(&stats));
    }
    Ok(())
}

fn simulate(name: &str, settings: &BreakerSettings, script: &str, json: bool) -> Result<()> {
    let breaker_config =
        settings
            .to_breaker_config()
            .map_err(|source| TripwireError::InvalidBreaker {
                name: name.to_string(),
                source,
            })?;
    let scenario: Scenario = script.parse()?;
    let breaker = CircuitBreaker::new(name, breaker_config);

    tracing::info!(
        breaker = name,
        steps = scenario.steps().len(),
        "starting simulation"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let reports = runtime.block_on(run_scenario(&breaker, &scenario));
    let summary = ScenarioSummary::from_reports(&reports);

    if json {
        let output = SimulationOutput {
            breaker: name,
            steps: &reports,
            summary,
            final_stats: breaker.stats(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", cli_style::report_table(&reports));
        println!(
            "{} succeeded, {} failed, {} rejected",
            summary.succeeded, summary.failed, summary.rejected
        );
    }
    Ok(())
}

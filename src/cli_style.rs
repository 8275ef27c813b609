/*!
 * Table rendering for CLI output
 */

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tripwire_core_breaker::{BreakerStats, CircuitState};

use crate::config::Preset;
use crate::simulate::{StepOutcome, StepReport};

/// Create a table with the standard look
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|l| Cell::new(l).fg(Color::Cyan).add_attribute(Attribute::Bold))
        .collect()
}

/// Colored cell for a breaker phase
pub fn phase_cell(phase: CircuitState) -> Cell {
    let color = match phase {
        CircuitState::Closed => Color::Green,
        CircuitState::HalfOpen => Color::Yellow,
        CircuitState::Open => Color::Red,
    };
    Cell::new(phase).fg(color)
}

/// Render a duration in the largest whole unit
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms >= 60_000 && ms % 60_000 == 0 {
        format!("{} min", ms / 60_000)
    } else if ms >= 1_000 && ms % 1_000 == 0 {
        format!("{} s", ms / 1_000)
    } else {
        format!("{} ms", ms)
    }
}

/// Render a wall-clock timestamp as milliseconds since the epoch
pub fn format_timestamp(at: Option<SystemTime>) -> String {
    at.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn preset_table(presets: &[Preset]) -> Table {
    let mut table = create_table();
    table.set_header(header(&[
        "Preset",
        "Failure Threshold",
        "Reset Timeout",
        "Half-Open Trials",
        "Best For",
    ]));

    for preset in presets {
        let config = preset.breaker_config();
        table.add_row(vec![
            Cell::new(preset.name()).add_attribute(Attribute::Bold),
            Cell::new(config.failure_threshold()),
            Cell::new(format_duration(config.reset_timeout())),
            Cell::new(config.half_open_trial_limit()),
            Cell::new(preset.description()).fg(Color::DarkGrey),
        ]);
    }

    table
}

pub fn stats_table(stats: &[BreakerStats]) -> Table {
    let mut table = create_table();
    table.set_header(header(&[
        "Breaker",
        "Phase",
        "Failures",
        "Trial Successes",
        "Admitted Trials",
        "Last Failure (ms)",
    ]));

    for s in stats {
        table.add_row(vec![
            Cell::new(&s.name).add_attribute(Attribute::Bold),
            phase_cell(s.phase),
            Cell::new(s.consecutive_failures),
            Cell::new(s.trial_successes),
            Cell::new(s.admitted_trials),
            Cell::new(format_timestamp(s.last_failure_at)),
        ]);
    }

    table
}

pub fn report_table(reports: &[StepReport]) -> Table {
    let mut table = create_table();
    table.set_header(header(&["#", "Step", "Outcome", "Phase", "Failures"]));

    for r in reports {
        let outcome = match r.outcome {
            StepOutcome::Succeeded => Cell::new("succeeded").fg(Color::Green),
            StepOutcome::Failed => Cell::new("failed").fg(Color::Red),
            StepOutcome::Rejected => Cell::new("rejected").fg(Color::Magenta),
            StepOutcome::Waited => Cell::new("waited"),
            StepOutcome::Admissible => Cell::new("admissible"),
            StepOutcome::NotAdmissible => Cell::new("not admissible"),
            StepOutcome::Reset => Cell::new("reset").fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(r.index),
            Cell::new(&r.step),
            outcome,
            phase_cell(r.phase),
            Cell::new(r.consecutive_failures),
        ]);
    }

    table
}

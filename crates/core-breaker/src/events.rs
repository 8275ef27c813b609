//! Transition events and the sink they are delivered to
//!
//! Every entry into `Open` or `HalfOpen`, every recovery to `Closed`, and every
//! manual reset produces exactly one [`TransitionEvent`]. Where the event ends
//! up is decided by the [`TransitionListener`] the breaker was built with; the
//! default [`TracingListener`] forwards to `tracing`.

use crate::circuit_breaker::CircuitState;
use std::sync::Mutex;
use tracing::Level;

/// What happened to the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Entered `Open`, either from `Closed` or from `HalfOpen`
    Opened,
    /// Cooldown elapsed, entered `HalfOpen`
    HalfOpened,
    /// Enough trial successes, back to `Closed`
    Recovered,
    /// Operator forced the breaker back to `Closed`
    ForcedReset,
}

/// A single diagnostic record emitted on a phase change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    /// Breaker name
    pub breaker: String,
    /// Phase before the transition
    pub from: CircuitState,
    /// Kind of transition
    pub kind: TransitionKind,
    /// `WARN` for trips, `DEBUG` otherwise
    pub level: Level,
    /// Human-readable description
    pub message: String,
}

impl TransitionEvent {
    pub(crate) fn new(
        breaker: &str,
        from: CircuitState,
        kind: TransitionKind,
        message: impl Into<String>,
    ) -> Self {
        let level = match kind {
            TransitionKind::Opened => Level::WARN,
            _ => Level::DEBUG,
        };

        Self {
            breaker: breaker.to_string(),
            from,
            kind,
            level,
            message: message.into(),
        }
    }

    /// Phase after the transition
    pub fn to(&self) -> CircuitState {
        match self.kind {
            TransitionKind::Opened => CircuitState::Open,
            TransitionKind::HalfOpened => CircuitState::HalfOpen,
            TransitionKind::Recovered | TransitionKind::ForcedReset => CircuitState::Closed,
        }
    }
}

/// Destination for transition events.
///
/// Called after the breaker's lock has been released, so implementations may
/// query the breaker that emitted the event.
pub trait TransitionListener: Send + Sync {
    fn on_transition(&self, event: &TransitionEvent);
}

/// Forwards transition events to `tracing`, tagged with the breaker name
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl TransitionListener for TracingListener {
    fn on_transition(&self, event: &TransitionEvent) {
        if event.level == Level::WARN {
            tracing::warn!(
                breaker = %event.breaker,
                from = %event.from,
                to = %event.to(),
                "{}",
                event.message
            );
        } else {
            tracing::debug!(
                breaker = %event.breaker,
                from = %event.from,
                to = %event.to(),
                "{}",
                event.message
            );
        }
    }
}

/// Keeps every event in memory; handy for tests and for status endpoints
/// that want the recent history of a breaker.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<TransitionEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Kinds only, in arrival order
    pub fn kinds(&self) -> Vec<TransitionKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }
}

impl TransitionListener for RecordingListener {
    fn on_transition(&self, event: &TransitionEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_events_are_warnings() {
        let event = TransitionEvent::new(
            "api",
            CircuitState::Closed,
            TransitionKind::Opened,
            "failure threshold reached",
        );
        assert_eq!(event.level, Level::WARN);
        assert_eq!(event.to(), CircuitState::Open);
    }

    #[test]
    fn test_other_events_are_debug() {
        for kind in [
            TransitionKind::HalfOpened,
            TransitionKind::Recovered,
            TransitionKind::ForcedReset,
        ] {
            let event = TransitionEvent::new("api", CircuitState::Open, kind, "");
            assert_eq!(event.level, Level::DEBUG);
        }
    }

    #[test]
    fn test_recording_listener_keeps_order() {
        let listener = RecordingListener::new();
        listener.on_transition(&TransitionEvent::new(
            "a",
            CircuitState::Closed,
            TransitionKind::Opened,
            "",
        ));
        listener.on_transition(&TransitionEvent::new(
            "a",
            CircuitState::Open,
            TransitionKind::HalfOpened,
            "",
        ));

        assert_eq!(
            listener.kinds(),
            vec![TransitionKind::Opened, TransitionKind::HalfOpened]
        );
    }
}

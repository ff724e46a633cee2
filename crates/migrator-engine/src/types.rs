//! Run bookkeeping types.

use chrono::{DateTime, Utc};
use migrator_core::Direction;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::validator::ValidationReport;

/// How a validation run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Scan everything once, stop on exhaustion.
    Full,
    /// Tail new writes until cancelled.
    Incremental,
}

impl RunMode {
    /// Mode selected by a sleep interval: zero means full.
    #[must_use]
    pub fn from_sleep_interval(interval: Duration) -> Self {
        if interval.is_zero() {
            Self::Full
        } else {
            Self::Incremental
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Incremental => write!(f, "incremental"),
        }
    }
}

/// Lifecycle of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    /// Full scan reached the end of both stores.
    Completed,
    /// Stopped by an operator or by shutdown.
    Cancelled,
    /// Stopped by a configuration error from a store.
    Failed,
    /// Replaced by a newer run of the same mode.
    Superseded,
}

impl RunState {
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
            Self::Superseded => write!(f, "superseded"),
        }
    }
}

/// Information about a validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    /// Run ID.
    pub id: Uuid,
    pub mode: RunMode,
    /// Authoritative side the run validates from.
    pub direction: Direction,
    /// Modification-time lower bound.
    pub watermark: i64,
    /// Pause between empty incremental scans; zero for full runs.
    pub sleep_interval_ms: u64,
    pub state: RunState,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Counters, once the run has finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ValidationReport>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunInfo {
    /// A freshly started run.
    #[must_use]
    pub fn new(direction: Direction, watermark: i64, sleep_interval: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode: RunMode::from_sleep_interval(sleep_interval),
            direction,
            watermark,
            sleep_interval_ms: u64::try_from(sleep_interval.as_millis()).unwrap_or(u64::MAX),
            state: RunState::Running,
            error: None,
            report: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record how the run ended. A run the scheduler marked superseded stays
    /// superseded when it was cancelled; one that completed or failed on its
    /// own keeps that outcome.
    pub fn finish(&mut self, state: RunState, outcome: Result<ValidationReport, String>) {
        match outcome {
            Ok(report) => self.report = Some(report),
            Err(error) => self.error = Some(error),
        }
        self.state = match (self.state, state) {
            (RunState::Superseded, RunState::Cancelled) => RunState::Superseded,
            (_, state) => state,
        };
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_sleep_interval() {
        assert_eq!(RunMode::from_sleep_interval(Duration::ZERO), RunMode::Full);
        assert_eq!(
            RunMode::from_sleep_interval(Duration::from_millis(500)),
            RunMode::Incremental
        );
    }

    #[test]
    fn test_finish_keeps_superseded_state() {
        let mut info = RunInfo::new(Direction::Src, 0, Duration::from_secs(1));
        info.state = RunState::Superseded;
        info.finish(RunState::Cancelled, Ok(ValidationReport::default()));

        assert_eq!(info.state, RunState::Superseded);
        assert!(info.finished_at.is_some());
        assert!(info.report.is_some());
    }

    #[test]
    fn test_finish_prefers_completion_over_superseded() {
        let mut info = RunInfo::new(Direction::Src, 0, Duration::ZERO);
        info.state = RunState::Superseded;
        info.finish(RunState::Completed, Ok(ValidationReport::default()));

        assert_eq!(info.state, RunState::Completed);
    }

    #[test]
    fn test_finish_records_error() {
        let mut info = RunInfo::new(Direction::Dst, 10, Duration::ZERO);
        info.finish(RunState::Failed, Err("no such table".to_string()));

        assert_eq!(info.state, RunState::Failed);
        assert_eq!(info.error.as_deref(), Some("no such table"));
        assert_eq!(info.mode, RunMode::Full);
    }

    #[test]
    fn test_run_info_serialization() {
        let info = RunInfo::new(Direction::Src, 1_700_000_000_000, Duration::from_millis(250));
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["mode"], "incremental");
        assert_eq!(json["direction"], "SRC");
        assert_eq!(json["state"], "running");
        assert_eq!(json["sleep_interval_ms"], 250);
        assert!(json.get("error").is_none());
        assert!(json.get("finished_at").is_none());
    }
}

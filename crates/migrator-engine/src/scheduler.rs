//! Control plane of the migration.
//!
//! The scheduler owns the write pattern and the cancel handles of the active
//! full and incremental runs, all behind one mutex. Starting a run of a mode
//! cancels the previous run of that mode before the new one is spawned, so
//! two runs of the same mode never overlap.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use migrator_core::{Entity, Orientation, WritePattern};
use migrator_events::InconsistencyProducer;
use migrator_store::Store;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::detached::spawn_detached;
use crate::error::SchedulerError;
use crate::listener::PatternListener;
use crate::types::{RunInfo, RunMode, RunState};
use crate::validator::{ValidationReport, Validator, ValidatorConfig};

/// Finished and superseded runs kept for inspection.
const HISTORY_LIMIT: usize = 16;

struct ActiveRun {
    token: CancellationToken,
    info: Arc<Mutex<RunInfo>>,
    handle: Option<JoinHandle<()>>,
}

impl ActiveRun {
    fn snapshot(&self) -> RunInfo {
        self.info.lock().clone()
    }
}

struct SchedulerState {
    pattern: WritePattern,
    full: Option<ActiveRun>,
    incr: Option<ActiveRun>,
    history: VecDeque<Arc<Mutex<RunInfo>>>,
    shut_down: bool,
}

impl SchedulerState {
    fn slot(&mut self, mode: RunMode) -> &mut Option<ActiveRun> {
        match mode {
            RunMode::Full => &mut self.full,
            RunMode::Incremental => &mut self.incr,
        }
    }
}

/// Snapshot of the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub pattern: WritePattern,
    pub full: Option<RunInfo>,
    pub incr: Option<RunInfo>,
}

/// Starts, supersedes and stops validation runs.
pub struct Scheduler<T: Entity> {
    source: Arc<dyn Store<T>>,
    target: Arc<dyn Store<T>>,
    producer: Arc<dyn InconsistencyProducer>,
    config: ValidatorConfig,
    listener: Option<Arc<dyn PatternListener>>,
    root: CancellationToken,
    state: Mutex<SchedulerState>,
}

impl<T: Entity> Scheduler<T> {
    /// Create a scheduler in the default `src_first` pattern.
    pub fn new(
        source: Arc<dyn Store<T>>,
        target: Arc<dyn Store<T>>,
        producer: Arc<dyn InconsistencyProducer>,
        config: ValidatorConfig,
    ) -> Self {
        Self {
            source,
            target,
            producer,
            config,
            listener: None,
            root: CancellationToken::new(),
            state: Mutex::new(SchedulerState {
                pattern: WritePattern::default(),
                full: None,
                incr: None,
                history: VecDeque::new(),
                shut_down: false,
            }),
        }
    }

    /// Start in `pattern` instead of the default. The listener is not told.
    #[must_use]
    pub fn with_pattern(self, pattern: WritePattern) -> Self {
        self.state.lock().pattern = pattern;
        self
    }

    /// Notify `listener` on every pattern change.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn PatternListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn pattern(&self) -> WritePattern {
        self.state.lock().pattern
    }

    /// Switch the authoritative pattern and tell the listener.
    ///
    /// Running validations keep the orientation they were started with.
    #[instrument(skip(self))]
    pub fn set_pattern(&self, pattern: WritePattern) {
        let mut state = self.state.lock();
        let previous = std::mem::replace(&mut state.pattern, pattern);
        if let Some(listener) = &self.listener {
            listener.change_pattern(pattern);
        }
        info!(%previous, %pattern, "Write pattern changed");
    }

    /// Start a full run oriented by the current pattern, superseding the
    /// previous full run.
    pub fn start_full(&self) -> Result<RunInfo, SchedulerError> {
        self.start(0, Duration::ZERO)
    }

    /// Start an incremental run from `watermark`, superseding the previous
    /// incremental run.
    pub fn start_incr(
        &self,
        watermark: i64,
        sleep_interval: Duration,
    ) -> Result<RunInfo, SchedulerError> {
        if sleep_interval.is_zero() {
            return Err(SchedulerError::InvalidConfig(
                "incremental runs need a positive sleep interval".to_string(),
            ));
        }
        self.start(watermark, sleep_interval)
    }

    /// Cancel the active full run, if any.
    pub fn stop_full(&self) -> Option<RunInfo> {
        self.stop(RunMode::Full)
    }

    /// Cancel the active incremental run, if any.
    pub fn stop_incr(&self) -> Option<RunInfo> {
        self.stop(RunMode::Incremental)
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.state.lock();
        SchedulerStatus {
            pattern: state.pattern,
            full: state.full.as_ref().map(ActiveRun::snapshot),
            incr: state.incr.as_ref().map(ActiveRun::snapshot),
        }
    }

    /// Recent runs, newest first.
    pub fn history(&self) -> Vec<RunInfo> {
        self.state
            .lock()
            .history
            .iter()
            .map(|info| info.lock().clone())
            .collect()
    }

    /// Cancel every run, refuse new ones, and wait for the active runs to stop.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.shut_down = true;
            self.root.cancel();
            [state.full.as_mut(), state.incr.as_mut()]
                .into_iter()
                .flatten()
                .filter_map(|run| run.handle.take())
                .collect()
        };

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Validation run did not stop cleanly");
            }
        }
        info!("Scheduler shut down");
    }

    /// Build a validator oriented by `pattern`.
    fn new_validator(
        &self,
        pattern: WritePattern,
        watermark: i64,
        sleep_interval: Duration,
    ) -> Result<Validator<T>, SchedulerError> {
        let orientation = pattern.orientation();
        let (base, target) = match orientation {
            Orientation::SourceBase => (Arc::clone(&self.source), Arc::clone(&self.target)),
            Orientation::TargetBase => (Arc::clone(&self.target), Arc::clone(&self.source)),
        };

        let validator = Validator::new(
            base,
            target,
            orientation.direction(),
            Arc::clone(&self.producer),
            self.config.clone(),
        )?;
        Ok(validator.watermark(watermark).sleep_interval(sleep_interval))
    }

    fn start(&self, watermark: i64, sleep_interval: Duration) -> Result<RunInfo, SchedulerError> {
        let mode = RunMode::from_sleep_interval(sleep_interval);
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(SchedulerError::ShutDown);
        }

        let validator = self.new_validator(state.pattern, watermark, sleep_interval)?;

        if let Some(previous) = state.slot(mode).take() {
            supersede(&previous);
        }

        let token = self.root.child_token();
        let info = Arc::new(Mutex::new(RunInfo::new(
            validator.direction(),
            watermark,
            sleep_interval,
        )));
        let snapshot = info.lock().clone();

        let sink = {
            let info = Arc::clone(&info);
            move |outcome: Result<ValidationReport, String>| {
                let state = match &outcome {
                    Ok(report) if report.cancelled() => RunState::Cancelled,
                    Ok(_) => RunState::Completed,
                    Err(_) => RunState::Failed,
                };
                info.lock().finish(state, outcome);
            }
        };

        let run_token = token.clone();
        let task_name = match mode {
            RunMode::Full => "full_validation",
            RunMode::Incremental => "incremental_validation",
        };
        let handle = spawn_detached(
            task_name,
            async move { validator.validate(run_token).await },
            sink,
        );

        state.history.push_front(Arc::clone(&info));
        state.history.truncate(HISTORY_LIMIT);
        *state.slot(mode) = Some(ActiveRun {
            token,
            info,
            handle: Some(handle),
        });

        info!(
            run_id = %snapshot.id,
            %mode,
            direction = %snapshot.direction,
            watermark,
            sleep_interval_ms = snapshot.sleep_interval_ms,
            "Validation run started"
        );
        Ok(snapshot)
    }

    fn stop(&self, mode: RunMode) -> Option<RunInfo> {
        let mut state = self.state.lock();
        let run = state.slot(mode).as_ref()?;
        run.token.cancel();

        let snapshot = run.snapshot();
        info!(run_id = %snapshot.id, %mode, "Validation run stopped");
        Some(snapshot)
    }
}

/// Mark a replaced run and cancel it.
fn supersede(run: &ActiveRun) {
    if !run.token.is_cancelled() {
        let mut info = run.info.lock();
        if info.state.is_running() {
            info.state = RunState::Superseded;
        }
    }
    run.token.cancel();
}

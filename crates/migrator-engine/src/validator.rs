//! Bidirectional validation of two stores.
//!
//! A run drives two loops concurrently. The base→target loop scans the base
//! store and looks each batch up in the target; it reports records the
//! target lacks and records whose columns differ. The target→base loop scans
//! the target and reports records the base lacks. Both loops page by offset
//! in primary-key order, restricted to `utime >= watermark`.
//!
//! A zero sleep interval makes a full run, which ends when both scans come
//! back empty. A positive interval makes an incremental run, which waits on
//! an empty scan and tries the same offset again until it is cancelled.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use migrator_core::{Direction, Entity, InconsistencyEvent, InconsistencyKind};
use migrator_events::InconsistencyProducer;
use migrator_store::{Store, StoreError};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::ValidateError;
use crate::types::RunMode;

/// Configuration for the validator.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Records per scan.
    pub batch_size: usize,
    /// Deadline of one scan or lookup call.
    pub fetch_timeout: Duration,
    /// Deadline of one event publish.
    pub publish_timeout: Duration,
    /// Pause before retrying a scan that failed with a non-timeout error.
    pub error_backoff: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            fetch_timeout: Duration::from_secs(2),
            publish_timeout: Duration::from_secs(1),
            error_backoff: Duration::from_millis(200),
        }
    }
}

impl ValidatorConfig {
    /// Check that the configuration can drive a run.
    pub fn validate(&self) -> Result<(), ValidateError> {
        if self.batch_size == 0 {
            return Err(ValidateError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero() || self.publish_timeout.is_zero() {
            return Err(ValidateError::InvalidConfig(
                "timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Counters of one directional loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    /// Non-empty batches compared.
    pub batches: u64,
    /// Records read by the scan.
    pub scanned: u64,
    /// Events published.
    pub events: u64,
    /// Events that could not be published.
    pub publish_failures: u64,
    /// Batches skipped because the counterpart lookup failed.
    pub skipped_batches: u64,
    /// The loop stopped on cancellation instead of running out of records.
    #[serde(default)]
    pub cancelled: bool,
}

impl ValidationSummary {
    fn cut_short(mut self) -> Self {
        self.cancelled = true;
        self
    }
}

/// Counters of both loops of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub base_to_target: ValidationSummary,
    pub target_to_base: ValidationSummary,
}

impl ValidationReport {
    /// Events published by both loops.
    #[must_use]
    pub fn events(&self) -> u64 {
        self.base_to_target.events + self.target_to_base.events
    }

    /// Whether either loop was stopped by cancellation.
    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.base_to_target.cancelled || self.target_to_base.cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    BaseToTarget,
    TargetToBase,
}

impl Pass {
    fn as_str(self) -> &'static str {
        match self {
            Self::BaseToTarget => "base_to_target",
            Self::TargetToBase => "target_to_base",
        }
    }

    fn missing_kind(self) -> InconsistencyKind {
        match self {
            Self::BaseToTarget => InconsistencyKind::TargetMissing,
            Self::TargetToBase => InconsistencyKind::BaseMissing,
        }
    }
}

/// Result of a store call raced against its deadline and the run token.
enum Step<R> {
    Done(R),
    TimedOut,
    Cancelled,
}

async fn guarded<F: Future>(token: &CancellationToken, deadline: Duration, fut: F) -> Step<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Step::Cancelled,
        res = tokio::time::timeout(deadline, fut) => match res {
            Ok(value) => Step::Done(value),
            Err(_) => Step::TimedOut,
        },
    }
}

/// Sleep unless cancelled first. Returns false on cancellation.
async fn pause(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Compares a base and a target store and publishes their differences.
pub struct Validator<T: Entity> {
    base: Arc<dyn Store<T>>,
    target: Arc<dyn Store<T>>,
    direction: Direction,
    producer: Arc<dyn InconsistencyProducer>,
    config: ValidatorConfig,
    watermark: i64,
    sleep_interval: Duration,
}

impl<T: Entity> Validator<T> {
    /// Create a full-mode validator starting at watermark 0.
    ///
    /// `direction` is stamped on every event so the consumer can tell which
    /// store was authoritative.
    pub fn new(
        base: Arc<dyn Store<T>>,
        target: Arc<dyn Store<T>>,
        direction: Direction,
        producer: Arc<dyn InconsistencyProducer>,
        config: ValidatorConfig,
    ) -> Result<Self, ValidateError> {
        config.validate()?;
        Ok(Self {
            base,
            target,
            direction,
            producer,
            config,
            watermark: 0,
            sleep_interval: Duration::ZERO,
        })
    }

    /// Only validate records modified at or after `utime`.
    #[must_use]
    pub fn watermark(mut self, utime: i64) -> Self {
        self.watermark = utime;
        self
    }

    /// Tail the stores, sleeping `interval` whenever a scan comes back empty.
    /// Zero selects full mode.
    #[must_use]
    pub fn sleep_interval(mut self, interval: Duration) -> Self {
        self.sleep_interval = interval;
        self
    }

    #[must_use]
    pub fn mode(&self) -> RunMode {
        RunMode::from_sleep_interval(self.sleep_interval)
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Run both loops until they finish or `token` is cancelled.
    ///
    /// Cancellation is a clean stop and returns the counters gathered so far,
    /// flagged by [`ValidationReport::cancelled`].
    /// The first loop to hit a store configuration error cancels its sibling
    /// and the error is returned once both have stopped.
    #[instrument(skip_all, fields(
        direction = %self.direction,
        mode = %self.mode(),
        watermark = self.watermark,
        base = %self.base.name(),
        target = %self.target.name(),
    ))]
    pub async fn validate(&self, token: CancellationToken) -> Result<ValidationReport, ValidateError> {
        let scope = token.child_token();

        let (forward, backward) = tokio::join!(
            self.scoped_pass(Pass::BaseToTarget, &scope),
            self.scoped_pass(Pass::TargetToBase, &scope),
        );

        let report = ValidationReport {
            base_to_target: forward?,
            target_to_base: backward?,
        };

        info!(
            events = report.events(),
            cancelled = report.cancelled(),
            "Validation finished"
        );
        Ok(report)
    }

    async fn scoped_pass(
        &self,
        pass: Pass,
        scope: &CancellationToken,
    ) -> Result<ValidationSummary, ValidateError> {
        let result = self.run_pass(pass, scope).await;
        if let Err(e) = &result {
            warn!(pass = pass.as_str(), error = %e, "Validation loop stopped, cancelling sibling");
            scope.cancel();
        }
        result
    }

    async fn run_pass(
        &self,
        pass: Pass,
        token: &CancellationToken,
    ) -> Result<ValidationSummary, ValidateError> {
        let (scan, lookup) = match pass {
            Pass::BaseToTarget => (&self.base, &self.target),
            Pass::TargetToBase => (&self.target, &self.base),
        };
        let batch_size = self.config.batch_size;
        let mut summary = ValidationSummary::default();
        let mut offset = 0usize;

        debug!(pass = pass.as_str(), "Validation loop started");

        loop {
            if token.is_cancelled() {
                return Ok(summary.cut_short());
            }

            let step = guarded(
                token,
                self.config.fetch_timeout,
                scan.range_scan(self.watermark, offset, batch_size),
            )
            .await;

            let batch = match step {
                Step::Cancelled => return Ok(summary.cut_short()),
                Step::TimedOut | Step::Done(Err(StoreError::Timeout)) => {
                    debug!(pass = pass.as_str(), offset, "Scan timed out, retrying");
                    continue;
                }
                Step::Done(Err(e)) if e.is_configuration() => {
                    return Err(ValidateError::Store {
                        store: scan.name().to_string(),
                        source: e,
                    });
                }
                Step::Done(Err(e)) => {
                    warn!(pass = pass.as_str(), offset, error = %e, "Scan failed, retrying");
                    if !pause(token, self.config.error_backoff).await {
                        return Ok(summary.cut_short());
                    }
                    continue;
                }
                Step::Done(Ok(batch)) => batch,
            };

            if batch.is_empty() {
                if self.sleep_interval.is_zero() {
                    debug!(pass = pass.as_str(), ?summary, "Validation loop exhausted");
                    return Ok(summary);
                }
                if !pause(token, self.sleep_interval).await {
                    return Ok(summary.cut_short());
                }
                continue;
            }

            summary.batches += 1;
            summary.scanned += batch.len() as u64;

            let ids: Vec<i64> = batch.iter().map(Entity::id).collect();
            let counterpart = loop {
                let step = guarded(token, self.config.fetch_timeout, lookup.batch_get(&ids)).await;
                match step {
                    Step::Cancelled => return Ok(summary.cut_short()),
                    Step::TimedOut | Step::Done(Err(StoreError::Timeout)) => {
                        debug!(pass = pass.as_str(), offset, "Lookup timed out, retrying");
                    }
                    Step::Done(Err(e)) if e.is_configuration() => {
                        return Err(ValidateError::Store {
                            store: lookup.name().to_string(),
                            source: e,
                        });
                    }
                    Step::Done(Err(e)) => {
                        warn!(
                            pass = pass.as_str(),
                            offset,
                            batch = ids.len(),
                            error = %e,
                            "Lookup failed, skipping batch"
                        );
                        break None;
                    }
                    Step::Done(Ok(rows)) => break Some(rows),
                }
            };

            match counterpart {
                Some(rows) => {
                    let found: HashMap<i64, T> = rows.into_iter().map(|r| (r.id(), r)).collect();
                    for record in &batch {
                        let kind = match found.get(&record.id()) {
                            None => Some(pass.missing_kind()),
                            Some(other) if pass == Pass::BaseToTarget && !record.equals(other) => {
                                Some(InconsistencyKind::NotEqual)
                            }
                            Some(_) => None,
                        };
                        if let Some(kind) = kind {
                            self.emit(token, record.id(), kind, &mut summary).await;
                        }
                    }
                }
                None => summary.skipped_batches += 1,
            }

            offset += batch.len();
        }
    }

    async fn emit(
        &self,
        token: &CancellationToken,
        id: i64,
        kind: InconsistencyKind,
        summary: &mut ValidationSummary,
    ) {
        let event = InconsistencyEvent::new(self.direction, id, kind);

        match guarded(token, self.config.publish_timeout, self.producer.produce(&event)).await {
            Step::Done(Ok(())) => {
                summary.events += 1;
                debug!(%event, "Inconsistency reported");
            }
            Step::Done(Err(e)) => {
                summary.publish_failures += 1;
                warn!(%event, error = %e, "Failed to publish inconsistency");
            }
            Step::TimedOut => {
                summary.publish_failures += 1;
                warn!(%event, "Publishing inconsistency timed out");
            }
            Step::Cancelled => {}
        }
    }
}

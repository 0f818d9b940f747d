//! Sequential aim-settle-spray cycles for a single nozzle.
//!
//! Every target goes through `Aiming -> Settling -> Spraying` strictly one at
//! a time. An opened valve is owned by a [`ValveGuard`], which closes it on
//! every exit path: normal completion, actuator faults, cancellation, or the
//! surrounding future being dropped.

use std::fmt;
use std::time::Duration;

use farmx_targeting::{GridCell, ServoAngleMapper, TargetingError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cancel::{CancelToken, Cancelled, hold};
use crate::error::{ActuatorError, ActuatorFault, ActuatorOp};
use crate::hardware::SprayActuator;

/// Spray timing and safety limits. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpraySettings {
    /// Wait after an aim command for the gimbal to stop moving.
    pub settle_delay: f64,
    /// Time the valve stays open per target.
    pub spray_duration: f64,
    /// Targets beyond this count are dropped for the current hover.
    pub max_targets_per_hover: usize,
    /// Pause before the single retry of an unacknowledged actuator command.
    pub retry_backoff: f64,
}

impl SpraySettings {
    pub fn validate(&self) -> Result<(), TargetingError> {
        self.timing().map(|_| ())
    }

    fn timing(&self) -> Result<SprayTiming, TargetingError> {
        let timing = SprayTiming {
            settle: delay(self.settle_delay, "settle_delay must be finite, non-negative and in range")?,
            dwell: delay(self.spray_duration, "spray_duration must be finite, non-negative and in range")?,
            backoff: delay(self.retry_backoff, "retry_backoff must be finite, non-negative and in range")?,
        };
        if self.max_targets_per_hover == 0 {
            return Err(TargetingError::InvalidInput("max_targets_per_hover must be positive"));
        }
        Ok(timing)
    }
}

/// Seconds from configuration as a [`Duration`]. Rejects negative, non-finite
/// and unrepresentable values.
pub(crate) fn delay(secs: f64, msg: &'static str) -> Result<Duration, TargetingError> {
    Duration::try_from_secs_f64(secs).map_err(|_| TargetingError::InvalidInput(msg))
}

/// Validated spray delays.
#[derive(Debug, Clone, Copy)]
struct SprayTiming {
    settle: Duration,
    dwell: Duration,
    backoff: Duration,
}

impl Default for SpraySettings {
    fn default() -> Self {
        Self {
            settle_delay: 0.2,
            spray_duration: 0.4,
            max_targets_per_hover: 20,
            retry_backoff: 0.05,
        }
    }
}

/// Where the sequencer is within a spray cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SprayState {
    #[default]
    Idle,
    Validating,
    Aiming,
    Settling,
    Spraying,
}

/// How a spray cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing to spray; no actuator was touched.
    NoTargets,
    /// Every queued target was attempted.
    Completed,
    /// Cancellation stopped the queue early.
    Cancelled,
}

/// Result of one [`SpraySequencer::execute_cycle`].
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Targets handed to the sequencer.
    pub requested: usize,
    /// Targets dropped by the per-hover cap.
    pub truncated: usize,
    /// Targets the sequencer started working on.
    pub attempted: usize,
    /// Targets that received a full dose, in spray order.
    pub sprayed: Vec<GridCell>,
    /// Attempted targets that did not receive a full dose.
    pub skipped: usize,
    pub faults: Vec<ActuatorFault>,
}

impl CycleReport {
    fn new(requested: usize) -> Self {
        Self {
            outcome: CycleOutcome::Completed,
            requested,
            truncated: 0,
            attempted: 0,
            sprayed: Vec::new(),
            skipped: 0,
            faults: Vec::new(),
        }
    }

    pub fn sprayed_count(&self) -> usize {
        self.sprayed.len()
    }

    /// True if any actuator command failed even after its retry.
    pub fn has_unrecovered_faults(&self) -> bool {
        !self.faults.is_empty()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            CycleOutcome::NoTargets => write!(f, "no targets, skipped"),
            _ => {
                write!(
                    f,
                    "{} attempted, {} sprayed, {} skipped, {} faults",
                    self.attempted,
                    self.sprayed.len(),
                    self.skipped,
                    self.faults.len()
                )?;
                if self.truncated > 0 {
                    write!(f, ", {} truncated", self.truncated)?;
                }
                if self.outcome == CycleOutcome::Cancelled {
                    write!(f, ", cancelled")?;
                }
                Ok(())
            }
        }
    }
}

enum TargetOutcome {
    Sprayed { close_fault: Option<ActuatorFault> },
    Skipped(ActuatorFault),
    Interrupted,
}

enum RetryError {
    Failed(ActuatorError),
    Cancelled,
}

/// Drives the gimbal and valve through spray cycles.
pub struct SpraySequencer<A> {
    actuator: A,
    servo: ServoAngleMapper,
    settings: SpraySettings,
    timing: SprayTiming,
    state: SprayState,
}

impl<A: SprayActuator> SpraySequencer<A> {
    pub fn new(actuator: A, servo: ServoAngleMapper, settings: SpraySettings) -> Result<Self, TargetingError> {
        let timing = settings.timing()?;
        Ok(Self {
            actuator,
            servo,
            settings,
            timing,
            state: SprayState::Idle,
        })
    }

    pub fn state(&self) -> SprayState {
        self.state
    }

    pub fn servo(&self) -> &ServoAngleMapper {
        &self.servo
    }

    pub fn settings(&self) -> &SpraySettings {
        &self.settings
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Spray `targets` in order, one at a time.
    ///
    /// An empty list returns immediately without touching the actuator. Lists
    /// longer than `max_targets_per_hover` are cut to the first N. A target whose
    /// aim or valve-open command fails twice is skipped and the fault recorded;
    /// the remaining queue still runs. Cancellation is checked before each
    /// target and interrupts delays, but never leaves the valve open.
    pub async fn execute_cycle(&mut self, targets: &[GridCell], cancel: &CancelToken) -> CycleReport {
        self.state = SprayState::Validating;
        let mut report = CycleReport::new(targets.len());

        if targets.is_empty() {
            info!("No weed targets, skipping spray");
            report.outcome = CycleOutcome::NoTargets;
            self.state = SprayState::Idle;
            return report;
        }

        let cap = self.settings.max_targets_per_hover;
        let queue = if targets.len() > cap {
            report.truncated = targets.len() - cap;
            warn!(
                requested = targets.len(),
                cap,
                truncated = report.truncated,
                "Too many targets for one hover, truncating"
            );
            &targets[..cap]
        } else {
            targets
        };

        info!(targets = queue.len(), "Spray cycle started");
        for (idx, &target) in queue.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(remaining = queue.len() - idx, "Spray cycle cancelled");
                report.outcome = CycleOutcome::Cancelled;
                break;
            }

            report.attempted += 1;
            debug!(n = idx + 1, of = queue.len(), %target, "Spraying target");
            match self.spray_target(target, cancel).await {
                TargetOutcome::Sprayed { close_fault } => {
                    report.sprayed.push(target);
                    if let Some(fault) = close_fault {
                        report.faults.push(fault);
                    }
                }
                TargetOutcome::Skipped(fault) => {
                    warn!(%fault, "Target skipped");
                    report.skipped += 1;
                    report.faults.push(fault);
                }
                TargetOutcome::Interrupted => {
                    info!(%target, "Spray cycle cancelled mid-target");
                    report.skipped += 1;
                    report.outcome = CycleOutcome::Cancelled;
                    break;
                }
            }
        }

        self.state = SprayState::Idle;
        info!(%report, "Spray cycle finished");
        report
    }

    async fn spray_target(&mut self, target: GridCell, cancel: &CancelToken) -> TargetOutcome {
        let backoff = self.timing.backoff;

        self.state = SprayState::Aiming;
        let angles = self.servo.to_servo_angles(target);
        debug!(%target, %angles, "Aiming nozzle");
        let actuator = &mut self.actuator;
        match retry_once(backoff, cancel, || actuator.aim(angles)).await {
            Ok(()) => {}
            Err(RetryError::Failed(e)) => {
                return TargetOutcome::Skipped(ActuatorFault::new(target, ActuatorOp::Aim, e));
            }
            Err(RetryError::Cancelled) => return TargetOutcome::Interrupted,
        }

        self.state = SprayState::Settling;
        if hold(self.timing.settle, cancel).await.is_err() {
            return TargetOutcome::Interrupted;
        }

        self.state = SprayState::Spraying;
        let dwell = self.timing.dwell;
        let mut valve = ValveGuard::new(&mut self.actuator);
        match retry_once(backoff, cancel, || valve.open()).await {
            Ok(()) => {}
            // Dropping the guard closes the valve
            Err(RetryError::Failed(e)) => {
                return TargetOutcome::Skipped(ActuatorFault::new(target, ActuatorOp::OpenValve, e));
            }
            Err(RetryError::Cancelled) => return TargetOutcome::Interrupted,
        }
        debug!(?dwell, "Valve open");

        let dwell_result = hold(dwell, cancel).await;
        let close_fault = valve
            .release(backoff)
            .await
            .err()
            .map(|e| ActuatorFault::new(target, ActuatorOp::CloseValve, e));

        match dwell_result {
            Ok(()) => TargetOutcome::Sprayed { close_fault },
            Err(Cancelled) => TargetOutcome::Interrupted,
        }
    }
}

/// Run `op`, and once more after `backoff` if the actuator did not acknowledge.
async fn retry_once<F>(backoff: Duration, cancel: &CancelToken, mut op: F) -> Result<(), RetryError>
where
    F: FnMut() -> Result<(), ActuatorError>,
{
    match op() {
        Ok(()) => return Ok(()),
        Err(e) => warn!(error = %e, ?backoff, "Actuator did not acknowledge, retrying once"),
    }
    if hold(backoff, cancel).await.is_err() {
        return Err(RetryError::Cancelled);
    }
    op().map_err(RetryError::Failed)
}

/// Scoped ownership of an open valve.
///
/// Armed as soon as an open is commanded, since a missing acknowledgement does
/// not prove the valve stayed shut. Until [`ValveGuard::release`] has run to
/// completion, dropping the guard commands a close.
struct ValveGuard<'a, A: SprayActuator> {
    actuator: &'a mut A,
    armed: bool,
}

impl<'a, A: SprayActuator> ValveGuard<'a, A> {
    fn new(actuator: &'a mut A) -> Self {
        Self { actuator, armed: false }
    }

    fn open(&mut self) -> Result<(), ActuatorError> {
        self.armed = true;
        self.actuator.open_valve()
    }

    /// Close the valve, retrying once after `backoff`. The backoff is not
    /// cancellable.
    async fn release(mut self, backoff: Duration) -> Result<(), ActuatorError> {
        match self.actuator.close_valve() {
            Ok(()) => {
                self.armed = false;
                debug!("Valve closed");
                return Ok(());
            }
            Err(e) => warn!(error = %e, "Valve close not acknowledged, retrying once"),
        }
        tokio::time::sleep(backoff).await;
        let result = self.actuator.close_valve();
        self.armed = false;
        if let Err(e) = &result {
            error!(error = %e, "Valve failed to close");
        }
        result
    }
}

impl<A: SprayActuator> Drop for ValveGuard<'_, A> {
    fn drop(&mut self) {
        if self.armed {
            match self.actuator.close_valve() {
                Ok(()) => debug!("Valve closed on early exit"),
                Err(e) => error!(error = %e, "Valve failed to close on early exit"),
            }
        }
    }
}

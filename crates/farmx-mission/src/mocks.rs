//! Recording fakes for every hardware capability.
//!
//! Each fake logs its calls with the virtual time they happened at, so tests
//! can check ordering and delays under a paused tokio clock.

use std::collections::VecDeque;
use std::sync::Arc;

use farmx_targeting::{BoundingBox, FrameSize, ServoAngles, WindVector};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::cancel::CancelToken;
use crate::error::{ActuatorError, CaptureError, DetectionError, NavigationError, WindError};
use crate::hardware::{Camera, Frame, Navigator, SprayActuator, WeedDetector, WindSensor};
use crate::waypoint::Waypoint;

pub type CallLog<T> = Arc<Mutex<Vec<(T, Instant)>>>;

fn record<T>(log: &CallLog<T>, call: T) {
    log.lock().push((call, Instant::now()));
}

fn take_failure(remaining: &mut usize) -> bool {
    if *remaining > 0 {
        *remaining -= 1;
        true
    } else {
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Aim(ServoAngles),
    OpenValve,
    CloseValve,
}

impl Call {
    /// Aim calls with the angles erased, for comparing call shapes.
    pub fn kind(&self) -> Call {
        match self {
            Call::Aim(_) => Call::aim_kind(),
            other => other.clone(),
        }
    }

    pub fn aim_kind() -> Call {
        Call::Aim(ServoAngles::default())
    }
}

/// Gimbal and valve fake. Failures are consumed in call order.
#[derive(Debug, Default)]
pub struct MockActuator {
    calls: CallLog<Call>,
    failing_aims: usize,
    failing_opens: usize,
    failing_closes: usize,
    cancel_on_open: Option<CancelToken>,
    valve_open: bool,
}

impl MockActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> CallLog<Call> {
        Arc::clone(&self.calls)
    }

    /// The next `n` aim commands are not acknowledged.
    pub fn failing_aims(mut self, n: usize) -> Self {
        self.failing_aims = n;
        self
    }

    pub fn failing_opens(mut self, n: usize) -> Self {
        self.failing_opens = n;
        self
    }

    pub fn failing_closes(mut self, n: usize) -> Self {
        self.failing_closes = n;
        self
    }

    /// Fire `cancel` from inside the first successful valve open.
    pub fn cancel_on_open(mut self, cancel: CancelToken) -> Self {
        self.cancel_on_open = Some(cancel);
        self
    }

    pub fn valve_open(&self) -> bool {
        self.valve_open
    }
}

impl SprayActuator for MockActuator {
    fn aim(&mut self, angles: ServoAngles) -> Result<(), ActuatorError> {
        record(&self.calls, Call::Aim(angles));
        if take_failure(&mut self.failing_aims) {
            return Err(ActuatorError::Unavailable("gimbal timeout".into()));
        }
        Ok(())
    }

    fn open_valve(&mut self) -> Result<(), ActuatorError> {
        record(&self.calls, Call::OpenValve);
        if take_failure(&mut self.failing_opens) {
            return Err(ActuatorError::Unavailable("valve timeout".into()));
        }
        self.valve_open = true;
        if let Some(cancel) = self.cancel_on_open.take() {
            cancel.cancel();
        }
        Ok(())
    }

    fn close_valve(&mut self) -> Result<(), ActuatorError> {
        record(&self.calls, Call::CloseValve);
        if take_failure(&mut self.failing_closes) {
            return Err(ActuatorError::Unavailable("valve timeout".into()));
        }
        self.valve_open = false;
        Ok(())
    }
}

/// Camera fake returning blank frames, with scripted failures per capture.
#[derive(Debug)]
pub struct MockCamera {
    size: FrameSize,
    failures: VecDeque<Option<CaptureError>>,
    captures: Arc<Mutex<usize>>,
}

impl MockCamera {
    pub fn new(size: FrameSize) -> Self {
        Self {
            size,
            failures: VecDeque::new(),
            captures: Arc::default(),
        }
    }

    /// Script the outcome of upcoming captures; `None` succeeds.
    pub fn with_script(mut self, script: impl IntoIterator<Item = Option<CaptureError>>) -> Self {
        self.failures = script.into_iter().collect();
        self
    }

    pub fn captures(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.captures)
    }
}

impl Camera for MockCamera {
    fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        *self.captures.lock() += 1;
        if let Some(Some(err)) = self.failures.pop_front() {
            return Err(err);
        }
        Ok(Frame::empty(self.size))
    }
}

/// Detector fake returning a scripted list per call, then nothing.
#[derive(Debug, Default)]
pub struct MockDetector {
    script: VecDeque<Result<Vec<BoundingBox>, DetectionError>>,
}

impl MockDetector {
    pub fn new(script: impl IntoIterator<Item = Result<Vec<BoundingBox>, DetectionError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl WeedDetector for MockDetector {
    fn detect_weeds(&mut self, _frame: &Frame) -> Result<Vec<BoundingBox>, DetectionError> {
        self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavCall {
    MoveTo(usize),
    Hold,
}

/// Flight controller fake. Can reject moves to chosen waypoint indices.
#[derive(Debug, Default)]
pub struct MockNavigator {
    calls: CallLog<NavCall>,
    reject: Vec<usize>,
    cancel_at: Option<(usize, CancelToken)>,
}

impl MockNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> CallLog<NavCall> {
        Arc::clone(&self.calls)
    }

    pub fn rejecting(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.reject = indices.into_iter().collect();
        self
    }

    /// Fire `cancel` when asked to move to waypoint `index`.
    pub fn cancel_at(mut self, index: usize, cancel: CancelToken) -> Self {
        self.cancel_at = Some((index, cancel));
        self
    }
}

impl Navigator for MockNavigator {
    fn move_to(&mut self, waypoint: &Waypoint) -> Result<(), NavigationError> {
        record(&self.calls, NavCall::MoveTo(waypoint.index));
        if let Some((index, cancel)) = &self.cancel_at {
            if *index == waypoint.index {
                cancel.cancel();
            }
        }
        if self.reject.contains(&waypoint.index) {
            return Err(NavigationError::Rejected(format!("geofence at waypoint {}", waypoint.index)));
        }
        Ok(())
    }

    fn hold_position(&mut self) -> Result<(), NavigationError> {
        record(&self.calls, NavCall::Hold);
        Ok(())
    }
}

/// Wind sensor fake that fails once every `fail_every` reads (0 = never).
#[derive(Debug)]
pub struct MockWind {
    wind: WindVector,
    fail_every: usize,
    reads: usize,
}

impl MockWind {
    pub fn new(wind: WindVector) -> Self {
        Self {
            wind,
            fail_every: 0,
            reads: 0,
        }
    }

    pub fn failing_every(mut self, n: usize) -> Self {
        self.fail_every = n;
        self
    }
}

impl WindSensor for MockWind {
    fn read_wind(&mut self) -> Result<WindVector, WindError> {
        self.reads += 1;
        if self.fail_every > 0 && self.reads % self.fail_every == 0 {
            return Err(WindError::Unavailable("anemometer offline".into()));
        }
        Ok(self.wind)
    }
}

//! Capabilities the sprayer consumes from the airframe and its payload.
//!
//! The pipeline only talks to hardware through these traits. Real drivers
//! (PWM servos, the solenoid valve, the flight controller, the camera and the
//! inference runtime) implement them outside this crate; tests and the CLI
//! simulator provide stand-ins.

use farmx_targeting::{BoundingBox, FrameSize, ServoAngles, WindVector};

use crate::error::{ActuatorError, CaptureError, DetectionError, NavigationError, WindError};
use crate::waypoint::Waypoint;

/// A captured image. The pixel layout is opaque to the pipeline; only the
/// frame size matters for mapping detections.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Image dimensions in pixels.
    pub size: FrameSize,
    /// Raw image bytes in whatever layout the detector expects.
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn new(size: FrameSize, pixels: Vec<u8>) -> Self {
        Self { size, pixels }
    }

    /// A frame with no pixel payload, for sources that only report geometry.
    pub fn empty(size: FrameSize) -> Self {
        Self::new(size, Vec::new())
    }
}

/// Downward-facing payload camera.
pub trait Camera {
    /// Capture one stabilized frame.
    fn capture_frame(&mut self) -> Result<Frame, CaptureError>;
}

/// Weed detection model. May return an empty list.
pub trait WeedDetector {
    /// Bounding boxes of everything the model found in `frame`, in pixel
    /// coordinates of that frame. Filtering by class and confidence happens
    /// downstream.
    fn detect_weeds(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectionError>;
}

/// Flight controller interface.
pub trait Navigator {
    /// Command the drone toward `waypoint`. Returns once the command is accepted.
    fn move_to(&mut self, waypoint: &Waypoint) -> Result<(), NavigationError>;

    /// Command the drone to hold its current position.
    fn hold_position(&mut self) -> Result<(), NavigationError>;
}

/// Pan/tilt gimbal and spray valve. One nozzle, so commands never overlap.
pub trait SprayActuator {
    /// Point the nozzle. Returns once the gimbal acknowledges the command;
    /// the caller waits out the settle delay before spraying.
    fn aim(&mut self, angles: ServoAngles) -> Result<(), ActuatorError>;

    /// Open the spray valve. An error does not prove the valve stayed shut.
    fn open_valve(&mut self) -> Result<(), ActuatorError>;

    /// Close the spray valve. Must be safe to call when already closed.
    fn close_valve(&mut self) -> Result<(), ActuatorError>;
}

/// Anemometer. Optional: without one, targets are sprayed uncompensated.
pub trait WindSensor {
    /// Current wind speed and direction.
    fn read_wind(&mut self) -> Result<WindVector, WindError>;
}

impl<T: SprayActuator + ?Sized> SprayActuator for &mut T {
    fn aim(&mut self, angles: ServoAngles) -> Result<(), ActuatorError> {
        (**self).aim(angles)
    }

    fn open_valve(&mut self) -> Result<(), ActuatorError> {
        (**self).open_valve()
    }

    fn close_valve(&mut self) -> Result<(), ActuatorError> {
        (**self).close_valve()
    }
}

/// A wind sensor that always reports the same vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedWind(pub WindVector);

impl WindSensor for FixedWind {
    fn read_wind(&mut self) -> Result<WindVector, WindError> {
        Ok(self.0)
    }
}

//! Fault taxonomy for the external collaborators and the mission loop.
//!
//! Collaborator faults are isolated per target or per waypoint and end up in
//! the mission report; none of them aborts a mission.

use farmx_targeting::{GridCell, TargetingError};
use std::fmt;
use thiserror::Error;

/// The gimbal or the valve did not acknowledge a command.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActuatorError {
    /// No acknowledgement within the driver's timeout.
    #[error("actuator unavailable: {0}")]
    Unavailable(String),
}

/// The camera produced no frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// The camera is disconnected or not yet initialized.
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    /// The camera answered but the frame was unusable.
    #[error("frame capture failed: {0}")]
    Failed(String),
}

/// The detection model could not process a frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// Inference raised an error.
    #[error("weed inference failed: {0}")]
    Inference(String),
}

/// The flight controller did not accept a command.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavigationError {
    /// The command was received and refused, e.g. outside the geofence.
    #[error("flight controller rejected command: {0}")]
    Rejected(String),
    /// The link to the flight controller is down.
    #[error("flight controller unreachable: {0}")]
    Unreachable(String),
}

/// The wind sensor returned no reading.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WindError {
    /// The sensor is disconnected or timed out.
    #[error("wind sensor unavailable: {0}")]
    Unavailable(String),
}

/// Why a waypoint produced no spray cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WaypointFault {
    /// Moving to or holding at the waypoint failed.
    #[error("navigation: {0}")]
    Navigation(#[from] NavigationError),
    /// No frame was captured.
    #[error("capture: {0}")]
    Capture(#[from] CaptureError),
    /// The frame could not be analyzed.
    #[error("detection: {0}")]
    Detection(#[from] DetectionError),
    /// Wind compensation was configured but no reading was available.
    #[error("wind: {0}")]
    Wind(#[from] WindError),
    /// A detection or wind reading could not be mapped onto the grid.
    #[error("targeting: {0}")]
    InvalidInput(#[from] TargetingError),
}

/// Actuator command that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorOp {
    /// Pointing the gimbal at a grid cell.
    Aim,
    /// Opening the spray valve.
    OpenValve,
    /// Closing the spray valve. A fault here means the valve may still be open.
    CloseValve,
}

impl fmt::Display for ActuatorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorOp::Aim => write!(f, "aim"),
            ActuatorOp::OpenValve => write!(f, "open valve"),
            ActuatorOp::CloseValve => write!(f, "close valve"),
        }
    }
}

/// An actuator fault recorded against a single spray target, after retries.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{operation} failed for target {target}: {error}")]
pub struct ActuatorFault {
    /// Grid cell being sprayed when the command failed.
    pub target: GridCell,
    /// Command that failed.
    pub operation: ActuatorOp,
    /// Error from the last attempt.
    pub error: ActuatorError,
}

impl ActuatorFault {
    pub fn new(target: GridCell, operation: ActuatorOp, error: ActuatorError) -> Self {
        Self {
            target,
            operation,
            error,
        }
    }
}

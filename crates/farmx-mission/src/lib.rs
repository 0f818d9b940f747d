//! Spray sequencing and field-coverage missions for the precision sprayer.
//!
//! The [`MissionController`] flies a raster of hover stops and, at each one,
//! runs a targeting cycle: capture, detect, map to the spray grid, compensate
//! for wind and hand the targets to the [`SpraySequencer`]. All hardware is
//! reached through the capability traits in [`hardware`].

pub mod cancel;
pub mod coords;
pub mod error;
pub mod hardware;
pub mod mission;
pub mod report;
pub mod sequencer;
pub mod waypoint;

#[cfg(test)]
mod mocks;

pub use cancel::CancelToken;
pub use coords::CoordinateLog;
pub use error::{
    ActuatorError, ActuatorFault, ActuatorOp, CaptureError, DetectionError, NavigationError, WaypointFault,
    WindError,
};
pub use hardware::{Camera, FixedWind, Frame, Navigator, SprayActuator, WeedDetector, WindSensor};
pub use mission::{DetectionFilter, MissionController, MissionSettings};
pub use report::{MissionReport, WaypointReport, WaypointStatus};
pub use sequencer::{CycleOutcome, CycleReport, SpraySequencer, SpraySettings, SprayState};
pub use waypoint::{GeoPoint, Waypoint, Waypoints};

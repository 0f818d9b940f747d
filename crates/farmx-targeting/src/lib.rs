#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library mapping weed detections onto a spray grid."]
#![doc = ""]
#![doc = "This crate provides the data model shared by the sprayer, the pixel-to-grid"]
#![doc = "mapping, wind drift compensation and the grid-to-servo angle conversion."]

extern crate alloc;

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub mod grid;
pub mod servo;
pub mod wind;

pub use error::TargetingError;
pub use grid::GridMapper;
pub use servo::{ServoAngleMapper, ServoLimits};
pub use wind::{DriftModel, LinearDrift, WindCompensator};

/// Side length of the logical spray grid used by the sprayer hardware.
pub const DEFAULT_GRID_SIZE: u32 = 256;

/// A detection box in pixel space, centered on `(x_center, y_center)`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Horizontal center of the box (px).
    pub x_center: f64,
    /// Vertical center of the box (px).
    pub y_center: f64,
    /// Box width (px).
    pub width: f64,
    /// Box height (px).
    pub height: f64,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
    /// Detector class index.
    pub class_id: u32,
}

impl BoundingBox {
    /// Construct a box from its center and size.
    ///
    /// Confidence defaults to `1.0` and class to `0`; use
    /// [`BoundingBox::with_detection`] to attach the detector's values.
    pub const fn new(x_center: f64, y_center: f64, width: f64, height: f64) -> Self {
        BoundingBox {
            x_center,
            y_center,
            width,
            height,
            confidence: 1.0,
            class_id: 0,
        }
    }

    /// Construct a box from its corner coordinates `(x1, y1)`-`(x2, y2)`.
    ///
    /// Corners may be given in any order.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let (left, right) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (top, bottom) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        BoundingBox::new(
            (left + right) / 2.0,
            (top + bottom) / 2.0,
            right - left,
            bottom - top,
        )
    }

    /// Attach the detector's confidence and class to this box.
    pub const fn with_detection(mut self, confidence: f32, class_id: u32) -> Self {
        self.confidence = confidence;
        self.class_id = class_id;
        self
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bbox(center: ({:.1}, {:.1}) px, size: {:.1}x{:.1} px, class {} @ {:.2})",
            self.x_center, self.y_center, self.width, self.height, self.class_id, self.confidence
        )
    }
}

/// Pixel dimensions of the frame a set of detections was produced from.
///
/// A [`GridCell`] only has meaning relative to the frame that produced it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    /// Frame width (px).
    pub width: u32,
    /// Frame height (px).
    pub height: u32,
}

impl FrameSize {
    /// Construct a frame size.
    pub const fn new(width: u32, height: u32) -> Self {
        FrameSize { width, height }
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A discrete spray-target location on the logical grid.
///
/// Cells produced by this crate are always clamped into `[0, grid_size - 1]`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GridCell {
    /// Column index.
    pub x: u32,
    /// Row index.
    pub y: u32,
}

impl GridCell {
    /// Construct a grid cell.
    pub const fn new(x: u32, y: u32) -> Self {
        GridCell { x, y }
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Wind observation for a single targeting cycle.
///
/// Direction follows the meteorological convention: the bearing the wind
/// blows *from*, 0° = North, 90° = East.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindVector {
    /// Wind speed (m/s), non-negative.
    pub speed_mps: f64,
    /// Direction the wind blows from (degrees).
    pub direction_deg: f64,
}

impl WindVector {
    /// Construct a wind vector.
    pub const fn new(speed_mps: f64, direction_deg: f64) -> Self {
        WindVector {
            speed_mps,
            direction_deg,
        }
    }

    /// Still air.
    pub const fn calm() -> Self {
        WindVector::new(0.0, 0.0)
    }
}

impl fmt::Display for WindVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} m/s from {:.0}°", self.speed_mps, self.direction_deg)
    }
}

/// Pan/tilt command for the two-axis nozzle gimbal.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ServoAngles {
    /// Pan angle (degrees).
    pub pan_deg: f64,
    /// Tilt angle (degrees).
    pub tilt_deg: f64,
}

impl ServoAngles {
    /// Construct a pan/tilt pair.
    pub const fn new(pan_deg: f64, tilt_deg: f64) -> Self {
        ServoAngles { pan_deg, tilt_deg }
    }
}

impl fmt::Display for ServoAngles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(pan: {:.2}°, tilt: {:.2}°)", self.pan_deg, self.tilt_deg)
    }
}

//! Grid cells to pan/tilt commands for the two-axis nozzle gimbal.

use core::fmt;

use libm::round;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{DEFAULT_GRID_SIZE, GridCell, ServoAngles, TargetingError};

/// Mechanical travel of the gimbal, in degrees. Fixed per device.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoLimits {
    /// Pan angle at grid column 0.
    pub pan_min: f64,
    /// Pan angle at the last grid column.
    pub pan_max: f64,
    /// Tilt angle at grid row 0.
    pub tilt_min: f64,
    /// Tilt angle at the last grid row.
    pub tilt_max: f64,
}

impl ServoLimits {
    /// Construct servo limits.
    ///
    /// # Errors
    ///
    /// Returns `Err(TargetingError::InvalidInput)` if a bound is not finite or
    /// a range is inverted.
    pub fn new(pan_min: f64, pan_max: f64, tilt_min: f64, tilt_max: f64) -> Result<Self, TargetingError> {
        let limits = ServoLimits {
            pan_min,
            pan_max,
            tilt_min,
            tilt_max,
        };
        limits.validate()?;
        Ok(limits)
    }

    /// Checks that both ranges are finite and ordered.
    ///
    /// # Errors
    ///
    /// Returns `Err(TargetingError::InvalidInput)` describing the first bad range.
    pub fn validate(&self) -> Result<(), TargetingError> {
        let all_finite = [self.pan_min, self.pan_max, self.tilt_min, self.tilt_max]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(TargetingError::InvalidInput("servo limits must be finite"));
        }
        if self.pan_min > self.pan_max {
            return Err(TargetingError::InvalidInput("pan_min must not exceed pan_max"));
        }
        if self.tilt_min > self.tilt_max {
            return Err(TargetingError::InvalidInput("tilt_min must not exceed tilt_max"));
        }
        Ok(())
    }
}

impl Default for ServoLimits {
    // Tilt starts at 30° so the nozzle clears the airframe
    fn default() -> Self {
        ServoLimits {
            pan_min: 0.0,
            pan_max: 180.0,
            tilt_min: 30.0,
            tilt_max: 150.0,
        }
    }
}

impl fmt::Display for ServoLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pan [{:.1}°, {:.1}°], tilt [{:.1}°, {:.1}°]",
            self.pan_min, self.pan_max, self.tilt_min, self.tilt_max
        )
    }
}

/// Linear interpolation from grid cells to gimbal angles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoAngleMapper {
    grid_size: u32,
    limits: ServoLimits,
}

impl ServoAngleMapper {
    /// Creates a mapper for a `grid_size` grid driving a gimbal with `limits`.
    ///
    /// # Errors
    ///
    /// Returns `Err(TargetingError::InvalidInput)` if `grid_size` is zero or the
    /// limits are invalid.
    pub fn new(grid_size: u32, limits: ServoLimits) -> Result<Self, TargetingError> {
        if grid_size == 0 {
            return Err(TargetingError::InvalidInput("grid size must be positive"));
        }
        limits.validate()?;
        Ok(ServoAngleMapper { grid_size, limits })
    }

    /// Returns the number of cells per grid side.
    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    /// Returns the gimbal limits.
    pub fn limits(&self) -> ServoLimits {
        self.limits
    }

    /// Converts `cell` into a pan/tilt pair rounded to two decimal places.
    ///
    /// Column 0 / row 0 map to the minimum angles and the last column / row to
    /// the maximum angles. Cells past the grid edge are treated as the edge.
    /// A single-cell grid has no span to interpolate over and always yields the
    /// middle of each range.
    pub fn to_servo_angles(&self, cell: GridCell) -> ServoAngles {
        let l = &self.limits;
        if self.grid_size == 1 {
            return ServoAngles {
                pan_deg: round_centi((l.pan_min + l.pan_max) / 2.0),
                tilt_deg: round_centi((l.tilt_min + l.tilt_max) / 2.0),
            };
        }

        let last = self.grid_size - 1;
        let span = last as f64;
        let fx = cell.x.min(last) as f64 / span;
        let fy = cell.y.min(last) as f64 / span;

        ServoAngles {
            pan_deg: round_centi(l.pan_min + fx * (l.pan_max - l.pan_min)),
            tilt_deg: round_centi(l.tilt_min + fy * (l.tilt_max - l.tilt_min)),
        }
    }
}

impl Default for ServoAngleMapper {
    fn default() -> Self {
        ServoAngleMapper {
            grid_size: DEFAULT_GRID_SIZE,
            limits: ServoLimits::default(),
        }
    }
}

fn round_centi(value: f64) -> f64 {
    round(value * 100.0) / 100.0
}

//! Wind drift compensation for spray targets.
//!
//! Spray is aimed upwind of the visual target so the drift carries it onto
//! the weed. How far upwind is decided by a [`DriftModel`]; the compensator
//! only applies the counter-offset and keeps the result on the grid.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::f64::consts::PI;
use core::fmt;

use libm::{cos, sin, trunc};

use crate::{DEFAULT_GRID_SIZE, GridCell, TargetingError, WindVector};

/// Estimates how far, in grid cells, a spray drifts under a given wind.
///
/// Implementations return `(offset_x, offset_y)` in grid units, using the
/// convention that North maps to `+y` and East maps to `+x`.
pub trait DriftModel: fmt::Debug {
    /// Drift of a spray released under `wind`.
    fn drift(&self, wind: &WindVector) -> (f64, f64);
}

/// Linear drift: `speed * compensation_factor` cells along the wind bearing.
///
/// The factor is a calibration knob, not a physically derived constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearDrift {
    compensation_factor: f64,
}

impl LinearDrift {
    /// Cells of drift per m/s of wind used when no calibration is available.
    pub const DEFAULT_COMPENSATION_FACTOR: f64 = 0.8;

    /// Creates a linear drift model.
    ///
    /// # Errors
    ///
    /// Returns `Err(TargetingError::InvalidInput)` if the factor is negative or
    /// not finite.
    pub fn new(compensation_factor: f64) -> Result<Self, TargetingError> {
        if !compensation_factor.is_finite() || compensation_factor < 0.0 {
            return Err(TargetingError::InvalidInput(
                "compensation factor must be finite and non-negative",
            ));
        }
        Ok(LinearDrift { compensation_factor })
    }

    /// Returns the calibration factor.
    pub fn compensation_factor(&self) -> f64 {
        self.compensation_factor
    }
}

impl Default for LinearDrift {
    fn default() -> Self {
        LinearDrift {
            compensation_factor: Self::DEFAULT_COMPENSATION_FACTOR,
        }
    }
}

impl DriftModel for LinearDrift {
    fn drift(&self, wind: &WindVector) -> (f64, f64) {
        let theta = wind.direction_deg * (PI / 180.0);
        let offset = wind.speed_mps * self.compensation_factor;
        (offset * sin(theta), offset * cos(theta))
    }
}

/// Shifts grid cells against the wind so the spray lands on target.
#[derive(Debug)]
pub struct WindCompensator {
    grid_size: u32,
    model: Box<dyn DriftModel + Send + Sync>,
}

impl WindCompensator {
    /// Creates a compensator using the default [`LinearDrift`] model.
    ///
    /// # Errors
    ///
    /// Returns `Err(TargetingError::InvalidInput)` if `grid_size` is zero.
    pub fn new(grid_size: u32) -> Result<Self, TargetingError> {
        Self::with_model(grid_size, LinearDrift::default())
    }

    /// Creates a compensator around a custom drift model.
    ///
    /// # Errors
    ///
    /// Returns `Err(TargetingError::InvalidInput)` if `grid_size` is zero.
    pub fn with_model<M>(grid_size: u32, model: M) -> Result<Self, TargetingError>
    where
        M: DriftModel + Send + Sync + 'static,
    {
        if grid_size == 0 {
            return Err(TargetingError::InvalidInput("grid size must be positive"));
        }
        Ok(WindCompensator {
            grid_size,
            model: Box::new(model),
        })
    }

    /// Returns the number of cells per grid side.
    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    /// Applies the counter-offset for `wind` to `cell`.
    ///
    /// The shifted position is truncated toward zero and then clamped into the
    /// grid, so any wind magnitude yields a valid cell. Calm air is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Err(TargetingError::InvalidInput)` if the wind speed is negative
    /// or any wind component (or the model's drift) is not finite.
    pub fn compensate(&self, cell: GridCell, wind: &WindVector) -> Result<GridCell, TargetingError> {
        if !wind.speed_mps.is_finite() || wind.speed_mps < 0.0 {
            return Err(TargetingError::InvalidInput(
                "wind speed must be finite and non-negative",
            ));
        }
        if !wind.direction_deg.is_finite() {
            return Err(TargetingError::InvalidInput("wind direction must be finite"));
        }

        let (offset_x, offset_y) = self.model.drift(wind);
        if !offset_x.is_finite() || !offset_y.is_finite() {
            return Err(TargetingError::InvalidInput("drift model produced a non-finite offset"));
        }

        Ok(GridCell {
            x: self.shift(cell.x, offset_x),
            y: self.shift(cell.y, offset_y),
        })
    }

    /// Applies the same wind to every cell, preserving order.
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`WindCompensator::compensate`].
    pub fn compensate_all(
        &self,
        cells: &[GridCell],
        wind: &WindVector,
    ) -> Result<Vec<GridCell>, TargetingError> {
        cells.iter().map(|cell| self.compensate(*cell, wind)).collect()
    }

    fn shift(&self, index: u32, offset: f64) -> u32 {
        let shifted = trunc(index as f64 - offset);
        shifted.clamp(0.0, (self.grid_size - 1) as f64) as u32
    }
}

impl Default for WindCompensator {
    fn default() -> Self {
        WindCompensator {
            grid_size: DEFAULT_GRID_SIZE,
            model: Box::new(LinearDrift::default()),
        }
    }
}

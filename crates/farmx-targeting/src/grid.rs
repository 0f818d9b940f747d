//! Pixel-space detections to logical grid cells.
//!
//! The grid is overlaid on the source frame, so the mapping is relative to the
//! frame dimensions the detections came from, never absolute.

use alloc::vec::Vec;

use libm::floor;

use crate::{BoundingBox, DEFAULT_GRID_SIZE, FrameSize, GridCell, TargetingError};

/// Maps bounding box centers onto a square grid of `grid_size` cells per side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMapper {
    grid_size: u32,
}

impl GridMapper {
    /// Creates a new mapper for a grid of `grid_size` x `grid_size` cells.
    ///
    /// # Errors
    ///
    /// Returns `Err(TargetingError::InvalidInput)` if `grid_size` is zero.
    pub const fn new(grid_size: u32) -> Result<Self, TargetingError> {
        if grid_size == 0 {
            return Err(TargetingError::InvalidInput("grid size must be positive"));
        }
        Ok(GridMapper { grid_size })
    }

    /// Returns the number of cells per grid side.
    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    /// Maps the center of `bbox` to the grid cell that contains it.
    ///
    /// The normalized center is scaled by the grid size and floored, then
    /// clamped so that detections on (or numerically past) the frame edge still
    /// land in the last row/column.
    ///
    /// # Errors
    ///
    /// Returns `Err(TargetingError::InvalidInput)` if either frame dimension is
    /// zero, the box center is not a finite number, or the box has no positive
    /// width and height.
    pub fn map_to_grid(&self, bbox: &BoundingBox, frame: FrameSize) -> Result<GridCell, TargetingError> {
        if frame.width == 0 {
            return Err(TargetingError::InvalidInput("image width must be positive"));
        }
        if frame.height == 0 {
            return Err(TargetingError::InvalidInput("image height must be positive"));
        }
        if !bbox.x_center.is_finite() || !bbox.y_center.is_finite() {
            return Err(TargetingError::InvalidInput("bounding box center must be finite"));
        }
        if !(bbox.width > 0.0 && bbox.height > 0.0) {
            return Err(TargetingError::InvalidInput("bounding box size must be positive"));
        }

        Ok(GridCell {
            x: self.axis_index(bbox.x_center, frame.width),
            y: self.axis_index(bbox.y_center, frame.height),
        })
    }

    /// Maps every detection in `boxes`, preserving input order.
    ///
    /// No deduplication happens here; two boxes in the same cell yield the same
    /// cell twice.
    ///
    /// # Errors
    ///
    /// Fails on the first box that [`GridMapper::map_to_grid`] rejects.
    pub fn map_detections(
        &self,
        boxes: &[BoundingBox],
        frame: FrameSize,
    ) -> Result<Vec<GridCell>, TargetingError> {
        boxes.iter().map(|bbox| self.map_to_grid(bbox, frame)).collect()
    }

    fn axis_index(&self, center_px: f64, extent_px: u32) -> u32 {
        let normalized = center_px / extent_px as f64;
        let index = floor(normalized * self.grid_size as f64);
        index.clamp(0.0, (self.grid_size - 1) as f64) as u32
    }
}

impl Default for GridMapper {
    fn default() -> Self {
        GridMapper {
            grid_size: DEFAULT_GRID_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: FrameSize = FrameSize::new(640, 480);

    #[test]
    fn test_constructor_rejects_zero_grid() {
        assert!(matches!(
            GridMapper::new(0),
            Err(TargetingError::InvalidInput("grid size must be positive"))
        ));
        assert_eq!(GridMapper::new(16).unwrap().grid_size(), 16);
        assert_eq!(GridMapper::default().grid_size(), 256);
    }

    #[test]
    fn test_frame_center_maps_to_grid_center() {
        let mapper = GridMapper::default();
        let cell = mapper
            .map_to_grid(&BoundingBox::new(320.0, 240.0, 50.0, 60.0), FRAME)
            .unwrap();
        assert_eq!(cell, GridCell::new(128, 128));
    }

    #[test]
    fn test_frame_edges_stay_in_range() {
        let mapper = GridMapper::default();

        let origin = mapper.map_to_grid(&BoundingBox::new(0.0, 0.0, 4.0, 4.0), FRAME).unwrap();
        assert_eq!(origin, GridCell::new(0, 0));

        // Last pixel column/row: 639/640 * 256 = 255.6 -> 255
        let last = mapper.map_to_grid(&BoundingBox::new(639.0, 479.0, 4.0, 4.0), FRAME).unwrap();
        assert_eq!(last, GridCell::new(255, 255));

        // Exactly on the far edge would floor to 256 without the clamp
        let edge = mapper.map_to_grid(&BoundingBox::new(640.0, 480.0, 4.0, 4.0), FRAME).unwrap();
        assert_eq!(edge, GridCell::new(255, 255));

        // Centers outside the frame are clamped, not rejected
        let outside = mapper.map_to_grid(&BoundingBox::new(-12.0, 900.0, 4.0, 4.0), FRAME).unwrap();
        assert_eq!(outside, GridCell::new(0, 255));
    }

    #[test]
    fn test_every_pixel_column_maps_in_range() {
        let mapper = GridMapper::default();
        for x in 0..FRAME.width {
            let cell = mapper
                .map_to_grid(&BoundingBox::new(x as f64, 0.0, 1.0, 1.0), FRAME)
                .unwrap();
            assert!(cell.x < 256, "column {} mapped to {}", x, cell.x);
        }
    }

    #[test]
    fn test_zero_sized_frame_rejected() {
        let mapper = GridMapper::default();
        let bbox = BoundingBox::new(10.0, 10.0, 2.0, 2.0);
        assert!(matches!(
            mapper.map_to_grid(&bbox, FrameSize::new(0, 480)),
            Err(TargetingError::InvalidInput("image width must be positive"))
        ));
        assert!(matches!(
            mapper.map_to_grid(&bbox, FrameSize::new(640, 0)),
            Err(TargetingError::InvalidInput("image height must be positive"))
        ));
    }

    #[test]
    fn test_non_finite_center_rejected() {
        let mapper = GridMapper::default();
        let bbox = BoundingBox::new(f64::NAN, 10.0, 2.0, 2.0);
        assert!(mapper.map_to_grid(&bbox, FRAME).is_err());
    }

    #[test]
    fn test_degenerate_box_rejected() {
        let mapper = GridMapper::default();
        for (w, h) in [(0.0, 4.0), (4.0, 0.0), (-4.0, 4.0), (4.0, -1.0), (f64::NAN, 4.0)] {
            let bbox = BoundingBox::new(320.0, 240.0, w, h);
            assert_eq!(
                mapper.map_to_grid(&bbox, FRAME),
                Err(TargetingError::InvalidInput("bounding box size must be positive")),
                "{w}x{h}"
            );
        }
        let boxes = [BoundingBox::new(320.0, 240.0, 50.0, 60.0), BoundingBox::new(10.0, 10.0, 0.0, 0.0)];
        assert!(mapper.map_detections(&boxes, FRAME).is_err());
    }

    #[test]
    fn test_map_detections_preserves_order_and_duplicates() {
        let mapper = GridMapper::default();
        let boxes = [
            BoundingBox::new(320.0, 240.0, 50.0, 60.0),
            BoundingBox::new(100.0, 180.0, 40.0, 40.0),
            BoundingBox::new(321.0, 241.0, 50.0, 60.0),
        ];
        let cells = mapper.map_detections(&boxes, FRAME).unwrap();
        // 100/640*256 = 40, 180/480*256 = 96
        assert_eq!(
            cells,
            vec![GridCell::new(128, 128), GridCell::new(40, 96), GridCell::new(128, 128)]
        );
    }

    #[test]
    fn test_map_detections_empty() {
        let mapper = GridMapper::default();
        assert!(mapper.map_detections(&[], FRAME).unwrap().is_empty());
    }
}

//! Simulated airframe for running missions from the CLI without hardware.
//!
//! Devices share a [`SimBoard`] so the CLI can inspect what the hardware was
//! left doing once the mission ends.

use std::sync::Arc;

use anyhow::{Result, ensure};
use farmx_mission::{
    ActuatorError, Camera, CaptureError, DetectionError, Frame, NavigationError, Navigator, SprayActuator,
    Waypoint, WeedDetector,
};
use farmx_targeting::{BoundingBox, FrameSize, ServoAngles, WindVector};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    pub seed: u64,
    pub max_weeds_per_frame: usize,
    /// Probability that any single actuator command goes unacknowledged.
    pub fault_rate: f64,
    /// Attach a wind sensor at all. Without one, targets are not compensated.
    pub wind_sensor: bool,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl SimSettings {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.fault_rate),
            "sim.fault_rate must be within [0, 1], got {}",
            self.fault_rate
        );
        ensure!(
            self.frame_width > 0 && self.frame_height > 0,
            "sim frame must be non-empty, got {}x{}",
            self.frame_width,
            self.frame_height
        );
        Ok(())
    }

    pub fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.frame_width, self.frame_height)
    }

    pub fn wind(&self) -> WindVector {
        WindVector::new(self.wind_speed, self.wind_direction)
    }
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            seed: 7,
            max_weeds_per_frame: 6,
            fault_rate: 0.0,
            wind_sensor: true,
            wind_speed: 0.0,
            wind_direction: 0.0,
            frame_width: 640,
            frame_height: 480,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimState {
    pub position: Option<(f64, f64, f64)>,
    pub holding: bool,
    pub aim: ServoAngles,
    pub valve_open: bool,
    pub frames: usize,
    pub valve_cycles: usize,
    pub faults: Vec<String>,
}

pub type SimBoard = Arc<RwLock<SimState>>;

pub fn snapshot(board: &SimBoard) -> SimState {
    (*board.read()).clone()
}

pub fn raise_fault(board: &SimBoard, msg: &str) {
    let mut g = board.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}

pub struct SimCamera {
    size: FrameSize,
    board: SimBoard,
}

impl SimCamera {
    pub fn new(size: FrameSize, board: SimBoard) -> Self {
        Self { size, board }
    }
}

impl Camera for SimCamera {
    fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        self.board.write().frames += 1;
        debug!(size = %self.size, "Captured frame");
        Ok(Frame::empty(self.size))
    }
}

/// Scatters random detections over the frame. Most are the weed class.
pub struct SimDetector {
    rng: StdRng,
    max_weeds: usize,
}

impl SimDetector {
    pub fn new(seed: u64, max_weeds: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_weeds,
        }
    }
}

impl WeedDetector for SimDetector {
    fn detect_weeds(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectionError> {
        let (w, h) = (f64::from(frame.size.width), f64::from(frame.size.height));
        let count = self.rng.random_range(0..=self.max_weeds);
        let boxes: Vec<BoundingBox> = (0..count)
            .map(|_| {
                let class_id = if self.rng.random_bool(0.8) { 0 } else { 1 };
                BoundingBox::new(
                    self.rng.random_range(0.0..w),
                    self.rng.random_range(0.0..h),
                    self.rng.random_range(10.0..80.0),
                    self.rng.random_range(10.0..80.0),
                )
                .with_detection(self.rng.random_range(0.3..1.0), class_id)
            })
            .collect();
        debug!(count = boxes.len(), "Detections");
        Ok(boxes)
    }
}

pub struct SimNavigator {
    board: SimBoard,
}

impl SimNavigator {
    pub fn new(board: SimBoard) -> Self {
        Self { board }
    }
}

impl Navigator for SimNavigator {
    fn move_to(&mut self, waypoint: &Waypoint) -> Result<(), NavigationError> {
        let mut g = self.board.write();
        g.position = Some((waypoint.lat, waypoint.lon, waypoint.altitude));
        g.holding = false;
        info!(lat = waypoint.lat, lon = waypoint.lon, alt = waypoint.altitude, "Flying to waypoint");
        Ok(())
    }

    fn hold_position(&mut self) -> Result<(), NavigationError> {
        self.board.write().holding = true;
        debug!("Holding position");
        Ok(())
    }
}

/// Gimbal and valve that drop commands at a configured rate.
pub struct SimActuator {
    rng: StdRng,
    fault_rate: f64,
    board: SimBoard,
}

impl SimActuator {
    pub fn new(seed: u64, fault_rate: f64, board: SimBoard) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            fault_rate,
            board,
        }
    }

    fn acknowledge(&mut self, command: &str) -> Result<(), ActuatorError> {
        if self.fault_rate > 0.0 && self.rng.random_bool(self.fault_rate) {
            warn!(command, "Simulated actuator dropped command");
            raise_fault(&self.board, &format!("{command} dropped"));
            return Err(ActuatorError::Unavailable(format!("{command} not acknowledged")));
        }
        Ok(())
    }
}

impl SprayActuator for SimActuator {
    fn aim(&mut self, angles: ServoAngles) -> Result<(), ActuatorError> {
        self.acknowledge("aim")?;
        self.board.write().aim = angles;
        debug!(%angles, "Gimbal aimed");
        Ok(())
    }

    fn open_valve(&mut self) -> Result<(), ActuatorError> {
        self.acknowledge("open valve")?;
        let mut g = self.board.write();
        g.valve_open = true;
        g.valve_cycles += 1;
        debug!("Valve opened");
        Ok(())
    }

    fn close_valve(&mut self) -> Result<(), ActuatorError> {
        self.acknowledge("close valve")?;
        self.board.write().valve_open = false;
        debug!("Valve closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_is_deterministic_per_seed() {
        let frame = Frame::empty(FrameSize::new(640, 480));
        let mut a = SimDetector::new(42, 8);
        let mut b = SimDetector::new(42, 8);
        for _ in 0..5 {
            assert_eq!(a.detect_weeds(&frame).unwrap(), b.detect_weeds(&frame).unwrap());
        }
    }

    #[test]
    fn test_detections_stay_inside_frame() {
        let frame = Frame::empty(FrameSize::new(320, 240));
        let mut detector = SimDetector::new(1, 10);
        for _ in 0..50 {
            let boxes = detector.detect_weeds(&frame).unwrap();
            assert!(boxes.len() <= 10);
            for b in boxes {
                assert!((0.0..320.0).contains(&b.x_center));
                assert!((0.0..240.0).contains(&b.y_center));
                assert!(b.class_id <= 1);
            }
        }
    }

    #[test]
    fn test_actuator_tracks_valve_on_board() {
        let board = SimBoard::default();
        let mut actuator = SimActuator::new(0, 0.0, board.clone());

        actuator.aim(ServoAngles::new(90.0, 45.0)).unwrap();
        actuator.open_valve().unwrap();
        assert!(snapshot(&board).valve_open);
        actuator.close_valve().unwrap();

        let state = snapshot(&board);
        assert!(!state.valve_open);
        assert_eq!(state.valve_cycles, 1);
        assert_eq!(state.aim, ServoAngles::new(90.0, 45.0));
        assert!(state.faults.is_empty());
    }

    #[test]
    fn test_full_fault_rate_drops_everything() {
        let board = SimBoard::default();
        let mut actuator = SimActuator::new(0, 1.0, board.clone());

        assert!(actuator.aim(ServoAngles::default()).is_err());
        assert!(actuator.aim(ServoAngles::default()).is_err());
        assert!(actuator.open_valve().is_err());

        // Repeated faults are recorded once
        assert_eq!(snapshot(&board).faults, vec!["aim dropped", "open valve dropped"]);
    }

    #[test]
    fn test_navigator_updates_position() {
        let board = SimBoard::default();
        let mut nav = SimNavigator::new(board.clone());
        let waypoint = Waypoint {
            index: 0,
            row: 0,
            col: 0,
            lat: 47.0,
            lon: 8.0,
            altitude: 0.6,
        };

        nav.move_to(&waypoint).unwrap();
        assert!(!snapshot(&board).holding);
        nav.hold_position().unwrap();

        let state = snapshot(&board);
        assert_eq!(state.position, Some((47.0, 8.0, 0.6)));
        assert!(state.holding);
    }

    #[test]
    fn test_settings_validation() {
        assert!(SimSettings::default().validate().is_ok());
        let bad = SimSettings {
            fault_rate: 1.5,
            ..SimSettings::default()
        };
        assert!(bad.validate().is_err());
    }
}

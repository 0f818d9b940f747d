//! Field-coverage mission: fly a raster of waypoints and run one targeting
//! cycle per hover stop.

use std::collections::HashSet;
use std::time::Duration;

use farmx_targeting::{BoundingBox, GridCell, GridMapper, TargetingError, WindCompensator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cancel::{CancelToken, hold};
use crate::coords::CoordinateLog;
use crate::error::WaypointFault;
use crate::hardware::{Camera, Navigator, SprayActuator, WeedDetector, WindSensor};
use crate::report::{MissionReport, WaypointReport, WaypointStatus};
use crate::sequencer::{CycleOutcome, CycleReport, SpraySequencer, delay};
use crate::waypoint::{GeoPoint, Waypoint, generate_waypoints};

/// Lattice geometry and flight timing. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionSettings {
    /// Latitude advance per row (degrees).
    pub lat_step: f64,
    /// Longitude advance per column (degrees).
    pub lon_step: f64,
    /// Hover height above ground (m).
    pub altitude: f64,
    pub travel_delay: f64,
    pub hover_delay: f64,
    /// Camera settle time before capture.
    pub stabilization_delay: f64,
    /// Drop repeated spray targets within one hover stop.
    pub dedupe_targets: bool,
}

impl MissionSettings {
    pub fn validate(&self) -> Result<(), TargetingError> {
        self.timing().map(|_| ())
    }

    fn timing(&self) -> Result<MissionTiming, TargetingError> {
        if !self.lat_step.is_finite() || !self.lon_step.is_finite() {
            return Err(TargetingError::InvalidInput("lattice steps must be finite"));
        }
        if !self.altitude.is_finite() || self.altitude < 0.0 {
            return Err(TargetingError::InvalidInput("altitude must be finite and non-negative"));
        }
        const MSG: &str = "mission delays must be finite, non-negative and in range";
        let hover = delay(self.hover_delay, MSG)?;
        let stabilization = delay(self.stabilization_delay, MSG)?;
        Ok(MissionTiming {
            travel: delay(self.travel_delay, MSG)?,
            settle: hover
                .checked_add(stabilization)
                .ok_or(TargetingError::InvalidInput(MSG))?,
        })
    }
}

/// Validated flight delays.
#[derive(Debug, Clone, Copy)]
struct MissionTiming {
    travel: Duration,
    /// Hover plus stabilization, waited out before capture.
    settle: Duration,
}

impl Default for MissionSettings {
    fn default() -> Self {
        Self {
            lat_step: 0.00001,
            lon_step: 0.00001,
            altitude: 0.6,
            travel_delay: 1.5,
            hover_delay: 1.0,
            stabilization_delay: 2.0,
            dedupe_targets: true,
        }
    }
}

/// Keeps confident detections of the weed class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionFilter {
    pub min_confidence: f32,
    pub weed_class: u32,
}

impl DetectionFilter {
    pub fn keeps(&self, bbox: &BoundingBox) -> bool {
        bbox.class_id == self.weed_class && bbox.confidence >= self.min_confidence
    }

    pub fn apply(&self, detections: Vec<BoundingBox>) -> Vec<BoundingBox> {
        detections.into_iter().filter(|b| self.keeps(b)).collect()
    }
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self {
            min_confidence: 0.58,
            weed_class: 0,
        }
    }
}

/// Keep the first occurrence of every cell, preserving order.
pub fn dedupe_targets(cells: Vec<GridCell>) -> Vec<GridCell> {
    let mut seen = HashSet::with_capacity(cells.len());
    cells.into_iter().filter(|cell| seen.insert(*cell)).collect()
}

/// Drives the drone over the field and sprays at every stop.
pub struct MissionController<C, D, N, A> {
    camera: C,
    detector: D,
    navigator: N,
    wind_sensor: Option<Box<dyn WindSensor>>,
    grid: GridMapper,
    compensator: WindCompensator,
    filter: DetectionFilter,
    sequencer: SpraySequencer<A>,
    settings: MissionSettings,
    timing: MissionTiming,
    coords: Option<CoordinateLog>,
}

impl<C, D, N, A> MissionController<C, D, N, A>
where
    C: Camera,
    D: WeedDetector,
    N: Navigator,
    A: SprayActuator,
{
    /// The grid resolution follows the sequencer's servo mapping. Wind
    /// compensation uses the default linear drift model until replaced.
    pub fn new(
        camera: C,
        detector: D,
        navigator: N,
        sequencer: SpraySequencer<A>,
        settings: MissionSettings,
    ) -> Result<Self, TargetingError> {
        let timing = settings.timing()?;
        let grid_size = sequencer.servo().grid_size();
        Ok(Self {
            camera,
            detector,
            navigator,
            wind_sensor: None,
            grid: GridMapper::new(grid_size)?,
            compensator: WindCompensator::new(grid_size)?,
            filter: DetectionFilter::default(),
            sequencer,
            settings,
            timing,
            coords: None,
        })
    }

    pub fn with_wind_sensor(mut self, sensor: Box<dyn WindSensor>) -> Self {
        self.wind_sensor = Some(sensor);
        self
    }

    /// Replace the wind compensator, e.g. to plug in another drift model.
    pub fn with_wind_compensator(mut self, compensator: WindCompensator) -> Result<Self, TargetingError> {
        if compensator.grid_size() != self.grid.grid_size() {
            return Err(TargetingError::InvalidInput("wind compensator grid size does not match"));
        }
        self.compensator = compensator;
        Ok(self)
    }

    pub fn with_detection_filter(mut self, filter: DetectionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_coordinate_log(mut self, log: CoordinateLog) -> Self {
        self.coords = Some(log);
        self
    }

    pub fn settings(&self) -> &MissionSettings {
        &self.settings
    }

    /// Visit every waypoint of a `field_length` x `field_width` lattice.
    ///
    /// Faults at one waypoint are recorded and the mission moves on. The
    /// mission stops early only on cancellation, which is checked before each
    /// waypoint and interrupts every mechanical delay.
    pub async fn run_mission(
        &mut self,
        start: GeoPoint,
        field_length: u32,
        field_width: u32,
        cancel: &CancelToken,
    ) -> MissionReport {
        let waypoints = generate_waypoints(start, field_length, field_width, &self.settings);
        let planned = waypoints.remaining();
        info!(
            waypoints = planned,
            rows = field_length,
            cols = field_width,
            %start,
            "Mission started"
        );

        let mut report = MissionReport {
            planned: usize::try_from(planned).unwrap_or(usize::MAX),
            ..MissionReport::default()
        };
        for waypoint in waypoints {
            if cancel.is_cancelled() {
                info!(next = waypoint.index, "Mission cancelled");
                report.cancelled = true;
                break;
            }

            let (detections, status) = self.visit(&waypoint, cancel).await;
            match &status {
                WaypointStatus::Sprayed(cycle) => {
                    info!(index = waypoint.index, %cycle, "Waypoint done");
                    if cycle.outcome == CycleOutcome::Cancelled {
                        report.cancelled = true;
                    }
                }
                WaypointStatus::Faulted(fault) => {
                    warn!(index = waypoint.index, %fault, "Waypoint faulted, continuing");
                }
                WaypointStatus::Cancelled => {
                    info!(index = waypoint.index, "Mission cancelled at waypoint");
                    report.cancelled = true;
                }
            }
            report.waypoints.push(WaypointReport {
                waypoint,
                detections,
                status,
            });
            if report.cancelled {
                break;
            }
        }

        info!(
            completed = report.completed_waypoints(),
            planned = report.planned,
            sprayed = report.total_sprayed(),
            actuator_faults = report.total_actuator_faults(),
            cancelled = report.cancelled,
            "Mission finished"
        );
        report
    }

    async fn visit(&mut self, waypoint: &Waypoint, cancel: &CancelToken) -> (usize, WaypointStatus) {
        info!(%waypoint, "Moving to waypoint");
        if let Err(e) = self.navigator.move_to(waypoint) {
            return (0, WaypointStatus::Faulted(e.into()));
        }
        if hold(self.timing.travel, cancel).await.is_err() {
            return (0, WaypointStatus::Cancelled);
        }

        if let Err(e) = self.navigator.hold_position() {
            return (0, WaypointStatus::Faulted(e.into()));
        }
        if hold(self.timing.settle, cancel).await.is_err() {
            return (0, WaypointStatus::Cancelled);
        }

        let mut detections = 0;
        match self.targeting_cycle(waypoint, &mut detections, cancel).await {
            Ok(cycle) => (detections, WaypointStatus::Sprayed(cycle)),
            Err(fault) => (detections, WaypointStatus::Faulted(fault)),
        }
    }

    /// capture -> detect -> filter -> grid -> wind -> dedupe -> spray
    async fn targeting_cycle(
        &mut self,
        waypoint: &Waypoint,
        detections: &mut usize,
        cancel: &CancelToken,
    ) -> Result<CycleReport, WaypointFault> {
        let frame = self.camera.capture_frame()?;
        let boxes = self.detector.detect_weeds(&frame)?;
        *detections = boxes.len();

        let weeds = self.filter.apply(boxes);
        debug!(
            detections = *detections,
            weeds = weeds.len(),
            frame = %frame.size,
            "Filtered detections"
        );
        let cells = self.grid.map_detections(&weeds, frame.size)?;

        let mut targets = match self.wind_sensor.as_mut() {
            Some(sensor) => {
                let wind = sensor.read_wind()?;
                debug!(%wind, "Compensating for wind");
                self.compensator.compensate_all(&cells, &wind)?
            }
            None => cells,
        };
        if self.settings.dedupe_targets {
            let before = targets.len();
            targets = dedupe_targets(targets);
            if targets.len() < before {
                debug!(removed = before - targets.len(), "Dropped duplicate targets");
            }
        }

        let cycle = self.sequencer.execute_cycle(&targets, cancel).await;

        if let Some(log) = &self.coords {
            if !cycle.sprayed.is_empty() {
                if let Err(e) = log.write_cycle(waypoint.index, &cycle.sprayed) {
                    warn!(error = %e, index = waypoint.index, "Failed to write coordinate list");
                }
            }
        }
        Ok(cycle)
    }
}

//! Per-waypoint and whole-mission outcome reports.

use std::fmt;

use crate::error::{ActuatorFault, WaypointFault};
use crate::sequencer::{CycleOutcome, CycleReport};
use crate::waypoint::Waypoint;

#[derive(Debug, Clone, PartialEq)]
pub enum WaypointStatus {
    /// The targeting cycle ran (possibly with zero targets or actuator faults).
    Sprayed(CycleReport),
    /// A collaborator fault prevented the targeting cycle.
    Faulted(WaypointFault),
    /// Cancellation arrived before or during this waypoint.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaypointReport {
    pub waypoint: Waypoint,
    /// Detections the model returned, before filtering.
    pub detections: usize,
    pub status: WaypointStatus,
}

impl WaypointReport {
    pub fn cycle(&self) -> Option<&CycleReport> {
        match &self.status {
            WaypointStatus::Sprayed(cycle) => Some(cycle),
            _ => None,
        }
    }

    pub fn sprayed(&self) -> usize {
        self.cycle().map_or(0, CycleReport::sprayed_count)
    }

    pub fn actuator_faults(&self) -> &[ActuatorFault] {
        self.cycle().map(|cycle| cycle.faults.as_slice()).unwrap_or_default()
    }
}

impl fmt::Display for WaypointReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "waypoint {}: ", self.waypoint)?;
        match &self.status {
            WaypointStatus::Sprayed(cycle) => write!(f, "{} detections, {}", self.detections, cycle),
            WaypointStatus::Faulted(fault) => write!(f, "faulted ({fault})"),
            WaypointStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Aggregate outcome of [`crate::MissionController::run_mission`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MissionReport {
    /// Waypoints generated for the field.
    pub planned: usize,
    /// One entry per waypoint reached, in visiting order.
    pub waypoints: Vec<WaypointReport>,
    pub cancelled: bool,
}

impl MissionReport {
    pub fn total_waypoints(&self) -> usize {
        self.planned
    }

    /// Waypoints whose targeting cycle ran to completion.
    pub fn completed_waypoints(&self) -> usize {
        self.waypoints
            .iter()
            .filter(|w| matches!(&w.status, WaypointStatus::Sprayed(c) if c.outcome != CycleOutcome::Cancelled))
            .count()
    }

    pub fn total_sprayed(&self) -> usize {
        self.waypoints.iter().map(WaypointReport::sprayed).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.waypoints.iter().filter_map(WaypointReport::cycle).map(|c| c.skipped).sum()
    }

    pub fn total_truncated(&self) -> usize {
        self.waypoints.iter().filter_map(WaypointReport::cycle).map(|c| c.truncated).sum()
    }

    pub fn total_actuator_faults(&self) -> usize {
        self.waypoints.iter().map(|w| w.actuator_faults().len()).sum()
    }

    pub fn waypoint_faults(&self) -> impl Iterator<Item = (&Waypoint, &WaypointFault)> {
        self.waypoints.iter().filter_map(|w| match &w.status {
            WaypointStatus::Faulted(fault) => Some((&w.waypoint, fault)),
            _ => None,
        })
    }

    pub fn actuator_faults(&self) -> impl Iterator<Item = (&Waypoint, &ActuatorFault)> {
        self.waypoints
            .iter()
            .flat_map(|w| w.actuator_faults().iter().map(move |fault| (&w.waypoint, fault)))
    }

    /// Every waypoint visited and no target left unsprayed by an actuator fault.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.total_actuator_faults() == 0
    }
}

impl fmt::Display for MissionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mission report")?;
        writeln!(
            f,
            "  waypoints:       {}/{} completed{}",
            self.completed_waypoints(),
            self.planned,
            if self.cancelled { " (cancelled)" } else { "" }
        )?;
        writeln!(f, "  targets sprayed: {}", self.total_sprayed())?;
        writeln!(f, "  targets skipped: {}", self.total_skipped())?;
        if self.total_truncated() > 0 {
            writeln!(f, "  truncated:       {}", self.total_truncated())?;
        }
        writeln!(f, "  actuator faults: {}", self.total_actuator_faults())?;
        for (waypoint, fault) in self.actuator_faults() {
            writeln!(f, "    waypoint #{}: {}", waypoint.index, fault)?;
        }
        let faulted: Vec<_> = self.waypoint_faults().collect();
        writeln!(f, "  waypoint faults: {}", faulted.len())?;
        for (waypoint, fault) in faulted {
            writeln!(f, "    waypoint #{}: {}", waypoint.index, fault)?;
        }
        Ok(())
    }
}

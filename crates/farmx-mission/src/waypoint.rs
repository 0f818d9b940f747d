//! Synthetic field lattice.
//!
//! Positions are flat latitude/longitude offsets from a start point; there is
//! no geodesy here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::mission::MissionSettings;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseGeoPointError(String);

impl fmt::Display for ParseGeoPointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected LAT,LON in decimal degrees: {}", self.0)
    }
}

impl std::error::Error for ParseGeoPointError {}

impl FromStr for GeoPoint {
    type Err = ParseGeoPointError;

    /// Parses `"lat,lon"`, e.g. `"47.3769,8.5417"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| ParseGeoPointError(format!("missing ',' in {s:?}")))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ParseGeoPointError(format!("bad coordinate {part:?}")))
        };
        let point = GeoPoint::new(parse(lat)?, parse(lon)?);
        if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lon) {
            return Err(ParseGeoPointError(format!("{point} is out of range")));
        }
        Ok(point)
    }
}

/// One hover stop of the coverage mission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Position in visiting order, starting at 0.
    pub index: usize,
    pub row: u32,
    pub col: u32,
    pub lat: f64,
    pub lon: f64,
    /// Meters above ground.
    pub altitude: f64,
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{},{}] ({:.6}, {:.6}) @ {:.2} m",
            self.index, self.row, self.col, self.lat, self.lon, self.altitude
        )
    }
}

/// Lay out `field_length` rows of `field_width` stops, row-major and always
/// left-to-right.
///
/// Each row advances latitude by one `lat_step`; the longitude restarts from
/// `start.lon` at the beginning of every row and advances by `lon_step` per
/// column. A zero dimension yields an empty mission. Stops are produced on
/// demand, so field size does not bound memory.
pub fn generate_waypoints(
    start: GeoPoint,
    field_length: u32,
    field_width: u32,
    settings: &MissionSettings,
) -> Waypoints {
    Waypoints {
        start,
        lat_step: settings.lat_step,
        lon_step: settings.lon_step,
        altitude: settings.altitude,
        width: field_width,
        next: 0,
        total: u64::from(field_length) * u64::from(field_width),
    }
}

/// Lazy raster over the field; see [`generate_waypoints`].
#[derive(Debug, Clone)]
pub struct Waypoints {
    start: GeoPoint,
    lat_step: f64,
    lon_step: f64,
    altitude: f64,
    width: u32,
    next: u64,
    total: u64,
}

impl Waypoints {
    /// Stops not yet produced.
    pub fn remaining(&self) -> u64 {
        self.total - self.next
    }
}

impl Iterator for Waypoints {
    type Item = Waypoint;

    fn next(&mut self) -> Option<Waypoint> {
        if self.next >= self.total {
            return None;
        }
        let index = usize::try_from(self.next).ok()?;
        let width = u64::from(self.width);
        // Both fit: row < field_length and col < field_width
        let row = (self.next / width) as u32;
        let col = (self.next % width) as u32;
        self.next += 1;
        Some(Waypoint {
            index,
            row,
            col,
            lat: self.start.lat + f64::from(row) * self.lat_step,
            lon: self.start.lon + f64::from(col) * self.lon_step,
            altitude: self.altitude,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining()) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }

    fn nth(&mut self, n: usize) -> Option<Waypoint> {
        self.next = self.next.saturating_add(n as u64).min(self.total);
        self.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_by_three_row_major() {
        let settings = MissionSettings::default();
        let start = GeoPoint::new(47.0, 8.0);
        let waypoints: Vec<Waypoint> = generate_waypoints(start, 3, 3, &settings).collect();

        assert_eq!(waypoints.len(), 9);
        let order: Vec<(u32, u32)> = waypoints.iter().map(|w| (w.row, w.col)).collect();
        assert_eq!(
            order,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2), (2, 0), (2, 1), (2, 2)]
        );
        for (i, w) in waypoints.iter().enumerate() {
            assert_eq!(w.index, i);
            assert_eq!(w.altitude, settings.altitude);
        }

        // No two stops share a position
        for (i, a) in waypoints.iter().enumerate() {
            for b in &waypoints[i + 1..] {
                assert!(a.lat != b.lat || a.lon != b.lon, "{a} duplicates {b}");
            }
        }
    }

    #[test]
    fn test_longitude_resets_each_row() {
        let settings = MissionSettings::default();
        let start = GeoPoint::new(10.0, 20.0);
        let waypoints: Vec<Waypoint> = generate_waypoints(start, 2, 3, &settings).collect();

        assert_eq!(waypoints[0].lon, 20.0);
        assert_eq!(waypoints[3].lon, 20.0);
        assert_eq!(waypoints[2].lon, waypoints[5].lon);
        assert_eq!(waypoints[0].lat, waypoints[2].lat);
        assert_eq!(waypoints[3].lat, 10.0 + settings.lat_step);
    }

    #[test]
    fn test_empty_field() {
        let settings = MissionSettings::default();
        assert_eq!(generate_waypoints(GeoPoint::default(), 0, 5, &settings).next(), None);
        assert_eq!(generate_waypoints(GeoPoint::default(), 5, 0, &settings).next(), None);
        assert_eq!(generate_waypoints(GeoPoint::default(), 0, u32::MAX, &settings).remaining(), 0);
    }

    #[test]
    fn test_huge_field_is_generated_lazily() {
        let settings = MissionSettings::default();
        let start = GeoPoint::new(47.0, 8.0);
        let mut waypoints = generate_waypoints(start, 100_000, 100_000, &settings);
        assert_eq!(waypoints.remaining(), 10_000_000_000);

        let first = waypoints.next().unwrap();
        assert_eq!((first.index, first.row, first.col), (0, 0, 0));
        assert_eq!((first.lat, first.lon), (47.0, 8.0));

        // Skip ahead to the first stop of row 3
        let w = waypoints.nth(299_999).unwrap();
        assert_eq!((w.index, w.row, w.col), (300_000, 3, 0));
        assert_eq!(w.lon, 8.0);
        assert_eq!(waypoints.remaining(), 10_000_000_000 - 300_001);
    }

    #[test]
    fn test_size_hint_is_exact() {
        let settings = MissionSettings::default();
        let mut waypoints = generate_waypoints(GeoPoint::default(), 2, 3, &settings);
        assert_eq!(waypoints.size_hint(), (6, Some(6)));
        waypoints.next();
        assert_eq!(waypoints.size_hint(), (5, Some(5)));
        assert_eq!(waypoints.nth(10), None);
        assert_eq!(waypoints.remaining(), 0);
    }

    #[test]
    fn test_parse_geo_point() {
        assert_eq!("47.5, 8.25".parse::<GeoPoint>(), Ok(GeoPoint::new(47.5, 8.25)));
        assert_eq!("-33.9,-70.6".parse::<GeoPoint>(), Ok(GeoPoint::new(-33.9, -70.6)));
        assert!("47.5".parse::<GeoPoint>().is_err());
        assert!("north,8".parse::<GeoPoint>().is_err());
        assert!("91,8".parse::<GeoPoint>().is_err());
        assert!("NaN,8".parse::<GeoPoint>().is_err());
    }
}

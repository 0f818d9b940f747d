//! Plain-text log of sprayed grid coordinates, one file per waypoint.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use farmx_targeting::GridCell;
use tracing::debug;

/// Writes `x,y` lines for every target sprayed at a waypoint.
#[derive(Debug, Clone)]
pub struct CoordinateLog {
    dir: PathBuf,
}

impl CoordinateLog {
    /// Creates `dir` if it does not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, waypoint_index: usize) -> PathBuf {
        self.dir.join(format!("waypoint_{waypoint_index:04}_coords.txt"))
    }

    /// Write the targets sprayed at one waypoint, replacing any earlier file.
    pub fn write_cycle(&self, waypoint_index: usize, sprayed: &[GridCell]) -> io::Result<PathBuf> {
        let path = self.path_for(waypoint_index);
        let mut out = BufWriter::new(File::create(&path)?);
        write_coordinates(&mut out, sprayed)?;
        out.flush()?;
        debug!(path = %path.display(), targets = sprayed.len(), "Wrote coordinate list");
        Ok(path)
    }
}

/// Emit one `x,y\n` line per cell, in order.
pub fn write_coordinates<W: Write>(out: &mut W, cells: &[GridCell]) -> io::Result<()> {
    for cell in cells {
        writeln!(out, "{},{}", cell.x, cell.y)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_coordinates_format() {
        let mut buf = Vec::new();
        write_coordinates(&mut buf, &[GridCell::new(125, 128), GridCell::new(0, 255)]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "125,128\n0,255\n");
    }

    #[test]
    fn test_write_cycle_creates_numbered_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log = CoordinateLog::new(tmp.path().join("coords")).unwrap();

        let path = log.write_cycle(7, &[GridCell::new(3, 4)]).unwrap();

        assert_eq!(path.file_name().unwrap(), "waypoint_0007_coords.txt");
        assert_eq!(fs::read_to_string(&path).unwrap(), "3,4\n");
    }

    #[test]
    fn test_write_cycle_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let log = CoordinateLog::new(tmp.path()).unwrap();

        log.write_cycle(0, &[GridCell::new(1, 1), GridCell::new(2, 2)]).unwrap();
        let path = log.write_cycle(0, &[GridCell::new(9, 9)]).unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "9,9\n");
    }
}

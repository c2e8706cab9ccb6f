use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::passes::PositionSample;
use crate::utils::safe_filename;

/// Files holding the commanded and the reported antenna path of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassLogs {
    pub intended: PathBuf,
    pub actual: PathBuf,
}

impl PassLogs {
    /// `<YYYYmmddTHHMMSS>-<name>-intended.log` and `...-actual.log` in `dir`.
    pub fn new(dir: &Path, started: DateTime<Utc>, satellite: &str) -> Self {
        let prefix = format!(
            "{}-{}",
            started.format("%Y%m%dT%H%M%S"),
            safe_filename(satellite, '_')
        );
        Self {
            intended: dir.join(format!("{prefix}-intended.log")),
            actual: dir.join(format!("{prefix}-actual.log")),
        }
    }

    pub fn write(&self, intended: &[PositionSample], actual: &[PositionSample]) -> io::Result<()> {
        write_positions(&self.intended, intended)?;
        write_positions(&self.actual, actual)
    }
}

pub fn format_position(sample: &PositionSample) -> String {
    format!(
        "{}, {:.1}, {:.1}",
        sample.timestamp.to_rfc3339(),
        sample.azimuth_deg,
        sample.elevation_deg
    )
}

/// One line per sample, see [`format_position`]. Parent directories are created.
pub fn write_positions(path: &Path, samples: &[PositionSample]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    for sample in samples {
        writeln!(out, "{}", format_position(sample))?;
    }
    out.flush()?;
    log::info!("Wrote {} positions to {}", samples.len(), path.display());
    Ok(())
}

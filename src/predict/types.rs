use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Earth-fixed (ECEF) satellite position, in kilometers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcefPosition(pub [f64; 3]);

/// A predicted satellite pass over a ground station
#[derive(Debug, Clone, Serialize)]
pub struct Pass {
    pub aos: DateTime<Utc>,
    pub los: DateTime<Utc>,
    pub max_elevation_deg: f64,
    pub max_elevation_time: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl Pass {
    pub fn new(
        aos: DateTime<Utc>,
        los: DateTime<Utc>,
        max_elevation_deg: f64,
        max_elevation_time: DateTime<Utc>,
    ) -> Self {
        Self {
            aos,
            los,
            max_elevation_deg,
            max_elevation_time,
            duration_seconds: (los - aos).num_milliseconds() as f64 / 1000.0,
        }
    }

    pub fn duration(&self) -> Duration {
        self.los - self.aos
    }
}

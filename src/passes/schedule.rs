use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::PassError;

/// One pointing of the antenna at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionSample {
    pub timestamp: DateTime<Utc>,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
}

impl PositionSample {
    pub fn new(timestamp: DateTime<Utc>, azimuth_deg: f64, elevation_deg: f64) -> Self {
        Self {
            timestamp,
            azimuth_deg,
            elevation_deg,
        }
    }
}

/// Intended antenna path over one pass, from AOS to LOS.
///
/// Never empty; timestamps strictly increase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PassSchedule {
    samples: Vec<PositionSample>,
}

impl PassSchedule {
    pub fn new(samples: Vec<PositionSample>) -> Result<Self, PassError> {
        if samples.is_empty() {
            return Err(PassError::EmptySchedule);
        }
        if let Some(index) = samples
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(PassError::NotIncreasing { index: index + 1 });
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn first(&self) -> &PositionSample {
        &self.samples[0]
    }

    pub fn last(&self) -> &PositionSample {
        &self.samples[self.samples.len() - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionSample> {
        self.samples.iter()
    }

    /// Shifts the whole schedule so it starts now. Used to replay a pass.
    pub fn rewind(&self) -> PassSchedule {
        self.rewind_to(Utc::now())
    }

    pub fn rewind_to(&self, start: DateTime<Utc>) -> PassSchedule {
        let delta = self.first().timestamp - start;
        PassSchedule {
            samples: self
                .samples
                .iter()
                .map(|s| PositionSample {
                    timestamp: s.timestamp - delta,
                    ..*s
                })
                .collect(),
        }
    }
}

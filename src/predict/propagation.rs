use chrono::{DateTime, Utc};
use sgp4::{Constants, Elements};

use crate::catalog::Tle;
use crate::predict::error::PredictError;
use crate::predict::pass_finder::find_next_pass;
use crate::predict::{EcefPosition, GroundStation, Pass};

/// Source of satellite positions over time.
pub trait Predictor {
    fn position(&self, at: DateTime<Utc>) -> Result<EcefPosition, PredictError>;

    /// First pass above the horizon of `station` starting at or after `after`.
    fn next_pass(&self, station: &GroundStation, after: DateTime<Utc>) -> Result<Pass, PredictError> {
        find_next_pass(self, station, after)
    }
}

/// SGP4 propagation of a single TLE.
pub struct Sgp4Predictor {
    elements: Elements,
    constants: Constants,
}

impl Sgp4Predictor {
    pub fn from_lines(name: Option<String>, line1: &str, line2: &str) -> Result<Self, PredictError> {
        let elements = Elements::from_tle(name, line1.as_bytes(), line2.as_bytes())?;
        let constants = Constants::from_elements(&elements)?;
        Ok(Self {
            elements,
            constants,
        })
    }

    pub fn from_tle(tle: &Tle) -> Result<Self, PredictError> {
        let name = (!tle.name.is_empty()).then(|| tle.name.clone());
        Self::from_lines(name, &tle.line1, &tle.line2)
    }

    pub fn name(&self) -> Option<&str> {
        self.elements.object_name.as_deref()
    }

    pub fn norad_id(&self) -> u64 {
        self.elements.norad_id
    }
}

impl Predictor for Sgp4Predictor {
    fn position(&self, at: DateTime<Utc>) -> Result<EcefPosition, PredictError> {
        let minutes = self
            .elements
            .datetime_to_minutes_since_epoch(&at.naive_utc())
            .map_err(|e| PredictError::Propagation(e.to_string()))?;

        let prediction = self.constants.propagate(minutes)?;

        let sidereal =
            sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&at.naive_utc()));

        Ok(EcefPosition(teme_to_ecef_position(
            prediction.position,
            sidereal,
        )))
    }
}

pub fn teme_to_ecef_position(pos_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let cos_gmst = gmst.cos();
    let sin_gmst = gmst.sin();
    [
        pos_teme[0] * cos_gmst + pos_teme[1] * sin_gmst,
        -pos_teme[0] * sin_gmst + pos_teme[1] * cos_gmst,
        pos_teme[2],
    ]
}

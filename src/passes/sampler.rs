use chrono::{DateTime, Duration, Utc};

use super::distance::distance;
use super::error::PassError;
use super::schedule::{PassSchedule, PositionSample};
use crate::predict::{GroundStation, Predictor};

/// Resolution at which the distance policy scans the trajectory.
const DISTANCE_SCAN_STEP: Duration = Duration::seconds(1);

/// How intermediate antenna positions are picked between AOS and LOS.
#[derive(Debug, Clone, Copy, PartialEq, strum_macros::Display, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SamplingPolicy {
    /// Move the antenna every `step`.
    FixedInterval { step: Duration },
    /// Split the pass into exactly `steps` equal moves.
    MaxSteps { steps: u32 },
    /// Move only once the satellite drifted more than `degrees` from the last
    /// commanded position.
    Distance { degrees: f64 },
}

impl SamplingPolicy {
    pub fn validate(&self) -> Result<(), PassError> {
        let reason = match self {
            SamplingPolicy::FixedInterval { step } if *step <= Duration::zero() => {
                format!("step must be positive, got {step}")
            }
            SamplingPolicy::MaxSteps { steps: 0 } => "at least one step is required".to_string(),
            SamplingPolicy::Distance { degrees } if !(*degrees > 0.0) => {
                format!("distance must be positive, got {degrees}")
            }
            _ => return Ok(()),
        };
        Err(PassError::InvalidParameter {
            policy: self.into(),
            reason,
        })
    }
}

/// Positions of the satellite as seen from `station` between `aos` and `los`.
///
/// The first sample comes one step after AOS and the last one is always at LOS
/// exactly. AOS == LOS yields a single sample.
pub fn sample_pass<P: Predictor + ?Sized>(
    predictor: &P,
    station: &GroundStation,
    aos: DateTime<Utc>,
    los: DateTime<Utc>,
    policy: SamplingPolicy,
) -> Result<PassSchedule, PassError> {
    if aos > los {
        return Err(PassError::InvalidWindow { aos, los });
    }
    policy.validate()?;

    let look = |t: DateTime<Utc>| -> Result<PositionSample, PassError> {
        let position = predictor.position(t)?;
        let (azimuth, elevation) = station.azimuth_elevation_deg(&position);
        // Horizon crossings are refined to a few ms, so the edges may dip just below zero.
        Ok(PositionSample::new(t, azimuth, elevation.clamp(0.0, 90.0)))
    };

    let samples = match policy {
        SamplingPolicy::FixedInterval { step } => {
            let mut samples = Vec::new();
            let mut t = aos;
            loop {
                t = (t + step).min(los);
                samples.push(look(t)?);
                if t >= los {
                    break;
                }
            }
            samples
        }
        SamplingPolicy::MaxSteps { steps } => {
            let span = los - aos;
            if span == Duration::zero() {
                vec![look(los)?]
            } else {
                let mut samples = Vec::new();
                let mut previous = aos;
                // Computed from AOS each time so rounding never adds a tail step.
                for i in 1..=steps {
                    let t = if i == steps {
                        los
                    } else {
                        aos + span * i as i32 / steps as i32
                    };
                    // Windows shorter than `steps` nanoseconds repeat ticks.
                    if t <= previous {
                        continue;
                    }
                    samples.push(look(t)?);
                    previous = t;
                }
                samples
            }
        }
        SamplingPolicy::Distance { degrees } => {
            let mut samples = Vec::new();
            let mut reference = look(aos)?;
            let mut t = aos;
            while t < los {
                t = (t + DISTANCE_SCAN_STEP).min(los);
                let current = look(t)?;
                let moved = distance(
                    reference.azimuth_deg,
                    reference.elevation_deg,
                    current.azimuth_deg,
                    current.elevation_deg,
                );
                if moved > degrees || t == los {
                    samples.push(current);
                    reference = current;
                }
            }
            if samples.is_empty() {
                samples.push(look(los)?);
            }
            samples
        }
    };

    log::debug!(
        "Sampled pass {} - {} with {} policy into {} positions",
        aos,
        los,
        policy,
        samples.len()
    );

    PassSchedule::new(samples)
}

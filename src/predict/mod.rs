mod error;
mod ground_station;
mod pass_finder;
mod propagation;
mod types;

pub use error::PredictError;
pub use ground_station::GroundStation;
pub use propagation::{Predictor, Sgp4Predictor};
pub use types::{EcefPosition, Pass};

#[cfg(test)]
pub(crate) use propagation::tests as fixtures;

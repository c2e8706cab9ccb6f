use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::predict::PredictError;

#[derive(Debug, Error)]
pub enum PassError {
    #[error("empty schedule")]
    EmptySchedule,
    #[error("schedule timestamps must strictly increase (sample {index})")]
    NotIncreasing { index: usize },
    #[error("AOS {aos} is after LOS {los}")]
    InvalidWindow {
        aos: DateTime<Utc>,
        los: DateTime<Utc>,
    },
    #[error("invalid {policy} parameter: {reason}")]
    InvalidParameter {
        policy: &'static str,
        reason: String,
    },
    #[error("predict error: {0}")]
    Predict(#[from] PredictError),
}

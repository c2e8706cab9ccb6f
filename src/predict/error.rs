use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("invalid tle: {0}")]
    InvalidTle(#[from] sgp4::TleError),
    #[error("elements error: {0}")]
    Elements(#[from] sgp4::ElementsError),
    #[error("Propagation error: {0}")]
    Propagation(String),
    #[error("No pass found within {days} days after {after}")]
    NoPass {
        after: chrono::DateTime<chrono::Utc>,
        days: i64,
    },
}

impl From<sgp4::Error> for PredictError {
    fn from(err: sgp4::Error) -> Self {
        PredictError::Propagation(err.to_string())
    }
}

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::passes::PassError;
use crate::predict::PredictError;
use crate::rotctld::RotctldError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot open log file: {0}")]
    Logging(#[source] std::io::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Predict(#[from] PredictError),
    #[error(transparent)]
    Pass(#[from] PassError),
    #[error(transparent)]
    Rotctld(#[from] RotctldError),
    #[error("rotator rejected the command: {0}")]
    Rejected(String),
    #[error("cannot write position logs: {0}")]
    Output(#[source] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn usage(msg: impl Into<String>) -> Self {
        AppError::Usage(msg.into())
    }
}

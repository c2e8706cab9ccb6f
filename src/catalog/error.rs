use std::path::PathBuf;

use thiserror::Error;

use crate::predict::PredictError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("malformed TLE: {0}")]
    InvalidTle(String),
    #[error("satellite {0:?} not found in orbit data")]
    UnknownName(String),
    #[error("NORAD id {0} not found in orbit data")]
    UnknownNorad(u64),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to download {url}, status: {status}")]
    HttpStatus { url: String, status: u16 },
    #[error(transparent)]
    Predict(#[from] PredictError),
}

impl CatalogError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> CatalogError {
        let path = path.into();
        move |source| CatalogError::Io { path, source }
    }
}

mod database;
mod error;
mod tle;

pub use database::{OrbitDatabase, SourceState, SourceStatus, DEFAULT_MAX_AGE, DEFAULT_SOURCES};
pub use error::CatalogError;
pub use tle::Tle;

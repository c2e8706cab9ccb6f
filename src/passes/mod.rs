mod distance;
mod error;
mod sampler;
mod schedule;

pub use error::PassError;
pub use sampler::{sample_pass, SamplingPolicy};
pub use schedule::{PassSchedule, PositionSample};

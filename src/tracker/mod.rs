mod clock;
mod tracker;

pub use clock::{Clock, SystemClock};
pub use tracker::{TrackOutcome, Tracker};

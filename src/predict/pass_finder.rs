use chrono::{DateTime, Duration, Utc};

use crate::predict::error::PredictError;
use crate::predict::{GroundStation, Pass, Predictor};

const COARSE_STEP: Duration = Duration::seconds(60);
const PEAK_STEP: Duration = Duration::seconds(1);
const REFINE_RESOLUTION: Duration = Duration::milliseconds(10);
const SEARCH_DAYS: i64 = 7;
const HORIZON_ELEVATION: f64 = 0.0;

fn elevation<P: Predictor + ?Sized>(
    predictor: &P,
    station: &GroundStation,
    at: DateTime<Utc>,
) -> Result<f64, PredictError> {
    let position = predictor.position(at)?;
    Ok(station.azimuth_elevation_deg(&position).1)
}

/// Find the first pass above the horizon starting at or after `after`.
///
/// A pass already in progress at `after` is reported with its AOS clipped to `after`.
pub fn find_next_pass<P: Predictor + ?Sized>(
    predictor: &P,
    station: &GroundStation,
    after: DateTime<Utc>,
) -> Result<Pass, PredictError> {
    let end = after + Duration::days(SEARCH_DAYS);

    let aos = if elevation(predictor, station, after)? >= HORIZON_ELEVATION {
        after
    } else {
        let mut cursor = after;
        loop {
            let next = cursor + COARSE_STEP;
            if next > end {
                return Err(PredictError::NoPass {
                    after,
                    days: SEARCH_DAYS,
                });
            }
            if elevation(predictor, station, next)? >= HORIZON_ELEVATION {
                break refine_crossing(predictor, station, cursor, next, true)?;
            }
            cursor = next;
        }
    };

    let mut cursor = aos;
    let los = loop {
        let next = cursor + COARSE_STEP;
        if next > end {
            // Still up at the end of the search window
            break end;
        }
        if elevation(predictor, station, next)? < HORIZON_ELEVATION {
            break refine_crossing(predictor, station, cursor, next, false)?;
        }
        cursor = next;
    };

    let (max_elevation_time, max_elevation_deg) = find_peak(predictor, station, aos, los)?;

    Ok(Pass::new(aos, los, max_elevation_deg, max_elevation_time))
}

/// Binary search for the horizon crossing between `before` and `after`.
///
/// Returns the last instant still above the horizon.
fn refine_crossing<P: Predictor + ?Sized>(
    predictor: &P,
    station: &GroundStation,
    before: DateTime<Utc>,
    after: DateTime<Utc>,
    rising: bool,
) -> Result<DateTime<Utc>, PredictError> {
    let mut low = before;
    let mut high = after;

    while high - low > REFINE_RESOLUTION {
        let mid = low + (high - low) / 2;
        let above = elevation(predictor, station, mid)? >= HORIZON_ELEVATION;
        if above == rising {
            high = mid;
        } else {
            low = mid;
        }
    }

    Ok(if rising { high } else { low })
}

fn find_peak<P: Predictor + ?Sized>(
    predictor: &P,
    station: &GroundStation,
    aos: DateTime<Utc>,
    los: DateTime<Utc>,
) -> Result<(DateTime<Utc>, f64), PredictError> {
    let mut best = (aos, elevation(predictor, station, aos)?);
    let mut cursor = aos;
    while cursor < los {
        cursor = (cursor + PEAK_STEP).min(los);
        let el = elevation(predictor, station, cursor)?;
        if el > best.1 {
            best = (cursor, el);
        }
    }
    Ok(best)
}

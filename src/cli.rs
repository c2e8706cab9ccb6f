use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::error::AppError;
use crate::passes::SamplingPolicy;
use crate::predict::GroundStation;

#[derive(Parser)]
#[command(name = "svarog-ctl", version)]
#[command(about = "Tracks satellite passes with an antenna rotator driven by rotctld")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict the next pass and print the antenna schedule
    Pass {
        #[command(flatten)]
        pass: PassArgs,
        /// Print pass and schedule as JSON
        #[arg(long)]
        json: bool,
    },
    /// Track the next pass with the rotator
    Track {
        #[command(flatten)]
        pass: PassArgs,
        #[command(flatten)]
        rotator: RotatorArgs,
        /// How often the rotator position is read, e.g. "1s"
        #[arg(long, value_parser = humantime::parse_duration)]
        poll_interval: Option<Duration>,
        /// Shift the schedule so it starts right away, to rehearse a pass
        #[arg(long)]
        rewind: bool,
        /// Directory for the intended and actual position logs
        #[arg(long, default_value = ".")]
        log_dir: PathBuf,
    },
    /// Send a single command to the rotator
    Rotator {
        #[command(flatten)]
        rotator: RotatorArgs,
        #[command(subcommand)]
        action: RotatorAction,
    },
    /// Maintain the local TLE catalog
    Tle {
        #[command(subcommand)]
        action: TleAction,
    },
}

#[derive(Subcommand)]
pub enum RotatorAction {
    /// Show the rotator model and position
    Status,
    /// Point the antenna
    Set {
        #[arg(allow_hyphen_values = true)]
        azimuth: f64,
        #[arg(allow_hyphen_values = true)]
        elevation: f64,
    },
    /// Stop any movement
    Stop,
    /// Move to the park position
    Park,
    /// Print the backend capabilities
    Caps,
}

#[derive(Subcommand)]
pub enum TleAction {
    /// Download stale sources and count the loaded satellites
    Refresh {
        /// Download even when the cached copy is recent
        #[arg(long)]
        force: bool,
        /// Download everything and check that these NORAD ids are present
        #[arg(long = "satid")]
        satids: Vec<u64>,
    },
    /// Show the age of each source's cached copy
    Status,
    /// Print the TLE of one satellite
    Show {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
pub struct PassArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    #[command(flatten)]
    pub observer: ObserverArgs,
    #[command(flatten)]
    pub sampling: SamplingArgs,
    /// Look for the first pass after this UTC time, defaults to now
    #[arg(long, value_parser = parse_time)]
    pub time: Option<DateTime<Utc>>,
}

#[derive(Args, Default)]
pub struct TargetArgs {
    /// First line of the orbital data in TLE format
    #[arg(long)]
    pub tle1: Option<String>,
    /// Second line of the orbital data in TLE format
    #[arg(long)]
    pub tle2: Option<String>,
    /// Name of the satellite in the local catalog, e.g. "NOAA 18"
    #[arg(long)]
    pub sat: Option<String>,
    /// NORAD id of the satellite in the local catalog, e.g. 28654
    #[arg(long)]
    pub satid: Option<u64>,
}

/// How the user picked the satellite.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Lines { line1: String, line2: String },
    Name(String),
    Norad(u64),
}

impl TargetArgs {
    pub fn target(&self) -> Result<Target, AppError> {
        let given = [self.tle1.is_some() || self.tle2.is_some(), self.sat.is_some(), self.satid.is_some()];
        match given.iter().filter(|g| **g).count() {
            0 => {
                return Err(AppError::usage(
                    "identify the satellite with --tle1 and --tle2, --sat <name> or --satid <norad id>",
                ))
            }
            1 => {}
            _ => return Err(AppError::usage("use only one of --tle1/--tle2, --sat and --satid")),
        }

        if let Some(name) = &self.sat {
            return Ok(Target::Name(name.clone()));
        }
        if let Some(id) = self.satid {
            return Ok(Target::Norad(id));
        }
        match (&self.tle1, &self.tle2) {
            (Some(line1), Some(line2)) => Ok(Target::Lines {
                line1: line1.clone(),
                line2: line2.clone(),
            }),
            _ => Err(AppError::usage("specify both TLE lines (--tle1 and --tle2) or none")),
        }
    }
}

#[derive(Args, Default)]
pub struct ObserverArgs {
    /// Observer latitude in degrees, positive north (e.g. 53.3 for Gdansk)
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,
    /// Observer longitude in degrees, positive east (e.g. 18.5 for Gdansk)
    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<f64>,
    /// Observer altitude in meters above sea level
    #[arg(long, allow_hyphen_values = true)]
    pub alt: Option<f64>,
}

impl ObserverArgs {
    /// Name of the configured station, when that is where the location comes from.
    pub fn station_name<'a>(&self, config: &'a Config) -> Option<&'a str> {
        if self.lat.is_some() || self.lon.is_some() {
            return None;
        }
        config.station.as_ref()?.name.as_deref()
    }

    /// Command line location, falling back to the configured station.
    pub fn station(&self, config: &Config) -> Result<GroundStation, AppError> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=360.0).contains(&lon) {
                    return Err(AppError::usage(format!("invalid observer location {lat}, {lon}")));
                }
                Ok(GroundStation::new(lat, lon, self.alt.unwrap_or(0.0)))
            }
            (None, None) => match &config.station {
                Some(station) => {
                    let mut gs = station.ground_station()?;
                    if let Some(alt) = self.alt {
                        gs.altitude_m = alt;
                    }
                    Ok(gs)
                }
                None => Err(AppError::usage(
                    "specify the observer with --lat and --lon, or a station in the config file",
                )),
            },
            _ => Err(AppError::usage(
                "specify both the latitude (--lat) and longitude (--lon) of the observer",
            )),
        }
    }
}

#[derive(Args, Default)]
pub struct SamplingArgs {
    /// Move the antenna at this interval, e.g. "30s" (default)
    #[arg(long, value_parser = humantime::parse_duration, conflicts_with_all = ["max_steps", "distance"])]
    pub interval: Option<Duration>,
    /// Split the pass into this many moves
    #[arg(long, conflicts_with = "distance")]
    pub max_steps: Option<u32>,
    /// Move the antenna whenever the satellite drifted this many degrees
    #[arg(long)]
    pub distance: Option<f64>,
}

const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

impl SamplingArgs {
    pub fn policy(&self) -> Result<SamplingPolicy, AppError> {
        let policy = match (self.max_steps, self.distance) {
            (Some(steps), _) => SamplingPolicy::MaxSteps { steps },
            (None, Some(degrees)) => SamplingPolicy::Distance { degrees },
            (None, None) => {
                let interval = self.interval.unwrap_or(DEFAULT_INTERVAL);
                let step = chrono::Duration::from_std(interval)
                    .map_err(|_| AppError::usage(format!("interval {interval:?} is too long")))?;
                SamplingPolicy::FixedInterval { step }
            }
        };
        policy.validate()?;
        Ok(policy)
    }
}

#[derive(Args, Default)]
pub struct RotatorArgs {
    /// rotctld host, defaults to the configured one
    #[arg(long)]
    pub host: Option<String>,
    /// rotctld port
    #[arg(long)]
    pub port: Option<u16>,
    /// Network timeout, e.g. "3s"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
}

/// Accepts RFC 3339 or a naive UTC `YYYY-mm-dd HH:MM:SS` (a `T` separator works too).
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|t| t.and_utc())
        .ok_or_else(|| format!("invalid time {s:?}, expected e.g. 2021-07-14 18:30:00"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clap::Parser;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("svarog-ctl").chain(args.iter().copied()))
    }

    #[test]
    fn time_formats() {
        let expected = Utc.with_ymd_and_hms(2021, 7, 14, 18, 30, 0).unwrap();
        assert_eq!(parse_time("2021-07-14T18:30:00Z").unwrap(), expected);
        assert_eq!(parse_time("2021-07-14T20:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_time("2021-07-14 18:30:00").unwrap(), expected);
        assert_eq!(parse_time("2021-07-14T18:30:00").unwrap(), expected);
        assert_eq!(parse_time("2021-07-14 18:30").unwrap(), expected);
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn target_selection() {
        let lines = TargetArgs {
            tle1: Some("1 ...".into()),
            tle2: Some("2 ...".into()),
            ..Default::default()
        };
        assert!(matches!(lines.target(), Ok(Target::Lines { .. })));

        let half = TargetArgs {
            tle1: Some("1 ...".into()),
            ..Default::default()
        };
        assert!(matches!(half.target(), Err(AppError::Usage(_))));

        let both = TargetArgs {
            sat: Some("NOAA 18".into()),
            satid: Some(28654),
            ..Default::default()
        };
        assert!(both.target().is_err());
        assert!(TargetArgs::default().target().is_err());

        let id = TargetArgs {
            satid: Some(28654),
            ..Default::default()
        };
        assert_eq!(id.target().unwrap(), Target::Norad(28654));
    }

    #[test]
    fn observer_from_args_or_config() {
        let config = Config::default();
        let args = ObserverArgs {
            lat: Some(53.35),
            lon: Some(18.53),
            alt: Some(120.0),
        };
        assert_eq!(
            args.station(&config).unwrap(),
            GroundStation::new(53.35, 18.53, 120.0)
        );

        let only_lat = ObserverArgs {
            lat: Some(53.35),
            ..Default::default()
        };
        assert!(only_lat.station(&config).is_err());
        assert!(ObserverArgs::default().station(&config).is_err());

        let config: Config =
            serde_yaml::from_str("station:\n  coordinates: \"54.0, 19.0\"\n  altitude_m: 10\n").unwrap();
        assert_eq!(
            ObserverArgs::default().station(&config).unwrap(),
            GroundStation::new(54.0, 19.0, 10.0)
        );
        assert_eq!(ObserverArgs::default().station_name(&config), None);
    }

    #[test]
    fn configured_station_name() {
        let config: Config =
            serde_yaml::from_str("station:\n  name: Gdansk\n  coordinates: \"54.0, 19.0\"\n").unwrap();
        assert_eq!(ObserverArgs::default().station_name(&config), Some("Gdansk"));

        let args = ObserverArgs {
            lat: Some(50.0),
            lon: Some(20.0),
            ..Default::default()
        };
        assert_eq!(args.station_name(&config), None);
    }

    #[test]
    fn sampling_defaults_to_thirty_seconds() {
        let policy = SamplingArgs::default().policy().unwrap();
        assert_eq!(
            policy,
            SamplingPolicy::FixedInterval {
                step: chrono::Duration::seconds(30)
            }
        );
    }

    #[test]
    fn sampling_options_are_exclusive() {
        assert!(parse(&["pass", "--sat", "X", "--interval", "10s", "--max-steps", "5"]).is_err());
        assert!(parse(&["pass", "--sat", "X", "--max-steps", "5", "--distance", "2"]).is_err());

        let cli = parse(&["pass", "--sat", "X", "--distance", "2.5"]).unwrap();
        let Commands::Pass { pass, .. } = cli.command else {
            panic!("expected pass command");
        };
        assert_eq!(pass.sampling.policy().unwrap(), SamplingPolicy::Distance { degrees: 2.5 });

        let zero = SamplingArgs {
            max_steps: Some(0),
            ..Default::default()
        };
        assert!(matches!(zero.policy(), Err(AppError::Pass(_))));
    }

    #[test]
    fn track_arguments() {
        let cli = parse(&[
            "track",
            "--satid",
            "44427",
            "--lat",
            "-33.9",
            "--lon",
            "-70.7",
            "--port",
            "4540",
            "--poll-interval",
            "500ms",
            "--rewind",
        ])
        .unwrap();
        let Commands::Track {
            pass,
            rotator,
            poll_interval,
            rewind,
            log_dir,
        } = cli.command
        else {
            panic!("expected track command");
        };
        assert_eq!(pass.observer.lat, Some(-33.9));
        assert_eq!(pass.observer.lon, Some(-70.7));
        assert_eq!(rotator.port, Some(4540));
        assert_eq!(poll_interval, Some(Duration::from_millis(500)));
        assert!(rewind);
        assert_eq!(log_dir, PathBuf::from("."));
    }

    #[test]
    fn tle_refresh_with_satellite_ids() {
        let cli = parse(&["tle", "refresh", "--satid", "44427", "--satid", "25338"]).unwrap();
        let Commands::Tle {
            action: TleAction::Refresh { force, satids },
        } = cli.command
        else {
            panic!("expected tle refresh");
        };
        assert!(!force);
        assert_eq!(satids, vec![44427, 25338]);
    }

    #[test]
    fn rotator_set_accepts_negative_azimuth() {
        let cli = parse(&["rotator", "--host", "10.0.0.2", "set", "-90", "45"]).unwrap();
        let Commands::Rotator { rotator, action } = cli.command else {
            panic!("expected rotator command");
        };
        assert_eq!(rotator.host.as_deref(), Some("10.0.0.2"));
        assert!(matches!(action, RotatorAction::Set { azimuth, elevation } if azimuth == -90.0 && elevation == 45.0));
    }
}

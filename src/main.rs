mod catalog;
mod cli;
mod config;
mod error;
mod logging;
mod output;
mod passes;
mod predict;
mod rotctld;
mod shutdown;
mod tracker;
mod utils;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use serde::Serialize;

use crate::catalog::{CatalogError, OrbitDatabase, Tle};
use crate::cli::{Cli, Commands, PassArgs, RotatorAction, RotatorArgs, Target, TleAction};
use crate::config::Config;
use crate::error::AppError;
use crate::output::PassLogs;
use crate::passes::{sample_pass, PassSchedule};
use crate::predict::{EcefPosition, Pass, Predictor, Sgp4Predictor};
use crate::rotctld::Rotctld;
use crate::shutdown::{listen_for_ctrl_c, ShutdownToken};
use crate::tracker::{TrackOutcome, Tracker};

const CUSTOM_SATELLITE: &str = "CUSTOM";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("{:?}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

struct Context {
    config_dir: PathBuf,
    config: Config,
}

impl Context {
    fn load() -> Result<Self, AppError> {
        let config_dir = config::config_dir()?;
        let config = Config::load_from_dir(&config_dir)?;
        Ok(Self { config_dir, config })
    }

    fn catalog(&self) -> OrbitDatabase {
        OrbitDatabase::new(
            self.config.tle_cache_dir(&self.config_dir),
            self.config.tle.sources.clone(),
            self.config.tle.max_age,
        )
    }

    async fn loaded_catalog(&self) -> Result<OrbitDatabase, AppError> {
        let mut db = self.catalog();
        db.refresh(false).await?;
        Ok(db)
    }

    /// Command line options win over the config file.
    fn rotator(&self, args: &RotatorArgs) -> Result<Rotctld, AppError> {
        let cfg = &self.config.rotator;
        let client = Rotctld::new(
            args.host.clone().unwrap_or_else(|| cfg.host.clone()),
            args.port.unwrap_or(cfg.port),
            args.timeout.unwrap_or(cfg.timeout),
        )?;
        Ok(client)
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let ctx = Context::load()?;
    logging::init(&ctx.config.logging.level, ctx.config.log_file().as_deref())
        .map_err(AppError::Logging)?;
    log::debug!("Using configuration directory {}", ctx.config_dir.display());

    match cli.command {
        Commands::Pass { pass, json } => show_pass(&ctx, &pass, json).await,
        Commands::Track {
            pass,
            rotator,
            poll_interval,
            rewind,
            log_dir,
        } => track(&ctx, &pass, &rotator, poll_interval, rewind, &log_dir).await,
        Commands::Rotator { rotator, action } => rotator_command(&ctx, &rotator, action).await,
        Commands::Tle { action } => tle_command(&ctx, action).await,
    }
}

struct PassPlan {
    satellite: String,
    observer: String,
    pass: Pass,
    schedule: PassSchedule,
}

#[derive(Serialize)]
struct PassReport<'a> {
    satellite: &'a str,
    observer: String,
    pass: &'a Pass,
    schedule: &'a PassSchedule,
}

async fn find_tle(ctx: &Context, target: Target) -> Result<Tle, AppError> {
    let tle = match target {
        Target::Lines { line1, line2 } => Tle::new(&line1, &line2, CUSTOM_SATELLITE)?,
        Target::Name(name) => ctx.loaded_catalog().await?.get_name(&name)?.clone(),
        Target::Norad(id) => ctx.loaded_catalog().await?.get_norad(id)?.clone(),
    };
    Ok(tle)
}

async fn plan_pass(ctx: &Context, args: &PassArgs) -> Result<PassPlan, AppError> {
    // Argument problems are reported before anything is downloaded.
    let target = args.target.target()?;
    let station = args.observer.station(&ctx.config)?;
    let observer = match args.observer.station_name(&ctx.config) {
        Some(name) => format!("{} ({})", name, station),
        None => station.to_string(),
    };
    let policy = args.sampling.policy()?;
    let after = args.time.unwrap_or_else(Utc::now);

    let tle = find_tle(ctx, target).await?;
    let satellite = if tle.name.is_empty() {
        format!("NORAD {}", tle.norad_id)
    } else {
        tle.name.clone()
    };
    let predictor = Sgp4Predictor::from_tle(&tle)?;

    log::info!("Satellite: {} (NORAD {})", satellite, tle.norad_id);
    log::info!("Observer location: {}", observer);
    log::info!("After time: {}", after);

    let pass = predictor.next_pass(&station, after)?;
    log::info!("AOS: {}", pass.aos);
    log::info!(
        "Max elevation: {:.2} deg at {}",
        pass.max_elevation_deg,
        pass.max_elevation_time
    );
    log::info!("LOS: {}", pass.los);

    let schedule = sample_pass(&predictor, &station, pass.aos, pass.los, policy)?;

    Ok(PassPlan {
        satellite,
        observer,
        pass,
        schedule,
    })
}

fn print_pass(plan: &PassPlan) {
    let pass = &plan.pass;
    let duration = Duration::from_secs(pass.duration().num_seconds().max(0) as u64);
    println!("Satellite: {}", plan.satellite);
    println!("Observer: {}", plan.observer);
    println!("AOS: {}", pass.aos);
    println!(
        "Max elevation: {:.2} deg at {}",
        pass.max_elevation_deg, pass.max_elevation_time
    );
    println!("LOS: {}", pass.los);
    println!("Duration: {}", humantime::format_duration(duration));
}

fn print_schedule(schedule: &PassSchedule) {
    for s in schedule.iter() {
        println!(
            "Date {}, az={:3.1} deg el={:3.1}",
            s.timestamp, s.azimuth_deg, s.elevation_deg
        );
    }
}

async fn show_pass(ctx: &Context, args: &PassArgs, json: bool) -> Result<(), AppError> {
    let plan = plan_pass(ctx, args).await?;

    if json {
        let report = PassReport {
            satellite: &plan.satellite,
            observer: plan.observer.clone(),
            pass: &plan.pass,
            schedule: &plan.schedule,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_pass(&plan);
        print_schedule(&plan.schedule);
    }
    Ok(())
}

async fn track(
    ctx: &Context,
    args: &PassArgs,
    rotator: &RotatorArgs,
    poll_interval: Option<Duration>,
    rewind: bool,
    log_dir: &Path,
) -> Result<(), AppError> {
    let mut client = ctx.rotator(rotator)?;
    let plan = plan_pass(ctx, args).await?;
    print_pass(&plan);

    let schedule = if rewind {
        log::info!("Rewinding the schedule to start now");
        plan.schedule.rewind()
    } else {
        plan.schedule.clone()
    };

    client.connect().await?;

    let token = ShutdownToken::new();
    let ctrl_c = listen_for_ctrl_c(token.clone());
    let mut tracker = Tracker::new(
        poll_interval.unwrap_or(ctx.config.rotator.poll_interval),
        token,
    );

    let started = Utc::now();
    let result = tracker.track(&schedule, &mut client).await;
    client.close();
    ctrl_c.abort();

    let logs = PassLogs::new(log_dir, started, &plan.satellite);
    let written = logs.write(schedule.samples(), tracker.actual_positions());

    match result? {
        TrackOutcome::Completed => println!("Pass tracked"),
        TrackOutcome::Cancelled => println!("Tracking cancelled"),
        TrackOutcome::Missed => println!("Pass already over, nothing sent"),
    }
    written.map_err(AppError::Output)?;
    println!("Intended positions: {}", logs.intended.display());
    println!("Actual positions: {}", logs.actual.display());
    Ok(())
}

async fn rotator_command(
    ctx: &Context,
    args: &RotatorArgs,
    action: RotatorAction,
) -> Result<(), AppError> {
    let mut client = ctx.rotator(args)?;
    let model = client.connect().await?;
    let result = rotator_action(&mut client, &model, action).await;
    client.close();
    result
}

async fn rotator_action(
    client: &mut Rotctld,
    model: &str,
    action: RotatorAction,
) -> Result<(), AppError> {
    let response = match action {
        RotatorAction::Status => {
            println!("Model: {}", model);
            println!("Address: {} ({})", client.address(), client.state());
            match client.get_pos().await? {
                Some((az, el)) => println!("Position: az={:.1} el={:.1}", az, el),
                None => println!("Position: unknown"),
            }
            return Ok(());
        }
        RotatorAction::Set { azimuth, elevation } => {
            client.set_pos(azimuth, elevation).await?.response
        }
        RotatorAction::Stop => client.stop().await?,
        RotatorAction::Park => client.park().await?,
        RotatorAction::Caps => {
            println!("{}", client.capabilities().await?);
            return Ok(());
        }
    };

    if !response.contains("RPRT 0") {
        return Err(AppError::Rejected(response));
    }
    println!("OK");
    Ok(())
}

async fn tle_command(ctx: &Context, action: TleAction) -> Result<(), AppError> {
    match action {
        TleAction::Refresh { force, satids } if !satids.is_empty() => {
            if !force {
                log::debug!("Checking for NORAD ids implies --force");
            }
            let mut db = ctx.catalog();
            let missing = db.refresh_satellites(&satids).await?;
            println!("{} satellites known", db.count());
            if let Some(&first) = missing.first() {
                for id in &missing {
                    println!("Missing NORAD {}", id);
                }
                return Err(CatalogError::UnknownNorad(first).into());
            }
        }
        TleAction::Refresh { force, .. } => {
            let mut db = ctx.catalog();
            let loaded = db.refresh(force).await?;
            println!("Loaded {} TLEs, {} satellites known", loaded, db.count());
        }
        TleAction::Status => {
            let db = ctx.catalog();
            println!("Cache directory: {}", db.cache_dir().display());
            for status in db.status() {
                println!("{}", status);
            }
        }
        TleAction::Show { target } => {
            let target = target.target()?;
            let db = ctx.loaded_catalog().await?;
            let name = match target {
                Target::Lines { .. } => {
                    return Err(AppError::usage("look up a satellite with --sat or --satid"))
                }
                Target::Name(name) => name,
                Target::Norad(id) => db.get_name_by_norad(id)?.to_string(),
            };
            println!("{}", db.get_name(&name)?);

            let now = Utc::now();
            let EcefPosition([x, y, z]) = db.predictor(&name)?.position(now)?;
            println!("ECEF at {}: x={:.1} y={:.1} z={:.1} km", now, x, y, z);
        }
    }
    Ok(())
}

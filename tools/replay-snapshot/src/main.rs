//! Replay a GTFS feed and write vehicle positions as GeoJSON.
//!
//! This tool:
//! 1. Loads an unpacked GTFS folder
//! 2. Precomputes trip trajectories on a background worker
//! 3. Plays the simulation clock forward for the requested frames
//! 4. Writes every vehicle of every frame (plus optional shapes, trip paths and stops)
//!    to one FeatureCollection

mod config;
mod feed;
mod output;

use anyhow::{bail, Context, Result};
use clap::Parser;
use geo::Point;
use gtfs_replay_transit::trajectory::{group_shapes, process_shape};
use gtfs_replay_transit::{
    parse_gtfs_date, parse_gtfs_time, FeedSession, SimulationClock, TimeValue, VehicleLocator,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use config::SnapshotConfig;
use output::{
    shape_feature, stop_feature, trajectory_feature, vehicle_feature, write_features_geojson, Frame,
};

#[derive(Parser, Debug)]
#[command(name = "replay-snapshot")]
#[command(author, version, about = "Replay a GTFS feed and write vehicle positions as GeoJSON")]
#[command(long_about = "Loads a GTFS folder, precomputes trip trajectories and writes the \
position of every running vehicle at one or more simulated instants as a GeoJSON \
FeatureCollection.")]
struct Args {
    /// Unpacked GTFS folder
    #[arg(short, long)]
    input: PathBuf,

    /// Output GeoJSON file path
    #[arg(short, long, default_value = "vehicles.geojson")]
    output: PathBuf,

    /// YAML config file (simulation and output settings)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulated time of the first frame (HH:MM:SS)
    #[arg(short, long, default_value = "08:00:00")]
    time: String,

    /// Service date (YYYYMMDD); only trips running that day are shown
    #[arg(short, long)]
    date: Option<String>,

    /// Number of frames to write
    #[arg(long, default_value = "1")]
    frames: usize,

    /// Real seconds between frames (one real second is one simulated minute at speed 1)
    #[arg(long, default_value = "1.0")]
    step: f64,

    /// Playback speed multiplier
    #[arg(long, default_value = "1.0")]
    speed: f64,

    /// Time bucket width in seconds (overrides the config file)
    #[arg(long)]
    bucket_size: Option<u32>,

    /// Skip precomputation and place vehicles on straight lines between stops
    #[arg(long)]
    legacy: bool,

    /// Include processed shapes as LineStrings
    #[arg(long)]
    shapes: bool,

    /// Include stops as Points
    #[arg(long)]
    stops: bool,

    /// Include the full path of every precomputed trip as a LineString
    #[arg(long)]
    paths: bool,

    /// Report the vehicle nearest to this point in the first frame (LON,LAT)
    #[arg(long)]
    pick: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_lon_lat(value: &str) -> Result<Point> {
    let Some((lon, lat)) = value.split_once(',') else {
        bail!("Expected LON,LAT, got {:?}", value);
    };
    let lon: f64 = lon.trim().parse().with_context(|| format!("Invalid longitude {:?}", lon))?;
    let lat: f64 = lat.trim().parse().with_context(|| format!("Invalid latitude {:?}", lat))?;
    Ok(Point::new(lon, lat))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    tracing::info!("=== GTFS Replay Snapshot ===");
    tracing::info!("Input: {}", args.input.display());
    tracing::info!("Output: {}", args.output.display());

    let mut config = match &args.config {
        Some(path) => SnapshotConfig::load(path)?,
        None => SnapshotConfig::default(),
    };
    if let Some(bucket_size) = args.bucket_size {
        config.simulation.bucket_size_secs = bucket_size;
    }
    config.output.shapes |= args.shapes;
    config.output.stops |= args.stops;
    config.output.paths |= args.paths;

    let start_time = parse_gtfs_time(&TimeValue::from(args.time.as_str()))
        .with_context(|| format!("Invalid --time {:?}, expected HH:MM:SS", args.time))?;
    let service_date = args
        .date
        .as_deref()
        .map(parse_gtfs_date)
        .transpose()
        .context("Invalid --date")?;
    let pick = args.pick.as_deref().map(parse_lon_lat).transpose()?;
    if args.frames == 0 {
        bail!("--frames must be at least 1");
    }

    // Phase 1: Load the feed
    tracing::info!("");
    tracing::info!("Phase 1: Loading GTFS feed...");
    let gtfs = feed::load_feed(&args.input)?;
    if gtfs.is_empty() {
        bail!("GTFS folder {} contains no stops or trips", args.input.display());
    }

    let mut session = FeedSession::new(config.simulation.clone()).context("Invalid simulation config")?;
    session.reload(gtfs);
    session.set_service_date(service_date);

    let stats = session.stats();
    tracing::info!(
        "  {} stops, {} routes, {} trips, {} shapes",
        stats.stop_count,
        stats.route_count,
        stats.trip_count,
        stats.shape_count
    );
    if let Some(date) = service_date {
        tracing::info!("  Service date: {}", date);
    }

    // Phase 2: Precompute trajectories
    tracing::info!("");
    if args.legacy {
        tracing::info!("Phase 2: Skipping precomputation (--legacy)");
    } else {
        tracing::info!("Phase 2: Precomputing trajectories...");
        let mut handle = session.spawn_precompute().context("Failed to start precomputation")?;

        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .context("Invalid progress bar template")?
                .progress_chars("=> "),
        );

        let precomputed = loop {
            if let Some(result) = handle.try_finish() {
                break result;
            }
            let progress = handle.progress();
            pb.set_position(progress.percent as u64);
            pb.set_message(progress.message);
            std::thread::sleep(Duration::from_millis(50));
        };
        pb.finish_and_clear();

        let precomputed = precomputed.context("Precomputation failed")?;
        tracing::info!(
            "  {} trajectories, {} vehicle instances",
            precomputed.cache.len(),
            precomputed.index.instance_count()
        );
        session.install(precomputed).context("Failed to install precomputed data")?;
    }

    // Phase 3: Play the clock
    tracing::info!("");
    tracing::info!("Phase 3: Simulating {} frame(s) from {}...", args.frames, args.time);
    let mut clock = SimulationClock::new(start_time as f64);
    clock.set_speed(args.speed);
    clock.play();

    let mut features = Vec::new();
    for index in 0..args.frames {
        let time = clock.time();
        let vehicles = session.vehicle_positions(time);
        tracing::info!("  {} [{}]: {} vehicles", clock.label(), session.source().name(), vehicles.len());

        if index == 0 {
            if let Some(point) = pick {
                match VehicleLocator::new(&vehicles).pick(point, config.output.pick_radius_m) {
                    Some(vehicle) => tracing::info!(
                        "  Picked {} (route {}) heading to {}",
                        vehicle.trip_id,
                        vehicle.route_id,
                        vehicle.next_stop_id
                    ),
                    None => tracing::info!(
                        "  No vehicle within {} m of {:?}",
                        config.output.pick_radius_m,
                        point
                    ),
                }
            }
        }

        let frame = Frame { index, time };
        features.extend(vehicles.iter().map(|vehicle| vehicle_feature(vehicle, frame)));
        clock.advance(args.step);
    }
    let vehicle_feature_count = features.len();

    // Optional: shapes and stops
    if config.output.shapes {
        match session.precomputed() {
            Some(precomputed) => {
                for (shape_id, points) in &precomputed.cache.processed_shapes {
                    features.push(shape_feature(shape_id.as_str(), points));
                }
            }
            None => {
                for (shape_id, rows) in group_shapes(&session.feed().shapes) {
                    let points = process_shape(rows);
                    if points.len() >= 2 {
                        features.push(shape_feature(shape_id.as_str(), &points));
                    }
                }
            }
        }
    }
    if config.output.paths {
        match session.precomputed() {
            Some(precomputed) => {
                let mut trajectories: Vec<_> = precomputed.cache.trajectories.values().collect();
                trajectories.sort_by(|a, b| a.trip_id.cmp(&b.trip_id));
                features.extend(trajectories.into_iter().map(|trajectory| trajectory_feature(trajectory)));
            }
            None => tracing::warn!("  Trip paths need precomputed data, skipping (--legacy)"),
        }
    }
    if config.output.stops {
        for stop in &session.feed().stops {
            features.push(stop_feature(
                stop.stop_id.as_str(),
                stop.stop_name.as_deref(),
                Point::new(stop.stop_lon, stop.stop_lat),
            ));
        }
    }

    // Phase 4: Write output
    tracing::info!("");
    tracing::info!("Phase 4: Writing output...");
    let feature_count = features.len();
    write_features_geojson(features, &args.output).context("Failed to write vehicle GeoJSON")?;

    tracing::info!("");
    tracing::info!(
        "  {} vehicle features, {} other features",
        vehicle_feature_count,
        feature_count - vehicle_feature_count
    );
    tracing::info!("Output written to: {}", args.output.display());
    tracing::info!("Done!");

    Ok(())
}

//! # Waterfinder CLI
//!
//! Headless access to the fountain engine: data conversion, cluster queries
//! for a map viewport, and an AR marker preview for a position and heading.
//!
//! ## Usage
//!
//! ```bash
//! # Overpass dump → GeoJSON
//! waterfinder convert fountains.json fountains.clean.geojson
//!
//! # Map markers for a viewport
//! waterfinder clusters --input fountains.clean.geojson --bbox 2.2,48.8,2.5,48.9 --zoom 13
//!
//! # What the AR overlay would draw
//! waterfinder ar --input fountains.json --lat 48.8566 --lon 2.3522 --heading 90
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use waterfinder_geo::prelude::*;
use waterfinder_geo::{overpass_to_geojson, parse_geojson, parse_overpass};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "waterfinder")]
#[command(about = "Find drinking water nearby")]
#[command(version)]
struct Cli {
    /// Configuration file (waterfinder.toml)
    #[arg(short, long, env = "WATERFINDER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert an Overpass JSON dump into GeoJSON
    Convert {
        /// Overpass `[out:json]` dump
        input: PathBuf,
        /// GeoJSON output path
        output: PathBuf,
    },

    /// Print the map nodes visible in a bounding box
    Clusters {
        /// Fountain data (Overpass JSON or .geojson)
        #[arg(short, long)]
        input: PathBuf,
        /// west,south,east,north in degrees
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: BoundingBox,
        /// Map zoom level
        #[arg(short, long)]
        zoom: u8,
    },

    /// Print the AR overlay markers for a position and heading
    Ar {
        /// Fountain data (Overpass JSON or .geojson)
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Compass heading, degrees clockwise from north
        #[arg(long, default_value = "0")]
        heading: f64,
    },
}

fn parse_bbox(value: &str) -> std::result::Result<BoundingBox, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid number in bbox: {}", e))?;
    match parts.as_slice() {
        [west, south, east, north] => Ok(BoundingBox::new(*west, *south, *east, *north)),
        _ => Err(format!("expected west,south,east,north, got {} values", parts.len())),
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Read fountains from a GeoJSON file or an Overpass dump, by extension
fn load_points(path: &Path) -> Result<Vec<PointOfInterest>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let is_geojson = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("geojson"));

    let points = if is_geojson {
        parse_geojson(&content)
    } else {
        parse_overpass(&content)
    }
    .with_context(|| format!("Failed to parse {}", path.display()))?;

    info!("Loaded {} fountains from {}", points.len(), path.display());
    Ok(points)
}

fn convert(input: &Path, output: &Path) -> Result<()> {
    let content = std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let collection = overpass_to_geojson(&content)?;
    let json = serde_json::to_string_pretty(&collection)?;
    std::fs::write(output, json).with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Wrote {} features to {}", collection.features.len(), output.display());
    Ok(())
}

fn clusters(config: &WaterfinderConfig, input: &Path, bbox: BoundingBox, zoom: u8) -> Result<()> {
    if !bbox.is_finite() {
        bail!("Bounding box must be finite");
    }
    let index = ClusterIndex::build(load_points(input)?, &config.cluster)?;
    let nodes = index.query(&bbox, zoom);
    info!(
        "{} nodes ({} fountains) in view at zoom {}",
        nodes.len(),
        nodes.iter().map(ClusterNode::count).sum::<usize>(),
        zoom
    );
    println!("{}", serde_json::to_string_pretty(&nodes)?);
    Ok(())
}

fn ar_preview(config: &WaterfinderConfig, input: &Path, user: GeoPoint, heading: f64) -> Result<()> {
    if !user.is_valid() {
        bail!("Position ({}, {}) is out of range", user.latitude, user.longitude);
    }
    let points = load_points(input)?;
    let frame = Projector::new(config.overlay.clone()).frame(user, heading, &points);
    match frame.status_line() {
        Some(line) => info!("{}", line),
        None => info!("No fountains in view"),
    }
    println!("{}", serde_json::to_string_pretty(&frame)?);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => WaterfinderConfig::load(path)?,
        None => WaterfinderConfig::default(),
    };

    match cli.command {
        Commands::Convert { input, output } => convert(&input, &output),
        Commands::Clusters { input, bbox, zoom } => clusters(&config, &input, bbox, zoom),
        Commands::Ar {
            input,
            lat,
            lon,
            heading,
        } => ar_preview(&config, &input, GeoPoint::new(lat, lon), heading),
    }
}

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::Weekday;
use clap::Parser;
use taxi_dashboard::{
    ConsoleMap, ConsoleSink, Dashboard, FilterState, LoadDisposition, MapLayer, config::AppConfig,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "taxi-dashboard")]
#[command(about = "Render the taxi-trip analytics dashboard to the terminal")]
struct Args {
    /// Day of week filter (e.g. "mon", "Friday")
    #[arg(long)]
    day: Option<Weekday>,

    /// First pickup hour to include (0-23)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=23))]
    hour_start: Option<u8>,

    /// Last pickup hour to include (0-23)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=23))]
    hour_end: Option<u8>,

    /// Show the pickup cluster layer
    #[arg(long)]
    pickups: bool,

    /// Show the trip flow layer
    #[arg(long)]
    flows: bool,

    /// Config file to use instead of the default search path
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("taxi_dashboard=debug");

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    rt.block_on(async {
        tracing::info!("Using analytics API at {}", config.api.base_url());

        let mut dashboard = Dashboard::from_config(
            &config,
            Arc::new(ConsoleSink::new()),
            Arc::new(ConsoleMap::new()),
        )?;

        let disposition = dashboard
            .with_filters(FilterState::new(args.day, args.hour_start, args.hour_end))
            .initial_load()
            .await;

        // Layers start inactive; toggling redraws with the loaded data.
        if args.pickups {
            dashboard.toggle_layer(MapLayer::Pickups);
        }
        if args.flows {
            dashboard.toggle_layer(MapLayer::Flows);
        }

        match disposition {
            LoadDisposition::Failed => anyhow::bail!("Dashboard could not be loaded"),
            _ => Ok(()),
        }
    })
}

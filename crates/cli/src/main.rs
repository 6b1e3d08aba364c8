mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use spherekeep_core::config::StoreConfig;
use tracing_subscriber::EnvFilter;

/// SphereKeep: local cache of your 360° photospheres
#[derive(Parser)]
#[command(name = "spherekeep", version, about)]
struct Cli {
    /// Path to the photo cache database
    #[arg(long, env = "SPHEREKEEP_DATABASE", default_value_t = default_database_path())]
    database: String,

    /// Log catalog activity to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the cache database if it does not exist yet
    Init,
    /// Import a listing snapshot (JSON array of photo payloads)
    Import {
        /// Path to the snapshot file
        file: PathBuf,
    },
    /// Import a full listing snapshot and drop photos it no longer contains
    Sync {
        /// Path to the snapshot file
        file: PathBuf,
    },
    /// Show one photo with its places and connections
    Show {
        /// Photo ID
        id: String,
        /// Print the upstream-shaped JSON payload instead
        #[arg(long)]
        json: bool,
    },
    /// Correct a photo's pose in the local cache
    Edit {
        /// Photo ID
        id: String,
        #[arg(long, allow_hyphen_values = true, requires = "lng")]
        lat: Option<String>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lng: Option<String>,
        /// Heading in degrees, 0 <= h < 360
        #[arg(long)]
        heading: Option<String>,
    },
    /// List all cached photos, newest upload first
    Ls,
    /// Find photos around a point
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: String,
        #[arg(long, allow_hyphen_values = true)]
        lng: String,
        /// Search radius in meters
        #[arg(long, default_value_t = 300.0)]
        radius: f64,
        /// Photo ID to leave out of the results
        #[arg(long)]
        exclude: Option<String>,
        /// Print upstream-shaped JSON payloads instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print outbound connections of the given photos
    Connections {
        /// Source photo IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Remove cached photos missing from an authoritative ID list
    Reconcile {
        /// File holding a JSON array of IDs, or one ID per line
        ids_file: PathBuf,
    },
    /// Show cache statistics
    Stats,
    /// Print the photo after the given one in listing order
    Next {
        id: String,
    },
    /// Print the photo before the given one in listing order
    Prev {
        id: String,
    },
    /// Dump geolocated photos as JSON map points
    Map,
}

fn default_database_path() -> String {
    StoreConfig::default()
        .database_path
        .to_string_lossy()
        .to_string()
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "spherekeep_core=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = StoreConfig::new(PathBuf::from(&cli.database));
    tracing::debug!(database = %config.database_path.display(), "using photo cache");

    match cli.command {
        Commands::Init => commands::store::init(&config)?,
        Commands::Import { file } => commands::import::import(&config, &file)?,
        Commands::Sync { file } => commands::import::sync(&config, &file)?,
        Commands::Show { id, json } => commands::photos::show(&config, &id, json)?,
        Commands::Edit {
            id,
            lat,
            lng,
            heading,
        } => commands::photos::edit(&config, &id, lat.zip(lng), heading.as_deref())?,
        Commands::Ls => commands::photos::ls(&config)?,
        Commands::Nearby {
            lat,
            lng,
            radius,
            exclude,
            json,
        } => commands::photos::nearby(&config, &lat, &lng, radius, exclude.as_deref(), json)?,
        Commands::Connections { ids } => commands::photos::connections(&config, &ids)?,
        Commands::Reconcile { ids_file } => commands::store::reconcile(&config, &ids_file)?,
        Commands::Stats => commands::store::stats(&config)?,
        Commands::Next { id } => commands::photos::next(&config, &id)?,
        Commands::Prev { id } => commands::photos::prev(&config, &id)?,
        Commands::Map => commands::photos::map(&config)?,
    }

    Ok(())
}

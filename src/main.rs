use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use geofix::config::{AppConfig, ManualEntry};
use geofix::location::{Geolocator, ResolveOverrides, Strategy};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// geofix — best-effort position lookup with a short-term cache
///
/// Resolves the current position from the cached record or, when that is
/// missing or stale, from the configured providers in order.
///
/// Examples:
///   geofix --manual 59.3293,18.0686
///   geofix --provider manual --race
///   geofix --max-age-ms 60000
///   geofix cache
///   geofix providers
#[derive(Parser)]
#[command(name = "geofix", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Manual coordinates "LAT,LON", registered as the `manual` provider.
    #[arg(long, allow_hyphen_values = true, value_parser = parse_manual)]
    manual: Option<ManualEntry>,

    /// Provider chain by name, in order. Repeatable. Overrides the config file.
    #[arg(long = "provider", short = 'p')]
    providers: Vec<String>,

    /// Contact all providers at once and take the first answer.
    #[arg(long)]
    race: bool,

    /// Timeout hint passed to each provider, in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Maximum age of a cached position, in milliseconds.
    #[arg(long)]
    max_age_ms: Option<u64>,

    /// Trust providers to honour their timeout instead of enforcing it.
    #[arg(long)]
    no_enforce_timeout: bool,

    /// Key/value store file (default ~/.geofix/store.json).
    #[arg(long)]
    store: Option<PathBuf>,

    /// Config file (default ~/.config/geofix/config.json).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the current position (default).
    Locate,
    /// Print the cached record, regardless of age.
    Cache,
    /// List registered provider names.
    Providers,
}

fn parse_manual(s: &str) -> Result<ManualEntry, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("Expected LAT,LON, got '{}'", s))?;
    let latitude: f64 = lat.trim().parse().map_err(|_| format!("Invalid latitude '{}'", lat))?;
    let longitude: f64 = lon.trim().parse().map_err(|_| format!("Invalid longitude '{}'", lon))?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err("Invalid coordinates. Lat: -90..90, Lon: -180..180".into());
    }
    Ok(ManualEntry { latitude, longitude })
}

fn init_tracing() {
    // RUST_LOG controls the level, e.g. RUST_LOG=geofix=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("loading configuration")?;

    if cli.manual.is_some() {
        config.manual = cli.manual;
    }
    if !cli.providers.is_empty() {
        config.providers = cli.providers.clone();
    }
    if cli.race {
        config.resolver.strategy = Strategy::Race;
    }
    if cli.no_enforce_timeout {
        config.resolver.enforce_timeout = false;
    }
    if let Some(ms) = cli.timeout_ms {
        config.resolver.provider_timeout_ms = ms;
    }
    if let Some(ms) = cli.max_age_ms {
        config.resolver.maximum_cache_age_ms = ms;
    }
    if cli.store.is_some() {
        config.store_path = cli.store.clone();
    }
    Ok(config)
}

async fn locate(geo: &Geolocator) -> Result<()> {
    if geo.registry().default_providers().is_empty() {
        debug!("no providers configured; only the cache can answer");
    }

    let fix = geo
        .locate_with(ResolveOverrides::default())
        .await
        .context("could not determine position")?;

    info!(source = %fix.source, "located");
    eprintln!("  \u{1F4CD} {} ({})", fix.position, fix.source);
    println!("{}", serde_json::to_string_pretty(&fix)?);
    Ok(())
}

fn show_cache(geo: &Geolocator) -> Result<()> {
    match geo.cache().peek().context("reading cache")? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => bail!("no cached position"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    debug!(store = %config.store_path().display(), "configuration loaded");

    let geo = config.build().context("building geolocator")?;

    match cli.command.unwrap_or(Command::Locate) {
        Command::Locate => locate(&geo).await,
        Command::Cache => show_cache(&geo),
        Command::Providers => {
            for name in geo.registry().names() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

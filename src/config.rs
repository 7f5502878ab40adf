use crate::services::scheduler::{DEFAULT_STARTUP_DELAY, Platform};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// JSON file holding the live graph; in-memory when unset.
    pub state_file: Option<String>,
    pub platform: Platform,
    pub startup_delay: Duration,
    /// Repeat the sweep on this period after the startup sweep.
    pub sweep_interval: Option<Duration>,
    pub dry_run: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Blob store with orphan sweeping")]
pub struct Args {
    /// Host to bind to (overrides BLOB_SWEEPER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BLOB_SWEEPER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where blob payloads are stored (overrides BLOB_SWEEPER_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides BLOB_SWEEPER_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Live graph JSON file (overrides BLOB_SWEEPER_STATE_FILE)
    #[arg(long)]
    pub state_file: Option<String>,

    /// desktop | web | mobile (overrides BLOB_SWEEPER_PLATFORM)
    #[arg(long)]
    pub platform: Option<String>,

    /// Seconds before the startup sweep (overrides BLOB_SWEEPER_STARTUP_DELAY_SECS)
    #[arg(long)]
    pub startup_delay_secs: Option<u64>,

    /// Seconds between periodic sweeps (overrides BLOB_SWEEPER_SWEEP_INTERVAL_SECS)
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,

    /// Report orphans without deleting them
    #[arg(long)]
    pub dry_run: bool,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

/// Read and parse an optional environment variable.
fn env_parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|err| anyhow!("{}", err))
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::from_args(args)?, migrate))
    }

    /// Merge parsed CLI args over the environment.
    pub fn from_args(args: Args) -> Result<Self> {
        let env_host = env::var("BLOB_SWEEPER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parsed::<u16>("BLOB_SWEEPER_PORT")?.unwrap_or(3000);
        let env_storage =
            env::var("BLOB_SWEEPER_STORAGE_DIR").unwrap_or_else(|_| "./data/blobs".into());
        let env_db = env::var("BLOB_SWEEPER_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/blobs.db".into());
        let env_state = env::var("BLOB_SWEEPER_STATE_FILE").ok();
        let env_platform = env_parsed::<Platform>("BLOB_SWEEPER_PLATFORM")?;
        let env_delay = env_parsed::<u64>("BLOB_SWEEPER_STARTUP_DELAY_SECS")?;
        let env_interval = env_parsed::<u64>("BLOB_SWEEPER_SWEEP_INTERVAL_SECS")?;
        let env_dry_run = env_parsed::<bool>("BLOB_SWEEPER_DRY_RUN")?.unwrap_or(false);

        let platform = match args.platform {
            Some(raw) => raw
                .parse::<Platform>()
                .map_err(|err| anyhow!(err))
                .context("parsing --platform")?,
            None => env_platform.unwrap_or(Platform::Web),
        };

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            state_file: args.state_file.or(env_state),
            platform,
            startup_delay: args
                .startup_delay_secs
                .or(env_delay)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_STARTUP_DELAY),
            sweep_interval: args
                .sweep_interval_secs
                .or(env_interval)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            dry_run: args.dry_run || env_dry_run,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

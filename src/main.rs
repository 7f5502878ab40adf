use anyhow::Result;
use axum::Router;
use blob_sweeper::{
    config::AppConfig,
    routes,
    services::{
        graph_source::{GraphSource, InMemoryGraph, JsonFileGraph},
        scheduler::TokioScheduler,
        storage_service::{LocalBlobStore, apply_schema},
        sweep_service::{SweepOptions, Sweeper},
    },
    state::AppState,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting blob-sweeper with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let connect_opts = SqliteConnectOptions::from_str(&cfg.database_url)?.create_if_missing(true);
    if let Some(parent) = connect_opts.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_opts)
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        apply_schema(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // --- Wire store, live graph and sweeper ---
    let store = LocalBlobStore::new(db.clone(), cfg.storage_dir.clone());
    let graph: Arc<dyn GraphSource> = match &cfg.state_file {
        Some(path) => {
            tracing::info!("Reading live graph from {}", path);
            Arc::new(JsonFileGraph::new(path))
        }
        None => Arc::new(InMemoryGraph::default()),
    };
    let sweeper = Arc::new(Sweeper::new(
        Arc::new(store.clone()),
        graph.clone(),
        SweepOptions {
            dry_run: cfg.dry_run,
        },
    ));

    // --- Schedule sweeps ---
    let scheduler = TokioScheduler::new(sweeper.clone(), cfg.platform, cfg.sweep_interval);
    let _sweep_task = scheduler.start(cfg.startup_delay);

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(AppState {
        store,
        graph,
        sweeper,
    });

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

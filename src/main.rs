//! carbon-minimiser: find the greenest time and place to run a job.
//!
//! Single-binary Tokio application that:
//! 1. Keeps a background-refreshed snapshot of Carbon Intensity API forecasts
//! 2. Answers time, location and window queries against it (or live),
//!    over HTTP in `serve` mode or once per CLI invocation
//! 3. Optionally persists every snapshot as flat JSON

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use common::Error;
use minimiser::persist::read_snapshot;
use minimiser::{server, AppContext, QueryParams};

/// Carbon-aware scheduling over UK grid intensity forecasts
#[derive(Parser)]
#[command(
    name = "carbon-minimiser",
    about = "Find the lowest-carbon time and region to run a job"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the refresh loop and the HTTP query server until Ctrl+C.
    Serve,
    /// Check the upstream API is reachable.
    Health,
    /// Creation time of the current snapshot.
    Timestamp,
    /// Greenest half hours across all configured regions.
    Optimise(QueryArgs),
    /// Greenest configured region right now.
    Location,
    /// Greenest half hours in one region.
    LocationTime {
        location: String,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Best start times for a run of HOURS, in one region or across all.
    Window {
        hours: String,
        #[arg(long)]
        location: Option<String>,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Print a persisted snapshot.
    Inspect { path: PathBuf },
}

#[derive(Args)]
struct QueryArgs {
    /// "start,end" in hours from now (default: the whole 48h forecast).
    #[arg(long, allow_hyphen_values = true)]
    range: Option<String>,
    /// Number of options to return (default 1).
    #[arg(long, allow_hyphen_values = true)]
    results: Option<String>,
}

impl From<QueryArgs> for QueryParams {
    fn from(args: QueryArgs) -> Self {
        QueryParams {
            range: args.range,
            results: args.results,
        }
    }
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

fn exit_with(e: Error) -> ! {
    error!("{}", e);
    std::process::exit(if e.is_client_error() { 2 } else { 1 });
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => exit_with(e.into()),
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "carbon_minimiser=info,minimiser=info,carbon_client=info".into()
            }),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Reading a snapshot file needs neither config nor network.
    if let Command::Inspect { path } = &cli.command {
        match read_snapshot(path).await {
            Ok(Some(snapshot)) => match serde_json::to_value(&snapshot) {
                Ok(value) => print_json(&value),
                Err(e) => exit_with(e.into()),
            },
            Ok(None) => {
                error!("No snapshot at {}", path.display());
                std::process::exit(1);
            }
            Err(e) => exit_with(e),
        }
        return;
    }

    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("Upstream: {}", cfg.api_base_url);
    info!("Locations: {:?}", cfg.locations);
    info!(
        "Cache: enabled={} refresh={}s snapshot={:?}",
        cfg.cache.enabled, cfg.cache.refresh_interval_secs, cfg.cache.snapshot_path
    );
    info!("Server: {}", cfg.server.bind);

    let ctx = match AppContext::from_config(cfg) {
        Ok(ctx) => ctx,
        Err(e) => exit_with(e),
    };

    match cli.command {
        Command::Serve => serve(ctx).await,
        Command::Health => {
            let healthy = ctx.source().health_status().await;
            print_json(&json!({ "source": ctx.source().name(), "healthy": healthy }));
            if !healthy {
                std::process::exit(1);
            }
        }
        command => {
            let refresher = match ctx.start() {
                Ok(handle) => handle,
                Err(e) => exit_with(e),
            };
            if let Err(e) = ctx.wait_ready().await {
                exit_with(e);
            }
            let result = run_query(&ctx, command).await;
            if let Some(handle) = refresher {
                handle.abort();
            }
            match result {
                Ok(value) => print_json(&value),
                Err(e) => exit_with(e),
            }
        }
    }
}

async fn run_query(ctx: &AppContext, command: Command) -> Result<Value, Error> {
    let facade = ctx.facade();
    let value = match command {
        Command::Timestamp => json!({ "created": facade.timestamp()? }),
        Command::Optimise(query) => serde_json::to_value(facade.optimise(&query.into()).await?)?,
        Command::Location => serde_json::to_value(facade.optimal_location().await?)?,
        Command::LocationTime { location, query } => {
            serde_json::to_value(facade.location(&location, &query.into()).await?)?
        }
        Command::Window {
            hours,
            location: Some(location),
            query,
        } => serde_json::to_value(
            facade
                .location_window(&location, &hours, &query.into())
                .await?,
        )?,
        Command::Window {
            hours,
            location: None,
            query,
        } => serde_json::to_value(facade.window(&hours, &query.into()).await?)?,
        Command::Serve | Command::Health | Command::Inspect { .. } => Value::Null,
    };
    Ok(value)
}

async fn serve(ctx: AppContext) {
    let ctx = Arc::new(ctx);
    let refresh_handle = match ctx.start() {
        Ok(handle) => handle,
        Err(e) => exit_with(e),
    };
    if refresh_handle.is_none() {
        warn!("Caching is disabled; every query goes to the upstream API.");
    }

    // Heartbeat
    let hb_cache = ctx.cache().cloned();
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match hb_cache.as_ref().map(|cache| cache.current()) {
                Some(Ok(snapshot)) => info!(
                    "HEARTBEAT: snapshot_age={}s keys={} absent={}",
                    (Utc::now() - snapshot.created).num_seconds(),
                    snapshot.len(),
                    snapshot.absent_count()
                ),
                Some(Err(e)) => info!("HEARTBEAT: {}", e),
                None => info!("HEARTBEAT: live mode"),
            }
        }
    });

    // Queries are answered from the start; cached routes return 503 until
    // the first snapshot lands.
    let bind = ctx.config().server.bind.clone();
    let server_handle = tokio::spawn(server::serve(Arc::clone(&ctx), bind));

    let refresh_done = async move {
        match refresh_handle {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    };

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("Carbon minimiser is running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = refresh_done => {
            error!("Refresh task exited: {:?}", r);
        }
        r = heartbeat_handle => {
            error!("Heartbeat task exited: {:?}", r);
        }
        r = server_handle => match r {
            Ok(Ok(())) => error!("HTTP server stopped"),
            Ok(Err(e)) => exit_with(e),
            Err(e) => error!("HTTP server task exited: {:?}", e),
        },
    }

    info!("Carbon minimiser shut down.");
}

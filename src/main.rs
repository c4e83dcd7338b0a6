use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use tokio::net::TcpListener;

use roost::api::{create_router, AppState};
use roost::bus::EventBus;
use roost::config::HubConfig;
use roost::db::Database;
use roost::hub::Hub;
use roost::sharedfs::SharedFs;
use roost::store::Store;
use roost::watcher;
use roost::ws::PushRegistry;

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(cmd) => async_serve(cli.common, cmd),
    }
}

#[tokio::main]
async fn async_serve(common: CommonOpts, cmd: ServeCommand) -> Result<()> {
    handle_serve(common, cmd).await
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Roost - coordination hub for autonomous agents.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the hub server
    Serve(ServeCommand),
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port for both the request API and the push channel
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,
    /// Root of the sandboxed shared workspace
    #[arg(long, env = "SHARED_DIR", default_value = "./shared", value_name = "PATH")]
    shared_dir: PathBuf,
    /// Directory for the database and log files
    #[arg(long, env = "DATA_DIR", default_value = "./data", value_name = "PATH")]
    data_dir: PathBuf,
    /// Log verbosity when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl ServeCommand {
    fn into_config(self) -> HubConfig {
        HubConfig {
            host: self.host,
            port: self.port,
            shared_dir: self.shared_dir,
            data_dir: self.data_dir,
            log_level: self.log_level,
        }
    }
}

/// Stderr logging plus two files under DATA_DIR: the full log and an
/// error-only log.
fn init_logging(common: &CommonOpts, config: &HubConfig) -> Result<()> {
    use tracing_subscriber::{
        filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    };

    let level = if common.quiet {
        "error".to_string()
    } else {
        match common.verbose {
            0 => config.log_level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("roost={level},tower_http={level}")));

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data directory: {}", config.data_dir.display()))?;
    let full_log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
        .with_context(|| format!("opening log file: {}", config.log_path().display()))?;
    let error_log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.error_log_path())
        .with_context(|| format!("opening error log: {}", config.error_log_path().display()))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Arc::new(full_log)))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(error_log))
                .with_filter(LevelFilter::ERROR),
        )
        .try_init()
        .ok();

    Ok(())
}

async fn handle_serve(common: CommonOpts, cmd: ServeCommand) -> Result<()> {
    let config = cmd.into_config();
    init_logging(&common, &config)?;

    info!("starting roost hub...");

    let database = Database::new(&config.db_path()).await?;
    info!("database: {}", config.db_path().display());

    let files = SharedFs::new(&config.shared_dir)
        .with_context(|| format!("preparing shared directory: {}", config.shared_dir.display()))?;

    let store = Store::new(database.pool().clone());
    let bus = EventBus::new();
    let registry = Arc::new(PushRegistry::new());
    let hub = Arc::new(Hub::new(store, bus, registry, config.shared_dir.clone()));
    hub.hydrate().await?;

    watcher::spawn(config.shared_dir.clone(), hub.clone())?;
    info!("watching shared directory: {}", config.shared_dir.display());

    let state = AppState::new(hub, files);
    let router = create_router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("hub listening on {addr}");

    axum::serve(listener, router).await.context("serving")?;
    Ok(())
}

//! fairway-sms - SMS golf roster service
//!
//! Receives IN/OUT texts through the provider webhook, keeps the roster in
//! SQLite and serves the dashboard JSON API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fairway_common::config::{load_toml_config, Config, ConfigOverrides};
use fairway_common::db::init_database;
use fairway_common::notify::{Dispatcher, LogChannel, SmsChannel};
use fairway_sms::twilio::TwilioChannel;
use fairway_sms::{build_router, AppState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for fairway-sms
#[derive(Parser, Debug)]
#[command(name = "fairway-sms")]
#[command(about = "SMS golf roster service")]
#[command(version)]
struct Args {
    /// TOML config file (defaults to the platform config path)
    #[arg(short, long, env = "FAIRWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding fairway.db
    #[arg(short, long, env = "FAIRWAY_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "FAIRWAY_BIND")]
    bind: Option<String>,

    /// Roster capacity for new events
    #[arg(long, env = "FAIRWAY_CAPACITY")]
    capacity: Option<u32>,

    /// Manager phone numbers, comma separated
    #[arg(long, env = "FAIRWAY_MANAGERS", value_delimiter = ',')]
    managers: Option<Vec<String>>,

    /// Log outbound texts instead of sending them
    #[arg(long, env = "FAIRWAY_DRY_RUN")]
    dry_run: bool,

    #[arg(long, env = "FAIRWAY_TWILIO_ACCOUNT_SID")]
    account_sid: Option<String>,

    #[arg(long, env = "FAIRWAY_TWILIO_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    #[arg(long, env = "FAIRWAY_TWILIO_FROM")]
    from_number: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Default log level comes from the config file
    let toml = load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let level = toml.logging.level.clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "fairway_sms={0},fairway_common={0},tower_http={0}",
                    level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting fairway-sms v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = Config::resolve(
        ConfigOverrides {
            root_folder: args.root_folder,
            bind_addr: args.bind,
            capacity: args.capacity,
            manager_phones: args.managers,
            dry_run: args.dry_run,
            account_sid: args.account_sid,
            auth_token: args.auth_token,
            from_number: args.from_number,
        },
        toml,
    )
    .context("Invalid configuration")?;

    info!("Database path: {}", config.db_path.display());
    info!(
        "Capacity {}, {} manager number(s)",
        config.capacity,
        config.manager_phones.len()
    );

    let pool = match init_database(&config.db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e).context("Database initialization failed");
        }
    };

    let channel: Arc<dyn SmsChannel> = match (&config.sms, config.dry_run) {
        (Some(credentials), false) => Arc::new(
            TwilioChannel::new(credentials, config.delivery_timeout)
                .context("Failed to create SMS channel")?,
        ),
        _ => {
            warn!("Dry-run mode: outbound texts are logged, not sent");
            Arc::new(LogChannel)
        }
    };
    let dispatcher = Dispatcher::new(channel, config.delivery_timeout);
    info!("SMS channel: {}", dispatcher.channel_name());

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(pool, config, dispatcher);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!("fairway-sms listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

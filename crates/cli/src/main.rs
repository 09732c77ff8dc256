mod config;
mod health;

use std::{path::PathBuf, sync::Arc};

use {
    clap::Parser,
    secrecy::ExposeSecret,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {cinegate_access::JsonAccessRepository, cinegate_media::JsonMediaCatalog};

#[derive(Parser)]
#[command(name = "cinegate", about = "Cinegate — subscription-gated media bot")]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Config file path (skips discovery).
    #[arg(long, env = "CINEGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the access table and media catalog.
    #[arg(long, env = "CINEGATE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Port for the health listener (overrides config value).
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "cinegate starting");

    let mut app_config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::discover_and_load(),
    };
    config::apply_env_overrides(&mut app_config);

    if app_config.bot.token.expose_secret().is_empty() {
        anyhow::bail!("no bot token; set BOT_TOKEN or bot.token in the config file");
    }
    if app_config.bot.channels.is_empty() {
        warn!("no required channels configured; every user passes the gate");
    }

    let data_dir = config::resolve_data_dir(cli.data_dir.clone(), &app_config);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        warn!(dir = %data_dir.display(), error = %e, "could not create data directory");
    }
    info!(dir = %data_dir.display(), "using data directory");

    let repo = Arc::new(JsonAccessRepository::open(data_dir.join("access.json")).await?);
    let catalog = Arc::new(JsonMediaCatalog::open(data_dir.join("movies.json")).await?);

    let port = cli.port.unwrap_or(app_config.port);
    tokio::spawn(async move {
        if let Err(e) = health::serve(port).await {
            warn!(error = %e, "health listener exited");
        }
    });

    let cancel = cinegate_telegram::bot::start_polling(app_config.bot, repo, catalog).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();
    Ok(())
}

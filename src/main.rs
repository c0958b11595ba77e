use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use matrix_reloaded::application::{Controller, ControllerConfig, MessageAnalyzer};
use matrix_reloaded::infrastructure::image::HttpImageFetcher;
use matrix_reloaded::infrastructure::{
    AppConfig, CommandServer, DisplayClient, ImageCache, IrcConfig, default_cache_dir,
};

/// In-flight work is given this long to finish after the first signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const LICENSE_TEXT: &str = "\
matrix-reloaded is distributed under the terms of the MIT license.
See the LICENSE file or https://opensource.org/licenses/MIT for the full text.";

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_directive()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let config = AppConfig::parse();

    if config.license {
        println!("{LICENSE_TEXT}");
        return Ok(());
    }

    init_logging(&config);
    info!(version = matrix_reloaded::VERSION, "Starting matrix-reloaded");

    if config.purge {
        let dir = default_cache_dir();
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => info!(dir = %dir.display(), "Cache purged"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(dir = %dir.display(), "Cache already empty");
            }
            Err(e) => return Err(eyre!("failed to purge cache directory: {e}")),
        }
        return Ok(());
    }

    if let Err(message) = config.validate() {
        eprintln!("error: {message}");
        std::process::exit(2);
    }

    run(config).await
}

async fn run(config: AppConfig) -> Result<()> {
    let hostname = config
        .matrix_hostname
        .as_deref()
        .ok_or_else(|| eyre!("missing display hostname"))?;

    let display = DisplayClient::new(hostname)?;
    let fetcher = Arc::new(HttpImageFetcher::new()?);
    let cache = Arc::new(ImageCache::open(default_cache_dir(), fetcher).await?);

    let analyzer = MessageAnalyzer::new(config.forbidden_emote_set(), config.no_summation);
    let (command_tx, command_rx) = mpsc::channel(16);

    let controller = Controller::new(
        ControllerConfig {
            startup_channels: config.chan.clone(),
            forbidden_users: config.forbidden_user_set(),
            irc: IrcConfig::default(),
            auto_start: !config.interactive,
        },
        analyzer,
        Box::new(display),
        cache,
        command_rx,
    );

    if let Some(port) = config.command_port {
        let server = CommandServer::bind(port, command_tx.clone())
            .await
            .map_err(|e| eyre!("cannot bind command port {port}: {e}"))?;
        tokio::spawn(server.run());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller_task = tokio::spawn(controller.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    // Orderly teardown within the grace window; a second signal or the
    // deadline forces the issue so shutdown never hangs.
    tokio::select! {
        _ = controller_task => {}
        () = tokio::time::sleep(SHUTDOWN_GRACE) => {
            warn!("Shutdown grace period expired, exiting");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Second signal received, exiting immediately");
        }
    }

    drop(command_tx);
    info!("Bye");
    Ok(())
}

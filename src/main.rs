use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::{debug, error, info, warn};
use stairs_panel::{
    config::AppConfig,
    console::{self, Console},
    device_client::StairsDeviceClient,
    model::PanelState,
    services::{
        controls::ControlBinder,
        poller::Poller,
        sync::{SettingsStore, StoreOptions},
    },
};
use std::{io::Write, sync::Arc};
use tokio::signal::unix::{SignalKind, signal};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize();

    let config = AppConfig::load().context("failed to load configuration")?;
    debug!("configuration: {config:?}");

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    let client = StairsDeviceClient::new().context("failed to create device client")?;
    let store = SettingsStore::new(
        Arc::new(client),
        PanelState::new(config.panel.group_buttons).shared(),
        StoreOptions::from_config(config),
    );

    info!("connecting to {}", config.device.base_url);
    if let Err(e) = store.bootstrap().await {
        // the panel stays usable, the error is shown with the state
        warn!("initial load incomplete: {e:#}");
    }

    let poller = Poller::start(
        store.clone(),
        config.panel.poll_interval(),
        config.panel.settings_refresh(),
    );

    let console = Arc::new(Console::stdio().context("failed to open console")?);
    let binder = ControlBinder::new(store, console.clone());

    tokio::select! {
        result = console::run(console, binder) => {
            result?;
            debug!("console closed");
        },
        _ = tokio::signal::ctrl_c() => {
            debug!("ctrl-c received");
        },
        _ = sigterm.recv() => {
            debug!("SIGTERM received");
        },
    }

    poller.stop();
    info!("shutdown complete");

    Ok(())
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => writeln!(f, "error: {}", record.args()),
        _ => writeln!(f, "{}", record.args()),
    });

    // stdout belongs to the console
    builder.target(Target::Stderr).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));
}

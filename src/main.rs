use std::sync::Arc;

use clap::Parser;

use casita::cli::Cli;
use casita::config::{Config, StoreKind};
use casita::home::HomeService;
use casita::store::{DeviceStore, FirestoreStore, MemoryStore};
use casita::{logging, server};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // The subscriber may not be installed yet when startup fails.
        eprintln!("casita: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    logging::init(&config.logging);
    if !cli.config.exists() {
        tracing::warn!(path = %cli.config.display(), "config file not found, using defaults");
    }

    let kind = if cli.memory { StoreKind::Memory } else { config.store.kind };
    let store: Arc<dyn DeviceStore> = match kind {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Firestore => Arc::new(FirestoreStore::new(
            &config.store.database_url,
            &config.store.project_id,
            &config.store.credentials,
        )?),
    };
    tracing::info!(store = ?kind, "store initialized");

    let listen = cli.listen.unwrap_or(config.server.listen);
    server::serve(&listen, HomeService::new(store)).await?;
    Ok(())
}

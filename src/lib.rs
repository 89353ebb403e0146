pub mod analytics;
pub mod catalog;
pub mod config;
pub mod error;
pub mod geometry;
pub mod navigation;
pub mod overlay;
pub mod repl;
pub mod spotlight;
pub mod storage;
pub mod tour;
mod utils;

use std::{fs, sync::Arc};

use anyhow::{Context, Result};
use tokio::io::BufReader;

use catalog::TourCatalog;
use config::{HostConfig, StoreKind, TourConfig};
use repl::Repl;
use spotlight::HeadlessDocument;
use storage::{JsonFileStore, KeyValueStore, MemoryStore, SqliteStore};
use tour::TourController;

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("tourguide starting up...");

    let host_config = HostConfig::from_env();
    let tour_config = TourConfig::from_env();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let store = open_store(&host_config)?;
        let catalog = Arc::new(load_catalog(&host_config)?);
        log::info!("Loaded {} tours", catalog.tours().len());

        let document = Arc::new(HeadlessDocument::default());
        Repl::seed_targets(&document, &catalog);

        let controller = TourController::new(catalog, store, document.clone(), &tour_config);
        Repl::new(controller, document)
            .run(BufReader::new(tokio::io::stdin()))
            .await
    })
}

fn open_store(config: &HostConfig) -> Result<Arc<dyn KeyValueStore>> {
    if config.store != StoreKind::Memory {
        fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data dir {}", config.data_dir.display())
        })?;
    }

    let store: Arc<dyn KeyValueStore> = match config.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Json => Arc::new(JsonFileStore::new(config.data_dir.join("tourguide.json"))?),
        StoreKind::Sqlite => Arc::new(SqliteStore::new(
            config.data_dir.join("tourguide.sqlite3"),
        )?),
    };
    log::info!("Using {:?} store in {}", config.store, config.data_dir.display());
    Ok(store)
}

fn load_catalog(config: &HostConfig) -> Result<TourCatalog> {
    match &config.catalog_path {
        Some(path) => TourCatalog::from_json_file(path),
        None => Ok(catalog::builtin::catalog()),
    }
}

pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::cache::{KeyValueCollection, Store, TtlCache};
use crate::core::config::AppConfig;
use crate::core::settings::SettingsStore;
use crate::core::watchlist::WatchlistStore;
use crate::providers::AlphaVantageProvider;
use crate::store::KeyValueStore;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Name of the collection holding the watchlist, settings and quote cache.
pub const COLLECTION_NAME: &str = "marketpulse";

pub enum AppCommand {
    Quotes,
    Toggle(Vec<String>),
    Live,
    Refresh(Vec<String>),
    Watch(Duration),
}

/// Everything a command needs, built once at startup.
pub struct App {
    pub config: AppConfig,
    pub watchlist: WatchlistStore,
    pub settings: SettingsStore,
    pub provider: AlphaVantageProvider,
    _store: KeyValueStore,
}

impl App {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let store = if config.persist {
            KeyValueStore::open(&config.default_data_path()?)
        } else {
            KeyValueStore::in_memory()
        };
        let collection: Arc<dyn KeyValueCollection> =
            store.get_collection(COLLECTION_NAME, config.persist);

        let watchlist = WatchlistStore::load(Arc::clone(&collection), &config.watchlist).await;
        let settings = SettingsStore::load(Arc::clone(&collection)).await;
        let provider = AlphaVantageProvider::new(
            config.alpha_vantage_base_url(),
            config.api_key(),
            config.quote_ttl(),
            TtlCache::new(collection),
        )?;

        Ok(Self {
            config,
            watchlist,
            settings,
            provider,
            _store: store,
        })
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("MarketPulse starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {:?}", config.providers);

    let mut app = App::new(config).await?;

    match command {
        AppCommand::Quotes => cli::quotes::show(&app).await,
        AppCommand::Toggle(symbols) => cli::watchlist::toggle(&mut app, &symbols).await,
        AppCommand::Live => cli::watchlist::toggle_live(&mut app).await,
        AppCommand::Refresh(symbols) => cli::quotes::refresh(&app, &symbols).await,
        AppCommand::Watch(interval) => cli::quotes::watch(&app, interval).await,
    }
}

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod mcp;
pub mod normalize;
pub mod prefs;
pub mod search;
pub mod stdio_service;
pub mod tasks;
pub mod tools;
pub mod types;

use std::sync::{Mutex, MutexGuard};

use cache::ResultCache;
use client::ActivityClient;
use config::Config;
use history::SearchHistory;
use prefs::PreferenceStore;
use tasks::TaskStore;
use types::Preferences;

pub use types::*;

/// Long-lived server state: the upstream client plus the three in-memory
/// stores. Each store has its own mutex; they are logically independent and
/// no guard is ever held across an await point.
pub struct AppState {
    pub config: Config,
    pub client: ActivityClient,
    cache: Mutex<ResultCache>,
    preferences: Mutex<PreferenceStore>,
    history: Mutex<SearchHistory>,
    tasks: Mutex<TaskStore>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        let client = ActivityClient::new(
            http_client,
            config.api_base.clone(),
            config.api_key.clone(),
        );
        let defaults = Preferences {
            default_location: config.default_location.clone(),
            default_radius: config.default_radius,
            favorite_categories: Vec::new(),
            exclude_children: false,
        };
        Ok(Self {
            client,
            cache: Mutex::new(ResultCache::new(config.cache_max_entries)),
            preferences: Mutex::new(PreferenceStore::new(defaults)),
            history: Mutex::new(SearchHistory::new()),
            tasks: Mutex::new(TaskStore::new()),
            config,
        })
    }

    pub fn cache(&self) -> MutexGuard<'_, ResultCache> {
        self.cache.lock().expect("cache lock poisoned")
    }

    pub fn preferences(&self) -> MutexGuard<'_, PreferenceStore> {
        self.preferences.lock().expect("preference lock poisoned")
    }

    pub fn history(&self) -> MutexGuard<'_, SearchHistory> {
        self.history.lock().expect("history lock poisoned")
    }

    pub fn tasks(&self) -> MutexGuard<'_, TaskStore> {
        self.tasks.lock().expect("task lock poisoned")
    }
}

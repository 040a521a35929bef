//! Shared application state for request handlers.
use std::sync::Arc;

use reqwest::Client;

use crate::config::Config;
use crate::kit::{KitClient, KitService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub kit: Arc<dyn KitService>,
    /// Client for feed and post-page fetches (loader variant B).
    pub http: Client,
}

impl AppState {
    /// State backed by the real Kit API.
    pub fn new(config: Config) -> Self {
        let kit = Arc::new(KitClient::new(config.kit_api_key.clone()));
        Self::with_service(config, kit)
    }

    /// State with an injected Kit service; used by tests and by callers
    /// that point the client at a different base URL.
    pub fn with_service(config: Config, kit: Arc<dyn KitService>) -> Self {
        let http = Client::builder()
            .user_agent("kit-sync/0.1")
            .build()
            .expect("reqwest client");
        Self {
            config: Arc::new(config),
            kit,
            http,
        }
    }
}

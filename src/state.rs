use crate::auth::TokenAuth;
use crate::config::Config;
use crate::registry::EndpointRegistry;
use crate::store::EndpointStore;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: EndpointRegistry,
    pub auth: TokenAuth,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn EndpointStore>) -> Self {
        Self {
            registry: EndpointRegistry::new(store),
            auth: TokenAuth::new(config.api_token.as_str()),
        }
    }
}

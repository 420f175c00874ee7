//! Persistence of endpoint records.
//!
//! Every backend enforces the (verb, path) uniqueness constraint itself, so two
//! concurrent writes for the same route cannot both succeed.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{Config, StoreBackend};
use crate::endpoint::{Endpoint, Verb};

pub mod memory;
pub mod spanner;

pub use memory::MemoryStore;
pub use spanner::SpannerStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("an endpoint for {verb} {path} already exists")]
    RouteConflict { verb: Verb, path: String },
    #[error("endpoint {0} does not exist")]
    NotFound(Uuid),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EndpointStore: Send + Sync {
    /// All endpoints, oldest first
    async fn list(&self) -> StoreResult<Vec<Endpoint>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Endpoint>>;

    /// Exact match on verb and path. `verb` is the raw request method.
    async fn find_by_route(&self, verb: &str, path: &str) -> StoreResult<Option<Endpoint>>;

    async fn insert(&self, endpoint: &Endpoint) -> StoreResult<()>;

    async fn update(&self, endpoint: &Endpoint) -> StoreResult<()>;

    /// Returns false when no record had this id
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    async fn health_check(&self) -> StoreResult<()>;

    /// Whether another record already occupies (verb, path)
    async fn route_taken(
        &self,
        verb: &str,
        path: &str,
        excluding: Option<Uuid>,
    ) -> StoreResult<bool> {
        Ok(self
            .find_by_route(verb, path)
            .await?
            .is_some_and(|existing| Some(existing.id) != excluding))
    }
}

/// Build the store selected by configuration
pub async fn connect(config: &Config) -> anyhow::Result<Arc<dyn EndpointStore>> {
    match &config.store {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory endpoint store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Spanner(spanner) => Ok(Arc::new(SpannerStore::from_config(spanner).await?)),
    }
}

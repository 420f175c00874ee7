use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EndpointStore, StoreError, StoreResult};
use crate::endpoint::{Endpoint, Verb};

type RouteKey = (Verb, String);

#[derive(Default)]
struct Records {
    // insertion order is creation order
    endpoints: Vec<Endpoint>,
    routes: HashMap<RouteKey, Uuid>,
}

impl Records {
    fn position(&self, id: Uuid) -> Option<usize> {
        self.endpoints.iter().position(|endpoint| endpoint.id == id)
    }
}

fn route_key(endpoint: &Endpoint) -> RouteKey {
    (endpoint.verb, endpoint.path.clone())
}

fn conflict(endpoint: &Endpoint) -> StoreError {
    StoreError::RouteConflict {
        verb: endpoint.verb,
        path: endpoint.path.clone(),
    }
}

/// Process-local endpoint store
///
/// The route index is checked and updated under the same write lock as the
/// records, which makes it the uniqueness constraint for this backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EndpointStore for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Endpoint>> {
        Ok(self.inner.read().await.endpoints.clone())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Endpoint>> {
        let records = self.inner.read().await;
        Ok(records.position(id).map(|index| records.endpoints[index].clone()))
    }

    async fn find_by_route(&self, verb: &str, path: &str) -> StoreResult<Option<Endpoint>> {
        let Ok(verb) = verb.parse::<Verb>() else {
            return Ok(None);
        };

        let records = self.inner.read().await;
        let found = records
            .routes
            .get(&(verb, path.to_string()))
            .and_then(|id| records.position(*id))
            .map(|index| records.endpoints[index].clone());
        Ok(found)
    }

    async fn insert(&self, endpoint: &Endpoint) -> StoreResult<()> {
        let mut records = self.inner.write().await;

        let key = route_key(endpoint);
        if records.routes.contains_key(&key) {
            return Err(conflict(endpoint));
        }

        records.routes.insert(key, endpoint.id);
        records.endpoints.push(endpoint.clone());
        tracing::debug!("Inserted endpoint {} ({} {})", endpoint.id, endpoint.verb, endpoint.path);
        Ok(())
    }

    async fn update(&self, endpoint: &Endpoint) -> StoreResult<()> {
        let mut records = self.inner.write().await;

        let index = records
            .position(endpoint.id)
            .ok_or(StoreError::NotFound(endpoint.id))?;

        let key = route_key(endpoint);
        if records.routes.get(&key).is_some_and(|owner| *owner != endpoint.id) {
            return Err(conflict(endpoint));
        }

        let previous = route_key(&records.endpoints[index]);
        records.routes.remove(&previous);
        records.routes.insert(key, endpoint.id);
        records.endpoints[index] = endpoint.clone();
        tracing::debug!("Updated endpoint {}", endpoint.id);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut records = self.inner.write().await;

        let Some(index) = records.position(id) else {
            return Ok(false);
        };
        let removed = records.endpoints.remove(index);
        records.routes.remove(&route_key(&removed));
        tracing::debug!("Deleted endpoint {}", id);
        Ok(true)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

use std::sync::Arc;

use uuid::Uuid;

use crate::endpoint::{Endpoint, EndpointAttributes, EndpointDraft, FieldError};
use crate::store::{EndpointStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("endpoint not found")]
    NotFound,
    #[error("endpoint failed validation ({} error(s))", .0.len())]
    Invalid(Vec<FieldError>),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            // a concurrent write claimed the route between validation and commit
            StoreError::RouteConflict { .. } => RegistryError::Invalid(vec![FieldError::route_conflict()]),
            StoreError::NotFound(_) => RegistryError::NotFound,
            StoreError::Backend(err) => RegistryError::Store(err),
        }
    }
}

/// Endpoint lifecycle on top of a record store
#[derive(Clone)]
pub struct EndpointRegistry {
    store: Arc<dyn EndpointStore>,
}

impl EndpointRegistry {
    pub fn new(store: Arc<dyn EndpointStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn EndpointStore> {
        &self.store
    }

    pub async fn list(&self) -> Result<Vec<Endpoint>, RegistryError> {
        Ok(self.store.list().await?)
    }

    /// Look up an endpoint by its id as given in a URL. Malformed ids are unknown ids.
    pub async fn get(&self, id: &str) -> Result<Endpoint, RegistryError> {
        let id = Uuid::parse_str(id).map_err(|_| RegistryError::NotFound)?;
        self.store.get(id).await?.ok_or(RegistryError::NotFound)
    }

    /// All failed rules for the draft, including (verb, path) uniqueness
    pub async fn validate(&self, draft: &EndpointDraft) -> Result<Vec<FieldError>, RegistryError> {
        let mut errors = draft.validate();

        if let Some((verb, path)) = draft.route_key() {
            if self.store.route_taken(verb, path, draft.id()).await? {
                errors.push(FieldError::route_conflict());
            }
        }

        Ok(errors)
    }

    pub async fn create(&self, attrs: EndpointAttributes) -> Result<Endpoint, RegistryError> {
        let mut draft = EndpointDraft::new();
        draft.assign(attrs);

        let endpoint = self.commit(draft).await?;
        self.store.insert(&endpoint).await?;

        tracing::info!("Created endpoint {} for {} {}", endpoint.id, endpoint.verb, endpoint.path);
        Ok(endpoint)
    }

    pub async fn update(
        &self,
        existing: &Endpoint,
        attrs: EndpointAttributes,
    ) -> Result<Endpoint, RegistryError> {
        let mut draft = EndpointDraft::from(existing);
        draft.assign(attrs);

        let endpoint = self.commit(draft).await?;
        self.store.update(&endpoint).await?;

        tracing::info!("Updated endpoint {} ({} {})", endpoint.id, endpoint.verb, endpoint.path);
        Ok(endpoint)
    }

    pub async fn delete(&self, id: &str) -> Result<(), RegistryError> {
        let id = Uuid::parse_str(id).map_err(|_| RegistryError::NotFound)?;
        if !self.store.delete(id).await? {
            return Err(RegistryError::NotFound);
        }

        tracing::info!("Deleted endpoint {}", id);
        Ok(())
    }

    /// Find the endpoint registered for an incoming request
    pub async fn resolve(&self, method: &str, path: &str) -> Result<Option<Endpoint>, RegistryError> {
        Ok(self.store.find_by_route(method, path).await?)
    }

    async fn commit(&self, draft: EndpointDraft) -> Result<Endpoint, RegistryError> {
        let errors = self.validate(&draft).await?;
        if !errors.is_empty() {
            return Err(RegistryError::Invalid(errors));
        }
        draft.into_endpoint().map_err(RegistryError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;

    fn registry() -> EndpointRegistry {
        EndpointRegistry::new(Arc::new(MemoryStore::new()))
    }

    fn attrs(verb: &str, path: &str) -> EndpointAttributes {
        EndpointAttributes {
            verb: Some(json!(verb)),
            path: Some(json!(path)),
            response_code: Some(json!(200)),
            response_headers: None,
            response_body: Some(r#"{"ok":true}"#.to_string()),
        }
    }

    fn details(err: RegistryError) -> Vec<String> {
        match err {
            RegistryError::Invalid(errors) => errors.iter().map(FieldError::full_message).collect(),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = registry();
        let created = registry.create(attrs("GET", "/hello")).await.unwrap();

        let fetched = registry.get(&created.id.to_string()).await.unwrap();
        assert_eq!(fetched, created);
        assert!(fetched.response_headers.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_or_malformed_id() {
        let registry = registry();
        assert!(matches!(registry.get("non-existent").await, Err(RegistryError::NotFound)));
        assert!(matches!(
            registry.get(&Uuid::new_v4().to_string()).await,
            Err(RegistryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_route_is_validation_error() {
        let registry = registry();
        registry.create(attrs("GET", "/test")).await.unwrap();

        let err = registry.create(attrs("GET", "/test")).await.unwrap_err();
        assert_eq!(details(err), vec!["Path and verb combination must be unique"]);

        registry.create(attrs("POST", "/test")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_partial_keeps_other_fields() {
        let registry = registry();
        let created = registry.create(attrs("GET", "/partial")).await.unwrap();

        let updated = registry
            .update(
                &created,
                EndpointAttributes {
                    response_code: Some(json!(201)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.path, "/partial");
        assert_eq!(updated.response_code, 201);
        assert_eq!(updated.response_body, created.response_body);
    }

    #[tokio::test]
    async fn test_update_may_keep_its_own_route() {
        let registry = registry();
        let created = registry.create(attrs("GET", "/same")).await.unwrap();

        registry.update(&created, attrs("GET", "/same")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_into_taken_route() {
        let registry = registry();
        registry.create(attrs("GET", "/taken")).await.unwrap();
        let other = registry.create(attrs("GET", "/other")).await.unwrap();

        let err = registry.update(&other, attrs("GET", "/taken")).await.unwrap_err();
        assert_eq!(details(err), vec!["Path and verb combination must be unique"]);
    }

    #[tokio::test]
    async fn test_update_invalid_verb() {
        let registry = registry();
        let created = registry.create(attrs("GET", "/verb")).await.unwrap();

        let err = registry
            .update(
                &created,
                EndpointAttributes {
                    verb: Some(json!("INVALID")),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(details(err), vec!["Verb is not included in the list"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let registry = registry();
        let created = registry.create(attrs("DELETE", "/bye")).await.unwrap();

        registry.delete(&created.id.to_string()).await.unwrap();
        assert!(matches!(
            registry.delete(&created.id.to_string()).await,
            Err(RegistryError::NotFound)
        ));
        assert!(matches!(registry.delete("garbage").await, Err(RegistryError::NotFound)));
    }

    #[tokio::test]
    async fn test_resolve_exact_match_only() {
        let registry = registry();
        let created = registry.create(attrs("GET", "/api/items")).await.unwrap();

        let resolved = registry.resolve("GET", "/api/items").await.unwrap();
        assert_eq!(resolved.map(|e| e.id), Some(created.id));

        for (method, path) in [
            ("POST", "/api/items"),
            ("GET", "/api"),
            ("GET", "/api/items/"),
            ("GET", "/api/items/1"),
            ("get", "/api/items"),
        ] {
            assert!(
                registry.resolve(method, path).await.unwrap().is_none(),
                "{} {} should not resolve",
                method,
                path
            );
        }
    }

    #[tokio::test]
    async fn test_concurrent_creates_single_winner() {
        let registry = registry();

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.create(attrs("POST", "/race")).await })
            })
            .collect();

        let mut successes = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert_eq!(details(err), vec!["Path and verb combination must be unique"]),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    /// Store whose uniqueness check always passes, so conflicts only show up on write
    struct RacingStore(MemoryStore);

    #[async_trait]
    impl EndpointStore for RacingStore {
        async fn list(&self) -> crate::store::StoreResult<Vec<Endpoint>> {
            self.0.list().await
        }
        async fn get(&self, id: Uuid) -> crate::store::StoreResult<Option<Endpoint>> {
            self.0.get(id).await
        }
        async fn find_by_route(&self, _verb: &str, _path: &str) -> crate::store::StoreResult<Option<Endpoint>> {
            Ok(None)
        }
        async fn insert(&self, endpoint: &Endpoint) -> crate::store::StoreResult<()> {
            self.0.insert(endpoint).await
        }
        async fn update(&self, endpoint: &Endpoint) -> crate::store::StoreResult<()> {
            self.0.update(endpoint).await
        }
        async fn delete(&self, id: Uuid) -> crate::store::StoreResult<bool> {
            self.0.delete(id).await
        }
        async fn health_check(&self) -> crate::store::StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_write_conflict_surfaces_as_validation_error() {
        let registry = EndpointRegistry::new(Arc::new(RacingStore(MemoryStore::new())));
        registry.create(attrs("GET", "/late")).await.unwrap();

        let err = registry.create(attrs("GET", "/late")).await.unwrap_err();
        assert_eq!(details(err), vec!["Path and verb combination must be unique"]);
    }

    /// Store that fails every operation
    struct BrokenStore;

    #[async_trait]
    impl EndpointStore for BrokenStore {
        async fn list(&self) -> crate::store::StoreResult<Vec<Endpoint>> {
            Err(anyhow::anyhow!("connection refused").into())
        }
        async fn get(&self, _id: Uuid) -> crate::store::StoreResult<Option<Endpoint>> {
            Err(anyhow::anyhow!("connection refused").into())
        }
        async fn find_by_route(&self, _verb: &str, _path: &str) -> crate::store::StoreResult<Option<Endpoint>> {
            Err(anyhow::anyhow!("connection refused").into())
        }
        async fn insert(&self, _endpoint: &Endpoint) -> crate::store::StoreResult<()> {
            Err(anyhow::anyhow!("connection refused").into())
        }
        async fn update(&self, _endpoint: &Endpoint) -> crate::store::StoreResult<()> {
            Err(anyhow::anyhow!("connection refused").into())
        }
        async fn delete(&self, _id: Uuid) -> crate::store::StoreResult<bool> {
            Err(anyhow::anyhow!("connection refused").into())
        }
        async fn health_check(&self) -> crate::store::StoreResult<()> {
            Err(anyhow::anyhow!("connection refused").into())
        }
    }

    #[tokio::test]
    async fn test_storage_faults_are_not_masked() {
        let registry = EndpointRegistry::new(Arc::new(BrokenStore));

        assert!(matches!(registry.list().await, Err(RegistryError::Store(_))));
        assert!(matches!(
            registry.create(attrs("GET", "/x")).await,
            Err(RegistryError::Store(_))
        ));
        assert!(matches!(registry.resolve("GET", "/x").await, Err(RegistryError::Store(_))));
    }
}

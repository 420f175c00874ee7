use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gcloud_gax::grpc::{Code, Status};
use gcloud_googleapis::spanner::admin::database::v1::{
    CreateDatabaseRequest, GetDatabaseDdlRequest, GetDatabaseRequest, UpdateDatabaseDdlRequest,
};
use gcloud_googleapis::spanner::admin::instance::v1::{
    CreateInstanceRequest, GetInstanceRequest, Instance,
};
use gcloud_googleapis::spanner::v1::Mutation;
use gcloud_spanner::admin::AdminClientConfig;
use gcloud_spanner::admin::client::Client as AdminClient;
use gcloud_spanner::client::{Client, ClientConfig, Error as ClientError};
use gcloud_spanner::key::Key;
use gcloud_spanner::mutation::{delete, insert, update};
use gcloud_spanner::row::Row;
use gcloud_spanner::statement::Statement;
use gcloud_spanner::value::CommitTimestamp;
use uuid::Uuid;

use super::{EndpointStore, StoreError, StoreResult};
use crate::config::SpannerConfig;
use crate::endpoint::{Endpoint, Verb};

const TABLE: &str = "endpoints";
const ROUTE_INDEX: &str = "endpoints_by_route";
const COLUMNS: &str = "id, verb, path, response_code, response_headers, response_body, created_at, updated_at";

/// Endpoint store backed by Cloud Spanner
///
/// The (verb, path) constraint is the `endpoints_by_route` unique index; a write
/// that violates it fails with ALREADY_EXISTS and surfaces as a route conflict.
#[derive(Clone)]
pub struct SpannerStore {
    inner: Arc<Client>,
}

impl SpannerStore {
    /// Connect to Spanner, provisioning the instance, database, table and
    /// index first if they do not exist yet.
    ///
    /// The gcloud-spanner library picks up SPANNER_EMULATOR_HOST on its own and
    /// connects to the emulator when it is set.
    pub async fn from_config(config: &SpannerConfig) -> Result<Self> {
        auto_provision(config).await?;

        let database_path = config.database_path();

        match &config.emulator_host {
            Some(host) => tracing::info!("Connecting to Spanner emulator at: {}", host),
            None => tracing::info!("Connecting to production Spanner"),
        }

        let client = Client::new(&database_path, ClientConfig::default())
            .await
            .context("Failed to create Spanner client")?;

        tracing::info!("Successfully connected to Spanner database: {}", database_path);

        Ok(Self {
            inner: Arc::new(client),
        })
    }

    async fn query(&self, statement: Statement) -> Result<Vec<Endpoint>> {
        let mut tx = self
            .inner
            .single()
            .await
            .context("Failed to create read transaction")?;

        let mut result_set = tx
            .query(statement)
            .await
            .context("Failed to query endpoints from Spanner")?;

        let mut endpoints = Vec::new();
        while let Some(row) = result_set
            .next()
            .await
            .context("Failed to read endpoint row")?
        {
            endpoints.push(endpoint_from_row(&row)?);
        }
        Ok(endpoints)
    }

    async fn write(&self, endpoint: &Endpoint, mutation: Mutation) -> StoreResult<()> {
        match self.inner.apply(vec![mutation]).await {
            Ok(_) => Ok(()),
            Err(ClientError::GRPC(status)) if status.code() == Code::AlreadyExists => {
                tracing::debug!("Route {} {} rejected by unique index", endpoint.verb, endpoint.path);
                Err(StoreError::RouteConflict {
                    verb: endpoint.verb,
                    path: endpoint.path.clone(),
                })
            }
            Err(ClientError::GRPC(status)) if status.code() == Code::NotFound => {
                Err(StoreError::NotFound(endpoint.id))
            }
            Err(e) => Err(StoreError::Backend(
                anyhow::Error::new(e).context("Failed to write endpoint to Spanner"),
            )),
        }
    }
}

fn endpoint_from_row(row: &Row) -> Result<Endpoint> {
    let id: String = row.column_by_name("id")?;
    let verb: String = row.column_by_name("verb")?;
    let path: String = row.column_by_name("path")?;
    let response_code: i64 = row.column_by_name("response_code")?;
    let headers_str: String = row.column_by_name("response_headers")?;
    let response_body: Option<String> = row.column_by_name("response_body")?;
    let created_at_str: String = row.column_by_name("created_at")?;
    let updated_at_str: String = row.column_by_name("updated_at")?;

    let response_headers: BTreeMap<String, String> = serde_json::from_str(&headers_str)
        .context("Failed to deserialize response headers")?;

    Ok(Endpoint {
        id: Uuid::parse_str(&id).context("Stored endpoint id is not a UUID")?,
        verb: verb.parse::<Verb>()?,
        path,
        response_code: u16::try_from(response_code).context("Stored response code out of range")?,
        response_headers,
        response_body,
        created_at: parse_timestamp(&created_at_str).context("Failed to parse created_at timestamp")?,
        updated_at: parse_timestamp(&updated_at_str).context("Failed to parse updated_at timestamp")?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn row_values(endpoint: &Endpoint) -> Result<(String, String, String, i64, String, Option<String>)> {
    let headers = serde_json::to_string(&endpoint.response_headers)
        .context("Failed to serialize response headers")?;
    Ok((
        endpoint.id.to_string(),
        endpoint.verb.to_string(),
        endpoint.path.clone(),
        i64::from(endpoint.response_code),
        headers,
        endpoint.response_body.clone(),
    ))
}

#[async_trait]
impl EndpointStore for SpannerStore {
    async fn list(&self) -> StoreResult<Vec<Endpoint>> {
        let statement = Statement::new(format!(
            "SELECT {} FROM {} ORDER BY created_at ASC, id ASC",
            COLUMNS, TABLE
        ));
        let endpoints = self.query(statement).await?;
        tracing::debug!("Listed {} endpoints", endpoints.len());
        Ok(endpoints)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Endpoint>> {
        let mut statement = Statement::new(format!("SELECT {} FROM {} WHERE id = @id", COLUMNS, TABLE));
        statement.add_param("id", &id.to_string());

        Ok(self.query(statement).await?.into_iter().next())
    }

    async fn find_by_route(&self, verb: &str, path: &str) -> StoreResult<Option<Endpoint>> {
        let mut statement = Statement::new(format!(
            "SELECT {} FROM {} WHERE verb = @verb AND path = @path",
            COLUMNS, TABLE
        ));
        statement.add_param("verb", &verb.to_string());
        statement.add_param("path", &path.to_string());

        Ok(self.query(statement).await?.into_iter().next())
    }

    async fn insert(&self, endpoint: &Endpoint) -> StoreResult<()> {
        let (id, verb, path, code, headers, body) = row_values(endpoint)?;
        let mutation = insert(
            TABLE,
            &["id", "verb", "path", "response_code", "response_headers", "response_body", "created_at", "updated_at"],
            &[&id, &verb, &path, &code, &headers, &body, &CommitTimestamp::new(), &CommitTimestamp::new()],
        );

        self.write(endpoint, mutation).await?;
        tracing::debug!("Inserted endpoint with id: {}", endpoint.id);
        Ok(())
    }

    async fn update(&self, endpoint: &Endpoint) -> StoreResult<()> {
        let (id, verb, path, code, headers, body) = row_values(endpoint)?;
        let mutation = update(
            TABLE,
            &["id", "verb", "path", "response_code", "response_headers", "response_body", "updated_at"],
            &[&id, &verb, &path, &code, &headers, &body, &CommitTimestamp::new()],
        );

        self.write(endpoint, mutation).await?;
        tracing::debug!("Updated endpoint with id: {}", endpoint.id);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        if self.get(id).await?.is_none() {
            return Ok(false);
        }

        let id_str = id.to_string();
        self.inner
            .apply(vec![delete(TABLE, Key::new(&id_str))])
            .await
            .context("Failed to delete endpoint from Spanner")?;

        tracing::debug!("Deleted endpoint with id: {}", id);
        Ok(true)
    }

    async fn health_check(&self) -> StoreResult<()> {
        let statement = Statement::new("SELECT 1");

        let mut tx = self
            .inner
            .single()
            .await
            .context("Failed to create health check transaction")?;

        let mut result_set = tx
            .query(statement)
            .await
            .context("Failed to execute health check query")?;

        if result_set.next().await.context("Health check query failed")?.is_some() {
            tracing::debug!("Health check query succeeded");
            Ok(())
        } else {
            Err(anyhow::anyhow!("Health check query returned no results").into())
        }
    }
}

/// Make sure the instance, database, table and route index exist
async fn auto_provision(config: &SpannerConfig) -> Result<()> {
    let admin_client = AdminClient::new(AdminClientConfig::default())
        .await
        .context("Failed to create Spanner admin client")?;

    let project_path = format!("projects/{}", config.project);
    let instance_path = format!("{}/instances/{}", project_path, config.instance);
    let database_path = config.database_path();

    ensure_instance_exists(&admin_client, config, &project_path, &instance_path).await?;
    ensure_database_exists(&admin_client, &instance_path, &database_path, &config.database).await?;
    ensure_schema_exists(&admin_client, &database_path).await?;

    tracing::info!("Spanner schema ready for {}", database_path);
    Ok(())
}

/// Whether an admin lookup found the resource. NOT_FOUND is not an error here.
fn found<T>(lookup: std::result::Result<T, Status>, resource: &str) -> Result<bool> {
    match lookup {
        Ok(_) => Ok(true),
        Err(status) if status.code() == Code::NotFound => Ok(false),
        Err(status) => Err(anyhow::anyhow!("Failed to look up {}: {}", resource, status.message())),
    }
}

async fn ensure_instance_exists(
    admin_client: &AdminClient,
    config: &SpannerConfig,
    project_path: &str,
    instance_path: &str,
) -> Result<()> {
    let lookup = admin_client
        .instance()
        .get_instance(
            GetInstanceRequest {
                name: instance_path.to_string(),
                field_mask: None,
            },
            None,
        )
        .await;
    if found(lookup, instance_path)? {
        tracing::debug!("Spanner instance {} present", instance_path);
        return Ok(());
    }

    // the emulator only knows its own instance config
    let instance_config = match config.emulator_host {
        Some(_) => format!("{}/instanceConfigs/emulator-config", project_path),
        None => format!("{}/instanceConfigs/regional-us-central1", project_path),
    };
    let request = CreateInstanceRequest {
        parent: project_path.to_string(),
        instance_id: config.instance.clone(),
        instance: Some(Instance {
            name: instance_path.to_string(),
            config: instance_config,
            display_name: format!("mock-endpoints {}", config.instance),
            node_count: 1,
            ..Default::default()
        }),
    };

    admin_client
        .instance()
        .create_instance(request, None)
        .await
        .with_context(|| format!("Failed to request instance {}", instance_path))?
        .wait(None)
        .await
        .with_context(|| format!("Instance {} was not created", instance_path))?;

    tracing::info!("Provisioned Spanner instance {}", instance_path);
    Ok(())
}

async fn ensure_database_exists(
    admin_client: &AdminClient,
    instance_path: &str,
    database_path: &str,
    database_id: &str,
) -> Result<()> {
    let lookup = admin_client
        .database()
        .get_database(
            GetDatabaseRequest {
                name: database_path.to_string(),
            },
            None,
        )
        .await;
    if found(lookup, database_path)? {
        tracing::debug!("Spanner database {} present", database_path);
        return Ok(());
    }

    // the endpoints table and route index are added by ensure_schema_exists
    let request = CreateDatabaseRequest {
        parent: instance_path.to_string(),
        create_statement: format!("CREATE DATABASE `{}`", database_id),
        extra_statements: vec![],
        encryption_config: None,
        database_dialect: 1,
        proto_descriptors: vec![],
    };

    admin_client
        .database()
        .create_database(request, None)
        .await
        .with_context(|| format!("Failed to request database {}", database_path))?
        .wait(None)
        .await
        .with_context(|| format!("Database {} was not created", database_path))?;

    tracing::info!("Provisioned Spanner database {}", database_path);
    Ok(())
}

fn schema_statements(existing: &[String]) -> Vec<String> {
    let mut statements = Vec::new();

    let table_exists = existing
        .iter()
        .any(|stmt| stmt.contains("CREATE TABLE endpoints") || stmt.contains("CREATE TABLE `endpoints`"));
    if !table_exists {
        statements.push(
            r#"
CREATE TABLE endpoints (
    id STRING(36) NOT NULL,
    verb STRING(16) NOT NULL,
    path STRING(MAX) NOT NULL,
    response_code INT64 NOT NULL,
    response_headers JSON NOT NULL,
    response_body STRING(MAX),
    created_at TIMESTAMP NOT NULL OPTIONS (allow_commit_timestamp=true),
    updated_at TIMESTAMP NOT NULL OPTIONS (allow_commit_timestamp=true),
) PRIMARY KEY (id)
"#
            .trim()
            .to_string(),
        );
    }

    let index_exists = existing.iter().any(|stmt| stmt.contains(ROUTE_INDEX));
    if !index_exists {
        statements.push(format!(
            "CREATE UNIQUE INDEX {} ON {} (verb, path)",
            ROUTE_INDEX, TABLE
        ));
    }

    statements
}

async fn ensure_schema_exists(admin_client: &AdminClient, database_path: &str) -> Result<()> {
    let get_ddl_request = GetDatabaseDdlRequest {
        database: database_path.to_string(),
    };

    let ddl_response = admin_client
        .database()
        .get_database_ddl(get_ddl_request, None)
        .await
        .context("Failed to get database DDL")?;

    let statements = schema_statements(&ddl_response.into_inner().statements);
    if statements.is_empty() {
        tracing::info!("Table '{}' and index '{}' already exist", TABLE, ROUTE_INDEX);
        return Ok(());
    }

    tracing::info!("Applying {} schema statement(s)...", statements.len());

    let update_request = UpdateDatabaseDdlRequest {
        database: database_path.to_string(),
        statements,
        operation_id: String::new(),
        proto_descriptors: vec![],
        throughput_mode: false,
    };

    let mut operation = admin_client
        .database()
        .update_database_ddl(update_request, None)
        .await
        .context("Failed to start schema creation")?;

    operation
        .wait(None)
        .await
        .context("Failed to create schema")?;

    tracing::info!("Schema for '{}' created successfully", TABLE);
    Ok(())
}

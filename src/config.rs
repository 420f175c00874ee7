use std::env;
use std::fmt;
use anyhow::{Context, Result, bail};

/// Connection settings for the Cloud Spanner backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannerConfig {
    pub emulator_host: Option<String>,
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl SpannerConfig {
    fn from_env() -> Result<Self> {
        let emulator_host = env::var("SPANNER_EMULATOR_HOST").ok();

        let project = env::var("SPANNER_PROJECT")
            .context("SPANNER_PROJECT environment variable is required")?;

        let instance = env::var("SPANNER_INSTANCE")
            .context("SPANNER_INSTANCE environment variable is required")?;

        let database = env::var("SPANNER_DATABASE")
            .context("SPANNER_DATABASE environment variable is required")?;

        Ok(SpannerConfig {
            emulator_host,
            project,
            instance,
            database,
        })
    }

    pub fn database_path(&self) -> String {
        format!(
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

/// Where endpoint records are persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Spanner(SpannerConfig),
}

#[derive(Clone)]
pub struct Config {
    pub api_token: String,
    pub store: StoreBackend,
    pub service_port: u16,
    pub service_host: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_token", &"<redacted>")
            .field("store", &self.store)
            .field("service_port", &self.service_port)
            .field("service_host", &self.service_host)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_token = env::var("API_TOKEN")
            .context("API_TOKEN environment variable is required")?;
        if api_token.trim().is_empty() {
            bail!("API_TOKEN must not be empty");
        }

        let store = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "spanner" => StoreBackend::Spanner(SpannerConfig::from_env()?),
            other => bail!("STORE_BACKEND must be 'memory' or 'spanner', got '{}'", other),
        };

        let service_port = env::var("SERVICE_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("SERVICE_PORT must be a valid port number (0-65535)")?;

        let service_host = env::var("SERVICE_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(Config {
            api_token,
            store,
            service_port,
            service_host,
        })
    }

    pub fn log_startup(&self) {
        tracing::info!("Configuration loaded:");
        match &self.store {
            StoreBackend::Memory => tracing::info!("  Store: in-memory"),
            StoreBackend::Spanner(spanner) => {
                tracing::info!("  Store: Cloud Spanner");
                tracing::info!("  Spanner emulator: {}",
                    spanner.emulator_host.as_deref().unwrap_or("disabled (using production)"));
                tracing::info!("  Spanner database: {}", spanner.database_path());
            }
        }
        tracing::info!("  Service listening on: {}:{}", self.service_host, self.service_port);
    }
}

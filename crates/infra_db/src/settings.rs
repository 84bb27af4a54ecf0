//! Application configuration
//!
//! Settings are read from the environment (after loading a `.env` file if one
//! exists) with the `LEDGER` prefix and `__` as the nesting separator:
//!
//! ```text
//! LEDGER__DATABASE__URL=postgres://localhost/tuition_ledger
//! LEDGER__DATABASE__MAX_CONNECTIONS=10
//! LEDGER__DATABASE__MIN_CONNECTIONS=1
//! LEDGER__DATABASE__ACQUIRE_TIMEOUT_SECS=30
//! LEDGER__DATABASE__MAX_LIFETIME_SECS=1800
//! LEDGER__DATABASE__IDLE_TIMEOUT_SECS=600
//! LEDGER__LEDGER__TIMEZONE=America/Lima
//! LEDGER__LEDGER__INSTALLMENT_DUE_DAY=30
//! LEDGER__LEDGER__MAX_CODE_ATTEMPTS=999
//! LEDGER__LOG_LEVEL=info
//! ```

use std::time::Duration;

use serde::Deserialize;

use core_kernel::CoreError;
use domain_ledger::LedgerSettings;

use crate::pool::{DatabaseConfig, DEFAULT_DATABASE_URL};

/// Connection settings for PostgreSQL
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        let pool = DatabaseConfig::new(DEFAULT_DATABASE_URL);
        Self {
            url: pool.url,
            max_connections: pool.max_connections,
            min_connections: pool.min_connections,
            acquire_timeout_secs: pool.acquire_timeout.as_secs(),
            max_lifetime_secs: pool.max_lifetime.as_secs(),
            idle_timeout_secs: pool.idle_timeout.as_secs(),
        }
    }
}

impl DatabaseSettings {
    /// Pool configuration for these settings
    pub fn pool_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            max_lifetime: Duration::from_secs(self.max_lifetime_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.max_connections == 0 {
            return Err(CoreError::configuration("database.max_connections must be at least 1"));
        }
        if self.min_connections > self.max_connections {
            return Err(CoreError::configuration(format!(
                "database.min_connections ({}) exceeds database.max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        if self.acquire_timeout_secs == 0 {
            return Err(CoreError::configuration("database.acquire_timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

/// Everything a ledger process needs to start
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub ledger: LedgerSettings,
    pub log_level: String,
}

impl AppConfig {
    /// Loads configuration from `.env` and the process environment
    pub fn load() -> Result<Self, CoreError> {
        dotenvy::dotenv().ok();
        Self::from_source(
            config::Environment::with_prefix("LEDGER")
                .separator("__")
                .try_parsing(true),
        )
    }

    /// Builds configuration from an arbitrary source, then validates it
    pub fn from_source<S>(source: S) -> Result<Self, CoreError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let mut app: AppConfig = config::Config::builder()
            .add_source(source)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CoreError::configuration(e.to_string()))?;

        if app.log_level.trim().is_empty() {
            app.log_level = "info".to_string();
        }
        app.database.validate()?;
        app.ledger.validate()?;
        Ok(app)
    }
}

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

use crate::database::manager::DatabaseError;

/// Errors raised while validating resolved configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid identifier for {setting}: {value:?}")]
    InvalidIdentifier { setting: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub dataset: DatasetConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the individual parts
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: u16,
    pub name: Option<String>,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub sslmode: Option<String>,
    pub max_connections: u32,
    /// Pool acquire timeout, seconds
    pub connection_timeout: u64,
    /// Server-side statement timeout per read; 0 disables
    pub statement_timeout_ms: u64,
}

/// Physical location of the exposed view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub schema: String,
    pub relation: String,
    pub time_column: String,
    pub tiebreak_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_keys: usize,
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Expected X-API-KEY value. Empty means every protected request is denied.
    #[serde(skip_serializing)]
    pub api_key: String,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(lookup)
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Database connection
        self.database.url = get("DATABASE_URL").or(self.database.url);
        self.database.host = get("DB_HOST").or(self.database.host);
        if let Some(v) = get("DB_PORT") {
            self.database.port = v.parse().unwrap_or(self.database.port);
        }
        self.database.name = get("DB_NAME").or(self.database.name);
        self.database.user = get("DB_USER").or(self.database.user);
        self.database.password = get("DB_PASSWORD").or(self.database.password);
        self.database.sslmode = get("DB_SSLMODE").or(self.database.sslmode);

        // Database pool
        if let Some(v) = get("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = get("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Some(v) = get("DATABASE_STATEMENT_TIMEOUT_MS") {
            self.database.statement_timeout_ms = v.parse().unwrap_or(self.database.statement_timeout_ms);
        }

        // Dataset location
        if let Some(v) = get("DATASET_SCHEMA") {
            self.dataset.schema = v.trim().to_string();
        }
        if let Some(v) = get("DATASET_RELATION") {
            self.dataset.relation = v.trim().to_string();
        }
        if let Some(v) = get("DATASET_TIME_COLUMN") {
            self.dataset.time_column = v.trim().to_string();
        }
        if let Some(v) = get("DATASET_TIEBREAK_COLUMNS") {
            self.dataset.tiebreak_columns = split_list(&v);
        }

        // API overrides
        if let Some(v) = get("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Some(v) = get("API_RATE_LIMIT_REQUESTS") {
            self.api.rate_limit_requests = v.parse().unwrap_or(self.api.rate_limit_requests);
        }
        if let Some(v) = get("API_RATE_LIMIT_WINDOW_SECS") {
            self.api.rate_limit_window_secs = v.parse().unwrap_or(self.api.rate_limit_window_secs);
        }
        if let Some(v) = get("API_RATE_LIMIT_MAX_KEYS") {
            self.api.rate_limit_max_keys = v.parse().unwrap_or(self.api.rate_limit_max_keys);
        }
        if let Some(v) = get("API_TRUST_FORWARDED_FOR") {
            self.api.trust_forwarded_for = v.parse().unwrap_or(self.api.trust_forwarded_for);
        }

        // Security overrides. The key is taken verbatim, never trimmed.
        if let Some(v) = lookup("API_KEY") {
            self.security.api_key = v;
        }
        if let Some(v) = get("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Some(v) = get("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }

        self
    }

    /// Reject settings that would otherwise surface as failures per request
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_identifier("DATASET_SCHEMA", &self.dataset.schema)?;
        check_identifier("DATASET_RELATION", &self.dataset.relation)?;
        check_identifier("DATASET_TIME_COLUMN", &self.dataset.time_column)?;
        for column in &self.dataset.tiebreak_columns {
            check_identifier("DATASET_TIEBREAK_COLUMNS", column)?;
        }

        if self.api.enable_rate_limiting {
            if self.api.rate_limit_requests == 0 {
                return Err(ConfigError::NonPositive("API_RATE_LIMIT_REQUESTS"));
            }
            if self.api.rate_limit_window_secs == 0 {
                return Err(ConfigError::NonPositive("API_RATE_LIMIT_WINDOW_SECS"));
            }
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::NonPositive("DATABASE_MAX_CONNECTIONS"));
        }
        Ok(())
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 5,
                connection_timeout: 30,
                statement_timeout_ms: 0,
                ..DatabaseConfig::default()
            },
            dataset: DatasetConfig::default(),
            api: ApiConfig::default(),
            security: SecurityConfig {
                api_key: String::new(),
                enable_cors: true,
                cors_origins: vec![],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 10,
                statement_timeout_ms: 30_000,
                ..DatabaseConfig::default()
            },
            dataset: DatasetConfig::default(),
            api: ApiConfig::default(),
            security: SecurityConfig {
                api_key: String::new(),
                enable_cors: false,
                cors_origins: vec![],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 5,
                statement_timeout_ms: 15_000,
                ..DatabaseConfig::default()
            },
            dataset: DatasetConfig::default(),
            api: ApiConfig::default(),
            security: SecurityConfig {
                api_key: String::new(),
                enable_cors: false,
                cors_origins: vec![],
            },
        }
    }
}

impl DatabaseConfig {
    /// Assemble the connection descriptor. DATABASE_URL wins; otherwise the
    /// parts are combined with user and password percent-encoded.
    pub fn connection_url(&self) -> Result<String, DatabaseError> {
        if let Some(url) = &self.url {
            url::Url::parse(url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
            return Ok(url.clone());
        }

        let host = self.host.as_deref().ok_or(DatabaseError::ConfigMissing("DB_HOST"))?;
        let name = self.name.as_deref().ok_or(DatabaseError::ConfigMissing("DB_NAME"))?;

        let mut url = url::Url::parse("postgres://localhost").map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        url.set_host(Some(host)).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        url.set_port(Some(self.port)).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        url.set_path(&format!("/{}", name));
        if let Some(user) = &self.user {
            url.set_username(user).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        if let Some(password) = &self.password {
            url.set_password(Some(password)).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        if let Some(mode) = &self.sslmode {
            url.query_pairs_mut().append_pair("sslmode", mode);
        }
        Ok(url.into())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: 5432,
            name: None,
            user: None,
            password: None,
            sslmode: None,
            max_connections: 5,
            connection_timeout: 30,
            statement_timeout_ms: 0,
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            schema: "api".to_string(),
            relation: "v_ecom_events".to_string(),
            time_column: "event_time".to_string(),
            tiebreak_columns: vec![],
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enable_rate_limiting: true,
            rate_limit_requests: 30,
            rate_limit_window_secs: 60,
            rate_limit_max_keys: 100_000,
            trust_forwarded_for: false,
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Plain SQL identifier: ASCII letter or underscore, then letters, digits, underscores
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(setting: &'static str, value: &str) -> Result<(), ConfigError> {
    if is_valid_identifier(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier { setting, value: value.to_string() })
    }
}

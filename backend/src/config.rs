//! Configuration management for the transfer service
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with XFER prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

use shared::allocation::{DemandPolicy, DEFAULT_DEFICIT_THRESHOLD};
use shared::transfer::FactorySettings;
use shared::{StoreCode, TaskPriority};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Allocation run parameters
    pub allocation: AllocationConfig,

    /// Push update channel
    pub events: EventsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for verifying JWT tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AllocationConfig {
    /// Identifier of the single central source warehouse
    pub central_warehouse: String,

    /// Deficits at or below this share of the target are not transferred
    pub deficit_threshold: Decimal,

    /// Stores never supplied by an allocation run
    #[serde(default)]
    pub excluded_stores: Vec<String>,

    /// Days until the linked picking task is due
    pub task_due_days: i64,

    /// Priority of the linked picking task
    pub task_priority: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    /// Buffered events per subscriber before it starts lagging
    pub channel_capacity: usize,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("XFER_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("allocation.central_warehouse", "CENTRAL")?
            .set_default("allocation.deficit_threshold", DEFAULT_DEFICIT_THRESHOLD.to_string())?
            .set_default("allocation.excluded_stores", Vec::<String>::new())?
            .set_default("allocation.task_due_days", 2)?
            .set_default("allocation.task_priority", "high")?
            .set_default("events.channel_capacity", 256)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (XFER prefix)
            .add_source(
                Environment::with_prefix("XFER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("allocation.excluded_stores")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl AllocationConfig {
    pub fn demand_policy(&self) -> DemandPolicy {
        DemandPolicy {
            deficit_threshold: self.deficit_threshold,
            ..DemandPolicy::default()
        }
        .with_excluded_stores(self.excluded_stores.iter().map(|s| StoreCode::from(s.as_str())))
    }

    /// Unknown priorities fall back to the default
    pub fn factory_settings(&self) -> FactorySettings {
        FactorySettings {
            source_warehouse: self.central_warehouse.clone(),
            task_due_days: self.task_due_days,
            task_priority: TaskPriority::from_str(&self.task_priority).unwrap_or_default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            central_warehouse: "CENTRAL".to_string(),
            deficit_threshold: DEFAULT_DEFICIT_THRESHOLD,
            excluded_stores: Vec::new(),
            task_due_days: 2,
            task_priority: "high".to_string(),
        }
    }
}

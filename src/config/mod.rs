mod loader;
mod types;

pub use loader::{CONFIG_TEMPLATE, ConfigError, DEFAULT_CONFIG_PATHS, load_config};
pub use types::{
    ApiConfig, AppConfig, ChainEntry, EngineConfig, LoggingConfig, MonitoringConfig,
    RegistryConfig,
};

pub mod config;

pub use config::{
    ConfigError, DeriveConfig, LoggingConfig, OplogConfig, PageReplacementPolicy, CONFIG_ENV,
    LOG_ENV,
};

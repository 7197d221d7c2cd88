//! TenantScan Common - Shared utilities: configuration and logging

pub mod config;
pub mod logging;

pub use config::{
    CliConfig, Config, EngineConfig, GraphConfig, InventoryKindConfig, ShellConfig,
    ShellSetupStep,
};
pub use logging::{init_logging, LogConfig, LogFormat};

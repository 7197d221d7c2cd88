//! Configuration management for TenantScan

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tenantscan_core::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scan engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Interactive shell backend
    #[serde(default)]
    pub shell: ShellConfig,

    /// Cloud CLI backend
    #[serde(default)]
    pub cli: CliConfig,

    /// Directory-graph backend
    #[serde(default)]
    pub graph: GraphConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Merge with environment variables (TENANTSCAN_ prefix)
    pub fn merge_env(mut self) -> Self {
        if let Ok(val) = std::env::var("TENANTSCAN_COMMAND_TIMEOUT") {
            if let Ok(n) = val.parse() {
                self.engine.command_timeout_seconds = n;
            }
        }
        if let Ok(val) = std::env::var("TENANTSCAN_MAX_CONCURRENT_SCANS") {
            if let Ok(n) = val.parse() {
                self.engine.max_concurrent_scans = n;
            }
        }
        if let Ok(val) = std::env::var("TENANTSCAN_SHELL_PROGRAM") {
            self.shell.program = val;
        }
        if let Ok(val) = std::env::var("TENANTSCAN_CLI_PROGRAM") {
            self.cli.program = val;
        }
        if let Ok(val) = std::env::var("TENANTSCAN_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("TENANTSCAN_LOG_FORMAT") {
            self.logging.format = val;
        }

        self
    }
}

/// Scan engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bound on every backend call, in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,

    /// Worker pool size
    #[serde(default = "default_max_scans")]
    pub max_concurrent_scans: usize,
}

fn default_command_timeout() -> u64 {
    30
}

fn default_max_scans() -> usize {
    8
}

impl EngineConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_timeout_seconds: 30,
            max_concurrent_scans: 8,
        }
    }
}

/// One bootstrap command and the text its output must contain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellSetupStep {
    pub command: String,
    /// Expected substring; empty means "don't wait for output"
    #[serde(default)]
    pub expect: String,
}

impl ShellSetupStep {
    pub fn new(command: impl Into<String>, expect: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            expect: expect.into(),
        }
    }
}

/// Interactive shell configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Shell executable
    #[serde(default = "default_shell_program")]
    pub program: String,

    /// Arguments; the shell must read commands from stdin without echoing them
    #[serde(default = "default_shell_args")]
    pub args: Vec<String>,

    /// Line printed before each response
    #[serde(default = "default_start_marker")]
    pub start_marker: String,

    /// Line printed after each response
    #[serde(default = "default_end_marker")]
    pub end_marker: String,

    /// Text echoed by the liveness check
    #[serde(default = "default_heartbeat_marker")]
    pub heartbeat_marker: String,

    /// Login / module import steps run once at session creation
    #[serde(default = "default_setup_steps")]
    pub setup: Vec<ShellSetupStep>,
}

fn default_shell_program() -> String {
    #[cfg(target_os = "windows")]
    {
        String::from("powershell.exe")
    }
    #[cfg(not(target_os = "windows"))]
    {
        String::from("pwsh")
    }
}

fn default_shell_args() -> Vec<String> {
    ["-NoLogo", "-NoProfile", "-Command", "-"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_start_marker() -> String {
    String::from("TENANTSCAN_START")
}

fn default_end_marker() -> String {
    String::from("TENANTSCAN_END")
}

fn default_heartbeat_marker() -> String {
    String::from("tenantscan check")
}

fn default_setup_steps() -> Vec<ShellSetupStep> {
    vec![
        ShellSetupStep::new("Connect-ExchangeOnline", "This V3 EXO PowerShell"),
        ShellSetupStep::new("Connect-MicrosoftTeams | ft -HideTableHeaders", ""),
        ShellSetupStep::new(
            "Import-Module ExchangeOnlineManagement, MicrosoftTeams, Microsoft.Online.SharePoint.PowerShell, Az, AzureAD",
            "AzureCloud",
        ),
    ]
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: default_shell_program(),
            args: default_shell_args(),
            start_marker: default_start_marker(),
            end_marker: default_end_marker(),
            heartbeat_marker: default_heartbeat_marker(),
            setup: default_setup_steps(),
        }
    }
}

/// One inventory kind fetched at CLI session creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryKindConfig {
    /// Inventory key, e.g. `<storage_accounts>`
    pub key: String,
    /// Human label used in logs and errors
    pub label: String,
    /// CLI command returning `[[name, resourceGroup], ...]`
    pub command: String,
    /// Placeholder replaced with the resource name
    pub name_placeholder: String,
    /// Placeholder replaced with the resource group
    pub group_placeholder: String,
}

impl InventoryKindConfig {
    fn new(key: &str, label: &str, command: &str, name: &str, group: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            command: command.to_string(),
            name_placeholder: name.to_string(),
            group_placeholder: group.to_string(),
        }
    }
}

/// Cloud CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// CLI executable
    #[serde(default = "default_cli_program")]
    pub program: String,

    /// Arguments appended to every invocation
    #[serde(default = "default_cli_extra_args")]
    pub extra_args: Vec<String>,

    /// Inventory kinds available for batch expansion
    #[serde(default = "default_inventory")]
    pub inventory: Vec<InventoryKindConfig>,
}

fn default_cli_program() -> String {
    String::from("az")
}

fn default_cli_extra_args() -> Vec<String> {
    ["-o", "json", "--only-show-errors"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_inventory() -> Vec<InventoryKindConfig> {
    vec![
        InventoryKindConfig::new(
            "<storage_accounts>",
            "storage accounts",
            "storage account list --query [*].[name,resourceGroup]",
            "<storage_account_name>",
            "<storage_resource_group>",
        ),
        InventoryKindConfig::new(
            "<postgres_servers>",
            "PostgreSQL servers",
            "postgres server list --query [*].[name,resourceGroup]",
            "<postgres_server_name>",
            "<postgres_resource_group>",
        ),
        InventoryKindConfig::new(
            "<azure_sql_servers>",
            "Azure SQL servers",
            "sql server list --query [*].[name,resourceGroup]",
            "<azure_sql_server_name>",
            "<azure_sql_resource_group>",
        ),
    ]
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            program: default_cli_program(),
            extra_args: default_cli_extra_args(),
            inventory: default_inventory(),
        }
    }
}

/// Directory-graph configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// API base URL
    #[serde(default = "default_graph_endpoint")]
    pub endpoint: String,

    /// Token audience requested through the CLI
    #[serde(default = "default_graph_resource")]
    pub resource: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_graph_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_graph_endpoint() -> String {
    String::from("https://graph.microsoft.com/v1.0")
}

fn default_graph_resource() -> String {
    String::from("https://graph.microsoft.com")
}

fn default_graph_timeout() -> u64 {
    30
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            endpoint: default_graph_endpoint(),
            resource: default_graph_resource(),
            request_timeout_seconds: default_graph_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("compact")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

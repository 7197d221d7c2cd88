//! Resource inventory cached at CLI session creation

use serde_json::Value;
use tenantscan_common::InventoryKindConfig;
use tenantscan_core::{Error, Result};

/// One `(name, resource group)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    pub name: String,
    pub resource_group: String,
}

impl InventoryEntry {
    pub fn new(name: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_group: resource_group.into(),
        }
    }
}

/// Cached entries of one resource kind, with the placeholders that select it
#[derive(Debug, Clone)]
pub struct InventoryKind {
    pub config: InventoryKindConfig,
    pub entries: Vec<InventoryEntry>,
}

impl InventoryKind {
    /// True if the template references this kind's name or group placeholder
    pub fn referenced_by(&self, template: &str) -> bool {
        [&self.config.name_placeholder, &self.config.group_placeholder]
            .iter()
            .any(|placeholder| !placeholder.is_empty() && template.contains(placeholder.as_str()))
    }
}

/// Read-only mapping from resource kind to its ordered entries
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    kinds: Vec<InventoryKind>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind; a kind with the same key is replaced
    pub fn insert(&mut self, config: InventoryKindConfig, entries: Vec<InventoryEntry>) {
        self.kinds.retain(|kind| kind.config.key != config.key);
        self.kinds.push(InventoryKind { config, entries });
    }

    pub fn with_kind(mut self, config: InventoryKindConfig, entries: Vec<InventoryEntry>) -> Self {
        self.insert(config, entries);
        self
    }

    pub fn get(&self, key: &str) -> Option<&InventoryKind> {
        self.kinds.iter().find(|kind| kind.config.key == key)
    }

    /// The first registered kind whose placeholders appear in `template`
    pub fn kind_for(&self, template: &str) -> Option<&InventoryKind> {
        self.kinds.iter().find(|kind| kind.referenced_by(template))
    }
}

/// Parse the output of an inventory listing (`--query [*].[name,resourceGroup]`).
///
/// Accepts `[[name, group], ...]` as well as `[{"name", "resourceGroup"}, ...]`;
/// a missing result is an empty inventory.
pub fn parse_entries(value: Option<&Value>) -> Result<Vec<InventoryEntry>> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(Error::Cli(format!(
                "expected a list of resources, got {}",
                other
            )))
        }
    };

    items.iter().map(parse_entry).collect()
}

fn parse_entry(item: &Value) -> Result<InventoryEntry> {
    let (name, group) = match item {
        Value::Array(pair) if pair.len() >= 2 => (&pair[0], &pair[1]),
        Value::Object(map) => match (map.get("name"), map.get("resourceGroup")) {
            (Some(name), Some(group)) => (name, group),
            _ => return Err(Error::Cli(format!("malformed resource entry: {}", item))),
        },
        _ => return Err(Error::Cli(format!("malformed resource entry: {}", item))),
    };

    match (name.as_str(), group.as_str()) {
        (Some(name), Some(group)) => Ok(InventoryEntry::new(name, group)),
        _ => Err(Error::Cli(format!("malformed resource entry: {}", item))),
    }
}

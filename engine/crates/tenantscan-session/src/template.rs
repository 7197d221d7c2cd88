//! Command template expansion for the CLI backend
//!
//! Session scalars (e.g. `<subscriptionid>`) are substituted first. A
//! template that then references one inventory kind's placeholders fans out
//! into one command per cached entry of that kind.

use crate::inventory::Inventory;
use std::collections::BTreeMap;
use tenantscan_core::{Error, Result};

/// Commands produced from one template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// No batch placeholder: run once
    Single(String),
    /// One command per inventory entry, in inventory order
    Batch { kind: String, commands: Vec<String> },
}

/// Replace every session scalar placeholder
pub fn substitute_scalars(template: &str, scalars: &BTreeMap<String, String>) -> String {
    scalars
        .iter()
        .fold(template.to_string(), |acc, (placeholder, value)| {
            acc.replace(placeholder.as_str(), value)
        })
}

/// Expand a template against the session scalars and cached inventory.
///
/// Fails with `MissingInventory` when the referenced kind has no entries.
pub fn expand(
    template: &str,
    scalars: &BTreeMap<String, String>,
    inventory: &Inventory,
) -> Result<Expansion> {
    let base = substitute_scalars(template, scalars);

    let kind = match inventory.kind_for(&base) {
        Some(kind) => kind,
        None => return Ok(Expansion::Single(base)),
    };

    if kind.entries.is_empty() {
        return Err(Error::MissingInventory {
            kind: kind.config.label.clone(),
        });
    }

    // Each entry is substituted into the untouched base template
    let commands = kind
        .entries
        .iter()
        .map(|entry| {
            base.replace(kind.config.name_placeholder.as_str(), &entry.name)
                .replace(kind.config.group_placeholder.as_str(), &entry.resource_group)
        })
        .collect();

    Ok(Expansion::Batch {
        kind: kind.config.key.clone(),
        commands,
    })
}

/// Split a literal command into CLI arguments
pub fn split_args(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryEntry;
    use tenantscan_common::InventoryKindConfig;

    fn sql_kind() -> InventoryKindConfig {
        InventoryKindConfig {
            key: String::from("<azure_sql_servers>"),
            label: String::from("Azure SQL servers"),
            command: String::from("sql server list"),
            name_placeholder: String::from("<azure_sql_server_name>"),
            group_placeholder: String::from("<azure_sql_resource_group>"),
        }
    }

    fn scalars() -> BTreeMap<String, String> {
        let mut scalars = BTreeMap::new();
        scalars.insert(String::from("<subscriptionid>"), String::from("sub-123"));
        scalars
    }

    #[test]
    fn test_plain_template_runs_once() {
        let expansion = expand(
            "security pricing list --subscription <subscriptionid>",
            &scalars(),
            &Inventory::new(),
        )
        .unwrap();
        assert_eq!(
            expansion,
            Expansion::Single(String::from("security pricing list --subscription sub-123"))
        );
    }

    #[test]
    fn test_batch_substitutes_each_entry_into_original() {
        let inventory = Inventory::new().with_kind(
            sql_kind(),
            vec![
                InventoryEntry::new("srv-a", "rg-1"),
                InventoryEntry::new("srv-b", "rg-2"),
            ],
        );

        let expansion = expand(
            "sql server audit-policy show -n <azure_sql_server_name> -g <azure_sql_resource_group>",
            &scalars(),
            &inventory,
        )
        .unwrap();

        let Expansion::Batch { commands, .. } = expansion else {
            panic!("expected a batch expansion");
        };
        assert_eq!(
            commands,
            vec![
                "sql server audit-policy show -n srv-a -g rg-1",
                "sql server audit-policy show -n srv-b -g rg-2",
            ]
        );
    }

    #[test]
    fn test_empty_kind_is_missing_inventory() {
        let inventory = Inventory::new().with_kind(sql_kind(), Vec::new());
        let err = expand("sql db list -s <azure_sql_server_name>", &scalars(), &inventory).unwrap_err();
        assert!(matches!(err, Error::MissingInventory { ref kind } if kind == "Azure SQL servers"));
    }

    #[test]
    fn test_split_args() {
        assert_eq!(
            split_args("  storage account list   --query [*].[name,resourceGroup] "),
            vec!["storage", "account", "list", "--query", "[*].[name,resourceGroup]"]
        );
    }
}

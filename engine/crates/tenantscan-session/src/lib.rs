//! TenantScan Session - Backend session handles
//!
//! This crate provides:
//! - The framed request/response protocol over a persistent interactive shell
//! - The cloud CLI invoker with its inventory cache and command templating
//! - The directory-graph client used for the tenant secure score
//! - Bootstrap of all three sessions before a run

pub mod cli;
pub mod framing;
pub mod graph;
pub mod inventory;
pub mod sessions;
pub mod shell;
pub mod template;

pub use cli::{CliInvoker, CliSession, ProcessCliInvoker, SUBSCRIPTION_PLACEHOLDER};
pub use framing::{FrameDecoder, Framing};
pub use graph::{GraphClient, GraphSession, HttpGraphClient, SecureScore};
pub use inventory::{Inventory, InventoryEntry, InventoryKind};
pub use sessions::Sessions;
pub use shell::ShellSession;
pub use template::{expand, Expansion};

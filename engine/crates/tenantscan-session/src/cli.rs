//! Cloud CLI session: invoker, session scalars, and cached inventory

use crate::inventory::{parse_entries, Inventory};
use crate::template::{expand, split_args, Expansion};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tenantscan_common::CliConfig;
use tenantscan_core::{CancellationToken, Error, RawOutput, Result};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const BACKEND: &str = "cli";

/// Placeholder holding the active subscription id
pub const SUBSCRIPTION_PLACEHOLDER: &str = "<subscriptionid>";

/// Runs one CLI invocation and returns its parsed result
#[async_trait]
pub trait CliInvoker: Send + Sync {
    /// `Ok(None)` means the command succeeded without producing a result
    async fn invoke(&self, args: &[String]) -> Result<Option<Value>>;
}

/// Invoker running the CLI executable as a child process
#[derive(Debug, Clone)]
pub struct ProcessCliInvoker {
    program: String,
    extra_args: Vec<String>,
}

impl ProcessCliInvoker {
    pub fn new(config: &CliConfig) -> Self {
        Self {
            program: config.program.clone(),
            extra_args: config.extra_args.clone(),
        }
    }
}

#[async_trait]
impl CliInvoker for ProcessCliInvoker {
    async fn invoke(&self, args: &[String]) -> Result<Option<Value>> {
        let output = Command::new(&self.program)
            .args(args)
            .args(&self.extra_args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Error::Cli(if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            }));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(None);
        }

        // Non-JSON output is kept as plain text
        Ok(Some(
            serde_json::from_str(stdout).unwrap_or_else(|_| Value::String(stdout.to_string())),
        ))
    }
}

/// Handle on the cloud CLI. All invocations are serialized through `lock`.
pub struct CliSession {
    invoker: Box<dyn CliInvoker>,
    lock: Mutex<()>,
    scalars: BTreeMap<String, String>,
    inventory: Inventory,
    timeout: Duration,
}

impl CliSession {
    pub fn new(invoker: impl CliInvoker + 'static, timeout: Duration) -> Self {
        Self {
            invoker: Box::new(invoker),
            lock: Mutex::new(()),
            scalars: BTreeMap::new(),
            inventory: Inventory::new(),
            timeout,
        }
    }

    pub fn with_inventory(mut self, inventory: Inventory) -> Self {
        self.inventory = inventory;
        self
    }

    pub fn with_scalar(mut self, placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        self.scalars.insert(placeholder.into(), value.into());
        self
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn scalar(&self, placeholder: &str) -> Option<&str> {
        self.scalars.get(placeholder).map(String::as_str)
    }

    /// Resolve the signed-in account and fetch every configured inventory kind
    pub async fn create_session(&mut self, config: &CliConfig) -> Result<()> {
        let account = self
            .call("account show")
            .await
            .and_then(|value| value.ok_or_else(|| Error::Cli(String::from("no active account"))))
            .map_err(|e| creation_failed(format!("cannot read the active account: {}", e)))?;

        let subscription_id = account
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| creation_failed(String::from("active account has no subscription id")))?;
        self.scalars
            .insert(SUBSCRIPTION_PLACEHOLDER.to_string(), subscription_id.to_string());

        let subscription = account.get("name").and_then(Value::as_str).unwrap_or("unknown");
        let user = account
            .pointer("/user/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!("Running on {} as user {}", subscription, user);

        for kind in &config.inventory {
            let listing = self.call(&kind.command).await.map_err(|e| {
                creation_failed(format!("cannot fetch the {}: {}", kind.label, e))
            })?;
            let entries = parse_entries(listing.as_ref())
                .map_err(|e| creation_failed(format!("cannot read the {}: {}", kind.label, e)))?;

            if entries.is_empty() {
                warn!("No {} were found", kind.label);
            } else {
                info!("Fetched {} {}", entries.len(), kind.label);
                for entry in &entries {
                    info!("\t{} - {}", entry.name, entry.resource_group);
                }
            }
            self.inventory.insert(kind.clone(), entries);
        }

        Ok(())
    }

    /// Verify the CLI still has an active account
    pub async fn check_session(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        match self.call("account show").await {
            Ok(Some(account)) => {
                debug!("account show: {}", account);
                Ok(())
            }
            Ok(None) => Err(Error::SessionCheckFailed {
                backend: BACKEND,
                reason: String::from("no active account"),
            }),
            Err(e) => Err(Error::SessionCheckFailed {
                backend: BACKEND,
                reason: e.to_string(),
            }),
        }
    }

    /// Expand and run one command template.
    ///
    /// The lock is held across every batch-expanded sub-invocation and the
    /// timeout bounds the whole expansion.
    pub async fn run(&self, template: &str, cancel: &CancellationToken) -> Result<RawOutput> {
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.lock.lock() => guard,
        };

        let expansion = expand(template, &self.scalars, &self.inventory)?;
        match timeout(self.timeout, self.execute(expansion)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout {
                backend: BACKEND,
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    /// Obtain a bearer token for another service through the CLI login
    pub async fn access_token(&self, resource: &str) -> Result<String> {
        let _guard = self.lock.lock().await;
        let command = format!(
            "account get-access-token --resource {} --query accessToken",
            resource
        );

        match self.call(&command).await? {
            Some(Value::String(token)) if !token.is_empty() => Ok(token),
            other => Err(Error::Cli(format!(
                "unexpected access token response: {}",
                other.unwrap_or(Value::Null)
            ))),
        }
    }

    async fn execute(&self, expansion: Expansion) -> Result<RawOutput> {
        match expansion {
            Expansion::Single(command) => Ok(RawOutput::from_json(self.call(&command).await?)),
            Expansion::Batch { kind, commands } => {
                debug!("Batch over {} ({} commands)", kind, commands.len());
                let mut merged = Vec::new();
                for command in &commands {
                    RawOutput::from_json(self.call(command).await?).merge_into(&mut merged);
                }
                Ok(RawOutput::Sequence(merged))
            }
        }
    }

    async fn call(&self, command: &str) -> Result<Option<Value>> {
        debug!("Running CLI command: {}", command);
        let result = self.invoker.invoke(&split_args(command)).await;
        if let Ok(value) = &result {
            debug!("CLI result: {:?}", value);
        }
        result
    }
}

fn creation_failed(reason: String) -> Error {
    Error::SessionCreationFailed {
        backend: BACKEND,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryEntry;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tenantscan_common::InventoryKindConfig;

    /// Invoker answering from a fixed command → result table
    #[derive(Default, Clone)]
    struct ScriptedInvoker {
        responses: Arc<std::sync::Mutex<BTreeMap<String, Result<Option<Value>>>>>,
        pub calls: Arc<std::sync::Mutex<Vec<String>>>,
        in_flight: Arc<AtomicUsize>,
        pub max_in_flight: Arc<AtomicUsize>,
        pub delay: Option<Duration>,
    }

    impl ScriptedInvoker {
        pub fn respond(self, command: &str, result: Result<Option<Value>>) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(command.to_string(), result);
            self
        }
    }

    #[async_trait]
    impl CliInvoker for ScriptedInvoker {
        async fn invoke(&self, args: &[String]) -> Result<Option<Value>> {
            let command = args.join(" ");
            self.calls.lock().unwrap().push(command.clone());

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.responses.lock().unwrap().get(&command) {
                Some(Ok(value)) => Ok(value.clone()),
                Some(Err(e)) => Err(Error::Cli(e.to_string())),
                None => Ok(None),
            }
        }
    }

    fn storage_kind() -> InventoryKindConfig {
        InventoryKindConfig {
            key: String::from("<storage_accounts>"),
            label: String::from("storage accounts"),
            command: String::from("storage account list --query [*].[name,resourceGroup]"),
            name_placeholder: String::from("<storage_account_name>"),
            group_placeholder: String::from("<storage_resource_group>"),
        }
    }

    #[tokio::test]
    async fn test_create_session_fetches_account_and_inventory() {
        let invoker = ScriptedInvoker::default()
            .respond(
                "account show",
                Ok(Some(json!({"id": "sub-1", "name": "Prod", "user": {"name": "audit@corp"}}))),
            )
            .respond(
                "storage account list --query [*].[name,resourceGroup]",
                Ok(Some(json!([["acct1", "rg-a"]]))),
            );

        let config = CliConfig {
            inventory: vec![storage_kind()],
            ..CliConfig::default()
        };
        let mut session = CliSession::new(invoker, Duration::from_secs(5));
        session.create_session(&config).await.unwrap();

        assert_eq!(session.scalar(SUBSCRIPTION_PLACEHOLDER), Some("sub-1"));
        assert_eq!(
            session.inventory().get("<storage_accounts>").unwrap().entries,
            vec![InventoryEntry::new("acct1", "rg-a")]
        );
    }

    #[tokio::test]
    async fn test_create_session_without_account_fails() {
        let invoker = ScriptedInvoker::default()
            .respond("account show", Err(Error::Cli(String::from("Please run 'az login'"))));
        let mut session = CliSession::new(invoker, Duration::from_secs(5));

        let err = session.create_session(&CliConfig::default()).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_run_substitutes_scalars() {
        let invoker = ScriptedInvoker::default().respond(
            "security auto-provisioning-setting list --subscription sub-1",
            Ok(Some(json!(["On"]))),
        );
        let session = CliSession::new(invoker, Duration::from_secs(5))
            .with_scalar(SUBSCRIPTION_PLACEHOLDER, "sub-1");

        let output = session
            .run(
                "security auto-provisioning-setting list --subscription <subscriptionid>",
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(output, RawOutput::sequence([Some("On")]));
    }

    #[tokio::test]
    async fn test_batch_merges_lists_and_scalars() {
        let invoker = ScriptedInvoker::default()
            .respond("storage show -n a -g rg1", Ok(Some(json!(["x", "y"]))))
            .respond("storage show -n b -g rg2", Ok(Some(json!("z"))))
            .respond("storage show -n c -g rg3", Ok(None));
        let calls = Arc::clone(&invoker.calls);

        let inventory = Inventory::new().with_kind(
            storage_kind(),
            vec![
                InventoryEntry::new("a", "rg1"),
                InventoryEntry::new("b", "rg2"),
                InventoryEntry::new("c", "rg3"),
            ],
        );
        let session = CliSession::new(invoker, Duration::from_secs(5)).with_inventory(inventory);

        let output = session
            .run(
                "storage show -n <storage_account_name> -g <storage_resource_group>",
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            output,
            RawOutput::sequence([Some("x"), Some("y"), Some("z"), None])
        );
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_inventory() {
        let inventory = Inventory::new().with_kind(storage_kind(), Vec::new());
        let session =
            CliSession::new(ScriptedInvoker::default(), Duration::from_secs(5)).with_inventory(inventory);

        let err = session
            .run("storage show -n <storage_account_name>", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_unmet_precondition());
    }

    #[tokio::test]
    async fn test_timeout() {
        let invoker = ScriptedInvoker {
            delay: Some(Duration::from_millis(500)),
            ..ScriptedInvoker::default()
        };
        let session = CliSession::new(invoker, Duration::from_millis(50));

        let err = session.run("account list", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { backend: "cli", .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_calls_are_single_flight() {
        let invoker = ScriptedInvoker {
            delay: Some(Duration::from_millis(10)),
            ..ScriptedInvoker::default()
        };
        let max_in_flight = Arc::clone(&invoker.max_in_flight);
        let session = Arc::new(CliSession::new(invoker, Duration::from_secs(5)));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    session
                        .run(&format!("group show -n g{}", i), &CancellationToken::new())
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_access_token() {
        let invoker = ScriptedInvoker::default().respond(
            "account get-access-token --resource https://graph.microsoft.com --query accessToken",
            Ok(Some(json!("tok"))),
        );
        let session = CliSession::new(invoker, Duration::from_secs(5));
        assert_eq!(
            session.access_token("https://graph.microsoft.com").await.unwrap(),
            "tok"
        );
    }

    #[cfg(unix)]
    fn process(program: &str, extra_args: &[&str]) -> ProcessCliInvoker {
        ProcessCliInvoker::new(&CliConfig {
            program: program.to_string(),
            extra_args: extra_args.iter().map(|s| s.to_string()).collect(),
            inventory: Vec::new(),
        })
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_invoker_parses_json() {
        let value = process("echo", &[]).invoke(&args(&["[1,2]"])).await.unwrap();
        assert_eq!(value, Some(json!([1, 2])));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_invoker_keeps_plain_text() {
        let value = process("echo", &["-o", "json"])
            .invoke(&args(&["[1,2]"]))
            .await
            .unwrap();
        assert_eq!(value, Some(Value::String(String::from("[1,2] -o json"))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_invoker_empty_stdout() {
        assert_eq!(process("true", &[]).invoke(&[]).await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_invoker_failure_uses_stderr() {
        let err = process("sh", &[])
            .invoke(&args(&["-c", "echo AuthorizationFailed >&2; exit 1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cli(ref msg) if msg == "AuthorizationFailed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_invoker_failure_without_stderr() {
        let err = process("false", &[]).invoke(&[]).await.unwrap_err();
        assert!(matches!(err, Error::Cli(ref msg) if msg.starts_with("false exited with")));
        assert!(err.is_unmet_precondition());
    }
}

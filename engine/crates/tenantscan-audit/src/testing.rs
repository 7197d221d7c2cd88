//! In-memory backend doubles for scheduler tests

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tenantscan_common::ShellConfig;
use tenantscan_core::Result;
use tenantscan_session::{CliInvoker, CliSession, GraphClient, GraphSession, SecureScore, Sessions, ShellSession};
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Error text the fake shell prints for `Get-Missing`, up to its colour reset
pub const MISSING_CMDLET: &str =
    "The term 'Get-Missing' is not recognized as a name of a cmdlet, function, script file, or executable program.";

type Responder = dyn Fn(&str) -> Result<Option<Value>> + Send + Sync;

/// CLI invoker answering through a closure and recording every command
pub struct StubInvoker {
    respond: Arc<Responder>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StubInvoker {
    pub fn new(respond: impl Fn(&str) -> Result<Option<Value>> + Send + Sync + 'static) -> Self {
        Self {
            respond: Arc::new(respond),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CliInvoker for StubInvoker {
    async fn invoke(&self, args: &[String]) -> Result<Option<Value>> {
        let command = args.join(" ");
        self.calls.lock().unwrap().push(command.clone());
        (self.respond)(&command)
    }
}

struct FixedScore;

#[async_trait]
impl GraphClient for FixedScore {
    async fn secure_score(&self) -> Result<SecureScore> {
        Ok(SecureScore {
            current_score: 42.0,
            max_score: 100.0,
            created_date_time: None,
        })
    }
}

/// Shell double speaking the framed protocol. Answers `out:<command>`, or
/// the unknown-cmdlet error for `Get-Missing`.
fn fake_shell(config: &ShellConfig) -> ShellSession {
    let (session_out, shell_in) = duplex(4096);
    let (mut shell_out, session_in) = duplex(4096);
    let prefix = format!("echo {}; ", config.start_marker);
    let suffix = format!("; echo {}", config.end_marker);
    let (start, end) = (config.start_marker.clone(), config.end_marker.clone());

    tokio::spawn(async move {
        let mut lines = BufReader::new(shell_in).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let command = match line.strip_prefix(&prefix).and_then(|l| l.strip_suffix(&suffix)) {
                Some(command) => command.to_string(),
                None => continue,
            };
            let body = if command == "Get-Missing" {
                format!("{}\x1b[0m\n\x1b[31;1m\x1b[31;1mCheck the spelling of the name.\n", MISSING_CMDLET)
            } else {
                format!("out:{}\n", command)
            };
            let reply = format!("{}\n{}{}\n", start, body, end);
            if shell_out.write_all(reply.as_bytes()).await.is_err() {
                return;
            }
        }
    });

    ShellSession::from_io(session_in, session_out, config, Duration::from_secs(5))
}

/// All three sessions backed by doubles
pub fn fake_sessions(invoker: StubInvoker) -> Arc<Sessions> {
    let shell = fake_shell(&ShellConfig::default());
    let cli = CliSession::new(invoker, Duration::from_secs(5));
    let graph = GraphSession::new(FixedScore);
    Arc::new(Sessions::new(shell, cli, graph))
}

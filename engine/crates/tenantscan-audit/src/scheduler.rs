//! Concurrent scan scheduler - fans a checklist out over a bounded worker pool

use crate::dispatch::execute;
use crate::summary::AuditSummary;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tenantscan_core::{CancellationToken, Error, ScanResult, ScanSpec};
use tenantscan_session::Sessions;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Default worker pool size
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Runs every checklist entry exactly once against the shared sessions
pub struct ScanScheduler {
    sessions: Arc<Sessions>,
    max_concurrent: usize,
    cancel: CancellationToken,
}

/// Aggregated outcome of a run, keyed by entry id
#[derive(Debug, Clone)]
pub struct AuditReport {
    results: HashMap<String, ScanResult>,
    /// Ids in checklist order (first appearance)
    order: Vec<String>,
    pub summary: AuditSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AuditReport {
    /// Results in checklist order, one per distinct id
    pub fn results(&self) -> Vec<&ScanResult> {
        self.order.iter().filter_map(|id| self.results.get(id)).collect()
    }

    pub fn get(&self, id: &str) -> Option<&ScanResult> {
        self.results.get(id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

impl ScanScheduler {
    pub fn new(sessions: Arc<Sessions>) -> Self {
        Self {
            sessions,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the worker pool size (at least one)
    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Share an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this scheduler's batch
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the whole batch and wait for every task.
    ///
    /// Entries still waiting for a worker or a backend lock when the batch
    /// is cancelled produce no result. When ids collide, the entry later in
    /// the checklist wins.
    pub async fn run(&self, specs: Vec<ScanSpec>) -> AuditReport {
        let started_at = Utc::now();
        info!(
            "Starting audit of {} entries ({} workers)",
            specs.len(),
            self.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(specs.len());
        let mut order = Vec::with_capacity(specs.len());
        let mut seen = HashSet::new();

        for spec in specs {
            if seen.insert(spec.id.clone()) {
                order.push(spec.id.clone());
            }

            let id = spec.id.clone();
            let name = spec.name.clone();
            let sessions = Arc::clone(&self.sessions);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();

            let handle = tokio::spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return None,
                    permit = semaphore.acquire_owned() => permit.ok()?,
                };
                run_entry(&sessions, spec, &cancel).await
            });

            handles.push((id, name, handle));
        }

        // Folded in spawn order so collisions resolve by checklist position
        let mut results = HashMap::with_capacity(handles.len());
        let mut cancelled = 0;
        for (id, name, handle) in handles {
            let result = match handle.await {
                Ok(Some(result)) => result,
                Ok(None) => {
                    cancelled += 1;
                    continue;
                }
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    error!("Scan {} panicked: {}", id, message);
                    ScanResult::error(id.clone(), name, format!("Scan panicked: {}", message))
                }
                Err(e) => {
                    debug!("Scan {} did not complete: {}", id, e);
                    cancelled += 1;
                    continue;
                }
            };

            if results.insert(id.clone(), result).is_some() {
                warn!("Duplicate scan id {}: keeping the later entry", id);
            }
        }

        order.retain(|id| results.contains_key(id));
        let summary =
            AuditSummary::from_results(order.iter().filter_map(|id| results.get(id)), cancelled);

        info!(
            "Audit complete: {} passed, {} failed, {} errors, {} not applicable, {} cancelled",
            summary.passed, summary.failed, summary.errors, summary.not_applicable, summary.cancelled
        );

        AuditReport {
            results,
            order,
            summary,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Run one entry, converting any failure into an `Error` result
async fn run_entry(
    sessions: &Sessions,
    spec: ScanSpec,
    cancel: &CancellationToken,
) -> Option<ScanResult> {
    let id = spec.id.clone();
    let name = spec.name.clone();

    match execute(sessions, spec, cancel).await {
        Ok(result) => Some(result),
        Err(Error::Cancelled) => {
            debug!("Scan {} cancelled before it started", id);
            None
        }
        Err(e) => {
            warn!("Scan {} failed [{}]: {}", id, e.code(), e);
            Some(ScanResult::error(id, name, e.to_string()))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_sessions, StubInvoker, MISSING_CMDLET};
    use serde_json::json;
    use std::time::Duration;
    use tenantscan_core::{ScanKind, Verdict};

    fn cli(id: &str, check: &str) -> ScanSpec {
        ScanSpec::new(id, format!("entry {}", id), ScanKind::Cli, format!("resource show {}", id), check)
    }

    #[tokio::test]
    async fn test_mixed_backends() {
        let invoker = StubInvoker::new(|command| match command {
            "resource show c1" => Ok(Some(json!("Enabled"))),
            "resource show c2" => Ok(Some(json!(["on", "off"]))),
            _ => Ok(None),
        });
        let scheduler = ScanScheduler::new(fake_sessions(invoker));

        let specs = vec![
            ScanSpec::new("s1", "shell", ScanKind::Shell, "Get-Setting", "out:Get-Setting"),
            cli("c1", "Enabled"),
            cli("c2", "on"),
            cli("c3", "anything"),
            ScanSpec::new("g1", "score", ScanKind::Graph, "", "None"),
        ];
        let report = scheduler.run(specs).await;

        let ids: Vec<_> = report.results().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "c1", "c2", "c3", "g1"]);
        assert_eq!(report.get("s1").unwrap().status, Some(Verdict::True));
        assert_eq!(report.get("c1").unwrap().status, Some(Verdict::True));
        assert_eq!(report.get("c2").unwrap().status, Some(Verdict::False));
        assert_eq!(report.get("c3").unwrap().status, Some(Verdict::NotApplicable));

        let graph = report.get("g1").unwrap();
        assert_eq!(graph.status, None);
        assert_eq!(graph.comment, "Secure score: 42 / 100");

        assert_eq!(report.summary.total, 5);
        assert_eq!(report.summary.informational, 1);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let invoker = StubInvoker::new(|command| match command {
            "resource show boom" => panic!("backend exploded"),
            "resource show denied" => Err(Error::Cli(String::from("AuthorizationFailed"))),
            _ => Ok(Some(json!("ok"))),
        });
        let scheduler = ScanScheduler::new(fake_sessions(invoker)).with_concurrency(2);

        let specs = vec![
            cli("a", "ok"),
            cli("boom", "ok"),
            cli("denied", "ok"),
            ScanSpec::new("bad", "bad type", ScanKind::Unknown(String::from("ldap")), "x", "None"),
            ScanSpec::new("missing", "unknown cmdlet", ScanKind::Shell, "Get-Missing", "."),
            cli("b", "ok"),
        ];
        let report = scheduler.run(specs).await;
        assert_eq!(report.len(), 6);

        let boom = report.get("boom").unwrap();
        assert_eq!(boom.status, Some(Verdict::Error));
        assert!(boom.comment.contains("backend exploded"));

        let denied = report.get("denied").unwrap();
        assert_eq!(denied.status, Some(Verdict::NotApplicable));
        assert!(denied.comment.contains("AuthorizationFailed"));

        assert_eq!(report.get("bad").unwrap().status, Some(Verdict::Error));

        let missing = report.get("missing").unwrap();
        assert_eq!(missing.status, Some(Verdict::Error));
        let term = MISSING_CMDLET.strip_prefix("The term ").unwrap();
        assert_eq!(missing.comment, format!("Unrecognized command: {}", term));

        assert_eq!(report.get("a").unwrap().status, Some(Verdict::True));
        assert_eq!(report.get("b").unwrap().status, Some(Verdict::True));
        assert_eq!(report.summary.errors, 3);
    }

    #[tokio::test]
    async fn test_id_collision_keeps_later_entry() {
        let invoker = StubInvoker::new(|_| Ok(Some(json!("value"))));
        let scheduler = ScanScheduler::new(fake_sessions(invoker));

        let specs = vec![cli("dup", "value"), cli("other", "value"), cli("dup", "missing")];
        let report = scheduler.run(specs).await;

        assert_eq!(report.len(), 2);
        assert_eq!(report.get("dup").unwrap().status, Some(Verdict::False));
        let ids: Vec<_> = report.results().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["dup", "other"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let invoker = StubInvoker::new(|_| Ok(Some(json!("x"))));
        let calls = invoker.calls();
        let scheduler = ScanScheduler::new(fake_sessions(invoker));
        scheduler.cancellation_token().cancel();

        let report = scheduler.run(vec![cli("1", "x"), cli("2", "x")]).await;
        assert!(report.is_empty());
        assert_eq!(report.summary.cancelled, 2);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_mid_batch_keeps_completed_only() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let invoker = StubInvoker::new(move |command| {
            if command == "resource show 3" {
                trigger.cancel();
            }
            std::thread::sleep(Duration::from_millis(5));
            Ok(Some(json!("x")))
        });
        let calls = invoker.calls();

        let scheduler = ScanScheduler::new(fake_sessions(invoker))
            .with_concurrency(2)
            .with_cancellation(cancel);
        let specs: Vec<_> = (1..=10).map(|i| cli(&i.to_string(), "x")).collect();
        let report = scheduler.run(specs).await;

        let invoked: HashSet<String> = calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| c.strip_prefix("resource show ").map(str::to_string))
            .collect();
        let reported: HashSet<String> = report.results().iter().map(|r| r.id.clone()).collect();

        // Every call that started completed; nothing else was reported
        assert!(reported.contains("3"));
        assert_eq!(reported, invoked);
        assert_eq!(report.summary.completed() + report.summary.cancelled, 10);
        assert!(report
            .results()
            .iter()
            .all(|r| r.status == Some(Verdict::True)));
    }
}

//! Parallel dispatch of one command to every host.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use fleetrun_core::{DispatchReport, DispatchResult, HostSet, HostStatus, RemoteCommand};
use fleetrun_ssh::{ExecOutcome, Transport, CONNECTION_FAILED_EXIT};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::workspace::output_file_name;

/// Progress notification emitted while a dispatch is running.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// A worker acquired its slot and is connecting.
    Started { host: String },
    /// A host finished (in any state).
    Finished {
        result: DispatchResult,
        completed: usize,
        total: usize,
    },
}

/// Fans a command out to every host with one worker per host.
pub struct DispatchEngine {
    transport: Arc<dyn Transport>,
    max_parallel: Option<usize>,
}

impl DispatchEngine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            max_parallel: None,
        }
    }

    /// Bound the number of hosts worked on at once.
    pub fn with_max_parallel(mut self, width: usize) -> Self {
        self.max_parallel = Some(width);
        self
    }

    /// Run `command` on every host and wait for all of them.
    ///
    /// Host failures are recorded in the report and never stop other hosts.
    /// When `cancel` fires, every worker kills its child and the call returns
    /// once all of them have done so. The report holds exactly one result per
    /// host either way.
    pub async fn dispatch(
        &self,
        hosts: &HostSet,
        command: &RemoteCommand,
        logs_dir: PathBuf,
        cancel: CancellationToken,
        progress: Option<mpsc::UnboundedSender<DispatchEvent>>,
    ) -> DispatchReport {
        let total = hosts.len();
        let width = match self.max_parallel {
            Some(w) if w > 0 => w.min(total),
            _ => total,
        };
        info!(hosts = total, width, command = %command, "Dispatching");

        let slots = Arc::new(Semaphore::new(width));
        let command = Arc::new(command.clone());
        let mut workers = JoinSet::new();

        for host in hosts.iter() {
            let worker = Worker {
                host: host.to_string(),
                command: command.clone(),
                transport: self.transport.clone(),
                output_path: logs_dir.join(output_file_name(host)),
                cancel: cancel.clone(),
                progress: progress.clone(),
            };
            let slots = slots.clone();
            workers.spawn(async move {
                let _slot = tokio::select! {
                    slot = slots.acquire_owned() => slot.ok(),
                    _ = worker.cancel.cancelled() => return DispatchResult::cancelled(&worker.host),
                };
                worker.run().await
            });
        }

        let mut report = DispatchReport::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(result) => {
                    let host = result.host.clone();
                    if !report.insert(result.clone()) {
                        warn!(host = %host, "Duplicate result ignored");
                        continue;
                    }
                    if let Some(tx) = &progress {
                        let _ = tx.send(DispatchEvent::Finished {
                            result,
                            completed: report.len(),
                            total,
                        });
                    }
                }
                Err(e) => error!(error = %e, "Dispatch worker panicked"),
            }
        }

        // A panicked worker loses its host; record it so no host goes missing.
        let recorded: HashSet<String> = report.iter().map(|r| r.host.clone()).collect();
        for host in hosts.iter().filter(|h| !recorded.contains(*h)) {
            report.insert(DispatchResult::unreachable(host, "dispatch worker aborted"));
        }

        report.cancelled = cancel.is_cancelled();
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            cancelled = report.cancelled,
            "Dispatch finished"
        );
        report
    }
}

/// Everything one host's worker needs; owned so the task is `'static`.
struct Worker {
    host: String,
    command: Arc<RemoteCommand>,
    transport: Arc<dyn Transport>,
    output_path: PathBuf,
    cancel: CancellationToken,
    progress: Option<mpsc::UnboundedSender<DispatchEvent>>,
}

impl Worker {
    async fn run(self) -> DispatchResult {
        if let Some(tx) = &self.progress {
            let _ = tx.send(DispatchEvent::Started {
                host: self.host.clone(),
            });
        }
        let started_at = Utc::now();

        let outcome = self
            .transport
            .execute(&self.host, &self.command, &self.output_path, &self.cancel)
            .await;

        let result = match outcome {
            Ok(ExecOutcome::Exited {
                exit_code: Some(code),
                output,
            }) => {
                let result = DispatchResult::completed(&self.host, code, output);
                if code == CONNECTION_FAILED_EXIT {
                    result.with_status_override(HostStatus::Unreachable)
                } else {
                    result
                }
            }
            Ok(ExecOutcome::Exited {
                exit_code: None,
                output,
            }) => {
                let mut result = DispatchResult::completed(&self.host, -1, output);
                result.exit_code = None;
                result.error = Some("terminated by signal".to_string());
                result
            }
            Ok(ExecOutcome::Cancelled) => DispatchResult::cancelled(&self.host),
            Err(e) => {
                warn!(host = %self.host, error = %e, "Transport failed");
                DispatchResult::unreachable(&self.host, e.to_string())
            }
        };

        debug!(host = %self.host, status = %result.status, "Host finished");
        result
            .with_started_at(started_at)
            .with_output_path(self.output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fleetrun_ssh::TransportError;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone)]
    enum Behavior {
        Exit(i32, &'static str),
        Refuse,
        Hang,
    }

    /// Transport double with per-host scripted behaviour.
    #[derive(Default)]
    struct ScriptedTransport {
        behavior: HashMap<String, Behavior>,
        calls: Mutex<Vec<(String, String)>>,
        running: AtomicUsize,
        peak: AtomicUsize,
        killed: AtomicUsize,
    }

    impl ScriptedTransport {
        fn with(mut self, host: &str, behavior: Behavior) -> Self {
            self.behavior.insert(host.to_string(), behavior);
            self
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(
            &self,
            host: &str,
            command: &RemoteCommand,
            _output_path: &Path,
            cancel: &CancellationToken,
        ) -> Result<ExecOutcome, TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push((host.to_string(), command.render()));
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let behavior = self
                .behavior
                .get(host)
                .cloned()
                .unwrap_or(Behavior::Exit(0, "ok"));
            let outcome = match behavior {
                Behavior::Exit(code, out) => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(ExecOutcome::Exited {
                        exit_code: Some(code),
                        output: out.to_string(),
                    })
                }
                Behavior::Refuse => Err(TransportError::SpawnError(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))),
                Behavior::Hang => {
                    cancel.cancelled().await;
                    self.killed.fetch_add(1, Ordering::SeqCst);
                    Ok(ExecOutcome::Cancelled)
                }
            };

            self.running.fetch_sub(1, Ordering::SeqCst);
            outcome
        }
    }

    fn hosts(names: &[&str]) -> HostSet {
        HostSet::new(names.iter().copied(), "test").unwrap()
    }

    #[tokio::test]
    async fn test_one_result_per_host() {
        let transport = Arc::new(ScriptedTransport::default());
        let engine = DispatchEngine::new(transport.clone());
        let targets = hosts(&["h1", "h2", "h3", "h4"]);

        let report = engine
            .dispatch(
                &targets,
                &RemoteCommand::build("id", None),
                PathBuf::from("/tmp/logs"),
                CancellationToken::new(),
                None,
            )
            .await;

        assert_eq!(report.len(), 4);
        assert!(!report.cancelled);
        for host in targets.iter() {
            assert!(report.get(host).unwrap().is_success());
        }
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|(_, cmd)| cmd == "id"));
    }

    #[tokio::test]
    async fn test_host_failure_is_isolated() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .with("h1", Behavior::Exit(0, "uid=0(root)"))
                .with("h2", Behavior::Refuse)
                .with("h3", Behavior::Exit(0, "uid=1000(ubuntu)")),
        );
        let report = DispatchEngine::new(transport)
            .dispatch(
                &hosts(&["h1", "h2", "h3"]),
                &RemoteCommand::build("id", None),
                PathBuf::from("/tmp/logs"),
                CancellationToken::new(),
                None,
            )
            .await;

        assert_eq!(report.get("h1").unwrap().output, "uid=0(root)");
        assert_eq!(report.get("h3").unwrap().output, "uid=1000(ubuntu)");
        let h2 = report.get("h2").unwrap();
        assert_eq!(h2.status, HostStatus::Unreachable);
        assert!(h2.error.as_deref().unwrap().contains("connection refused"));
        assert_eq!(report.succeeded(), 2);
    }

    #[tokio::test]
    async fn test_exit_codes_classified() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .with("bad", Behavior::Exit(2, "no such file"))
                .with("down", Behavior::Exit(CONNECTION_FAILED_EXIT, "Connection timed out")),
        );
        let report = DispatchEngine::new(transport)
            .dispatch(
                &hosts(&["bad", "down"]),
                &RemoteCommand::build("cat /nope", None),
                PathBuf::from("/tmp/logs"),
                CancellationToken::new(),
                None,
            )
            .await;

        let bad = report.get("bad").unwrap();
        assert_eq!(bad.status, HostStatus::Failed);
        assert_eq!(bad.exit_code, Some(2));
        assert_eq!(bad.output_path.as_deref(), Some(Path::new("/tmp/logs/bad")));
        assert_eq!(report.get("down").unwrap().status, HostStatus::Unreachable);
    }

    #[tokio::test]
    async fn test_width_bounds_concurrency() {
        let transport = Arc::new(ScriptedTransport::default());
        let names: Vec<String> = (0..12).map(|i| format!("h{}", i)).collect();
        let targets = HostSet::new(&names, "test").unwrap();

        let report = DispatchEngine::new(transport.clone())
            .with_max_parallel(3)
            .dispatch(
                &targets,
                &RemoteCommand::build("id", None),
                PathBuf::from("/tmp/logs"),
                CancellationToken::new(),
                None,
            )
            .await;

        assert_eq!(report.len(), 12);
        assert!(transport.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_default_width_is_fully_parallel() {
        let transport = Arc::new(ScriptedTransport::default());
        let names: Vec<String> = (0..20).map(|i| format!("h{}", i)).collect();
        let targets = HostSet::new(&names, "test").unwrap();

        DispatchEngine::new(transport.clone())
            .dispatch(
                &targets,
                &RemoteCommand::build("id", None),
                PathBuf::from("/tmp/logs"),
                CancellationToken::new(),
                None,
            )
            .await;

        assert!(transport.peak.load(Ordering::SeqCst) > 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_every_worker() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .with("slow1", Behavior::Hang)
                .with("slow2", Behavior::Hang),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            DispatchEngine::new(transport.clone()).dispatch(
                &hosts(&["fast", "slow1", "slow2"]),
                &RemoteCommand::build("sleep 600", None),
                PathBuf::from("/tmp/logs"),
                cancel,
                None,
            ),
        )
        .await
        .expect("dispatch should return after cancellation");

        assert!(report.cancelled);
        assert_eq!(report.len(), 3);
        assert!(report.get("fast").unwrap().is_success());
        assert_eq!(report.get("slow1").unwrap().status, HostStatus::Cancelled);
        assert_eq!(report.get("slow2").unwrap().status, HostStatus::Cancelled);
        assert_eq!(transport.killed.load(Ordering::SeqCst), 2);
        assert_eq!(transport.running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting_for_slot() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .with("a", Behavior::Hang)
                .with("b", Behavior::Hang),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let report = DispatchEngine::new(transport.clone())
            .with_max_parallel(1)
            .dispatch(
                &hosts(&["a", "b"]),
                &RemoteCommand::build("id", None),
                PathBuf::from("/tmp/logs"),
                cancel,
                None,
            )
            .await;

        assert_eq!(report.len(), 2);
        assert_eq!(report.get("a").unwrap().status, HostStatus::Cancelled);
        assert_eq!(report.get("b").unwrap().status, HostStatus::Cancelled);
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let transport = Arc::new(ScriptedTransport::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        DispatchEngine::new(transport)
            .dispatch(
                &hosts(&["h1", "h2"]),
                &RemoteCommand::build("id", None),
                PathBuf::from("/tmp/logs"),
                CancellationToken::new(),
                Some(tx),
            )
            .await;

        let mut started = 0;
        let mut finished = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                DispatchEvent::Started { .. } => started += 1,
                DispatchEvent::Finished { completed, total, .. } => {
                    assert_eq!(total, 2);
                    finished.push(completed);
                }
            }
        }
        assert_eq!(started, 2);
        assert_eq!(finished, vec![1, 2]);
    }

    /// Writes the host name into its capture file and reads it back.
    struct CaptureTransport;

    #[async_trait]
    impl Transport for CaptureTransport {
        async fn execute(
            &self,
            host: &str,
            _command: &RemoteCommand,
            output_path: &Path,
            _cancel: &CancellationToken,
        ) -> Result<ExecOutcome, TransportError> {
            tokio::fs::write(output_path, format!("output-of-{}\n", host)).await?;
            tokio::time::sleep(Duration::from_millis(20)).await;
            let output = tokio::fs::read_to_string(output_path).await?;
            Ok(ExecOutcome::Exited {
                exit_code: Some(0),
                output,
            })
        }
    }

    #[tokio::test]
    async fn test_similar_host_names_keep_separate_output() {
        let dir = tempfile::tempdir().unwrap();
        let report = DispatchEngine::new(Arc::new(CaptureTransport))
            .dispatch(
                &hosts(&["a/b", "a_b"]),
                &RemoteCommand::build("id", None),
                dir.path().to_path_buf(),
                CancellationToken::new(),
                None,
            )
            .await;

        let slash = report.get("a/b").unwrap();
        let underscore = report.get("a_b").unwrap();
        assert_eq!(slash.output, "output-of-a/b\n");
        assert_eq!(underscore.output, "output-of-a_b\n");
        assert_ne!(slash.output_path, underscore.output_path);
    }
}

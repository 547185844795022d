//! Out-of-process analyzer execution.
//!
//! One analysis owns one child process for its full lifetime. The encoded
//! request is streamed to the analyzer's stdin, the framed response is
//! read from its stdout, and stderr lines are forwarded to a diagnostic
//! sink as they arrive. A timeout and a cooperative cancellation token
//! both lead to a forced kill; only exit code 0 without either produces
//! output.

use std::path::PathBuf;
use std::pin::pin;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Notify;

/// Lifecycle states of one analyzer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    NotStarted,
    Starting,
    Running,
    Completed,
    TimedOut,
    Cancelled,
    Failed,
}

impl std::fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisState::NotStarted => write!(f, "not started"),
            AnalysisState::Starting => write!(f, "starting"),
            AnalysisState::Running => write!(f, "running"),
            AnalysisState::Completed => write!(f, "completed"),
            AnalysisState::TimedOut => write!(f, "timed out"),
            AnalysisState::Cancelled => write!(f, "cancelled"),
            AnalysisState::Failed => write!(f, "failed"),
        }
    }
}

/// Cooperative cancellation signal.
///
/// Clones share the same flag. Checked before the child is spawned and
/// wired to a forced kill while it runs.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation is requested.
    pub async fn cancelled(&self) {
        let mut notified = pin!(self.inner.notify.notified());
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Receives analyzer stderr lines as they arrive.
pub trait DiagnosticSink: Send + Sync {
    fn stderr_line(&self, line: &str);
}

/// Default sink: forward stderr to the log.
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn stderr_line(&self, line: &str) {
        tracing::debug!(target: "analyzer", "{}", line);
    }
}

/// Outcome of one analyzer run.
///
/// Every outcome other than `Completed` carries no output: a run that is
/// killed or fails delivers nothing rather than a partial response.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(Vec<u8>),
    TimedOut,
    Cancelled,
    Failed(String),
}

impl RunOutcome {
    pub fn state(&self) -> AnalysisState {
        match self {
            RunOutcome::Completed(_) => AnalysisState::Completed,
            RunOutcome::TimedOut => AnalysisState::TimedOut,
            RunOutcome::Cancelled => AnalysisState::Cancelled,
            RunOutcome::Failed(_) => AnalysisState::Failed,
        }
    }
}

/// Runs the external analyzer once per analysis.
pub struct AnalyzerRunner {
    executable: PathBuf,
    timeout: Duration,
    sink: Arc<dyn DiagnosticSink>,
}

impl AnalyzerRunner {
    pub fn new<P: Into<PathBuf>>(executable: P) -> Self {
        Self {
            executable: executable.into(),
            timeout: Duration::from_secs(120),
            sink: Arc::new(LogSink),
        }
    }

    /// Set the per-run timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the stderr diagnostic sink.
    pub fn diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run the analyzer synchronously.
    pub fn run(&self, input: &[u8], token: &CancellationToken) -> RunOutcome {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => return RunOutcome::Failed(format!("cannot start runtime: {}", e)),
        };
        runtime.block_on(self.run_async(input, token))
    }

    /// Run the analyzer under the caller's runtime.
    pub async fn run_async(&self, input: &[u8], token: &CancellationToken) -> RunOutcome {
        if token.is_cancelled() {
            // Cancelled before start: no process is spawned at all.
            return RunOutcome::Cancelled;
        }

        let mut child = match Command::new(&self.executable)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return RunOutcome::Failed(format!(
                    "failed to start analyzer {}: {}",
                    self.executable.display(),
                    e
                ))
            }
        };

        let stderr = child.stderr.take();
        let stderr_task = stderr.map(|stderr| {
            let sink = Arc::clone(&self.sink);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    sink.stderr_line(&line);
                }
            })
        });

        enum Raced {
            Done(std::io::Result<(Vec<u8>, std::process::ExitStatus)>),
            TimedOut,
            Cancelled,
        }

        let raced = tokio::select! {
            result = drive(&mut child, input) => Raced::Done(result),
            _ = tokio::time::sleep(self.timeout) => Raced::TimedOut,
            _ = token.cancelled() => Raced::Cancelled,
        };

        let outcome = match raced {
            Raced::Done(Ok((output, status))) => {
                if status.success() {
                    RunOutcome::Completed(output)
                } else {
                    RunOutcome::Failed(format!("analyzer exited with {}", status))
                }
            }
            Raced::Done(Err(e)) => {
                kill_quietly(&mut child).await;
                RunOutcome::Failed(format!("i/o error talking to analyzer: {}", e))
            }
            Raced::TimedOut => {
                kill_quietly(&mut child).await;
                RunOutcome::TimedOut
            }
            Raced::Cancelled => {
                kill_quietly(&mut child).await;
                RunOutcome::Cancelled
            }
        };

        if let Some(task) = stderr_task {
            // The child is gone either way; the reader drains what is left.
            let _ = task.await;
        }

        outcome
    }
}

/// Stream the request, collect stdout, wait for exit.
async fn drive(
    child: &mut Child,
    input: &[u8],
) -> std::io::Result<(Vec<u8>, std::process::ExitStatus)> {
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input).await?;
        stdin.shutdown().await?;
    }

    let mut output = Vec::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout.read_to_end(&mut output).await?;
    }

    let status = child.wait().await?;
    Ok((output, status))
}

/// Kill the child, tolerating the race where it already exited.
async fn kill_quietly(child: &mut Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}

//! End-to-end analysis of one file.
//!
//! Ties the pipeline together: capture the build configuration, emulate
//! the compiler invocation, encode the request, run the analyzer
//! subprocess, decode the response, and convert messages into issues.
//! One analysis is one unit of work owning its child process; the only
//! state shared between concurrent analyses is the read-only rules
//! snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::capture::{self, BuildModel, CaptureError};
use crate::driver;
use crate::issues::{FsSnapshot, Issue, MessageConverter, TextSnapshot};
use crate::process::{AnalysisState, AnalyzerRunner, CancellationToken, RunOutcome};
use crate::protocol;
use crate::rules::RulesConfiguration;

/// Receives lifecycle notifications for analyses.
///
/// Process-level failures are reported here, never thrown across the
/// subprocess boundary into caller code.
pub trait StatusSink: Send + Sync {
    fn started(&self, _file: &Path) {}
    fn finished(&self, _file: &Path, _succeeded: bool) {}
    fn cancelled(&self, _file: &Path) {}
    fn failed(&self, _file: &Path, _reason: &str) {}
}

/// Default sink: log lifecycle events.
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn started(&self, file: &Path) {
        tracing::debug!("analysis started: {}", file.display());
    }

    fn finished(&self, file: &Path, succeeded: bool) {
        tracing::debug!("analysis finished: {} (succeeded: {})", file.display(), succeeded);
    }

    fn cancelled(&self, file: &Path) {
        tracing::info!("analysis cancelled: {}", file.display());
    }

    fn failed(&self, file: &Path, reason: &str) {
        tracing::warn!("analysis failed: {}: {}", file.display(), reason);
    }
}

/// The result of analyzing one file.
#[derive(Debug)]
pub struct FileAnalysis {
    pub file: PathBuf,
    pub state: AnalysisState,
    pub succeeded: bool,
    pub issues: Vec<Issue>,
}

impl FileAnalysis {
    fn skipped(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            state: AnalysisState::NotStarted,
            succeeded: true,
            issues: Vec::new(),
        }
    }

    fn outcome(file: &Path, state: AnalysisState, succeeded: bool) -> Self {
        Self {
            file: file.to_path_buf(),
            state,
            succeeded,
            issues: Vec::new(),
        }
    }
}

/// Analyzes files against a fixed rules snapshot.
pub struct Analyzer {
    executable: PathBuf,
    timeout: Duration,
    rules: Arc<RulesConfiguration>,
    status: Arc<dyn StatusSink>,
    snapshot: Arc<dyn TextSnapshot>,
}

impl Analyzer {
    pub fn new<P: Into<PathBuf>>(executable: P, rules: Arc<RulesConfiguration>) -> Self {
        Self {
            executable: executable.into(),
            timeout: Duration::from_secs(120),
            rules,
            status: Arc::new(LogStatusSink),
            snapshot: Arc::new(FsSnapshot),
        }
    }

    /// Set the per-file analysis timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the status notification sink.
    pub fn status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status = sink;
        self
    }

    /// Replace the text snapshot provider used for line hashes.
    pub fn text_snapshot(mut self, snapshot: Arc<dyn TextSnapshot>) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Analyze one file.
    ///
    /// Never returns an error: every failure mode maps to a reported
    /// status and an empty issue list. Configuration and emulation
    /// problems are per-file and leave other files unaffected.
    pub fn analyze(
        &self,
        model: &dyn BuildModel,
        file: &Path,
        cwd: &Path,
        token: &CancellationToken,
    ) -> FileAnalysis {
        self.status.started(file);

        let config = match capture::capture(model, file) {
            Ok(config) => config,
            Err(CaptureError::NotCaptured) => {
                tracing::debug!("no buildable configuration for {}", file.display());
                return FileAnalysis::skipped(file);
            }
            Err(e @ CaptureError::UnsupportedValue { .. }) => {
                return self.fail(file, &e.to_string());
            }
        };

        let (probe, invocation) = match config.captures(cwd) {
            Ok(captures) => captures,
            Err(e) => return self.fail(file, &e.to_string()),
        };

        let mut request = match driver::emulate(&probe, &invocation) {
            Ok(Some(request)) => request,
            // Multi-file, CLR/CX, and response-file invocations are
            // skipped by design, without an error.
            Ok(None) => {
                tracing::debug!("invocation not emulated for {}", file.display());
                return FileAnalysis::skipped(file);
            }
            Err(e) => return self.fail(file, &e.to_string()),
        };
        request.rules = Some(Arc::clone(&self.rules));

        let mut encoded = Vec::new();
        if let Err(e) = protocol::write_request(&mut encoded, &request) {
            return self.fail(file, &e.to_string());
        }

        let runner = AnalyzerRunner::new(&self.executable).timeout(self.timeout);
        match runner.run(&encoded, token) {
            RunOutcome::Completed(output) => match protocol::read_response(output.as_slice()) {
                Ok(response) => {
                    let mut converter = MessageConverter::new(
                        Arc::clone(&self.rules),
                        request.file.clone(),
                        Arc::clone(&self.snapshot),
                    );
                    let result = converter.convert(&response);
                    self.status.finished(file, result.succeeded);
                    FileAnalysis {
                        file: file.to_path_buf(),
                        state: AnalysisState::Completed,
                        succeeded: result.succeeded,
                        issues: result.issues,
                    }
                }
                // Corrupt framing is equivalent to a process failure:
                // empty result, failure status.
                Err(e) => self.fail(file, &e.to_string()),
            },
            RunOutcome::TimedOut => {
                self.status.failed(file, "analyzer timed out");
                FileAnalysis::outcome(file, AnalysisState::TimedOut, false)
            }
            RunOutcome::Cancelled => {
                self.status.cancelled(file);
                FileAnalysis::outcome(file, AnalysisState::Cancelled, false)
            }
            RunOutcome::Failed(reason) => self.fail(file, &reason),
        }
    }

    fn fail(&self, file: &Path, reason: &str) -> FileAnalysis {
        tracing::warn!("analysis of {} failed: {}", file.display(), reason);
        self.status.failed(file, reason);
        FileAnalysis::outcome(file, AnalysisState::Failed, false)
    }
}

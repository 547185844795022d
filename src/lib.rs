//! Clbridge - build-configuration bridge to an out-of-process C/C++ analyzer.
//!
//! Clbridge reconstructs the exact compiler invocation a build system
//! would have used for a C/C++ source file, interprets it the way a
//! cl.exe-compatible front end would, ships the normalized request to an
//! external analyzer over a binary protocol, and converts the analyzer's
//! findings into rule-filtered, severity-classified issues.
//!
//! # Architecture
//!
//! Data flows strictly left to right through five stages:
//!
//! - `capture`: build-property capture into a per-file configuration and
//!   a rebuilt compiler invocation
//! - `driver`: MSVC command-line emulation into an analysis request
//! - `protocol`: big-endian, sentinel-framed request/response codec
//! - `process`: subprocess execution with timeout and cancellation
//! - `issues`: message classification, rule filtering, issue construction
//!
//! `analysis` ties the stages together; `settings`, `rules`, `report` and
//! `cli` supply the file-backed configuration and the command-line
//! surface.

pub mod analysis;
pub mod capture;
pub mod cli;
pub mod driver;
pub mod issues;
pub mod process;
pub mod protocol;
pub mod report;
pub mod rules;
pub mod settings;

pub use analysis::{Analyzer, FileAnalysis, LogStatusSink, StatusSink};
pub use capture::{capture, BuildFileConfig, BuildModel, Capture, CaptureError, PropertyValue};
pub use driver::{emulate, AnalysisRequest, CompilerVersion, DriverError};
pub use issues::{Issue, IssueLocation, MessageConverter, TextSnapshot};
pub use process::{AnalysisState, AnalyzerRunner, CancellationToken, RunOutcome};
pub use protocol::{read_response, write_request, AnalysisResponse, Message, ProtocolError};
pub use rules::{RulesConfiguration, Severity};
pub use settings::Settings;

//! IDE-facing issue model and message conversion.
//!
//! Raw analyzer messages become [`Issue`] values here: control messages
//! are separated from genuine findings, findings are filtered by the
//! active-rule set, severity and type are resolved from rule metadata,
//! and every location gets a text range plus a line-content hash for
//! drift-tolerant tracking.

mod convert;
mod hash;

pub use convert::{ConversionResult, MessageConverter};
pub use hash::{hash_line, ContentCache, FsSnapshot, TextSnapshot};

use serde::Serialize;
use std::path::PathBuf;

use crate::rules::{ImpactSeverity, IssueType, Severity};

/// A zero-based text range.
///
/// Lines stay one-based as the analyzer reports them; column offsets are
/// converted to zero-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextRange {
    pub start_line: i32,
    pub start_line_offset: i32,
    pub end_line: i32,
    pub end_line_offset: i32,
}

/// One issue location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueLocation {
    pub file: PathBuf,
    pub message: String,
    pub range: TextRange,
    /// Hash of the line's current content; None for whole-file locations
    /// and when the content is unavailable.
    pub line_hash: Option<String>,
}

/// An ordered sequence of secondary locations explaining how the primary
/// issue arose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flow {
    pub locations: Vec<IssueLocation>,
}

/// One edit of a quick fix, with a zero-based column range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuickFixEdit {
    pub range: TextRange,
    pub replacement: String,
}

/// An analyzer-suggested fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuickFix {
    pub message: String,
    pub edits: Vec<QuickFixEdit>,
}

/// A converted, IDE-consumable finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Language-prefixed rule key, e.g. "cpp:S2259".
    pub rule_key: String,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    /// Maximum severity across the rule's declared software-quality
    /// impacts. Absent for security hotspots and for rules declaring no
    /// impacts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_impact: Option<ImpactSeverity>,
    pub primary: IssueLocation,
    /// Zero or one flow.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<Flow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quick_fixes: Vec<QuickFix>,
}

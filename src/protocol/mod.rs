//! Binary wire protocol for the analyzer subprocess.
//!
//! The exchange is big-endian and sentinel-framed: the request is
//! bracketed by `"IN"` and `"END"`, the response by `"OUT"` and `"END"`.
//! Integers are 32-bit, 64-bit, or unsigned 16-bit; strings are UTF-8
//! with a 16-bit length prefix; string arrays carry a 32-bit count.
//!
//! The response carries three fixed-order sections: messages, measures,
//! and symbols. The latter two exist only to keep the byte cursor
//! synchronized with the analyzer's emission order; their content is read
//! and discarded.

mod reader;
mod writer;

pub use reader::{read_request, read_response, ProtocolReader};
pub use writer::{write_request, ProtocolWriter};

use thiserror::Error;

/// Sentinel opening a request frame.
pub const SENTINEL_IN: &str = "IN";
/// Sentinel opening a response frame.
pub const SENTINEL_OUT: &str = "OUT";
/// Sentinel closing either frame.
pub const SENTINEL_END: &str = "END";

/// Errors raised by the codec.
///
/// Any of these is protocol corruption: fatal to the current analysis,
/// never to the host process.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("i/o error on analyzer stream: {0}")]
    Io(#[from] std::io::Error),
    #[error("expected sentinel {expected:?}, found {found:?}")]
    BadSentinel { expected: &'static str, found: String },
    #[error("string of {0} bytes exceeds the 16-bit length prefix")]
    StringTooLong(usize),
    #[error("wire string is not valid UTF-8")]
    InvalidUtf8,
    #[error("negative count {0} in wire array")]
    InvalidCount(i32),
}

/// A decoded analyzer response: the ordered message list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResponse {
    pub messages: Vec<Message>,
}

/// One analyzer message.
///
/// `end_line == 0` marks a file-level diagnostic; column values are
/// defined as 0 in that case and must be ignored by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub rule_key: String,
    pub filename: String,
    pub line: i32,
    pub column: i32,
    pub end_line: i32,
    pub end_column: i32,
    pub text: String,
    /// When true, `parts` must be read in reverse order to form a causal
    /// chain. The reversal happens exactly once, at issue conversion.
    pub parts_make_flow: bool,
    pub parts: Vec<MessagePart>,
    pub fixes: Vec<QuickFix>,
}

/// A secondary location attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePart {
    pub filename: String,
    pub line: i32,
    pub column: i32,
    pub end_line: i32,
    pub end_column: i32,
    pub text: String,
}

/// An analyzer-suggested fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickFix {
    pub message: String,
    pub edits: Vec<QuickFixEdit>,
}

/// One text edit of a quick fix. The range is 1-based as emitted by the
/// analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickFixEdit {
    pub start_line: i32,
    pub start_column: i32,
    pub end_line: i32,
    pub end_column: i32,
    pub replacement: String,
}

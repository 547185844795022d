//! The normalized analysis request produced by driver emulation.

use std::path::PathBuf;
use std::sync::Arc;

use crate::rules::RulesConfiguration;

/// Bit flags carried in the request's flag word.
pub mod flags {
    pub const CPLUSPLUS: i64 = 1;
    pub const C99: i64 = 1 << 1;
    pub const C11: i64 = 1 << 2;
    pub const CPP11: i64 = 1 << 3;
    pub const CPP14: i64 = 1 << 4;
    pub const CPP17: i64 = 1 << 5;
    pub const CPP20: i64 = 1 << 6;
    pub const MS_EXTENSIONS: i64 = 1 << 7;
    pub const OPERATOR_NAMES: i64 = 1 << 8;
    pub const CHAR_IS_UNSIGNED: i64 = 1 << 9;
    pub const CREATE_REPRODUCER: i64 = 1 << 10;
    pub const BUILD_PREAMBLE: i64 = 1 << 11;
}

/// A fully normalized analysis request.
///
/// Built once per analysis by the driver emulator, consumed by the wire
/// codec, never mutated after construction.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Dialect and mode bits, see [`flags`].
    pub flags: i64,
    /// Integer-encoded compiler version.
    pub ms_version: i32,
    /// Ordered include directories.
    pub include_dirs: Vec<String>,
    /// Framework directories. Always empty in this emulation.
    pub framework_dirs: Vec<String>,
    /// Virtual-filesystem overlay files. Always empty in this emulation.
    pub vfs_overlays: Vec<String>,
    /// Synthesized preprocessor predefine source text.
    pub predefines: String,
    /// Target triple, e.g. "x86_64-pc-windows".
    pub target_triple: String,
    /// Absolute path of the file under analysis.
    pub file: PathBuf,
    /// Rule configuration snapshot for use after the round trip.
    /// Not serialized.
    pub rules: Option<Arc<RulesConfiguration>>,
}

impl AnalysisRequest {
    /// Whether a flag bit is set.
    pub fn has_flag(&self, flag: i64) -> bool {
        self.flags & flag != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_query() {
        let request = AnalysisRequest {
            flags: flags::CPLUSPLUS | flags::CPP17,
            ms_version: 192_930_133,
            include_dirs: Vec::new(),
            framework_dirs: Vec::new(),
            vfs_overlays: Vec::new(),
            predefines: String::new(),
            target_triple: "x86_64-pc-windows".to_string(),
            file: PathBuf::from("a.cpp"),
            rules: None,
        };
        assert!(request.has_flag(flags::CPLUSPLUS));
        assert!(request.has_flag(flags::CPP17));
        assert!(!request.has_flag(flags::CHAR_IS_UNSIGNED));
    }
}

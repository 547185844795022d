//! Compiler invocation snapshots.

use std::path::PathBuf;

/// A snapshot of one compiler invocation.
///
/// Two captures are produced per analyzed file: a probe capture conveying
/// the detected compiler version and target architecture (it carries no
/// argument vector), and the real capture whose argument vector is rebuilt
/// deterministically from the file's build properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Compiler executable name.
    pub executable: String,
    /// Working directory of the invocation.
    pub cwd: PathBuf,
    /// Environment strings in "NAME=value" form.
    pub env: Vec<String>,
    /// Ordered argument vector (empty for probe captures).
    pub args: Vec<String>,
    /// Detected compiler version (probe captures only).
    pub compiler_version: Option<String>,
    /// Detected target architecture, "x86" or "x64" (probe captures only).
    pub target_arch: Option<String>,
}

impl Capture {
    /// Create a probe capture carrying compiler identity and no arguments.
    pub fn probe(executable: &str, version: &str, target_arch: &str) -> Self {
        Self {
            executable: executable.to_string(),
            cwd: PathBuf::new(),
            env: Vec::new(),
            args: Vec::new(),
            compiler_version: Some(version.to_string()),
            target_arch: Some(target_arch.to_string()),
        }
    }

    /// Create a real compilation capture.
    pub fn invocation(executable: &str, cwd: PathBuf, env: Vec<String>, args: Vec<String>) -> Self {
        Self {
            executable: executable.to_string(),
            cwd,
            env,
            args,
            compiler_version: None,
            target_arch: None,
        }
    }

    /// Whether this is a probe capture.
    pub fn is_probe(&self) -> bool {
        self.compiler_version.is_some()
    }
}

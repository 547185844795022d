//! Settings schema for clbridge.
//!
//! A settings file describes what the host build system would have told us:
//! per-file compiler properties, the active compiler version, and where the
//! external analyzer binary lives. Inside an IDE these values come from the
//! project model; the CLI reads them from YAML instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::{BuildModel, PropertyValue};

/// Project identity marker used by single-file editing sessions.
///
/// When a file is opened without a real project, the host fabricates a
/// throwaway project whose name carries this marker. Such files have no
/// buildable configuration and must not be analyzed.
pub const INTELLISENSE_ONLY_MARKER: &str = "SingleFileIntelliSense";

/// Top-level settings definition.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub version: String,
    /// Project identity as the build model reports it.
    #[serde(default)]
    pub project: ProjectSettings,
    #[serde(default)]
    pub analyzer: AnalyzerSettings,
    #[serde(default)]
    pub compiler: CompilerSettings,
    /// Properties applied to every file unless overridden per file.
    #[serde(default)]
    pub defaults: HashMap<String, String>,
    /// Per-file property overrides, keyed by path relative to the settings file.
    #[serde(default)]
    pub files: HashMap<String, HashMap<String, String>>,
}

/// Identity of the owning project.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProjectSettings {
    #[serde(default)]
    pub name: String,
}

/// Where and how to run the external analyzer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzerSettings {
    /// Path to the analyzer executable.
    #[serde(default)]
    pub executable: PathBuf,
    /// Per-file analysis timeout in seconds (default: 120).
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Glob patterns for paths to exclude from analysis (e.g., "**/vendor/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
}

fn default_timeout_seconds() -> u64 {
    120
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::new(),
            timeout_seconds: default_timeout_seconds(),
            excluded_paths: Vec::new(),
        }
    }
}

/// Detected compiler identity.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CompilerSettings {
    /// Dotted cl.exe version string, e.g. "19.29.30133".
    #[serde(default)]
    pub version: String,
}

impl Settings {
    /// Parse a settings file from YAML.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Check if a path should be excluded based on analyzer.excluded_paths.
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        if self.analyzer.excluded_paths.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();

        for pattern in &self.analyzer.excluded_paths {
            if let Ok(glob) = globset::Glob::new(pattern) {
                let matcher = glob.compile_matcher();
                if matcher.is_match(&*path_str) {
                    return true;
                }
            }
        }
        false
    }

    /// Look up a property for a file, falling back to the defaults section.
    ///
    /// File keys are relative to the settings file; a key also matches
    /// when it is a trailing path of the looked-up file.
    fn lookup(&self, file: &Path, name: &str) -> Option<&String> {
        let normalized = normalize_key(&file.to_string_lossy());
        self.files
            .iter()
            .find(|(k, _)| {
                let key = normalize_key(k);
                normalized == key || normalized.ends_with(&format!("/{}", key))
            })
            .and_then(|(_, props)| props.get(name))
            .or_else(|| self.defaults.get(name))
    }
}

/// Normalize a file key for lookup: forward slashes, lowercase.
fn normalize_key(key: &str) -> String {
    key.replace('\\', "/").to_lowercase()
}

impl BuildModel for Settings {
    fn project_identity(&self) -> &str {
        &self.project.name
    }

    fn compiler_version(&self) -> &str {
        &self.compiler.version
    }

    fn property(&self, file: &Path, name: &str) -> PropertyValue {
        match self.lookup(file, name) {
            Some(value) => PropertyValue::Value(value.clone()),
            // A property absent from the model is one the active toolchain
            // does not expose; capture substitutes the documented default.
            None => PropertyValue::Unsupported,
        }
    }
}

/// Validate settings for correctness.
pub fn validate(settings: &Settings) -> anyhow::Result<()> {
    if settings.analyzer.executable.as_os_str().is_empty() {
        anyhow::bail!("analyzer.executable is not set");
    }

    if settings.analyzer.timeout_seconds == 0 {
        anyhow::bail!("analyzer.timeout_seconds must be greater than zero");
    }

    // Validate excluded_paths glob patterns compile
    for pattern in &settings.analyzer.excluded_paths {
        globset::Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid excluded_paths pattern {:?}: {}", pattern, e))?;
    }

    Ok(())
}

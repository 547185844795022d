//! Rule configuration snapshot.
//!
//! A [`RulesConfiguration`] is loaded once at startup and shared read-only
//! by every in-flight analysis. It knows which rules are active, their
//! default severity and type, their declared software-quality impacts, and
//! their parameter defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Severity levels, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
    Blocker,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Minor => write!(f, "minor"),
            Severity::Major => write!(f, "major"),
            Severity::Critical => write!(f, "critical"),
            Severity::Blocker => write!(f, "blocker"),
        }
    }
}

/// Issue types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Bug,
    Vulnerability,
    CodeSmell,
    /// Requires human review rather than a severity-ranked defect.
    SecurityHotspot,
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueType::Bug => write!(f, "bug"),
            IssueType::Vulnerability => write!(f, "vulnerability"),
            IssueType::CodeSmell => write!(f, "code_smell"),
            IssueType::SecurityHotspot => write!(f, "security_hotspot"),
        }
    }
}

/// Software qualities a rule can impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoftwareQuality {
    Maintainability,
    Reliability,
    Security,
}

/// Impact severities, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactSeverity {
    Info,
    Low,
    Medium,
    High,
    Blocker,
}

impl std::fmt::Display for ImpactSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImpactSeverity::Info => write!(f, "info"),
            ImpactSeverity::Low => write!(f, "low"),
            ImpactSeverity::Medium => write!(f, "medium"),
            ImpactSeverity::High => write!(f, "high"),
            ImpactSeverity::Blocker => write!(f, "blocker"),
        }
    }
}

/// Metadata declared for one rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleMetadata {
    pub severity: Severity,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    /// Declared software-quality impacts. May be empty for rules that
    /// predate the impact taxonomy.
    #[serde(default)]
    pub impacts: HashMap<SoftwareQuality, ImpactSeverity>,
}

impl RuleMetadata {
    /// The maximum severity across declared impacts, if any are declared.
    pub fn highest_impact(&self) -> Option<ImpactSeverity> {
        self.impacts.values().copied().max()
    }
}

/// One rule entry in a rules file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleEntry {
    pub key: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(flatten)]
    pub metadata: RuleMetadata,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

fn default_active() -> bool {
    true
}

/// On-disk rules file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RulesFile {
    /// Language key the rules apply to, "c" or "cpp".
    pub language: String,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

/// Immutable rule configuration shared by all analyses.
///
/// Constructed once at startup; rule-key membership is case-insensitive,
/// consistent with how rule keys are normally cased.
#[derive(Debug, Clone)]
pub struct RulesConfiguration {
    language: String,
    active: HashMap<String, RuleMetadata>,
    parameters: HashMap<String, HashMap<String, String>>,
}

impl RulesConfiguration {
    pub fn new(language: &str, entries: Vec<RuleEntry>) -> Self {
        let mut active = HashMap::new();
        let mut parameters = HashMap::new();
        for entry in entries {
            if !entry.active {
                continue;
            }
            let key = entry.key.to_lowercase();
            if !entry.parameters.is_empty() {
                parameters.insert(key.clone(), entry.parameters);
            }
            active.insert(key, entry.metadata);
        }
        Self {
            language: language.to_string(),
            active,
            parameters,
        }
    }

    /// Load a rules file from YAML.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let file: RulesFile = serde_yaml::from_str(&content)?;
        Ok(Self::new(&file.language, file.rules))
    }

    /// The language key, "c" or "cpp".
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Whether a rule key is active (case-insensitive).
    pub fn is_active(&self, key: &str) -> bool {
        self.active.contains_key(&key.to_lowercase())
    }

    /// Metadata for an active rule.
    pub fn metadata(&self, key: &str) -> Option<&RuleMetadata> {
        self.active.get(&key.to_lowercase())
    }

    /// Parameter defaults for an active rule.
    pub fn parameters(&self, key: &str) -> Option<&HashMap<String, String>> {
        self.parameters.get(&key.to_lowercase())
    }

    /// All active rule keys.
    pub fn active_rule_keys(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    /// The language-prefixed form of a rule key, e.g. "cpp:S5276".
    pub fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.language, key)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

//! Conversion of raw analyzer messages into issues.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::hash::{ContentCache, TextSnapshot};
use super::{Flow, Issue, IssueLocation, QuickFix, QuickFixEdit, TextRange};
use crate::protocol::{AnalysisResponse, Message, MessagePart};
use crate::rules::{IssueType, RulesConfiguration};

/// Control messages the analyzer reports under reserved rule keys.
const INTERNAL_PREFIX: &str = "internal.";
const UNSUPPORTED_CONFIG: &str = "internal.UnsupportedConfig";
const INVALID_INPUT: &str = "internal.InvalidInput";
const UNEXPECTED_FAILURE: &str = "internal.UnexpectedFailure";
const FILE_DEPENDENCY: &str = "internal.fileDependency";

/// End-line sentinel marking a file-level diagnostic.
const WHOLE_FILE: i32 = 0;

/// The outcome of converting one response.
#[derive(Debug)]
pub struct ConversionResult {
    pub issues: Vec<Issue>,
    /// False when the analyzer reported an internal failure. The rest of
    /// the response is still processed.
    pub succeeded: bool,
}

/// Turns analyzer messages into issues for one analyzed file.
///
/// Owns a private content cache; one converter per analysis, never shared
/// across concurrent analyses of different files.
pub struct MessageConverter {
    rules: Arc<RulesConfiguration>,
    analyzed_file: PathBuf,
    cache: ContentCache,
}

impl MessageConverter {
    pub fn new(
        rules: Arc<RulesConfiguration>,
        analyzed_file: PathBuf,
        snapshot: Arc<dyn TextSnapshot>,
    ) -> Self {
        Self {
            rules,
            analyzed_file,
            cache: ContentCache::new(snapshot),
        }
    }

    /// Convert every message, in the order the analyzer emitted them.
    pub fn convert(&mut self, response: &AnalysisResponse) -> ConversionResult {
        let mut issues = Vec::new();
        let mut succeeded = true;

        for message in &response.messages {
            if message.rule_key.starts_with(INTERNAL_PREFIX) {
                if !self.handle_internal(message) {
                    succeeded = false;
                }
                continue;
            }
            if let Some(issue) = self.convert_message(message) {
                issues.push(issue);
            }
        }

        ConversionResult { issues, succeeded }
    }

    /// Handle a control message. Returns false when it marks a failure.
    fn handle_internal(&self, message: &Message) -> bool {
        match message.rule_key.as_str() {
            UNSUPPORTED_CONFIG | INVALID_INPUT | UNEXPECTED_FAILURE => {
                tracing::warn!(
                    "analyzer reported {}: {}",
                    message.rule_key,
                    message.text
                );
                false
            }
            FILE_DEPENDENCY => true,
            other => {
                tracing::debug!("ignoring unknown control message {}", other);
                true
            }
        }
    }

    fn convert_message(&mut self, message: &Message) -> Option<Issue> {
        if message.filename.is_empty()
            || !paths_equal(Path::new(&message.filename), &self.analyzed_file)
        {
            return None;
        }
        let metadata = self.rules.metadata(&message.rule_key)?;
        let severity = metadata.severity;
        let issue_type = metadata.issue_type;

        // Security hotspots keep the review workflow; the impact taxonomy
        // does not apply to them.
        let highest_impact = if issue_type == IssueType::SecurityHotspot {
            None
        } else {
            metadata.highest_impact()
        };

        let primary = self.location(
            Path::new(&message.filename),
            &message.text,
            message.line,
            message.column,
            message.end_line,
            message.end_column,
        );

        let flows = self.build_flows(message);
        let quick_fixes = message.fixes.iter().map(convert_fix).collect();

        Some(Issue {
            rule_key: self.rules.full_key(&message.rule_key),
            severity,
            issue_type,
            highest_impact,
            primary,
            flows,
            quick_fixes,
        })
    }

    /// Assemble the message parts into zero or one flow.
    ///
    /// When `parts_make_flow` is set the parts describe a causal chain in
    /// reverse order; they are reversed exactly once, here.
    fn build_flows(&mut self, message: &Message) -> Vec<Flow> {
        if message.parts.is_empty() {
            return Vec::new();
        }

        let mut locations: Vec<IssueLocation> = message
            .parts
            .iter()
            .map(|part| self.part_location(part))
            .collect();
        if message.parts_make_flow {
            locations.reverse();
        }

        vec![Flow { locations }]
    }

    fn part_location(&mut self, part: &MessagePart) -> IssueLocation {
        self.location(
            Path::new(&part.filename),
            &part.text,
            part.line,
            part.column,
            part.end_line,
            part.end_column,
        )
    }

    fn location(
        &mut self,
        file: &Path,
        text: &str,
        line: i32,
        column: i32,
        end_line: i32,
        end_column: i32,
    ) -> IssueLocation {
        let (range, line_hash) = if end_line == WHOLE_FILE {
            // File-level diagnostic: raw column values are meaningless and
            // the whole line is selected. No content hash.
            let range = TextRange {
                start_line: line,
                start_line_offset: 0,
                end_line,
                end_line_offset: 0,
            };
            (range, None)
        } else {
            let range = TextRange {
                start_line: line,
                start_line_offset: to_offset(column),
                end_line,
                end_line_offset: to_offset(end_column),
            };
            let hash = self.cache.line_hash(file, line.max(0) as u32);
            (range, hash)
        };

        IssueLocation {
            file: file.to_path_buf(),
            message: text.to_string(),
            range,
            line_hash,
        }
    }
}

/// Convert a one-based analyzer column to a zero-based offset.
fn to_offset(column: i32) -> i32 {
    (column - 1).max(0)
}

fn convert_fix(fix: &crate::protocol::QuickFix) -> QuickFix {
    QuickFix {
        message: fix.message.clone(),
        edits: fix
            .edits
            .iter()
            .map(|edit| QuickFixEdit {
                range: TextRange {
                    start_line: edit.start_line,
                    start_line_offset: to_offset(edit.start_column),
                    end_line: edit.end_line,
                    end_line_offset: to_offset(edit.end_column),
                },
                replacement: edit.replacement.clone(),
            })
            .collect(),
    }
}

/// Case-insensitive, separator-normalized path equality.
fn paths_equal(a: &Path, b: &Path) -> bool {
    normalize(a) == normalize(b)
}

fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{ImpactSeverity, RulesFile, Severity};

    struct FixedSnapshot(&'static str);

    impl TextSnapshot for FixedSnapshot {
        fn line_text(&self, _file: &Path, _line: u32) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    struct EmptySnapshot;

    impl TextSnapshot for EmptySnapshot {
        fn line_text(&self, _file: &Path, _line: u32) -> Option<String> {
            None
        }
    }

    fn rules() -> Arc<RulesConfiguration> {
        let file: RulesFile = serde_yaml::from_str(
            r#"
language: cpp
rules:
  - key: S2259
    severity: blocker
    type: bug
    impacts:
      reliability: high
      maintainability: low
  - key: S5276
    severity: major
    type: code_smell
  - key: S2068
    severity: critical
    type: security_hotspot
    impacts:
      security: high
"#,
        )
        .unwrap();
        Arc::new(RulesConfiguration::new(&file.language, file.rules))
    }

    fn converter() -> MessageConverter {
        MessageConverter::new(
            rules(),
            PathBuf::from("proj/src/widget.cpp"),
            Arc::new(FixedSnapshot("int* p = nullptr;")),
        )
    }

    fn message(rule_key: &str) -> Message {
        Message {
            rule_key: rule_key.to_string(),
            filename: "proj/src/widget.cpp".to_string(),
            line: 10,
            column: 3,
            end_line: 10,
            end_column: 17,
            text: "finding text".to_string(),
            parts_make_flow: false,
            parts: Vec::new(),
            fixes: Vec::new(),
        }
    }

    fn part(line: i32, text: &str) -> MessagePart {
        MessagePart {
            filename: "proj/src/widget.cpp".to_string(),
            line,
            column: 1,
            end_line: line,
            end_column: 4,
            text: text.to_string(),
        }
    }

    fn respond(messages: Vec<Message>) -> AnalysisResponse {
        AnalysisResponse { messages }
    }

    #[test]
    fn test_active_finding_becomes_issue() {
        let result = converter().convert(&respond(vec![message("S2259")]));
        assert!(result.succeeded);
        assert_eq!(result.issues.len(), 1);

        let issue = &result.issues[0];
        assert_eq!(issue.rule_key, "cpp:S2259");
        assert_eq!(issue.severity, Severity::Blocker);
        assert_eq!(issue.highest_impact, Some(ImpactSeverity::High));
        assert_eq!(issue.primary.range.start_line_offset, 2);
        assert_eq!(issue.primary.range.end_line_offset, 16);
        assert!(issue.primary.line_hash.is_some());
    }

    #[test]
    fn test_inactive_rule_produces_no_issue() {
        let result = converter().convert(&respond(vec![message("S9999")]));
        assert!(result.succeeded);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_other_file_finding_is_dropped() {
        let mut m = message("S2259");
        m.filename = "proj/src/other.cpp".to_string();
        let result = converter().convert(&respond(vec![m]));
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_empty_filename_is_dropped() {
        let mut m = message("S2259");
        m.filename = String::new();
        let result = converter().convert(&respond(vec![m]));
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_path_equality_ignores_case_and_separators() {
        let mut m = message("S2259");
        m.filename = "proj\\src\\Widget.CPP".to_string();
        let result = converter().convert(&respond(vec![m]));
        assert_eq!(result.issues.len(), 1);
    }

    #[test]
    fn test_internal_failures_flip_succeeded() {
        for key in [
            "internal.UnsupportedConfig",
            "internal.InvalidInput",
            "internal.UnexpectedFailure",
        ] {
            let result = converter().convert(&respond(vec![message(key)]));
            assert!(!result.succeeded, "{} should mark failure", key);
            assert!(result.issues.is_empty());
        }
    }

    #[test]
    fn test_file_dependency_is_ignored() {
        let result = converter().convert(&respond(vec![message("internal.fileDependency")]));
        assert!(result.succeeded);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_remaining_messages_processed_after_internal_failure() {
        let result = converter().convert(&respond(vec![
            message("internal.InvalidInput"),
            message("S2259"),
        ]));
        assert!(!result.succeeded);
        assert_eq!(result.issues.len(), 1);
    }

    #[test]
    fn test_whole_file_location_has_zero_offsets_and_no_hash() {
        let mut m = message("S2259");
        m.end_line = 0;
        m.column = 5;
        m.end_column = 30;
        let result = converter().convert(&respond(vec![m]));

        let primary = &result.issues[0].primary;
        assert_eq!(primary.range.start_line_offset, 0);
        assert_eq!(primary.range.end_line_offset, 0);
        assert_eq!(primary.line_hash, None);
    }

    #[test]
    fn test_hash_is_none_when_content_unavailable() {
        let mut converter = MessageConverter::new(
            rules(),
            PathBuf::from("proj/src/widget.cpp"),
            Arc::new(EmptySnapshot),
        );
        let result = converter.convert(&respond(vec![message("S2259")]));
        assert_eq!(result.issues[0].primary.line_hash, None);
    }

    #[test]
    fn test_flow_order_reversed_when_parts_make_flow() {
        let mut m = message("S2259");
        m.parts = vec![part(1, "A"), part(2, "B"), part(3, "C")];
        m.parts_make_flow = true;
        let result = converter().convert(&respond(vec![m]));

        let flow = &result.issues[0].flows[0];
        let order: Vec<&str> = flow.locations.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(order, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_flow_order_kept_otherwise() {
        let mut m = message("S2259");
        m.parts = vec![part(1, "A"), part(2, "B"), part(3, "C")];
        m.parts_make_flow = false;
        let result = converter().convert(&respond(vec![m]));

        let flow = &result.issues[0].flows[0];
        let order: Vec<&str> = flow.locations.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_no_parts_means_no_flow() {
        let result = converter().convert(&respond(vec![message("S2259")]));
        assert!(result.issues[0].flows.is_empty());
    }

    #[test]
    fn test_security_hotspot_has_no_highest_impact() {
        let result = converter().convert(&respond(vec![message("S2068")]));
        let issue = &result.issues[0];
        assert_eq!(issue.issue_type, IssueType::SecurityHotspot);
        assert_eq!(issue.highest_impact, None);
    }

    #[test]
    fn test_rule_without_impacts_has_no_highest_impact() {
        let result = converter().convert(&respond(vec![message("S5276")]));
        assert_eq!(result.issues[0].highest_impact, None);
    }

    #[test]
    fn test_quick_fix_edit_columns_become_zero_based() {
        let mut m = message("S5276");
        m.fixes = vec![crate::protocol::QuickFix {
            message: "Replace with nullptr".to_string(),
            edits: vec![crate::protocol::QuickFixEdit {
                start_line: 10,
                start_column: 5,
                end_line: 10,
                end_column: 9,
                replacement: "nullptr".to_string(),
            }],
        }];
        let result = converter().convert(&respond(vec![m]));

        let fix = &result.issues[0].quick_fixes[0];
        assert_eq!(fix.message, "Replace with nullptr");
        let edit = &fix.edits[0];
        assert_eq!(edit.range.start_line_offset, 4);
        assert_eq!(edit.range.end_line_offset, 8);
        assert_eq!(edit.replacement, "nullptr");
    }

    #[test]
    fn test_messages_convert_in_emission_order() {
        let mut first = message("S2259");
        first.line = 5;
        let mut second = message("S5276");
        second.line = 2;
        let result = converter().convert(&respond(vec![first, second]));
        assert_eq!(result.issues[0].rule_key, "cpp:S2259");
        assert_eq!(result.issues[1].rule_key, "cpp:S5276");
    }
}

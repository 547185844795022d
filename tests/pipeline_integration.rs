//! End-to-end pipeline tests against a scripted analyzer.
//!
//! Each test stands up a throwaway project with a shell script in place
//! of the analyzer binary, runs a full analysis, and checks the issues
//! that come out the other side.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clbridge::analysis::Analyzer;
use clbridge::process::{AnalysisState, CancellationToken};
use clbridge::protocol::{ProtocolWriter, SENTINEL_END, SENTINEL_OUT};
use clbridge::rules::RulesConfiguration;
use clbridge::settings::Settings;

const SOURCE: &str = "\
#include \"widget.h\"

Widget* find_widget(WidgetRegistry& registry, const char* name) {
    Widget* found = nullptr;
    return found;
}
";

/// A wire message the fake analyzer will emit.
struct WireMessage {
    rule_key: String,
    filename: String,
    line: i32,
    end_line: i32,
    text: String,
    parts_make_flow: bool,
    parts: Vec<(i32, String)>,
}

impl WireMessage {
    fn finding(rule_key: &str, filename: &Path, line: i32) -> Self {
        Self {
            rule_key: rule_key.to_string(),
            filename: filename.to_string_lossy().to_string(),
            line,
            end_line: line,
            text: format!("finding from {}", rule_key),
            parts_make_flow: false,
            parts: Vec::new(),
        }
    }
}

/// Encode a full response frame the way the analyzer would.
fn encode_response(messages: &[WireMessage]) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut w = ProtocolWriter::new(&mut buffer);

    w.write_str(SENTINEL_OUT).unwrap();
    w.write_i32(messages.len() as i32).unwrap();
    for m in messages {
        w.write_str(&m.rule_key).unwrap();
        w.write_str(&m.filename).unwrap();
        w.write_i32(m.line).unwrap();
        w.write_i32(1).unwrap();
        w.write_i32(m.end_line).unwrap();
        w.write_i32(12).unwrap();
        w.write_i32(5).unwrap(); // remediation cost, discarded
        w.write_str(&m.text).unwrap();
        w.write_bool(m.parts_make_flow).unwrap();
        w.write_i32(m.parts.len() as i32).unwrap();
        for (line, text) in &m.parts {
            w.write_str(&m.filename).unwrap();
            w.write_i32(*line).unwrap();
            w.write_i32(1).unwrap();
            w.write_i32(*line).unwrap();
            w.write_i32(4).unwrap();
            w.write_str(text).unwrap();
        }
        w.write_i32(0).unwrap(); // no quick fixes
    }

    // measures section: one entry, discarded by the reader
    w.write_i32(1).unwrap();
    w.write_str("widget.cpp").unwrap();
    for metric in [1, 2, 10, 3, 4] {
        w.write_i32(metric).unwrap();
    }
    w.write_i32(2).unwrap();
    w.write_bool(true).unwrap();
    w.write_bool(false).unwrap();

    // symbols section: one symbol with one reference, discarded
    w.write_i32(1).unwrap();
    for v in [4, 12, 4, 17] {
        w.write_i32(v).unwrap();
    }
    w.write_i32(1).unwrap();
    for v in [5, 12, 5, 17] {
        w.write_i32(v).unwrap();
    }

    w.write_str(SENTINEL_END).unwrap();
    buffer
}

struct Project {
    _dir: tempfile::TempDir,
    root: PathBuf,
    file: PathBuf,
    settings: Settings,
    analyzer: PathBuf,
}

/// Stand up a project whose analyzer is a shell script.
fn project(script_body: &str) -> Project {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();

    std::fs::create_dir_all(root.join("src")).unwrap();
    let file = root.join("src/widget.cpp");
    std::fs::write(&file, SOURCE).unwrap();

    let analyzer = root.join("analyzer.sh");
    std::fs::write(&analyzer, script_body).unwrap();
    let mut permissions = std::fs::metadata(&analyzer).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&analyzer, permissions).unwrap();

    let settings: Settings = serde_yaml::from_str(
        r#"
project:
  name: "Widgets.vcxproj"
compiler:
  version: "19.29.30133"
defaults:
  PlatformName: "x64"
  RuntimeLibrary: "MultiThreadedDLL"
  LanguageStandard: "stdcpp17"
"#,
    )
    .unwrap();

    Project {
        _dir: dir,
        root,
        file,
        settings,
        analyzer,
    }
}

/// Script that consumes stdin and replays a canned response file.
fn replay_script(response_path: &Path) -> String {
    format!(
        "#!/bin/sh\ncat > /dev/null\ncat '{}'\n",
        response_path.display()
    )
}

fn rules() -> Arc<RulesConfiguration> {
    let yaml = r#"
language: cpp
rules:
  - key: S2259
    severity: blocker
    type: bug
    impacts:
      reliability: high
  - key: S5276
    severity: major
    type: code_smell
"#;
    let file: clbridge::rules::RulesFile = serde_yaml::from_str(yaml).unwrap();
    Arc::new(RulesConfiguration::new(&file.language, file.rules))
}

#[test]
fn test_end_to_end_issue_delivery() {
    let project = project("#!/bin/sh\nexit 0\n");
    let response_path = project.root.join("response.bin");

    let messages = vec![
        WireMessage::finding("S2259", &project.file, 4),
        // Inactive rule: dropped silently
        WireMessage::finding("S9999", &project.file, 5),
        // Different file: dropped silently
        WireMessage::finding("S5276", Path::new("/other/file.cpp"), 2),
        // Recognized control message, intentionally ignored
        WireMessage::finding("internal.fileDependency", &project.file, 0),
    ];
    std::fs::write(&response_path, encode_response(&messages)).unwrap();
    std::fs::write(&project.analyzer, replay_script(&response_path)).unwrap();

    let analyzer = Analyzer::new(&project.analyzer, rules());
    let result = analyzer.analyze(
        &project.settings,
        &project.file,
        &project.root,
        &CancellationToken::new(),
    );

    assert_eq!(result.state, AnalysisState::Completed);
    assert!(result.succeeded);
    assert_eq!(result.issues.len(), 1);

    let issue = &result.issues[0];
    assert_eq!(issue.rule_key, "cpp:S2259");
    // Line 4 exists on disk, so the anchor hash is computed
    assert!(issue.primary.line_hash.is_some());
}

#[test]
fn test_flow_locations_are_reversed_once() {
    let project = project("#!/bin/sh\nexit 0\n");
    let response_path = project.root.join("response.bin");

    let mut message = WireMessage::finding("S2259", &project.file, 4);
    message.parts_make_flow = true;
    message.parts = vec![
        (1, "A".to_string()),
        (2, "B".to_string()),
        (3, "C".to_string()),
    ];
    std::fs::write(&response_path, encode_response(&[message])).unwrap();
    std::fs::write(&project.analyzer, replay_script(&response_path)).unwrap();

    let analyzer = Analyzer::new(&project.analyzer, rules());
    let result = analyzer.analyze(
        &project.settings,
        &project.file,
        &project.root,
        &CancellationToken::new(),
    );

    let flow = &result.issues[0].flows[0];
    let order: Vec<&str> = flow
        .locations
        .iter()
        .map(|l| l.message.as_str())
        .collect();
    assert_eq!(order, vec!["C", "B", "A"]);
}

#[test]
fn test_internal_failure_still_delivers_other_issues() {
    let project = project("#!/bin/sh\nexit 0\n");
    let response_path = project.root.join("response.bin");

    let messages = vec![
        WireMessage::finding("internal.InvalidInput", &project.file, 0),
        WireMessage::finding("S2259", &project.file, 4),
    ];
    std::fs::write(&response_path, encode_response(&messages)).unwrap();
    std::fs::write(&project.analyzer, replay_script(&response_path)).unwrap();

    let analyzer = Analyzer::new(&project.analyzer, rules());
    let result = analyzer.analyze(
        &project.settings,
        &project.file,
        &project.root,
        &CancellationToken::new(),
    );

    assert_eq!(result.state, AnalysisState::Completed);
    assert!(!result.succeeded);
    assert_eq!(result.issues.len(), 1);
}

#[test]
fn test_timeout_yields_failure_and_no_issues() {
    let project = project("#!/bin/sh\ncat > /dev/null\nsleep 30\n");

    let analyzer = Analyzer::new(&project.analyzer, rules()).timeout(Duration::from_millis(300));
    let result = analyzer.analyze(
        &project.settings,
        &project.file,
        &project.root,
        &CancellationToken::new(),
    );

    assert_eq!(result.state, AnalysisState::TimedOut);
    assert!(!result.succeeded);
    assert!(result.issues.is_empty());
}

#[test]
fn test_garbage_output_is_a_protocol_failure() {
    let project = project("#!/bin/sh\ncat > /dev/null\nprintf 'not a frame'\n");

    let analyzer = Analyzer::new(&project.analyzer, rules());
    let result = analyzer.analyze(
        &project.settings,
        &project.file,
        &project.root,
        &CancellationToken::new(),
    );

    assert_eq!(result.state, AnalysisState::Failed);
    assert!(result.issues.is_empty());
}

#[test]
fn test_nonzero_exit_discards_all_messages() {
    let project = project("#!/bin/sh\nexit 0\n");
    let response_path = project.root.join("response.bin");

    let messages = vec![WireMessage::finding("S2259", &project.file, 4)];
    std::fs::write(&response_path, encode_response(&messages)).unwrap();
    std::fs::write(
        &project.analyzer,
        format!(
            "#!/bin/sh\ncat > /dev/null\ncat '{}'\nexit 2\n",
            response_path.display()
        ),
    )
    .unwrap();

    let analyzer = Analyzer::new(&project.analyzer, rules());
    let result = analyzer.analyze(
        &project.settings,
        &project.file,
        &project.root,
        &CancellationToken::new(),
    );

    assert_eq!(result.state, AnalysisState::Failed);
    assert!(result.issues.is_empty());
}

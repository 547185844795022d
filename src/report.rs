//! Output formatting for analysis results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::analysis::FileAnalysis;
use crate::process::AnalysisState;
use crate::rules::Severity;

// =============================================================================
// JSON Format
// =============================================================================

/// Top-level JSON report structure.
#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub version: String,
    pub path: String,
    pub files_analyzed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub issue_count: usize,
    pub results: Vec<JsonFileResult<'a>>,
}

/// Per-file result entry.
#[derive(Serialize)]
pub struct JsonFileResult<'a> {
    pub file: String,
    pub state: String,
    pub succeeded: bool,
    pub issues: &'a [crate::issues::Issue],
}

/// Write results in JSON format.
pub fn write_json(path: &str, results: &[FileAnalysis]) -> anyhow::Result<()> {
    let entries: Vec<JsonFileResult> = results
        .iter()
        .map(|r| JsonFileResult {
            file: r.file.to_string_lossy().to_string(),
            state: r.state.to_string(),
            succeeded: r.succeeded,
            issues: &r.issues,
        })
        .collect();

    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: path.to_string(),
        files_analyzed: count_state(results, AnalysisState::Completed),
        files_skipped: count_state(results, AnalysisState::NotStarted),
        files_failed: results
            .iter()
            .filter(|r| !matches!(r.state, AnalysisState::Completed | AnalysisState::NotStarted))
            .count(),
        issue_count: results.iter().map(|r| r.issues.len()).sum(),
        results: entries,
    };

    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write results in pretty (human-readable) format.
pub fn write_pretty(path: &str, results: &[FileAnalysis]) {
    println!();
    print!("  ");
    print!("{}", "clbridge".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Analyzing: ".dimmed());
    println!("{}", path);
    println!();

    for result in results {
        match result.state {
            AnalysisState::Completed => write_file_issues(result),
            AnalysisState::NotStarted => {}
            state => {
                println!(
                    "  {} {} ({})",
                    "✗".red().bold(),
                    result.file.display(),
                    state.to_string().red()
                );
            }
        }
    }

    write_summary(results);
}

fn write_file_issues(result: &FileAnalysis) {
    if result.issues.is_empty() {
        return;
    }

    println!("  {}", result.file.display().to_string().bold());
    for issue in &result.issues {
        let range = &issue.primary.range;
        println!(
            "    {}:{}  {}  {}  {}",
            range.start_line,
            range.start_line_offset,
            colored_severity(issue.severity),
            issue.rule_key.dimmed(),
            issue.primary.message
        );
    }
    println!();
}

fn write_summary(results: &[FileAnalysis]) {
    let analyzed = count_state(results, AnalysisState::Completed);
    let skipped = count_state(results, AnalysisState::NotStarted);
    let failed = results.len() - analyzed - skipped;
    let issue_count: usize = results.iter().map(|r| r.issues.len()).sum();

    print!("  {}", "Files: ".dimmed());
    print!("{} analyzed", analyzed);
    if skipped > 0 {
        print!(", {} skipped", skipped);
    }
    if failed > 0 {
        print!(", {}", format!("{} failed", failed).red());
    }
    println!();

    let by_severity = count_by_severity(results);
    if issue_count == 0 {
        println!("  {}", "No issues found".green().bold());
    } else {
        print!("  {}", "Issues: ".dimmed());
        let parts: Vec<String> = by_severity
            .iter()
            .rev()
            .map(|(severity, count)| format!("{} {}", count, severity))
            .collect();
        println!("{} ({})", issue_count, parts.join(", "));
    }
    println!();
}

fn colored_severity(severity: Severity) -> ColoredString {
    match severity {
        Severity::Blocker | Severity::Critical => severity.to_string().red().bold(),
        Severity::Major => severity.to_string().yellow(),
        Severity::Minor => severity.to_string().cyan(),
        Severity::Info => severity.to_string().blue(),
    }
}

fn count_state(results: &[FileAnalysis], state: AnalysisState) -> usize {
    results.iter().filter(|r| r.state == state).count()
}

/// Issue counts keyed by severity, ascending.
fn count_by_severity(results: &[FileAnalysis]) -> BTreeMap<Severity, usize> {
    let mut counts = BTreeMap::new();
    for result in results {
        for issue in &result.issues {
            *counts.entry(issue.severity).or_insert(0) += 1;
        }
    }
    counts
}

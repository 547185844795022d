//! Command-line interface for clbridge.

use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

use crate::analysis::{Analyzer, FileAnalysis};
use crate::process::CancellationToken;
use crate::report;
use crate::rules::RulesConfiguration;
use crate::settings::{self, Settings};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Default settings file names to search for.
const DEFAULT_SETTINGS_NAMES: &[&str] = &["clbridge.yaml", ".clbridge.yaml"];

/// Default rules file names to search for.
const DEFAULT_RULES_NAMES: &[&str] = &["clbridge-rules.yaml", ".clbridge-rules.yaml"];

/// Source file extensions eligible for analysis.
const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx"];

/// Bridge between MSVC build configurations and an out-of-process C/C++
/// analyzer.
///
/// clbridge reconstructs the compiler invocation your build system would
/// have used for each file, translates it into an analysis request, runs
/// the external analyzer, and reports the findings.
#[derive(Parser)]
#[command(name = "clbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze C/C++ files with the external analyzer
    #[command(visible_alias = "run")]
    Analyze(AnalyzeArgs),
    /// Create settings and rules files from templates
    Init(InitArgs),
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Path to analyze (file or directory)
    pub path: PathBuf,

    /// Path to settings YAML file (default: auto-discover)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Path to rules YAML file (default: auto-discover)
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Override the per-file analyzer timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Directory to write the template files into
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

/// Discover a configuration file near the analyzed path.
fn discover_file(names: &[&str], near: &Path) -> Option<PathBuf> {
    let dir = if near.is_dir() {
        near
    } else {
        near.parent().unwrap_or(Path::new("."))
    };
    for name in names {
        let candidate = dir.join(name);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    for name in names {
        let candidate = PathBuf::from(name);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

/// Collect source files to analyze.
fn collect_files(root: &Path, settings: &Settings) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            // Skip hidden directories
            !(e.file_type().is_dir() && name.starts_with('.'))
        })
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !SOURCE_EXTENSIONS.contains(&ext) {
            continue;
        }
        if settings.is_path_excluded(path) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    Ok(files)
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    // Discover settings if not specified
    let settings_path = match &args.settings {
        Some(p) => p.clone(),
        None => match discover_file(DEFAULT_SETTINGS_NAMES, &args.path) {
            Some(p) => p,
            None => {
                eprintln!(
                    "Error: no settings file found (looked for {})",
                    DEFAULT_SETTINGS_NAMES.join(", ")
                );
                eprintln!("Run 'clbridge init' to create one");
                return Ok(EXIT_ERROR);
            }
        },
    };

    let settings = match Settings::parse_file(&settings_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error parsing settings: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if let Err(e) = settings::validate(&settings) {
        eprintln!("Error: invalid settings: {}", e);
        return Ok(EXIT_ERROR);
    }

    // Discover rules if not specified
    let rules_path = match &args.rules {
        Some(p) => p.clone(),
        None => match discover_file(DEFAULT_RULES_NAMES, &args.path) {
            Some(p) => p,
            None => {
                eprintln!(
                    "Error: no rules file found (looked for {})",
                    DEFAULT_RULES_NAMES.join(", ")
                );
                return Ok(EXIT_ERROR);
            }
        },
    };

    let rules = match RulesConfiguration::parse_file(&rules_path) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            eprintln!("Error parsing rules: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    // Paths in the settings file are relative to its directory.
    let base_dir = settings_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let executable = if settings.analyzer.executable.is_absolute() {
        settings.analyzer.executable.clone()
    } else {
        base_dir.join(&settings.analyzer.executable)
    };

    // Collect files to analyze
    let files = if args.path.is_dir() {
        collect_files(&args.path, &settings)?
    } else {
        vec![args.path.clone()]
    };

    if files.is_empty() {
        eprintln!("Warning: no files to analyze");
        return Ok(EXIT_SUCCESS);
    }

    let timeout = args.timeout.unwrap_or(settings.analyzer.timeout_seconds);
    let analyzer = Analyzer::new(&executable, Arc::clone(&rules))
        .timeout(Duration::from_secs(timeout));

    // One analysis per file, in parallel; the rules snapshot is the only
    // shared state.
    let token = CancellationToken::new();
    let progress = ProgressBar::new(files.len() as u64);
    let results: Vec<FileAnalysis> = files
        .par_iter()
        .map(|file| {
            let result = analyzer.analyze(&settings, file, &base_dir, &token);
            progress.inc(1);
            result
        })
        .collect();
    progress.finish_and_clear();

    let path_str = args.path.to_string_lossy().to_string();
    match args.format.as_str() {
        "json" => report::write_json(&path_str, &results)?,
        _ => report::write_pretty(&path_str, &results),
    }

    let all_succeeded = results.iter().all(|r| r.succeeded);
    if all_succeeded {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    let targets = [
        ("clbridge.yaml", include_str!("templates/settings.yaml")),
        ("clbridge-rules.yaml", include_str!("templates/rules.yaml")),
    ];

    if let Err(e) = std::fs::create_dir_all(&args.output) {
        eprintln!("Error: failed to create directory: {}", e);
        return Ok(EXIT_ERROR);
    }

    for (name, content) in targets {
        let path = args.output.join(name);
        if path.exists() {
            eprintln!("Error: file already exists: {}", path.display());
            eprintln!("Remove it or use --output to specify a different directory");
            return Ok(EXIT_ERROR);
        }
        if let Err(e) = std::fs::write(&path, content) {
            eprintln!("Error: failed to write {}: {}", path.display(), e);
            return Ok(EXIT_ERROR);
        }
        println!("Created {}", path.display());
    }

    println!();
    println!("Next steps:");
    println!("  1. Point analyzer.executable at your analyzer binary");
    println!("  2. Describe your per-file build properties under 'files:'");
    println!("  3. Run: clbridge analyze . --settings clbridge.yaml");

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_files_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.cpp"), "int main() {}\n").unwrap();
        std::fs::write(dir.path().join("b.c"), "int main() {}\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "notes\n").unwrap();
        std::fs::write(dir.path().join("header.h"), "#pragma once\n").unwrap();

        let files = collect_files(dir.path(), &Settings::default()).unwrap();
        let mut names: Vec<String> = files
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.cpp", "b.c"]);
    }

    #[test]
    fn test_collect_files_honors_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        let vendored = dir.path().join("vendor");
        std::fs::create_dir_all(&vendored).unwrap();
        std::fs::write(dir.path().join("a.cpp"), "int main() {}\n").unwrap();
        std::fs::write(vendored.join("lib.cpp"), "int lib() {}\n").unwrap();

        let mut settings = Settings::default();
        settings.analyzer.excluded_paths = vec!["**/vendor/**".to_string()];

        let files = collect_files(dir.path(), &settings).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.cpp"));
    }

    #[test]
    fn test_init_writes_both_templates() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            output: dir.path().to_path_buf(),
        };
        let code = run_init(&args).unwrap();
        assert_eq!(code, EXIT_SUCCESS);
        assert!(dir.path().join("clbridge.yaml").exists());
        assert!(dir.path().join("clbridge-rules.yaml").exists());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clbridge.yaml"), "version: \"1.0\"\n").unwrap();
        let args = InitArgs {
            output: dir.path().to_path_buf(),
        };
        let code = run_init(&args).unwrap();
        assert_eq!(code, EXIT_ERROR);
    }
}

//! MSVC-compatible command-line driver emulation.
//!
//! Consumes the probe and real captures for a file and replays the option
//! scan a cl.exe front end would apply, deriving semantically equivalent
//! preprocessor state: include paths, predefine text, dialect flags and a
//! target triple, packaged as an [`AnalysisRequest`].

mod predefines;
mod request;
mod scan;
mod version;

pub use request::{flags, AnalysisRequest};
pub use scan::{scan, ArchExtension, Language, ScanState, Standard};
pub use version::CompilerVersion;

use std::path::PathBuf;
use thiserror::Error;

use crate::capture::Capture;

/// Errors that abort emulation of one invocation.
///
/// Note the asymmetry with unknown flags: a flag we have never seen is
/// ignored, but an `/arch:` value without an explicit case would poison
/// codegen-sensitive macros and is fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("cannot parse compiler version {0:?}")]
    InvalidVersion(String),
    #[error("probe capture carries no compiler identity")]
    MissingProbe,
    #[error("unsupported target architecture {0:?}")]
    UnsupportedTarget(String),
    #[error("unsupported architecture option /arch:{0}")]
    UnsupportedArch(String),
}

/// Emulate one captured invocation into an analysis request.
///
/// Returns `Ok(None)` when the invocation is intentionally skipped: CLR/CX
/// dialects, response files, and invocations naming more or fewer than one
/// source file all yield no request without raising an error.
pub fn emulate(
    probe: &Capture,
    invocation: &Capture,
) -> Result<Option<AnalysisRequest>, DriverError> {
    let version_raw = probe
        .compiler_version
        .as_deref()
        .ok_or(DriverError::MissingProbe)?;
    let version = CompilerVersion::parse(version_raw)?;

    let bits = match probe.target_arch.as_deref() {
        Some("x64") => 64,
        Some("x86") => 32,
        Some(other) => return Err(DriverError::UnsupportedTarget(other.to_string())),
        None => return Err(DriverError::MissingProbe),
    };

    let state = scan::scan(&invocation.args)?;
    if state.aborted || state.files.len() != 1 {
        return Ok(None);
    }

    let language = state
        .forced_language
        .unwrap_or_else(|| infer_language(&state.files));

    let mut predefines = state.predefines.clone();
    predefines::append_baseline(&mut predefines, &version, bits, &state, language);

    let file = resolve_file(&state.files[0], invocation);

    Ok(Some(AnalysisRequest {
        flags: flag_bits(&state, language),
        ms_version: version.encode(),
        include_dirs: state.includes,
        framework_dirs: Vec::new(),
        vfs_overlays: Vec::new(),
        predefines,
        target_triple: triple(bits),
        file,
        rules: None,
    }))
}

/// Infer the source language when neither `/TC` nor `/TP` is present:
/// C++ unless every file argument ends in `.c`.
fn infer_language(files: &[String]) -> Language {
    let all_c = files
        .iter()
        .all(|f| f.to_lowercase().ends_with(".c"));
    if all_c {
        Language::C
    } else {
        Language::Cpp
    }
}

fn flag_bits(state: &ScanState, language: Language) -> i64 {
    let mut bits = 0i64;

    match language {
        Language::Cpp => {
            bits |= flags::CPLUSPLUS;
            bits |= match state.standard {
                Some(Standard::Cpp17) => flags::CPP17,
                Some(Standard::Cpp20) | Some(Standard::CppLatest) => flags::CPP20,
                _ => flags::CPP14,
            };
        }
        Language::C => {
            if matches!(state.standard, Some(Standard::C11 | Standard::C17)) {
                bits |= flags::C11;
            }
        }
    }

    if state.ms_extensions {
        bits |= flags::MS_EXTENSIONS;
    }
    if state.operator_names {
        bits |= flags::OPERATOR_NAMES;
    }
    if state.char_is_unsigned {
        bits |= flags::CHAR_IS_UNSIGNED;
    }

    bits
}

fn triple(bits: u32) -> String {
    if bits == 64 {
        "x86_64-pc-windows".to_string()
    } else {
        "i686-pc-windows".to_string()
    }
}

/// Resolve the scanned file argument against the invocation's working
/// directory.
fn resolve_file(file: &str, invocation: &Capture) -> PathBuf {
    let path = PathBuf::from(file);
    if path.is_absolute() {
        path
    } else {
        invocation.cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe() -> Capture {
        Capture::probe("cl.exe", "19.29.30133", "x64")
    }

    fn invocation(args: &[&str]) -> Capture {
        Capture::invocation(
            "cl.exe",
            PathBuf::from("proj"),
            Vec::new(),
            args.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_cpp_inferred_from_extension() {
        let request = emulate(&probe(), &invocation(&["foo.cpp"]))
            .unwrap()
            .unwrap();
        assert!(request.has_flag(flags::CPLUSPLUS));
        assert!(request.has_flag(flags::CPP14));
        assert!(request.predefines.contains("#define __cplusplus"));
    }

    #[test]
    fn test_c_inferred_from_extension() {
        let request = emulate(&probe(), &invocation(&["foo.c"])).unwrap().unwrap();
        assert!(!request.has_flag(flags::CPLUSPLUS));
    }

    #[test]
    fn test_tp_overrides_extension() {
        let request = emulate(&probe(), &invocation(&["/TP", "foo.c"]))
            .unwrap()
            .unwrap();
        assert!(request.has_flag(flags::CPLUSPLUS));
    }

    #[test]
    fn test_debug_dll_runtime_predefines() {
        let request = emulate(&probe(), &invocation(&["/MDd", "foo.cpp"]))
            .unwrap()
            .unwrap();
        assert!(request.predefines.contains("#define _DEBUG 1"));
        assert!(request.predefines.contains("#define _DLL 1"));
    }

    #[test]
    fn test_multi_file_invocation_yields_no_request() {
        let result = emulate(&probe(), &invocation(&["a.cpp", "b.cpp"])).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_no_file_invocation_yields_no_request() {
        let result = emulate(&probe(), &invocation(&["/W4"])).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_clr_invocation_yields_no_request() {
        let result = emulate(&probe(), &invocation(&["/clr", "a.cpp"])).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_version_encoding_and_triple() {
        let request = emulate(&probe(), &invocation(&["a.cpp"])).unwrap().unwrap();
        assert_eq!(request.ms_version, 192_930_133);
        assert_eq!(request.target_triple, "x86_64-pc-windows");
    }

    #[test]
    fn test_x86_probe_triple() {
        let probe = Capture::probe("cl.exe", "19.29.30133", "x86");
        let request = emulate(&probe, &invocation(&["a.cpp"])).unwrap().unwrap();
        assert_eq!(request.target_triple, "i686-pc-windows");
        assert!(request.predefines.contains("#define _M_IX86 600"));
    }

    #[test]
    fn test_relative_file_resolved_against_cwd() {
        let request = emulate(&probe(), &invocation(&["src/foo.cpp"]))
            .unwrap()
            .unwrap();
        assert_eq!(request.file, PathBuf::from("proj").join("src/foo.cpp"));
    }

    #[test]
    fn test_missing_probe_identity_is_fatal() {
        let bad_probe = invocation(&[]);
        assert!(matches!(
            emulate(&bad_probe, &invocation(&["a.cpp"])),
            Err(DriverError::MissingProbe)
        ));
    }

    #[test]
    fn test_bad_version_is_fatal() {
        let bad = Capture::probe("cl.exe", "unknown", "x64");
        assert!(matches!(
            emulate(&bad, &invocation(&["a.cpp"])),
            Err(DriverError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_include_order_preserved() {
        let request = emulate(&probe(), &invocation(&["/Ifirst", "/Isecond", "a.cpp"]))
            .unwrap()
            .unwrap();
        assert_eq!(request.include_dirs, vec!["first", "second"]);
    }

    #[test]
    fn test_framework_and_overlay_lists_stay_empty() {
        let request = emulate(&probe(), &invocation(&["a.cpp"])).unwrap().unwrap();
        assert!(request.framework_dirs.is_empty());
        assert!(request.vfs_overlays.is_empty());
    }
}

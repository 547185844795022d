//! Build-configuration capture.
//!
//! Reads per-file compiler properties out of the host build model into a
//! flat [`BuildFileConfig`] record, then rebuilds the compiler invocation
//! the build system would have issued for that file. Properties the active
//! toolchain does not expose fall back to documented defaults; values
//! outside a closed enumeration abort the capture for that file.

mod invocation;

pub use invocation::Capture;

use once_cell::sync::Lazy;
use phf::phf_map;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::settings::INTELLISENSE_ONLY_MARKER;

/// Errors that abort capturing one file's configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The file has no buildable configuration (single-file session).
    #[error("file is not part of a buildable project configuration")]
    NotCaptured,
    /// A closed-enumeration property carried a value we do not understand.
    #[error("unsupported value {value:?} for property {property}")]
    UnsupportedValue {
        property: &'static str,
        value: String,
    },
}

/// A property value as reported by the build model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Value(String),
    /// The active toolchain does not support this property.
    Unsupported,
}

impl PropertyValue {
    /// Resolve to the given default when the property is unsupported.
    pub fn or_default(self, default: &str) -> String {
        match self {
            PropertyValue::Value(v) => v,
            PropertyValue::Unsupported => default.to_string(),
        }
    }
}

/// Read access to the host build model.
///
/// The IDE's project system implements this; the CLI substitutes a
/// YAML-backed model. Lookups are pure reads.
pub trait BuildModel {
    /// Identity of the project owning the analyzed files.
    fn project_identity(&self) -> &str;

    /// Dotted version string of the active compiler.
    fn compiler_version(&self) -> &str;

    /// Look up one per-file property by its toolchain name.
    fn property(&self, file: &Path, name: &str) -> PropertyValue;
}

/// Per-file compiler settings captured from the build model.
///
/// Immutable once captured; created once per analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFileConfig {
    pub platform_name: String,
    pub include_directories: Vec<String>,
    pub defines: Vec<String>,
    pub undefines: Vec<String>,
    pub forced_includes: Vec<String>,
    pub ignore_standard_include_path: bool,
    pub precompiled_header: String,
    pub runtime_library: String,
    pub exception_handling: String,
    pub basic_runtime_checks: String,
    pub instruction_set: String,
    pub compile_as: String,
    pub compile_as_managed: String,
    pub language_standard: String,
    pub additional_options: String,
    pub compiler_version: String,
    pub file: PathBuf,
}

// Closed-enumeration property tables. Keys are the values the build model
// may legally report; anything else is a fatal configuration error for the
// file. An empty option string means "no argument appended".

static PLATFORM_NAME: phf::Map<&'static str, &'static str> = phf_map! {
    "Win32" => "x86",
    "x64" => "x64",
};

static RUNTIME_LIBRARY: phf::Map<&'static str, &'static str> = phf_map! {
    "MultiThreaded" => "/MT",
    "MultiThreadedDebug" => "/MTd",
    "MultiThreadedDLL" => "/MD",
    "MultiThreadedDebugDLL" => "/MDd",
};

static EXCEPTION_HANDLING: phf::Map<&'static str, &'static str> = phf_map! {
    "false" => "",
    "Async" => "/EHa",
    "Sync" => "/EHsc",
    "SyncCThrow" => "/EHs",
};

static BASIC_RUNTIME_CHECKS: phf::Map<&'static str, &'static str> = phf_map! {
    "Default" => "",
    "StackFrameRuntimeCheck" => "/RTCs",
    "UninitializedLocalUsageCheck" => "/RTCu",
    "EnableFastChecks" => "/RTC1",
};

static PRECOMPILED_HEADER: phf::Map<&'static str, &'static str> = phf_map! {
    "NotUsing" => "",
    "Create" => "/Yc",
    "Use" => "/Yu",
};

static ENHANCED_INSTRUCTION_SET: phf::Map<&'static str, &'static str> = phf_map! {
    "NotSet" => "",
    "NoExtensions" => "/arch:IA32",
    "StreamingSIMDExtensions" => "/arch:SSE",
    "StreamingSIMDExtensions2" => "/arch:SSE2",
    "AdvancedVectorExtensions" => "/arch:AVX",
    "AdvancedVectorExtensions2" => "/arch:AVX2",
    "AdvancedVectorExtensions512" => "/arch:AVX512",
};

static COMPILE_AS: phf::Map<&'static str, &'static str> = phf_map! {
    "Default" => "",
    "CompileAsC" => "/TC",
    "CompileAsCpp" => "/TP",
};

static COMPILE_AS_MANAGED: phf::Map<&'static str, &'static str> = phf_map! {
    "false" => "",
    "true" => "/clr",
    "Pure" => "/clr:pure",
    "Safe" => "/clr:safe",
};

static LANGUAGE_STANDARD: phf::Map<&'static str, &'static str> = phf_map! {
    "Default" => "",
    "stdc11" => "/std:c11",
    "stdc17" => "/std:c17",
    "stdcpp14" => "/std:c++14",
    "stdcpp17" => "/std:c++17",
    "stdcpp20" => "/std:c++20",
    "stdcpplatest" => "/std:c++latest",
};

/// Capture the build configuration for one file.
///
/// Returns [`CaptureError::NotCaptured`] when the owning project is an
/// IntelliSense-only throwaway fabricated for a single-file session.
pub fn capture(model: &dyn BuildModel, file: &Path) -> Result<BuildFileConfig, CaptureError> {
    if model.project_identity().contains(INTELLISENSE_ONLY_MARKER) {
        return Err(CaptureError::NotCaptured);
    }

    let get = |name: &str, default: &str| model.property(file, name).or_default(default);

    Ok(BuildFileConfig {
        platform_name: get("PlatformName", "Win32"),
        include_directories: split_list(&get("AdditionalIncludeDirectories", "")),
        defines: split_list(&get("PreprocessorDefinitions", "")),
        undefines: split_list(&get("UndefinePreprocessorDefinitions", "")),
        forced_includes: split_list(&get("ForcedIncludeFiles", "")),
        ignore_standard_include_path: get("IgnoreStandardIncludePath", "false") == "true",
        precompiled_header: get("PrecompiledHeader", "NotUsing"),
        runtime_library: get("RuntimeLibrary", ""),
        exception_handling: get("ExceptionHandling", ""),
        basic_runtime_checks: get("BasicRuntimeChecks", ""),
        instruction_set: get("EnableEnhancedInstructionSet", ""),
        compile_as: get("CompileAs", ""),
        compile_as_managed: get("CompileAsManaged", ""),
        // "LanguageStandard" is only exposed by newer toolchains; absence
        // means "not specified", never an error.
        language_standard: get("LanguageStandard", ""),
        additional_options: get("AdditionalOptions", ""),
        compiler_version: model.compiler_version().to_string(),
        file: file.to_path_buf(),
    })
}

impl BuildFileConfig {
    /// Build the probe and real captures for this file.
    ///
    /// Always yields exactly one probe plus one real capture. The real
    /// capture's argument vector is appended in a fixed order; the driver
    /// emulator relies on this order when scanning positionally.
    pub fn captures(&self, cwd: &Path) -> Result<(Capture, Capture), CaptureError> {
        let target_arch = closed_enum("PlatformName", &self.platform_name, &PLATFORM_NAME)?;
        let probe = Capture::probe("cl.exe", &self.compiler_version, target_arch);

        let mut args: Vec<String> = Vec::new();

        // Raw additional options come first so explicit properties win
        // under the emulator's in-order scan.
        args.extend(tokenize_options(&self.additional_options));

        for dir in &self.include_directories {
            args.push(format!("/I{}", dir));
        }
        if self.ignore_standard_include_path {
            args.push("/X".to_string());
        }
        for inc in &self.forced_includes {
            args.push(format!("/FI{}", inc));
        }
        for def in &self.defines {
            args.push(format!("/D{}", def));
        }
        for undef in &self.undefines {
            args.push(format!("/U{}", undef));
        }

        push_closed_enum(
            &mut args,
            "PrecompiledHeader",
            &self.precompiled_header,
            &PRECOMPILED_HEADER,
        )?;
        push_closed_enum(
            &mut args,
            "RuntimeLibrary",
            &self.runtime_library,
            &RUNTIME_LIBRARY,
        )?;
        push_closed_enum(
            &mut args,
            "ExceptionHandling",
            &self.exception_handling,
            &EXCEPTION_HANDLING,
        )?;
        push_closed_enum(
            &mut args,
            "BasicRuntimeChecks",
            &self.basic_runtime_checks,
            &BASIC_RUNTIME_CHECKS,
        )?;
        push_closed_enum(
            &mut args,
            "EnableEnhancedInstructionSet",
            &self.instruction_set,
            &ENHANCED_INSTRUCTION_SET,
        )?;
        push_closed_enum(&mut args, "CompileAs", &self.compile_as, &COMPILE_AS)?;
        push_closed_enum(
            &mut args,
            "CompileAsManaged",
            &self.compile_as_managed,
            &COMPILE_AS_MANAGED,
        )?;
        push_closed_enum(
            &mut args,
            "LanguageStandard",
            &self.language_standard,
            &LANGUAGE_STANDARD,
        )?;

        args.push(self.file.to_string_lossy().into_owned());

        let real = Capture::invocation("cl.exe", cwd.to_path_buf(), Vec::new(), args);
        Ok((probe, real))
    }
}

/// Resolve a closed-enumeration property value against its table.
fn closed_enum(
    property: &'static str,
    value: &str,
    table: &phf::Map<&'static str, &'static str>,
) -> Result<&'static str, CaptureError> {
    table
        .get(value)
        .copied()
        .ok_or_else(|| CaptureError::UnsupportedValue {
            property,
            value: value.to_string(),
        })
}

/// Append the compiler option for a closed-enumeration property value.
///
/// An empty property value means "not set" and appends nothing; a value
/// missing from the table is a fatal configuration error.
fn push_closed_enum(
    args: &mut Vec<String>,
    property: &'static str,
    value: &str,
    table: &phf::Map<&'static str, &'static str>,
) -> Result<(), CaptureError> {
    if value.is_empty() {
        return Ok(());
    }
    let option = closed_enum(property, value, table)?;
    if !option.is_empty() {
        args.push(option.to_string());
    }
    Ok(())
}

/// Split a semicolon-joined property list into its ordered entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

static OPTION_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#""[^"]*"|\S+"#).unwrap());

/// Tokenize raw AdditionalOptions text, honoring double quotes.
fn tokenize_options(raw: &str) -> Vec<String> {
    OPTION_TOKEN
        .find_iter(raw)
        .map(|m| m.as_str().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

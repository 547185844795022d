//! Baseline predefine synthesis.
//!
//! After the argument scan, a fixed block of predefines is appended to the
//! scanned state: macros every cl.exe build defines, architecture macros
//! chosen by the detected bitness, and dialect macros chosen by the
//! inferred language. The block mirrors what the real front end would have
//! predefined for the same invocation.

use super::scan::{ArchExtension, Language, ScanState, Standard};
use super::version::CompilerVersion;

/// Values of `__cplusplus` / `_MSVC_LANG` and `__STDC_VERSION__` per standard.
pub mod dialect {
    pub const CPP14: &str = "201402L";
    pub const CPP17: &str = "201703L";
    pub const CPP20: &str = "202002L";
    pub const CPP_LATEST: &str = "202004L";
    pub const C11: &str = "201112L";
    pub const C17: &str = "201710L";
}

/// Compiler major version from which C11 support is assumed.
pub const C11_MIN_MAJOR: u32 = 19;

/// Append the baseline predefine block for one emulated invocation.
pub fn append_baseline(
    out: &mut String,
    version: &CompilerVersion,
    bits: u32,
    state: &ScanState,
    language: Language,
) {
    let mut define = |name: &str, value: String| {
        out.push_str("#define ");
        out.push_str(name);
        out.push(' ');
        out.push_str(&value);
        out.push('\n');
    };

    define("_WIN32", "1".to_string());
    define("_MSC_VER", version.msc_ver().to_string());
    define("_MSC_FULL_VER", version.encode().to_string());
    define("_MSC_BUILD", version.msc_build().to_string());
    define("_INTEGRAL_MAX_BITS", "64".to_string());
    define("__STDC_HOSTED__", "1".to_string());

    if bits == 64 {
        define("_WIN64", "1".to_string());
        define("_M_X64", "100".to_string());
        define("_M_AMD64", "100".to_string());
    } else {
        define("_M_IX86", "600".to_string());
        // Floating-point code generation level; SSE2 is the default.
        let fp = match state.arch_extension {
            Some(ArchExtension::Ia32) => "0",
            Some(ArchExtension::Sse) => "1",
            _ => "2",
        };
        define("_M_IX86_FP", fp.to_string());
    }

    match state.arch_extension {
        Some(ArchExtension::Avx) => {
            define("__AVX__", "1".to_string());
        }
        Some(ArchExtension::Avx2) => {
            define("__AVX__", "1".to_string());
            define("__AVX2__", "1".to_string());
        }
        Some(ArchExtension::Avx512) => {
            define("__AVX__", "1".to_string());
            define("__AVX2__", "1".to_string());
            define("__AVX512F__", "1".to_string());
        }
        _ => {}
    }

    if state.ms_extensions {
        define("_MSC_EXTENSIONS", "1".to_string());
    }

    match language {
        Language::Cpp => {
            let value = match state.standard {
                Some(Standard::Cpp17) => dialect::CPP17,
                Some(Standard::Cpp20) => dialect::CPP20,
                Some(Standard::CppLatest) => dialect::CPP_LATEST,
                // cl.exe compiles C++14 when no standard is requested.
                _ => dialect::CPP14,
            };
            define("__cplusplus", value.to_string());
            define("_MSVC_LANG", value.to_string());
            if state.rtti {
                define("_CPPRTTI", "1".to_string());
            }
            define("_NATIVE_WCHAR_T_DEFINED", "1".to_string());
            define("_WCHAR_T_DEFINED", "1".to_string());
            define("__BOOL_DEFINED", "1".to_string());
        }
        Language::C => {
            if !state.ms_extensions {
                define("__STDC__", "1".to_string());
            }
            // C11 library and __STDC_VERSION__ arrived with the v19 front
            // end; older compilers stay at C90 with no version macro.
            if version.major >= C11_MIN_MAJOR {
                let value = match state.standard {
                    Some(Standard::C17) => dialect::C17,
                    _ => dialect::C11,
                };
                define("__STDC_VERSION__", value.to_string());
            }
        }
    }
}

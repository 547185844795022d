//! Argument-vector scanning.
//!
//! Replays the option scan a cl.exe-compatible front end applies to an
//! argument vector, accumulating include paths, predefine lines, and
//! dialect toggles. Matching is longest-prefix-first over a fixed option
//! set; unknown `/`-prefixed flags are consumed and ignored so that newer
//! compiler options never fail emulation.

use super::DriverError;

/// Source language of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cpp,
}

/// Language standard selected with `/std:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standard {
    C90,
    C11,
    C17,
    Cpp14,
    Cpp17,
    Cpp20,
    CppLatest,
}

/// Instruction-set extension selected with `/arch:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchExtension {
    Ia32,
    Sse,
    Sse2,
    Avx,
    Avx2,
    Avx512,
}

/// Accumulated scanning state.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanState {
    /// Include directories from `/I`, in argument order.
    pub includes: Vec<String>,
    /// Synthesized predefine lines, in argument order.
    pub predefines: String,
    /// File arguments seen so far.
    pub files: Vec<String>,
    /// Language forced by `/TC` or `/TP`.
    pub forced_language: Option<Language>,
    /// Standard selected by `/std:`.
    pub standard: Option<Standard>,
    /// Extension selected by `/arch:`.
    pub arch_extension: Option<ArchExtension>,
    /// Microsoft language extensions (`/Ze`, default on; `/Za` disables).
    pub ms_extensions: bool,
    /// Alternative operator names (`and`, `or`, ...) recognized.
    pub operator_names: bool,
    /// Plain `char` is unsigned (`/J`).
    pub char_is_unsigned: bool,
    /// RTTI enabled (`/GR`, default on; `/GR-` disables).
    pub rtti: bool,
    /// Standard include directories suppressed (`/X`).
    pub ignore_standard_includes: bool,
    /// The invocation uses a form we do not emulate; analysis is skipped.
    pub aborted: bool,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            includes: Vec::new(),
            predefines: String::new(),
            files: Vec::new(),
            forced_language: None,
            standard: None,
            arch_extension: None,
            ms_extensions: true,
            operator_names: false,
            char_is_unsigned: false,
            rtti: true,
            ignore_standard_includes: false,
            aborted: false,
        }
    }
}

impl ScanState {
    fn define(&mut self, name: &str, value: &str) {
        self.predefines.push_str("#define ");
        self.predefines.push_str(name);
        if !value.is_empty() {
            self.predefines.push(' ');
            self.predefines.push_str(value);
        }
        self.predefines.push('\n');
    }

    fn undef(&mut self, name: &str) {
        self.predefines.push_str("#undef ");
        self.predefines.push_str(name);
        self.predefines.push('\n');
    }

    fn include_directive(&mut self, file: &str) {
        self.predefines.push_str("#include \"");
        self.predefines.push_str(file);
        self.predefines.push_str("\"\n");
    }

    /// Abort emulation for this invocation. Not an error: CLR/CX and
    /// response-file invocations are silently skipped.
    fn abort(&mut self) {
        self.files.clear();
        self.aborted = true;
    }
}

/// Scan a full argument vector into accumulated state.
pub fn scan(args: &[String]) -> Result<ScanState, DriverError> {
    let mut state = ScanState::default();
    let mut pos = 0;
    while pos < args.len() && !state.aborted {
        pos = scan_one(&mut state, args, pos)?;
    }
    Ok(state)
}

/// Process the argument at `pos`, returning the next position.
fn scan_one(state: &mut ScanState, args: &[String], pos: usize) -> Result<usize, DriverError> {
    let arg = args[pos].as_str();

    if !arg.starts_with('/') {
        if arg.starts_with('@') {
            // Response files are not expanded; skip the invocation.
            state.abort();
        } else {
            state.files.push(arg.to_string());
        }
        return Ok(pos + 1);
    }

    // C++/CLI and C++/CX front ends compile a dialect we cannot analyze.
    if arg == "/ZW" || arg.starts_with("/clr") {
        state.abort();
        return Ok(pos + 1);
    }
    // Per-file language overrides (/Tc<file>, /Tp<file>) are not emulated.
    if arg.starts_with("/Tc") || arg.starts_with("/Tp") {
        state.abort();
        return Ok(pos + 1);
    }

    match arg {
        "/TC" => {
            state.forced_language = Some(Language::C);
            return Ok(pos + 1);
        }
        "/TP" => {
            state.forced_language = Some(Language::Cpp);
            return Ok(pos + 1);
        }
        "/X" => {
            state.ignore_standard_includes = true;
            return Ok(pos + 1);
        }
        "/J" => {
            state.char_is_unsigned = true;
            state.define("_CHAR_UNSIGNED", "1");
            return Ok(pos + 1);
        }
        "/GR" => {
            state.rtti = true;
            return Ok(pos + 1);
        }
        "/GR-" => {
            state.rtti = false;
            return Ok(pos + 1);
        }
        "/Za" => {
            state.ms_extensions = false;
            state.operator_names = true;
            return Ok(pos + 1);
        }
        "/Ze" => {
            state.ms_extensions = true;
            state.operator_names = false;
            return Ok(pos + 1);
        }
        "/permissive-" => {
            state.operator_names = true;
            return Ok(pos + 1);
        }
        // Runtime library selection implies the debug-macro state: the
        // debug runtimes define _DEBUG, the release runtimes undefine it.
        "/MT" | "/LD" => {
            state.define("_MT", "1");
            state.undef("_DEBUG");
            return Ok(pos + 1);
        }
        "/MTd" | "/LDd" => {
            state.define("_MT", "1");
            state.define("_DEBUG", "1");
            return Ok(pos + 1);
        }
        "/MD" => {
            state.define("_MT", "1");
            state.define("_DLL", "1");
            state.undef("_DEBUG");
            return Ok(pos + 1);
        }
        "/MDd" => {
            state.define("_MT", "1");
            state.define("_DLL", "1");
            state.define("_DEBUG", "1");
            return Ok(pos + 1);
        }
        _ => {}
    }

    if let Some(value) = arg.strip_prefix("/std:") {
        state.standard = match value {
            "c11" => Some(Standard::C11),
            "c17" => Some(Standard::C17),
            "c++14" => Some(Standard::Cpp14),
            "c++17" => Some(Standard::Cpp17),
            "c++20" => Some(Standard::Cpp20),
            "c++latest" => Some(Standard::CppLatest),
            // Standards we do not know yet are tolerated like any other
            // unknown flag.
            _ => state.standard,
        };
        return Ok(pos + 1);
    }

    if let Some(value) = arg.strip_prefix("/arch:") {
        state.arch_extension = Some(match value {
            "IA32" => ArchExtension::Ia32,
            "SSE" => ArchExtension::Sse,
            "SSE2" => ArchExtension::Sse2,
            "AVX" => ArchExtension::Avx,
            "AVX2" => ArchExtension::Avx2,
            "AVX512" => ArchExtension::Avx512,
            // Unlike generic flags, an architecture we cannot map would
            // poison codegen-sensitive macros; refuse to guess.
            other => return Err(DriverError::UnsupportedArch(other.to_string())),
        });
        return Ok(pos + 1);
    }

    if arg.starts_with("/EH") {
        if !state.predefines.contains("#define _CPPUNWIND") {
            state.define("_CPPUNWIND", "1");
        }
        return Ok(pos + 1);
    }

    if let Some((value, next)) = take_value(arg, "/FI", args, pos) {
        if !value.is_empty() {
            state.include_directive(&value);
        }
        return Ok(next);
    }
    if let Some((value, next)) = take_value(arg, "/I", args, pos) {
        if !value.is_empty() {
            state.includes.push(value);
        }
        return Ok(next);
    }
    if let Some((value, next)) = take_value(arg, "/D", args, pos) {
        match value.split_once('=') {
            Some((name, "")) => state.define(name, ""),
            Some((name, val)) => state.define(name, val),
            None if value.is_empty() => {}
            None => state.define(&value, "1"),
        }
        return Ok(next);
    }
    if let Some((value, next)) = take_value(arg, "/U", args, pos) {
        if !value.is_empty() {
            state.undef(&value);
        }
        return Ok(next);
    }

    // Anything else is a flag we do not model; consume and move on.
    Ok(pos + 1)
}

/// Extract the value of a joined-or-separate option.
///
/// Handles both `/Idir` and `/I dir` spellings. Returns the value and the
/// position after the consumed arguments, or None when `arg` does not
/// start with `prefix`.
fn take_value(
    arg: &str,
    prefix: &str,
    args: &[String],
    pos: usize,
) -> Option<(String, usize)> {
    let rest = arg.strip_prefix(prefix)?;
    if !rest.is_empty() {
        return Some((rest.to_string(), pos + 1));
    }
    match args.get(pos + 1) {
        Some(value) => Some((value.clone(), pos + 2)),
        // Trailing option with a missing value contributes nothing.
        None => Some((String::new(), pos + 1)),
    }
}

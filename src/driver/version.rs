//! Compiler version parsing and encoding.

use super::DriverError;

/// A dotted cl.exe version, e.g. "19.29.30133" or "19.29.30133.1".
///
/// The build component is optional and defaults to empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerVersion {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
    pub build: String,
}

impl CompilerVersion {
    /// Parse a dotted version string.
    pub fn parse(raw: &str) -> Result<Self, DriverError> {
        let mut parts = raw.split('.');

        let major = next_component(&mut parts, raw)?;
        let minor = next_component(&mut parts, raw)?;
        let micro = next_component(&mut parts, raw)?;
        let build = parts.next().unwrap_or("").to_string();

        Ok(Self {
            major,
            minor,
            micro,
            build,
        })
    }

    /// The integer encoding sent in the analysis request.
    pub fn encode(&self) -> i32 {
        (self.major * 10_000_000 + self.minor * 100_000 + self.micro) as i32
    }

    /// The value of the `_MSC_VER` predefine.
    pub fn msc_ver(&self) -> u32 {
        self.major * 100 + self.minor
    }

    /// The value of the `_MSC_BUILD` predefine (0 when absent).
    pub fn msc_build(&self) -> u32 {
        self.build.parse().unwrap_or(0)
    }
}

fn next_component<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    raw: &str,
) -> Result<u32, DriverError> {
    parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| DriverError::InvalidVersion(raw.to_string()))
}

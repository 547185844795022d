//! Request encoding.

use std::io::Write;

use super::{ProtocolError, SENTINEL_END, SENTINEL_IN};
use crate::driver::AnalysisRequest;

/// Big-endian primitive writer over a byte sink.
pub struct ProtocolWriter<W: Write> {
    out: W,
}

impl<W: Write> ProtocolWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError> {
        self.out.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError> {
        self.out.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), ProtocolError> {
        self.out.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        self.out.write_all(&[u8::from(value)])?;
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string.
    ///
    /// The length prefix is 16-bit; longer encodings are a hard error
    /// rather than a truncation.
    pub fn write_str(&mut self, value: &str) -> Result<(), ProtocolError> {
        let bytes = value.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(ProtocolError::StringTooLong(bytes.len()));
        }
        self.write_u16(bytes.len() as u16)?;
        self.out.write_all(bytes)?;
        Ok(())
    }

    /// Write a count-prefixed string array.
    pub fn write_str_list(&mut self, values: &[String]) -> Result<(), ProtocolError> {
        self.write_i32(values.len() as i32)?;
        for value in values {
            self.write_str(value)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ProtocolError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Encode an analysis request onto a byte sink.
pub fn write_request<W: Write>(out: W, request: &AnalysisRequest) -> Result<(), ProtocolError> {
    let mut w = ProtocolWriter::new(out);

    w.write_str(SENTINEL_IN)?;
    w.write_i64(request.flags)?;
    w.write_i32(request.ms_version)?;
    w.write_str_list(&request.include_dirs)?;
    w.write_str_list(&request.framework_dirs)?;
    w.write_str_list(&request.vfs_overlays)?;
    w.write_str(&request.predefines)?;
    w.write_str(&request.target_triple)?;
    w.write_str(&request.file.to_string_lossy())?;
    w.write_str(SENTINEL_END)?;
    w.flush()?;

    Ok(())
}

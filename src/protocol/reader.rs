//! Response (and request) decoding.

use std::io::{self, Read};
use std::path::PathBuf;

use super::{
    AnalysisResponse, Message, MessagePart, ProtocolError, QuickFix, QuickFixEdit, SENTINEL_END,
    SENTINEL_IN, SENTINEL_OUT,
};
use crate::driver::AnalysisRequest;

/// Big-endian primitive reader over a byte source.
pub struct ProtocolReader<R: Read> {
    input: R,
}

impl<R: Read> ProtocolReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        let mut buf = [0u8; 4];
        self.input.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    pub fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        let mut buf = [0u8; 8];
        self.input.read_exact(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        let mut buf = [0u8; 2];
        self.input.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        let mut buf = [0u8; 1];
        self.input.read_exact(&mut buf)?;
        Ok(buf[0] != 0)
    }

    /// Read a length-prefixed UTF-8 string. The allocation is bounded by
    /// the 16-bit length prefix.
    pub fn read_str(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u16()? as usize;
        let mut buf = vec![0u8; len];
        self.input.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Read a count-prefixed string array.
    pub fn read_str_list(&mut self) -> Result<Vec<String>, ProtocolError> {
        let count = self.read_count()?;
        let mut values = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            values.push(self.read_str()?);
        }
        Ok(values)
    }

    /// Read a 32-bit array count, rejecting negative values.
    pub fn read_count(&mut self) -> Result<usize, ProtocolError> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(ProtocolError::InvalidCount(count));
        }
        Ok(count as usize)
    }

    /// Read and validate a sentinel token.
    pub fn expect_sentinel(&mut self, expected: &'static str) -> Result<(), ProtocolError> {
        let found = self.read_str()?;
        if found != expected {
            return Err(ProtocolError::BadSentinel { expected, found });
        }
        Ok(())
    }

    /// Consume `len` bytes without retaining them.
    fn skip(&mut self, len: usize) -> Result<(), ProtocolError> {
        let copied = io::copy(&mut self.input.by_ref().take(len as u64), &mut io::sink())?;
        if copied != len as u64 {
            return Err(ProtocolError::Io(io::Error::from(
                io::ErrorKind::UnexpectedEof,
            )));
        }
        Ok(())
    }
}

/// Decode a request frame. Used by tests and the exchange-file debug path.
pub fn read_request<R: Read>(input: R) -> Result<AnalysisRequest, ProtocolError> {
    let mut r = ProtocolReader::new(input);

    r.expect_sentinel(SENTINEL_IN)?;
    let flags = r.read_i64()?;
    let ms_version = r.read_i32()?;
    let include_dirs = r.read_str_list()?;
    let framework_dirs = r.read_str_list()?;
    let vfs_overlays = r.read_str_list()?;
    let predefines = r.read_str()?;
    let target_triple = r.read_str()?;
    let file = PathBuf::from(r.read_str()?);
    r.expect_sentinel(SENTINEL_END)?;

    Ok(AnalysisRequest {
        flags,
        ms_version,
        include_dirs,
        framework_dirs,
        vfs_overlays,
        predefines,
        target_triple,
        file,
        rules: None,
    })
}

/// Decode a response frame.
///
/// The measures and symbols sections are fully consumed to keep the byte
/// cursor synchronized, then discarded.
pub fn read_response<R: Read>(input: R) -> Result<AnalysisResponse, ProtocolError> {
    let mut r = ProtocolReader::new(input);

    r.expect_sentinel(SENTINEL_OUT)?;

    let message_count = r.read_count()?;
    let mut messages = Vec::with_capacity(message_count.min(1024));
    for _ in 0..message_count {
        messages.push(read_message(&mut r)?);
    }

    skip_measures(&mut r)?;
    skip_symbols(&mut r)?;

    r.expect_sentinel(SENTINEL_END)?;

    Ok(AnalysisResponse { messages })
}

fn read_message<R: Read>(r: &mut ProtocolReader<R>) -> Result<Message, ProtocolError> {
    let rule_key = r.read_str()?;
    let filename = r.read_str()?;
    let line = r.read_i32()?;
    let column = r.read_i32()?;
    let end_line = r.read_i32()?;
    let end_column = r.read_i32()?;
    // Remediation cost is emitted but unused on this side.
    let _remediation_cost = r.read_i32()?;
    let text = r.read_str()?;
    let parts_make_flow = r.read_bool()?;

    let part_count = r.read_count()?;
    let mut parts = Vec::with_capacity(part_count.min(1024));
    for _ in 0..part_count {
        parts.push(MessagePart {
            filename: r.read_str()?,
            line: r.read_i32()?,
            column: r.read_i32()?,
            end_line: r.read_i32()?,
            end_column: r.read_i32()?,
            text: r.read_str()?,
        });
    }

    let fix_count = r.read_count()?;
    let mut fixes = Vec::with_capacity(fix_count.min(1024));
    for _ in 0..fix_count {
        let message = r.read_str()?;
        let edit_count = r.read_count()?;
        let mut edits = Vec::with_capacity(edit_count.min(1024));
        for _ in 0..edit_count {
            edits.push(QuickFixEdit {
                start_line: r.read_i32()?,
                start_column: r.read_i32()?,
                end_line: r.read_i32()?,
                end_column: r.read_i32()?,
                replacement: r.read_str()?,
            });
        }
        fixes.push(QuickFix { message, edits });
    }

    Ok(Message {
        rule_key,
        filename,
        line,
        column,
        end_line,
        end_column,
        text,
        parts_make_flow,
        parts,
        fixes,
    })
}

/// Consume the measures section: per file, five metric integers and a
/// length-prefixed executable-lines blob.
fn skip_measures<R: Read>(r: &mut ProtocolReader<R>) -> Result<(), ProtocolError> {
    let count = r.read_count()?;
    for _ in 0..count {
        let _filename = r.read_str()?;
        for _ in 0..5 {
            let _metric = r.read_i32()?;
        }
        let blob_len = r.read_count()?;
        r.skip(blob_len)?;
    }
    Ok(())
}

/// Consume the symbols section: per symbol, a four-integer declaration and
/// a count-prefixed list of four-integer references.
fn skip_symbols<R: Read>(r: &mut ProtocolReader<R>) -> Result<(), ProtocolError> {
    let count = r.read_count()?;
    for _ in 0..count {
        for _ in 0..4 {
            let _declaration = r.read_i32()?;
        }
        let reference_count = r.read_count()?;
        for _ in 0..reference_count {
            for _ in 0..4 {
                let _reference = r.read_i32()?;
            }
        }
    }
    Ok(())
}

//! Message framing
//!
//! ```text
//! [u8 major][u8 minor][u32_le body length][msgpack body: length bytes]
//! ```

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::error::ProtocolError;
use super::model::ProtocolVersion;

pub const HEADER_LEN: usize = 6;

/// Prefix `body` with the version tag and its length
pub fn write_frame(version: ProtocolVersion, body: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let len = u32::try_from(body.len())
        .map_err(|_| ProtocolError::Encode(format!("body of {} bytes exceeds u32", body.len())))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.push(version.major);
    frame.push(version.minor);
    frame
        .write_u32::<LittleEndian>(len)
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;
    frame
        .write_all(body)
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;
    Ok(frame)
}

/// Split a frame into its version and body, checking the version is readable
pub fn read_frame(frame: &[u8]) -> Result<(ProtocolVersion, &[u8]), ProtocolError> {
    if frame.len() < HEADER_LEN {
        return Err(ProtocolError::Truncated {
            expected: HEADER_LEN,
            actual: frame.len(),
        });
    }

    let mut cursor = Cursor::new(frame);
    let mut tag = [0u8; 2];
    cursor
        .read_exact(&mut tag)
        .map_err(|e| ProtocolError::malformed(e.to_string()))?;
    let version = ProtocolVersion::new(tag[0], tag[1]);
    version.check_readable()?;

    let len = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| ProtocolError::malformed(e.to_string()))? as usize;
    let body = &frame[HEADER_LEN..];
    if body.len() < len {
        return Err(ProtocolError::Truncated {
            expected: HEADER_LEN + len,
            actual: frame.len(),
        });
    }
    if body.len() > len {
        return Err(ProtocolError::malformed(format!(
            "{} trailing bytes after body",
            body.len() - len
        )));
    }

    Ok((version, body))
}

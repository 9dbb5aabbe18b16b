//! Shared string/blob encoding helpers used by every message payload.

use crate::error::{ProtocolError, ProtocolResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Writes a `{u16 length, utf-8 bytes}` string.
pub fn write_string<W: Write>(writer: &mut W, value: &str) -> ProtocolResult<()> {
    let bytes = value.as_bytes();
    writer.write_u16::<BigEndian>(bytes.len() as u16)?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Reads a `{u16 length, utf-8 bytes}` string.
pub fn read_string<R: Read>(reader: &mut R) -> ProtocolResult<String> {
    let len = reader.read_u16::<BigEndian>()?;
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes).map_err(|_| ProtocolError::FramingError)?;
    Ok(std::str::from_utf8(&bytes)?.to_owned())
}

/// Writes a `{u32 length, bytes}` blob.
pub fn write_blob<W: Write>(writer: &mut W, value: &[u8]) -> ProtocolResult<()> {
    writer.write_u32::<BigEndian>(value.len() as u32)?;
    writer.write_all(value)?;
    Ok(())
}

/// Reads a `{u32 length, bytes}` blob.
pub fn read_blob<R: Read>(reader: &mut R) -> ProtocolResult<Vec<u8>> {
    let len = reader.read_u32::<BigEndian>()?;
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes).map_err(|_| ProtocolError::FramingError)?;
    Ok(bytes)
}

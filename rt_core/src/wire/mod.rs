//! Length-prefixed binary framing and typed message (de)serialization
//! (`spec.md` §4.1). Pure: no I/O, no hidden state — `read_frame`/
//! `write_frame` take any `Read`/`Write`, so the codec is identical whether
//! it is driven by a `TcpStream`, a `Cursor<Vec<u8>>` in a test, or a disk
//! file.
//!
//! Grounded on `t51core::net::frame`/`shared`: manual `byteorder`
//! serialization rather than a generic serde format, because the wire
//! format is fixed and small, and (per the teacher's own design notes) a
//! non-Rust client needs to be able to parse it without pulling in a Rust
//! serialization crate.

mod messages;
mod primitives;

pub use messages::*;
pub use primitives::{read_blob, read_string, write_blob, write_string};

use crate::error::{ProtocolError, ProtocolResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// At least 16 MiB per `spec.md` §6, to accommodate level-file bundles.
pub const DEFAULT_MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Reads one `{u8 type, u32 big-endian length, length bytes payload}` frame.
///
/// Returns `ProtocolError::FramingError` if the stream ends mid-header or
/// mid-payload (an `UnexpectedEof` from a partial read), matching
/// `spec.md` §4.1's framing-error policy exactly rather than surfacing a
/// generic I/O error for that case.
pub fn read_frame<R: Read>(reader: &mut R, max_frame_bytes: u32) -> ProtocolResult<(u8, Vec<u8>)> {
    let msg_type = read_u8_or_framing_error(reader)?;
    let len = read_u32_or_framing_error(reader)?;

    if len > max_frame_bytes {
        return Err(ProtocolError::FrameTooLarge { len, max: max_frame_bytes });
    }

    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .map_err(|_| ProtocolError::FramingError)?;

    Ok((msg_type, payload))
}

/// Writes one frame for the given type byte and payload bytes.
pub fn write_frame<W: Write>(writer: &mut W, msg_type: u8, payload: &[u8]) -> ProtocolResult<()> {
    writer.write_u8(msg_type)?;
    writer.write_u32::<BigEndian>(payload.len() as u32)?;
    writer.write_all(payload)?;
    Ok(())
}

fn read_u8_or_framing_error<R: Read>(reader: &mut R) -> ProtocolResult<u8> {
    reader.read_u8().map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ProtocolError::FramingError,
        _ => ProtocolError::Io(e),
    })
}

fn read_u32_or_framing_error<R: Read>(reader: &mut R) -> ProtocolResult<u32> {
    reader.read_u32::<BigEndian>().map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ProtocolError::FramingError,
        _ => ProtocolError::Io(e),
    })
}

/// Reads one message off the stream and decodes it to a typed `Message`.
pub fn read_message<R: Read>(reader: &mut R, max_frame_bytes: u32) -> ProtocolResult<Message> {
    let (msg_type, payload) = read_frame(reader, max_frame_bytes)?;
    Message::decode(msg_type, &payload)
}

/// Encodes and writes a typed message as one frame.
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> ProtocolResult<()> {
    let mut payload = Vec::new();
    message.encode(&mut payload)?;
    write_frame(writer, message.type_byte(), &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_roundtrip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, 7, b"hello").unwrap();
        let mut cursor = Cursor::new(buf);
        let (t, payload) = read_frame(&mut cursor, DEFAULT_MAX_FRAME_BYTES).unwrap();
        assert_eq!(t, 7);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn truncated_header_is_framing_error() {
        let mut cursor = Cursor::new(vec![1, 2]); // type byte + 1 of 4 length bytes
        let err = read_frame(&mut cursor, DEFAULT_MAX_FRAME_BYTES).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError));
    }

    #[test]
    fn truncated_payload_is_framing_error() {
        let mut buf = Vec::new();
        buf.write_u8(1).unwrap();
        buf.write_u32::<BigEndian>(10).unwrap();
        buf.extend_from_slice(b"short"); // fewer than 10 bytes promised
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor, DEFAULT_MAX_FRAME_BYTES).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut buf = Vec::new();
        buf.write_u8(1).unwrap();
        buf.write_u32::<BigEndian>(100).unwrap();
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor, 10).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { len: 100, max: 10 }));
    }

    #[test]
    fn unknown_type_byte_is_rejected() {
        let mut buf = Vec::new();
        write_frame(&mut buf, 0xff, &[]).unwrap();
        let mut cursor = Cursor::new(buf);
        let err = read_message(&mut cursor, DEFAULT_MAX_FRAME_BYTES).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(0xff)));
    }
}

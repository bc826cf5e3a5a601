//! Wire primitives: node header bits, variable-length integers and names.
//!
//! Variable-length integers carry 7 payload bits per byte, least significant
//! group first; bit 7 is set when another byte follows. Names are a
//! variable-length byte count followed by UTF-8 bytes.

use std::io::{self, Read, Write};

use crate::error::CodecError;

/// First byte of every snapshot stream.
pub const FORMAT_MARKER: u8 = 0b0100_0000;

/// Header bit 7: the node is a directory.
pub(crate) const IS_DIRECTORY: u8 = 0b1000_0000;

/// Directory header bit 6: a modification time delta follows.
pub(crate) const HAS_MODIFIED_DELTA: u8 = 0b0100_0000;
/// Directory header bit 5: the high bits of the child count follow.
pub(crate) const HAS_EXTENDED_COUNT: u8 = 0b0010_0000;
/// Directory header bits 4-0: low bits of the child count.
pub(crate) const COUNT_MASK: u8 = 0b0001_1111;
pub(crate) const COUNT_BITS: u32 = 5;

/// File header bit 6: the high bits of the size follow.
pub(crate) const HAS_EXTENDED_SIZE: u8 = 0b0100_0000;
/// File header bits 5-0: low bits of the size.
pub(crate) const SIZE_MASK: u8 = 0b0011_1111;
pub(crate) const SIZE_BITS: u32 = 6;

const PAYLOAD_MASK: u8 = 0b0111_1111;
const CONTINUATION: u8 = 0b1000_0000;

/// Write `value` as a variable-length integer.
pub fn write_varint<W: Write>(writer: &mut W, mut value: u64) -> io::Result<()> {
    loop {
        let mut byte = (value & u64::from(PAYLOAD_MASK)) as u8;
        value >>= 7;
        if value != 0 {
            byte |= CONTINUATION;
        }
        writer.write_all(&[byte])?;
        if value == 0 {
            return Ok(());
        }
    }
}

/// Read a variable-length integer.
pub fn read_varint<R: Read>(reader: &mut R) -> Result<u64, CodecError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = read_u8(reader)?;
        let payload = u64::from(byte & PAYLOAD_MASK);
        if shift > 63 || (shift == 63 && payload > 1) {
            return Err(CodecError::VarintOverflow);
        }
        result |= payload << shift;
        if byte & CONTINUATION == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

pub(crate) fn read_u8<R: Read>(reader: &mut R) -> Result<u8, CodecError> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn write_name<W: Write>(writer: &mut W, name: &str) -> io::Result<()> {
    write_varint(writer, name.len() as u64)?;
    writer.write_all(name.as_bytes())
}

pub(crate) fn read_name<R: Read>(reader: &mut R) -> Result<String, CodecError> {
    let len = read_varint(reader)?;
    let mut bytes = Vec::new();
    // Bounded by the stream, not by the declared length
    reader.by_ref().take(len).read_to_end(&mut bytes)?;
    if (bytes.len() as u64) < len {
        return Err(CodecError::UnexpectedEof);
    }
    String::from_utf8(bytes).map_err(CodecError::InvalidName)
}

//! Byte- and bit-level memory primitives shared by the write and read sides.

pub mod packed;
pub mod varint;

pub use packed::{bits_for_max, null_sentinel, PackedLongArray};
pub use varint::{read_uvarint, read_uvarint_len, write_uvarint, zigzag_decode, zigzag_encode};

use crate::error::{Error, Result};

/// Append a length-prefixed UTF-8 string.
pub fn write_utf(out: &mut Vec<u8>, s: &str) {
    write_uvarint(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

/// Read a length-prefixed UTF-8 string, advancing `input`.
pub fn read_utf(input: &mut &[u8]) -> Result<String> {
    let len = read_uvarint_len(input)?;
    if input.len() < len {
        return Err(Error::truncated("utf string"));
    }
    let (bytes, rest) = input.split_at(len);
    *input = rest;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::malformed_schema("string is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf_roundtrip() {
        for s in ["", "a", "Movie", "tëst-ünïcode"] {
            let mut buf = Vec::new();
            write_utf(&mut buf, s);
            let mut slice = buf.as_slice();
            assert_eq!(read_utf(&mut slice).unwrap(), s);
            assert!(slice.is_empty());
        }
    }

    #[test]
    fn utf_truncated() {
        let mut buf = Vec::new();
        write_utf(&mut buf, "hello");
        let mut slice = &buf[..3];
        assert!(read_utf(&mut slice).is_err());
    }
}

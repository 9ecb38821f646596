//! Container header.
//!
//! ```text
//! offset 0: id_width   (1 byte, 1..=255)
//! offset 1: extension  (7 bytes, UTF-8, right-padded with spaces)
//! offset 8: reference records
//! ```

use std::io::{Read, Write};

use tracing::warn;

use crate::FormatError;

/// Size of the header in bytes.
pub const HEADER_LEN: usize = 1 + EXTENSION_LEN;

/// Capacity of the extension field in bytes.
pub const EXTENSION_LEN: usize = 7;

/// Padding byte of the extension field.
pub const PAD_CHAR: u8 = b' ';

/// Self-describing container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Bytes per reference record
    pub id_width: u8,
    /// Extension of the original file, including the leading dot
    pub extension: String,
}

impl ContainerHeader {
    /// Creates a header, truncating `extension` to the field capacity.
    ///
    /// Truncation never splits a UTF-8 character. Trailing spaces in the
    /// extension cannot be told apart from padding and are lost on decode.
    pub fn new(id_width: u8, extension: &str) -> Self {
        let stored = truncate_extension(extension);
        if stored.len() < extension.len() {
            warn!(extension, stored, "Extension truncated to {EXTENSION_LEN} bytes");
        }
        Self {
            id_width,
            extension: stored.to_string(),
        }
    }

    /// Returns the encoded header.
    pub fn encode(&self) -> Result<[u8; HEADER_LEN], FormatError> {
        if self.id_width == 0 {
            return Err(FormatError::ZeroWidth);
        }

        let mut out = [PAD_CHAR; HEADER_LEN];
        out[0] = self.id_width;
        let ext = truncate_extension(&self.extension).as_bytes();
        out[1..1 + ext.len()].copy_from_slice(ext);
        Ok(out)
    }

    /// Decodes a header from the first `HEADER_LEN` bytes of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_LEN {
            return Err(FormatError::TruncatedHeader {
                expected: HEADER_LEN,
                available: bytes.len(),
            });
        }

        let id_width = bytes[0];
        if id_width == 0 {
            return Err(FormatError::ZeroWidth);
        }

        let field = &bytes[1..HEADER_LEN];
        let end = field
            .iter()
            .rposition(|b| *b != PAD_CHAR)
            .map_or(0, |i| i + 1);
        let extension = std::str::from_utf8(&field[..end])
            .map_err(|_| FormatError::InvalidExtension)?
            .to_string();

        Ok(Self {
            id_width,
            extension,
        })
    }

    /// Writes the header to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), FormatError> {
        writer.write_all(&self.encode()?)?;
        Ok(())
    }

    /// Reads exactly one header from `reader`.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, FormatError> {
        let mut buf = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            match reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Self::decode(&buf[..filled])
    }
}

fn truncate_extension(extension: &str) -> &str {
    if extension.len() <= EXTENSION_LEN {
        return extension;
    }
    let mut end = EXTENSION_LEN;
    while !extension.is_char_boundary(end) {
        end -= 1;
    }
    &extension[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_layout() {
        let header = ContainerHeader::new(1, ".txt");
        assert_eq!(header.encode().unwrap(), *b"\x01.txt   ");
    }

    #[test]
    fn test_decode_trims_padding() {
        let header = ContainerHeader::decode(b"\x02.tar   rest").unwrap();
        assert_eq!(header.id_width, 2);
        assert_eq!(header.extension, ".tar");
    }

    #[test]
    fn test_empty_extension() {
        let header = ContainerHeader::new(3, "");
        let bytes = header.encode().unwrap();
        assert_eq!(&bytes[1..], b"       ");
        assert_eq!(ContainerHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_long_extension_truncated() {
        let header = ContainerHeader::new(1, ".markdown");
        assert_eq!(header.extension, ".markdo");
        let decoded = ContainerHeader::decode(&header.encode().unwrap()).unwrap();
        assert_eq!(decoded.extension, ".markdo");
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        // Byte 7 falls inside the third two-byte character
        let header = ContainerHeader::new(1, ".aéééé");
        assert_eq!(header.extension, ".aéé");
        let decoded = ContainerHeader::decode(&header.encode().unwrap()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_rejects_zero_width() {
        assert!(matches!(
            ContainerHeader::decode(b"\x00.bin   "),
            Err(FormatError::ZeroWidth)
        ));
        assert!(matches!(
            ContainerHeader::new(0, ".x").encode(),
            Err(FormatError::ZeroWidth)
        ));
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        assert!(matches!(
            ContainerHeader::decode(b"\x01\xff\xfe    "),
            Err(FormatError::InvalidExtension)
        ));
    }

    #[test]
    fn test_read_from_short_input() {
        let mut cursor = Cursor::new(b"\x01.tx".to_vec());
        assert!(matches!(
            ContainerHeader::read_from(&mut cursor),
            Err(FormatError::TruncatedHeader {
                expected: HEADER_LEN,
                available: 4
            })
        ));
    }

    #[test]
    fn test_write_then_read() {
        let header = ContainerHeader::new(255, ".gz");
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_LEN);
        assert_eq!(ContainerHeader::read_from(&mut Cursor::new(buf)).unwrap(), header);
    }

    #[test]
    fn test_trailing_space_in_extension_is_dropped() {
        let header = ContainerHeader::new(1, ".x ");
        assert_eq!(header.extension, ".x ");

        let decoded = ContainerHeader::decode(&header.encode().unwrap()).unwrap();
        assert_eq!(decoded.extension, ".x");
    }
}

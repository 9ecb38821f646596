//! Byte-level comparison of an original and a restored file.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::EngineError;

const BLOCK_LEN: usize = 64 * 1024;

/// Result of comparing two files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileComparison {
    /// Length of the first file
    pub len_a: u64,
    /// Length of the second file
    pub len_b: u64,
    /// Positions whose bytes differ, counting every byte past the shorter file
    pub differing_bytes: u64,
}

impl FileComparison {
    /// True if both files are byte-identical.
    pub fn is_identical(&self) -> bool {
        self.differing_bytes == 0
    }

    /// True if both files have the same length.
    pub fn lengths_match(&self) -> bool {
        self.len_a == self.len_b
    }

    /// Length of the longer file.
    pub fn max_len(&self) -> u64 {
        self.len_a.max(self.len_b)
    }
}

/// Compares `a` and `b` position by position.
pub fn compare_files(a: &Path, b: &Path) -> Result<FileComparison, EngineError> {
    let mut reader_a = BufReader::new(File::open(a).map_err(EngineError::io(a))?);
    let mut reader_b = BufReader::new(File::open(b).map_err(EngineError::io(b))?);
    let mut block_a = vec![0u8; BLOCK_LEN];
    let mut block_b = vec![0u8; BLOCK_LEN];

    let mut result = FileComparison {
        len_a: 0,
        len_b: 0,
        differing_bytes: 0,
    };

    loop {
        let n_a = read_block(&mut reader_a, &mut block_a).map_err(EngineError::io(a))?;
        let n_b = read_block(&mut reader_b, &mut block_b).map_err(EngineError::io(b))?;
        if n_a == 0 && n_b == 0 {
            break;
        }

        let common = n_a.min(n_b);
        let mismatched = block_a[..common]
            .iter()
            .zip(&block_b[..common])
            .filter(|(x, y)| x != y)
            .count();

        result.differing_bytes += (mismatched + n_a.max(n_b) - common) as u64;
        result.len_a += n_a as u64;
        result.len_b += n_b as u64;
    }

    Ok(result)
}

/// Fills `buf` unless the reader ends first.
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn compare(a: &[u8], b: &[u8]) -> FileComparison {
        let dir = TempDir::new().unwrap();
        let (pa, pb) = (dir.path().join("a"), dir.path().join("b"));
        fs::write(&pa, a).unwrap();
        fs::write(&pb, b).unwrap();
        compare_files(&pa, &pb).unwrap()
    }

    #[test]
    fn test_identical() {
        let result = compare(b"same bytes", b"same bytes");
        assert!(result.is_identical());
        assert!(result.lengths_match());
        assert_eq!(result.max_len(), 10);
    }

    #[test]
    fn test_counts_mismatches_and_length_gap() {
        let result = compare(b"abcdef", b"abXdefPAD");
        assert_eq!(result.differing_bytes, 1 + 3);
        assert!(!result.lengths_match());
        assert_eq!((result.len_a, result.len_b), (6, 9));
    }

    #[test]
    fn test_zero_padding_counts_as_difference() {
        let mut padded = vec![1u8; 23];
        padded.resize(30, 0);
        let result = compare(&[1u8; 23], &padded);
        assert_eq!(result.differing_bytes, 7);
    }

    #[test]
    fn test_spans_blocks() {
        let a = vec![0u8; BLOCK_LEN * 2 + 5];
        let mut b = a.clone();
        b[BLOCK_LEN + 1] = 1;
        b[BLOCK_LEN * 2 + 4] = 1;
        assert_eq!(compare(&a, &b).differing_bytes, 2);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = compare_files(&dir.path().join("x"), &dir.path().join("y")).unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}

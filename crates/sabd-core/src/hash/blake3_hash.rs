//! BLAKE3 hash in default mode with 256-bit output.

/// Computes BLAKE3 hash in default mode with 256-bit output.
///
/// # Example
/// ```
/// use sabd_core::hash::blake3_hash;
///
/// let hash = blake3_hash(&[]);
/// let expected = hex::decode("af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262").unwrap();
/// assert_eq!(hash.as_slice(), expected.as_slice());
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

//! Block padding applied to plaintext before it is signed and sealed.
//!
//! A single `0x80` delimiter is appended, followed by zero bytes up to the
//! next multiple of the block size, so that ciphertext length only reveals
//! the message length in 160-byte steps.

use crate::utils::{ProtocolError, Result};

/// Network-wide padding block size
pub const PADDING_BLOCK_SIZE: usize = 160;

/// Byte that marks the end of the real content
pub const PADDING_DELIMITER: u8 = 0x80;

/// Length of `len` content bytes once padded to `block_size`
pub fn padded_length(len: usize, block_size: usize) -> usize {
    (len + 1).div_ceil(block_size) * block_size
}

/// Pad to the network block size
pub fn pad(data: &[u8]) -> Vec<u8> {
    pad_to_block(data, PADDING_BLOCK_SIZE)
}

/// Pad to an arbitrary block size
pub fn pad_to_block(data: &[u8], block_size: usize) -> Vec<u8> {
    let mut padded = Vec::with_capacity(padded_length(data.len(), block_size));
    padded.extend_from_slice(data);
    padded.push(PADDING_DELIMITER);
    padded.resize(padded_length(data.len(), block_size), 0);
    padded
}

/// Strip padding by truncating at the last delimiter byte
///
/// # Errors
///
/// Returns `ProtocolError::BadPadding` if the buffer holds no delimiter
pub fn unpad(data: &[u8]) -> Result<&[u8]> {
    data.iter()
        .rposition(|&b| b == PADDING_DELIMITER)
        .map(|idx| &data[..idx])
        .ok_or_else(|| ProtocolError::BadPadding.into())
}

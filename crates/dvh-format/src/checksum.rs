//! Two's-complement word checksum
//!
//! The header is treated as a run of 32-bit big-endian words. Starting from
//! zero, every word is subtracted from a running sum with wrapping arithmetic.
//! A valid header, checksum word included, sums to zero.

/// Width of a checksum word in bytes
pub const WORD_SIZE: usize = 4;

/// Compute the running two's-complement sum over the big-endian words of `block`.
///
/// Trailing bytes that do not fill a whole word are ignored. Header blocks
/// are always a multiple of the word size.
pub fn twos_complement_sum(block: &[u8]) -> u32 {
    block
        .chunks_exact(WORD_SIZE)
        .map(|word| u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
        .fold(0u32, |sum, word| sum.wrapping_sub(word))
}

/// Check that the words of `block` sum to zero.
pub fn verify(block: &[u8]) -> bool {
    twos_complement_sum(block) == 0
}

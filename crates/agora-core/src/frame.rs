//! On-disk frame layout shared by the appender and the replayer.
//!
//! ```text
//! offset  size  field
//!   0      8   MagicPrefix  = 0xFFFFFFFFFFFFFFFF
//!   8      4   BlobSize     (payload length in bytes)
//!  12      4   BlobCRC32    (CRC-32 of payload bytes)
//!  16      N   Payload
//!  16+N    P   Zero padding; P = (8 - N mod 8) mod 8
//! ```
//!
//! All fields little-endian; frames start 8-byte-aligned.

pub const MAGIC_PREFIX: u64 = 0xFFFF_FFFF_FFFF_FFFF;

pub const BLOB_PADDING_BYTES: usize = 8;

/// Magic + size + crc.
pub const FRAME_PREFIX_SIZE: usize = size_of::<u64>() + size_of::<u32>() + size_of::<u32>();

pub const fn padding_required(payload_len: usize) -> usize {
    let over = payload_len % BLOB_PADDING_BYTES;
    if over == 0 { 0 } else { BLOB_PADDING_BYTES - over }
}

pub fn crc32(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn padding_reaches_next_multiple_of_eight() {
        assert_eq!(padding_required(0), 0);
        assert_eq!(padding_required(8), 0);
        assert_eq!(padding_required(64), 0);
        for len in 1..64usize {
            let padding = padding_required(len);
            assert!(padding < BLOB_PADDING_BYTES);
            assert_eq!((len + padding) % BLOB_PADDING_BYTES, 0);
        }
    }

    #[test_log::test]
    fn crc32_known_value() {
        // IEEE CRC-32 of "123456789"
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }
}

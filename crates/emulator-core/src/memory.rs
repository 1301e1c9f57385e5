//! Raw little-endian word accessors over byte buffers.
//!
//! Backing buffers for memory and ROM devices are viewed as little-endian
//! byte streams regardless of host endianness, so backing files stay
//! portable between architectures. All accessors take the device limit (the
//! offset of the last managed byte): aligned loads from words past the limit
//! read as zero, aligned stores past the limit are dropped.
//!
//! Buffers are allocated with a length that is a multiple of 4 and at least
//! `limit + 1` rounded up, so every limit-valid aligned word is in bounds.

/// Loads the aligned word containing offset `off`, or 0 when that word lies
/// past `limit`.
#[must_use]
pub fn load_aligned(buf: &[u8], limit: u32, off: u32) -> u32 {
    if off >> 2 > limit >> 2 {
        return 0;
    }
    let idx = (off & !3) as usize;
    match buf.get(idx..idx + 4) {
        Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        None => 0,
    }
}

/// Stores `word` into the aligned word containing offset `off`; dropped when
/// that word lies past `limit`.
pub fn store_aligned(buf: &mut [u8], limit: u32, off: u32, word: u32) {
    if off >> 2 > limit >> 2 {
        return;
    }
    let idx = (off & !3) as usize;
    if let Some(b) = buf.get_mut(idx..idx + 4) {
        b.copy_from_slice(&word.to_le_bytes());
    }
}

/// Reads the word at a possibly-unaligned offset.
///
/// Result byte `i` is the buffer byte at `off + i`; bytes belonging to
/// aligned words past `limit` read as zero. Fully in-bounds windows use a
/// direct unaligned copy, which is equivalent because bytes past `limit`
/// inside the rounded buffer are never written non-zero.
#[must_use]
pub fn load_word_raw(buf: &[u8], limit: u32, off: u32) -> u32 {
    if u64::from(off) + 4 <= buf.len() as u64 {
        let idx = off as usize;
        let b = &buf[idx..idx + 4];
        return u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
    }
    if off & 3 == 0 {
        return load_aligned(buf, limit, off);
    }
    let bits = (off & 3) * 8;
    let mask = (1_u32 << bits) - 1;
    let lo = off & !3;
    let hi = lo.wrapping_add(4);
    (load_aligned(buf, limit, hi) & mask) << (32 - bits)
        | (load_aligned(buf, limit, lo) & !mask) >> bits
}

/// Writes the word at a possibly-unaligned offset via aligned read-modify-
/// write; aligned words past `limit` are not touched.
pub fn store_word_raw(buf: &mut [u8], limit: u32, off: u32, word: u32) {
    if off & 3 == 0 {
        store_aligned(buf, limit, off, word);
        return;
    }
    let bits = (off & 3) * 8;
    let mask = (1_u32 << bits) - 1;
    let lo = off & !3;
    let hi = lo.wrapping_add(4);
    store_aligned(
        buf,
        limit,
        hi,
        (load_aligned(buf, limit, hi) & !mask) | word >> (32 - bits),
    );
    store_aligned(
        buf,
        limit,
        lo,
        (load_aligned(buf, limit, lo) & mask) | word << bits,
    );
}

/// Reads the byte at `off` by extracting it from its containing aligned
/// word. The caller guarantees `off <= limit`.
#[must_use]
pub fn load_byte_raw(buf: &[u8], limit: u32, off: u32) -> u8 {
    (load_aligned(buf, limit, off) >> ((off & 3) * 8)) as u8
}

/// Writes the byte at `off` by patching its containing aligned word. The
/// caller guarantees `off <= limit`.
pub fn store_byte_raw(buf: &mut [u8], limit: u32, off: u32, byte: u8) {
    let shift = (off & 3) * 8;
    let word = (load_aligned(buf, limit, off) & !(0xFF << shift)) | u32::from(byte) << shift;
    store_aligned(buf, limit, off, word);
}

/// Rounds a buffer length up to a whole multiple of `granule`.
#[must_use]
pub(crate) fn round_up_len(len: u64, granule: u64) -> u64 {
    len.div_ceil(granule) * granule
}

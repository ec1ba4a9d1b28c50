//! Alignment and bounds helpers shared by the container formats.

use std::ops::Range;

/// MOMO entries start on 64-byte boundaries.
pub const ENTRY_ALIGN: usize = 64;
/// PTX entries and compressed payloads use 2048-byte blocks.
pub const SECTOR: usize = 2048;

/// Round `n` up to the next multiple of `align`.
#[inline]
pub fn align_up(n: usize, align: usize) -> usize {
    n.div_ceil(align) * align
}

/// Zero-pad `buf` to the next multiple of `align`.
pub fn pad_to(buf: &mut Vec<u8>, align: usize) {
    let target = align_up(buf.len(), align);
    buf.resize(target, 0);
}

/// `offset..offset + size` if it lies within a buffer of `len` bytes.
pub fn checked_range(offset: u64, size: u64, len: usize) -> Option<Range<usize>> {
    let end = offset.checked_add(size)?;
    if end > len as u64 {
        return None;
    }
    Some(offset as usize..end as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_boundaries() {
        assert_eq!(align_up(0, 64), 0);
        assert_eq!(align_up(1, 64), 64);
        assert_eq!(align_up(64, 64), 64);
        assert_eq!(align_up(2049, SECTOR), 4096);
    }

    #[test]
    fn pad_to_appends_zeros() {
        let mut buf = vec![1u8; 70];
        pad_to(&mut buf, ENTRY_ALIGN);
        assert_eq!(buf.len(), 128);
        assert!(buf[70..].iter().all(|&b| b == 0));
    }

    #[test]
    fn checked_range_rejects_overruns() {
        assert_eq!(checked_range(4, 4, 8), Some(4..8));
        assert_eq!(checked_range(4, 5, 8), None);
        assert_eq!(checked_range(u64::MAX, 2, 8), None);
    }
}

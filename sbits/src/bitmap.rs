//! Query-bitmap construction over a `[min, max]` data range (§4.7), and the raw byte-level
//! overlap test used to AND a query bitmap against a page or index-entry bitmap.

use crate::capability::Capabilities;

/// True iff any bit set in `a` is also set in `b`. `a` and `b` must be the same length.
pub(crate) fn overlaps(a: &[u8], b: &[u8]) -> bool {
    a.iter().zip(b).any(|(x, y)| x & y != 0)
}

fn highest_set_bit_u16(v: u16) -> Option<u8> {
    if v == 0 {
        None
    } else {
        Some(15 - v.leading_zeros() as u8)
    }
}

fn fill_range_u16(bm: &mut u16, lo: u8, hi: u8) {
    for bit in lo..=hi {
        *bm |= 1 << bit;
    }
}

/// Build a 16-bit query bitmap covering the closed interval `[min, max]` (either bound may be
/// absent) using the caller's [`Capabilities::update_bitmap`].
pub(crate) fn build_bitmap16_range<C: Capabilities>(
    caps: &C,
    min: Option<&[u8]>,
    max: Option<&[u8]>,
) -> [u8; 2] {
    let bucket_bit = |value: &[u8]| -> Option<u8> {
        let mut tmp = [0u8; 2];
        caps.update_bitmap(value, &mut tmp);
        highest_set_bit_u16(u16::from_le_bytes(tmp))
    };

    let mut bm: u16 = 0;
    match (min, max) {
        (None, None) => bm = u16::MAX,
        (Some(min), None) => {
            if let Some(min_bit) = bucket_bit(min) {
                fill_range_u16(&mut bm, 0, min_bit);
            }
        }
        (None, Some(max)) => {
            if let Some(max_bit) = bucket_bit(max) {
                fill_range_u16(&mut bm, 0, max_bit);
            }
        }
        (Some(min), Some(max)) => {
            let min_bit = bucket_bit(min).unwrap_or(0);
            let max_bit = bucket_bit(max).unwrap_or(0);
            let (lo, hi) = if min_bit <= max_bit {
                (min_bit, max_bit)
            } else {
                (max_bit, min_bit)
            };
            fill_range_u16(&mut bm, lo, hi);
        }
    }
    bm.to_le_bytes()
}

fn highest_set_bit_u64(v: u64) -> Option<u8> {
    if v == 0 {
        None
    } else {
        Some(63 - v.leading_zeros() as u8)
    }
}

fn fill_range_u64(bm: &mut u64, lo: u8, hi: u8) {
    for bit in lo..=hi {
        *bm |= 1 << bit;
    }
}

/// Build a 64-bit query bitmap covering the closed interval `[min, max]`. Short-circuits when
/// `min` and `max` land in the same bucket: the `max` bitmap is already a complete answer, so
/// the fill loop is skipped (mirrors the reference implementation's optimization for that case).
pub(crate) fn build_bitmap64_range<C: Capabilities>(
    caps: &C,
    min: Option<&[u8]>,
    max: Option<&[u8]>,
) -> [u8; 8] {
    let bucket = |value: &[u8]| -> (u64, Option<u8>) {
        let mut tmp = [0u8; 8];
        caps.update_bitmap(value, &mut tmp);
        let v = u64::from_le_bytes(tmp);
        (v, highest_set_bit_u64(v))
    };

    let mut bm: u64 = 0;
    match (min, max) {
        (None, None) => bm = u64::MAX,
        (Some(min), None) => {
            if let Some(min_bit) = bucket(min).1 {
                fill_range_u64(&mut bm, 0, min_bit);
            }
        }
        (None, Some(max)) => {
            if let Some(max_bit) = bucket(max).1 {
                fill_range_u64(&mut bm, 0, max_bit);
            }
        }
        (Some(min), Some(max)) => {
            let (_, min_bit) = bucket(min);
            let (max_bm, max_bit) = bucket(max);
            let min_bit = min_bit.unwrap_or(0);
            let max_bit = max_bit.unwrap_or(0);
            if min_bit == max_bit {
                bm = max_bm;
            } else {
                let (lo, hi) = if min_bit <= max_bit {
                    (min_bit, max_bit)
                } else {
                    (max_bit, min_bit)
                };
                fill_range_u64(&mut bm, lo, hi);
            }
        }
    }
    bm.to_le_bytes()
}

/// Dispatches to the 16- or 64-bit builder based on `bitmap_size`, returning the bytes to store
/// in the iterator's query bitmap. Returns an empty vector when `bitmap_size == 0`.
pub(crate) fn build_range_bitmap<C: Capabilities>(
    caps: &C,
    bitmap_size: usize,
    min: Option<&[u8]>,
    max: Option<&[u8]>,
) -> alloc::vec::Vec<u8> {
    match bitmap_size {
        2 => build_bitmap16_range(caps, min, max).to_vec(),
        8 => build_bitmap64_range(caps, min, max).to_vec(),
        _ => alloc::vec::Vec::new(),
    }
}

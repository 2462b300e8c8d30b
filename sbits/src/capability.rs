//! The caller-supplied capability set the engine is polymorphic over (§4.1, §9).
//!
//! Keys and data are opaque, fixed-width byte sequences; everything the engine needs to know
//! about their ordering and their data-value bitmap comes from an implementation of this trait,
//! supplied at [`crate::Engine::open`] and held for the engine's lifetime.

use core::cmp::Ordering;

/// Ordering, bitmap, and (optionally) interpolation capabilities over opaque key/data bytes.
pub trait Capabilities {
    /// Total order over keys.
    fn compare_key(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Total order over data values.
    fn compare_data(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// OR this data value's bucket bit(s) into `bitmap`.
    fn update_bitmap(&self, data: &[u8], bitmap: &mut [u8]);

    /// Whether `data`'s bucket bit(s) overlap any bit set in `bitmap`.
    fn in_bitmap(&self, data: &[u8], bitmap: &[u8]) -> bool;

    /// Project a key onto a signed integer for the Key Locator's first guess (§4.4).
    ///
    /// Returning `None` for any key involved in a lookup disables interpolation for that
    /// lookup; the engine falls back to a binary search over the candidate page range. The
    /// default implementation always returns `None`.
    fn key_as_i64(&self, _key: &[u8]) -> Option<i64> {
        None
    }
}

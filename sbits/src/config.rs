//! Engine configuration, consumed once at [`crate::Engine::open`] (§6).
//!
//! `Features` replaces the reference implementation's `parameters` bitmask with independent
//! booleans (§9); `use_sum` is dropped entirely, it was declared but never read in the source.

/// Independent feature toggles validated at `open` time.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Features {
    /// Maintain the secondary bitmap index log (§4.5).
    pub use_index: bool,
    /// Track per-page `minKey`/`maxKey`/`minData`/`maxData` (§4.2, §4.4).
    pub use_max_min: bool,
    /// Maintain a per-record data bitmap on each page (§4.1, §4.7).
    pub use_bitmap: bool,
}

/// Width of the data-value bitmap. `bitmapSize` in the original configuration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BitmapWidth {
    #[default]
    None,
    Bits16,
    Bits64,
}

impl BitmapWidth {
    pub(crate) fn byte_len(self) -> usize {
        match self {
            BitmapWidth::None => 0,
            BitmapWidth::Bits16 => 2,
            BitmapWidth::Bits64 => 8,
        }
    }
}

/// Configuration consumed by [`crate::Engine::open`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Fixed width of a key, in bytes.
    pub key_size: usize,
    /// Fixed width of a data value, in bytes.
    pub data_size: usize,
    /// Data-value bitmap width; must be `BitmapWidth::None` unless `features.use_bitmap`.
    pub bitmap_width: BitmapWidth,
    /// First physical page (inclusive) of the data ring.
    pub start_page: u32,
    /// Last physical page (exclusive) of the data ring.
    pub end_page: u32,
    /// First physical page (inclusive) of the index ring, when `features.use_index`.
    pub start_index_page: u32,
    /// Last physical page (exclusive) of the index ring, when `features.use_index`.
    pub end_index_page: u32,
    /// Erase granularity, in pages, for both rings.
    pub erase_size_in_pages: u32,
    pub features: Features,
}

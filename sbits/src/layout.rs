//! Byte-offset geometry of data and index pages, computed once at `Engine::open` time.
//!
//! Nothing downstream of this module is allowed to compute a header offset from scratch; every
//! accessor on [`crate::page::DataPage`]/[`crate::page::DataPageMut`] and
//! [`crate::page::IndexPage`]/[`crate::page::IndexPageMut`] goes through a `Layout`.

use crate::error::ConfigError;

pub(crate) const DATA_PAGE_ID_OFFSET: usize = 0;
pub(crate) const DATA_COUNT_OFFSET: usize = 4;
pub(crate) const DATA_BITMAP_OFFSET: usize = 6;

pub(crate) const IDX_PAGE_ID_OFFSET: usize = 0;
pub(crate) const IDX_COUNT_OFFSET: usize = 4;
pub(crate) const IDX_FIRST_DATA_PAGE_ID_OFFSET: usize = 8;
pub(crate) const IDX_HEADER_SIZE: usize = 16;

/// Geometry of a data page: header layout, record stride, and capacity.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Layout {
    pub key_size: usize,
    pub data_size: usize,
    pub bitmap_size: usize,
    pub use_max_min: bool,
    pub page_size: usize,
    pub header_size: usize,
    pub record_size: usize,
    pub max_records_per_page: usize,
}

impl Layout {
    pub fn new(
        page_size: usize,
        key_size: usize,
        data_size: usize,
        bitmap_size: usize,
        use_max_min: bool,
    ) -> Result<Self, ConfigError> {
        let header_size = DATA_BITMAP_OFFSET
            + bitmap_size
            + if use_max_min {
                2 * key_size + 2 * data_size
            } else {
                0
            };
        let record_size = key_size + data_size;
        if record_size == 0 || header_size >= page_size {
            return Err(ConfigError::RecordTooLarge);
        }
        let max_records_per_page = (page_size - header_size) / record_size;
        if max_records_per_page == 0 {
            return Err(ConfigError::RecordTooLarge);
        }
        Ok(Layout {
            key_size,
            data_size,
            bitmap_size,
            use_max_min,
            page_size,
            header_size,
            record_size,
            max_records_per_page,
        })
    }

    pub const fn min_key_offset(&self) -> usize {
        DATA_BITMAP_OFFSET + self.bitmap_size
    }
    pub const fn max_key_offset(&self) -> usize {
        self.min_key_offset() + self.key_size
    }
    pub const fn min_data_offset(&self) -> usize {
        self.max_key_offset() + self.key_size
    }
    pub const fn max_data_offset(&self) -> usize {
        self.min_data_offset() + self.data_size
    }

    pub const fn record_offset(&self, index: usize) -> usize {
        self.header_size + index * self.record_size
    }
}

/// Geometry of an index page: fixed 16-byte header, then packed bitmap entries.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexLayout {
    pub bitmap_size: usize,
    pub page_size: usize,
    pub max_records_per_page: usize,
}

impl IndexLayout {
    pub fn new(page_size: usize, bitmap_size: usize) -> Result<Self, ConfigError> {
        if bitmap_size == 0 || IDX_HEADER_SIZE >= page_size {
            return Err(ConfigError::RecordTooLarge);
        }
        let max_records_per_page = (page_size - IDX_HEADER_SIZE) / bitmap_size;
        if max_records_per_page == 0 {
            return Err(ConfigError::RecordTooLarge);
        }
        Ok(IndexLayout {
            bitmap_size,
            page_size,
            max_records_per_page,
        })
    }

    pub const fn entry_offset(&self, index: usize) -> usize {
        IDX_HEADER_SIZE + index * self.bitmap_size
    }
}

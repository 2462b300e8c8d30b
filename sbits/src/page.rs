//! Structured views over a page buffer.
//!
//! The engine's buffer-pool slots are plain `Vec<u8>`; every place that needs to read or write a
//! header field or record goes through one of these views instead of indexing the buffer
//! directly (§9: no raw pointer arithmetic into a byte buffer for heterogeneous fields).

use crate::layout::{IndexLayout, Layout, DATA_BITMAP_OFFSET, DATA_COUNT_OFFSET,
    DATA_PAGE_ID_OFFSET, IDX_COUNT_OFFSET, IDX_FIRST_DATA_PAGE_ID_OFFSET, IDX_PAGE_ID_OFFSET};

/// Read-only view of a data page.
pub(crate) struct DataPage<'a> {
    buf: &'a [u8],
    layout: &'a Layout,
}

impl<'a> DataPage<'a> {
    pub fn new(buf: &'a [u8], layout: &'a Layout) -> Self {
        debug_assert!(buf.len() >= layout.page_size);
        DataPage { buf, layout }
    }

    pub fn page_id(&self) -> u32 {
        u32::from_le_bytes(self.buf[DATA_PAGE_ID_OFFSET..DATA_PAGE_ID_OFFSET + 4].try_into().unwrap())
    }

    pub fn count(&self) -> usize {
        u16::from_le_bytes(self.buf[DATA_COUNT_OFFSET..DATA_COUNT_OFFSET + 2].try_into().unwrap())
            as usize
    }

    pub fn bitmap(&self) -> &[u8] {
        &self.buf[DATA_BITMAP_OFFSET..DATA_BITMAP_OFFSET + self.layout.bitmap_size]
    }

    pub fn min_key(&self) -> &'a [u8] {
        let off = self.layout.min_key_offset();
        &self.buf[off..off + self.layout.key_size]
    }

    pub fn max_key(&self) -> &'a [u8] {
        let off = self.layout.max_key_offset();
        &self.buf[off..off + self.layout.key_size]
    }

    pub fn min_data(&self) -> &'a [u8] {
        let off = self.layout.min_data_offset();
        &self.buf[off..off + self.layout.data_size]
    }

    pub fn max_data(&self) -> &'a [u8] {
        let off = self.layout.max_data_offset();
        &self.buf[off..off + self.layout.data_size]
    }

    /// Key and data slices of the record at in-page index `i`.
    pub fn record(&self, i: usize) -> (&'a [u8], &'a [u8]) {
        let off = self.layout.record_offset(i);
        let key = &self.buf[off..off + self.layout.key_size];
        let data = &self.buf[off + self.layout.key_size..off + self.layout.record_size];
        (key, data)
    }
}

/// Mutable view of a data page, used while building the write-buffer page.
pub(crate) struct DataPageMut<'a> {
    buf: &'a mut [u8],
    layout: &'a Layout,
}

impl<'a> DataPageMut<'a> {
    pub fn new(buf: &'a mut [u8], layout: &'a Layout) -> Self {
        debug_assert!(buf.len() >= layout.page_size);
        DataPageMut { buf, layout }
    }

    /// Resets a write-buffer slot to a fresh, empty page: zeroed payload, and (when max-min
    /// tracking is enabled) `minKey`/`minData` filled with `0xFF` so the first record inserted
    /// always compares as a new minimum (§9 "fresh page" constructor).
    pub fn fresh(buf: &mut [u8], layout: &Layout) {
        buf[..layout.page_size].fill(0);
        if layout.use_max_min {
            let key_off = layout.min_key_offset();
            buf[key_off..key_off + layout.key_size].fill(0xFF);
            let data_off = layout.min_data_offset();
            buf[data_off..data_off + layout.data_size].fill(0xFF);
        }
    }

    pub fn set_page_id(&mut self, id: u32) {
        self.buf[DATA_PAGE_ID_OFFSET..DATA_PAGE_ID_OFFSET + 4].copy_from_slice(&id.to_le_bytes());
    }

    pub fn count(&self) -> usize {
        u16::from_le_bytes(self.buf[DATA_COUNT_OFFSET..DATA_COUNT_OFFSET + 2].try_into().unwrap())
            as usize
    }

    fn set_count(&mut self, count: usize) {
        self.buf[DATA_COUNT_OFFSET..DATA_COUNT_OFFSET + 2]
            .copy_from_slice(&(count as u16).to_le_bytes());
    }

    pub fn bitmap_mut(&mut self) -> &mut [u8] {
        &mut self.buf[DATA_BITMAP_OFFSET..DATA_BITMAP_OFFSET + self.layout.bitmap_size]
    }

    pub fn min_key(&self) -> &[u8] {
        let off = self.layout.min_key_offset();
        &self.buf[off..off + self.layout.key_size]
    }
    pub fn max_data(&self) -> &[u8] {
        let off = self.layout.max_data_offset();
        &self.buf[off..off + self.layout.data_size]
    }
    pub fn min_data(&self) -> &[u8] {
        let off = self.layout.min_data_offset();
        &self.buf[off..off + self.layout.data_size]
    }

    pub fn set_min_key(&mut self, key: &[u8]) {
        let off = self.layout.min_key_offset();
        self.buf[off..off + self.layout.key_size].copy_from_slice(key);
    }
    pub fn set_max_key(&mut self, key: &[u8]) {
        let off = self.layout.max_key_offset();
        self.buf[off..off + self.layout.key_size].copy_from_slice(key);
    }
    pub fn set_min_data(&mut self, data: &[u8]) {
        let off = self.layout.min_data_offset();
        self.buf[off..off + self.layout.data_size].copy_from_slice(data);
    }
    pub fn set_max_data(&mut self, data: &[u8]) {
        let off = self.layout.max_data_offset();
        self.buf[off..off + self.layout.data_size].copy_from_slice(data);
    }

    /// Appends `(key, data)` as the next record and bumps `count`. Caller must have checked
    /// there's room (`count() < layout.max_records_per_page`).
    pub fn push_record(&mut self, key: &[u8], data: &[u8]) {
        let count = self.count();
        let off = self.layout.record_offset(count);
        self.buf[off..off + self.layout.key_size].copy_from_slice(key);
        self.buf[off + self.layout.key_size..off + self.layout.record_size]
            .copy_from_slice(data);
        self.set_count(count + 1);
    }

    pub fn as_data_page(&'a self) -> DataPage<'a> {
        DataPage::new(self.buf, self.layout)
    }
}

/// Read-only view of an index page.
pub(crate) struct IndexPage<'a> {
    buf: &'a [u8],
    layout: &'a IndexLayout,
}

impl<'a> IndexPage<'a> {
    pub fn new(buf: &'a [u8], layout: &'a IndexLayout) -> Self {
        debug_assert!(buf.len() >= layout.page_size);
        IndexPage { buf, layout }
    }

    pub fn page_id(&self) -> u32 {
        u32::from_le_bytes(self.buf[IDX_PAGE_ID_OFFSET..IDX_PAGE_ID_OFFSET + 4].try_into().unwrap())
    }

    pub fn count(&self) -> usize {
        u16::from_le_bytes(self.buf[IDX_COUNT_OFFSET..IDX_COUNT_OFFSET + 2].try_into().unwrap())
            as usize
    }

    pub fn first_data_page_id(&self) -> u32 {
        u32::from_le_bytes(
            self.buf[IDX_FIRST_DATA_PAGE_ID_OFFSET..IDX_FIRST_DATA_PAGE_ID_OFFSET + 4]
                .try_into()
                .unwrap(),
        )
    }

    pub fn entry(&self, i: usize) -> &'a [u8] {
        let off = self.layout.entry_offset(i);
        &self.buf[off..off + self.layout.bitmap_size]
    }
}

/// Mutable view of an index page, used while building the index write-buffer page.
pub(crate) struct IndexPageMut<'a> {
    buf: &'a mut [u8],
    layout: &'a IndexLayout,
}

impl<'a> IndexPageMut<'a> {
    pub fn new(buf: &'a mut [u8], layout: &'a IndexLayout) -> Self {
        debug_assert!(buf.len() >= layout.page_size);
        IndexPageMut { buf, layout }
    }

    pub fn fresh(buf: &mut [u8], layout: &IndexLayout) {
        buf[..layout.page_size].fill(0);
    }

    pub fn set_page_id(&mut self, id: u32) {
        self.buf[IDX_PAGE_ID_OFFSET..IDX_PAGE_ID_OFFSET + 4].copy_from_slice(&id.to_le_bytes());
    }

    pub fn count(&self) -> usize {
        u16::from_le_bytes(self.buf[IDX_COUNT_OFFSET..IDX_COUNT_OFFSET + 2].try_into().unwrap())
            as usize
    }

    fn set_count(&mut self, count: usize) {
        self.buf[IDX_COUNT_OFFSET..IDX_COUNT_OFFSET + 2]
            .copy_from_slice(&(count as u16).to_le_bytes());
    }

    pub fn set_first_data_page_id(&mut self, id: u32) {
        self.buf[IDX_FIRST_DATA_PAGE_ID_OFFSET..IDX_FIRST_DATA_PAGE_ID_OFFSET + 4]
            .copy_from_slice(&id.to_le_bytes());
    }

    pub fn push_entry(&mut self, bitmap: &[u8]) {
        let count = self.count();
        let off = self.layout.entry_offset(count);
        self.buf[off..off + self.layout.bitmap_size].copy_from_slice(bitmap);
        self.set_count(count + 1);
    }
}

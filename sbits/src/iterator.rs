//! The range-scan iterator (§4.6): walks live data pages in key order, pruning whole pages
//! against the bitmap index when one is configured, and applies the caller's key/data bounds to
//! each surviving record.

use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;

use sbits_device::{PageDevice, PhysicalPage};

use crate::bitmap::{build_range_bitmap, overlaps};
use crate::buffer::BufferPool;
use crate::capability::Capabilities;
use crate::error::Error;
use crate::layout::{IndexLayout, Layout};
use crate::page::{DataPage, IndexPage};
use crate::Stats;

/// One matching `(key, data)` pair yielded by [`Iter`]. Owned rather than borrowed from the
/// iterator's scratch buffers, since `Iterator::Item` can't carry a per-call lifetime on stable.
#[derive(Debug, Clone)]
pub struct Record {
    pub key: Vec<u8>,
    pub data: Vec<u8>,
}

/// Snapshot of the data ring's live-page geometry, taken once when the iterator is built.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DataRingView {
    pub start_page: u32,
    pub capacity: u32,
    pub first_data_page: u32,
    pub first_data_page_id: u32,
    pub live_pages: u32,
}

/// Snapshot of the index ring's live-page geometry, when the engine maintains one.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexRingView {
    pub start_page: u32,
    pub capacity: u32,
    pub first_page: u32,
    pub live_pages: u32,
}

pub struct Iter<'a, D: PageDevice, C: Capabilities> {
    device: &'a mut D,
    caps: &'a C,
    buffers: &'a mut BufferPool,
    stats: &'a mut Stats,
    layout: Layout,
    index_layout: Option<IndexLayout>,
    data: DataRingView,
    index: Option<IndexRingView>,

    min_key: Option<Vec<u8>>,
    max_key: Option<Vec<u8>>,
    min_data: Option<Vec<u8>>,
    max_data: Option<Vec<u8>>,
    query_bitmap: Option<Vec<u8>>,

    data_cursor: u32,
    data_scratch: Vec<u8>,
    data_loaded: bool,
    record_cursor: usize,

    index_cursor: u32,

    done: bool,
}

#[allow(clippy::too_many_arguments)]
impl<'a, D: PageDevice, C: Capabilities> Iter<'a, D, C> {
    pub(crate) fn new(
        device: &'a mut D,
        caps: &'a C,
        buffers: &'a mut BufferPool,
        stats: &'a mut Stats,
        layout: Layout,
        index_layout: Option<IndexLayout>,
        data: DataRingView,
        index: Option<IndexRingView>,
        min_key: Option<Vec<u8>>,
        max_key: Option<Vec<u8>>,
        min_data: Option<Vec<u8>>,
        max_data: Option<Vec<u8>>,
    ) -> Self {
        let query_bitmap = if index_layout.is_some() && (min_data.is_some() || max_data.is_some())
        {
            Some(build_range_bitmap(
                caps,
                index_layout.map(|l| l.bitmap_size).unwrap_or(0),
                min_data.as_deref(),
                max_data.as_deref(),
            ))
        } else {
            None
        };
        let data_page_size = layout.page_size;
        Iter {
            device,
            caps,
            buffers,
            stats,
            layout,
            index_layout,
            data,
            index,
            min_key,
            max_key,
            min_data,
            max_data,
            query_bitmap,
            data_cursor: 0,
            data_scratch: vec![0u8; data_page_size],
            data_loaded: false,
            record_cursor: 0,
            index_cursor: 0,
            done: false,
        }
    }

    fn physical_data_page(&self, logical: u32) -> u32 {
        let offset = self.data.first_data_page - self.data.start_page;
        self.data.start_page + (offset + logical) % self.data.capacity
    }

    fn physical_index_page(&self, logical: u32, view: IndexRingView) -> u32 {
        let offset = view.first_page - view.start_page;
        view.start_page + (offset + logical) % view.capacity
    }

    /// Finds the index entry summarizing data page `data_page_logical` and tests it against the
    /// query bitmap. Returns `true` (no verdict, must read the page) when no index or no data
    /// bounds are in play.
    fn bitmap_entry_overlaps(&mut self, data_page_logical: u32) -> Result<bool, Error<D>> {
        let index = match self.index {
            Some(v) => v,
            None => return Ok(true),
        };
        let index_layout = match self.index_layout {
            Some(l) => l,
            None => return Ok(true),
        };
        let query = match &self.query_bitmap {
            Some(q) => q.clone(),
            None => return Ok(true),
        };
        let target_page_id = self.data.first_data_page_id + data_page_logical;

        loop {
            if self.index_cursor >= index.live_pages {
                return Ok(true);
            }
            let physical = self.physical_index_page(self.index_cursor, index);
            if self.buffers.index_read_hit(physical) {
                self.stats.buffer_hits += 1;
            } else {
                let buf = self
                    .buffers
                    .index_read
                    .as_mut()
                    .expect("index buffer present when index_layout is");
                self.device
                    .read(PhysicalPage::new(physical), buf)
                    .map_err(Error::Device)?;
                self.buffers.mark_index_read(physical);
                self.stats.num_idx_reads += 1;
            }
            let buf = self
                .buffers
                .index_read
                .as_ref()
                .expect("index buffer present when index_layout is");
            let page = IndexPage::new(buf, &index_layout);
            let base_id = page.first_data_page_id();
            let count = page.count() as u32;
            if target_page_id < base_id {
                return Ok(true);
            }
            if target_page_id < base_id + count {
                let entry = page.entry((target_page_id - base_id) as usize);
                return Ok(overlaps(entry, &query));
            }
            self.index_cursor += 1;
        }
    }

    fn key_in_bounds(&self, key: &[u8]) -> bool {
        if let Some(min) = &self.min_key {
            if self.caps.compare_key(key, min) == Ordering::Less {
                return false;
            }
        }
        if let Some(max) = &self.max_key {
            if self.caps.compare_key(key, max) == Ordering::Greater {
                return false;
            }
        }
        true
    }

    fn data_in_bounds(&self, data: &[u8]) -> bool {
        if let Some(min) = &self.min_data {
            if self.caps.compare_data(data, min) == Ordering::Less {
                return false;
            }
        }
        if let Some(max) = &self.max_data {
            if self.caps.compare_data(data, max) == Ordering::Greater {
                return false;
            }
        }
        true
    }

    fn page_may_contain_bounds(&self, page: &DataPage) -> bool {
        if let Some(max) = &self.max_key {
            if self.caps.compare_key(page.min_key(), max) == Ordering::Greater {
                return false;
            }
        }
        if let Some(min) = &self.min_key {
            if self.caps.compare_key(page.max_key(), min) == Ordering::Less {
                return false;
            }
        }
        true
    }
}

impl<'a, D: PageDevice, C: Capabilities> Iterator for Iter<'a, D, C> {
    type Item = Result<Record, Error<D>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if self.data_cursor >= self.data.live_pages {
                self.done = true;
                return None;
            }

            if !self.data_loaded {
                match self.bitmap_entry_overlaps(self.data_cursor) {
                    Ok(true) => {}
                    Ok(false) => {
                        self.data_cursor += 1;
                        continue;
                    }
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
                let physical = self.physical_data_page(self.data_cursor);
                if let Err(e) = self
                    .device
                    .read(PhysicalPage::new(physical), &mut self.data_scratch)
                    .map_err(Error::Device)
                {
                    self.done = true;
                    return Some(Err(e));
                }
                if self.layout.use_max_min {
                    let page = DataPage::new(&self.data_scratch, &self.layout);
                    if !self.page_may_contain_bounds(&page) {
                        self.data_cursor += 1;
                        continue;
                    }
                }
                self.data_loaded = true;
                self.record_cursor = 0;
            }

            let page = DataPage::new(&self.data_scratch, &self.layout);
            if self.record_cursor >= page.count() {
                self.data_loaded = false;
                self.data_cursor += 1;
                continue;
            }
            let (key, data) = page.record(self.record_cursor);
            self.record_cursor += 1;
            if self.key_in_bounds(key) && self.data_in_bounds(data) {
                return Some(Ok(Record {
                    key: key.to_vec(),
                    data: data.to_vec(),
                }));
            }
        }
    }
}

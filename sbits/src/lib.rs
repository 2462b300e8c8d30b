//! An embedded, append-only, block-oriented storage engine for fixed-width `(key, data)`
//! records inserted in non-decreasing key order onto erase-before-write flash media.
//!
//! The engine is parameterized over a [`sbits_device::PageDevice`] for physical storage and a
//! [`Capabilities`] implementation supplying key/data ordering, data-value bitmap bucketing, and
//! (optionally) a key-to-integer projection used to speed up lookups.

#![no_std]

extern crate alloc;

#[macro_use]
mod fmt;

mod bitmap;
mod buffer;
pub mod capability;
mod config;
mod data_log;
pub mod error;
mod index_log;
mod iterator;
mod layout;
mod locator;
mod page;
pub mod stats;

use alloc::vec::Vec;
use core::cmp::Ordering;

use sbits_device::PageDevice;

pub use capability::Capabilities;
pub use config::{BitmapWidth, EngineConfig, Features};
pub use error::{ConfigError, Error, ErrorKind};
pub use iterator::{Iter, Record};
pub use stats::Stats;

use buffer::BufferPool;
use data_log::DataLog;
use index_log::IndexLog;
use iterator::{DataRingView, IndexRingView};
use layout::{IndexLayout, Layout};
use locator::Located;
use page::{DataPage, DataPageMut, IndexPageMut};

const MIN_RING_BLOCKS: u32 = 2;

/// An open storage engine bound to a device and a set of record capabilities.
///
/// All engine state lives here; nothing about the engine's layout or internals is exposed
/// through the type, so a caller only ever sees the operations below.
pub struct Engine<D: PageDevice, C: Capabilities> {
    device: D,
    caps: C,
    layout: Layout,
    index_layout: Option<IndexLayout>,
    features: Features,
    data_log: DataLog,
    index_log: Option<IndexLog>,
    buffers: BufferPool,
    stats: Stats,
    last_key: Option<Vec<u8>>,
}

impl<D: PageDevice, C: Capabilities> Engine<D, C> {
    /// Validates `config` against `D`'s page geometry and opens a fresh engine over an erased
    /// device. There is no recovery path: the data and index rings are assumed empty (§9 Open
    /// Question — recovery/mount-time log replay is out of scope; see `DESIGN.md`).
    pub fn open(device: D, caps: C, config: EngineConfig) -> Result<Self, Error<D>> {
        if config.features.use_index && config.bitmap_width == BitmapWidth::None {
            return Err(ConfigError::IndexRequiresBitmapWidth.into());
        }
        if config.features.use_bitmap && config.bitmap_width == BitmapWidth::None {
            return Err(ConfigError::BitmapFeatureRequiresWidth.into());
        }

        let layout = Layout::new(
            D::PAGE_SIZE,
            config.key_size,
            config.data_size,
            config.bitmap_width.byte_len(),
            config.features.use_max_min,
        )?;

        let data_pages = config.end_page - config.start_page;
        if data_pages < MIN_RING_BLOCKS * config.erase_size_in_pages {
            return Err(ConfigError::RingTooSmall {
                ring: "data",
                needed: MIN_RING_BLOCKS * config.erase_size_in_pages,
                available: data_pages,
            }
            .into());
        }

        let (index_layout, index_log) = if config.features.use_index {
            let index_layout = IndexLayout::new(D::PAGE_SIZE, config.bitmap_width.byte_len())?;
            let index_pages = config.end_index_page - config.start_index_page;
            if index_pages < MIN_RING_BLOCKS * config.erase_size_in_pages {
                return Err(ConfigError::RingTooSmall {
                    ring: "index",
                    needed: MIN_RING_BLOCKS * config.erase_size_in_pages,
                    available: index_pages,
                }
                .into());
            }
            let log = IndexLog::new(
                config.start_index_page,
                config.end_index_page,
                config.erase_size_in_pages,
            );
            (Some(index_layout), Some(log))
        } else {
            (None, None)
        };

        let buffers = BufferPool::new(&layout, index_layout.as_ref());
        let data_log = DataLog::new(config.start_page, config.end_page, config.erase_size_in_pages);

        let mut engine = Engine {
            device,
            caps,
            layout,
            index_layout,
            features: config.features,
            data_log,
            index_log,
            buffers,
            stats: Stats::default(),
            last_key: None,
        };
        DataPageMut::fresh(&mut engine.buffers.data_write, &engine.layout);
        if let Some(index_layout) = engine.index_layout {
            if let Some(buf) = engine.buffers.index_write.as_mut() {
                IndexPageMut::fresh(buf, &index_layout);
            }
        }
        Ok(engine)
    }

    /// Inserts `(key, data)`. `key` must compare greater than or equal to every previously
    /// inserted key (I1); violating this returns [`Error::OutOfOrder`] without mutating state.
    pub fn put(&mut self, key: &[u8], data: &[u8]) -> Result<(), Error<D>> {
        if let Some(last) = &self.last_key {
            if self.caps.compare_key(key, last) == Ordering::Less {
                return Err(Error::OutOfOrder);
            }
        }

        if let (Some(last), Some(target)) =
            (self.last_key.as_deref().and_then(|k| self.caps.key_as_i64(k)), self.caps.key_as_i64(key))
        {
            let n = self.data_log.live_blocks_for_estimate().max(1);
            self.data_log.observe_key_diff(target - last, n);
        }

        let first_in_page = {
            let page = DataPageMut::new(&mut self.buffers.data_write, &self.layout);
            page.count() == 0
        };

        {
            let mut page = DataPageMut::new(&mut self.buffers.data_write, &self.layout);
            page.push_record(key, data);
        }

        if self.features.use_max_min {
            let mut page = DataPageMut::new(&mut self.buffers.data_write, &self.layout);
            if first_in_page {
                page.set_min_key(key);
                page.set_max_key(key);
                page.set_min_data(data);
                page.set_max_data(data);
            } else {
                if self.caps.compare_key(key, page.min_key()) == Ordering::Less {
                    page.set_min_key(key);
                }
                if self.caps.compare_key(key, page.as_data_page().max_key()) == Ordering::Greater {
                    page.set_max_key(key);
                }
                if self.caps.compare_data(data, page.min_data()) == Ordering::Less {
                    page.set_min_data(data);
                }
                if self.caps.compare_data(data, page.max_data()) == Ordering::Greater {
                    page.set_max_data(data);
                }
            }
        }

        if self.index_layout.is_some() {
            let mut page = DataPageMut::new(&mut self.buffers.data_write, &self.layout);
            self.caps.update_bitmap(data, page.bitmap_mut());
        }

        self.last_key = Some(key.to_vec());

        if DataPageMut::new(&mut self.buffers.data_write, &self.layout).count()
            >= self.layout.max_records_per_page
        {
            self.flush_data_page()?;
        }

        Ok(())
    }

    fn flush_data_page(&mut self) -> Result<(), Error<D>> {
        let max_records = self.layout.max_records_per_page as u32;
        let bitmap = if self.index_layout.is_some() {
            Some(
                DataPage::new(&self.buffers.data_write, &self.layout)
                    .bitmap()
                    .to_vec(),
            )
        } else {
            None
        };

        let page_id = self
            .data_log
            .write_page(&mut self.device, &mut self.buffers.data_write, max_records)
            .map_err(Error::Device)?;
        self.stats.num_writes += 1;
        self.buffers.invalidate_data_read();
        DataPageMut::fresh(&mut self.buffers.data_write, &self.layout);

        if let (Some(bitmap), Some(index_layout)) = (bitmap, self.index_layout) {
            let buf = self
                .buffers
                .index_write
                .as_mut()
                .expect("index buffer present when index_layout is");
            let first_entry = page::IndexPage::new(&buf[..], &index_layout).count() == 0;
            let mut entry_page = IndexPageMut::new(buf, &index_layout);
            if first_entry {
                entry_page.set_first_data_page_id(page_id);
            }
            entry_page.push_entry(&bitmap);
            let count = entry_page.count();
            if count >= index_layout.max_records_per_page {
                self.flush_index_page()?;
            }
        }

        Ok(())
    }

    fn flush_index_page(&mut self) -> Result<(), Error<D>> {
        let index_layout = match self.index_layout {
            Some(l) => l,
            None => return Ok(()),
        };
        let log = self.index_log.as_mut().expect("index log present when index_layout is");
        let buf = self.buffers.index_write.as_mut().expect("index buffer present");
        if page::IndexPage::new(buf, &index_layout).count() == 0 {
            return Ok(());
        }
        log.write_page(&mut self.device, buf).map_err(Error::Device)?;
        self.stats.num_idx_writes += 1;
        self.buffers.invalidate_index_read();
        IndexPageMut::fresh(buf, &index_layout);
        Ok(())
    }

    /// Forces whatever partial data and index pages are currently buffered out to the device,
    /// so they become visible to [`Engine::get`]/[`Engine::iter`] and durable against power loss.
    ///
    /// Flushing the data page first and the index page second (rather than the reverse) avoids
    /// a gap where a completed data page's bitmap entry exists only in a since-cleared index
    /// write buffer: if the index buffer happened to be full right when the data page was
    /// flushed, `flush_data_page` has already rotated it out before this call ever runs.
    pub fn flush(&mut self) -> Result<(), Error<D>> {
        if DataPage::new(&self.buffers.data_write, &self.layout).count() > 0 {
            self.flush_data_page()?;
        }
        self.flush_index_page()?;
        Ok(())
    }

    /// Looks up `key` among already-flushed pages, copying its data into `out` (which must be at
    /// least `data_size` bytes) and returning `true` if found.
    ///
    /// Records still sitting in the unflushed write buffer are not visible here (§5): call
    /// [`Engine::flush`] first if a just-`put` record needs to be read back immediately.
    pub fn get(&mut self, key: &[u8], out: &mut [u8]) -> Result<bool, Error<D>> {
        let located = locator::locate(
            &mut self.device,
            &self.data_log,
            &self.layout,
            &self.caps,
            &mut self.buffers,
            &mut self.stats,
            key,
        )
        .map_err(Error::Device)?;
        self.stats.num_reads += 1;

        match located {
            Located::BeforeStart | Located::AfterEnd => Ok(false),
            Located::Page(_) => {
                let page = DataPage::new(&self.buffers.data_read, &self.layout);
                for i in 0..page.count() {
                    let (k, d) = page.record(i);
                    if self.caps.compare_key(k, key) == Ordering::Equal {
                        out[..d.len()].copy_from_slice(d);
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Iterates flushed records whose key falls in `[min_key, max_key]` and whose data value
    /// falls in `[min_data, max_data]` (any bound may be `None`), in key order.
    ///
    /// Only records already written to the device are visible; call [`Engine::flush`] first to
    /// include records still sitting in the write buffer.
    pub fn iter(
        &mut self,
        min_key: Option<&[u8]>,
        max_key: Option<&[u8]>,
        min_data: Option<&[u8]>,
        max_data: Option<&[u8]>,
    ) -> Iter<'_, D, C> {
        let data = DataRingView {
            start_page: self.data_log.start_page,
            capacity: self.data_log.capacity_pages(),
            first_data_page: self.data_log.first_data_page,
            first_data_page_id: self.data_log.first_data_page_id,
            live_pages: self.data_log.live_page_count(),
        };
        let index = self.index_log.as_ref().map(|log| IndexRingView {
            start_page: log.start_page,
            capacity: log.end_page - log.start_page,
            first_page: log.start_page + log.first_page_offset,
            live_pages: if log.wrapped {
                log.end_page - log.start_page
            } else {
                log.next_write_offset
            },
        });
        Iter::new(
            &mut self.device,
            &self.caps,
            &mut self.buffers,
            &mut self.stats,
            self.layout,
            self.index_layout,
            data,
            index,
            min_key.map(|k| k.to_vec()),
            max_key.map(|k| k.to_vec()),
            min_data.map(|d| d.to_vec()),
            max_data.map(|d| d.to_vec()),
        )
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbits_device::test::VirtualPageDevice;

    const PAGE_SIZE: usize = 64;
    const PAGE_COUNT: usize = 32;

    /// `i64` keys, little-endian; single-byte data values bucketed `value % 16` into a 16-bit
    /// bitmap.
    struct IntegerCapabilities;

    impl Capabilities for IntegerCapabilities {
        fn compare_key(&self, a: &[u8], b: &[u8]) -> Ordering {
            i64::from_le_bytes(a.try_into().unwrap()).cmp(&i64::from_le_bytes(b.try_into().unwrap()))
        }

        fn compare_data(&self, a: &[u8], b: &[u8]) -> Ordering {
            a[0].cmp(&b[0])
        }

        fn update_bitmap(&self, data: &[u8], bitmap: &mut [u8]) {
            let bucket = (data[0] % 16) as usize;
            bitmap[bucket / 8] |= 1 << (bucket % 8);
        }

        fn in_bitmap(&self, data: &[u8], bitmap: &[u8]) -> bool {
            let bucket = (data[0] % 16) as usize;
            bitmap[bucket / 8] & (1 << (bucket % 8)) != 0
        }

        fn key_as_i64(&self, key: &[u8]) -> Option<i64> {
            Some(i64::from_le_bytes(key.try_into().ok()?))
        }
    }

    fn open_engine(
        use_index: bool,
    ) -> Engine<VirtualPageDevice<PAGE_SIZE, PAGE_COUNT>, IntegerCapabilities> {
        open_engine_with(use_index, true)
    }

    fn open_engine_with(
        use_index: bool,
        use_max_min: bool,
    ) -> Engine<VirtualPageDevice<PAGE_SIZE, PAGE_COUNT>, IntegerCapabilities> {
        let device = VirtualPageDevice::<PAGE_SIZE, PAGE_COUNT>::new();
        let config = EngineConfig {
            key_size: 8,
            data_size: 1,
            bitmap_width: BitmapWidth::Bits16,
            start_page: 0,
            end_page: 24,
            start_index_page: 24,
            end_index_page: 32,
            erase_size_in_pages: 4,
            features: Features {
                use_index,
                use_max_min,
                use_bitmap: true,
            },
        };
        Engine::open(device, IntegerCapabilities, config).unwrap()
    }

    #[test]
    fn put_then_get_round_trips_after_flush() {
        let mut engine = open_engine(false);
        for i in 0..50i64 {
            engine.put(&i.to_le_bytes(), &[(i % 251) as u8]).unwrap();
        }
        engine.flush().unwrap();

        for i in 0..50i64 {
            let mut out = [0u8];
            assert!(engine.get(&i.to_le_bytes(), &mut out).unwrap());
            assert_eq!(out[0], (i % 251) as u8);
        }
    }

    #[test]
    fn get_does_not_see_unflushed_write_buffer() {
        let mut engine = open_engine(false);
        engine.put(&7i64.to_le_bytes(), &[42]).unwrap();
        let mut out = [0u8];
        assert!(!engine.get(&7i64.to_le_bytes(), &mut out).unwrap());

        engine.flush().unwrap();
        assert!(engine.get(&7i64.to_le_bytes(), &mut out).unwrap());
        assert_eq!(out[0], 42);
    }

    #[test]
    fn get_missing_key_returns_false() {
        let mut engine = open_engine(false);
        for i in 0..10i64 {
            engine.put(&i.to_le_bytes(), &[i as u8]).unwrap();
        }
        engine.flush().unwrap();
        let mut out = [0u8];
        assert!(!engine.get(&999i64.to_le_bytes(), &mut out).unwrap());
    }

    #[test]
    fn out_of_order_insert_is_rejected() {
        let mut engine = open_engine(false);
        engine.put(&10i64.to_le_bytes(), &[0]).unwrap();
        let err = engine.put(&5i64.to_le_bytes(), &[0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfOrder);
    }

    #[test]
    fn range_iteration_respects_key_bounds() {
        let mut engine = open_engine(false);
        for i in 0..60i64 {
            engine.put(&i.to_le_bytes(), &[(i % 200) as u8]).unwrap();
        }
        engine.flush().unwrap();

        let min = 10i64.to_le_bytes();
        let max = 20i64.to_le_bytes();
        let keys: alloc::vec::Vec<i64> = engine
            .iter(Some(&min), Some(&max), None, None)
            .map(|r| {
                let r = r.unwrap();
                i64::from_le_bytes(r.key.as_slice().try_into().unwrap())
            })
            .collect();
        assert_eq!(keys, (10..=20).collect::<alloc::vec::Vec<i64>>());
    }

    #[test]
    fn range_iteration_with_index_prunes_by_data_bitmap() {
        let mut engine = open_engine(true);
        for i in 0..40i64 {
            let bucket = (i % 16) as u8;
            engine.put(&i.to_le_bytes(), &[bucket]).unwrap();
        }
        engine.flush().unwrap();

        let target = [3u8];
        let matches: alloc::vec::Vec<_> = engine
            .iter(None, None, Some(&target), Some(&target))
            .map(|r| r.unwrap())
            .collect();
        assert!(!matches.is_empty());
        assert!(matches.iter().all(|r| r.data[0] == 3));
    }

    #[test]
    fn ring_reclamation_keeps_oldest_records_out_of_reach() {
        let mut engine = open_engine(false);
        for i in 0..400i64 {
            engine.put(&i.to_le_bytes(), &[(i % 200) as u8]).unwrap();
        }
        engine.flush().unwrap();

        let mut out = [0u8];
        assert!(!engine.get(&0i64.to_le_bytes(), &mut out).unwrap());
        assert!(engine.get(&399i64.to_le_bytes(), &mut out).unwrap());
    }

    #[test]
    fn repeated_get_of_same_key_hits_the_buffer_cache() {
        let mut engine = open_engine(false);
        for i in 0..50i64 {
            engine.put(&i.to_le_bytes(), &[(i % 251) as u8]).unwrap();
        }
        engine.flush().unwrap();

        let mut out = [0u8];
        assert!(engine.get(&7i64.to_le_bytes(), &mut out).unwrap());
        assert_eq!(engine.stats().buffer_hits, 0);
        assert!(engine.get(&7i64.to_le_bytes(), &mut out).unwrap());
        assert!(engine.stats().buffer_hits > 0);
    }

    #[test]
    fn range_iteration_with_index_counts_idx_reads() {
        let mut engine = open_engine(true);
        for i in 0..40i64 {
            engine.put(&i.to_le_bytes(), &[(i % 16) as u8]).unwrap();
        }
        engine.flush().unwrap();

        assert_eq!(engine.stats().num_idx_reads, 0);
        let target = [3u8];
        let _: alloc::vec::Vec<_> = engine
            .iter(None, None, Some(&target), Some(&target))
            .map(|r| r.unwrap())
            .collect();
        assert!(engine.stats().num_idx_reads > 0);
    }

    #[test]
    fn locator_falls_back_to_binary_search_without_max_min() {
        let mut engine = open_engine_with(false, false);
        for i in 0..80i64 {
            engine.put(&i.to_le_bytes(), &[(i % 200) as u8]).unwrap();
        }
        engine.flush().unwrap();

        for i in 0..80i64 {
            let mut out = [0u8];
            assert!(engine.get(&i.to_le_bytes(), &mut out).unwrap());
            assert_eq!(out[0], (i % 200) as u8);
        }
        let mut out = [0u8];
        assert!(!engine.get(&999i64.to_le_bytes(), &mut out).unwrap());
    }
}

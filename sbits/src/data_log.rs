//! The append-only ring of data pages: page-id allocation, write cursor, erase frontier, and
//! the running key-delta estimator (§3 Engine State, §4.3).

use sbits_device::{PageDevice, PhysicalPage};

#[derive(Debug, Clone)]
pub(crate) struct DataLog {
    pub start_page: u32,
    pub end_page: u32,
    pub erase_size_in_pages: u32,
    pub next_page_id: u32,
    pub next_page_write_id: u32,
    pub first_data_page: u32,
    pub first_data_page_id: u32,
    pub erased_end_page: u32,
    pub wrapped: bool,
    /// Estimated key of the oldest live record, in the caller's `key_as_i64` units.
    pub min_key_estimate: i64,
    /// Estimated average key delta between consecutive records, same units.
    pub avg_key_diff: i64,
    first_erase_done: bool,
}

impl DataLog {
    pub fn new(start_page: u32, end_page: u32, erase_size_in_pages: u32) -> Self {
        DataLog {
            start_page,
            end_page,
            erase_size_in_pages,
            next_page_id: 0,
            next_page_write_id: start_page,
            first_data_page: start_page,
            first_data_page_id: 0,
            erased_end_page: start_page,
            wrapped: false,
            min_key_estimate: 0,
            avg_key_diff: 1,
            first_erase_done: false,
        }
    }

    /// Number of distinct physical data pages the ring spans.
    pub fn capacity_pages(&self) -> u32 {
        self.end_page - self.start_page
    }

    /// Number of currently-live data pages (I4).
    pub fn live_page_count(&self) -> u32 {
        if !self.wrapped {
            self.next_page_write_id - self.first_data_page
        } else {
            (self.end_page - self.first_data_page) + (self.next_page_write_id - self.start_page)
        }
    }

    /// `liveBlocks` as used by the `avgKeyDiff` update in §4.2 step 3.
    pub fn live_blocks_for_estimate(&self) -> i64 {
        if !self.wrapped {
            (self.next_page_write_id.saturating_sub(1)) as i64
        } else {
            ((self.end_page - self.first_data_page) + 1) as i64 + self.next_page_write_id as i64
        }
    }

    /// Folds one observed consecutive-key delta into the running `avgKeyDiff` estimate used by
    /// the Key Locator's interpolated first guess (§4.2 step 3, §4.4). `n` weights the new
    /// observation the way the reference implementation's incremental average does: more weight
    /// when fewer blocks have been observed, decreasing as the log fills.
    pub fn observe_key_diff(&mut self, diff: i64, n: i64) {
        if n <= 0 {
            return;
        }
        self.avg_key_diff += (diff - self.avg_key_diff) / n;
    }

    /// Performs the ring-discipline bookkeeping and physical write for a freshly filled data
    /// page (§4.3), stamping `pageId` into `buf[0..4]` and returning it.
    ///
    /// `buf` must already contain the page's count/bitmap/min-max/records; only the `pageId`
    /// field is written here.
    pub fn write_page<D: PageDevice>(
        &mut self,
        device: &mut D,
        buf: &mut [u8],
        max_records_per_page: u32,
    ) -> Result<u32, D::Error> {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        buf[0..4].copy_from_slice(&page_id.to_le_bytes());

        // Advance erase frontier (§4.3): erase the next whole erase block once the write
        // cursor is about to enter it, staying one block ahead of the cursor at all times.
        if self.next_page_write_id >= self.erased_end_page
            && self.next_page_write_id + self.erase_size_in_pages < self.end_page
        {
            let advance = if !self.first_erase_done {
                self.first_erase_done = true;
                self.erase_size_in_pages - 1
            } else {
                self.erase_size_in_pages
            };
            let erase_from = self.erased_end_page + 1;
            let new_frontier = self.erased_end_page + advance;
            device.erase(
                PhysicalPage::new(erase_from),
                PhysicalPage::new(new_frontier + 1),
            )?;
            self.erased_end_page = new_frontier;
            if self.wrapped {
                self.first_data_page = self.erased_end_page + 1;
                self.first_data_page_id += self.erase_size_in_pages;
                self.min_key_estimate += self.erase_size_in_pages as i64
                    * self.avg_key_diff
                    * max_records_per_page as i64;
            }
        }

        // Ring wrap (§4.3): not mutually exclusive with the block above; both can fire on the
        // same write when the cursor crosses `end_page`.
        if self.next_page_write_id >= self.end_page {
            self.first_data_page_id += self.erase_size_in_pages;
            self.erased_end_page = self.start_page + self.erase_size_in_pages - 1;
            self.first_data_page = self.erased_end_page + 1;
            self.wrapped = true;
            self.next_page_write_id = self.start_page;
            device.erase(
                PhysicalPage::new(self.start_page),
                PhysicalPage::new(self.erased_end_page + 1),
            )?;
            self.min_key_estimate += self.erase_size_in_pages as i64
                * self.avg_key_diff
                * max_records_per_page as i64;
        }

        device.write(PhysicalPage::new(self.next_page_write_id), buf)?;
        self.next_page_write_id += 1;
        Ok(page_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbits_device::test::VirtualPageDevice;

    const PAGE_SIZE: usize = 64;

    #[test]
    fn page_ids_are_sequential_and_gapless() {
        let mut dev = VirtualPageDevice::<PAGE_SIZE, 16>::new();
        let mut log = DataLog::new(0, 16, 4);
        for i in 0..10u32 {
            let mut buf = [0u8; PAGE_SIZE];
            let id = log.write_page(&mut dev, &mut buf, 4).unwrap();
            assert_eq!(id, i);
        }
    }

    #[test]
    fn ring_wraps_within_start_end() {
        let mut dev = VirtualPageDevice::<PAGE_SIZE, 8>::new();
        let mut log = DataLog::new(0, 8, 4);
        for _ in 0..12u32 {
            let mut buf = [0u8; PAGE_SIZE];
            log.write_page(&mut dev, &mut buf, 4).unwrap();
        }
        assert!(log.wrapped);
        assert!(log.next_page_write_id < 8);
    }
}

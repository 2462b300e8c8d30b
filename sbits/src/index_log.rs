//! The secondary bitmap-index ring (§4.5). Same erase discipline as the data ring, but its
//! write cursor is tracked as an offset relative to the ring's own start, not an absolute
//! physical page — the asymmetry is deliberate (§4.3) and preserved here rather than unified
//! with [`crate::data_log::DataLog`].

use sbits_device::{PageDevice, PhysicalPage};

#[derive(Debug, Clone)]
pub(crate) struct IndexLog {
    pub start_page: u32,
    pub end_page: u32,
    pub erase_size_in_pages: u32,
    pub next_page_id: u32,
    /// Offset of the write cursor within `[0, capacity)`.
    pub next_write_offset: u32,
    /// Offset of the oldest live index page within `[0, capacity)`.
    pub first_page_offset: u32,
    pub erased_end_offset: u32,
    pub wrapped: bool,
    first_erase_done: bool,
}

impl IndexLog {
    pub fn new(start_page: u32, end_page: u32, erase_size_in_pages: u32) -> Self {
        IndexLog {
            start_page,
            end_page,
            erase_size_in_pages,
            next_page_id: 0,
            next_write_offset: 0,
            first_page_offset: 0,
            erased_end_offset: 0,
            wrapped: false,
            first_erase_done: false,
        }
    }

    fn capacity(&self) -> u32 {
        self.end_page - self.start_page
    }

    pub fn write_page<D: PageDevice>(
        &mut self,
        device: &mut D,
        buf: &mut [u8],
    ) -> Result<u32, D::Error> {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        buf[0..4].copy_from_slice(&page_id.to_le_bytes());

        let capacity = self.capacity();

        if self.next_write_offset >= self.erased_end_offset
            && self.next_write_offset + self.erase_size_in_pages < capacity
        {
            let advance = if !self.first_erase_done {
                self.first_erase_done = true;
                self.erase_size_in_pages - 1
            } else {
                self.erase_size_in_pages
            };
            let erase_from = self.erased_end_offset + 1;
            let new_frontier = self.erased_end_offset + advance;
            device.erase(
                PhysicalPage::new(self.start_page + erase_from),
                PhysicalPage::new(self.start_page + new_frontier + 1),
            )?;
            self.erased_end_offset = new_frontier;
            if self.wrapped {
                self.first_page_offset = self.erased_end_offset + 1;
            }
        }

        if self.next_write_offset >= capacity {
            self.erased_end_offset = self.erase_size_in_pages - 1;
            self.first_page_offset = self.erased_end_offset + 1;
            self.wrapped = true;
            self.next_write_offset = 0;
            device.erase(
                PhysicalPage::new(self.start_page),
                PhysicalPage::new(self.start_page + self.erased_end_offset + 1),
            )?;
        }

        let physical = PhysicalPage::new(self.start_page + self.next_write_offset);
        device.write(physical, buf)?;
        self.next_write_offset += 1;
        Ok(page_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbits_device::test::VirtualPageDevice;

    const PAGE_SIZE: usize = 64;

    #[test]
    fn wraps_within_relative_capacity() {
        let mut dev = VirtualPageDevice::<PAGE_SIZE, 8>::new();
        let mut log = IndexLog::new(0, 8, 4);
        for _ in 0..10u32 {
            let mut buf = [0u8; PAGE_SIZE];
            log.write_page(&mut dev, &mut buf).unwrap();
        }
        assert!(log.wrapped);
        assert!(log.next_write_offset < 8);
    }
}

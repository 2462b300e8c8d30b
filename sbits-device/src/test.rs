//! An in-memory [`PageDevice`] for tests, modelled on a NOR-flash-like medium: `write` can only
//! clear bits (it ANDs into existing content) and only `erase` sets bytes back to `0xFF`.

use crate::{ErrorType, PageDevice, PageDeviceError, PageDeviceErrorKind, PhysicalPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    OutOfBounds,
}

impl PageDeviceError for Error {
    fn kind(&self) -> PageDeviceErrorKind {
        match self {
            Error::OutOfBounds => PageDeviceErrorKind::OutOfBounds,
        }
    }
}

/// A fixed-size, in-memory page device for tests.
#[derive(Debug, Clone)]
pub struct VirtualPageDevice<const PAGE_SIZE: usize, const PAGE_COUNT: usize> {
    storage: [[u8; PAGE_SIZE]; PAGE_COUNT],
    pub reads: u32,
    pub writes: u32,
    pub erases: u32,
}

impl<const PAGE_SIZE: usize, const PAGE_COUNT: usize> VirtualPageDevice<PAGE_SIZE, PAGE_COUNT> {
    pub fn new() -> Self {
        Self {
            storage: [[0xFFu8; PAGE_SIZE]; PAGE_COUNT],
            reads: 0,
            writes: 0,
            erases: 0,
        }
    }
}

impl<const PAGE_SIZE: usize, const PAGE_COUNT: usize> Default
    for VirtualPageDevice<PAGE_SIZE, PAGE_COUNT>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const PAGE_SIZE: usize, const PAGE_COUNT: usize> ErrorType
    for VirtualPageDevice<PAGE_SIZE, PAGE_COUNT>
{
    type Error = Error;
}

impl<const PAGE_SIZE: usize, const PAGE_COUNT: usize> PageDevice
    for VirtualPageDevice<PAGE_SIZE, PAGE_COUNT>
{
    const PAGE_SIZE: usize = PAGE_SIZE;
    const PAGE_COUNT: u32 = PAGE_COUNT as u32;

    fn read(&mut self, page: PhysicalPage, buf: &mut [u8]) -> Result<(), Error> {
        let idx = page.as_u32() as usize;
        if idx >= PAGE_COUNT {
            return Err(Error::OutOfBounds);
        }
        trace!("reading page {}", idx);
        buf.copy_from_slice(&self.storage[idx]);
        self.reads += 1;
        Ok(())
    }

    fn write(&mut self, page: PhysicalPage, buf: &[u8]) -> Result<(), Error> {
        let idx = page.as_u32() as usize;
        if idx >= PAGE_COUNT {
            return Err(Error::OutOfBounds);
        }
        trace!("writing page {}", idx);
        for (dst, src) in self.storage[idx].iter_mut().zip(buf) {
            *dst &= *src;
        }
        self.writes += 1;
        Ok(())
    }

    fn erase(&mut self, from: PhysicalPage, to: PhysicalPage) -> Result<(), Error> {
        let (from, to) = (from.as_u32() as usize, to.as_u32() as usize);
        if to > PAGE_COUNT || from > to {
            return Err(Error::OutOfBounds);
        }
        debug!("erasing pages {}..{}", from, to);
        for page in &mut self.storage[from..to] {
            page.fill(0xFF);
        }
        self.erases += (to - from) as u32;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Adds logging to the test automatically; control with RUST_LOG="level"
    // (requires --features log passed to cargo test).
    use test_log::test;

    const PAGE_SIZE: usize = 64;
    const PAGE_COUNT: usize = 16;

    #[test]
    fn write_then_read_round_trips() {
        let mut dev = VirtualPageDevice::<PAGE_SIZE, PAGE_COUNT>::new();
        let page = PhysicalPage::new(3);
        let data = [7u8; PAGE_SIZE];
        dev.write(page, &data).unwrap();
        let mut out = [0u8; PAGE_SIZE];
        dev.read(page, &mut out).unwrap();
        assert_eq!(data, out);
        assert_eq!(dev.writes, 1);
        assert_eq!(dev.reads, 1);
    }

    #[test]
    fn write_only_clears_bits() {
        let mut dev = VirtualPageDevice::<PAGE_SIZE, PAGE_COUNT>::new();
        let page = PhysicalPage::new(0);
        dev.write(page, &[0b1100_1100; PAGE_SIZE]).unwrap();
        dev.write(page, &[0b1111_0000; PAGE_SIZE]).unwrap();
        let mut out = [0u8; PAGE_SIZE];
        dev.read(page, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0b1100_0000));
    }

    #[test]
    fn erase_resets_to_all_ones() {
        let mut dev = VirtualPageDevice::<PAGE_SIZE, PAGE_COUNT>::new();
        dev.write(PhysicalPage::new(1), &[0u8; PAGE_SIZE]).unwrap();
        dev.erase(PhysicalPage::new(0), PhysicalPage::new(2))
            .unwrap();
        let mut out = [0u8; PAGE_SIZE];
        dev.read(PhysicalPage::new(1), &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0xFF));
        assert_eq!(dev.erases, 2);
    }

    #[test]
    fn out_of_bounds_access_is_rejected() {
        let mut dev = VirtualPageDevice::<PAGE_SIZE, PAGE_COUNT>::new();
        let mut out = [0u8; PAGE_SIZE];
        assert_eq!(
            dev.read(PhysicalPage::new(PAGE_COUNT as u32), &mut out),
            Err(Error::OutOfBounds)
        );
    }
}

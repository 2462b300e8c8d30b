//! The four fixed-role RAM buffer slots (§5): data write, data read, index write, index read.
//! No eviction policy — each slot is owned by its role for the engine's lifetime, and the index
//! slots simply don't exist when the engine isn't configured with `Features::use_index`.

use alloc::vec;
use alloc::vec::Vec;

use crate::layout::{IndexLayout, Layout};

pub(crate) struct BufferPool {
    pub data_write: Vec<u8>,
    pub data_read: Vec<u8>,
    data_read_page: Option<u32>,
    pub index_write: Option<Vec<u8>>,
    pub index_read: Option<Vec<u8>>,
    index_read_page: Option<u32>,
}

impl BufferPool {
    pub fn new(layout: &Layout, index_layout: Option<&IndexLayout>) -> Self {
        BufferPool {
            data_write: vec![0u8; layout.page_size],
            data_read: vec![0u8; layout.page_size],
            data_read_page: None,
            index_write: index_layout.map(|l| vec![0u8; l.page_size]),
            index_read: index_layout.map(|l| vec![0u8; l.page_size]),
            index_read_page: None,
        }
    }

    /// Whether `data_read` already holds physical page `page`, sparing a device read.
    pub fn data_read_hit(&self, page: u32) -> bool {
        self.data_read_page == Some(page)
    }

    pub fn mark_data_read(&mut self, page: u32) {
        self.data_read_page = Some(page);
    }

    pub fn invalidate_data_read(&mut self) {
        self.data_read_page = None;
    }

    pub fn index_read_hit(&self, page: u32) -> bool {
        self.index_read_page == Some(page)
    }

    pub fn mark_index_read(&mut self, page: u32) {
        self.index_read_page = Some(page);
    }

    pub fn invalidate_index_read(&mut self) {
        self.index_read_page = None;
    }
}

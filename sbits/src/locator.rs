//! The Key Locator (§4.4): finds the live data page most likely to hold a target key.
//!
//! When [`Capabilities::key_as_i64`] can project the target and the running key-delta estimate
//! is usable, the first probe is an interpolated guess; either way the search then narrows with
//! an ordinary binary search over the live page range, so a `None` projection degrades to plain
//! bisection rather than failing. When `layout.use_max_min` is off there's no per-page
//! `minKey`/`maxKey` header field to compare against, so the probe falls back to the first and
//! last record actually stored on the page — still a page-range binary search, just reading the
//! boundary keys from the records themselves (I1 keeps them sorted within a page).

use core::cmp::Ordering;

use sbits_device::{PageDevice, PhysicalPage};

use crate::buffer::BufferPool;
use crate::capability::Capabilities;
use crate::data_log::DataLog;
use crate::layout::Layout;
use crate::page::DataPage;
use crate::Stats;

/// Where `target_key` was found (or proven absent) relative to the live data pages.
pub(crate) enum Located {
    /// `target_key` may be present on the data page at this physical address.
    Page(u32),
    /// `target_key` is smaller than every live key.
    BeforeStart,
    /// `target_key` is larger than every live page's max key.
    AfterEnd,
}

fn physical_for_index(log: &DataLog, index: u32) -> u32 {
    let capacity = log.capacity_pages();
    let base_offset = log.first_data_page - log.start_page;
    let offset = (base_offset + index) % capacity;
    log.start_page + offset
}

fn interpolated_guess<C: Capabilities>(
    log: &DataLog,
    caps: &C,
    target_key: &[u8],
    live: u32,
    max_records_per_page: u32,
) -> Option<u32> {
    let target = caps.key_as_i64(target_key)?;
    if log.avg_key_diff <= 0 || max_records_per_page == 0 {
        return None;
    }
    let delta = target - log.min_key_estimate;
    if delta <= 0 {
        return Some(0);
    }
    let guess_records = delta / log.avg_key_diff;
    let guess_page = (guess_records / max_records_per_page as i64).max(0) as u32;
    Some(guess_page.min(live - 1))
}

/// The key that would sort highest on `page`: the header field when max-min tracking is on,
/// otherwise the last stored record's key (I1 keeps records non-decreasing within a page).
fn page_max_key<'a>(page: &DataPage<'a>, layout: &Layout) -> &'a [u8] {
    if layout.use_max_min {
        page.max_key()
    } else {
        page.record(page.count() - 1).0
    }
}

/// The key that would sort lowest on `page`, mirroring [`page_max_key`].
fn page_min_key<'a>(page: &DataPage<'a>, layout: &Layout) -> &'a [u8] {
    if layout.use_max_min {
        page.min_key()
    } else {
        page.record(0).0
    }
}

/// Reads physical data page `physical` into the buffer pool's data-read slot, sparing the device
/// read when it's already cached there, and returns the slot's contents.
fn load_data_page<'b, D: PageDevice>(
    device: &mut D,
    buffers: &'b mut BufferPool,
    stats: &mut Stats,
    physical: u32,
) -> Result<&'b [u8], D::Error> {
    if buffers.data_read_hit(physical) {
        stats.buffer_hits += 1;
    } else {
        device.read(PhysicalPage::new(physical), &mut buffers.data_read)?;
        buffers.mark_data_read(physical);
    }
    Ok(&buffers.data_read)
}

/// Searches the live data pages for `target_key`, caching probed pages in `buffers.data_read`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn locate<D: PageDevice, C: Capabilities>(
    device: &mut D,
    log: &DataLog,
    layout: &Layout,
    caps: &C,
    buffers: &mut BufferPool,
    stats: &mut Stats,
    target_key: &[u8],
) -> Result<Located, D::Error> {
    let live = log.live_page_count();
    if live == 0 {
        return Ok(Located::AfterEnd);
    }

    let mut lo: u32 = 0;
    let mut hi: u32 = live; // exclusive

    if let Some(guess) =
        interpolated_guess(log, caps, target_key, live, layout.max_records_per_page as u32)
    {
        let physical = physical_for_index(log, guess);
        let buf = load_data_page(device, buffers, stats, physical)?;
        let page = DataPage::new(buf, layout);
        match caps.compare_key(target_key, page_max_key(&page, layout)) {
            Ordering::Greater => lo = guess + 1,
            _ => hi = guess + 1,
        }
    }

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let physical = physical_for_index(log, mid);
        let buf = load_data_page(device, buffers, stats, physical)?;
        let page = DataPage::new(buf, layout);
        if caps.compare_key(target_key, page_max_key(&page, layout)) == Ordering::Greater {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }

    if lo >= live {
        return Ok(Located::AfterEnd);
    }

    let physical = physical_for_index(log, lo);
    let buf = load_data_page(device, buffers, stats, physical)?;
    let page = DataPage::new(buf, layout);
    if lo == 0 && caps.compare_key(target_key, page_min_key(&page, layout)) == Ordering::Less {
        return Ok(Located::BeforeStart);
    }
    Ok(Located::Page(physical))
}

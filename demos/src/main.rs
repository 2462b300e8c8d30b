//! Small CLI that drives the engine end to end against an in-memory page device: load a run of
//! synthetic time-series records, then look one up or scan a range.
//!
//! This binary exists to exercise the public API with a real (if toy) device; it is not part of
//! the library's public surface.

use std::cmp::Ordering;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use sbits::{BitmapWidth, Capabilities, Engine, EngineConfig, Features};
use sbits_device::{ErrorType, PageDevice, PageDeviceError, PageDeviceErrorKind, PhysicalPage};

const PAGE_SIZE: usize = 256;
const ERASE_SIZE_IN_PAGES: u32 = 4;

#[derive(Parser)]
#[command(name = "sbits-cli", about = "Drive the time-series storage engine")]
struct Cli {
    /// Number of synthetic records to insert before running the command.
    #[arg(long, default_value_t = 200)]
    load: u32,

    /// Physical pages to give the data ring.
    #[arg(long, default_value_t = 64)]
    data_pages: u32,

    /// Physical pages to give the index ring (ignored with --no-index).
    #[arg(long, default_value_t = 32)]
    index_pages: u32,

    /// Disable the secondary bitmap index.
    #[arg(long)]
    no_index: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look up a single key.
    Get { key: i64 },
    /// Scan a key range, optionally also bounded by data value.
    Range {
        #[arg(long)]
        min_key: Option<i64>,
        #[arg(long)]
        max_key: Option<i64>,
        #[arg(long)]
        min_data: Option<u32>,
        #[arg(long)]
        max_data: Option<u32>,
    },
    /// Print accumulated I/O statistics after loading.
    Stats,
}

struct MemoryDevice {
    pages: Vec<[u8; PAGE_SIZE]>,
}

impl MemoryDevice {
    fn new(page_count: u32) -> Self {
        MemoryDevice {
            pages: (0..page_count).map(|_| [0xFFu8; PAGE_SIZE]).collect(),
        }
    }
}

#[derive(Debug)]
struct DeviceError(PageDeviceErrorKind);

impl PageDeviceError for DeviceError {
    fn kind(&self) -> PageDeviceErrorKind {
        self.0
    }
}

impl ErrorType for MemoryDevice {
    type Error = DeviceError;
}

impl PageDevice for MemoryDevice {
    const PAGE_SIZE: usize = PAGE_SIZE;
    const PAGE_COUNT: u32 = u32::MAX;

    fn read(&mut self, page: PhysicalPage, buf: &mut [u8]) -> Result<(), Self::Error> {
        let slot = self
            .pages
            .get(page.as_u32() as usize)
            .ok_or(DeviceError(PageDeviceErrorKind::OutOfBounds))?;
        buf.copy_from_slice(slot);
        Ok(())
    }

    fn write(&mut self, page: PhysicalPage, buf: &[u8]) -> Result<(), Self::Error> {
        let slot = self
            .pages
            .get_mut(page.as_u32() as usize)
            .ok_or(DeviceError(PageDeviceErrorKind::OutOfBounds))?;
        for (byte, written) in slot.iter_mut().zip(buf) {
            *byte &= *written;
        }
        Ok(())
    }

    fn erase(&mut self, from: PhysicalPage, to: PhysicalPage) -> Result<(), Self::Error> {
        for p in from.as_u32()..to.as_u32() {
            let slot = self
                .pages
                .get_mut(p as usize)
                .ok_or(DeviceError(PageDeviceErrorKind::OutOfBounds))?;
            slot.fill(0xFF);
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// `i64` keys, `u32` data values bucketed into 16 buckets by `value % 16`.
struct TimeSeriesCapabilities;

impl Capabilities for TimeSeriesCapabilities {
    fn compare_key(&self, a: &[u8], b: &[u8]) -> Ordering {
        i64::from_le_bytes(a.try_into().expect("8-byte key"))
            .cmp(&i64::from_le_bytes(b.try_into().expect("8-byte key")))
    }

    fn compare_data(&self, a: &[u8], b: &[u8]) -> Ordering {
        u32::from_le_bytes(a.try_into().expect("4-byte data"))
            .cmp(&u32::from_le_bytes(b.try_into().expect("4-byte data")))
    }

    fn update_bitmap(&self, data: &[u8], bitmap: &mut [u8]) {
        let bucket = (u32::from_le_bytes(data.try_into().expect("4-byte data")) % 16) as u8;
        bitmap[(bucket / 8) as usize] |= 1 << (bucket % 8);
    }

    fn in_bitmap(&self, data: &[u8], bitmap: &[u8]) -> bool {
        let bucket = (u32::from_le_bytes(data.try_into().expect("4-byte data")) % 16) as u8;
        bitmap[(bucket / 8) as usize] & (1 << (bucket % 8)) != 0
    }

    fn key_as_i64(&self, key: &[u8]) -> Option<i64> {
        Some(i64::from_le_bytes(key.try_into().ok()?))
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.data_pages < 2 * ERASE_SIZE_IN_PAGES {
        bail!("--data-pages must be at least {}", 2 * ERASE_SIZE_IN_PAGES);
    }

    let total_pages = cli.data_pages + if cli.no_index { 0 } else { cli.index_pages };
    let device = MemoryDevice::new(total_pages);

    let config = EngineConfig {
        key_size: 8,
        data_size: 4,
        bitmap_width: BitmapWidth::Bits16,
        start_page: 0,
        end_page: cli.data_pages,
        start_index_page: cli.data_pages,
        end_index_page: cli.data_pages + cli.index_pages,
        erase_size_in_pages: ERASE_SIZE_IN_PAGES,
        features: Features {
            use_index: !cli.no_index,
            use_max_min: true,
            use_bitmap: true,
        },
    };

    let mut engine = Engine::open(device, TimeSeriesCapabilities, config)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    for i in 0..cli.load {
        let key = (i as i64).to_le_bytes();
        let data = (i * 37 % 1000).to_le_bytes();
        engine
            .put(&key, &data)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }
    engine.flush().map_err(|e| anyhow::anyhow!("{e}"))?;

    match cli.command {
        Command::Get { key } => {
            let mut out = [0u8; 4];
            let found = engine
                .get(&key.to_le_bytes(), &mut out)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            if found {
                println!("{key} -> {}", u32::from_le_bytes(out));
            } else {
                println!("{key} not found");
            }
        }
        Command::Range {
            min_key,
            max_key,
            min_data,
            max_data,
        } => {
            let min_key_bytes = min_key.map(i64::to_le_bytes);
            let max_key_bytes = max_key.map(i64::to_le_bytes);
            let min_data_bytes = min_data.map(u32::to_le_bytes);
            let max_data_bytes = max_data.map(u32::to_le_bytes);
            let mut count = 0u32;
            for record in engine.iter(
                min_key_bytes.as_ref().map(|a| a.as_slice()),
                max_key_bytes.as_ref().map(|a| a.as_slice()),
                min_data_bytes.as_ref().map(|a| a.as_slice()),
                max_data_bytes.as_ref().map(|a| a.as_slice()),
            ) {
                let record = record.map_err(|e| anyhow::anyhow!("{e}"))?;
                let key = i64::from_le_bytes(record.key.as_slice().try_into().unwrap());
                let data = u32::from_le_bytes(record.data.as_slice().try_into().unwrap());
                println!("{key} -> {data}");
                count += 1;
            }
            println!("{count} records");
        }
        Command::Stats => {
            let stats = engine.stats();
            println!("{stats:?}");
        }
    }

    Ok(())
}

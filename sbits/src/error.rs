//! Error types surfaced by the engine (§7).

use core::fmt::Debug;
use sbits_device::{PageDevice, PageDeviceError, PageDeviceErrorKind};
use thiserror::Error;

/// Configuration problems rejected at [`crate::Engine::open`] rather than degrading silently.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConfigError {
    #[error("key/data/bitmap widths leave no room for a single record on the page")]
    RecordTooLarge,
    #[error("{ring} ring needs at least {needed} pages (>= 2 erase blocks), has {available}")]
    RingTooSmall {
        ring: &'static str,
        needed: u32,
        available: u32,
    },
    #[error("use_index requires a bitmap width (Bits16 or Bits64)")]
    IndexRequiresBitmapWidth,
    #[error("use_bitmap requires a bitmap width (Bits16 or Bits64)")]
    BitmapFeatureRequiresWidth,
}

/// Error kinds an [`Error`] can map onto, for callers that only care about the class of failure.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    Config,
    Device,
    OutOfOrder,
}

/// Top-level error type returned by engine operations.
///
/// Generic over the device so device-specific errors aren't erased; see
/// [`sbits_device::PageDeviceError`] for the class-level view.
#[derive(Debug, Error)]
pub enum Error<D: PageDevice>
where
    D::Error: Debug,
{
    #[error("page device error: {0:?}")]
    Device(D::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("key is smaller than the last inserted key (I1 requires non-decreasing key order)")]
    OutOfOrder,
}

impl<D: PageDevice> Error<D>
where
    D::Error: Debug,
{
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Device(_) => ErrorKind::Device,
            Error::Config(_) => ErrorKind::Config,
            Error::OutOfOrder => ErrorKind::OutOfOrder,
        }
    }

    /// The device error kind, if this is a [`Error::Device`].
    pub fn device_kind(&self) -> Option<PageDeviceErrorKind> {
        match self {
            Error::Device(e) => Some(e.kind()),
            Error::Config(_) | Error::OutOfOrder => None,
        }
    }
}

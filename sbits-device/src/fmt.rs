//! Dual `defmt`/`log` logging shim.
//!
//! Every other module reaches for `trace!`/`debug!`/`info!`/`warn!`/`error!` from here rather
//! than from `log` or `defmt` directly, so the crate builds with either backend, or neither
//! (logging becomes a no-op on plain `no_std` targets with no logging framework available).

#![allow(unused_macros)]

macro_rules! trace {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::trace!($($arg)*);
            #[cfg(feature = "defmt")]
            ::defmt::trace!($($arg)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ();
        }
    };
}

macro_rules! debug {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::debug!($($arg)*);
            #[cfg(feature = "defmt")]
            ::defmt::debug!($($arg)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ();
        }
    };
}

macro_rules! info {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::info!($($arg)*);
            #[cfg(feature = "defmt")]
            ::defmt::info!($($arg)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ();
        }
    };
}

macro_rules! warn {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::warn!($($arg)*);
            #[cfg(feature = "defmt")]
            ::defmt::warn!($($arg)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ();
        }
    };
}

macro_rules! error {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::error!($($arg)*);
            #[cfg(feature = "defmt")]
            ::defmt::error!($($arg)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ();
        }
    };
}


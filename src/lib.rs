//! Field-update bootloader for small AVR audio devices.
//!
//! On every power-on the bootloader reads an ISPL container from an external SPI flash chip,
//! compares the checksum of the program image found there against the checksum of the last
//! image it committed, and if they differ it reprograms internal flash page by page before handing
//! control to the application through a trampoline page.
//!
//! The board supplies the hardware through a handful of traits:
//! * [`transport::Transport`] for reading the external flash,
//! * [`embedded_storage_async::nor_flash::NorFlash`] for the internal program flash,
//! * [`state::MarkerStore`] for the persisted completion marker,
//! * [`fallback::Indicator`] for the audible "nothing to boot" signal,
//! * [`boot::Boot`] for the final jump.
#![no_std]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod boot;
pub mod bootloader;
pub mod config;
pub mod decision;
pub mod fallback;
pub mod manifest;
pub mod programmer;
pub mod rjmp;
pub mod state;
pub mod transport;

#[cfg(any(feature = "std", test))]
pub mod builder;

#[cfg(test)]
mod mock;

pub use bootloader::{Bootloader, Resolution};
pub use config::Config;

/// Size of an internal flash page, the unit of erase, write and verify.
pub const PAGE_SIZE: usize = 64;

/// Value of an erased flash byte.
pub const ERASED: u8 = 0xFF;

/// Address of a 16-bit instruction word in internal flash.
pub type WordAddress = u16;

/// Failure of one of the hardware collaborators.
///
/// Kept free of the concrete driver error types so that the core does not depend on a particular HAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The external flash transport failed to complete a transaction.
    Transport,
    /// The internal program flash rejected an operation.
    Flash,
    /// The non-volatile marker storage failed.
    Storage,
}

#[cfg(feature = "defmt")]
pub(crate) use defmt as log;

#[cfg(all(feature = "log", not(feature = "defmt")))]
pub(crate) use ::log;

#[cfg(not(any(feature = "log", feature = "defmt")))]
pub(crate) mod log {
    macro_rules! info {
        ( $( $x:expr ),* $(,)? ) => {{ $( let _ = &$x; )* }};
    }
    pub(crate) use info;
    macro_rules! debug {
        ( $( $x:expr ),* $(,)? ) => {{ $( let _ = &$x; )* }};
    }
    pub(crate) use debug;
    macro_rules! warner {
        ( $( $x:expr ),* $(,)? ) => {{ $( let _ = &$x; )* }};
    }
    pub(crate) use warner as warn;
    macro_rules! error {
        ( $( $x:expr ),* $(,)? ) => {{ $( let _ = &$x; )* }};
    }
    pub(crate) use error;
}

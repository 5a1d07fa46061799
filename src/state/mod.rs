//! Persisted completion marker: the checksum of the last image that was programmed and verified in full.

use serde::{Deserialize, Serialize};

use crate::Error;

pub mod eeprom;

#[cfg(feature = "simple_state")]
pub mod simple;

/// The persisted marker value.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Marker(pub u32);

impl Marker {
    /// No update has ever been completed, or one is in progress.
    ///
    /// Equal to erased non-volatile memory, so a factory-fresh device reads as unset.
    pub const UNSET: Marker = Marker(0xFFFF_FFFF);

    pub const fn is_unset(self) -> bool {
        self.0 == Self::UNSET.0
    }

    /// Whether this marker records a completed update of an image with `checksum`.
    ///
    /// An unset marker never matches, even a checksum that happens to equal the sentinel.
    pub const fn matches(self, checksum: u32) -> bool {
        !self.is_unset() && self.0 == checksum
    }
}

/// Non-volatile slot holding the [`Marker`].
///
/// `invalidate` and `commit` return only once the value is durable.
#[allow(async_fn_in_trait)]
pub trait MarkerStore {
    async fn get(&mut self) -> Result<Marker, Error>;

    /// Mark the application as incomplete, before internal flash is touched.
    async fn invalidate(&mut self) -> Result<(), Error>;

    /// Record that the image with `checksum` was programmed and verified.
    async fn commit(&mut self, checksum: u32) -> Result<(), Error>;
}

impl<S: MarkerStore> MarkerStore for &mut S {
    async fn get(&mut self) -> Result<Marker, Error> {
        S::get(self).await
    }

    async fn invalidate(&mut self) -> Result<(), Error> {
        S::invalidate(self).await
    }

    async fn commit(&mut self, checksum: u32) -> Result<(), Error> {
        S::commit(self, checksum).await
    }
}

//! Marker kept in a fixed 4-byte EEPROM slot, the layout used by the AVR boards.

use embedded_storage::Storage;

use crate::{
    Error, log,
    state::{Marker, MarkerStore},
};

/// Marker stored little-endian at a fixed byte offset of a byte-addressable storage.
pub struct EepromMarker<S> {
    storage: S,
    offset: u32,
}

impl<S: Storage> EepromMarker<S> {
    pub fn new(storage: S, offset: u32) -> Self {
        Self { storage, offset }
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    fn write(&mut self, marker: Marker) -> Result<(), Error> {
        log::debug!("Storing marker {:?}", marker);

        self.storage
            .write(self.offset, &marker.0.to_le_bytes())
            .map_err(|_| Error::Storage)
    }
}

impl<S: Storage> MarkerStore for EepromMarker<S> {
    async fn get(&mut self) -> Result<Marker, Error> {
        let mut buf = [0u8; 4];
        self.storage
            .read(self.offset, &mut buf)
            .map_err(|_| Error::Storage)?;

        Ok(Marker(u32::from_le_bytes(buf)))
    }

    async fn invalidate(&mut self) -> Result<(), Error> {
        self.write(Marker::UNSET)
    }

    async fn commit(&mut self, checksum: u32) -> Result<(), Error> {
        self.write(Marker(checksum))
    }
}

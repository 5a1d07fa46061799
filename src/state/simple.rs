//! Simple straightforward implementation of keeping the marker on NOR flash.
//!
//! This implementation focusses on correctness and ease, contrary to efficiency and code size.
//! Leverages `sequential-storage` and `postcard` to store and serialize/deserialize the marker,
//! for boards that have no byte-addressable EEPROM but can spare two flash pages.

use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::{
    cache::KeyPointerCache,
    map::{SerializationError, Value},
};

use crate::{
    Error, log,
    state::{Marker, MarkerStore},
};

/// Room for the serialized key and marker, including write alignment padding.
const BUFFER_SIZE: usize = 16;

impl<'a> Value<'a> for Marker {
    fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        let buffer = postcard::to_slice(self, buffer).map_err(|e| match e {
            postcard::Error::SerializeBufferFull => SerializationError::BufferTooSmall,
            // Unmapped error.
            _ => SerializationError::Custom(0),
        })?;

        Ok(buffer.len())
    }

    fn deserialize_from(buffer: &'a [u8]) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        postcard::from_bytes(buffer).map_err(|e| match e {
            postcard::Error::DeserializeUnexpectedEnd => SerializationError::BufferTooSmall,
            postcard::Error::DeserializeBadVarint | postcard::Error::DeserializeBadEncoding => {
                SerializationError::InvalidFormat
            }
            // Unmapped error.
            _ => SerializationError::Custom(0),
        })
    }
}

/// Marker kept as the single item of a `sequential-storage` map spanning the whole of `nvm`.
pub struct SimpleMarker<NVM: NorFlash> {
    nvm: NVM,
    nvm_cache: KeyPointerCache<2, (), 1>,
}

impl<NVM: NorFlash> SimpleMarker<NVM> {
    pub fn new(nvm: NVM) -> Self {
        Self {
            nvm,
            nvm_cache: KeyPointerCache::new(),
        }
    }

    async fn store(&mut self, marker: Marker) -> Result<(), Error> {
        let mut data_buffer = [0u8; BUFFER_SIZE];
        let nvm_size = self.nvm.capacity() as u32;

        log::debug!("Storing marker {:?}", marker);

        sequential_storage::map::store_item::<(), Marker, _>(
            &mut self.nvm,
            0..nvm_size,
            &mut self.nvm_cache,
            &mut data_buffer,
            &(),
            &marker,
        )
        .await
        .map_err(|_| Error::Storage)
    }
}

impl<NVM: NorFlash> MarkerStore for SimpleMarker<NVM> {
    async fn get(&mut self) -> Result<Marker, Error> {
        let mut data_buffer = [0u8; BUFFER_SIZE];
        let nvm_size = self.nvm.capacity() as u32;

        let marker = sequential_storage::map::fetch_item::<(), Marker, _>(
            &mut self.nvm,
            0..nvm_size,
            &mut self.nvm_cache,
            &mut data_buffer,
            &(),
        )
        .await
        .map_err(|_| Error::Storage)?;

        Ok(match marker {
            Some(marker) => marker,
            None => {
                log::debug!("Marker NVM does not contain value");
                Marker::UNSET
            }
        })
    }

    async fn invalidate(&mut self) -> Result<(), Error> {
        self.store(Marker::UNSET).await
    }

    async fn commit(&mut self, checksum: u32) -> Result<(), Error> {
        self.store(Marker(checksum)).await
    }
}

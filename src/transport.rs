//! Read access to the external SPI flash chip holding the ISPL container.

use embedded_storage_async::nor_flash::ReadNorFlash;

use crate::Error;

/// Synchronous block reads from the external flash, one transaction at a time.
///
/// Multi-byte integers are assembled most-significant byte first, matching the container format.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Bring the chip out of power-down and into a known state.
    async fn reset(&mut self) -> Result<(), Error>;

    /// Fill `bytes` with the contents of the chip starting at `address`.
    async fn read_block(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Error>;

    async fn read_u8(&mut self, address: u32) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.read_block(address, &mut buf).await?;
        Ok(buf[0])
    }

    async fn read_u16(&mut self, address: u32) -> Result<u16, Error> {
        let mut buf = [0u8; 2];
        self.read_block(address, &mut buf).await?;
        Ok(u16::from_be_bytes(buf))
    }

    async fn read_u32(&mut self, address: u32) -> Result<u32, Error> {
        let mut buf = [0u8; 4];
        self.read_block(address, &mut buf).await?;
        Ok(u32::from_be_bytes(buf))
    }
}

impl<T: Transport> Transport for &mut T {
    async fn reset(&mut self) -> Result<(), Error> {
        T::reset(self).await
    }

    async fn read_block(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Error> {
        T::read_block(self, address, bytes).await
    }
}

/// Transport over any async NOR flash driver, for boards where the external chip already has one.
///
/// The driver must support byte-granular reads (`READ_SIZE == 1`).
pub struct NorTransport<F> {
    flash: F,
}

impl<F: ReadNorFlash> NorTransport<F> {
    pub fn new(flash: F) -> Self {
        Self { flash }
    }

    pub fn into_inner(self) -> F {
        self.flash
    }
}

impl<F: ReadNorFlash> Transport for NorTransport<F> {
    async fn reset(&mut self) -> Result<(), Error> {
        // Drivers wake the chip up when they are constructed.
        Ok(())
    }

    async fn read_block(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Error> {
        self.flash
            .read(address, bytes)
            .await
            .map_err(|_| Error::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockFlash, MockSpiFlash};

    #[test]
    fn integers_are_msb_first() {
        let mut spi = MockSpiFlash::new(std::vec![0x12, 0x34, 0x56, 0x78, 0x9A]);

        embassy_futures::block_on(async {
            assert_eq!(spi.read_u8(4).await.unwrap(), 0x9A);
            assert_eq!(spi.read_u16(0).await.unwrap(), 0x1234);
            assert_eq!(spi.read_u32(1).await.unwrap(), 0x3456_789A);
        });
    }

    #[test]
    fn nor_transport_reads_through() {
        let mut flash = MockFlash::<256, 64>::new();
        embassy_futures::block_on(async {
            use embedded_storage_async::nor_flash::NorFlash;
            flash.write(16, &[0xDE, 0xAD, 0xBE, 0xEF]).await.unwrap();

            let mut transport = NorTransport::new(flash);
            assert_eq!(transport.read_u32(16).await.unwrap(), 0xDEAD_BEEF);
            assert_eq!(transport.read_u16(20).await.unwrap(), 0xFFFF);
            assert_eq!(transport.read_u8(300).await, Err(Error::Transport));
        });
    }
}

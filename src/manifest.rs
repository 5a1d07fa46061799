//! Reader for the ISPL container header and manifest tables.
//!
//! The container starts with the 4-byte magic `ISPL`. At [`MANIFEST_BASE`] follows the manifest table,
//! whose first record describes the manifest itself: `[base:32][count:32][stride:16]`.
//! Further records follow at `MANIFEST_BASE + index * stride`, all integers big-endian.

use crate::{Error, transport::Transport};

pub const MAGIC: [u8; 4] = *b"ISPL";

/// External flash address of the magic.
pub const HEADER_ADDR: u32 = 0x0000_0000;

/// External flash address of manifest record 0.
pub const MANIFEST_BASE: u32 = 0x0000_0008;

const RECORD_BASE_OFFSET: u32 = 0;
const RECORD_COUNT_OFFSET: u32 = 4;
const RECORD_STRIDE_OFFSET: u32 = 8;

/// Size of the checksum trailing every program image.
pub const CHECKSUM_LEN: u32 = 4;

/// Index into the manifest table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TableIndex(pub u32);

impl TableIndex {
    /// The manifest's own table, describing how many records there are and their stride.
    pub const MANIFEST: TableIndex = TableIndex(0);
    /// The application program image.
    pub const PROGRAM: TableIndex = TableIndex(1);
    /// Audio asset table, used by the application only.
    pub const AUDIO: TableIndex = TableIndex(2);
}

/// One manifest record describing a region of the container.
///
/// For the program table `record_count` is the image length in bytes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TableRecord {
    pub base_addr: u32,
    pub record_count: u32,
    pub record_stride: u16,
}

/// Location of the application image in external flash.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProgramImage {
    pub base_addr: u32,
    /// Length including the trailing checksum.
    pub length: u32,
}

impl ProgramImage {
    pub fn from_record(record: &TableRecord) -> Result<Self, ManifestError> {
        if record.record_count < CHECKSUM_LEN {
            return Err(ManifestError::Format);
        }
        record
            .base_addr
            .checked_add(record.record_count)
            .ok_or(ManifestError::Range)?;

        Ok(Self {
            base_addr: record.base_addr,
            length: record.record_count,
        })
    }

    /// Number of bytes to program into internal flash.
    pub const fn payload_len(&self) -> u32 {
        self.length - CHECKSUM_LEN
    }

    /// External flash address of the big-endian checksum.
    pub const fn checksum_addr(&self) -> u32 {
        self.base_addr + self.payload_len()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ManifestError {
    /// The container magic is missing, or a record is malformed.
    Format,
    /// The requested table does not exist.
    Range,
    /// The external flash could not be read.
    Transport,
}

impl From<Error> for ManifestError {
    fn from(_: Error) -> Self {
        ManifestError::Transport
    }
}

/// Reads the manifest of the container on the external flash.
///
/// Nothing is cached: every call goes to the chip.
pub struct Manifest<'a, T> {
    transport: &'a mut T,
}

impl<'a, T: Transport> Manifest<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self { transport }
    }

    /// Check the container magic.
    pub async fn load_header(&mut self) -> Result<(), ManifestError> {
        let mut magic = [0u8; MAGIC.len()];
        self.transport.read_block(HEADER_ADDR, &mut magic).await?;

        if magic != MAGIC {
            return Err(ManifestError::Format);
        }
        Ok(())
    }

    /// Read record `index` of the manifest table.
    pub async fn load_table(&mut self, index: TableIndex) -> Result<TableRecord, ManifestError> {
        let count = self
            .transport
            .read_u32(MANIFEST_BASE + RECORD_COUNT_OFFSET)
            .await?;
        let stride = self
            .transport
            .read_u16(MANIFEST_BASE + RECORD_STRIDE_OFFSET)
            .await?;

        if index.0 >= count {
            return Err(ManifestError::Range);
        }

        let record = index
            .0
            .checked_mul(stride as u32)
            .and_then(|offset| offset.checked_add(MANIFEST_BASE))
            .filter(|record| record.checked_add(RECORD_STRIDE_OFFSET + 2).is_some())
            .ok_or(ManifestError::Range)?;

        Ok(TableRecord {
            base_addr: self.transport.read_u32(record + RECORD_BASE_OFFSET).await?,
            record_count: self.transport.read_u32(record + RECORD_COUNT_OFFSET).await?,
            record_stride: self.transport.read_u16(record + RECORD_STRIDE_OFFSET).await?,
        })
    }

    /// Check the header and locate the program image.
    pub async fn load_program(&mut self) -> Result<ProgramImage, ManifestError> {
        self.load_header().await?;
        let record = self.load_table(TableIndex::PROGRAM).await?;
        ProgramImage::from_record(&record)
    }
}

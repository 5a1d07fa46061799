//! Host-side construction of ISPL containers.
//!
//! Produces the byte image that gets written to the external flash chip: the `ISPL` header,
//! a three-entry manifest, the program image with its trailing CRC-32 and the audio asset table.

use std::vec::Vec;

use crate::manifest::{MAGIC, MANIFEST_BASE, TableIndex};

/// Format version written after the magic. The bootloader does not interpret it.
pub const VERSION: u32 = 1;

/// Stride of the manifest table records written by this builder: `[base:32][count:32][stride:16]`.
pub const MANIFEST_STRIDE: u16 = 10;

/// Size of one audio asset record: `[kind:8][base:32][len:32][rate:16][flags:32]`.
pub const AUDIO_RECORD_SIZE: u16 = 15;

const MANIFEST_RECORDS: u32 = 3;

/// Encoding of audio asset samples.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AudioKind {
    Unknown = 0,
    /// Unsigned 8-bit PCM.
    Pcm = 1,
}

#[derive(Clone, Debug)]
pub struct AudioAsset {
    pub kind: AudioKind,
    pub sample_rate: u16,
    pub flags: u32,
    pub data: Vec<u8>,
}

/// Checksum stored after the program payload and persisted by the bootloader on success.
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

#[derive(Default)]
pub struct ContainerBuilder {
    program: Vec<u8>,
    audio: Vec<AudioAsset>,
}

/// A built container, with the program location for convenience.
#[derive(Clone, Debug)]
pub struct Container {
    pub bytes: Vec<u8>,
    /// Address of the program image in the container.
    pub program_base: u32,
    /// Length of the program image including its checksum.
    pub program_len: u32,
    pub checksum: u32,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw application binary, starting at flash address 0.
    pub fn program(mut self, program: &[u8]) -> Self {
        self.program = program.to_vec();
        self
    }

    pub fn audio(mut self, asset: AudioAsset) -> Self {
        self.audio.push(asset);
        self
    }

    pub fn build(self) -> Container {
        let checksum = checksum(&self.program);

        let manifest_len = MANIFEST_RECORDS * MANIFEST_STRIDE as u32;
        let program_base = MANIFEST_BASE + manifest_len;
        let program_len = self.program.len() as u32 + 4;
        let audio_base = program_base + program_len;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&VERSION.to_be_bytes());

        let records = [
            (MANIFEST_BASE, MANIFEST_RECORDS, MANIFEST_STRIDE),
            (program_base, program_len, 1),
            (audio_base, self.audio.len() as u32, AUDIO_RECORD_SIZE),
        ];
        debug_assert_eq!(records.len(), TableIndex::AUDIO.0 as usize + 1);
        for (base, count, stride) in records {
            bytes.extend_from_slice(&base.to_be_bytes());
            bytes.extend_from_slice(&count.to_be_bytes());
            bytes.extend_from_slice(&stride.to_be_bytes());
        }

        bytes.extend_from_slice(&self.program);
        bytes.extend_from_slice(&checksum.to_be_bytes());

        let table_len = self.audio.len() as u32 * AUDIO_RECORD_SIZE as u32;
        let mut data_base = audio_base + table_len;
        for asset in &self.audio {
            bytes.push(asset.kind as u8);
            bytes.extend_from_slice(&data_base.to_be_bytes());
            bytes.extend_from_slice(&(asset.data.len() as u32).to_be_bytes());
            bytes.extend_from_slice(&asset.sample_rate.to_be_bytes());
            bytes.extend_from_slice(&asset.flags.to_be_bytes());
            data_base += asset.data.len() as u32;
        }
        for asset in &self.audio {
            bytes.extend_from_slice(&asset.data);
        }

        Container {
            bytes,
            program_base,
            program_len,
            checksum,
        }
    }
}

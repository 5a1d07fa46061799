use core::convert::Infallible;
use std::{collections::VecDeque, vec, vec::Vec};

use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_storage::{ReadStorage, Storage};
use embedded_storage_async::nor_flash::{ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash};

use crate::{
    ERASED, Error,
    config::{PortConfig, Ports},
    state::{Marker, MarkerStore},
    transport::Transport,
};

/// External SPI flash chip holding a container image, reading as erased past its end.
pub struct MockSpiFlash {
    pub data: Vec<u8>,
    pub resets: usize,
    pub failing: bool,
}

impl MockSpiFlash {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            resets: 0,
            failing: false,
        }
    }
}

impl Transport for MockSpiFlash {
    async fn reset(&mut self) -> Result<(), Error> {
        self.resets += 1;
        Ok(())
    }

    async fn read_block(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Error> {
        if self.failing {
            return Err(Error::Transport);
        }

        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self
                .data
                .get(address as usize + i)
                .copied()
                .unwrap_or(ERASED);
        }
        Ok(())
    }
}

/// NOR flash where writes can only clear bits, counting every erase and write.
pub struct MockFlash<const SIZE: usize, const PAGE: usize> {
    pub data: Vec<u8>,
    pub erases: usize,
    pub writes: usize,
    /// Byte address that reads back with its lowest bit flipped after being written.
    pub stuck: Option<u32>,
}

/// Internal flash of the ATtiny861.
pub type ProgramFlash = MockFlash<8192, 64>;

impl<const SIZE: usize, const PAGE: usize> MockFlash<SIZE, PAGE> {
    pub fn new() -> Self {
        Self {
            data: vec![ERASED; SIZE],
            erases: 0,
            writes: 0,
            stuck: None,
        }
    }

    /// Number of erase and write operations performed so far.
    pub fn operations(&self) -> usize {
        self.erases + self.writes
    }

    pub fn word(&self, word: u16) -> u16 {
        let addr = word as usize * 2;
        u16::from_le_bytes([self.data[addr], self.data[addr + 1]])
    }
}

impl<const SIZE: usize, const PAGE: usize> ErrorType for MockFlash<SIZE, PAGE> {
    type Error = NorFlashErrorKind;
}

impl<const SIZE: usize, const PAGE: usize> ReadNorFlash for MockFlash<SIZE, PAGE> {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let offset = offset as usize;
        let end = offset
            .checked_add(bytes.len())
            .filter(|end| *end <= SIZE)
            .ok_or(NorFlashErrorKind::OutOfBounds)?;

        bytes.copy_from_slice(&self.data[offset..end]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        SIZE
    }
}

impl<const SIZE: usize, const PAGE: usize> NorFlash for MockFlash<SIZE, PAGE> {
    const WRITE_SIZE: usize = 2;
    const ERASE_SIZE: usize = PAGE;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        let (from, to) = (from as usize, to as usize);
        if from > to || to > SIZE {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        if from % PAGE != 0 || to % PAGE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }

        self.data[from..to].fill(ERASED);
        self.erases += (to - from) / PAGE;
        Ok(())
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let offset = offset as usize;
        if bytes.len() > SIZE || offset > SIZE - bytes.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        if offset % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }

        for (i, b) in bytes.iter().enumerate() {
            self.data[offset + i] &= *b;
            if self.stuck == Some((offset + i) as u32) {
                self.data[offset + i] ^= 0x01;
            }
        }
        self.writes += 1;
        Ok(())
    }
}

/// Byte-addressable EEPROM, erased to `0xFF`.
pub struct MockEeprom {
    pub data: [u8; 512],
    pub writes: usize,
    pub failing: bool,
}

impl MockEeprom {
    pub const fn new() -> Self {
        Self {
            data: [ERASED; 512],
            writes: 0,
            failing: false,
        }
    }
}

impl ReadStorage for MockEeprom {
    type Error = ();

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        if self.failing {
            return Err(());
        }
        let offset = offset as usize;
        bytes.copy_from_slice(self.data.get(offset..offset + bytes.len()).ok_or(())?);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl Storage for MockEeprom {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.failing {
            return Err(());
        }
        let offset = offset as usize;
        self.data
            .get_mut(offset..offset + bytes.len())
            .ok_or(())?
            .copy_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StoreOp {
    Invalidate,
    Commit(u32),
}

/// Marker store whose reads can be scripted to return unstable values before settling on the stored one.
pub struct ScriptedStore {
    pub stored: Marker,
    pub glitches: VecDeque<Marker>,
    pub gets: usize,
    pub ops: Vec<StoreOp>,
    /// Every `get` reports a storage error.
    pub failing_get: bool,
    /// Every `commit` reports a storage error without storing anything.
    pub failing_commit: bool,
}

impl ScriptedStore {
    pub fn new(stored: Marker) -> Self {
        Self {
            stored,
            glitches: VecDeque::new(),
            gets: 0,
            ops: Vec::new(),
            failing_get: false,
            failing_commit: false,
        }
    }

    pub fn with_glitches(stored: Marker, glitches: &[Marker]) -> Self {
        Self {
            glitches: glitches.iter().copied().collect(),
            ..Self::new(stored)
        }
    }
}

impl MarkerStore for ScriptedStore {
    async fn get(&mut self) -> Result<Marker, Error> {
        self.gets += 1;
        if self.failing_get {
            return Err(Error::Storage);
        }
        Ok(self.glitches.pop_front().unwrap_or(self.stored))
    }

    async fn invalidate(&mut self) -> Result<(), Error> {
        self.stored = Marker::UNSET;
        self.ops.push(StoreOp::Invalidate);
        Ok(())
    }

    async fn commit(&mut self, checksum: u32) -> Result<(), Error> {
        if self.failing_commit {
            return Err(Error::Storage);
        }
        self.stored = Marker(checksum);
        self.ops.push(StoreOp::Commit(checksum));
        Ok(())
    }
}

/// Delay that records every request in microseconds.
///
/// With a budget set, the delay after the budget is exhausted never completes,
/// which allows polling non-returning loops for a bounded number of iterations.
pub struct MockDelay {
    pub calls: Vec<u32>,
    pub budget: Option<usize>,
}

impl MockDelay {
    pub const fn new() -> Self {
        Self {
            calls: Vec::new(),
            budget: None,
        }
    }

    pub const fn with_budget(budget: usize) -> Self {
        Self {
            calls: Vec::new(),
            budget: Some(budget),
        }
    }

    async fn record(&mut self, us: u32) {
        if self.budget.is_some_and(|budget| self.calls.len() >= budget) {
            core::future::pending::<()>().await;
        }
        self.calls.push(us);
    }
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.record(ns.div_ceil(1_000)).await
    }

    async fn delay_us(&mut self, us: u32) {
        self.record(us).await
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.record(ms * 1_000).await
    }
}

/// Pin that remembers its level and counts level changes.
pub struct MockPin {
    pub high: bool,
    pub transitions: usize,
}

impl MockPin {
    pub const fn new(high: bool) -> Self {
        Self {
            high,
            transitions: 0,
        }
    }
}

impl PinErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.high {
            self.transitions += 1;
        }
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.high {
            self.transitions += 1;
        }
        self.high = true;
        Ok(())
    }
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

pub struct MockPorts {
    pub applied: Vec<PortConfig>,
}

impl Ports for MockPorts {
    fn configure(&mut self, config: &PortConfig) {
        self.applied.push(*config);
    }
}

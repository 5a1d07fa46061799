//! Board configuration: flash layout, retry policy, persisted marker location and port setup.

use serde::{Deserialize, Serialize};

use crate::{PAGE_SIZE, WordAddress};

/// Placement of the bootloader in internal flash.
///
/// Everything below the bootloader is application space, of which the final page is reserved for the trampoline.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Layout {
    bootloader_base: u16,
}

impl Layout {
    /// Bootloader placement on the ATtiny861: the top 512 bytes of its 8 KiB flash.
    pub const ATTINY861: Layout = Layout {
        bootloader_base: 0x1E00,
    };

    /// Create a layout for a bootloader starting at byte address `bootloader_base`.
    ///
    /// The base must be page aligned and leave room for at least one application page and the trampoline page.
    pub const fn new(bootloader_base: u16) -> Option<Self> {
        if bootloader_base as usize % PAGE_SIZE != 0 || (bootloader_base as usize) < 2 * PAGE_SIZE
        {
            return None;
        }

        Some(Self { bootloader_base })
    }

    /// Byte address of the first bootloader page.
    pub const fn bootloader_base(&self) -> u16 {
        self.bootloader_base
    }

    /// Word address of the first bootloader instruction.
    pub const fn bootloader_word(&self) -> WordAddress {
        self.bootloader_base / 2
    }

    /// Byte address of the trampoline page, directly below the bootloader.
    pub const fn trampoline_page(&self) -> u16 {
        self.bootloader_base - PAGE_SIZE as u16
    }

    /// Word address of the trampoline landing jump, the last word before the bootloader.
    pub const fn trampoline_word(&self) -> WordAddress {
        self.bootloader_word() - 1
    }

    /// Number of payload bytes that fit below the trampoline page.
    pub const fn programmable_size(&self) -> u32 {
        self.trampoline_page() as u32
    }
}

/// How often and how patiently the persisted marker is compared against the candidate checksum.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    /// Total number of comparisons, at least one is always performed.
    pub attempts: u8,
    /// Pause between two comparisons.
    pub delay_ms: u32,
}

impl RetryPolicy {
    pub const DEFAULT: RetryPolicy = RetryPolicy {
        attempts: 5,
        delay_ms: 100,
    };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Port direction and output register values, applied once before anything else runs.
///
/// Keeps the amplifier shut down and the flash chip deselected while the bootloader is active.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortConfig {
    pub port_a: u8,
    pub ddr_a: u8,
    pub port_b: u8,
    pub ddr_b: u8,
}

impl PortConfig {
    // PA7 amplifier /SHUTDOWN, PA5..PA4 rate select inputs with pull-ups, PA3..PA0 flash SPI
    // (MISO pulled up), port B all outputs driven low.
    pub const ATTINY861: PortConfig = PortConfig {
        port_a: 0b0011_1001,
        ddr_a: 0b1100_1110,
        port_b: 0b0000_0000,
        ddr_b: 0b1111_1111,
    };
}

/// Applies a [`PortConfig`] to the hardware.
pub trait Ports {
    fn configure(&mut self, config: &PortConfig);
}

impl<P: Ports> Ports for &mut P {
    fn configure(&mut self, config: &PortConfig) {
        P::configure(self, config)
    }
}

/// Everything the bootloader needs to know about the board.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub layout: Layout,
    pub retry: RetryPolicy,
    /// Byte offset of the completion marker slot in EEPROM.
    pub marker_offset: u32,
    /// Time given to the supply to settle before the external flash is touched.
    pub power_up_delay_ms: u32,
    pub ports: PortConfig,
}

impl Config {
    pub const ATTINY861: Config = Config {
        layout: Layout::ATTINY861,
        retry: RetryPolicy::DEFAULT,
        marker_offset: 508,
        power_up_delay_ms: 100,
        ports: PortConfig::ATTINY861,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::ATTINY861
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attiny861_layout() {
        let layout = Layout::ATTINY861;

        assert_eq!(layout.bootloader_word(), 0xF00);
        assert_eq!(layout.trampoline_page(), 0x1DC0);
        assert_eq!(layout.trampoline_word(), 0xEFF);
        assert_eq!(layout.programmable_size(), 0x1DC0);
    }

    #[test]
    fn layout_rejects_bad_base() {
        assert_eq!(Layout::new(0x1E00), Some(Layout::ATTINY861));
        assert_eq!(Layout::new(0x1E01), None);
        assert_eq!(Layout::new(0x1E20), None);
        assert_eq!(Layout::new(PAGE_SIZE as u16), None);
        assert!(Layout::new(2 * PAGE_SIZE as u16).is_some());
    }

    #[cfg(feature = "simple_state")]
    #[test]
    fn config_roundtrips_through_postcard() {
        let mut buf = [0u8; 32];
        let used = postcard::to_slice(&Config::ATTINY861, &mut buf).unwrap();
        let config: Config = postcard::from_bytes(used).unwrap();

        assert_eq!(config, Config::default());
    }
}

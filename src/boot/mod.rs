#[cfg(feature = "avr")]
pub mod avr;

use crate::WordAddress;

/// Bootload mechanism that transfers control to the application.
pub trait Boot {
    /// Jump to the instruction at word address `entry`, typically the trampoline landing jump.
    ///
    /// # Safety
    /// `entry` must hold valid code, and no state of the bootloader may be relied upon afterwards.
    unsafe fn boot(entry: WordAddress) -> !;
}

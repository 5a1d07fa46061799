//! Encoding and relocation of the AVR `rjmp` instruction.
//!
//! An `rjmp` is `1100 kkkk kkkk kkkk`: a 12-bit signed word offset `k`, jumping from word `pc` to `pc + 1 + k`.
//! On parts with at most 8 KiB of flash the program counter wraps at 4096 words,
//! so every target is reachable and all arithmetic here is modulo 4096.

use crate::WordAddress;

pub const OPCODE: u16 = 0xC000;
const OPCODE_MASK: u16 = 0xF000;
const OFFSET_MASK: u16 = 0x0FFF;

/// Whether `instruction` is a relative jump.
pub const fn is_rjmp(instruction: u16) -> bool {
    instruction & OPCODE_MASK == OPCODE
}

/// Encode a relative jump with a (wrapping) word offset.
pub const fn encode(offset: u16) -> u16 {
    OPCODE | (offset & OFFSET_MASK)
}

/// The 12-bit offset field of a relative jump.
pub const fn offset(instruction: u16) -> u16 {
    instruction & OFFSET_MASK
}

/// Word address a relative jump placed at `at` lands on.
pub const fn target(instruction: u16, at: WordAddress) -> WordAddress {
    at.wrapping_add(1).wrapping_add(offset(instruction)) & OFFSET_MASK
}

/// The jump placed at word 0 so that a reset enters the bootloader at `bootloader_word`.
pub const fn reset_jump(bootloader_word: WordAddress) -> u16 {
    encode(bootloader_word.wrapping_sub(1))
}

/// Re-express the application's reset jump, originally at word 0, for the trampoline word `bootloader_word - 1`.
///
/// The result lands on the same absolute instruction as `instruction` did.
pub const fn relocate(instruction: u16, bootloader_word: WordAddress) -> u16 {
    encode(offset(instruction).wrapping_sub(bootloader_word.wrapping_sub(1)))
}

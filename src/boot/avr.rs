use crate::{WordAddress, boot::Boot};

/// Jump for AVR cores, where code pointers are word addresses.
pub struct Avr;

impl Boot for Avr {
    unsafe fn boot(entry: WordAddress) -> ! {
        let entry: extern "C" fn() -> ! =
            unsafe { core::mem::transmute::<usize, extern "C" fn() -> !>(entry as usize) };
        entry()
    }
}

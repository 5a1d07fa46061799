//! Audible signal for a device that has nothing to boot.

use embedded_hal::digital::{InputPin, OutputPin, PinState};
use embedded_hal_async::delay::DelayNs;

/// Output toggles per tone burst.
pub const BURST_TOGGLES: u16 = 150;

/// Silence between two bursts.
pub const BURST_PAUSE_MS: u32 = 1000;

/// Half period of the tone for the two rate select inputs, `rate = (high << 1) | low`.
pub const fn half_period_us(rate: u8) -> u32 {
    500 + 250 * (rate & 0b11) as u32
}

/// Terminal diagnostic signal. Never returns and never re-evaluates anything.
#[allow(async_fn_in_trait)]
pub trait Indicator {
    async fn signal<D: DelayNs>(self, delay: &mut D) -> !;
}

/// Beeps through the amplifier in bursts, with a pitch selected by two input pins.
pub struct ToneIndicator<A, O, L, H> {
    amplifier: A,
    output: O,
    rate_low: L,
    rate_high: H,
}

impl<A, O, L, H> ToneIndicator<A, O, L, H>
where
    A: OutputPin,
    O: OutputPin,
    L: InputPin,
    H: InputPin,
{
    /// `amplifier` enables the amplifier when driven high, `output` drives the speaker.
    pub fn new(amplifier: A, output: O, rate_low: L, rate_high: H) -> Self {
        Self {
            amplifier,
            output,
            rate_low,
            rate_high,
        }
    }

    /// Pins that cannot be read count as low.
    fn rate(&mut self) -> u8 {
        let low = self.rate_low.is_high().unwrap_or(false) as u8;
        let high = self.rate_high.is_high().unwrap_or(false) as u8;
        (high << 1) | low
    }
}

impl<A, O, L, H> Indicator for ToneIndicator<A, O, L, H>
where
    A: OutputPin,
    O: OutputPin,
    L: InputPin,
    H: InputPin,
{
    async fn signal<D: DelayNs>(mut self, delay: &mut D) -> ! {
        // Nothing left to recover to if a pin fails, keep going regardless.
        let _ = self.amplifier.set_high();
        let mut level = PinState::Low;

        loop {
            for _ in 0..BURST_TOGGLES {
                level = !level;
                let _ = self.output.set_state(level);

                let rate = self.rate();
                delay.delay_us(half_period_us(rate)).await;
            }

            delay.delay_ms(BURST_PAUSE_MS).await;
        }
    }
}

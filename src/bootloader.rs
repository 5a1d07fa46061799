//! Power-on sequence: read the container, decide, reprogram if needed, then boot or signal.

use embedded_hal_async::delay::DelayNs;
use embedded_storage_async::nor_flash::NorFlash;

use crate::{
    boot::Boot,
    config::{Config, Ports},
    decision::{self, Outcome},
    fallback::Indicator,
    log,
    manifest::Manifest,
    programmer::Programmer,
    state::MarkerStore,
    transport::Transport,
};

/// Where the power-on sequence ends up.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// Jump through the trampoline into the application.
    Boot,
    /// Nothing to boot, signal the fallback tone forever.
    Fallback,
}

/// The bootloader, owning every collaborator for the duration of the boot.
///
/// Interrupts and the watchdog must be disabled before it runs; nothing here re-enables them.
pub struct Bootloader<T, F, S, D> {
    config: Config,
    transport: T,
    flash: F,
    store: S,
    delay: D,
}

impl<T, F, S, D> Bootloader<T, F, S, D>
where
    T: Transport,
    F: NorFlash,
    S: MarkerStore,
    D: DelayNs,
{
    pub fn new(config: Config, transport: T, flash: F, store: S, delay: D) -> Self {
        Self {
            config,
            transport,
            flash,
            store,
            delay,
        }
    }

    /// Give back the collaborators.
    pub fn release(self) -> (T, F, S, D) {
        (self.transport, self.flash, self.store, self.delay)
    }

    /// Decide and, if required, reprogram the application.
    ///
    /// A failed programming run still resolves to [`Resolution::Boot`]: page 0 already jumps into
    /// the bootloader, and the invalid marker makes the next boot try again.
    pub async fn update(&mut self) -> Resolution {
        let candidate = Manifest::new(&mut self.transport).load_program().await;

        let outcome = decision::decide(
            candidate,
            &mut self.transport,
            &mut self.store,
            &mut self.delay,
            &self.config.retry,
        )
        .await;
        log::info!("Outcome: {:?}", outcome);

        match outcome {
            Outcome::UpToDate => Resolution::Boot,
            Outcome::NeverFlashed => Resolution::Fallback,
            Outcome::UpdateRequired { image, checksum } => {
                let mut programmer = Programmer::new(
                    self.config.layout,
                    &mut self.transport,
                    &mut self.flash,
                    &mut self.store,
                );

                match programmer.program(&image, checksum).await {
                    Ok(report) => log::info!("Update complete: {:?}", report),
                    Err(e) => log::error!("Update failed: {:?}", e),
                }
                Resolution::Boot
            }
        }
    }

    /// Run the complete power-on sequence. Never returns.
    pub async fn run<B, P, I>(mut self, mut ports: P, indicator: I) -> !
    where
        B: Boot,
        P: Ports,
        I: Indicator,
    {
        ports.configure(&self.config.ports);

        self.delay.delay_ms(self.config.power_up_delay_ms).await;

        if let Err(e) = self.transport.reset().await {
            // A dead chip reads as an invalid container.
            log::warn!("Transport reset failed: {:?}", e);
        }

        match self.update().await {
            Resolution::Fallback => {
                log::warn!("Nothing to boot");
                indicator.signal(&mut self.delay).await
            }
            Resolution::Boot => {
                let entry = self.config.layout.trampoline_word();
                log::info!("Booting via {:?}", entry);
                unsafe { B::boot(entry) }
            }
        }
    }
}

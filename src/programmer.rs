//! Reprogramming of internal flash from the candidate image.
//!
//! The sequence survives power loss at any point: the marker is invalidated before flash is
//! touched and committed only after every page and the trampoline verified, so an interrupted
//! update is simply repeated in full on the next boot.
//!
//! Page 0 is written with a jump into the bootloader instead of the application's reset vector,
//! so a reset always enters the bootloader first. The application's own reset jump is relocated
//! into the last word of the trampoline page, directly below the bootloader, from where the
//! bootloader hands over control.
//!
//! There is no rollback. After a verify failure the application pages written so far stay as
//! they are; the device keeps entering the bootloader and retrying until an update completes.

use embedded_storage_async::nor_flash::NorFlash;

use crate::{
    ERASED, Error, PAGE_SIZE,
    config::Layout,
    log,
    manifest::ProgramImage,
    rjmp,
    state::MarkerStore,
    transport::Transport,
};

/// Progress of a programming run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    Idle,
    Invalidate,
    EraseAll,
    WritePages,
    WriteTrampoline,
    VerifyTrampoline,
    Commit,
    Done,
    /// Terminal for this boot; the marker stays invalid so the next boot starts over.
    Failed,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgramError {
    /// The payload does not fit below the trampoline page. Nothing was touched.
    ImageTooLarge { payload_len: u32 },
    /// The image holds only its checksum. Nothing was touched.
    EmptyImage,
    /// A programmed page did not read back as written.
    Verify { page: u16 },
    /// The trampoline jump did not read back as written.
    TrampolineVerify { expected: u16, found: u16 },
    Transport,
    Flash,
    Storage,
}

impl From<Error> for ProgramError {
    fn from(e: Error) -> Self {
        match e {
            Error::Transport => ProgramError::Transport,
            Error::Flash => ProgramError::Flash,
            Error::Storage => ProgramError::Storage,
        }
    }
}

/// Summary of a completed programming run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Report {
    pub pages_written: u16,
    /// The relocated application reset jump placed in the trampoline.
    pub trampoline_jump: u16,
}

type Page = [u8; PAGE_SIZE];

pub struct Programmer<'a, T, F, S> {
    layout: Layout,
    transport: &'a mut T,
    flash: &'a mut F,
    store: &'a mut S,
    phase: Phase,
}

impl<'a, T, F, S> Programmer<'a, T, F, S>
where
    T: Transport,
    F: NorFlash,
    S: MarkerStore,
{
    pub fn new(layout: Layout, transport: &'a mut T, flash: &'a mut F, store: &'a mut S) -> Self {
        debug_assert_eq!(F::ERASE_SIZE, PAGE_SIZE);

        Self {
            layout,
            transport,
            flash,
            store,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Program `image` into internal flash and commit `checksum` once everything verified.
    pub async fn program(
        &mut self,
        image: &ProgramImage,
        checksum: u32,
    ) -> Result<Report, ProgramError> {
        let result = self.run(image, checksum).await;
        if let Err(e) = &result {
            log::error!("Programming failed in {:?}: {:?}", self.phase, e);
            self.phase = Phase::Failed;
        }
        result
    }

    async fn run(&mut self, image: &ProgramImage, checksum: u32) -> Result<Report, ProgramError> {
        let payload_len = image.payload_len();
        if payload_len == 0 {
            return Err(ProgramError::EmptyImage);
        }
        if payload_len > self.layout.programmable_size() {
            return Err(ProgramError::ImageTooLarge { payload_len });
        }

        self.enter(Phase::Invalidate);
        self.store.invalidate().await?;

        self.enter(Phase::EraseAll);
        self.erase_all().await?;

        self.enter(Phase::WritePages);
        let (pages_written, trampoline_jump) = self.write_pages(image).await?;

        self.enter(Phase::WriteTrampoline);
        self.write_trampoline(trampoline_jump).await?;

        self.enter(Phase::VerifyTrampoline);
        self.verify_trampoline(trampoline_jump).await?;

        self.enter(Phase::Commit);
        self.store.commit(checksum).await?;

        self.enter(Phase::Done);
        Ok(Report {
            pages_written,
            trampoline_jump,
        })
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("{:?}", phase);
        self.phase = phase;
    }

    async fn erase_page(&mut self, addr: u32) -> Result<(), ProgramError> {
        self.flash
            .erase(addr, addr + PAGE_SIZE as u32)
            .await
            .map_err(|_| ProgramError::Flash)
    }

    /// Erase everything between page 0 and the bootloader.
    ///
    /// Page 0 keeps jumping into the bootloader until it is rewritten.
    async fn erase_all(&mut self) -> Result<(), ProgramError> {
        let end = self.layout.bootloader_base() as u32;
        let mut addr = PAGE_SIZE as u32;
        while addr < end {
            self.erase_page(addr).await?;
            addr += PAGE_SIZE as u32;
        }
        Ok(())
    }

    /// Returns the number of pages written and the relocated application reset jump.
    async fn write_pages(&mut self, image: &ProgramImage) -> Result<(u16, u16), ProgramError> {
        let bootloader_word = self.layout.bootloader_word();
        let mut buffer: Page = [ERASED; PAGE_SIZE];
        let mut remaining = image.payload_len();
        let mut addr = 0u32;
        let mut pages = 0u16;
        let mut app_jump = u16::from_le_bytes([ERASED, ERASED]);

        while remaining > 0 {
            let len = remaining.min(PAGE_SIZE as u32) as usize;

            self.erase_page(addr).await?;

            self.transport
                .read_block(image.base_addr + addr, &mut buffer[..len])
                .await?;
            buffer[len..].fill(ERASED);

            if addr == 0 {
                let reset_vector = u16::from_le_bytes([buffer[0], buffer[1]]);
                if !rjmp::is_rjmp(reset_vector) {
                    log::warn!("Reset vector {:?} is not an rjmp", reset_vector);
                }
                app_jump = rjmp::relocate(reset_vector, bootloader_word);
                buffer[..2].copy_from_slice(&rjmp::reset_jump(bootloader_word).to_le_bytes());
            }

            self.flash
                .write(addr, &buffer)
                .await
                .map_err(|_| ProgramError::Flash)?;
            self.verify_page(addr, &buffer).await?;

            addr += PAGE_SIZE as u32;
            remaining -= len as u32;
            pages += 1;
        }

        log::info!("Wrote {} pages", pages);
        Ok((pages, app_jump))
    }

    async fn verify_page(&mut self, addr: u32, expected: &Page) -> Result<(), ProgramError> {
        let mut readback: Page = [0u8; PAGE_SIZE];
        self.flash
            .read(addr, &mut readback)
            .await
            .map_err(|_| ProgramError::Flash)?;

        if readback != *expected {
            return Err(ProgramError::Verify {
                page: (addr / PAGE_SIZE as u32) as u16,
            });
        }
        Ok(())
    }

    async fn write_trampoline(&mut self, app_jump: u16) -> Result<(), ProgramError> {
        let addr = self.layout.trampoline_page() as u32;
        let mut buffer: Page = [ERASED; PAGE_SIZE];
        buffer[PAGE_SIZE - 2..].copy_from_slice(&app_jump.to_le_bytes());

        self.erase_page(addr).await?;
        self.flash
            .write(addr, &buffer)
            .await
            .map_err(|_| ProgramError::Flash)
    }

    async fn verify_trampoline(&mut self, expected: u16) -> Result<(), ProgramError> {
        let addr = self.layout.trampoline_word() as u32 * 2;
        let mut word = [0u8; 2];
        self.flash
            .read(addr, &mut word)
            .await
            .map_err(|_| ProgramError::Flash)?;

        let found = u16::from_le_bytes(word);
        if found != expected {
            return Err(ProgramError::TrampolineVerify { expected, found });
        }
        Ok(())
    }
}

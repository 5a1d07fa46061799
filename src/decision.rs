//! Decides whether internal flash has to be reprogrammed.

use embedded_hal_async::delay::DelayNs;

use crate::{
    config::RetryPolicy,
    log,
    manifest::{ManifestError, ProgramImage},
    state::MarkerStore,
    transport::Transport,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The application in internal flash is current, or no candidate exists but a previous update completed.
    UpToDate,
    /// The candidate differs from what was last committed.
    UpdateRequired { image: ProgramImage, checksum: u32 },
    /// No candidate and no update ever completed: there is nothing to boot.
    NeverFlashed,
}

/// Compare the candidate's checksum against the persisted marker.
///
/// Both values are re-read on every attempt so that a single unstable read does not trigger a reflash.
/// Failed reads count as a mismatch for that attempt.
pub async fn decide<T, S, D>(
    candidate: Result<ProgramImage, ManifestError>,
    transport: &mut T,
    store: &mut S,
    delay: &mut D,
    policy: &RetryPolicy,
) -> Outcome
where
    T: Transport,
    S: MarkerStore,
    D: DelayNs,
{
    let image = match candidate {
        Ok(image) => image,
        Err(e) => {
            log::info!("No valid container: {:?}", e);
            return without_candidate(store).await;
        }
    };

    let attempts = policy.attempts.max(1);
    let mut checksum = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            delay.delay_ms(policy.delay_ms).await;
        }

        let candidate = transport.read_u32(image.checksum_addr()).await.ok();
        if candidate.is_some() {
            checksum = candidate;
        }
        let marker = store.get().await;

        log::debug!(
            "Attempt {}: candidate {:?} marker {:?}",
            attempt,
            candidate,
            marker
        );

        if let (Some(candidate), Ok(marker)) = (candidate, marker) {
            if marker.matches(candidate) {
                return Outcome::UpToDate;
            }
        }
    }

    match checksum {
        Some(checksum) => Outcome::UpdateRequired { image, checksum },
        None => {
            log::warn!("Candidate checksum unreadable");
            without_candidate(store).await
        }
    }
}

async fn without_candidate<S: MarkerStore>(store: &mut S) -> Outcome {
    match store.get().await {
        Ok(marker) if marker.is_unset() => Outcome::NeverFlashed,
        // An unreadable marker is not proof that nothing was ever flashed.
        _ => Outcome::UpToDate,
    }
}

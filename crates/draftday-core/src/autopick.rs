//! Fallback selection for participants who do not pick in time.
//!
//! The [`Autopicker`] only ever chooses from an [`Eligibility`] candidate
//! list, so a fallback pick obeys exactly the same cap (and override) as a
//! manual one. Scripted seats use their configured strategy and are paced
//! by an artificial delay; human seats that ran out of time get a uniform
//! random choice immediately.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use draftday_types::{AutopickStrategy, Item, Participant};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use crate::config::AutopickConfig;
use crate::eligibility::Eligibility;

/// Chooses items on behalf of participants.
#[derive(Debug)]
pub struct Autopicker {
    rng: Mutex<StdRng>,
    scripted_delay: Duration,
}

impl Autopicker {
    /// Build a selector from configuration. A configured seed makes every
    /// random choice reproducible.
    pub fn new(config: &AutopickConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            rng: Mutex::new(rng),
            scripted_delay: config.scripted_delay(),
        }
    }

    /// Pause before a fallback pick for `participant` is recorded.
    pub const fn delay_for(&self, participant: &Participant) -> Duration {
        if participant.is_scripted() {
            self.scripted_delay
        } else {
            Duration::ZERO
        }
    }

    /// Choose an item for `participant`, or `None` if nothing is left.
    pub fn choose<'a>(
        &self,
        participant: &Participant,
        eligibility: &Eligibility<'a>,
    ) -> Option<&'a Item> {
        let candidates = eligibility.candidates();
        if !participant.is_scripted() {
            return self.random(candidates);
        }
        match participant.strategy {
            AutopickStrategy::Random => self.random(candidates),
            AutopickStrategy::Alphabetical => candidates
                .iter()
                .copied()
                .min_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))),
            AutopickStrategy::PreferenceOrder => participant
                .preferences
                .iter()
                .find_map(|wanted| candidates.iter().copied().find(|item| item.id == *wanted))
                .or_else(|| self.random(candidates)),
        }
    }

    fn random<'a>(&self, candidates: &[&'a Item]) -> Option<&'a Item> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        candidates.choose(&mut *rng).copied()
    }
}

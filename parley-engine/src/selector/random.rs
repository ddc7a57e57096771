use super::{trivial_choice, ActionSelector, Selection};
use async_trait::async_trait;
use parley_core::{ActionContext, ActionSpace, ConfigurationError, ParleyResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Uniform choice over the narrowed space.
#[derive(Debug)]
pub struct RandomSelector {
    rng: Mutex<StdRng>,
}

impl RandomSelector {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Reproducible choices for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionSelector for RandomSelector {
    async fn select(&self, space: &ActionSpace, _ctx: &ActionContext) -> ParleyResult<Selection> {
        if let Some(selection) = trivial_choice(space)? {
            return Ok(selection);
        }
        let index = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_range(0..space.len());
        let action = space
            .get_index(index)
            .cloned()
            .ok_or(ConfigurationError::EmptyActionSpace)?;
        tracing::debug!(action = %action.key(), candidates = space.len(), "Random selection");
        Ok(Selection::new(action))
    }
}

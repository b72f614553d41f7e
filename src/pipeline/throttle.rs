//! Round-robin throttling of relay-set recomputation.

use crate::core::frame::AccountId;

/// Picks which participants get their relay set recomputed this tick.
///
/// The cursor walks the registry in its stable order and wraps modulo the
/// current size, so with a steady registry of `K` participants and a budget
/// of one, each participant is refreshed exactly once every `K` ticks.
#[derive(Debug, Clone)]
pub struct RelayScheduler {
    per_tick: usize,
    cursor: usize,
}

impl RelayScheduler {
    pub fn new(per_tick: usize) -> Self {
        Self {
            per_tick,
            cursor: 0,
        }
    }

    pub fn per_tick(&self) -> usize {
        self.per_tick
    }

    /// Next batch out of `ids`. Empty when `ids` is empty or the budget is 0.
    /// Never yields the same id twice in one batch.
    pub fn next_batch(&mut self, ids: &[AccountId]) -> Vec<AccountId> {
        if ids.is_empty() || self.per_tick == 0 {
            return Vec::new();
        }
        let count = self.per_tick.min(ids.len());
        let start = self.cursor % ids.len();
        let batch = (0..count).map(|i| ids[(start + i) % ids.len()]).collect();
        self.cursor = (start + count) % ids.len();
        batch
    }
}

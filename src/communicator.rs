// Copyright 2025 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

//! Collective operations between cooperating walkers.
//!
//! Each walker runs its own copy of a sampling method and contributes to shared
//! statistics through an element-wise sum. Every walker in a group must enter
//! [`Communicator::all_reduce_sum`] the same number of times, in the same order.

use crate::BasisError;
use anyhow::{anyhow, bail, Result};
use std::sync::{Arc, Condvar, Mutex};

/// Collective communication between walkers.
pub trait Communicator: std::fmt::Debug + Send {
    /// Index of this walker within the group.
    fn rank(&self) -> usize;
    /// Number of walkers in the group.
    fn size(&self) -> usize;
    /// Replace `buffer` with the element-wise sum over all walkers.
    ///
    /// Blocks until every walker has contributed. Fails with
    /// [`BasisError::Aborted`] if any walker aborted the group.
    fn all_reduce_sum(&self, buffer: &mut [f64]) -> Result<()>;
    /// Abort the whole group, releasing walkers blocked in a reduction.
    fn abort(&self, reason: &str);
    /// The walker responsible for output shared by the group.
    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// A group of exactly one walker; reductions are the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleWalker;

impl Communicator for SingleWalker {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn all_reduce_sum(&self, _buffer: &mut [f64]) -> Result<()> {
        Ok(())
    }
    fn abort(&self, reason: &str) {
        log::error!("Aborting: {}", reason);
    }
}

#[derive(Debug, Default)]
struct ReductionState {
    /// Incremented each time a reduction completes.
    generation: u64,
    /// Walkers that have contributed to the ongoing reduction.
    arrived: usize,
    sum: Vec<f64>,
    /// Result of the last completed reduction.
    result: Vec<f64>,
    aborted: Option<String>,
}

#[derive(Debug)]
struct Shared {
    size: usize,
    state: Mutex<ReductionState>,
    completed: Condvar,
}

/// Walkers running as threads of one process.
///
/// [`WalkerGroup::new`] returns one handle per walker; move each into its thread.
#[derive(Debug, Clone)]
pub struct WalkerGroup {
    rank: usize,
    shared: Arc<Shared>,
}

impl WalkerGroup {
    /// Create handles for `size` walkers, ordered by rank.
    pub fn new(size: usize) -> Vec<Self> {
        assert!(size > 0, "a walker group needs at least one walker");
        let shared = Arc::new(Shared {
            size,
            state: Mutex::new(ReductionState::default()),
            completed: Condvar::new(),
        });
        (0..size)
            .map(|rank| Self {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Communicator for WalkerGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn all_reduce_sum(&self, buffer: &mut [f64]) -> Result<()> {
        let poisoned = |_| anyhow!("walker group state is poisoned");
        let mut state = self.shared.state.lock().map_err(poisoned)?;
        if let Some(reason) = &state.aborted {
            return Err(BasisError::Aborted {
                reason: reason.clone(),
            }
            .into());
        }
        if state.arrived == 0 {
            state.sum.clear();
            state.sum.resize(buffer.len(), 0.0);
        } else if state.sum.len() != buffer.len() {
            bail!(
                "walker {} reduces {} values but the group expects {}",
                self.rank,
                buffer.len(),
                state.sum.len()
            );
        }
        state
            .sum
            .iter_mut()
            .zip(buffer.iter())
            .for_each(|(s, b)| *s += b);
        state.arrived += 1;

        let generation = state.generation;
        if state.arrived == self.shared.size {
            state.result = std::mem::take(&mut state.sum);
            state.arrived = 0;
            state.generation += 1;
            self.shared.completed.notify_all();
        } else {
            state = self
                .shared
                .completed
                .wait_while(state, |s| s.generation == generation && s.aborted.is_none())
                .map_err(poisoned)?;
            if state.generation == generation {
                let reason = state.aborted.clone().unwrap_or_default();
                return Err(BasisError::Aborted { reason }.into());
            }
        }
        buffer.copy_from_slice(&state.result);
        Ok(())
    }

    fn abort(&self, reason: &str) {
        log::error!("Walker {} aborting the group: {}", self.rank, reason);
        if let Ok(mut state) = self.shared.state.lock() {
            state.aborted.get_or_insert_with(|| reason.to_string());
        }
        self.shared.completed.notify_all();
    }
}

//! Uniform replay buffer for P-DQN.
//!
//! - **Ring buffer** semantics: once full, each insert overwrites the oldest slot (FIFO eviction)
//! - **Uniform sampling without replacement** via a partial Fisher-Yates shuffle
//! - **Shape validation** on insert, so a sampled batch always has uniform columns
//!
//! The buffer is single-writer/single-reader: `add` and `sample` take `&mut self`.

use crate::core::transition::{Transition, TransitionBatch};
use crate::error::{PdqnError, Result};

// ============================================================================
// Buffer Configuration
// ============================================================================

/// Configuration for the replay buffer.
#[derive(Debug, Clone)]
pub struct ReplayBufferConfig {
    /// Maximum number of transitions to store.
    pub capacity: usize,
    /// Length of every state / next-state vector.
    pub state_dim: usize,
    /// Length of every full action-parameter vector.
    pub param_dim: usize,
    /// Number of discrete actions (for validating action indices).
    pub num_actions: usize,
}

impl ReplayBufferConfig {
    /// Create a new buffer config.
    pub fn new(capacity: usize, state_dim: usize, param_dim: usize, num_actions: usize) -> Self {
        Self {
            capacity,
            state_dim,
            param_dim,
            num_actions,
        }
    }

    /// Builder pattern: set capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

// ============================================================================
// Ring Buffer (Internal)
// ============================================================================

/// Ring buffer with O(1) insert and random access.
///
/// Overwrites oldest elements when capacity is reached.
#[derive(Debug)]
struct RingBuffer<T> {
    buffer: Vec<T>,
    capacity: usize,
    /// Next position to write (circular). Once full, this is also the oldest slot.
    write_pos: usize,
}

impl<T> RingBuffer<T> {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity.min(1 << 16)),
            capacity,
            write_pos: 0,
        }
    }

    fn push(&mut self, item: T) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(item);
        } else {
            self.buffer[self.write_pos] = item;
        }
        self.write_pos = (self.write_pos + 1) % self.capacity;
    }

    #[inline]
    fn get(&self, idx: usize) -> &T {
        &self.buffer[idx]
    }

    #[inline]
    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.write_pos = 0;
    }

    /// Iterate from oldest to newest.
    fn iter_ordered(&self) -> impl Iterator<Item = &T> {
        let split = if self.buffer.len() < self.capacity {
            0
        } else {
            self.write_pos
        };
        self.buffer[split..].iter().chain(self.buffer[..split].iter())
    }
}

// ============================================================================
// Replay Buffer
// ============================================================================

/// Fixed-capacity FIFO experience store with uniform sampling.
#[derive(Debug)]
pub struct ReplayBuffer {
    config: ReplayBufferConfig,
    storage: RingBuffer<Transition>,
    rng: fastrand::Rng,
    /// Total transitions ever added (including evicted ones).
    total_added: u64,
}

impl ReplayBuffer {
    /// Create a new replay buffer with an entropy-seeded RNG.
    pub fn new(config: ReplayBufferConfig) -> Result<Self> {
        Self::with_rng(config, fastrand::Rng::new())
    }

    /// Create a new replay buffer with a fixed sampling seed.
    pub fn with_seed(config: ReplayBufferConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(config: ReplayBufferConfig, rng: fastrand::Rng) -> Result<Self> {
        if config.capacity == 0 {
            return Err(PdqnError::InvalidConfig(
                "replay buffer capacity must be positive".into(),
            ));
        }
        Ok(Self {
            storage: RingBuffer::new(config.capacity),
            config,
            rng,
            total_added: 0,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReplayBufferConfig {
        &self.config
    }

    /// Append a transition, evicting the oldest one if the buffer is full.
    ///
    /// Fails with `ShapeMismatch` if the transition does not match the configured
    /// state / parameter lengths; nothing is stored in that case.
    pub fn add(&mut self, transition: Transition) -> Result<()> {
        self.validate(&transition)?;
        self.storage.push(transition);
        self.total_added += 1;
        Ok(())
    }

    /// Sample `batch_size` distinct transitions uniformly at random.
    ///
    /// Returns `InsufficientData` if fewer than `batch_size` transitions are stored.
    pub fn sample(&mut self, batch_size: usize) -> Result<TransitionBatch> {
        let indices = self.sample_indices(batch_size)?;
        Ok(TransitionBatch::from_transitions(
            indices.iter().map(|&idx| self.storage.get(idx)),
        ))
    }

    /// Sample `batch_size` distinct storage indices.
    fn sample_indices(&mut self, batch_size: usize) -> Result<Vec<usize>> {
        let len = self.storage.len();
        if len < batch_size {
            return Err(PdqnError::InsufficientData {
                requested: batch_size,
                available: len,
            });
        }

        // Partial Fisher-Yates shuffle on indices
        let mut indices: Vec<usize> = (0..len).collect();
        for i in 0..batch_size {
            let j = self.rng.usize(i..len);
            indices.swap(i, j);
        }
        indices.truncate(batch_size);
        Ok(indices)
    }

    /// Current number of stored transitions.
    pub fn size(&self) -> usize {
        self.storage.len()
    }

    /// Maximum number of stored transitions.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    /// Check if at capacity.
    pub fn is_full(&self) -> bool {
        self.storage.len() == self.config.capacity
    }

    /// Total transitions ever added.
    pub fn total_added(&self) -> u64 {
        self.total_added
    }

    /// Remove all transitions.
    pub fn clear(&mut self) {
        self.storage.clear();
    }

    /// Iterate stored transitions from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.storage.iter_ordered()
    }

    fn validate(&self, t: &Transition) -> Result<()> {
        if t.state.len() != self.config.state_dim {
            return Err(PdqnError::shape("state", self.config.state_dim, t.state.len()));
        }
        if t.next_state.len() != self.config.state_dim {
            return Err(PdqnError::shape(
                "next state",
                self.config.state_dim,
                t.next_state.len(),
            ));
        }
        if t.action_params.len() != self.config.param_dim {
            return Err(PdqnError::shape(
                "action parameters",
                self.config.param_dim,
                t.action_params.len(),
            ));
        }
        if t.action >= self.config.num_actions {
            return Err(PdqnError::InvalidConfig(format!(
                "action {} out of range for {} actions",
                t.action, self.config.num_actions
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn config(capacity: usize) -> ReplayBufferConfig {
        ReplayBufferConfig::new(capacity, 1, 2, 2)
    }

    fn tagged(tag: usize) -> Transition {
        Transition::new(
            vec![tag as f32],
            tag % 2,
            vec![0.0, 0.0],
            tag as f32,
            vec![tag as f32 + 1.0],
            false,
            false,
        )
    }

    fn stored_tags(buffer: &ReplayBuffer) -> Vec<usize> {
        buffer.iter().map(|t| t.state[0] as usize).collect()
    }

    #[test]
    fn test_capacity_three_keeps_last_three() {
        let mut buffer = ReplayBuffer::with_seed(config(3), 0).unwrap();
        for tag in 1..=4 {
            buffer.add(tagged(tag)).unwrap();
        }

        assert_eq!(buffer.size(), 3);
        assert_eq!(stored_tags(&buffer), vec![2, 3, 4]);
    }

    #[test]
    fn test_fifo_invariant_many_inserts() {
        let capacity = 7;
        let mut buffer = ReplayBuffer::with_seed(config(capacity), 1).unwrap();
        for tag in 0..50 {
            buffer.add(tagged(tag)).unwrap();
            assert!(buffer.size() <= capacity);
        }

        assert!(buffer.is_full());
        assert_eq!(buffer.total_added(), 50);
        assert_eq!(stored_tags(&buffer), (43..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_sample_returns_distinct_transitions() {
        let mut buffer = ReplayBuffer::with_seed(config(100), 42).unwrap();
        for tag in 0..20 {
            buffer.add(tagged(tag)).unwrap();
        }

        for _ in 0..50 {
            let batch = buffer.sample(20).unwrap();
            assert_eq!(batch.batch_size, 20);
            let tags: HashSet<usize> = batch.states.iter().map(|&s| s as usize).collect();
            assert_eq!(tags.len(), 20);
        }
    }

    #[test]
    fn test_sample_only_returns_stored_transitions() {
        let mut buffer = ReplayBuffer::with_seed(config(5), 3).unwrap();
        for tag in 0..12 {
            buffer.add(tagged(tag)).unwrap();
        }

        let batch = buffer.sample(5).unwrap();
        for i in 0..batch.batch_size {
            let t = batch.get(i).unwrap();
            let tag = t.state[0] as usize;
            assert!((7..12).contains(&tag));
            assert_eq!(t, tagged(tag));
        }
    }

    #[test]
    fn test_sample_insufficient_data() {
        let mut buffer = ReplayBuffer::with_seed(config(10), 0).unwrap();
        buffer.add(tagged(0)).unwrap();
        buffer.add(tagged(1)).unwrap();

        let err = buffer.sample(3).unwrap_err();
        assert!(matches!(
            err,
            PdqnError::InsufficientData {
                requested: 3,
                available: 2
            }
        ));
    }

    #[test]
    fn test_same_seed_same_samples() {
        let mut a = ReplayBuffer::with_seed(config(10), 7).unwrap();
        let mut b = ReplayBuffer::with_seed(config(10), 7).unwrap();
        for tag in 0..10 {
            a.add(tagged(tag)).unwrap();
            b.add(tagged(tag)).unwrap();
        }

        assert_eq!(a.sample(4).unwrap().states, b.sample(4).unwrap().states);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut buffer = ReplayBuffer::with_seed(config(10), 0).unwrap();

        let mut bad_state = tagged(0);
        bad_state.state.push(1.0);
        assert!(matches!(
            buffer.add(bad_state).unwrap_err(),
            PdqnError::ShapeMismatch { what: "state", .. }
        ));

        let mut bad_params = tagged(0);
        bad_params.action_params.pop();
        assert!(matches!(
            buffer.add(bad_params).unwrap_err(),
            PdqnError::ShapeMismatch { what: "action parameters", .. }
        ));

        let mut bad_action = tagged(0);
        bad_action.action = 2;
        assert!(buffer.add(bad_action).is_err());

        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(ReplayBuffer::new(config(0)).is_err());
    }

    #[test]
    fn test_clear() {
        let mut buffer = ReplayBuffer::with_seed(config(4), 0).unwrap();
        for tag in 0..6 {
            buffer.add(tagged(tag)).unwrap();
        }
        buffer.clear();
        assert!(buffer.is_empty());

        buffer.add(tagged(9)).unwrap();
        assert_eq!(stored_tags(&buffer), vec![9]);
    }
}

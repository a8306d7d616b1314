//! Transition types for parametrized-action replay.
//!
//! - `Transition`: one environment step with a hybrid (discrete + continuous) action
//! - `TransitionBatch`: columnar view of a sampled batch, one flat array per field

/// One environment step of a parametrized-action agent.
///
/// `action_params` always holds the full concatenated parameter vector produced
/// by the actor; only the slice owned by `action` was meaningfully chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Compressed state observation
    pub state: Vec<f32>,
    /// Discrete action index in `[0, num_actions)`
    pub action: usize,
    /// Continuous parameters for every discrete action, concatenated
    pub action_params: Vec<f32>,
    /// Reward received
    pub reward: f32,
    /// Compressed next state observation
    pub next_state: Vec<f32>,
    /// Abnormal termination (collision, rule violation)
    pub truncated: bool,
    /// Natural episode end (goal reached)
    pub done: bool,
}

impl Transition {
    /// Create a new transition.
    pub fn new(
        state: Vec<f32>,
        action: usize,
        action_params: Vec<f32>,
        reward: f32,
        next_state: Vec<f32>,
        truncated: bool,
        done: bool,
    ) -> Self {
        Self {
            state,
            action,
            action_params,
            reward,
            next_state,
            truncated,
            done,
        }
    }

    /// Check if the episode ended at this step (done or truncated).
    pub fn episode_end(&self) -> bool {
        self.done || self.truncated
    }

    /// Return a copy with `bonus` added to the reward.
    pub fn with_reward_bonus(mut self, bonus: f32) -> Self {
        self.reward += bonus;
        self
    }
}

/// Columnar batch of transitions.
///
/// Multi-dimensional fields are stored row-major, so `states[i * state_dim..(i + 1) * state_dim]`
/// is the state of sample `i`.
#[derive(Debug, Clone, Default)]
pub struct TransitionBatch {
    /// States `[batch_size * state_dim]`
    pub states: Vec<f32>,
    /// Discrete actions `[batch_size]`
    pub actions: Vec<usize>,
    /// Full parameter vectors `[batch_size * param_dim]`
    pub action_params: Vec<f32>,
    /// Rewards `[batch_size]`
    pub rewards: Vec<f32>,
    /// Next states `[batch_size * state_dim]`
    pub next_states: Vec<f32>,
    /// Truncation flags `[batch_size]`
    pub truncated: Vec<bool>,
    /// Done flags `[batch_size]`
    pub done: Vec<bool>,
    /// Number of samples
    pub batch_size: usize,
    /// State vector length
    pub state_dim: usize,
    /// Parameter vector length
    pub param_dim: usize,
}

impl TransitionBatch {
    /// Assemble a columnar batch from transitions.
    ///
    /// Dimensions are taken from the first transition; callers are expected to
    /// have validated shapes on insertion.
    pub fn from_transitions<'a, I>(transitions: I) -> Self
    where
        I: IntoIterator<Item = &'a Transition>,
    {
        let mut batch = TransitionBatch::default();
        for t in transitions {
            if batch.batch_size == 0 {
                batch.state_dim = t.state.len();
                batch.param_dim = t.action_params.len();
            }
            batch.states.extend_from_slice(&t.state);
            batch.actions.push(t.action);
            batch.action_params.extend_from_slice(&t.action_params);
            batch.rewards.push(t.reward);
            batch.next_states.extend_from_slice(&t.next_state);
            batch.truncated.push(t.truncated);
            batch.done.push(t.done);
            batch.batch_size += 1;
        }
        batch
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.batch_size == 0
    }

    /// Done flags as 0/1 floats, for masking the bootstrap term.
    pub fn done_mask(&self) -> Vec<f32> {
        self.done.iter().map(|&d| if d { 1.0 } else { 0.0 }).collect()
    }

    /// Actions as `i32` indices for tensor gather.
    pub fn action_indices(&self) -> Vec<i32> {
        self.actions.iter().map(|&a| a as i32).collect()
    }

    /// Reconstruct sample `i` as an owned transition.
    pub fn get(&self, i: usize) -> Option<Transition> {
        if i >= self.batch_size {
            return None;
        }
        let s = i * self.state_dim..(i + 1) * self.state_dim;
        let p = i * self.param_dim..(i + 1) * self.param_dim;
        Some(Transition {
            state: self.states[s.clone()].to_vec(),
            action: self.actions[i],
            action_params: self.action_params[p].to_vec(),
            reward: self.rewards[i],
            next_state: self.next_states[s].to_vec(),
            truncated: self.truncated[i],
            done: self.done[i],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(i: usize) -> Transition {
        Transition::new(
            vec![i as f32, i as f32 + 0.5],
            i % 3,
            vec![0.1 * i as f32; 6],
            i as f32,
            vec![i as f32 + 1.0, i as f32 + 1.5],
            false,
            i % 2 == 0,
        )
    }

    #[test]
    fn test_episode_end() {
        let mut t = make(1);
        assert!(!t.episode_end());
        t.truncated = true;
        assert!(t.episode_end());
    }

    #[test]
    fn test_reward_bonus() {
        let t = make(2).with_reward_bonus(0.5);
        assert_eq!(t.reward, 2.5);
    }

    #[test]
    fn test_batch_is_columnar() {
        let transitions: Vec<Transition> = (0..4).map(make).collect();
        let batch = TransitionBatch::from_transitions(&transitions);

        assert_eq!(batch.batch_size, 4);
        assert_eq!(batch.state_dim, 2);
        assert_eq!(batch.param_dim, 6);
        assert_eq!(batch.states.len(), 8);
        assert_eq!(batch.action_params.len(), 24);
        assert_eq!(batch.actions, vec![0, 1, 2, 0]);
        assert_eq!(batch.rewards, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(batch.done_mask(), vec![1.0, 0.0, 1.0, 0.0]);
        assert_eq!(&batch.next_states[2..4], &[2.0, 2.5]);
    }

    #[test]
    fn test_batch_get_roundtrips_sample() {
        let transitions: Vec<Transition> = (0..3).map(make).collect();
        let batch = TransitionBatch::from_transitions(&transitions);

        assert_eq!(batch.get(2), Some(transitions[2].clone()));
        assert_eq!(batch.get(3), None);
    }

    #[test]
    fn test_empty_batch() {
        let batch = TransitionBatch::from_transitions(std::iter::empty());
        assert!(batch.is_empty());
        assert!(batch.action_indices().is_empty());
    }
}

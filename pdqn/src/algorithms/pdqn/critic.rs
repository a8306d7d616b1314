//! P-DQN critic trait and TD helpers.
//!
//! The critic scores every discrete action at once, given the state and the
//! actor's full parameter vector:
//!
//! ```text
//! (state [B, S], all_params [B, P]) ──► critic ──► Q [B, A]
//! ```
//!
//! TD target for a sampled transition:
//!
//! ```text
//! y = r + γ · max_a Q'(s', π'(s'))_a · (1 - done)
//! ```
//!
//! Truncation does not cut the bootstrap; only a natural episode end does.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

// ============================================================================
// Critic Trait (Inference)
// ============================================================================

/// Multi-action Q-value critic.
pub trait ParamCritic<B: Backend>: Module<B> + Clone + Send + 'static {
    /// Forward pass.
    ///
    /// # Arguments
    /// - `states`: Compressed states [batch, state_dim]
    /// - `params`: Full parameter vectors [batch, param_dim]
    ///
    /// # Returns
    /// Q-values for every discrete action [batch, num_actions]
    fn forward(&self, states: Tensor<B, 2>, params: Tensor<B, 2>) -> Tensor<B, 2>;

    /// Get the state dimension.
    fn state_dim(&self) -> usize;

    /// Get the concatenated parameter dimension.
    fn param_dim(&self) -> usize;

    /// Get the number of discrete actions.
    fn num_actions(&self) -> usize;
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Gather Q-values for the taken actions.
///
/// # Arguments
/// - `q_values`: Q-values for all actions [batch, n_actions]
/// - `actions`: Action indices [batch]
/// - `device`: Device for tensor operations
///
/// # Returns
/// Q-values for taken actions [batch]
pub fn gather_q_values<B: Backend>(
    q_values: Tensor<B, 2>,
    actions: &[i32],
    device: &B::Device,
) -> Tensor<B, 1> {
    let batch_size = actions.len();
    let actions_2d = Tensor::<B, 1, Int>::from_ints(actions, device).reshape([batch_size, 1]);
    q_values.gather(1, actions_2d).flatten(0, 1)
}

/// Compute the P-DQN TD target.
///
/// # Arguments
/// - `rewards`: Rewards [batch]
/// - `done`: Natural-termination flags as 0/1 [batch]
/// - `next_q`: Target-critic Q-values at next states [batch, n_actions]
/// - `gamma`: Discount factor
///
/// # Returns
/// TD targets [batch]
pub fn td_targets<B: Backend>(
    rewards: Tensor<B, 1>,
    done: Tensor<B, 1>,
    next_q: Tensor<B, 2>,
    gamma: f32,
) -> Tensor<B, 1> {
    let next_max: Tensor<B, 1> = next_q.max_dim(1).flatten(0, 1);
    let not_done = done.mul_scalar(-1.0).add_scalar(1.0);
    rewards + not_done.mul_scalar(gamma) * next_max
}

/// Index of the largest Q-value; ties resolve to the lowest index.
///
/// Returns `None` for an empty slice.
pub fn greedy_action(q_values: &[f32]) -> Option<usize> {
    greedy_action_masked(q_values, None)
}

/// Greedy action restricted to actions whose mask entry is `true`.
///
/// Returns `None` if no action is allowed.
pub fn greedy_action_masked(q_values: &[f32], mask: Option<&[bool]>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (a, &q) in q_values.iter().enumerate() {
        if let Some(mask) = mask {
            if !mask.get(a).copied().unwrap_or(false) {
                continue;
            }
        }
        match best {
            Some((_, best_q)) if q <= best_q => {}
            _ => best = Some((a, q)),
        }
    }
    best.map(|(a, _)| a)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    fn to_vec(t: Tensor<B, 1>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_gather_q_values() {
        let device = <B as Backend>::Device::default();
        let q = Tensor::<B, 2>::from_floats([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]], &device);

        let gathered = gather_q_values(q, &[2, 0], &device);
        assert_eq!(to_vec(gathered), vec![3.0, 4.0]);
    }

    #[test]
    fn test_td_targets_bootstrap_and_terminal() {
        let device = <B as Backend>::Device::default();
        let rewards = Tensor::<B, 1>::from_floats([1.0, 1.0], &device);
        let done = Tensor::<B, 1>::from_floats([0.0, 1.0], &device);
        let next_q = Tensor::<B, 2>::from_floats([[0.5, 2.0, -1.0], [3.0, 3.0, 3.0]], &device);

        let targets = to_vec(td_targets(rewards, done, next_q, 0.9));
        assert!((targets[0] - (1.0 + 0.9 * 2.0)).abs() < 1e-6);
        assert!((targets[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_greedy_action_lowest_index_tie() {
        assert_eq!(greedy_action(&[0.1, 0.7, 0.7]), Some(1));
        assert_eq!(greedy_action(&[-1.0, -2.0]), Some(0));
        assert_eq!(greedy_action(&[]), None);
    }

    #[test]
    fn test_greedy_action_masked() {
        let q = [5.0, 1.0, 2.0];
        assert_eq!(greedy_action_masked(&q, Some(&[false, true, true])), Some(2));
        assert_eq!(greedy_action_masked(&q, Some(&[false, false, false])), None);
        assert_eq!(greedy_action_masked(&q, None), Some(0));
    }
}

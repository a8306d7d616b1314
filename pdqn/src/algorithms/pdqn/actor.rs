//! P-DQN actor trait.
//!
//! The actor is a deterministic map from states to the full concatenated
//! parameter vector: one bounded parameter slice for every discrete action.
//! Which slice gets used is decided afterwards by the critic's argmax.
//!
//! ```text
//! state [B, S] ──► actor ──► all_params [B, P] ∈ [-1, 1]
//! ```

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

// ============================================================================
// Actor Trait (Inference)
// ============================================================================

/// Deterministic parameter actor.
///
/// Usable on any backend. Target actors and action selection run on the inner
/// backend via `model.valid()`.
pub trait ParamActor<B: Backend>: Module<B> + Clone + Send + 'static {
    /// Forward pass.
    ///
    /// # Arguments
    /// - `states`: Compressed states [batch, state_dim]
    ///
    /// # Returns
    /// Parameters for every discrete action [batch, param_dim], each coordinate
    /// in `[-1, 1]`.
    fn forward(&self, states: Tensor<B, 2>) -> Tensor<B, 2>;

    /// Get the state dimension.
    fn state_dim(&self) -> usize;

    /// Get the concatenated parameter dimension.
    fn param_dim(&self) -> usize;
}


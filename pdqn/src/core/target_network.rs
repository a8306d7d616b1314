//! Target network utilities.
//!
//! The actor and critic each have a frozen target copy used to compute TD
//! targets. Target weights are never trained directly; they only track the live
//! weights through Polyak averaging:
//!
//! ```text
//! θ_target ← (1 - τ) · θ_target + τ · θ_live
//! ```
//!
//! Targets live on the inner (non-autodiff) backend, so every target forward
//! pass is gradient-free by construction:
//!
//! ```ignore
//! let target_actor = actor.valid();
//! // after each learning step
//! let target_actor = soft_update(&actor.valid(), target_actor, tau)?;
//! ```

use burn::module::{Module, ModuleMapper, ModuleVisitor, Param};
use burn::prelude::*;

use crate::error::{PdqnError, Result};

// ============================================================================
// Soft Update Implementation via ModuleMapper
// ============================================================================

/// Extracts all float parameters from a module, flattened to 1D.
///
/// Parameters are collected in traversal order, which is deterministic for
/// modules with the same architecture, so two independently created models can
/// be matched parameter by parameter.
struct ParamExtractor<B: Backend> {
    params: Vec<Tensor<B, 1>>,
}

impl<B: Backend> ModuleVisitor<B> for ParamExtractor<B> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        let val = param.val();
        let total_size: usize = val.dims().iter().product();
        self.params.push(val.reshape([total_size]));
    }
}

/// Polyak-averages each target parameter toward the matching live parameter.
struct SoftUpdateMapper<B: Backend> {
    live_params: Vec<Tensor<B, 1>>,
    tau: f32,
    index: usize,
}

impl<B: Backend> ModuleMapper<B> for SoftUpdateMapper<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let idx = self.index;
        self.index += 1;

        // soft_update checked the parameter lists match before mapping
        let Some(live) = self.live_params.get(idx) else {
            debug_assert!(false, "soft update ran past the live parameter list");
            return param;
        };

        let target_val = param.val();
        let shape = target_val.dims();
        let total_size: usize = shape.iter().product();
        let target_flat = target_val.reshape([total_size]);

        let interpolated =
            target_flat.mul_scalar(1.0 - self.tau) + live.clone().mul_scalar(self.tau);

        Param::initialized(param.id.clone(), interpolated.reshape(shape))
    }
}

/// Collect every float parameter of `module`, flattened, in traversal order.
fn extract_params<B: Backend, M: Module<B>>(module: &M) -> Vec<Tensor<B, 1>> {
    let mut extractor = ParamExtractor { params: Vec::new() };
    module.visit(&mut extractor);
    extractor.params
}

/// Perform a soft update (Polyak averaging) of `target` toward `live`.
///
/// For every parameter: `θ_target = (1 - τ) · θ_target + τ · θ_live`.
/// `τ = 0` returns the target unchanged; `τ = 1` returns a copy of the live model.
///
/// Fails with `ShapeMismatch` if the two modules do not share an architecture
/// (different parameter count or parameter sizes).
pub fn soft_update<B, M>(live: &M, target: M, tau: f32) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    let live_params = extract_params(live);
    check_same_layout(&live_params, &extract_params(&target))?;

    if tau == 0.0 {
        return Ok(target);
    }
    if tau == 1.0 {
        return Ok(hard_copy(live));
    }

    let mut updater = SoftUpdateMapper {
        live_params,
        tau,
        index: 0,
    };
    Ok(target.map(&mut updater))
}

fn check_same_layout<B: Backend>(live: &[Tensor<B, 1>], target: &[Tensor<B, 1>]) -> Result<()> {
    if live.len() != target.len() {
        return Err(PdqnError::shape("target parameter count", live.len(), target.len()));
    }
    for (l, t) in live.iter().zip(target) {
        let (ln, tn) = (l.dims()[0], t.dims()[0]);
        if ln != tn {
            return Err(PdqnError::shape("target parameter size", ln, tn));
        }
    }
    Ok(())
}

/// Hard copy of the live model's weights.
pub fn hard_copy<B, M>(live: &M) -> M
where
    B: Backend,
    M: Module<B>,
{
    live.clone()
}

/// Flattened parameter values of a module, in traversal order.
///
/// Useful for comparing networks (soft-update checks, checkpoint round trips).
pub fn param_values<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<f32>> {
    extract_params(module)
        .into_iter()
        .map(|t| t.into_data().convert::<f32>().to_vec::<f32>().unwrap_or_default())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::{Linear, LinearConfig};

    type TestBackend = NdArray<f32>;

    /// Overwrites every float parameter with a constant.
    struct FillMapper(f32);

    impl<B: Backend> ModuleMapper<B> for FillMapper {
        fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
            let val = param.val();
            let filled = val.zeros_like().add_scalar(self.0);
            Param::initialized(param.id.clone(), filled)
        }
    }

    fn linear_filled(value: f32, device: &<TestBackend as Backend>::Device) -> Linear<TestBackend> {
        LinearConfig::new(3, 2)
            .init::<TestBackend>(device)
            .map(&mut FillMapper(value))
    }

    #[test]
    fn test_soft_update_scalar_law() {
        // τ = 0.1, θ_target = 2.0, θ_live = 0.0 → 1.8
        let device = Default::default();
        let live = linear_filled(0.0, &device);
        let target = linear_filled(2.0, &device);

        let updated = soft_update::<TestBackend, _>(&live, target, 0.1).unwrap();

        for values in param_values::<TestBackend, _>(&updated) {
            for v in values {
                assert!((v - 1.8).abs() < 1e-6, "expected 1.8, got {}", v);
            }
        }
    }

    #[test]
    fn test_soft_update_interpolation() {
        let device = Default::default();
        let live = LinearConfig::new(4, 4).init::<TestBackend>(&device);
        let target = LinearConfig::new(4, 4).init::<TestBackend>(&device);

        let live_values = param_values::<TestBackend, _>(&live);
        let target_values = param_values::<TestBackend, _>(&target);

        let tau = 0.3f32;
        let updated = soft_update::<TestBackend, _>(&live, target, tau).unwrap();
        let updated_values = param_values::<TestBackend, _>(&updated);

        assert_eq!(updated_values.len(), 2, "weight and bias");
        for p in 0..updated_values.len() {
            for i in 0..updated_values[p].len() {
                let expected = (1.0 - tau) * target_values[p][i] + tau * live_values[p][i];
                assert!(
                    (updated_values[p][i] - expected).abs() < 1e-6,
                    "param {} index {}: expected {}, got {}",
                    p,
                    i,
                    expected,
                    updated_values[p][i]
                );
            }
        }
    }

    #[test]
    fn test_soft_update_tau_zero_returns_target() {
        let device = Default::default();
        let live = linear_filled(1.0, &device);
        let target = linear_filled(-1.0, &device);

        let updated = soft_update::<TestBackend, _>(&live, target, 0.0).unwrap();
        for values in param_values::<TestBackend, _>(&updated) {
            assert!(values.iter().all(|&v| v == -1.0));
        }
    }

    #[test]
    fn test_soft_update_tau_one_copies_live() {
        let device = Default::default();
        let live = linear_filled(0.5, &device);
        let target = linear_filled(-3.0, &device);

        let updated = soft_update::<TestBackend, _>(&live, target, 1.0).unwrap();
        assert_eq!(
            param_values::<TestBackend, _>(&updated),
            param_values::<TestBackend, _>(&live)
        );
    }

    #[test]
    fn test_repeated_soft_updates_converge() {
        let device = Default::default();
        let live = linear_filled(1.0, &device);
        let mut target = linear_filled(0.0, &device);

        for _ in 0..200 {
            target = soft_update::<TestBackend, _>(&live, target, 0.05).unwrap();
        }
        for values in param_values::<TestBackend, _>(&target) {
            assert!(values.iter().all(|&v| (v - 1.0).abs() < 1e-3));
        }
    }

    #[test]
    fn test_soft_update_rejects_mismatched_architectures() {
        let device = Default::default();
        let live = LinearConfig::new(4, 4).init::<TestBackend>(&device);
        let target = LinearConfig::new(3, 2).init::<TestBackend>(&device);

        let result = soft_update::<TestBackend, _>(&live, target, 0.1);
        assert!(matches!(result, Err(PdqnError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_soft_update_rejects_mismatch_even_at_tau_zero() {
        let device = Default::default();
        let live = LinearConfig::new(4, 4).with_bias(false).init::<TestBackend>(&device);
        let target = LinearConfig::new(4, 4).init::<TestBackend>(&device);

        let result = soft_update::<TestBackend, _>(&live, target, 0.0);
        assert!(matches!(result, Err(PdqnError::ShapeMismatch { .. })));
    }
}

//! Transforms applied to dQ/dparams before the actor update.
//!
//! ## Gradient inversion
//!
//! Keeps bounded parameters inside their range without saturating the tanh.
//! For each coordinate with value `v` in `[min, max]`:
//!
//! ```text
//! grad > 0  →  grad · (max - v) / range     (shrinks as v approaches max)
//! grad ≤ 0  →  grad · (v - min) / range     (shrinks as v approaches min)
//! ```
//!
//! ## Index masking
//!
//! Only the sampled action's slice was actually executed, so gradients for
//! every other slice are zeroed per sample:
//!
//! ```text
//! offsets = [0, 2, 4, 6], a_i = 1  →  keep coords 2..4 of row i
//! ```

use std::fmt;
use std::str::FromStr;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::core::action_layout::ActionParamLayout;
use crate::error::{PdqnError, Result};

// ============================================================================
// Shaping Mode
// ============================================================================

/// Which critic outputs the actor objective differentiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientShapingMode {
    /// `mean_b(sum_a Q(s, p)_a)`: every action's value pulls on the parameters.
    #[default]
    Summed,
    /// `mean_b(Q(s, p)_{a_b})`: only the sampled action's value.
    Indexed,
}

impl fmt::Display for GradientShapingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradientShapingMode::Summed => write!(f, "summed"),
            GradientShapingMode::Indexed => write!(f, "indexed"),
        }
    }
}

impl FromStr for GradientShapingMode {
    type Err = PdqnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summed" | "sum" => Ok(GradientShapingMode::Summed),
            "indexed" | "index" => Ok(GradientShapingMode::Indexed),
            other => Err(PdqnError::InvalidConfig(format!(
                "unknown gradient shaping mode '{}' (expected 'summed' or 'indexed')",
                other
            ))),
        }
    }
}

// ============================================================================
// Tensor Transforms
// ============================================================================

/// Per-coordinate bound rows expanded to `[batch, param_dim]`.
fn bound_rows<B: Backend>(
    values: &[f32],
    batch_size: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let p = values.len();
    Tensor::<B, 1>::from_floats(values, device)
        .reshape([1, p])
        .repeat_dim(0, batch_size)
}

/// Scale gradients by the remaining headroom toward the bound they push into.
///
/// # Arguments
/// - `grad`: dQ/dparams [batch, param_dim]
/// - `values`: Current parameter values [batch, param_dim]
/// - `layout`: Bounds source
///
/// # Returns
/// Shaped gradients [batch, param_dim]
pub fn invert_gradients<B: Backend>(
    grad: Tensor<B, 2>,
    values: Tensor<B, 2>,
    layout: &ActionParamLayout,
) -> Result<Tensor<B, 2>> {
    let [batch_size, param_dim] = grad.dims();
    if param_dim != layout.param_dim() {
        return Err(PdqnError::shape("gradient", layout.param_dim(), param_dim));
    }
    if values.dims() != [batch_size, param_dim] {
        return Err(PdqnError::shape(
            "parameter values",
            batch_size * param_dim,
            values.dims().iter().product(),
        ));
    }

    let device = grad.device();
    let max = bound_rows::<B>(layout.coord_max(), batch_size, &device);
    let min = bound_rows::<B>(layout.coord_min(), batch_size, &device);
    let range = bound_rows::<B>(layout.coord_range(), batch_size, &device);

    let headroom_up = (max - values.clone()) / range.clone();
    let headroom_down = (values - min) / range;

    let increasing = grad.clone().greater_elem(0.0);
    let scale = headroom_down.mask_where(increasing, headroom_up);
    Ok(grad * scale)
}

/// Host-side 0/1 mask keeping only each sample's own action slice.
///
/// Row-major `[actions.len() * param_dim]`.
pub fn action_slice_mask(actions: &[usize], layout: &ActionParamLayout) -> Result<Vec<f32>> {
    let param_dim = layout.param_dim();
    let mut mask = vec![0.0f32; actions.len() * param_dim];
    for (i, &a) in actions.iter().enumerate() {
        if a >= layout.num_actions() {
            return Err(PdqnError::InvalidConfig(format!(
                "action {} out of range for {} actions",
                a,
                layout.num_actions()
            )));
        }
        let row = i * param_dim;
        for coord in layout.range_of(a) {
            mask[row + coord] = 1.0;
        }
    }
    Ok(mask)
}

/// Zero gradient coordinates that do not belong to the sampled action.
///
/// # Arguments
/// - `grad`: dQ/dparams [batch, param_dim]
/// - `actions`: Sampled discrete actions [batch]
/// - `layout`: Slice offsets
pub fn zero_index_gradients<B: Backend>(
    grad: Tensor<B, 2>,
    actions: &[usize],
    layout: &ActionParamLayout,
) -> Result<Tensor<B, 2>> {
    let [batch_size, param_dim] = grad.dims();
    if batch_size != actions.len() {
        return Err(PdqnError::shape("gradient batch", actions.len(), batch_size));
    }
    if param_dim != layout.param_dim() {
        return Err(PdqnError::shape("gradient", layout.param_dim(), param_dim));
    }

    let mask = action_slice_mask(actions, layout)?;
    let mask = Tensor::<B, 1>::from_floats(mask.as_slice(), &grad.device())
        .reshape([batch_size, param_dim]);
    Ok(grad * mask)
}

// ============================================================================
// Tests
// ============================================================================

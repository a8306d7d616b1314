//! Layout of the concatenated continuous-parameter vector.
//!
//! Every discrete action owns a contiguous slice of the parameter vector:
//!
//! ```text
//! sizes   = [2, 2, 2]
//! offsets = [0, 2, 4, 6]
//! params  = [ a0.steer a0.accel | a1.steer a1.accel | a2.steer a2.accel ]
//! ```
//!
//! Each slice is bounded elementwise by `(min, max)`; the layout is fixed for the
//! lifetime of an agent.

use serde::{Deserialize, Serialize};

use crate::error::{PdqnError, Result};

/// Elementwise bounds of one action's parameter slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    /// Lower bound
    pub min: f32,
    /// Upper bound
    pub max: f32,
}

impl ParamBounds {
    /// Create new bounds.
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// The `[-1, 1]` bounds produced by a tanh-saturated actor.
    pub fn unit() -> Self {
        Self::new(-1.0, 1.0)
    }

    /// `max - min`.
    pub fn range(&self) -> f32 {
        self.max - self.min
    }
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self::unit()
    }
}

/// Offsets and bounds of every action's parameter slice.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionParamLayout {
    sizes: Vec<usize>,
    offsets: Vec<usize>,
    bounds: Vec<ParamBounds>,
    // Per-coordinate expansion of `bounds`, length = param_dim
    coord_min: Vec<f32>,
    coord_max: Vec<f32>,
    coord_range: Vec<f32>,
    coord_owner: Vec<usize>,
}

impl ActionParamLayout {
    /// Build a layout from per-action sizes and bounds.
    ///
    /// Fails if the action list is empty, a size is zero, the two lists disagree
    /// in length, or any action has a degenerate (`max <= min`) range.
    pub fn new(sizes: Vec<usize>, bounds: Vec<ParamBounds>) -> Result<Self> {
        if sizes.is_empty() {
            return Err(PdqnError::InvalidConfig(
                "at least one discrete action is required".into(),
            ));
        }
        if bounds.len() != sizes.len() {
            return Err(PdqnError::shape("action bounds", sizes.len(), bounds.len()));
        }
        if let Some(a) = sizes.iter().position(|&s| s == 0) {
            return Err(PdqnError::InvalidConfig(format!(
                "action {} has an empty parameter slice",
                a
            )));
        }
        for (action, b) in bounds.iter().enumerate() {
            if !(b.range() > 0.0) || !b.range().is_finite() {
                return Err(PdqnError::DegenerateRange { action });
            }
        }

        let mut offsets = Vec::with_capacity(sizes.len() + 1);
        offsets.push(0);
        for &size in &sizes {
            let last = *offsets.last().unwrap_or(&0);
            offsets.push(last + size);
        }

        let param_dim = offsets[sizes.len()];
        let mut coord_min = Vec::with_capacity(param_dim);
        let mut coord_max = Vec::with_capacity(param_dim);
        let mut coord_range = Vec::with_capacity(param_dim);
        let mut coord_owner = Vec::with_capacity(param_dim);
        for (action, (&size, b)) in sizes.iter().zip(&bounds).enumerate() {
            for _ in 0..size {
                coord_min.push(b.min);
                coord_max.push(b.max);
                coord_range.push(b.range());
                coord_owner.push(action);
            }
        }

        Ok(Self {
            sizes,
            offsets,
            bounds,
            coord_min,
            coord_max,
            coord_range,
            coord_owner,
        })
    }

    /// Layout where every action has `size` parameters bounded by `[-1, 1]`.
    pub fn uniform(num_actions: usize, size: usize) -> Result<Self> {
        Self::new(vec![size; num_actions], vec![ParamBounds::unit(); num_actions])
    }

    /// Default lane-change layout: change-left, lane-follow, change-right,
    /// each with (steer, throttle/brake).
    pub fn lane_change() -> Self {
        Self {
            sizes: vec![2, 2, 2],
            offsets: vec![0, 2, 4, 6],
            bounds: vec![ParamBounds::unit(); 3],
            coord_min: vec![-1.0; 6],
            coord_max: vec![1.0; 6],
            coord_range: vec![2.0; 6],
            coord_owner: vec![0, 0, 1, 1, 2, 2],
        }
    }

    /// Number of discrete actions.
    pub fn num_actions(&self) -> usize {
        self.sizes.len()
    }

    /// Total length of the concatenated parameter vector.
    pub fn param_dim(&self) -> usize {
        self.offsets[self.sizes.len()]
    }

    /// Offsets table, `num_actions + 1` entries.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Per-action parameter sizes.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Bounds of `action`'s slice.
    pub fn bounds(&self, action: usize) -> ParamBounds {
        self.bounds[action]
    }

    /// Coordinate range `[start, end)` owned by `action`.
    pub fn range_of(&self, action: usize) -> std::ops::Range<usize> {
        self.offsets[action]..self.offsets[action + 1]
    }

    /// Which action owns parameter coordinate `coord`.
    pub fn owner(&self, coord: usize) -> usize {
        self.coord_owner[coord]
    }

    /// Per-coordinate lower bounds.
    pub fn coord_min(&self) -> &[f32] {
        &self.coord_min
    }

    /// Per-coordinate upper bounds.
    pub fn coord_max(&self) -> &[f32] {
        &self.coord_max
    }

    /// Per-coordinate ranges.
    pub fn coord_range(&self) -> &[f32] {
        &self.coord_range
    }

    /// Slice out `action`'s parameters from a full parameter vector.
    pub fn slice<'a>(&self, all_params: &'a [f32], action: usize) -> Result<&'a [f32]> {
        if action >= self.num_actions() {
            return Err(PdqnError::InvalidConfig(format!(
                "action {} out of range for {} actions",
                action,
                self.num_actions()
            )));
        }
        self.check_params(all_params)?;
        Ok(&all_params[self.range_of(action)])
    }

    /// Write `params` into `action`'s slice of `all_params`.
    ///
    /// Used when an externally guided action (not chosen by the actor) must be
    /// recorded with the actor's full parameter vector as a carrier.
    pub fn fill(&self, all_params: &mut [f32], action: usize, params: &[f32]) -> Result<()> {
        self.check_params(all_params)?;
        if action >= self.num_actions() {
            return Err(PdqnError::InvalidConfig(format!(
                "action {} out of range for {} actions",
                action,
                self.num_actions()
            )));
        }
        let range = self.range_of(action);
        if params.len() != range.len() {
            return Err(PdqnError::shape("action slice", range.len(), params.len()));
        }
        all_params[range].copy_from_slice(params);
        Ok(())
    }

    /// Verify that a full parameter vector has the right length.
    pub fn check_params(&self, all_params: &[f32]) -> Result<()> {
        if all_params.len() != self.param_dim() {
            return Err(PdqnError::shape(
                "action parameters",
                self.param_dim(),
                all_params.len(),
            ));
        }
        Ok(())
    }
}

impl Default for ActionParamLayout {
    fn default() -> Self {
        Self::lane_change()
    }
}

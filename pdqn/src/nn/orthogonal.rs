//! Orthogonally initialized linear layer.
//!
//! Every layer of the lane networks uses it. Hidden layers take a gain of
//! √2 for their ReLU; output heads take a small gain so the initial actor
//! parameters sit near the middle of their range and the initial Q-values
//! near zero.
//!
//! ```ignore
//! let head = OrthogonalLinearConfig::new(256, 6).with_gain(0.01).init(&device);
//! let params = tanh(head.forward(hidden));
//! ```

use burn::module::{Module, Param};
use burn::prelude::*;
use burn::tensor::Distribution;

/// Gain for ReLU hidden layers.
pub const RELU_GAIN: f64 = std::f64::consts::SQRT_2;

/// Configuration for OrthogonalLinear layer.
#[derive(Debug, Clone)]
pub struct OrthogonalLinearConfig {
    /// Number of input features.
    pub d_input: usize,
    /// Number of output features.
    pub d_output: usize,
    /// Gain factor for scaling the orthogonal weights.
    pub gain: f64,
    /// Whether to include a bias term.
    pub bias: bool,
}

impl OrthogonalLinearConfig {
    /// Create a new configuration.
    pub fn new(d_input: usize, d_output: usize) -> Self {
        Self {
            d_input,
            d_output,
            gain: 1.0,
            bias: true,
        }
    }

    /// Set the gain factor.
    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    /// Set whether to include bias.
    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    /// Initialize the layer.
    pub fn init<B: Backend>(&self, device: &B::Device) -> OrthogonalLinear<B> {
        let weight = orthogonal_weights::<B>(self.d_output, self.d_input, self.gain, device);
        let bias = self
            .bias
            .then(|| Param::from_tensor(Tensor::zeros([self.d_output], device)));

        OrthogonalLinear {
            weight: Param::from_tensor(weight),
            bias,
            d_input: self.d_input,
            d_output: self.d_output,
        }
    }
}

/// Linear layer with orthogonal initialization.
///
/// Same forward pass as burn's `Linear`; only the initial weights differ.
#[derive(Module, Debug)]
pub struct OrthogonalLinear<B: Backend> {
    /// Weight matrix of shape [d_output, d_input]
    pub weight: Param<Tensor<B, 2>>,
    /// Optional bias of shape [d_output]
    pub bias: Option<Param<Tensor<B, 1>>>,
    d_input: usize,
    d_output: usize,
}

impl<B: Backend> OrthogonalLinear<B> {
    /// `[batch, d_input] → [batch, d_output]`
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let output = input.matmul(self.weight.val().transpose());
        match &self.bias {
            Some(bias) => output + bias.val().unsqueeze_dim(0),
            None => output,
        }
    }

    /// Get input dimension.
    pub fn d_input(&self) -> usize {
        self.d_input
    }

    /// Get output dimension.
    pub fn d_output(&self) -> usize {
        self.d_output
    }
}

/// Orthogonal `[rows, cols]` matrix scaled by `gain`.
///
/// A Gaussian matrix is drawn on the device, read back once, orthonormalized
/// along its shorter dimension with modified Gram-Schmidt, and uploaded again.
pub fn orthogonal_weights<B: Backend>(
    rows: usize,
    cols: usize,
    gain: f64,
    device: &B::Device,
) -> Tensor<B, 2> {
    let random = Tensor::<B, 2>::random([rows, cols], Distribution::Normal(0.0, 1.0), device);
    let mut values = random
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .unwrap_or_else(|_| vec![0.0; rows * cols]);

    if rows >= cols {
        // Orthonormal columns: vector k is values[i * cols + k]
        gram_schmidt(&mut values, cols, rows, |k, i| i * cols + k);
    } else {
        // Orthonormal rows: vector k is values[k * cols + i]
        gram_schmidt(&mut values, rows, cols, |k, i| k * cols + i);
    }

    let gain = gain as f32;
    for v in &mut values {
        *v *= gain;
    }
    Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([rows, cols])
}

/// Modified Gram-Schmidt over `n_vectors` vectors of length `len`, addressed
/// through `at(vector, component)`.
fn gram_schmidt(
    values: &mut [f32],
    n_vectors: usize,
    len: usize,
    at: impl Fn(usize, usize) -> usize,
) {
    for k in 0..n_vectors {
        for j in 0..k {
            let dot: f32 = (0..len).map(|i| values[at(k, i)] * values[at(j, i)]).sum();
            for i in 0..len {
                let vj = values[at(j, i)];
                values[at(k, i)] -= dot * vj;
            }
        }

        let norm: f32 = (0..len).map(|i| values[at(k, i)].powi(2)).sum::<f32>().sqrt();
        if norm > 1e-6 {
            for i in 0..len {
                values[at(k, i)] /= norm;
            }
        } else {
            // Degenerate draw: fall back to a basis vector
            for i in 0..len {
                values[at(k, i)] = if i == k { 1.0 } else { 0.0 };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn get_device() -> <TestBackend as Backend>::Device {
        Default::default()
    }

    fn identity_error(product: Tensor<TestBackend, 2>, n: usize) -> f32 {
        let identity = Tensor::<TestBackend, 2>::eye(n, &get_device());
        (product - identity).abs().max().into_scalar().elem::<f32>()
    }

    #[test]
    fn test_orthogonal_linear_forward() {
        let device = get_device();
        let linear: OrthogonalLinear<TestBackend> = OrthogonalLinearConfig::new(4, 3).init(&device);

        let input = Tensor::random([2, 4], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(linear.forward(input).dims(), [2, 3]);
    }

    #[test]
    fn test_square_weights_are_orthogonal() {
        let w = orthogonal_weights::<TestBackend>(16, 16, 1.0, &get_device());
        assert!(identity_error(w.clone().matmul(w.transpose()), 16) < 1e-4);
    }

    #[test]
    fn test_tall_weights_have_orthonormal_columns() {
        let w = orthogonal_weights::<TestBackend>(12, 4, 1.0, &get_device());
        assert!(identity_error(w.clone().transpose().matmul(w), 4) < 1e-4);
    }

    #[test]
    fn test_wide_weights_have_orthonormal_rows() {
        let w = orthogonal_weights::<TestBackend>(3, 26, 1.0, &get_device());
        assert!(identity_error(w.clone().matmul(w.transpose()), 3) < 1e-4);
    }

    #[test]
    fn test_gain_scales_norms() {
        let w = orthogonal_weights::<TestBackend>(6, 6, 0.5, &get_device());
        let product = w.clone().matmul(w.transpose());
        let scaled = Tensor::<TestBackend, 2>::eye(6, &get_device()).mul_scalar(0.25);
        let err = (product - scaled).abs().max().into_scalar().elem::<f32>();
        assert!(err < 1e-4);
    }

    #[test]
    fn test_no_bias() {
        let linear: OrthogonalLinear<TestBackend> =
            OrthogonalLinearConfig::new(4, 3).with_bias(false).init(&get_device());
        assert!(linear.bias.is_none());
    }
}

//! Factorised Gaussian noisy linear layer (Fortunato et al., "Noisy Networks
//! for Exploration").

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use tch::{
    nn::{self, Init},
    Device, Kind, Tensor,
};
use tracing::trace;

/// Whether noisy layers perturb their weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Weights are `mu + sigma * epsilon`.
    #[default]
    Train,
    /// Weights are `mu`; noise buffers are ignored.
    Eval,
}

impl Mode {
    pub fn is_train(self) -> bool {
        matches!(self, Mode::Train)
    }
}

impl From<bool> for Mode {
    fn from(train: bool) -> Self {
        if train {
            Mode::Train
        } else {
            Mode::Eval
        }
    }
}

/// Linear layer with learned per-weight noise scale.
///
/// `weight_mu`, `weight_sigma`, `bias_mu` and `bias_sigma` live in the var store
/// and are trainable. The epsilon buffers are plain tensors: they are never
/// saved or gradient-tracked and only change through [`NoisyLinear::reset_noise`].
#[derive(Debug)]
pub struct NoisyLinear {
    pub weight_mu: Tensor,
    pub weight_sigma: Tensor,
    pub bias_mu: Tensor,
    pub bias_sigma: Tensor,
    weight_epsilon: Tensor,
    bias_epsilon: Tensor,
    in_features: i64,
    out_features: i64,
    device: Device,
}

impl NoisyLinear {
    /// Registers the layer parameters under `vs` and draws an initial noise sample.
    pub fn new<R: Rng + ?Sized>(
        vs: &nn::Path,
        in_features: i64,
        out_features: i64,
        std_init: f64,
        rng: &mut R,
    ) -> Self {
        let mu_range = 1.0 / (in_features as f64).sqrt();
        let mu_init = Init::Uniform {
            lo: -mu_range,
            up: mu_range,
        };

        let weight_mu = vs.var("weight_mu", &[out_features, in_features], mu_init);
        let weight_sigma = vs.var(
            "weight_sigma",
            &[out_features, in_features],
            Init::Const(std_init / (in_features as f64).sqrt()),
        );
        let bias_mu = vs.var("bias_mu", &[out_features], mu_init);
        let bias_sigma = vs.var(
            "bias_sigma",
            &[out_features],
            Init::Const(std_init / (out_features as f64).sqrt()),
        );

        let device = vs.device();
        let kind = weight_mu.kind();
        let mut layer = Self {
            weight_mu,
            weight_sigma,
            bias_mu,
            bias_sigma,
            weight_epsilon: Tensor::zeros([out_features, in_features], (kind, device)),
            bias_epsilon: Tensor::zeros([out_features], (kind, device)),
            in_features,
            out_features,
            device,
        };
        layer.reset_noise(rng);
        layer
    }

    pub fn in_features(&self) -> i64 {
        self.in_features
    }

    pub fn out_features(&self) -> i64 {
        self.out_features
    }

    /// Current weight noise, shape `[out_features, in_features]`.
    pub fn weight_epsilon(&self) -> &Tensor {
        &self.weight_epsilon
    }

    /// Current bias noise, shape `[out_features]`.
    pub fn bias_epsilon(&self) -> &Tensor {
        &self.bias_epsilon
    }

    /// Draws fresh input and output noise vectors and rebuilds both buffers.
    /// The input vector is drawn first.
    pub fn reset_noise<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let epsilon_in = self.scaled_noise(rng, self.in_features);
        let epsilon_out = self.scaled_noise(rng, self.out_features);

        self.weight_epsilon = epsilon_out.outer(&epsilon_in);
        self.bias_epsilon = epsilon_out;
        trace!(
            in_features = self.in_features,
            out_features = self.out_features,
            "resampled noisy linear epsilon"
        );
    }

    fn scaled_noise<R: Rng + ?Sized>(&self, rng: &mut R, size: i64) -> Tensor {
        let values: Vec<f32> = (0..size)
            .map(|_| scale_noise(StandardNormal.sample(rng)))
            .collect();
        Tensor::from_slice(&values)
            .to_kind(self.weight_mu.kind())
            .to_device(self.device)
    }

    /// `[batch, in_features] -> [batch, out_features]`
    pub fn forward(&self, xs: &Tensor, mode: Mode) -> Tensor {
        match mode {
            Mode::Train => {
                let weight = &self.weight_mu + &self.weight_sigma * &self.weight_epsilon;
                let bias = &self.bias_mu + &self.bias_sigma * &self.bias_epsilon;
                xs.linear(&weight, Some(&bias))
            }
            Mode::Eval => xs.linear(&self.weight_mu, Some(&self.bias_mu)),
        }
    }
}

impl nn::ModuleT for NoisyLinear {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        self.forward(xs, Mode::from(train))
    }
}

/// `sign(x) * sqrt(|x|)`
pub fn scale_noise(x: f32) -> f32 {
    x.signum() * x.abs().sqrt()
}

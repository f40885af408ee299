//! Noisy dueling categorical DQN with a SimSiam auxiliary head on a shared trunk.

use rand::{rngs::StdRng, SeedableRng};
use tch::{nn, Device, Kind, Tensor};
use tracing::{debug, trace};

use crate::{
    config::{Architecture, NetworkConfig},
    error::{ModelError, Result},
    heads::{PredictionHead, ProjectionHead},
    noisy::{Mode, NoisyLinear},
    trunk::ConvTrunk,
};

/// Everything a forward pass produces.
#[derive(Debug)]
pub struct NetworkOutput {
    /// `[batch, actions, atoms]` probabilities, or log-probabilities.
    pub q: Tensor,
    /// Projection of the trunk features, `[batch, projection_dim]`.
    pub embedding: Tensor,
    /// Prediction head applied to `embedding`, same shape.
    pub prediction: Tensor,
}

/// The four noisy layers of the value and advantage streams.
#[derive(Debug)]
struct DuelingStreams {
    fc_h_v: NoisyLinear,
    fc_z_v: NoisyLinear,
    fc_h_a: NoisyLinear,
    fc_z_a: NoisyLinear,
}

impl DuelingStreams {
    fn new(vs: &nn::Path, cfg: &NetworkConfig, in_features: i64, rng: &mut StdRng) -> Self {
        let std = cfg.noisy_std;
        Self {
            fc_h_v: NoisyLinear::new(&(vs / "fc_h_v"), in_features, cfg.hidden_size, std, rng),
            fc_h_a: NoisyLinear::new(&(vs / "fc_h_a"), in_features, cfg.hidden_size, std, rng),
            fc_z_v: NoisyLinear::new(&(vs / "fc_z_v"), cfg.hidden_size, cfg.atoms, std, rng),
            fc_z_a: NoisyLinear::new(
                &(vs / "fc_z_a"),
                cfg.hidden_size,
                cfg.action_space * cfg.atoms,
                std,
                rng,
            ),
        }
    }

    fn units(&self) -> [&NoisyLinear; 4] {
        [&self.fc_h_v, &self.fc_z_v, &self.fc_h_a, &self.fc_z_a]
    }

    fn units_mut(&mut self) -> [&mut NoisyLinear; 4] {
        [
            &mut self.fc_h_v,
            &mut self.fc_z_v,
            &mut self.fc_h_a,
            &mut self.fc_z_a,
        ]
    }

    /// Raw value `[batch, atoms]` and advantage `[batch, actions * atoms]` logits.
    fn forward(&self, features: &Tensor, mode: Mode) -> (Tensor, Tensor) {
        let v = self
            .fc_z_v
            .forward(&self.fc_h_v.forward(features, mode).relu(), mode);
        let a = self
            .fc_z_a
            .forward(&self.fc_h_a.forward(features, mode).relu(), mode);
        (v, a)
    }
}

/// `value + advantage - mean_a(advantage)`.
///
/// `value` is `[batch, 1, atoms]`, `advantage` is `[batch, actions, atoms]`.
pub fn dueling_combine(value: &Tensor, advantage: &Tensor) -> Tensor {
    value + advantage - advantage.mean_dim(1, true, advantage.kind())
}

#[derive(Debug)]
pub struct SimSiamDqn {
    convs: ConvTrunk,
    streams: DuelingStreams,
    proj: ProjectionHead,
    pred: PredictionHead,
    atoms: i64,
    action_space: i64,
    conv_output_size: i64,
    mode: Mode,
    rng: StdRng,
}

impl SimSiamDqn {
    /// Builds every layer under `vs`.
    ///
    /// Fails if the configuration is invalid or if the trunk does not flatten
    /// `input_size x input_size` frames to the architecture's feature count.
    pub fn new(vs: &nn::Path, cfg: &NetworkConfig) -> Result<Self> {
        cfg.validate()?;

        let expected = cfg.architecture.conv_output_size();
        let actual = ConvTrunk::output_size(cfg.architecture, cfg.input_size, cfg.input_size);
        if actual != expected {
            return Err(ModelError::FeatureSizeMismatch {
                architecture: cfg.architecture,
                expected,
                actual,
            });
        }

        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let convs = ConvTrunk::new(&(vs / "convs"), cfg.architecture, cfg.history_length);
        let streams = DuelingStreams::new(vs, cfg, expected, &mut rng);
        let mut proj = ProjectionHead::new(
            &(vs / "proj"),
            expected,
            cfg.projection_dim,
            cfg.hidden_size,
        );
        proj.set_layers(cfg.projection_layers);
        let pred = PredictionHead::new(
            &(vs / "pred"),
            cfg.projection_dim,
            cfg.projection_dim,
            cfg.hidden_size,
        );

        debug!(
            architecture = %cfg.architecture,
            conv_output_size = expected,
            hidden_size = cfg.hidden_size,
            atoms = cfg.atoms,
            action_space = cfg.action_space,
            "built network"
        );

        Ok(Self {
            convs,
            streams,
            proj,
            pred,
            atoms: cfg.atoms,
            action_space: cfg.action_space,
            conv_output_size: expected,
            mode: Mode::Train,
            rng,
        })
    }

    pub fn atoms(&self) -> i64 {
        self.atoms
    }

    pub fn action_space(&self) -> i64 {
        self.action_space
    }

    pub fn architecture(&self) -> Architecture {
        self.convs.architecture()
    }

    pub fn conv_output_size(&self) -> i64 {
        self.conv_output_size
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn train(&mut self) {
        self.set_mode(Mode::Train);
    }

    pub fn eval(&mut self) {
        self.set_mode(Mode::Eval);
    }

    /// Value stream first (`fc_h_v`, `fc_z_v`), then advantage (`fc_h_a`, `fc_z_a`).
    pub fn noisy_units(&self) -> [&NoisyLinear; 4] {
        self.streams.units()
    }

    pub fn projection(&self) -> &ProjectionHead {
        &self.proj
    }

    pub fn projection_mut(&mut self) -> &mut ProjectionHead {
        &mut self.proj
    }

    /// Resamples the noise of every noisy layer. Trunk and SimSiam heads are
    /// untouched. Harmless in eval mode.
    pub fn reset_noise(&mut self) {
        for unit in self.streams.units_mut() {
            unit.reset_noise(&mut self.rng);
        }
        trace!(train = self.mode.is_train(), "reset noise");
    }

    /// Forward pass in the network's current mode.
    pub fn forward(&self, xs: &Tensor, log: bool) -> Result<NetworkOutput> {
        self.forward_with_mode(xs, self.mode, log)
    }

    /// `xs` is `[batch, history, H, W]`. `log` selects log-softmax over atoms.
    pub fn forward_with_mode(&self, xs: &Tensor, mode: Mode, log: bool) -> Result<NetworkOutput> {
        let features = xs.apply(&self.convs);
        // explicit batch dim: a -1 view is ambiguous for an empty batch
        let batch = features.size()[0];

        let (v, a) = self.streams.forward(&features, mode);
        let v = v.view([batch, 1, self.atoms]);
        let a = a.view([batch, self.action_space, self.atoms]);
        let q = dueling_combine(&v, &a);
        let q = if log {
            q.log_softmax(2, q.kind())
        } else {
            q.softmax(2, q.kind())
        };

        let embedding = self.proj.forward(&features)?;
        let prediction = embedding.apply(&self.pred);

        Ok(NetworkOutput {
            q,
            embedding,
            prediction,
        })
    }

    /// Expected return per action, `[batch, actions]`, for a `[atoms]` support.
    pub fn q_values(&self, xs: &Tensor, support: &Tensor) -> Result<Tensor> {
        let dist = self.forward(xs, false)?.q;
        let kind = dist.kind();
        Ok((dist * support).sum_dim_intlist(2, false, kind))
    }

    /// Greedy action for each observation in the batch.
    pub fn act(&self, xs: &Tensor, support: &Tensor) -> Result<Vec<i64>> {
        let actions = tch::no_grad(|| self.q_values(xs, support))?
            .argmax(1, false)
            .to_device(Device::Cpu);
        Ok(Vec::<i64>::try_from(&actions)?)
    }
}

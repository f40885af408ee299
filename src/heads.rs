//! SimSiam projection and prediction MLPs.

use tch::{nn, Tensor};

use crate::error::{ModelError, Result};

pub const EMBEDDING_DIM: i64 = 128;

/// Maps trunk features to an embedding.
///
/// Three blocks: `Linear -> ReLU`, `Linear -> ReLU`, `Linear`. With two layers
/// the middle block is skipped.
#[derive(Debug)]
pub struct ProjectionHead {
    layer1: nn::Linear,
    layer2: nn::Linear,
    layer3: nn::Linear,
    num_layers: i64,
}

impl ProjectionHead {
    pub fn new(vs: &nn::Path, input_dim: i64, output_dim: i64, hidden_dim: i64) -> Self {
        Self {
            layer1: nn::linear(vs / "layer1", input_dim, hidden_dim, Default::default()),
            layer2: nn::linear(vs / "layer2", hidden_dim, hidden_dim, Default::default()),
            layer3: nn::linear(vs / "layer3", hidden_dim, output_dim, Default::default()),
            num_layers: 3,
        }
    }

    /// Any value is accepted here; anything other than 2 or 3 fails in `forward`.
    pub fn set_layers(&mut self, layers: i64) {
        self.num_layers = layers;
    }

    pub fn num_layers(&self) -> i64 {
        self.num_layers
    }

    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self.num_layers {
            3 => Ok(xs
                .apply(&self.layer1)
                .relu()
                .apply(&self.layer2)
                .relu()
                .apply(&self.layer3)),
            2 => Ok(xs.apply(&self.layer1).relu().apply(&self.layer3)),
            n => Err(ModelError::InvalidLayerCount(n)),
        }
    }
}

/// Maps an embedding to a prediction of the same size.
#[derive(Debug)]
pub struct PredictionHead {
    layer1: nn::Linear,
    layer2: nn::Linear,
}

impl PredictionHead {
    pub fn new(vs: &nn::Path, input_dim: i64, output_dim: i64, hidden_dim: i64) -> Self {
        Self {
            layer1: nn::linear(vs / "layer1", input_dim, hidden_dim, Default::default()),
            layer2: nn::linear(vs / "layer2", hidden_dim, output_dim, Default::default()),
        }
    }
}

impl nn::Module for PredictionHead {
    fn forward(&self, xs: &Tensor) -> Tensor {
        xs.apply(&self.layer1).relu().apply(&self.layer2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::Module, Device, Kind};

    #[test]
    fn test_projection_three_layers() {
        let vs = nn::VarStore::new(Device::Cpu);
        let head = ProjectionHead::new(&vs.root(), 16, EMBEDDING_DIM, 32);
        let xs = Tensor::randn([4, 16], (Kind::Float, Device::Cpu));

        let z = head.forward(&xs).unwrap();
        assert_eq!(z.size(), vec![4, EMBEDDING_DIM]);
    }

    #[test]
    fn test_projection_two_layers_skips_hidden_block() {
        let vs = nn::VarStore::new(Device::Cpu);
        let mut head = ProjectionHead::new(&vs.root(), 16, EMBEDDING_DIM, 32);
        let xs = Tensor::randn([4, 16], (Kind::Float, Device::Cpu));

        head.set_layers(2);
        let z = head.forward(&xs).unwrap();
        assert_eq!(z.size(), vec![4, EMBEDDING_DIM]);

        let expected = xs.apply(&head.layer1).relu().apply(&head.layer3);
        assert!(z.equal(&expected));

        let full = {
            head.set_layers(3);
            head.forward(&xs).unwrap()
        };
        assert!(!full.allclose(&z, 1e-6, 1e-8, false));
    }

    #[test]
    fn test_projection_rejects_other_layer_counts() {
        let vs = nn::VarStore::new(Device::Cpu);
        let mut head = ProjectionHead::new(&vs.root(), 16, EMBEDDING_DIM, 32);
        let xs = Tensor::randn([2, 16], (Kind::Float, Device::Cpu));

        for layers in [0, 1, 4] {
            head.set_layers(layers);
            match head.forward(&xs) {
                Err(ModelError::InvalidLayerCount(n)) => assert_eq!(n, layers),
                other => panic!("expected InvalidLayerCount, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_prediction_shape() {
        let vs = nn::VarStore::new(Device::Cpu);
        let head = PredictionHead::new(&vs.root(), EMBEDDING_DIM, EMBEDDING_DIM, 64);
        let z = Tensor::randn([3, EMBEDDING_DIM], (Kind::Float, Device::Cpu));

        assert_eq!(head.forward(&z).size(), vec![3, EMBEDDING_DIM]);
    }
}

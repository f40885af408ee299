use tch::{nn, Tensor};

use crate::config::Architecture;

/// One conv + ReLU stage: `(out_channels, kernel, stride)`.
type Stage = (i64, i64, i64);

const CANONICAL: [Stage; 3] = [(32, 8, 4), (64, 4, 2), (64, 3, 1)];
const DATA_EFFICIENT: [Stage; 2] = [(32, 5, 5), (64, 5, 5)];

fn stages(architecture: Architecture) -> &'static [Stage] {
    match architecture {
        Architecture::Canonical => &CANONICAL,
        Architecture::DataEfficient => &DATA_EFFICIENT,
    }
}

/// Unpadded conv stack shared by every head.
#[derive(Debug)]
pub struct ConvTrunk {
    convs: Vec<nn::Conv2D>,
    architecture: Architecture,
}

impl ConvTrunk {
    pub fn new(vs: &nn::Path, architecture: Architecture, history_length: i64) -> Self {
        let mut in_channels = history_length;
        let convs = stages(architecture)
            .iter()
            .enumerate()
            .map(|(i, &(out_channels, kernel, stride))| {
                let conv = nn::conv2d(
                    vs / format!("conv{i}"),
                    in_channels,
                    out_channels,
                    kernel,
                    nn::ConvConfig {
                        stride,
                        padding: 0,
                        ..Default::default()
                    },
                );
                in_channels = out_channels;
                conv
            })
            .collect();

        Self {
            convs,
            architecture,
        }
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// Flattened feature count for `height x width` frames, 0 if a frame is
    /// smaller than some kernel.
    pub fn output_size(architecture: Architecture, height: i64, width: i64) -> i64 {
        let (mut h, mut w, mut channels) = (height, width, 0);
        for &(out_channels, kernel, stride) in stages(architecture) {
            if h < kernel || w < kernel {
                return 0;
            }
            h = (h - kernel) / stride + 1;
            w = (w - kernel) / stride + 1;
            channels = out_channels;
        }
        channels * h * w
    }
}

impl nn::Module for ConvTrunk {
    /// `[batch, history, H, W] -> [batch, features]`
    fn forward(&self, xs: &Tensor) -> Tensor {
        self.convs
            .iter()
            .fold(xs.shallow_clone(), |xs, conv| xs.apply(conv).relu())
            .flatten(1, -1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::Module, Device, Kind};

    #[test]
    fn test_output_size_matches_architecture_at_84() {
        for arch in [Architecture::Canonical, Architecture::DataEfficient] {
            assert_eq!(ConvTrunk::output_size(arch, 84, 84), arch.conv_output_size());
        }
    }

    #[test]
    fn test_output_size_for_other_resolutions() {
        // 64 -> 15 -> 6 -> 4
        assert_eq!(ConvTrunk::output_size(Architecture::Canonical, 64, 64), 64 * 16);
        assert_eq!(ConvTrunk::output_size(Architecture::DataEfficient, 4, 4), 0);
    }

    #[test]
    fn test_forward_flattens() {
        let vs = nn::VarStore::new(Device::Cpu);
        let trunk = ConvTrunk::new(&vs.root(), Architecture::DataEfficient, 4);
        let obs = Tensor::rand([2, 4, 84, 84], (Kind::Float, Device::Cpu));

        assert_eq!(trunk.forward(&obs).size(), vec![2, 576]);
        assert_eq!(trunk.architecture(), Architecture::DataEfficient);
    }
}

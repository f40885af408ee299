use std::fmt;
use std::path::Path;
use std::str::FromStr;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tch::{Device, Kind, Tensor};

use crate::error::{ModelError, Result};
use crate::heads::EMBEDDING_DIM;

/// Convolutional trunk topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Architecture {
    /// Nature-DQN trunk: three conv stages, 3136 features at 84x84.
    #[default]
    Canonical,
    /// Data-efficient Rainbow trunk: two strided conv stages, 576 features at 84x84.
    DataEfficient,
}

impl Architecture {
    /// Flattened feature count the dense heads are sized for.
    pub fn conv_output_size(self) -> i64 {
        match self {
            Architecture::Canonical => 3136,
            Architecture::DataEfficient => 576,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Architecture::Canonical => "canonical",
            Architecture::DataEfficient => "data-efficient",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Architecture {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "canonical" => Ok(Architecture::Canonical),
            "data-efficient" => Ok(Architecture::DataEfficient),
            other => Err(ModelError::InvalidConfig(vec![format!(
                "unknown architecture '{other}', expected 'canonical' or 'data-efficient'"
            )])),
        }
    }
}

/// Construction-time settings for [`crate::network::SimSiamDqn`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Support size of the return distribution
    pub atoms: i64,
    pub action_space: i64,
    pub architecture: Architecture,
    /// Stacked frames, i.e. input channels
    pub history_length: i64,
    pub hidden_size: i64,
    /// Initial scale of the noisy layers' deviation parameters
    pub noisy_std: f64,
    /// Side length of the square observation frames
    pub input_size: i64,
    pub projection_dim: i64,
    /// 2 or 3
    pub projection_layers: i64,
    pub v_min: f64,
    pub v_max: f64,
    /// Seeds the exploration noise. Drawn from the OS when unset.
    pub seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            atoms: 51,
            action_space: 6,
            architecture: Architecture::Canonical,
            history_length: 4,
            hidden_size: 512,
            noisy_std: 0.1,
            input_size: 84,
            projection_dim: EMBEDDING_DIM,
            projection_layers: 3,
            v_min: -10.0,
            v_max: 10.0,
            seed: None,
        }
    }
}

impl NetworkConfig {
    /// Load from an optional TOML file, overridden by `SIMSIAM_DQN__*` variables
    /// (e.g. `SIMSIAM_DQN__HIDDEN_SIZE=256`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let cfg: NetworkConfig = builder
            .add_source(
                Environment::with_prefix("SIMSIAM_DQN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every field and report all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.atoms < 2 {
            errors.push(format!("atoms must be at least 2, got {}", self.atoms));
        }
        for (name, value) in [
            ("action_space", self.action_space),
            ("history_length", self.history_length),
            ("hidden_size", self.hidden_size),
            ("input_size", self.input_size),
            ("projection_dim", self.projection_dim),
        ] {
            if value <= 0 {
                errors.push(format!("{name} must be positive, got {value}"));
            }
        }
        if !(self.noisy_std > 0.0) {
            errors.push(format!("noisy_std must be positive, got {}", self.noisy_std));
        }
        if !(self.v_min < self.v_max) {
            errors.push(format!(
                "v_min ({}) must be below v_max ({})",
                self.v_min, self.v_max
            ));
        }
        if !matches!(self.projection_layers, 2 | 3) {
            errors.push(format!(
                "projection_layers must be 2 or 3, got {}",
                self.projection_layers
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ModelError::InvalidConfig(errors))
        }
    }

    /// Evenly spaced return support `[v_min, v_max]` with `atoms` points.
    pub fn support(&self, device: Device) -> Tensor {
        Tensor::linspace(self.v_min, self.v_max, self.atoms, (Kind::Float, device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = NetworkConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.architecture.conv_output_size(), 3136);
    }

    #[test]
    fn test_validate_collects_every_violation() {
        let cfg = NetworkConfig {
            atoms: 1,
            hidden_size: 0,
            noisy_std: 0.0,
            v_min: 5.0,
            v_max: 5.0,
            projection_layers: 4,
            ..Default::default()
        };
        match cfg.validate() {
            Err(ModelError::InvalidConfig(errors)) => assert_eq!(errors.len(), 5),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_architecture_names_round_trip() {
        for arch in [Architecture::Canonical, Architecture::DataEfficient] {
            assert_eq!(arch.to_string().parse::<Architecture>().unwrap(), arch);
        }
        assert!("nature".parse::<Architecture>().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "atoms = 21\narchitecture = \"data-efficient\"\nhidden_size = 256\nseed = 7"
        )
        .unwrap();

        let cfg = NetworkConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.atoms, 21);
        assert_eq!(cfg.architecture, Architecture::DataEfficient);
        assert_eq!(cfg.hidden_size, 256);
        assert_eq!(cfg.seed, Some(7));
        // untouched fields keep their defaults
        assert_eq!(cfg.history_length, 4);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "noisy_std = -1.0").unwrap();
        assert!(matches!(
            NetworkConfig::load(Some(file.path())),
            Err(ModelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_support_spans_bounds() {
        let cfg = NetworkConfig::default();
        let support = cfg.support(Device::Cpu);
        assert_eq!(support.size(), vec![51]);
        assert!((support.double_value(&[0]) + 10.0).abs() < 1e-6);
        assert!((support.double_value(&[50]) - 10.0).abs() < 1e-6);
    }
}

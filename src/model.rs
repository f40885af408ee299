use std::path::Path;

use tch::{nn, Device};
use tracing::info;

use crate::{config::NetworkConfig, error::Result, network::SimSiamDqn};

/// A network together with the var store that owns its parameters.
pub struct Model {
    pub vs: nn::VarStore,
    pub net: SimSiamDqn,
    pub config: NetworkConfig,
}

impl Model {
    pub fn new(config: NetworkConfig, device: Device) -> Result<Self> {
        let vs = nn::VarStore::new(device);
        let net = SimSiamDqn::new(&vs.root(), &config)?;
        Ok(Self { vs, net, config })
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }

    /// Writes the learned parameters. Noise buffers are not saved.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.vs.save(&path)?;
        info!(path = %path.as_ref().display(), "saved model");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.vs.load(&path)?;
        info!(path = %path.as_ref().display(), "loaded model");
        Ok(())
    }
}

//! This crate provides the network side of a data-efficient Rainbow agent:
//! a noisy dueling categorical DQN whose convolutional trunk also feeds a
//! SimSiam projection/prediction head for self-supervised representation learning.
//! Losses, optimisation and replay live in the training harness that drives it.

pub mod cli;
pub mod config;
pub mod error;
pub mod heads;
pub mod model;
pub mod network;
pub mod noisy;
pub mod trunk;

pub use config::{Architecture, NetworkConfig};
pub use error::{ModelError, Result};
pub use model::Model;
pub use network::{NetworkOutput, SimSiamDqn};
pub use noisy::{Mode, NoisyLinear};

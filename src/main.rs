//! Builds the network from configuration and runs it on a synthetic batch.
//!
//! Usage: `simsiam-dqn [config.toml] [checkpoint.ot] [--batch-size N]`

use anyhow::Context;
use clap::Parser;
use simsiam_dqn::{cli::Cli, Model, NetworkConfig};
use tch::{Device, Kind, Tensor};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();

    let config = NetworkConfig::load(cli.config.as_deref()).context("loading network config")?;
    let mut model = Model::new(config, Device::cuda_if_available())?;
    let device = model.device();
    info!(?device, architecture = %model.config.architecture, "model ready");

    // Load saved weights if the checkpoint exists, otherwise start fresh.
    if let Some(path) = &cli.checkpoint {
        if path.exists() {
            model.load(path)?;
        }
    }

    let side = model.config.input_size;
    let observations = Tensor::rand(
        [cli.batch_size, model.config.history_length, side, side],
        (Kind::Float, device),
    );

    model.net.reset_noise();
    let output = tch::no_grad(|| model.net.forward(&observations, false))?;
    info!(
        q = ?output.q.size(),
        embedding = ?output.embedding.size(),
        prediction = ?output.prediction.size(),
        "forward pass"
    );

    let support = model.config.support(device);
    let actions = model.net.act(&observations, &support)?;
    info!(?actions, "greedy actions (noisy)");

    model.net.eval();
    let actions = model.net.act(&observations, &support)?;
    info!(?actions, "greedy actions (eval)");

    if let Some(path) = &cli.checkpoint {
        model.save(path)?;
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,simsiam_dqn=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

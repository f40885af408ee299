use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "simsiam-dqn")]
#[command(version = "0.1.0")]
#[command(about = "Build the network and run it on a synthetic observation batch", long_about = None)]
pub struct Cli {
    /// TOML network config; SIMSIAM_DQN__* variables override it
    pub config: Option<PathBuf>,

    /// Weights to load if present, written back after the run
    pub checkpoint: Option<PathBuf>,

    /// Observations in the synthetic batch
    #[arg(short, long, default_value_t = 8)]
    pub batch_size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments() {
        let cli = Cli::try_parse_from(["simsiam-dqn"]).unwrap();
        assert!(cli.config.is_none());
        assert!(cli.checkpoint.is_none());
        assert_eq!(cli.batch_size, 8);
    }

    #[test]
    fn test_positional_paths_and_batch_size() {
        let cli =
            Cli::try_parse_from(["simsiam-dqn", "net.toml", "model.ot", "--batch-size", "2"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("net.toml")));
        assert_eq!(cli.checkpoint, Some(PathBuf::from("model.ot")));
        assert_eq!(cli.batch_size, 2);
    }

    #[test]
    fn test_rejects_extra_positionals() {
        assert!(Cli::try_parse_from(["simsiam-dqn", "a.toml", "b.ot", "c"]).is_err());
    }
}

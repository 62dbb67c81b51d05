// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and delegates everything else to Layer 2.
//
// Two commands are supported:
//   1. `train`    — builds vocabulary + embeddings, trains, checkpoints
//   2. `evaluate` — reloads a checkpoint and scores held-out data

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

use crate::domain::error::QaError;

#[derive(Parser, Debug)]
#[command(
    name = "bidaf-qa",
    version = "0.1.0",
    about = "Train a bidirectional attention flow model to pick answer sentences, then evaluate it."
)]
pub struct Cli {
    /// The subcommand to run (train or evaluate)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        let result = match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        };
        if let Err(err) = &result {
            if is_config_failure(err) {
                tracing::error!("Invalid configuration, check the command-line options: {err:#}");
            }
        }
        result
    }
}

/// True when the root cause is a configuration mistake rather than bad data.
fn is_config_failure(err: &anyhow::Error) -> bool {
    err.downcast_ref::<QaError>().is_some_and(QaError::is_config_error)
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on: {}", args.train_path);
    let use_case = TrainUseCase::new(args.try_into()?);
    use_case.execute()?;

    println!("Training complete. Checkpoint saved.");
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let report = EvaluateUseCase::new(args.try_into()?).execute()?;
    println!(
        "\nQueries: {} | Sentences: {} | Accuracy: {:.4} | MAP: {:.4} | MRR: {:.4}",
        report.queries, report.sentences, report.accuracy, report.map, report.mrr
    );
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_config_failure_seen_through_context() {
        let err = Err::<(), _>(QaError::InvalidConfig("batch_size must be positive".into()))
            .context("Cannot start training")
            .unwrap_err();
        assert!(is_config_failure(&err));
    }

    #[test]
    fn test_data_failure_is_not_config() {
        let err = anyhow::Error::from(QaError::InvalidLabel(3));
        assert!(!is_config_failure(&err));
        assert!(!is_config_failure(&anyhow::anyhow!("disk full")));
    }
}

//! seg-eval CLI - semantic segmentation evaluation tool

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

/// Semantic segmentation evaluation tool.
#[derive(Parser)]
#[command(name = "seg-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a model on a validation split
    Eval(commands::eval::EvalCommand),

    /// List datasets, or show one dataset's samples and classes
    Datasets {
        /// Dataset to inspect
        #[arg(long)]
        dataset: Option<String>,

        /// Dataset root directory
        #[arg(long, env = "SEG_DATA_ROOT", default_value = "datasets")]
        data_root: PathBuf,

        /// Split to inspect
        #[arg(long, default_value = "val")]
        split: String,

        /// Class count (required by the folder dataset)
        #[arg(long)]
        num_class: Option<usize>,
    },

    /// List registered models
    Models,

    /// Write freshly initialized linear-head weights
    InitWeights {
        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of classes
        #[arg(long)]
        num_class: usize,

        /// Input channels
        #[arg(long, default_value_t = 3)]
        in_channels: usize,

        /// Output stride (average pooling factor)
        #[arg(long, default_value_t = 8)]
        output_stride: usize,

        /// Also initialize an auxiliary head
        #[arg(long)]
        aux: bool,

        /// Initialization seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Eval(cmd) => commands::eval::run(cmd, cli.verbose),
        Commands::Datasets { dataset, data_root, split, num_class } => {
            commands::datasets::run(dataset.as_deref(), data_root, &split, num_class, cli.verbose)
        }
        Commands::Models => commands::models::list(cli.verbose),
        Commands::InitWeights { output, num_class, in_channels, output_stride, aux, seed } => {
            commands::models::init_weights(
                output,
                in_channels,
                num_class,
                output_stride,
                aux,
                seed,
                cli.verbose,
            )
        }
    }
}

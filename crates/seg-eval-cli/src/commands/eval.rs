//! Evaluation command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use seg_eval::config::{rank, world_size};
use seg_eval::logging::setup_logger;
use seg_eval::{DatasetSplit, EvalArgs, Evaluator};
use tracing::info;

#[derive(Args)]
pub struct EvalCommand {
    /// Model name
    #[arg(long, default_value = "linear")]
    model: String,

    /// Backbone name
    #[arg(long, default_value = "resnet50")]
    backbone: String,

    /// Dataset name (citys, pascal_voc, ade20k, folder)
    #[arg(long, default_value = "citys")]
    dataset: String,

    /// Build the auxiliary head
    #[arg(long)]
    aux: bool,

    /// Add horizontally flipped predictions
    #[arg(long)]
    flip: bool,

    /// Directory for the evaluation log
    #[arg(long, default_value = "runs/logs")]
    log_dir: PathBuf,

    /// Dataset root directory
    #[arg(long, env = "SEG_DATA_ROOT", default_value = "datasets")]
    data_root: PathBuf,

    /// Pretrained weights directory
    #[arg(long, env = "SEG_MODEL_ROOT", default_value = "models")]
    model_root: PathBuf,

    /// Split to evaluate
    #[arg(long, default_value = "val")]
    split: String,

    /// Comma-separated input scales
    #[arg(long, value_delimiter = ',', default_value = "1.0")]
    scales: Vec<f64>,

    /// Base short side in pixels
    #[arg(long)]
    base_size: Option<u32>,

    /// Class count (required by the folder dataset)
    #[arg(long)]
    num_class: Option<usize>,

    /// Shuffle samples with this seed
    #[arg(long)]
    shuffle_seed: Option<u64>,

    /// Write JSON and CSV reports into this directory
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Print the report as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl EvalCommand {
    fn to_args(&self) -> Result<EvalArgs> {
        let split: DatasetSplit = self.split.parse()?;
        let mut builder = EvalArgs::builder()
            .dataset(&self.dataset)
            .model(&self.model)
            .backbone(&self.backbone)
            .aux(self.aux)
            .flip(self.flip)
            .log_dir(&self.log_dir)
            .data_root(&self.data_root)
            .model_root(&self.model_root)
            .split(split)
            .scales(self.scales.clone());
        if let Some(size) = self.base_size {
            builder = builder.base_size(size);
        }
        if let Some(n) = self.num_class {
            builder = builder.num_class(n);
        }
        if let Some(seed) = self.shuffle_seed {
            builder = builder.shuffle(seed);
        }
        if let Some(dir) = &self.report_dir {
            builder = builder.report_dir(dir);
        }
        Ok(builder.build()?)
    }
}

pub fn run(cmd: EvalCommand, verbose: bool) -> Result<()> {
    let args = cmd.to_args()?;

    let world_size = world_size()?;
    let rank = rank()?;
    let log_path = setup_logger(&args.log_dir, rank, &args.log_filename(), true)
        .context("Failed to set up logging")?;

    if verbose {
        if let Some(path) = &log_path {
            eprintln!("Logging to: {}", path.display());
        }
    }
    info!("World size: {}, rank: {}", world_size, rank);
    info!("{:?}", args);

    let mut evaluator = Evaluator::new(args.clone())
        .with_context(|| format!("Failed to build evaluator for {}", args.run_name()))?;
    let report = evaluator.eval().context("Evaluation failed")?;

    if let Some(dir) = &args.report_dir {
        let (json, csv) = report
            .write(dir)
            .with_context(|| format!("Failed to write report to {}", dir.display()))?;
        println!("Wrote {} and {}", json.display(), csv.display());
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if verbose {
        println!("Worst classes:");
        for class in report.worst_classes(5) {
            println!("  {:>3} {:<20} {:.4}", class.index, class.name, class.iou);
        }
    }

    Ok(())
}

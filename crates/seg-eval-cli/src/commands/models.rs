//! Model commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use seg_eval::{LinearWeights, ModelZoo};

pub fn list(verbose: bool) -> Result<()> {
    let zoo = ModelZoo::with_defaults();
    println!("Registered models:");
    for name in zoo.names() {
        println!("  {name}");
    }
    if verbose {
        println!();
        println!("Weights are read from <model_root>/<model>_<backbone>_<dataset>.json");
    }
    Ok(())
}

pub fn init_weights(
    output: PathBuf,
    in_channels: usize,
    num_class: usize,
    output_stride: usize,
    aux: bool,
    seed: u64,
    verbose: bool,
) -> Result<()> {
    let weights = LinearWeights::init(in_channels, num_class, output_stride, aux, seed);
    weights
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if verbose {
        eprintln!(
            "{num_class} classes, {in_channels} inputs, stride {}, aux: {aux}",
            weights.output_stride
        );
    }
    println!("Wrote {}", output.display());
    Ok(())
}

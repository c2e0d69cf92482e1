//! Dataset inspection command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use seg_eval::dataset::dataset_names;
use seg_eval::{DatasetMode, DatasetOptions, DatasetSplit, get_segmentation_dataset};

pub fn run(
    dataset: Option<&str>,
    data_root: PathBuf,
    split: &str,
    num_class: Option<usize>,
    verbose: bool,
) -> Result<()> {
    let Some(name) = dataset else {
        println!("Available datasets:");
        for name in dataset_names() {
            println!("  {name}");
        }
        return Ok(());
    };

    let split: DatasetSplit = split.parse()?;
    let options = DatasetOptions {
        split,
        mode: DatasetMode::Val,
        num_class,
        ..DatasetOptions::default()
    };
    let ds = get_segmentation_dataset(name, &data_root, options)
        .with_context(|| format!("Failed to open dataset {name} at {}", data_root.display()))?;

    println!("Dataset: {}", ds.name());
    println!("Root: {}", data_root.display());
    println!("Split: {split}");
    println!("Samples: {}", ds.len());
    println!("Classes: {}", ds.num_class());

    if verbose {
        println!();
        for (i, class) in ds.class_names().iter().enumerate() {
            println!("  {i:>3}: {class}");
        }
    }

    Ok(())
}

//! Report types for evaluation results.
//!
//! An [`EvalReport`] is returned by every evaluation run and can be written
//! as JSON (full report) and CSV (one row per class).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dataset::DatasetSplit;
use crate::error::Result;
use crate::metric::MetricValues;

/// IoU of a single class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassResult {
    /// Class index.
    pub index: usize,
    /// Class name.
    pub name: String,
    /// Intersection-over-Union.
    pub iou: f64,
}

/// Result of one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    /// Run identifier (`{model}_{backbone}_{dataset}`).
    pub name: String,

    /// Dataset name.
    pub dataset: String,

    /// Model name.
    pub model: String,

    /// Backbone name.
    pub backbone: String,

    /// Evaluated split.
    pub split: DatasetSplit,

    /// Whether flip augmentation was used.
    pub flip: bool,

    /// Input scales.
    pub scales: Vec<f64>,

    /// Number of evaluated samples.
    pub sample_count: usize,

    /// Number of model forward passes.
    pub forward_passes: usize,

    /// Pixel accuracy.
    pub pix_acc: f64,

    /// Mean IoU.
    pub miou: f64,

    /// Per-class IoU.
    pub classes: Vec<ClassResult>,

    /// Wall-clock time of the evaluation loop.
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,

    /// When this report was generated.
    #[serde(with = "chrono_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl EvalReport {
    /// Attach class names to metric values.
    ///
    /// Missing names fall back to `class_{index}`.
    #[must_use]
    pub fn class_results(values: &MetricValues, names: &[String]) -> Vec<ClassResult> {
        values
            .iter_iou()
            .map(|(index, iou)| ClassResult {
                index,
                name: names
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| format!("class_{index}")),
                iou,
            })
            .collect()
    }

    /// Per-class IoU values in class order.
    #[must_use]
    pub fn iou(&self) -> Vec<f64> {
        self.classes.iter().map(|c| c.iou).collect()
    }

    /// The `n` classes with the lowest IoU, worst first.
    #[must_use]
    pub fn worst_classes(&self, n: usize) -> Vec<&ClassResult> {
        let mut sorted: Vec<&ClassResult> = self.classes.iter().collect();
        sorted.sort_by(|a, b| a.iou.partial_cmp(&b.iou).unwrap_or(std::cmp::Ordering::Equal));
        sorted.truncate(n);
        sorted
    }

    /// Write `{name}.json` and `{name}.csv` into `dir`.
    pub fn write(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)?;

        let json_path = dir.join(format!("{}.json", self.name));
        std::fs::write(&json_path, serde_json::to_string_pretty(self)?)?;

        let csv_path = dir.join(format!("{}.csv", self.name));
        self.write_csv(&csv_path)?;

        Ok((json_path, csv_path))
    }

    /// Write per-class IoU as CSV.
    fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["class", "name", "iou"])?;
        for class in &self.classes {
            wtr.write_record([
                &class.index.to_string(),
                &class.name,
                &format!("{:.6}", class.iou),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

// Custom serialization for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn sample_report() -> EvalReport {
        let values = MetricValues {
            pix_acc: 0.9,
            iou: vec![0.8, 0.2, 0.5],
            miou: 0.5,
        };
        let names = vec!["road".to_string(), "sky".to_string()];
        EvalReport {
            name: "linear_none_folder".to_string(),
            dataset: "folder".to_string(),
            model: "linear".to_string(),
            backbone: "none".to_string(),
            split: DatasetSplit::Val,
            flip: true,
            scales: vec![0.75, 1.0],
            sample_count: 3,
            forward_passes: 12,
            pix_acc: values.pix_acc,
            miou: values.miou,
            classes: EvalReport::class_results(&values, &names),
            elapsed: Duration::from_millis(1500),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_class_results_fallback_names() {
        let report = sample_report();
        assert_eq!(report.classes[0].name, "road");
        assert_eq!(report.classes[2].name, "class_2");
        assert_eq!(report.iou(), vec![0.8, 0.2, 0.5]);
    }

    #[test]
    fn test_worst_classes() {
        let report = sample_report();
        let worst: Vec<usize> = report.worst_classes(2).iter().map(|c| c.index).collect();
        assert_eq!(worst, vec![1, 2]);
    }

    #[test]
    fn test_write_json_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report();
        let (json, csv_path) = report.write(dir.path()).unwrap();

        let parsed: EvalReport =
            serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(parsed.sample_count, 3);
        assert_eq!(parsed.elapsed, Duration::from_millis(1500));
        assert_eq!(parsed.classes, report.classes);

        let csv = std::fs::read_to_string(csv_path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "class,name,iou");
        assert_eq!(lines[1], "0,road,0.800000");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_write_into_file_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("reports");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = sample_report().write(&blocker).unwrap_err();
        assert!(matches!(err, Error::Io(_)), "{err}");
    }
}

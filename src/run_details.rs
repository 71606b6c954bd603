use crate::error::Result;
use crate::logger::LogSink;
use crate::report::value_to_cell;

use serde::{Serialize, Serializer};
use serde_derive::{Deserialize, Serialize};

use std::fs;
use std::path::Path;

/// Outcome of one benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Status {
    #[serde(rename = "SUCCESS")]
    Success,
    #[default]
    #[serde(rename = "FAILURE")]
    Failure,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::Failure => "FAILURE",
        }
    }
}

impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Report fields that vary per row in a multi-result batch; they travel in
/// the results CSV instead of the shared JSON.
const BATCH_KEYS: [&str; 4] = ["model", "performance", "metric", "status"];

/// Metadata and result of one benchmark run, fields in report column order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunDetails {
    pub pipeline: String,
    pub model: String,
    pub tags: String,
    pub args: String,
    pub docker_file: String,
    pub base_docker: String,
    pub docker_sha: String,
    pub docker_image: String,
    pub machine_name: String,
    pub host_os: String,
    pub gpu_architecture: String,
    pub n_gpus: String,
    pub training_precision: String,
    pub performance: Option<f64>,
    pub metric: String,
    pub status: Status,
    pub build_duration: String,
    pub test_duration: String,
    pub git_commit: String,
    pub relative_change: String,
}

impl RunDetails {
    pub fn new() -> RunDetails {
        RunDetails::default()
    }

    /// Record the measured value and derive the run status from it: SUCCESS
    /// exactly when a non-NaN value is present.
    pub fn record_performance(&mut self, performance: Option<f64>, metric: &str) {
        self.status = match performance {
            Some(value) if !value.is_nan() => Status::Success,
            _ => Status::Failure,
        };
        self.performance = performance;
        self.metric = metric.to_string();
    }

    pub fn print_summary(&self, log: &dyn LogSink) {
        log.info(&format!(
            "Model: {}, Machine: {}, GPU: {}, GPU Arch: {}, Precision: {}, \
             Performance: {}, Metric: {}, Status: {}, Build Duration: {}, Test Duration: {}",
            self.model,
            self.machine_name,
            self.n_gpus,
            self.gpu_architecture,
            self.training_precision,
            fmt_performance(self.performance),
            self.metric,
            self.status.as_str(),
            self.build_duration,
            self.test_duration
        ));
    }

    pub fn print_perf_metric(&self, log: &dyn LogSink) {
        log.info(&format!(
            "{} performance is {} {}",
            self.model,
            fmt_performance(self.performance),
            self.metric
        ));
    }

    /// The record as a field-ordered JSON map. When it describes a
    /// multi-result run the per-row batch keys are dropped.
    pub fn to_json_map(
        &self,
        multiple_results: bool,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let map = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        if multiple_results {
            // Filter instead of removing in place, which would not keep the
            // remaining fields in report order.
            return Ok(map
                .into_iter()
                .filter(|(key, _)| !BATCH_KEYS.contains(&key.as_str()))
                .collect());
        }
        Ok(map)
    }

    /// Write the record to `json_name` as pretty-printed JSON.
    pub fn generate_json(&self, json_name: &Path, multiple_results: bool) -> Result<()> {
        let map = self.to_json_map(multiple_results)?;
        let file = fs::File::create(json_name)?;
        serde_json::to_writer_pretty(file, &map)?;
        Ok(())
    }

    /// Append the record to the CSV report at `report_name`, writing a
    /// header first when the file is missing or empty.
    pub fn generate_report(&self, report_name: &Path, multiple_results: bool) -> Result<()> {
        let map = self.to_json_map(multiple_results)?;
        let needs_header = match fs::metadata(report_name) {
            Ok(metadata) => metadata.len() == 0,
            Err(_) => true,
        };

        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(report_name)?;
        let mut writer = csv::Writer::from_writer(file);
        if needs_header {
            writer.write_record(map.keys())?;
        }
        writer.write_record(map.values().map(value_to_cell))?;
        writer.flush()?;
        Ok(())
    }
}

fn fmt_performance(performance: Option<f64>) -> String {
    match performance {
        Some(value) => value.to_string(),
        None => String::new(),
    }
}

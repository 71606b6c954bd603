use crate::error::{BenchmarkError, Result};
use crate::logger::LogSink;

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Column order of the rolling performance report.
pub const REPORT_COLUMNS: [&str; 20] = [
    "pipeline",
    "model",
    "tags",
    "args",
    "docker_file",
    "base_docker",
    "docker_sha",
    "docker_image",
    "machine_name",
    "host_os",
    "gpu_architecture",
    "n_gpus",
    "training_precision",
    "performance",
    "metric",
    "status",
    "build_duration",
    "test_duration",
    "git_commit",
    "relative_change",
];

/// Snapshot of only the newest row(s), rewritten on every aggregation call.
pub const PERF_ENTRY_FILE: &str = "perf_entry.csv";

type JsonMap = serde_json::Map<String, Value>;

/// The rolling report, held fully in memory between load and write.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ReportTable {
    /// Read the report at `path`, or start an empty table with the canonical
    /// columns when the file is missing or empty.
    pub fn load(path: &Path) -> Result<ReportTable> {
        let has_content = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        if !has_content {
            return Ok(ReportTable {
                columns: REPORT_COLUMNS.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            });
        }

        let mut reader = csv::Reader::from_path(path)?;
        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|header| header.trim().to_string())
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }
        Ok(ReportTable { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Append one entry, unioning its keys into the column set. Columns new
    /// to the table are added in entry order, with empty cells backfilled
    /// for earlier rows.
    pub fn append_union(&mut self, entry: &JsonMap) {
        for key in entry.keys() {
            if !self.columns.iter().any(|column| column == key) {
                self.columns.push(key.clone());
                for row in &mut self.rows {
                    row.push(String::new());
                }
            }
        }
        let row = self.project(entry);
        self.rows.push(row);
    }

    /// Append one entry projected onto the existing columns; keys the table
    /// does not know are dropped, missing ones become empty cells.
    pub fn append_projected(&mut self, entry: &JsonMap) {
        let row = self.project(entry);
        self.rows.push(row);
    }

    fn project(&self, entry: &JsonMap) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| entry.get(column).map(value_to_cell).unwrap_or_default())
            .collect()
    }

    /// Rewrite the report file in full.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Render a JSON scalar the way it should appear in a CSV cell.
pub fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

/// Collapse a list-valued `tags` field to a comma-joined string. Entries
/// that are already strings pass through unchanged.
pub fn flatten_tags(perf_entry: &mut JsonMap) {
    let joined = match perf_entry.get("tags") {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(value_to_cell)
                .collect::<Vec<_>>()
                .join(","),
        ),
        _ => None,
    };
    if let Some(joined) = joined {
        perf_entry.insert("tags".to_string(), Value::String(joined));
    }
}

fn read_json_map(path: &Path) -> Result<JsonMap> {
    let content = fs::read_to_string(path)?;
    match serde_json::from_str(&content)? {
        Value::Object(map) => Ok(map),
        _ => Err(BenchmarkError::Schema(format!(
            "Result file {} must hold a JSON object",
            path.display()
        ))),
    }
}

fn write_side_entry(path: &Path, columns: &[String], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Fold a single-run JSON artifact into the table and the side file.
pub fn handle_single_result(
    table: &mut ReportTable,
    single_result: &Path,
    side_entry: &Path,
) -> Result<()> {
    append_json_artifact(table, single_result, side_entry)
}

/// Exception artifacts share the single-result shape; their status arrives
/// already set to FAILURE by the producer.
pub fn handle_exception_result(
    table: &mut ReportTable,
    exception_result: &Path,
    side_entry: &Path,
) -> Result<()> {
    append_json_artifact(table, exception_result, side_entry)
}

fn append_json_artifact(table: &mut ReportTable, result: &Path, side_entry: &Path) -> Result<()> {
    let mut entry = read_json_map(result)?;
    flatten_tags(&mut entry);

    let columns: Vec<String> = entry.keys().cloned().collect();
    let row: Vec<String> = entry.values().map(value_to_cell).collect();
    write_side_entry(side_entry, &columns, &[row])?;

    table.append_union(&entry);
    Ok(())
}

/// Fold a multi-row CSV artifact into the table: validate the header,
/// overlay each row onto the shared common info, and append the batch.
pub fn handle_multiple_results(
    table: &mut ReportTable,
    multiple_results: &Path,
    common_info: &Path,
    model_name: &str,
    side_entry: &Path,
) -> Result<()> {
    let mut reader = csv::Reader::from_path(multiple_results)?;
    let header: Vec<String> = reader
        .headers()?
        .iter()
        .map(|column| column.trim().to_string())
        .collect();

    // The header must be exactly {model, performance, metric}, any order,
    // checked before any row is touched.
    if header.len() != 3 {
        return Err(BenchmarkError::Schema(
            "Multiple Results CSV file must have three columns: model, performance, metric"
                .to_string(),
        ));
    }
    let model_idx = column_position(&header, "model")?;
    let performance_idx = column_position(&header, "performance")?;
    let metric_idx = column_position(&header, "metric")?;

    let mut common = read_json_map(common_info)?;
    flatten_tags(&mut common);

    let mut batch: Vec<JsonMap> = Vec::new();
    for record in reader.records() {
        let record = record?;
        let model = record.get(model_idx).unwrap_or("");
        let performance = record.get(performance_idx).unwrap_or("");
        let metric = record.get(metric_idx).unwrap_or("");

        let mut row = common.clone();
        row.insert(
            "model".to_string(),
            Value::String(format!("{}_{}", model_name, model)),
        );
        row.insert(
            "performance".to_string(),
            Value::String(performance.to_string()),
        );
        row.insert("metric".to_string(), Value::String(metric.to_string()));
        row.insert(
            "status".to_string(),
            Value::String(row_status(performance).to_string()),
        );
        batch.push(row);
    }

    // Reindex the batch to the report's column order before anything is
    // written.
    let columns = table.columns().to_vec();
    let side_rows: Vec<Vec<String>> = batch
        .iter()
        .map(|entry| {
            columns
                .iter()
                .map(|column| entry.get(column).map(value_to_cell).unwrap_or_default())
                .collect()
        })
        .collect();
    write_side_entry(side_entry, &columns, &side_rows)?;

    for entry in &batch {
        table.append_projected(entry);
    }
    Ok(())
}

fn column_position(header: &[String], name: &str) -> Result<usize> {
    header
        .iter()
        .position(|column| column == name)
        .ok_or_else(|| {
            BenchmarkError::Schema(format!(
                "Multiple Results CSV file is missing the {} column",
                name
            ))
        })
}

/// A batch row succeeds when its performance cell holds a value and that
/// value is not NaN.
fn row_status(performance: &str) -> &'static str {
    let cell = performance.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        "FAILURE"
    } else {
        "SUCCESS"
    }
}

/// Arguments to one aggregation call. Exactly one artifact source is
/// consumed, in the priority order multiple > single > exception.
#[derive(Debug, Default, Clone)]
pub struct ReportUpdate {
    pub single_result: Option<PathBuf>,
    pub exception_result: Option<PathBuf>,
    /// Accepted for interface parity; no dispatch path consumes it.
    pub failed_result: Option<PathBuf>,
    pub multiple_results: Option<PathBuf>,
    pub model_name: Option<String>,
    pub common_info: Option<PathBuf>,
}

/// Merge one result artifact into the report at `perf_csv`, rewriting the
/// side file with just this call's rows.
pub fn update_perf_csv(update: &ReportUpdate, perf_csv: &Path, log: &dyn LogSink) -> Result<()> {
    let mut table = ReportTable::load(perf_csv)?;
    log.info(&format!(
        "Loaded performance report with {} rows and {} columns",
        table.rows().len(),
        table.columns().len()
    ));

    let side_entry = side_entry_path(perf_csv);

    if let Some(multiple_results) = &update.multiple_results {
        let common_info = update
            .common_info
            .as_deref()
            .ok_or(BenchmarkError::MissingInput("common_info"))?;
        let model_name = update
            .model_name
            .as_deref()
            .ok_or(BenchmarkError::MissingInput("model_name"))?;
        handle_multiple_results(&mut table, multiple_results, common_info, model_name, &side_entry)?;
    } else if let Some(single_result) = &update.single_result {
        handle_single_result(&mut table, single_result, &side_entry)?;
    } else if let Some(exception_result) = &update.exception_result {
        handle_exception_result(&mut table, exception_result, &side_entry)?;
    } else {
        return Err(BenchmarkError::MissingInput(
            "one of single_result, exception_result or multiple_results",
        ));
    }

    table.write(perf_csv)?;
    log.info(&format!(
        "Wrote updated performance CSV to {}",
        perf_csv.display()
    ));
    Ok(())
}

/// The side file lives next to the report it snapshots.
pub fn side_entry_path(perf_csv: &Path) -> PathBuf {
    match perf_csv.parent() {
        Some(parent) => parent.join(PERF_ENTRY_FILE),
        None => PathBuf::from(PERF_ENTRY_FILE),
    }
}

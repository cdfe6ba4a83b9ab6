//! Result export and lookup utilities.
//!
//! Sweep results go to CSV, JSON or Parquet; heatmaps to CSV; calibration
//! outcomes to JSON.

use std::path::Path;

use crate::calibration::CalibrationOutcome;
use crate::heatmap::Heatmap;
use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

#[path = "export/csv.rs"]
mod csv;
#[path = "export/json.rs"]
mod json;
#[path = "export/parquet.rs"]
mod parquet;
#[path = "export/ranking.rs"]
mod ranking;
#[path = "export/writer_utils.rs"]
mod writer_utils;

/// Export simulation results to Parquet format.
///
/// One row per result, one column per metric in `SimulationResult`.
///
/// # Errors
///
/// Returns an error if `results` is empty or file creation or Parquet
/// writing fails.
pub fn export_to_parquet(
    results: &[SimulationResult],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    writer_utils::ensure_not_empty(results, "results")?;
    let file = writer_utils::create_output_file(path)?;
    parquet::export_to_parquet_impl(results, file)
}

/// Export simulation results to JSON format (an array of objects).
///
/// # Errors
///
/// Returns an error if file creation or JSON serialization fails.
pub fn export_to_json(
    results: &[SimulationResult],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = writer_utils::create_output_file(path)?;
    json::export_to_json_impl(results, file)
}

/// Export simulation results with parameters to CSV format.
///
/// Parameters and results are paired by index (`results[i]` corresponds to
/// `parameter_sets[i]`).
///
/// # Errors
///
/// Returns an error if file creation or CSV writing fails, or if results and
/// parameter_sets lengths don't match.
pub fn export_to_csv(
    results: &[SimulationResult],
    parameter_sets: &[ParameterSet],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    writer_utils::ensure_not_empty(results, "results")?;
    let file = writer_utils::create_output_file(path)?;
    csv::export_to_csv_impl(results, parameter_sets, file)
}

/// Export a heatmap as a matrix: header row of entry rates, then one row
/// per dawdle probability.
pub fn export_heatmap_to_csv(
    heatmap: &Heatmap,
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    writer_utils::ensure_not_empty(&heatmap.mean_travel_time, "heatmap rows")?;
    let file = writer_utils::create_output_file(path)?;
    csv::export_heatmap_to_csv_impl(heatmap, file)
}

/// Export a calibration outcome, iteration history included.
pub fn export_calibration_to_json(
    outcome: &CalibrationOutcome,
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = writer_utils::create_output_file(path)?;
    json::export_calibration_to_json_impl(outcome, file)
}

/// The parameter set whose mean travel time is closest to `target`.
///
/// `None` if inputs are empty or mismatched.
pub fn find_closest_parameters<'a>(
    results: &'a [SimulationResult],
    parameter_sets: &'a [ParameterSet],
    target: f64,
) -> Option<&'a ParameterSet> {
    ranking::find_closest_parameters_impl(results, parameter_sets, target)
}

/// Index of the result whose mean travel time is closest to `target`.
pub fn find_closest_result_index(results: &[SimulationResult], target: f64) -> Option<usize> {
    ranking::find_closest_index(results, target)
}

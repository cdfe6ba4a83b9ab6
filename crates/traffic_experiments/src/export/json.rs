use crate::calibration::CalibrationOutcome;
use crate::metrics::SimulationResult;

pub(crate) fn export_to_json_impl(
    results: &[SimulationResult],
    file: std::fs::File,
) -> Result<(), Box<dyn std::error::Error>> {
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}

pub(crate) fn export_calibration_to_json_impl(
    outcome: &CalibrationOutcome,
    file: std::fs::File,
) -> Result<(), Box<dyn std::error::Error>> {
    serde_json::to_writer_pretty(file, outcome)?;
    Ok(())
}

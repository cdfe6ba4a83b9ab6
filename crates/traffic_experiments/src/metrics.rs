//! Per-run metrics derived from a [`RunOutput`].

use serde::Serialize;
use traffic_core::runner::RunOutput;

/// Weight of the measured mean in [`interpolated_travel_time`].
pub const DEFAULT_INTERPOLATION_WEIGHT: f64 = 0.5;

/// Aggregated metrics from a single simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    /// Vehicles that completed the road in the measurement window.
    pub cars: usize,
    pub time_min: u64,
    pub time_max: u64,
    /// Mean travel time in seconds (steps).
    pub time_avg: f64,
    pub time_median: f64,
    pub time_p90: f64,
    pub velocity_avg_kmh: f64,
    /// Exits per step.
    pub throughput: f64,
    /// Mean of vehicles on the road plus vehicles queued.
    pub mean_occupancy: f64,
    /// `time_avg` blended with the Little's-law estimate.
    pub time_interpolated: f64,
}

impl SimulationResult {
    pub fn from_run_output(output: &RunOutput) -> Self {
        let stats = &output.stats;
        Self {
            cars: stats.cars,
            time_min: stats.time_min,
            time_max: stats.time_max,
            time_avg: stats.time_avg,
            time_median: stats.time_median,
            time_p90: stats.time_p90,
            velocity_avg_kmh: stats.velocity_avg_kmh(),
            throughput: output.throughput,
            mean_occupancy: output.mean_occupancy,
            time_interpolated: interpolated_travel_time(
                stats.time_avg,
                output.mean_occupancy,
                output.throughput,
                DEFAULT_INTERPOLATION_WEIGHT,
            ),
        }
    }
}

/// Time in system by Little's law, `L / λ`. `None` without throughput.
pub fn littles_law_travel_time(mean_occupancy: f64, throughput: f64) -> Option<f64> {
    (throughput > 0.0).then(|| mean_occupancy / throughput)
}

/// Blend of the measured mean and the Little's-law estimate.
///
/// The measured mean only sees vehicles that made it through the window, so
/// under congestion it underestimates the time spent by vehicles still
/// queued. `weight` is the share of the measured mean, clamped to `[0, 1]`.
/// Falls back to the measured mean when nothing left the road.
pub fn interpolated_travel_time(
    measured_mean: f64,
    mean_occupancy: f64,
    throughput: f64,
    weight: f64,
) -> f64 {
    let weight = weight.clamp(0.0, 1.0);
    match littles_law_travel_time(mean_occupancy, throughput) {
        Some(estimate) => weight * measured_mean + (1.0 - weight) * estimate,
        None => measured_mean,
    }
}

/// Mean of `values`, `0.0` when empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn littles_law_needs_throughput() {
        assert_eq!(littles_law_travel_time(10.0, 0.5), Some(20.0));
        assert_eq!(littles_law_travel_time(10.0, 0.0), None);
    }

    #[test]
    fn interpolation_blends_by_weight() {
        assert_eq!(interpolated_travel_time(20.0, 30.0, 1.0, 0.5), 25.0);
        assert_eq!(interpolated_travel_time(20.0, 30.0, 1.0, 1.0), 20.0);
        assert_eq!(interpolated_travel_time(20.0, 30.0, 1.0, 0.0), 30.0);
        assert_eq!(interpolated_travel_time(20.0, 30.0, 0.0, 0.5), 20.0);
    }

    #[test]
    fn interpolation_clamps_weight() {
        assert_eq!(interpolated_travel_time(20.0, 30.0, 1.0, 4.0), 20.0);
    }

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), 3.0);
    }
}

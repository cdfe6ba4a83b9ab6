//! Run harness: warmup, statistics reset, measurement.
//!
//! The engine never decides how long it runs. Callers go through
//! [`run_simulation`] for the usual warmup → reset → measure sequence or
//! drive [`warmup`] and [`run_measurement_with_hook`] directly when they
//! need to intervene between steps.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, ModelParams};
use crate::model::TrafficModel;
use crate::telemetry::{SnapshotHistory, TravelTimeStats};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no vehicle completed the road in {steps} measured steps")]
    NoCompletedVehicles { steps: u64 },
}

/// Step-count policy for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Explicit warmup length; `warmup_steps_mult × road_length` when unset.
    pub warmup_steps: Option<u64>,
    /// Explicit measurement length; `steps_mult × warmup` when unset.
    pub measure_steps: Option<u64>,
    pub warmup_steps_mult: u64,
    pub steps_mult: u64,
    /// Road snapshots kept from the measurement window. Zero disables
    /// recording.
    pub snapshot_capacity: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            warmup_steps: None,
            measure_steps: None,
            warmup_steps_mult: 5,
            steps_mult: 10,
            snapshot_capacity: 0,
        }
    }
}

impl RunConfig {
    pub fn with_steps(warmup_steps: u64, measure_steps: u64) -> Self {
        Self {
            warmup_steps: Some(warmup_steps),
            measure_steps: Some(measure_steps),
            ..Self::default()
        }
    }

    pub fn with_snapshots(mut self, capacity: usize) -> Self {
        self.snapshot_capacity = capacity;
        self
    }

    pub fn warmup_for(&self, road_length: usize) -> u64 {
        self.warmup_steps
            .unwrap_or(self.warmup_steps_mult * road_length as u64)
    }

    pub fn measure_for(&self, road_length: usize) -> u64 {
        self.measure_steps
            .unwrap_or(self.steps_mult * self.warmup_for(road_length))
    }
}

/// Aggregates observed while stepping a measurement window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurement {
    pub steps: u64,
    /// Vehicles that left the road end, recorded or not.
    pub exits: u64,
    /// Mean of vehicles on the road plus vehicles queued, sampled before
    /// each step.
    pub mean_occupancy: f64,
}

impl Measurement {
    /// Exits per step.
    pub fn throughput(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.exits as f64 / self.steps as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub params: ModelParams,
    pub warmup_steps: u64,
    pub measure_steps: u64,
    pub travel_times: Vec<u64>,
    pub stats: TravelTimeStats,
    pub throughput: f64,
    pub mean_occupancy: f64,
    pub snapshots: SnapshotHistory,
}

/// Step `steps` times, then discard the statistics and backlog the warmup
/// built up.
pub fn warmup(model: &mut TrafficModel, steps: u64) {
    for _ in 0..steps {
        model.step();
    }
    model.reset_statistics();
    model.reset_entry_queue();
    debug!(steps, vehicles = model.vehicle_count(), "warmup complete");
}

/// Step `steps` times, handing the model to `hook` before every step.
pub fn run_measurement_with_hook<F>(model: &mut TrafficModel, steps: u64, mut hook: F) -> Measurement
where
    F: FnMut(&TrafficModel),
{
    let exits_before = model.ledger().exits_total();
    let mut occupancy_sum = 0u64;
    for _ in 0..steps {
        hook(model);
        occupancy_sum += (model.vehicle_count() + model.queue_len()) as u64;
        model.step();
    }
    let measurement = Measurement {
        steps,
        exits: model.ledger().exits_total() - exits_before,
        mean_occupancy: if steps == 0 {
            0.0
        } else {
            occupancy_sum as f64 / steps as f64
        },
    };
    debug!(
        steps,
        exits = measurement.exits,
        mean_occupancy = measurement.mean_occupancy,
        "measurement complete"
    );
    measurement
}

/// Fresh engine, warmup, measurement.
pub fn run_simulation(params: &ModelParams, run_config: &RunConfig) -> Result<RunOutput, RunError> {
    let mut model = TrafficModel::new(params.clone())?;
    let warmup_steps = run_config.warmup_for(params.road_length);
    let measure_steps = run_config.measure_for(params.road_length);

    warmup(&mut model, warmup_steps);

    let mut snapshots = SnapshotHistory::with_capacity(run_config.snapshot_capacity);
    let record = run_config.snapshot_capacity > 0;
    let measurement = run_measurement_with_hook(&mut model, measure_steps, |model| {
        if record {
            snapshots.push(model.road_snapshot());
        }
    });

    let travel_times = model.travel_times();
    let stats = TravelTimeStats::from_travel_times(&travel_times, params.road_length).ok_or(
        RunError::NoCompletedVehicles {
            steps: measure_steps,
        },
    )?;

    Ok(RunOutput {
        params: params.clone(),
        warmup_steps,
        measure_steps,
        travel_times,
        stats,
        throughput: measurement.throughput(),
        mean_occupancy: measurement.mean_occupancy,
        snapshots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_counts_scale_with_road_length() {
        let config = RunConfig::default();
        assert_eq!(config.warmup_for(100), 500);
        assert_eq!(config.measure_for(100), 5000);

        let config = RunConfig::with_steps(10, 30);
        assert_eq!(config.warmup_for(100), 10);
        assert_eq!(config.measure_for(100), 30);
    }

    #[test]
    fn warmup_clears_ledger_and_queue() {
        let params = ModelParams::single_lane(50, 0.2, 2.0).with_seed(3);
        let mut model = TrafficModel::new(params).expect("model");
        warmup(&mut model, 100);
        assert!(model.travel_times().is_empty());
        assert_eq!(model.queue_len(), 0);
        assert!(model.vehicle_count() > 0);
    }

    #[test]
    fn hook_sees_every_step() {
        let params = ModelParams::single_lane(50, 0.2, 0.5).with_seed(3);
        let mut model = TrafficModel::new(params).expect("model");
        let mut seen = Vec::new();
        run_measurement_with_hook(&mut model, 5, |model| seen.push(model.current_step()));
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn free_flow_run_is_bounded_by_length_over_v_max() {
        let params = ModelParams::single_lane(100, 0.0, 0.2).with_seed(8);
        let output = run_simulation(&params, &RunConfig::with_steps(100, 400).with_snapshots(10))
            .expect("run");
        assert!(output.travel_times.iter().all(|&t| t >= 20));
        assert_eq!(output.stats.time_min, 20);
        assert!(output.stats.time_avg < 22.0);
        assert_eq!(output.snapshots.len(), 10);
        assert!(output.throughput > 0.1 && output.throughput < 0.3);
    }

    #[test]
    fn empty_road_reports_no_completed_vehicles() {
        let params = ModelParams::single_lane(100, 0.0, 0.0).with_seed(1);
        let err = run_simulation(&params, &RunConfig::with_steps(10, 10)).unwrap_err();
        assert_eq!(err, RunError::NoCompletedVehicles { steps: 10 });
    }

    #[test]
    fn invalid_params_surface_as_config_error() {
        let params = ModelParams::default().with_road_length(0);
        let err = run_simulation(&params, &RunConfig::with_steps(1, 1)).unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::EmptyRoad)));
    }
}

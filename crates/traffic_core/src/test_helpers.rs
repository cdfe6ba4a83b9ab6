//! Deterministic fixtures and invariant checks shared by unit tests,
//! integration tests and benchmarks.

use std::collections::HashSet;

use crate::config::ModelParams;
use crate::model::TrafficModel;
use crate::road::Cell;

/// Seed used by fixtures unless a test picks its own.
pub const TEST_SEED: u64 = 42;

/// One lane, no dawdling, one arrival per step.
pub fn free_flow_params() -> ModelParams {
    ModelParams::single_lane(100, 0.0, 1.0).with_seed(TEST_SEED)
}

/// Three busy lanes with lane changing on.
pub fn busy_params(seed: u64) -> ModelParams {
    ModelParams::default()
        .with_lanes(3)
        .with_traffic(0.3, 1.5)
        .with_seed(seed)
}

/// Build a model from parameters known to be valid.
///
/// # Panics
///
/// Panics if `params` fail validation.
pub fn test_model(params: ModelParams) -> TrafficModel {
    TrafficModel::new(params).expect("fixture parameters should be valid")
}

pub fn run_steps(model: &mut TrafficModel, steps: u64) {
    for _ in 0..steps {
        model.step();
    }
}

/// Check the grid and speed map agree: every vehicle sits in exactly one
/// cell, has a speed in `0..=v_max`, and every speed entry belongs to a
/// vehicle on the road.
///
/// # Panics
///
/// Panics with a description of the first violated invariant.
pub fn assert_road_invariants(model: &TrafficModel) {
    let road = model.road();
    let v_max = model.params().v_max;
    let mut seen = HashSet::new();
    for lane in 0..road.lanes() {
        for pos in 0..road.length() {
            if let Cell::Occupied(id) = road.cell(lane, pos) {
                assert!(seen.insert(id), "vehicle {id} occupies more than one cell");
                let speed = model
                    .speed_of(id)
                    .unwrap_or_else(|| panic!("vehicle {id} has no speed"));
                assert!(speed <= v_max, "vehicle {id} speed {speed} exceeds {v_max}");
                assert!(
                    model.ledger().is_open(id),
                    "vehicle {id} on the road has no open ledger entry"
                );
            }
        }
    }
    assert_eq!(seen.len(), model.vehicle_count(), "speed map holds vehicles off the road");
    assert!(seen.len() <= road.lanes() * road.length());
}

//! Model configuration: the structured record a [`crate::model::TrafficModel`]
//! is built from, plus its validation rules.
//!
//! Invalid values are rejected with a [`ConfigError`]; nothing is clamped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physical length of one cell in metres.
pub const CELL_LENGTH_M: f64 = 7.5;

/// Maximum speed (cells per step) of the classic Nagel–Schreckenberg setup.
pub const DEFAULT_V_MAX: u32 = 5;

const DEFAULT_ROAD_LENGTH: usize = 100;
const DEFAULT_LANES: usize = 2;
const DEFAULT_DAWDLE_PROBABILITY: f64 = 0.3;
const DEFAULT_ENTRY_RATE: f64 = 0.5;

/// Highest accepted entry rate. Arrival sampling costs one draw per unit of
/// rate, and anything above the lane count only grows the entry queue.
pub const MAX_ENTRY_RATE: f64 = 1_000.0;

/// Errors raised when a configuration or a runtime parameter change is invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("road length must be at least one cell")]
    EmptyRoad,
    #[error("lane count must be at least one")]
    NoLanes,
    #[error("maximum speed must be at least one cell per step")]
    ZeroMaxSpeed,
    #[error("dawdle probability {0} is outside [0, 1]")]
    DawdleProbability(f64),
    #[error("entry rate {0} is outside [0, 1000]")]
    EntryRate(f64),
    #[error("admission speed range starts at {lower}, above the maximum speed {v_max}")]
    EntrySpeedRange { lower: u32, v_max: u32 },
    #[error("lane {lane} does not exist on a road with {lanes} lanes")]
    LaneOutOfRange { lane: usize, lanes: usize },
}

/// Speed given to a vehicle when it is admitted onto cell 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntrySpeedPolicy {
    /// Enter at `v_max`: a vehicle either has room to keep that speed or
    /// brakes on its first step anyway.
    #[default]
    Max,
    /// Enter with a uniformly drawn speed in `lower..=v_max`.
    UpperRange { lower: u32 },
}

/// Parameters for building a traffic model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Number of cells per lane.
    pub road_length: usize,
    pub lanes: usize,
    /// Maximum speed in cells per step.
    pub v_max: u32,
    /// Per-step chance that a moving vehicle loses one unit of speed.
    pub dawdle_probability: f64,
    /// Expected number of vehicles arriving per step, summed over all lanes.
    pub entry_rate: f64,
    /// Enables overtaking and merging. Disabled, lanes behave as independent
    /// single-lane roads.
    pub multi_lane_rules: bool,
    pub entry_speed: EntrySpeedPolicy,
    /// Seed for the model RNG. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            road_length: DEFAULT_ROAD_LENGTH,
            lanes: DEFAULT_LANES,
            v_max: DEFAULT_V_MAX,
            dawdle_probability: DEFAULT_DAWDLE_PROBABILITY,
            entry_rate: DEFAULT_ENTRY_RATE,
            multi_lane_rules: true,
            entry_speed: EntrySpeedPolicy::default(),
            seed: None,
        }
    }
}

impl ModelParams {
    /// Single-lane road: the classic one-dimensional automaton.
    pub fn single_lane(road_length: usize, dawdle_probability: f64, entry_rate: f64) -> Self {
        Self {
            road_length,
            lanes: 1,
            dawdle_probability,
            entry_rate,
            multi_lane_rules: false,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_road_length(mut self, road_length: usize) -> Self {
        self.road_length = road_length;
        self
    }

    pub fn with_lanes(mut self, lanes: usize) -> Self {
        self.lanes = lanes;
        self
    }

    pub fn with_v_max(mut self, v_max: u32) -> Self {
        self.v_max = v_max;
        self
    }

    /// Set dawdle probability and entry rate together, the pair calibration tunes.
    pub fn with_traffic(mut self, dawdle_probability: f64, entry_rate: f64) -> Self {
        self.dawdle_probability = dawdle_probability;
        self.entry_rate = entry_rate;
        self
    }

    pub fn with_multi_lane_rules(mut self, enabled: bool) -> Self {
        self.multi_lane_rules = enabled;
        self
    }

    pub fn with_entry_speed(mut self, policy: EntrySpeedPolicy) -> Self {
        self.entry_speed = policy;
        self
    }

    /// Road length in metres.
    pub fn length_m(&self) -> f64 {
        self.road_length as f64 * CELL_LENGTH_M
    }

    /// Check every structural constraint of the record.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.road_length == 0 {
            return Err(ConfigError::EmptyRoad);
        }
        if self.lanes == 0 {
            return Err(ConfigError::NoLanes);
        }
        if self.v_max == 0 {
            return Err(ConfigError::ZeroMaxSpeed);
        }
        validate_traffic(self.dawdle_probability, self.entry_rate)?;
        if let EntrySpeedPolicy::UpperRange { lower } = self.entry_speed {
            if lower > self.v_max {
                return Err(ConfigError::EntrySpeedRange {
                    lower,
                    v_max: self.v_max,
                });
            }
        }
        Ok(())
    }
}

/// Range checks shared by construction and runtime parameter changes.
pub fn validate_traffic(dawdle_probability: f64, entry_rate: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&dawdle_probability) {
        return Err(ConfigError::DawdleProbability(dawdle_probability));
    }
    if !(0.0..=MAX_ENTRY_RATE).contains(&entry_rate) {
        return Err(ConfigError::EntryRate(entry_rate));
    }
    Ok(())
}

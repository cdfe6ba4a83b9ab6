//! Calibration of dawdle probability and entry rate against a target mean
//! travel time.
//!
//! Derivative-free adaptive line search. Travel time grows with both
//! parameters, so each iteration moves both in the same direction: down when
//! the averaged result is above the target, up otherwise. Step sizes shrink
//! after an improvement and grow after an overshoot, never below 1% of the
//! parameter range.
//!
//! Every iteration runs `repetitions` independent simulations on a rayon
//! pool and averages their mean travel time. A failing repetition fails the
//! iteration.

use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use traffic_core::config::{validate_traffic, ConfigError, ModelParams};
use traffic_core::runner::{run_simulation, RunConfig, RunError};

use crate::metrics::mean;
use crate::parameters::run_seed;
use crate::runner::build_pool;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid {parameter} bounds [{min}, {max}]")]
    InvalidBounds {
        parameter: &'static str,
        min: f64,
        max: f64,
    },
    #[error("invalid calibration setting: {0}")]
    InvalidSetting(&'static str),
    #[error("iteration {iteration} failed: {source}")]
    Run {
        iteration: usize,
        #[source]
        source: RunError,
    },
    #[error("failed to create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// A (dawdle probability, entry rate) pair, used for positions and steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterPair {
    pub dawdle_probability: f64,
    pub entry_rate: f64,
}

impl ParameterPair {
    pub fn new(dawdle_probability: f64, entry_rate: f64) -> Self {
        Self {
            dawdle_probability,
            entry_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub target_travel_time: f64,
    /// Accepted distance to the target, in steps.
    pub tolerance: f64,
    /// Road layout and fixed model settings; its traffic parameters are
    /// overwritten each iteration.
    pub base: ModelParams,
    pub dawdle_bounds: Bounds,
    pub entry_bounds: Bounds,
    pub repetitions: usize,
    pub max_iterations: usize,
    pub run_config: RunConfig,
    pub num_threads: Option<usize>,
    /// Base seed for every repetition; unseeded runs draw from entropy.
    pub seed: Option<u64>,
    /// Relative step size of entry rate versus dawdle probability. Above 1
    /// moves the entry rate more.
    pub step_ratio: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            target_travel_time: 25.0,
            tolerance: 1.0,
            base: ModelParams::default().with_lanes(3),
            dawdle_bounds: Bounds::new(0.0, 0.9),
            entry_bounds: Bounds::new(0.1, 3.0),
            repetitions: 10,
            max_iterations: 100,
            run_config: RunConfig::default(),
            num_threads: None,
            seed: None,
            step_ratio: 1.0,
        }
    }
}

impl CalibrationConfig {
    pub fn new(target_travel_time: f64) -> Self {
        Self {
            target_travel_time,
            ..Self::default()
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_base(mut self, base: ModelParams) -> Self {
        self.base = base;
        self
    }

    pub fn with_bounds(mut self, dawdle: Bounds, entry: Bounds) -> Self {
        self.dawdle_bounds = dawdle;
        self.entry_bounds = entry;
        self
    }

    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = run_config;
        self
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_step_ratio(mut self, step_ratio: f64) -> Self {
        self.step_ratio = step_ratio;
        self
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        self.base.validate()?;
        check_bounds("dawdle probability", self.dawdle_bounds)?;
        check_bounds("entry rate", self.entry_bounds)?;
        validate_traffic(self.dawdle_bounds.min, self.entry_bounds.min)?;
        validate_traffic(self.dawdle_bounds.max, self.entry_bounds.max)?;
        if !(self.target_travel_time.is_finite() && self.target_travel_time > 0.0) {
            return Err(CalibrationError::InvalidSetting("target travel time must be positive"));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(CalibrationError::InvalidSetting("tolerance must be non-negative"));
        }
        if self.repetitions == 0 {
            return Err(CalibrationError::InvalidSetting("repetitions must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(CalibrationError::InvalidSetting("max iterations must be at least 1"));
        }
        if !(self.step_ratio.is_finite() && self.step_ratio > 0.0) {
            return Err(CalibrationError::InvalidSetting("step ratio must be positive"));
        }
        Ok(())
    }

    /// One third into each range.
    pub fn default_start(&self) -> ParameterPair {
        ParameterPair::new(
            self.dawdle_bounds.min + self.dawdle_bounds.range() / 3.0,
            self.entry_bounds.min + self.entry_bounds.range() / 3.0,
        )
    }

    /// One tenth of each range, split by the step ratio.
    pub fn default_steps(&self) -> ParameterPair {
        ParameterPair::new(
            self.dawdle_bounds.range() / (10.0 * self.step_ratio),
            self.entry_bounds.range() * self.step_ratio / 10.0,
        )
    }

    fn step_floor(&self) -> ParameterPair {
        ParameterPair::new(
            self.dawdle_bounds.range() / 100.0,
            self.entry_bounds.range() / 100.0,
        )
    }
}

fn check_bounds(parameter: &'static str, bounds: Bounds) -> Result<(), CalibrationError> {
    if bounds.min.is_finite() && bounds.max.is_finite() && bounds.min <= bounds.max {
        Ok(())
    } else {
        Err(CalibrationError::InvalidBounds {
            parameter,
            min: bounds.min,
            max: bounds.max,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Distance to target within tolerance.
    Converged,
    /// Both parameters sat at a bound and had to move further out.
    BothEdged,
    /// Iteration ceiling reached without convergence.
    IterationLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationIteration {
    pub iteration: usize,
    pub parameters: ParameterPair,
    pub steps: ParameterPair,
    pub travel_time: f64,
    pub distance: f64,
}

/// Last evaluated parameters and their result. Only a certified match when
/// `termination` is [`Termination::Converged`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationOutcome {
    pub dawdle_probability: f64,
    pub entry_rate: f64,
    pub travel_time: f64,
    pub distance: f64,
    pub iterations: usize,
    pub termination: Termination,
    pub history: Vec<CalibrationIteration>,
}

impl CalibrationOutcome {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

pub struct Calibration {
    config: CalibrationConfig,
    pool: ThreadPool,
}

impl Calibration {
    pub fn new(config: CalibrationConfig) -> Result<Self, CalibrationError> {
        config.validate()?;
        let pool = build_pool(config.num_threads)?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Search from `start` (default one third into each range) with initial
    /// `steps` (default one tenth of each range).
    pub fn calibrate(
        &self,
        start: Option<ParameterPair>,
        steps: Option<ParameterPair>,
    ) -> Result<CalibrationOutcome, CalibrationError> {
        let config = &self.config;
        let mut current = start.unwrap_or_else(|| config.default_start());
        let mut step = steps.unwrap_or_else(|| config.default_steps());
        let floor = config.step_floor();
        current.dawdle_probability = config.dawdle_bounds.clamp(current.dawdle_probability);
        current.entry_rate = config.entry_bounds.clamp(current.entry_rate);

        let mut history = Vec::new();
        let mut previous_distance = f64::INFINITY;
        let mut termination = Termination::IterationLimit;

        for iteration in 1..=config.max_iterations {
            let travel_time = self.evaluate(current, iteration)?;
            let distance = (travel_time - config.target_travel_time).abs();
            let too_slow = travel_time > config.target_travel_time;
            history.push(CalibrationIteration {
                iteration,
                parameters: current,
                steps: step,
                travel_time,
                distance,
            });
            info!(
                iteration,
                dawdle_probability = current.dawdle_probability,
                entry_rate = current.entry_rate,
                travel_time,
                distance,
                "calibration iteration"
            );

            if distance <= config.tolerance {
                termination = Termination::Converged;
                break;
            }

            let sign = if too_slow { -1.0 } else { 1.0 };
            let next = ParameterPair::new(
                config
                    .dawdle_bounds
                    .clamp(current.dawdle_probability + sign * step.dawdle_probability),
                config
                    .entry_bounds
                    .clamp(current.entry_rate + sign * step.entry_rate),
            );
            let dawdle_edged = next.dawdle_probability == current.dawdle_probability;
            let entry_edged = next.entry_rate == current.entry_rate;

            let progress = iteration as f64 / config.max_iterations as f64;
            let multiplier = if distance <= previous_distance {
                0.9 - 0.5 * progress
            } else {
                1.1 - 0.1 * progress
            };
            step = ParameterPair::new(
                (step.dawdle_probability * multiplier).max(floor.dawdle_probability),
                (step.entry_rate * multiplier).max(floor.entry_rate),
            );
            previous_distance = distance;

            if dawdle_edged && entry_edged {
                warn!(
                    iteration,
                    travel_time,
                    target = config.target_travel_time,
                    "both parameters at their bounds, target out of reach"
                );
                termination = Termination::BothEdged;
                break;
            }
            current = next;
        }

        let last = history
            .last()
            .cloned()
            .ok_or(CalibrationError::InvalidSetting("max iterations must be at least 1"))?;
        if termination == Termination::IterationLimit {
            warn!(
                iterations = history.len(),
                distance = last.distance,
                "calibration stopped at the iteration limit"
            );
        }

        Ok(CalibrationOutcome {
            dawdle_probability: last.parameters.dawdle_probability,
            entry_rate: last.parameters.entry_rate,
            travel_time: last.travel_time,
            distance: last.distance,
            iterations: history.len(),
            termination,
            history,
        })
    }

    /// Mean over repetitions of the per-run mean travel time.
    pub fn evaluate(&self, parameters: ParameterPair, iteration: usize) -> Result<f64, CalibrationError> {
        let config = &self.config;
        let base = config
            .base
            .clone()
            .with_traffic(parameters.dawdle_probability, parameters.entry_rate);

        let times = self.pool.install(|| {
            (0..config.repetitions)
                .into_par_iter()
                .map(|rep| {
                    let mut params = base.clone();
                    params.seed = config.seed.map(|seed| run_seed(seed, iteration, rep));
                    run_simulation(&params, &config.run_config).map(|output| output.stats.time_avg)
                })
                .collect::<Result<Vec<f64>, RunError>>()
        });
        let times = times.map_err(|source| CalibrationError::Run { iteration, source })?;
        Ok(mean(&times))
    }
}

/// Convenience wrapper: validate, build the pool, calibrate from defaults.
pub fn calibrate(config: CalibrationConfig) -> Result<CalibrationOutcome, CalibrationError> {
    Calibration::new(config)?.calibrate(None, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_start_a_third_into_each_range() {
        let config = CalibrationConfig::default();
        let start = config.default_start();
        assert!((start.dawdle_probability - 0.3).abs() < 1e-12);
        assert!((start.entry_rate - (0.1 + 2.9 / 3.0)).abs() < 1e-12);

        let steps = config.default_steps();
        assert!((steps.dawdle_probability - 0.09).abs() < 1e-12);
        assert!((steps.entry_rate - 0.29).abs() < 1e-12);
    }

    #[test]
    fn step_ratio_shifts_step_sizes() {
        let steps = CalibrationConfig::default().with_step_ratio(2.0).default_steps();
        assert!((steps.dawdle_probability - 0.045).abs() < 1e-12);
        assert!((steps.entry_rate - 0.58).abs() < 1e-12);
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let bad_bounds = CalibrationConfig::default().with_bounds(Bounds::new(0.5, 0.1), Bounds::new(0.1, 3.0));
        assert!(matches!(
            bad_bounds.validate(),
            Err(CalibrationError::InvalidBounds { parameter: "dawdle probability", .. })
        ));

        let out_of_domain =
            CalibrationConfig::default().with_bounds(Bounds::new(0.0, 1.5), Bounds::new(0.1, 3.0));
        assert!(matches!(out_of_domain.validate(), Err(CalibrationError::Config(_))));

        assert!(matches!(
            CalibrationConfig::default().with_repetitions(0).validate(),
            Err(CalibrationError::InvalidSetting(_))
        ));
        assert!(matches!(
            CalibrationConfig::new(-3.0).validate(),
            Err(CalibrationError::InvalidSetting(_))
        ));
        assert!(CalibrationConfig::default().validate().is_ok());
    }

    #[test]
    fn unreachable_low_target_ends_both_edged() {
        // Free flow on 50 cells takes at least 10 steps.
        let config = CalibrationConfig::new(2.0)
            .with_base(ModelParams::default().with_road_length(50))
            .with_repetitions(2)
            .with_run_config(RunConfig::with_steps(100, 300))
            .with_seed(5);
        let outcome = calibrate(config).expect("calibration runs");

        assert_eq!(outcome.termination, Termination::BothEdged);
        assert!(!outcome.converged());
        assert_eq!(outcome.dawdle_probability, 0.0);
        assert!((outcome.entry_rate - 0.1).abs() < 1e-12);
        assert!(outcome.distance > 1.0);
        assert_eq!(outcome.history.len(), outcome.iterations);
    }

    #[test]
    fn iteration_limit_keeps_last_evaluation() {
        let config = CalibrationConfig::new(2.0)
            .with_base(ModelParams::default().with_road_length(50))
            .with_repetitions(1)
            .with_max_iterations(2)
            .with_run_config(RunConfig::with_steps(50, 200))
            .with_seed(5);
        let outcome = calibrate(config).expect("calibration runs");

        assert_eq!(outcome.termination, Termination::IterationLimit);
        assert_eq!(outcome.iterations, 2);
        let last = outcome.history.last().expect("history");
        assert_eq!(outcome.dawdle_probability, last.parameters.dawdle_probability);
        assert_eq!(outcome.travel_time, last.travel_time);
    }

    #[test]
    fn seeded_calibration_is_reproducible() {
        let config = CalibrationConfig::new(12.0)
            .with_base(ModelParams::default().with_road_length(50))
            .with_repetitions(2)
            .with_max_iterations(5)
            .with_run_config(RunConfig::with_steps(100, 300))
            .with_seed(11);
        let a = calibrate(config.clone()).expect("first");
        let b = calibrate(config).expect("second");
        assert_eq!(a, b);
    }
}

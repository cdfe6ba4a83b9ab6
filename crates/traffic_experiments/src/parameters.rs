//! Parameter variation framework for exploring the (dawdle probability,
//! entry rate) plane.
//!
//! A [`ParameterSpace`] is a grid over both parameters around a base model.
//! [`ParameterSpace::generate`] expands it into one [`ParameterSet`] per grid
//! cell and repetition, each with its own deterministic seed.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use traffic_core::config::ModelParams;
use traffic_core::runner::RunConfig;

/// `steps` evenly spaced values from `min` to `max`, both included.
pub fn linspace(min: f64, max: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let delta = (max - min) / (steps - 1) as f64;
            (0..steps).map(|i| min + delta * i as f64).collect()
        }
    }
}

/// One simulation run of a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterSet {
    /// Model parameters, without seed.
    pub params: ModelParams,
    pub run_config: RunConfig,
    /// Shared by every repetition of the same grid cell.
    pub experiment_id: String,
    /// Repetition index within the experiment.
    pub run_id: usize,
    pub seed: u64,
    /// Grid coordinates; `None` for sampled sets.
    pub cell: Option<(usize, usize)>,
}

impl ParameterSet {
    pub fn new(
        params: ModelParams,
        run_config: RunConfig,
        experiment_id: String,
        run_id: usize,
        seed: u64,
    ) -> Self {
        Self {
            params,
            run_config,
            experiment_id,
            run_id,
            seed,
            cell: None,
        }
    }

    /// The model params with seed applied.
    pub fn model_params(&self) -> ModelParams {
        self.params.clone().with_seed(self.seed)
    }
}

/// Grid over dawdle probability × entry rate.
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    base: ModelParams,
    run_config: RunConfig,
    dawdle_probabilities: Vec<f64>,
    entry_rates: Vec<f64>,
    repetitions: usize,
    seed: u64,
}

impl ParameterSpace {
    /// Create a parameter space with default base parameters.
    pub fn new() -> Self {
        Self {
            base: ModelParams::default(),
            run_config: RunConfig::default(),
            dawdle_probabilities: vec![],
            entry_rates: vec![],
            repetitions: 1,
            seed: 0,
        }
    }

    pub fn grid() -> Self {
        Self::new()
    }

    /// The reference heatmap: 100 cells, 3 lanes, dawdle 0–0.9 and entry
    /// 0.1–3.0 in ten steps each, two repetitions.
    pub fn heatmap_default() -> Self {
        Self::grid()
            .with_base(ModelParams::default().with_lanes(3))
            .dawdle_range(0.0, 0.9, 10)
            .entry_range(0.1, 3.0, 10)
            .repetitions(2)
    }

    pub fn with_base(mut self, base: ModelParams) -> Self {
        self.base = base;
        self
    }

    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = run_config;
        self
    }

    pub fn dawdle_probability(mut self, values: Vec<f64>) -> Self {
        self.dawdle_probabilities = values;
        self
    }

    pub fn entry_rate(mut self, values: Vec<f64>) -> Self {
        self.entry_rates = values;
        self
    }

    pub fn dawdle_range(self, min: f64, max: f64, steps: usize) -> Self {
        self.dawdle_probability(linspace(min, max, steps))
    }

    pub fn entry_range(self, min: f64, max: f64, steps: usize) -> Self {
        self.entry_rate(linspace(min, max, steps))
    }

    pub fn repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions.max(1);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Dawdle values of the grid; the base value when none were set.
    pub fn dawdle_values(&self) -> Vec<f64> {
        if self.dawdle_probabilities.is_empty() {
            vec![self.base.dawdle_probability]
        } else {
            self.dawdle_probabilities.clone()
        }
    }

    /// Entry-rate values of the grid; the base value when none were set.
    pub fn entry_values(&self) -> Vec<f64> {
        if self.entry_rates.is_empty() {
            vec![self.base.entry_rate]
        } else {
            self.entry_rates.clone()
        }
    }

    pub fn repetition_count(&self) -> usize {
        self.repetitions
    }

    pub fn base(&self) -> &ModelParams {
        &self.base
    }

    /// Total number of runs [`Self::generate`] produces.
    pub fn run_count(&self) -> usize {
        self.dawdle_values().len() * self.entry_values().len() * self.repetitions
    }

    /// Expand the grid, dawdle-major, repetitions innermost.
    pub fn generate(&self) -> Vec<ParameterSet> {
        let entry_values = self.entry_values();
        let mut sets = Vec::with_capacity(self.run_count());
        for (i, &dawdle) in self.dawdle_values().iter().enumerate() {
            for (j, &entry) in entry_values.iter().enumerate() {
                let experiment = i * entry_values.len() + j;
                let params = self.base.clone().with_traffic(dawdle, entry);
                for run_id in 0..self.repetitions {
                    let mut set = ParameterSet::new(
                        params.clone(),
                        self.run_config,
                        format!("exp_{experiment}"),
                        run_id,
                        run_seed(self.seed, experiment, run_id),
                    );
                    set.cell = Some((i, j));
                    sets.push(set);
                }
            }
        }
        sets
    }

    /// Sample `count` distinct points uniformly from the bounding box of the
    /// grid (Monte Carlo sampling), one run each.
    pub fn sample_random(&self, count: usize, seed: u64) -> Vec<ParameterSet> {
        let (dawdle_min, dawdle_max) = bounds(&self.dawdle_values());
        let (entry_min, entry_max) = bounds(&self.entry_values());

        let mut rng = StdRng::seed_from_u64(seed);
        let mut sets = Vec::with_capacity(count);
        let mut seen = HashSet::new();
        let mut attempts = 0;
        const MAX_ATTEMPTS: usize = 10_000;

        while sets.len() < count && attempts < MAX_ATTEMPTS {
            attempts += 1;
            let dawdle = sample(&mut rng, dawdle_min, dawdle_max);
            let entry = sample(&mut rng, entry_min, entry_max);
            if !seen.insert((dawdle.to_bits(), entry.to_bits())) {
                continue;
            }
            let index = sets.len();
            sets.push(ParameterSet::new(
                self.base.clone().with_traffic(dawdle, entry),
                self.run_config,
                format!("random_{index}"),
                0,
                run_seed(seed, index, 0),
            ));
        }
        sets
    }
}

impl Default for ParameterSpace {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic per-run seed.
pub(crate) fn run_seed(base: u64, experiment: usize, run_id: usize) -> u64 {
    base.wrapping_add((experiment as u64) << 20)
        .wrapping_add(run_id as u64)
        .wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

fn bounds(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn sample(rng: &mut StdRng, min: f64, max: f64) -> f64 {
    if max > min {
        rng.gen_range(min..=max)
    } else {
        min
    }
}

//! Parallel simulation execution using rayon.
//!
//! Every run builds its own engine; workers share nothing but the read-only
//! parameter sets. Results come back in input order, or the first error.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use thiserror::Error;
use tracing::debug;
use traffic_core::runner::{run_simulation, RunError};

use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("run {experiment_id}/{run_id} failed: {source}")]
    Run {
        experiment_id: String,
        run_id: usize,
        #[source]
        source: RunError,
    },
    #[error("failed to create thread pool: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

/// Thread pool with `num_threads` workers, or rayon's default.
pub fn build_pool(num_threads: Option<usize>) -> Result<ThreadPool, ThreadPoolBuildError> {
    let mut builder = ThreadPoolBuilder::new();
    if let Some(threads) = num_threads {
        builder = builder.num_threads(threads);
    }
    builder.build()
}

/// Progress bar in the style shared by sweeps and calibration, or `None`
/// when hidden.
pub fn progress_bar(total: u64, show: bool) -> Option<ProgressBar> {
    if !show || total == 0 {
        return None;
    }
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    Some(bar)
}

/// Run one parameter set: fresh engine, warmup, measurement.
pub fn run_single_simulation(param_set: &ParameterSet) -> Result<SimulationResult, ExperimentError> {
    let output = run_simulation(&param_set.model_params(), &param_set.run_config).map_err(
        |source| ExperimentError::Run {
            experiment_id: param_set.experiment_id.clone(),
            run_id: param_set.run_id,
            source,
        },
    )?;
    Ok(SimulationResult::from_run_output(&output))
}

/// Run multiple simulations in parallel with a progress bar.
///
/// Results are in the same order as `parameter_sets`.
pub fn run_parallel_experiments(
    parameter_sets: &[ParameterSet],
    num_threads: Option<usize>,
) -> Result<Vec<SimulationResult>, ExperimentError> {
    run_parallel_experiments_with_progress(parameter_sets, num_threads, true)
}

/// Run multiple simulations in parallel with optional progress bar.
///
/// A failing run aborts the whole batch; no partial result vector is
/// returned.
pub fn run_parallel_experiments_with_progress(
    parameter_sets: &[ParameterSet],
    num_threads: Option<usize>,
    show_progress: bool,
) -> Result<Vec<SimulationResult>, ExperimentError> {
    let pool = build_pool(num_threads)?;
    let pb = progress_bar(parameter_sets.len() as u64, show_progress);

    let results = pool.install(|| {
        parameter_sets
            .par_iter()
            .map(|param_set| {
                let result = run_single_simulation(param_set);
                if let Some(ref progress_bar) = pb {
                    progress_bar.inc(1);
                }
                result
            })
            .collect::<Result<Vec<_>, _>>()
    });

    if let Some(ref progress_bar) = pb {
        progress_bar.finish_with_message("Completed");
    }
    debug!(runs = parameter_sets.len(), ok = results.is_ok(), "parallel experiments finished");

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterSpace;
    use traffic_core::config::ModelParams;
    use traffic_core::runner::RunConfig;

    fn small_space() -> ParameterSpace {
        ParameterSpace::grid()
            .with_base(ModelParams::default().with_road_length(50))
            .with_run_config(RunConfig::with_steps(100, 400))
            .dawdle_probability(vec![0.1, 0.5])
            .entry_rate(vec![0.3, 0.8])
            .seed(1)
    }

    #[test]
    fn test_single_simulation() {
        let sets = small_space().generate();
        let result = run_single_simulation(&sets[0]).expect("run");
        assert!(result.cars > 0);
        assert!(result.time_min >= 10);
    }

    #[test]
    fn test_parallel_experiments() {
        let sets = small_space().generate();
        let results = run_parallel_experiments_with_progress(&sets, Some(2), false).expect("runs");
        assert_eq!(results.len(), 4);
        for result in &results {
            assert!(result.cars > 0);
        }
    }

    #[test]
    fn parallel_results_match_sequential_runs() {
        let sets = small_space().generate();
        let parallel = run_parallel_experiments_with_progress(&sets, Some(3), false).expect("runs");
        for (set, result) in sets.iter().zip(&parallel) {
            assert_eq!(&run_single_simulation(set).expect("run"), result);
        }
    }

    #[test]
    fn failing_run_aborts_batch() {
        let mut sets = small_space().generate();
        sets[2].params.entry_rate = 0.0;
        let err = run_parallel_experiments_with_progress(&sets, Some(2), false).unwrap_err();
        match err {
            ExperimentError::Run { experiment_id, run_id, source } => {
                assert_eq!(experiment_id, "exp_2");
                assert_eq!(run_id, 0);
                assert!(matches!(source, RunError::NoCompletedVehicles { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

//! Mean travel time over the dawdle × entry grid of a [`ParameterSpace`].

use serde::Serialize;
use tracing::info;

use crate::metrics::SimulationResult;
use crate::parameters::{ParameterSet, ParameterSpace};
use crate::runner::{run_parallel_experiments_with_progress, ExperimentError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    /// Row labels.
    pub dawdle_probabilities: Vec<f64>,
    /// Column labels.
    pub entry_rates: Vec<f64>,
    /// `[dawdle][entry]` mean of `time_avg` over repetitions.
    pub mean_travel_time: Vec<Vec<f64>>,
    /// `[dawdle][entry]` mean of `time_interpolated` over repetitions.
    pub interpolated_travel_time: Vec<Vec<f64>>,
}

impl Heatmap {
    /// Average `results` per grid cell. `sets` and `results` are paired by
    /// index as returned by the runner; sets without a grid cell are
    /// ignored.
    pub fn from_results(
        space: &ParameterSpace,
        sets: &[ParameterSet],
        results: &[SimulationResult],
    ) -> Self {
        let dawdle_probabilities = space.dawdle_values();
        let entry_rates = space.entry_values();
        let rows = dawdle_probabilities.len();
        let cols = entry_rates.len();

        let mut sums = vec![vec![0.0; cols]; rows];
        let mut interpolated = vec![vec![0.0; cols]; rows];
        let mut counts = vec![vec![0usize; cols]; rows];
        for (set, result) in sets.iter().zip(results) {
            let Some((i, j)) = set.cell else {
                continue;
            };
            if i < rows && j < cols {
                sums[i][j] += result.time_avg;
                interpolated[i][j] += result.time_interpolated;
                counts[i][j] += 1;
            }
        }

        let average = |totals: Vec<Vec<f64>>| -> Vec<Vec<f64>> {
            totals
                .into_iter()
                .zip(&counts)
                .map(|(row, row_counts)| {
                    row.into_iter()
                        .zip(row_counts)
                        .map(|(total, &n)| if n == 0 { f64::NAN } else { total / n as f64 })
                        .collect()
                })
                .collect()
        };

        Self {
            mean_travel_time: average(sums),
            interpolated_travel_time: average(interpolated),
            dawdle_probabilities,
            entry_rates,
        }
    }

    /// Generate the space, run it in parallel and average the results.
    pub fn generate(
        space: &ParameterSpace,
        num_threads: Option<usize>,
        show_progress: bool,
    ) -> Result<(Self, Vec<ParameterSet>, Vec<SimulationResult>), ExperimentError> {
        let sets = space.generate();
        info!(runs = sets.len(), "generating heatmap");
        let results = run_parallel_experiments_with_progress(&sets, num_threads, show_progress)?;
        let heatmap = Self::from_results(space, &sets, &results);
        Ok((heatmap, sets, results))
    }

    pub fn value(&self, dawdle_index: usize, entry_index: usize) -> Option<f64> {
        self.mean_travel_time
            .get(dawdle_index)
            .and_then(|row| row.get(entry_index))
            .copied()
    }
}

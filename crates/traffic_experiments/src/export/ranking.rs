use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

pub(crate) fn find_closest_index(results: &[SimulationResult], target: f64) -> Option<usize> {
    results
        .iter()
        .enumerate()
        .map(|(idx, result)| (idx, (result.time_avg - target).abs()))
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(idx, _)| idx)
}

pub(crate) fn find_closest_parameters_impl<'a>(
    results: &'a [SimulationResult],
    parameter_sets: &'a [ParameterSet],
    target: f64,
) -> Option<&'a ParameterSet> {
    if results.is_empty() || results.len() != parameter_sets.len() {
        return None;
    }

    let best_idx = find_closest_index(results, target)?;
    parameter_sets.get(best_idx)
}

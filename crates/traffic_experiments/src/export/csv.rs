use crate::heatmap::Heatmap;
use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

pub(crate) fn export_to_csv_impl(
    results: &[SimulationResult],
    parameter_sets: &[ParameterSet],
    file: std::fs::File,
) -> Result<(), Box<dyn std::error::Error>> {
    if results.len() != parameter_sets.len() {
        return Err(format!(
            "Results length ({}) doesn't match parameter_sets length ({})",
            results.len(),
            parameter_sets.len()
        )
        .into());
    }

    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record([
        "experiment_id",
        "run_id",
        "seed",
        "road_length",
        "lanes",
        "v_max",
        "dawdle_probability",
        "entry_rate",
        "multi_lane_rules",
        "warmup_steps",
        "measure_steps",
        "cars",
        "time_min",
        "time_max",
        "time_avg",
        "time_median",
        "time_p90",
        "velocity_avg_kmh",
        "throughput",
        "mean_occupancy",
        "time_interpolated",
    ])?;

    for (result, param_set) in results.iter().zip(parameter_sets.iter()) {
        let params = &param_set.params;
        let run_config = &param_set.run_config;
        let warmup = run_config.warmup_for(params.road_length);

        wtr.write_record([
            &param_set.experiment_id,
            &param_set.run_id.to_string(),
            &param_set.seed.to_string(),
            &params.road_length.to_string(),
            &params.lanes.to_string(),
            &params.v_max.to_string(),
            &params.dawdle_probability.to_string(),
            &params.entry_rate.to_string(),
            &params.multi_lane_rules.to_string(),
            &warmup.to_string(),
            &run_config.measure_for(params.road_length).to_string(),
            &result.cars.to_string(),
            &result.time_min.to_string(),
            &result.time_max.to_string(),
            &result.time_avg.to_string(),
            &result.time_median.to_string(),
            &result.time_p90.to_string(),
            &result.velocity_avg_kmh.to_string(),
            &result.throughput.to_string(),
            &result.mean_occupancy.to_string(),
            &result.time_interpolated.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub(crate) fn export_heatmap_to_csv_impl(
    heatmap: &Heatmap,
    file: std::fs::File,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_writer(file);

    let mut header = vec!["dawdle_probability".to_string()];
    header.extend(heatmap.entry_rates.iter().map(|e| e.to_string()));
    wtr.write_record(&header)?;

    for (dawdle, row) in heatmap
        .dawdle_probabilities
        .iter()
        .zip(&heatmap.mean_travel_time)
    {
        let mut record = vec![dawdle.to_string()];
        // Unvisited cells are left blank.
        record.extend(row.iter().map(|value| {
            if value.is_nan() {
                String::new()
            } else {
                value.to_string()
            }
        }));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

use traffic_core::config::ModelParams;
use traffic_core::runner::RunConfig;
use traffic_experiments::{calibrate, Calibration, CalibrationConfig, ParameterPair, Termination};

fn three_lane_config(target: f64, seed: u64) -> CalibrationConfig {
    CalibrationConfig::new(target)
        .with_tolerance(1.0)
        .with_repetitions(4)
        .with_run_config(RunConfig::with_steps(300, 1500))
        .with_seed(seed)
}

#[test]
fn reaches_reachable_target() {
    let outcome = calibrate(three_lane_config(25.0, 3)).expect("calibration runs");

    assert_eq!(outcome.termination, Termination::Converged);
    assert!(outcome.converged());
    assert!(outcome.distance <= 1.0, "distance {}", outcome.distance);
    assert!((outcome.travel_time - 25.0).abs() <= 1.0);
    assert!((0.0..=0.9).contains(&outcome.dawdle_probability));
    assert!((0.1..=3.0).contains(&outcome.entry_rate));
    assert_eq!(outcome.history.len(), outcome.iterations);
}

#[test]
fn higher_target_needs_denser_traffic() {
    let low = calibrate(three_lane_config(21.5, 9)).expect("low target");
    let high = calibrate(three_lane_config(25.0, 9)).expect("high target");

    assert!(low.converged() && high.converged());
    assert!(high.entry_rate >= low.entry_rate);
    assert!(high.dawdle_probability >= low.dawdle_probability);
}

#[test]
fn target_below_free_flow_ends_at_lower_bounds() {
    // 100 cells at 5 cells per step cannot be crossed in under 20 steps.
    let config = CalibrationConfig::new(5.0)
        .with_repetitions(2)
        .with_run_config(RunConfig::with_steps(200, 600))
        .with_seed(1);
    let outcome = calibrate(config).expect("calibration runs");

    assert_eq!(outcome.termination, Termination::BothEdged);
    assert_eq!(outcome.dawdle_probability, 0.0);
    assert!((outcome.entry_rate - 0.1).abs() < 1e-12);
    assert!(outcome.travel_time >= 20.0);
}

#[test]
fn parameters_never_leave_bounds() {
    let config = CalibrationConfig::new(60.0)
        .with_base(ModelParams::default().with_lanes(2).with_road_length(60))
        .with_repetitions(2)
        .with_max_iterations(15)
        .with_run_config(RunConfig::with_steps(150, 600))
        .with_seed(4);
    let calibration = Calibration::new(config).expect("valid config");
    let outcome = calibration
        .calibrate(Some(ParameterPair::new(0.85, 2.9)), Some(ParameterPair::new(0.3, 1.0)))
        .expect("calibration runs");

    for it in &outcome.history {
        assert!((0.0..=0.9).contains(&it.parameters.dawdle_probability));
        assert!((0.1..=3.0).contains(&it.parameters.entry_rate));
        assert!(it.steps.dawdle_probability >= 0.009 - 1e-12);
        assert!(it.steps.entry_rate >= 0.029 - 1e-12);
    }
}

#[test]
fn unseeded_calibration_still_runs() {
    let config = CalibrationConfig::new(25.0)
        .with_base(ModelParams::default().with_road_length(40))
        .with_repetitions(2)
        .with_max_iterations(3)
        .with_run_config(RunConfig::with_steps(100, 300));
    let outcome = calibrate(config).expect("calibration runs");
    assert!(outcome.iterations >= 1 && outcome.iterations <= 3);
}

use traffic_core::clock::Intervention;
use traffic_core::config::ModelParams;
use traffic_core::model::TrafficModel;
use traffic_core::runner::{run_measurement_with_hook, run_simulation, warmup, RunConfig};
use traffic_core::scenario::{LaneClosure, ParameterWindow, ScenarioRunner};
use traffic_core::telemetry::mean_travel_time;
use traffic_core::test_helpers::{busy_params, free_flow_params, run_steps, test_model};

#[test]
fn free_flow_single_lane() {
    let mut model = test_model(free_flow_params());
    run_steps(&mut model, 200);

    let times = model.travel_times();
    assert!(!times.is_empty());
    assert_eq!(times.iter().min(), Some(&20));
    // Entry cell frees up every other step once the road fills.
    let exits = model.ledger().exits_total();
    assert!((85..=95).contains(&exits), "exits: {exits}");
    assert!(model.queue_len() > 50);
}

#[test]
fn free_flow_does_not_depend_on_seed() {
    let mut a = test_model(free_flow_params().with_seed(1));
    let mut b = test_model(free_flow_params().with_seed(2));
    for _ in 0..200 {
        a.step();
        b.step();
        assert_eq!(a.road_snapshot(), b.road_snapshot());
    }
}

#[test]
fn identical_seeds_give_identical_snapshots() {
    let mut a = test_model(busy_params(7));
    let mut b = test_model(busy_params(7));
    for step in 0..300 {
        if step == 120 {
            a.close_lane(1, 40).expect("lane exists");
            b.close_lane(1, 40).expect("lane exists");
        }
        a.step();
        b.step();
        assert_eq!(a.road_snapshot(), b.road_snapshot());
    }
    let mut ta = a.travel_times();
    let mut tb = b.travel_times();
    ta.sort_unstable();
    tb.sort_unstable();
    assert_eq!(ta, tb);
}

#[test]
fn different_seeds_diverge() {
    let mut a = test_model(busy_params(1));
    let mut b = test_model(busy_params(2));
    run_steps(&mut a, 100);
    run_steps(&mut b, 100);
    assert_ne!(a.road_snapshot(), b.road_snapshot());
}

fn mean_with_closure(seed: u64, close: bool) -> f64 {
    let mut model = test_model(busy_params(seed));
    warmup(&mut model, 300);

    let mut violations = 0;
    for step in 0..400u64 {
        if close && step == 50 {
            model.close_lane(2, 100).expect("lane exists");
        }
        if close && (50..150).contains(&step) {
            let snapshot = model.road_snapshot();
            if snapshot.vehicles_in_lane(2) > 0 || !snapshot.is_lane_closed(2) {
                violations += 1;
            }
        }
        model.step();
    }
    assert_eq!(violations, 0);
    mean_travel_time(&model.travel_times()).expect("vehicles completed")
}

#[test]
fn lane_closure_raises_travel_time() {
    let seeds = [1, 2, 3];
    let open: f64 = seeds.iter().map(|&s| mean_with_closure(s, false)).sum();
    let closed: f64 = seeds.iter().map(|&s| mean_with_closure(s, true)).sum();
    assert!(closed > open, "closed {closed} vs open {open}");
}

#[test]
fn closed_lane_reopens() {
    let mut model = test_model(busy_params(4));
    run_steps(&mut model, 100);
    model.close_lane(0, 10).expect("lane exists");
    run_steps(&mut model, 10);
    assert!(!model.is_lane_closed(0));

    run_steps(&mut model, 50);
    assert!(model.road_snapshot().vehicles_in_lane(0) > 0);
}

#[test]
fn parameter_changes_apply_from_next_step() {
    let mut model = test_model(ModelParams::single_lane(50, 0.0, 0.0).with_seed(3));
    run_steps(&mut model, 10);
    assert_eq!(model.vehicle_count(), 0);

    model.set_parameters(0.0, 1.0).expect("valid");
    assert_eq!(model.vehicle_count(), 0);
    model.step();
    assert_eq!(model.vehicle_count(), 1);
}

#[test]
fn measurement_hook_records_snapshots() {
    let mut model = test_model(busy_params(5));
    let mut snapshots = Vec::new();
    let measurement = run_measurement_with_hook(&mut model, 30, |m| snapshots.push(m.road_snapshot()));
    assert_eq!(snapshots.len(), 30);
    assert_eq!(snapshots[0].vehicle_count(), 0);
    assert_eq!(measurement.steps, 30);
    assert!(measurement.mean_occupancy > 0.0);
}

#[test]
fn run_simulation_produces_consistent_output() {
    let params = ModelParams::default().with_lanes(3).with_traffic(0.3, 0.5).with_seed(11);
    let output = run_simulation(&params, &RunConfig::with_steps(300, 1000)).expect("run");

    assert_eq!(output.stats.cars, output.travel_times.len());
    assert!(output.stats.time_min >= 20);
    assert!(output.stats.time_avg < 40.0);
    assert!((output.throughput - 0.5).abs() < 0.1);
    assert!(output.snapshots.is_empty());
}

#[test]
fn scenario_runner_reports_interval_means() {
    let params = busy_params(9).with_traffic(0.3, 0.5);
    let mut runner = ScenarioRunner::rush_hour(
        params,
        RunConfig::with_steps(200, 0).with_snapshots(5),
        600,
        vec![ParameterWindow::new(200, 400, 0.6, 2.4)],
    )
    .expect("runner");

    let report = runner.run(600).expect("run");
    assert_eq!(report.steps, 600);
    assert_eq!(report.stats_interval, 60);
    assert!(report.interval_means.len() >= 9);
    assert_eq!(report.snapshots.len(), 5);
    assert!(report.interval_means.iter().all(|&m| m >= 20.0));
}

#[test]
fn lane_closure_runner_closes_lane() {
    let mut runner = ScenarioRunner::lane_closures(
        busy_params(3),
        RunConfig::with_steps(100, 0).with_snapshots(50),
        &[LaneClosure {
            start: 50,
            duration: 100,
            lane: 2,
        }],
    )
    .expect("runner");

    let report = runner.run(100).expect("run");
    assert_eq!(report.interventions_applied, 1);
    // Snapshots cover scenario steps 50..100, all inside the closure.
    assert!(report.snapshots.iter().all(|s| s.is_lane_closed(2)));
}

#[test]
fn invalid_intervention_surfaces_as_error() {
    let mut runner =
        ScenarioRunner::new(busy_params(1), RunConfig::with_steps(0, 0)).expect("runner");
    runner.schedule(
        5,
        Intervention::SetParameters {
            dawdle_probability: 1.5,
            entry_rate: 0.5,
        },
    );
    assert!(runner.run(10).is_err());
}

#[test]
fn model_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<TrafficModel>();
}

//! Close the outer lane for three hours of a twelve-hour day and print the
//! per-minute travel time around the closure.
//!
//! Run with: cargo run --release -p traffic_core --example lane_closure_run

use traffic_core::config::ModelParams;
use traffic_core::runner::RunConfig;
use traffic_core::scenario::{LaneClosure, ScenarioRunner, DEFAULT_SCENARIO_DURATION};

fn main() {
    const HOUR: u64 = 3_600;

    let params = ModelParams::default()
        .with_lanes(3)
        .with_traffic(0.3, 1.0)
        .with_seed(7);
    let closure = LaneClosure {
        start: 3 * HOUR,
        duration: 3 * HOUR,
        lane: 2,
    };

    let report = ScenarioRunner::lane_closures(params, RunConfig::default(), &[closure])
        .and_then(|mut runner| runner.run(DEFAULT_SCENARIO_DURATION));
    let report = match report {
        Ok(report) => report,
        Err(err) => {
            eprintln!("scenario failed: {err}");
            std::process::exit(1);
        }
    };

    println!("--- Lane closure (lane 2, 11:00-14:00) ---");
    // The first interval closes at minute one.
    for (index, mean) in report.interval_means.iter().enumerate() {
        let minute = index + 1;
        if minute % 30 == 0 {
            println!("  {:02}:{:02}  {:6.1} s", 8 + minute / 60, minute % 60, mean);
        }
    }
}

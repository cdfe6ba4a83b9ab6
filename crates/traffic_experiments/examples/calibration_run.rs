//! Example: calibrate the three-lane road to a 25 s mean travel time and
//! print the search trajectory.
//!
//! Run with: cargo run --release -p traffic_experiments --example calibration_run

use traffic_experiments::{calibrate, export_calibration_to_json, CalibrationConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CalibrationConfig::new(25.0).with_seed(7);
    println!(
        "Calibrating to {:.1} s with {} repetitions per iteration...",
        config.target_travel_time, config.repetitions
    );

    let outcome = calibrate(config)?;

    println!("\n{:>4} {:>8} {:>8} {:>8} {:>8}", "k", "p", "q", "time", "dist");
    for it in &outcome.history {
        println!(
            "{:>4} {:>8.4} {:>8.4} {:>8.2} {:>8.2}",
            it.iteration,
            it.parameters.dawdle_probability,
            it.parameters.entry_rate,
            it.travel_time,
            it.distance
        );
    }

    println!("\n=== Result ({:?}) ===", outcome.termination);
    println!("Dawdle probability: {:.4}", outcome.dawdle_probability);
    println!("Entry rate: {:.4}", outcome.entry_rate);
    println!("Travel time: {:.2} s", outcome.travel_time);

    export_calibration_to_json(&outcome, "calibration.json")?;
    println!("Exported to calibration.json");
    Ok(())
}

//! Example: travel-time heatmap over dawdle probability and entry rate.
//!
//! This example demonstrates how to:
//! 1. Build the reference parameter grid
//! 2. Run every grid cell in parallel
//! 3. Average repetitions into a heatmap
//! 4. Find the cell closest to a target travel time
//! 5. Export results to CSV
//!
//! Run with: cargo run --release -p traffic_experiments --example parameter_sweep

use traffic_experiments::{
    export_heatmap_to_csv, export_to_csv, find_closest_parameters, Heatmap, ParameterSpace,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Starting parameter sweep experiment...");

    let space = ParameterSpace::heatmap_default().seed(2024);
    println!("Running {} simulations in parallel...", space.run_count());
    let (heatmap, parameter_sets, results) = Heatmap::generate(&space, None, true)?;
    println!("Completed {} simulations", results.len());

    println!("\n=== Mean travel time [s] ===");
    print!("{:>6}", "p\\q");
    for entry in &heatmap.entry_rates {
        print!("{entry:>7.2}");
    }
    println!();
    for (dawdle, row) in heatmap.dawdle_probabilities.iter().zip(&heatmap.mean_travel_time) {
        print!("{dawdle:>6.2}");
        for value in row {
            print!("{value:>7.1}");
        }
        println!();
    }

    let target = 25.0;
    if let Some(best) = find_closest_parameters(&results, &parameter_sets, target) {
        println!("\n=== Closest to {target:.0} s ===");
        println!("Dawdle probability: {:.2}", best.params.dawdle_probability);
        println!("Entry rate: {:.2}", best.params.entry_rate);
    }

    println!("\nExporting results...");
    export_to_csv(&results, &parameter_sets, "experiment_results.csv")?;
    println!("Exported to experiment_results.csv");
    export_heatmap_to_csv(&heatmap, "heatmap.csv")?;
    println!("Exported to heatmap.csv");

    println!("\nExperiment complete!");

    Ok(())
}

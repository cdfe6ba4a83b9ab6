//! Run a 3-lane road with moderate traffic and print travel-time statistics.
//!
//! Run with: cargo run -p traffic_core --example simulation_run

use traffic_core::config::ModelParams;
use traffic_core::runner::{run_simulation, RunConfig};

fn main() {
    const ROAD_LENGTH: usize = 100;
    const LANES: usize = 3;

    let params = ModelParams::default()
        .with_road_length(ROAD_LENGTH)
        .with_lanes(LANES)
        .with_traffic(0.3, 0.9)
        .with_seed(123);

    let output = match run_simulation(&params, &RunConfig::default().with_snapshots(3)) {
        Ok(output) => output,
        Err(err) => {
            eprintln!("simulation failed: {err}");
            std::process::exit(1);
        }
    };

    let stats = &output.stats;
    println!(
        "--- Simulation run ({} cells, {} lanes, dawdle {}, entry {}, seed 123) ---",
        ROAD_LENGTH, LANES, params.dawdle_probability, params.entry_rate
    );
    println!("Warmup steps: {}", output.warmup_steps);
    println!("Measured steps: {}", output.measure_steps);
    println!("Cars completed: {}", stats.cars);
    println!(
        "Travel time: min {} s, avg {:.1} s, median {:.1} s, p90 {:.1} s, max {} s",
        stats.time_min, stats.time_avg, stats.time_median, stats.time_p90, stats.time_max
    );
    println!(
        "Average speed over {:.0} m: {:.1} km/h",
        stats.length_m,
        stats.velocity_avg_kmh()
    );
    println!(
        "Throughput: {:.3} cars/s, mean occupancy {:.1}",
        output.throughput, output.mean_occupancy
    );

    if let Some(snapshot) = output.snapshots.latest() {
        println!("\nLast road snapshot (step {}):", snapshot.step);
        for lane in 0..snapshot.lanes {
            let row: String = snapshot
                .lane(lane)
                .iter()
                .map(|cell| match cell.code() {
                    -1 => '.',
                    -2 => '#',
                    speed => char::from_digit(speed as u32, 10).unwrap_or('?'),
                })
                .collect();
            println!("  {row}");
        }
    }
}

//! Command-line front end for single runs, sweeps, calibration and
//! time-varying scenarios.
//!
//! `RUST_LOG` controls log verbosity (default `info`).

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use traffic_core::config::ModelParams;
use traffic_core::runner::{run_simulation, RunConfig};
use traffic_core::scenario::{
    default_rush_hour_windows, LaneClosure, ScenarioReport, ScenarioRunner,
    DEFAULT_SCENARIO_DURATION, DEFAULT_STATS_INTERVAL,
};
use traffic_core::telemetry_export::{write_road_snapshots_parquet, write_travel_times_parquet};
use traffic_experiments::metrics::SimulationResult;
use traffic_experiments::{
    export_calibration_to_json, export_heatmap_to_csv, export_to_csv, export_to_json,
    export_to_parquet, find_closest_parameters, Bounds, Calibration, CalibrationConfig, Heatmap,
    ParameterSpace,
};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(
    name = "traffic",
    about = "Multi-lane cellular automaton traffic simulation and calibration"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation and print travel-time statistics
    Simulate {
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        run: RunArgs,
        /// Record this many road snapshots from the end of the run
        #[arg(long, default_value_t = 0)]
        snapshots: usize,
        /// Write recorded snapshots to a Parquet file
        #[arg(long)]
        snapshots_out: Option<PathBuf>,
        /// Write completed travel times to a Parquet file
        #[arg(long)]
        travel_times_out: Option<PathBuf>,
    },
    /// Sweep dawdle probability × entry rate and build a travel-time heatmap
    Sweep {
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        run: RunArgs,
        #[arg(long, default_value_t = 0.0)]
        dawdle_min: f64,
        #[arg(long, default_value_t = 0.9)]
        dawdle_max: f64,
        #[arg(long, default_value_t = 10)]
        dawdle_steps: usize,
        #[arg(long, default_value_t = 0.1)]
        entry_min: f64,
        #[arg(long, default_value_t = 3.0)]
        entry_max: f64,
        #[arg(long, default_value_t = 10)]
        entry_steps: usize,
        /// Runs per grid cell
        #[arg(long, default_value_t = 2)]
        repetitions: usize,
        /// Worker threads (default: all cores)
        #[arg(long, env = "TRAFFIC_THREADS")]
        threads: Option<usize>,
        /// Print the grid cell closest to this mean travel time
        #[arg(long)]
        target: Option<f64>,
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        json: Option<PathBuf>,
        #[arg(long)]
        parquet: Option<PathBuf>,
        /// Write the heatmap matrix as CSV
        #[arg(long)]
        heatmap_csv: Option<PathBuf>,
        #[arg(long)]
        no_progress: bool,
    },
    /// Search dawdle probability and entry rate for a target travel time
    Calibrate(CalibrateArgs),
    /// Twelve-hour day with morning rush-hour parameter windows
    RushHour {
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        scenario: ScenarioArgs,
    },
    /// Close one lane for part of a day
    LaneClosure {
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        scenario: ScenarioArgs,
        /// Lane to close (0 is the leftmost, overtaking lane)
        #[arg(long)]
        lane: usize,
        /// Scenario step the closure starts at
        #[arg(long, default_value_t = 10_800)]
        start: u64,
        /// Closure length in steps
        #[arg(long, default_value_t = 10_800)]
        closure_duration: u64,
    },
}

#[derive(Args)]
struct ModelArgs {
    /// Model parameters as JSON; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    road_length: Option<usize>,
    #[arg(long)]
    lanes: Option<usize>,
    #[arg(long)]
    v_max: Option<u32>,
    #[arg(long)]
    dawdle: Option<f64>,
    #[arg(long)]
    entry_rate: Option<f64>,
    /// Disable overtaking and merging
    #[arg(long)]
    single_lane_rules: bool,
    #[arg(long)]
    seed: Option<u64>,
}

impl ModelArgs {
    fn resolve(&self) -> Result<ModelParams, Box<dyn Error>> {
        let mut params: ModelParams = match &self.config {
            Some(path) => load_json(path)?,
            None => ModelParams::default(),
        };
        if let Some(road_length) = self.road_length {
            params.road_length = road_length;
        }
        if let Some(lanes) = self.lanes {
            params.lanes = lanes;
        }
        if let Some(v_max) = self.v_max {
            params.v_max = v_max;
        }
        if let Some(dawdle) = self.dawdle {
            params.dawdle_probability = dawdle;
        }
        if let Some(entry_rate) = self.entry_rate {
            params.entry_rate = entry_rate;
        }
        if self.single_lane_rules {
            params.multi_lane_rules = false;
        }
        if let Some(seed) = self.seed {
            params.seed = Some(seed);
        }
        params.validate()?;
        Ok(params)
    }
}

#[derive(Args)]
struct RunArgs {
    /// Warmup steps (default: 5 × road length)
    #[arg(long)]
    warmup: Option<u64>,
    /// Measurement steps (default: 10 × warmup)
    #[arg(long)]
    measure: Option<u64>,
}

impl RunArgs {
    fn apply(&self, mut run_config: RunConfig) -> RunConfig {
        if self.warmup.is_some() {
            run_config.warmup_steps = self.warmup;
        }
        if self.measure.is_some() {
            run_config.measure_steps = self.measure;
        }
        run_config
    }
}

#[derive(Args)]
struct CalibrateArgs {
    /// Calibration settings as JSON; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Target mean travel time in steps (seconds)
    #[arg(long)]
    target: Option<f64>,
    #[arg(long)]
    tolerance: Option<f64>,
    #[arg(long)]
    lanes: Option<usize>,
    #[arg(long)]
    road_length: Option<usize>,
    #[arg(long)]
    repetitions: Option<usize>,
    #[arg(long)]
    max_iterations: Option<usize>,
    #[arg(long)]
    step_ratio: Option<f64>,
    #[arg(long)]
    dawdle_min: Option<f64>,
    #[arg(long)]
    dawdle_max: Option<f64>,
    #[arg(long)]
    entry_min: Option<f64>,
    #[arg(long)]
    entry_max: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, env = "TRAFFIC_THREADS")]
    threads: Option<usize>,
    #[command(flatten)]
    run: RunArgs,
    /// Write the outcome and iteration history as JSON
    #[arg(long)]
    output: Option<PathBuf>,
}

impl CalibrateArgs {
    fn resolve(&self) -> Result<CalibrationConfig, Box<dyn Error>> {
        let mut settings: CalibrationConfig = match &self.config {
            Some(path) => load_json(path)?,
            None => CalibrationConfig::default(),
        };
        if let Some(target) = self.target {
            settings.target_travel_time = target;
        }
        if let Some(tolerance) = self.tolerance {
            settings.tolerance = tolerance;
        }
        if let Some(lanes) = self.lanes {
            settings.base.lanes = lanes;
        }
        if let Some(road_length) = self.road_length {
            settings.base.road_length = road_length;
        }
        if let Some(repetitions) = self.repetitions {
            settings.repetitions = repetitions;
        }
        if let Some(max_iterations) = self.max_iterations {
            settings.max_iterations = max_iterations;
        }
        if let Some(step_ratio) = self.step_ratio {
            settings.step_ratio = step_ratio;
        }
        settings.dawdle_bounds = Bounds::new(
            self.dawdle_min.unwrap_or(settings.dawdle_bounds.min),
            self.dawdle_max.unwrap_or(settings.dawdle_bounds.max),
        );
        settings.entry_bounds = Bounds::new(
            self.entry_min.unwrap_or(settings.entry_bounds.min),
            self.entry_max.unwrap_or(settings.entry_bounds.max),
        );
        if self.seed.is_some() {
            settings.seed = self.seed;
        }
        if self.threads.is_some() {
            settings.num_threads = self.threads;
        }
        settings.run_config = self.run.apply(settings.run_config);
        Ok(settings)
    }
}

#[derive(Args)]
struct ScenarioArgs {
    /// Scenario length in steps after warmup
    #[arg(long, default_value_t = DEFAULT_SCENARIO_DURATION)]
    duration: u64,
    #[arg(long, default_value_t = DEFAULT_STATS_INTERVAL)]
    stats_interval: u64,
    #[command(flatten)]
    run: RunArgs,
    /// Print every n-th interval mean
    #[arg(long, default_value_t = 30)]
    print_every: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Simulate {
            model,
            run,
            snapshots,
            snapshots_out,
            travel_times_out,
        } => simulate(&model, &run, snapshots, snapshots_out, travel_times_out),
        Commands::Sweep {
            model,
            run,
            dawdle_min,
            dawdle_max,
            dawdle_steps,
            entry_min,
            entry_max,
            entry_steps,
            repetitions,
            threads,
            target,
            csv,
            json,
            parquet,
            heatmap_csv,
            no_progress,
        } => model.resolve().and_then(|base| {
            let space = ParameterSpace::grid()
                .with_run_config(run.apply(RunConfig::default()))
                .dawdle_range(dawdle_min, dawdle_max, dawdle_steps)
                .entry_range(entry_min, entry_max, entry_steps)
                .repetitions(repetitions)
                .seed(base.seed.unwrap_or(0))
                .with_base(base);
            sweep(
                &space,
                threads,
                !no_progress,
                target,
                SweepOutputs {
                    csv,
                    json,
                    parquet,
                    heatmap_csv,
                },
            )
        }),
        Commands::Calibrate(args) => args
            .resolve()
            .and_then(|settings| calibrate(settings, args.output.as_deref())),
        Commands::RushHour { model, scenario } => model.resolve().and_then(|params| {
            let run_config = scenario.run.apply(RunConfig::default());
            let runner = ScenarioRunner::rush_hour(
                params,
                run_config,
                scenario.duration,
                default_rush_hour_windows(),
            )?;
            run_scenario(runner, &scenario, "Rush hour")
        }),
        Commands::LaneClosure {
            model,
            scenario,
            lane,
            start,
            closure_duration,
        } => model.resolve().and_then(|params| {
            let run_config = scenario.run.apply(RunConfig::default());
            let closure = LaneClosure {
                start,
                duration: closure_duration,
                lane,
            };
            let runner = ScenarioRunner::lane_closures(params, run_config, &[closure])?;
            run_scenario(runner, &scenario, "Lane closure")
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("cannot read {}: {err}", path.display()))?;
    Ok(serde_json::from_str(&contents)?)
}

fn simulate(
    model: &ModelArgs,
    run: &RunArgs,
    snapshots: usize,
    snapshots_out: Option<PathBuf>,
    travel_times_out: Option<PathBuf>,
) -> CliResult {
    let params = model.resolve()?;
    let run_config = run.apply(RunConfig::default()).with_snapshots(snapshots);
    let output = run_simulation(&params, &run_config)?;
    let result = SimulationResult::from_run_output(&output);

    println!("--- Simulation ---");
    println!(
        "Road: {} cells × {} lanes ({:.0} m), dawdle {:.2}, entry rate {:.2}",
        params.road_length,
        params.lanes,
        params.length_m(),
        params.dawdle_probability,
        params.entry_rate
    );
    println!(
        "Steps: {} warmup, {} measured",
        output.warmup_steps, output.measure_steps
    );
    print_result(&result);

    if let Some(path) = snapshots_out {
        write_road_snapshots_parquet(&path, &output.snapshots)?;
        println!("Snapshots written to {}", path.display());
    }
    if let Some(path) = travel_times_out {
        write_travel_times_parquet(&path, &output.travel_times)?;
        println!("Travel times written to {}", path.display());
    }
    Ok(())
}

fn print_result(result: &SimulationResult) {
    println!("Cars: {}", result.cars);
    println!(
        "Travel time: avg {:.2} s, median {:.1} s, p90 {:.1} s, min {} s, max {} s",
        result.time_avg, result.time_median, result.time_p90, result.time_min, result.time_max
    );
    println!("Interpolated travel time: {:.2} s", result.time_interpolated);
    println!("Average velocity: {:.1} km/h", result.velocity_avg_kmh);
    println!(
        "Throughput: {:.3} vehicles/step, occupancy {:.1}",
        result.throughput, result.mean_occupancy
    );
}

struct SweepOutputs {
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
    parquet: Option<PathBuf>,
    heatmap_csv: Option<PathBuf>,
}

fn sweep(
    space: &ParameterSpace,
    threads: Option<usize>,
    show_progress: bool,
    target: Option<f64>,
    outputs: SweepOutputs,
) -> CliResult {
    info!(runs = space.run_count(), "starting sweep");
    let (heatmap, sets, results) = Heatmap::generate(space, threads, show_progress)?;

    println!("--- Mean travel time (rows: dawdle, columns: entry rate) ---");
    print!("{:>8}", "");
    for entry in &heatmap.entry_rates {
        print!("{entry:>8.2}");
    }
    println!();
    for (dawdle, row) in heatmap.dawdle_probabilities.iter().zip(&heatmap.mean_travel_time) {
        print!("{dawdle:>8.2}");
        for value in row {
            print!("{value:>8.1}");
        }
        println!();
    }

    if let Some(target) = target {
        if let Some(best) = find_closest_parameters(&results, &sets, target) {
            println!(
                "Closest to {target:.1} s: dawdle {:.3}, entry rate {:.3} ({})",
                best.params.dawdle_probability, best.params.entry_rate, best.experiment_id
            );
        }
    }

    if let Some(path) = outputs.csv {
        export_to_csv(&results, &sets, &path)?;
        println!("Exported to {}", path.display());
    }
    if let Some(path) = outputs.json {
        export_to_json(&results, &path)?;
        println!("Exported to {}", path.display());
    }
    if let Some(path) = outputs.parquet {
        export_to_parquet(&results, &path)?;
        println!("Exported to {}", path.display());
    }
    if let Some(path) = outputs.heatmap_csv {
        export_heatmap_to_csv(&heatmap, &path)?;
        println!("Exported to {}", path.display());
    }
    Ok(())
}

fn calibrate(settings: CalibrationConfig, output: Option<&Path>) -> CliResult {
    let target = settings.target_travel_time;
    let calibration = Calibration::new(settings)?;
    let outcome = calibration.calibrate(None, None)?;

    println!("--- Calibration (target {target:.2} s) ---");
    println!("Termination: {:?} after {} iterations", outcome.termination, outcome.iterations);
    println!("Dawdle probability: {:.4}", outcome.dawdle_probability);
    println!("Entry rate: {:.4}", outcome.entry_rate);
    println!(
        "Travel time: {:.2} s (distance {:.2} s)",
        outcome.travel_time, outcome.distance
    );

    if let Some(path) = output {
        export_calibration_to_json(&outcome, path)?;
        println!("Exported to {}", path.display());
    }
    Ok(())
}

fn run_scenario(runner: ScenarioRunner, args: &ScenarioArgs, title: &str) -> CliResult {
    let mut runner = runner.with_stats_interval(args.stats_interval);
    let report = runner.run(args.duration)?;
    print_report(&report, title, args.print_every.max(1));
    Ok(())
}

fn print_report(report: &ScenarioReport, title: &str, print_every: usize) {
    println!("--- {title} ---");
    println!(
        "{} steps, {} interventions, {} intervals",
        report.steps,
        report.interventions_applied,
        report.interval_means.len()
    );
    for (index, mean) in report.interval_means.iter().enumerate() {
        let interval = index + 1;
        if interval % print_every == 0 {
            let step = interval as u64 * report.stats_interval;
            println!("  step {step:>6}  {mean:6.1} s");
        }
    }
}

//! Parallel experimentation framework for the traffic automaton: parameter
//! sweeps over the (dawdle probability, entry rate) plane, travel-time
//! heatmaps, and calibration against a target travel time.
//!
//! # Quick Start
//!
//! ```no_run
//! use traffic_experiments::{calibrate, CalibrationConfig, Heatmap, ParameterSpace};
//!
//! // Travel-time heatmap over a 10 × 10 grid, two repetitions per cell
//! let space = ParameterSpace::heatmap_default().seed(7);
//! let (heatmap, _sets, _results) = Heatmap::generate(&space, None, true).unwrap();
//! println!("{:?}", heatmap.value(0, 0));
//!
//! // Find parameters giving a 25 s mean travel time
//! let outcome = calibrate(CalibrationConfig::new(25.0).with_seed(1)).unwrap();
//! println!("{} {}", outcome.dawdle_probability, outcome.entry_rate);
//! ```
//!
//! # Architecture
//!
//! - [`parameters`]: Parameter grid and random sampling
//! - [`runner`]: Parallel simulation execution using rayon
//! - [`metrics`]: Per-run metrics, including the interpolated travel time
//! - [`heatmap`]: Repetition averages over the grid
//! - [`calibration`]: Adaptive search for a target travel time
//! - [`export`]: Result export to CSV/JSON/Parquet

pub mod calibration;
pub mod export;
pub mod heatmap;
pub mod metrics;
pub mod parameters;
pub mod runner;

pub use calibration::{
    calibrate, Bounds, Calibration, CalibrationConfig, CalibrationError, CalibrationOutcome,
    ParameterPair, Termination,
};
pub use export::{
    export_calibration_to_json, export_heatmap_to_csv, export_to_csv, export_to_json,
    export_to_parquet, find_closest_parameters, find_closest_result_index,
};
pub use heatmap::Heatmap;
pub use metrics::SimulationResult;
pub use parameters::{ParameterSet, ParameterSpace};
pub use runner::{run_parallel_experiments, ExperimentError};

//! Multi-lane Nagel–Schreckenberg traffic model.
//!
//! - [`model::TrafficModel`]: the cellular automaton, one synchronous
//!   update per [`model::TrafficModel::step`].
//! - [`runner`]: warmup and measurement harness.
//! - [`scenario`]: rush-hour parameter schedules and lane closures.
//! - [`telemetry`] / [`telemetry_export`]: summaries, snapshots, Parquet.

pub mod clock;
pub mod config;
pub mod entry;
pub mod ledger;
pub mod model;
pub mod road;
pub mod rules;
pub mod runner;
pub mod scenario;
pub mod telemetry;
pub mod telemetry_export;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

//! Time-varying scenarios: parameter schedules (rush hour) and lane
//! closures applied to a running model.
//!
//! Scenario steps count from the end of the warmup. An intervention
//! scheduled for step `s` is applied right before step `s` runs, so it
//! affects that step and every later one, never an earlier one.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::clock::{Intervention, ScenarioClock};
use crate::config::{validate_traffic, ConfigError, ModelParams};
use crate::model::TrafficModel;
use crate::runner::{warmup, RunConfig};
use crate::telemetry::{mean_travel_time, SnapshotHistory};

/// Steps per reported travel-time mean (one simulated minute).
pub const DEFAULT_STATS_INTERVAL: u64 = 60;

/// Twelve simulated hours.
pub const DEFAULT_SCENARIO_DURATION: u64 = 43_200;

const HOUR: u64 = 3_600;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("parameter window [{start}, {end}) is empty")]
    EmptyWindow { start: u64, end: u64 },
    #[error("parameter windows overlap at step {step}")]
    OverlappingWindows { step: u64 },
}

/// Traffic conditions for scenario steps `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterWindow {
    pub start: u64,
    pub end: u64,
    pub dawdle_probability: f64,
    pub entry_rate: f64,
}

impl ParameterWindow {
    pub fn new(start: u64, end: u64, dawdle_probability: f64, entry_rate: f64) -> Self {
        Self {
            start,
            end,
            dawdle_probability,
            entry_rate,
        }
    }
}

/// Lane `lane` closed for `duration` steps from scenario step `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneClosure {
    pub start: u64,
    pub duration: u64,
    pub lane: usize,
}

/// Contiguous parameter windows covering `[0, duration)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSchedule {
    windows: Vec<ParameterWindow>,
}

impl ParameterSchedule {
    /// Sort `windows` and fill the gaps before, between and after them with
    /// the baseline parameters.
    pub fn fill(
        duration: u64,
        baseline_dawdle: f64,
        baseline_entry: f64,
        mut windows: Vec<ParameterWindow>,
    ) -> Result<Self, ScenarioError> {
        validate_traffic(baseline_dawdle, baseline_entry)?;
        for window in &windows {
            if window.start >= window.end {
                return Err(ScenarioError::EmptyWindow {
                    start: window.start,
                    end: window.end,
                });
            }
            validate_traffic(window.dawdle_probability, window.entry_rate)?;
        }
        windows.sort_by_key(|w| w.start);

        let mut filled = Vec::with_capacity(windows.len() * 2 + 1);
        let mut cursor = 0;
        for window in windows {
            if window.start < cursor {
                return Err(ScenarioError::OverlappingWindows { step: window.start });
            }
            if window.start > cursor {
                filled.push(ParameterWindow::new(
                    cursor,
                    window.start,
                    baseline_dawdle,
                    baseline_entry,
                ));
            }
            cursor = window.end;
            filled.push(window);
        }
        if cursor < duration {
            filled.push(ParameterWindow::new(
                cursor,
                duration,
                baseline_dawdle,
                baseline_entry,
            ));
        }
        Ok(Self { windows: filled })
    }

    pub fn windows(&self) -> &[ParameterWindow] {
        &self.windows
    }

    /// Parameters in force at scenario step `step`.
    pub fn at(&self, step: u64) -> Option<(f64, f64)> {
        self.windows
            .iter()
            .find(|w| w.start <= step && step < w.end)
            .map(|w| (w.dawdle_probability, w.entry_rate))
    }
}

/// The reference rush hour: a 12-hour day from 08:00 with traffic building
/// from 09:00, peaking 11:30–12:30 and easing off by 14:00.
pub fn default_rush_hour_windows() -> Vec<ParameterWindow> {
    // (from, to) in half hours after 08:00.
    let shape: [(u64, u64, f64, f64); 9] = [
        (2, 4, 0.2, 0.4),
        (4, 5, 0.3, 0.9),
        (5, 6, 0.4, 1.5),
        (6, 7, 0.5, 2.0),
        (7, 8, 0.6, 2.4),
        (8, 9, 0.6, 2.1),
        (9, 10, 0.5, 1.7),
        (10, 11, 0.4, 1.2),
        (11, 12, 0.3, 0.6),
    ];
    shape
        .iter()
        .map(|&(from, to, dawdle, entry)| {
            ParameterWindow::new(from * HOUR / 2, to * HOUR / 2, dawdle, entry)
        })
        .collect()
}

/// Travel-time means per interval plus optional road snapshots.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub steps: u64,
    pub stats_interval: u64,
    pub interval_means: Vec<f64>,
    pub interventions_applied: usize,
    pub snapshots: SnapshotHistory,
}

#[derive(Debug)]
pub struct ScenarioRunner {
    model: TrafficModel,
    clock: ScenarioClock,
    run_config: RunConfig,
    stats_interval: u64,
}

impl ScenarioRunner {
    pub fn new(params: ModelParams, run_config: RunConfig) -> Result<Self, ScenarioError> {
        Ok(Self {
            model: TrafficModel::new(params)?,
            clock: ScenarioClock::default(),
            run_config,
            stats_interval: DEFAULT_STATS_INTERVAL,
        })
    }

    /// Runner that switches parameters at every window boundary of the
    /// filled schedule.
    pub fn rush_hour(
        params: ModelParams,
        run_config: RunConfig,
        duration: u64,
        windows: Vec<ParameterWindow>,
    ) -> Result<Self, ScenarioError> {
        let schedule = ParameterSchedule::fill(
            duration,
            params.dawdle_probability,
            params.entry_rate,
            windows,
        )?;
        let mut runner = Self::new(params, run_config)?;
        for window in schedule.windows() {
            runner.schedule(
                window.start,
                Intervention::SetParameters {
                    dawdle_probability: window.dawdle_probability,
                    entry_rate: window.entry_rate,
                },
            );
        }
        Ok(runner)
    }

    pub fn lane_closures(
        params: ModelParams,
        run_config: RunConfig,
        closures: &[LaneClosure],
    ) -> Result<Self, ScenarioError> {
        let mut runner = Self::new(params, run_config)?;
        for closure in closures {
            if closure.lane >= runner.model.params().lanes {
                return Err(ConfigError::LaneOutOfRange {
                    lane: closure.lane,
                    lanes: runner.model.params().lanes,
                }
                .into());
            }
            runner.schedule(
                closure.start,
                Intervention::CloseLane {
                    lane: closure.lane,
                    duration: closure.duration,
                },
            );
        }
        Ok(runner)
    }

    pub fn with_stats_interval(mut self, steps: u64) -> Self {
        self.stats_interval = steps.max(1);
        self
    }

    pub fn schedule(&mut self, step: u64, intervention: Intervention) {
        self.clock.schedule(step, intervention);
    }

    pub fn model(&self) -> &TrafficModel {
        &self.model
    }

    /// Warm up, then run `duration` scenario steps.
    pub fn run(&mut self, duration: u64) -> Result<ScenarioReport, ScenarioError> {
        let road_length = self.model.params().road_length;
        warmup(&mut self.model, self.run_config.warmup_for(road_length));

        let mut snapshots = SnapshotHistory::with_capacity(self.run_config.snapshot_capacity);
        let mut interval_means = Vec::new();
        let mut interventions_applied = 0;

        for step in 0..duration {
            for event in self.clock.pop_due(step) {
                self.apply(event.intervention)?;
                interventions_applied += 1;
                debug!(step, intervention = ?event.intervention, "intervention applied");
            }
            if step % self.stats_interval == 0 {
                self.flush_interval(&mut interval_means);
            }
            if snapshots.capacity() > 0 {
                snapshots.push(self.model.road_snapshot());
            }
            self.model.step();
        }
        self.flush_interval(&mut interval_means);

        Ok(ScenarioReport {
            steps: duration,
            stats_interval: self.stats_interval,
            interval_means,
            interventions_applied,
            snapshots,
        })
    }

    fn apply(&mut self, intervention: Intervention) -> Result<(), ConfigError> {
        match intervention {
            Intervention::SetParameters {
                dawdle_probability,
                entry_rate,
            } => self.model.set_parameters(dawdle_probability, entry_rate),
            Intervention::CloseLane { lane, duration } => self.model.close_lane(lane, duration),
        }
    }

    fn flush_interval(&mut self, interval_means: &mut Vec<f64>) {
        if let Some(mean) = mean_travel_time(&self.model.travel_times()) {
            interval_means.push(mean);
        }
        self.model.reset_statistics();
    }
}

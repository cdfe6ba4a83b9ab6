//! Telemetry: travel-time summaries and a rolling buffer of road snapshots.

use std::collections::VecDeque;

use serde::Serialize;

use crate::config::CELL_LENGTH_M;
use crate::road::RoadSnapshot;

/// Summary of the travel times recorded in one measurement window.
/// Times are in steps, speeds use [`CELL_LENGTH_M`] per cell and one
/// second per step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TravelTimeStats {
    pub cars: usize,
    pub time_min: u64,
    pub time_max: u64,
    pub time_avg: f64,
    pub time_median: f64,
    pub time_p90: f64,
    pub length_m: f64,
    pub velocity_avg_mps: f64,
}

impl TravelTimeStats {
    /// `None` when no vehicle completed the road.
    pub fn from_travel_times(times: &[u64], road_length: usize) -> Option<Self> {
        if times.is_empty() {
            return None;
        }
        let mut sorted = times.to_vec();
        sorted.sort_unstable();

        let n = sorted.len();
        let time_avg = sorted.iter().sum::<u64>() as f64 / n as f64;
        let time_median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0
        } else {
            sorted[n / 2] as f64
        };
        let p90_idx = ((n - 1) as f64 * 0.9) as usize;
        let time_p90 = sorted[p90_idx.min(n - 1)] as f64;

        let length_m = road_length as f64 * CELL_LENGTH_M;
        Some(Self {
            cars: n,
            time_min: sorted[0],
            time_max: sorted[n - 1],
            time_avg,
            time_median,
            time_p90,
            length_m,
            velocity_avg_mps: length_m / time_avg,
        })
    }

    pub fn velocity_avg_kmh(&self) -> f64 {
        self.velocity_avg_mps * 3.6
    }
}

/// Arithmetic mean of a travel-time collection, `None` when empty.
pub fn mean_travel_time(times: &[u64]) -> Option<f64> {
    if times.is_empty() {
        None
    } else {
        Some(times.iter().sum::<u64>() as f64 / times.len() as f64)
    }
}

/// Rolling snapshot buffer. Oldest snapshots are dropped once `capacity`
/// is reached; a capacity of zero records nothing.
#[derive(Debug, Clone, Default)]
pub struct SnapshotHistory {
    snapshots: VecDeque<RoadSnapshot>,
    capacity: usize,
}

impl SnapshotHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: RoadSnapshot) {
        if self.capacity == 0 {
            return;
        }
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoadSnapshot> {
        self.snapshots.iter()
    }

    pub fn latest(&self) -> Option<&RoadSnapshot> {
        self.snapshots.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::road::SnapshotCell;

    #[test]
    fn stats_cover_min_max_and_percentiles() {
        let stats = TravelTimeStats::from_travel_times(&[30, 20, 25, 40, 21], 100).expect("stats");
        assert_eq!(stats.cars, 5);
        assert_eq!(stats.time_min, 20);
        assert_eq!(stats.time_max, 40);
        assert!((stats.time_avg - 27.2).abs() < 1e-9);
        assert_eq!(stats.time_median, 25.0);
        assert_eq!(stats.time_p90, 30.0);
        assert_eq!(stats.length_m, 750.0);
        assert!((stats.velocity_avg_mps - 750.0 / 27.2).abs() < 1e-9);
    }

    #[test]
    fn free_flow_speed_is_v_max_cells_per_second() {
        let stats = TravelTimeStats::from_travel_times(&[20, 20], 100).expect("stats");
        assert_eq!(stats.velocity_avg_mps, 37.5);
        assert!((stats.velocity_avg_kmh() - 135.0).abs() < 1e-9);
        assert_eq!(stats.time_median, 20.0);
    }

    #[test]
    fn empty_ledger_has_no_stats() {
        assert!(TravelTimeStats::from_travel_times(&[], 100).is_none());
        assert!(mean_travel_time(&[]).is_none());
    }

    #[test]
    fn history_drops_oldest_snapshots() {
        let mut history = SnapshotHistory::with_capacity(2);
        for step in 0..3 {
            history.push(RoadSnapshot {
                step,
                lanes: 1,
                length: 1,
                cells: vec![SnapshotCell::Empty],
            });
        }
        assert_eq!(history.len(), 2);
        let steps: Vec<u64> = history.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![1, 2]);
        assert_eq!(history.latest().map(|s| s.step), Some(2));
    }

    #[test]
    fn zero_capacity_records_nothing() {
        let mut history = SnapshotHistory::with_capacity(0);
        history.push(RoadSnapshot {
            step: 0,
            lanes: 1,
            length: 1,
            cells: vec![SnapshotCell::Empty],
        });
        assert!(history.is_empty());
    }
}

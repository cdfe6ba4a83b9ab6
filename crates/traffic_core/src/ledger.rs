//! Travel-time ledger: entry step per vehicle while it is in the system,
//! converted to a duration once it leaves the road.

use std::collections::HashMap;

use crate::road::VehicleId;

#[derive(Debug, Clone, Default)]
pub struct TravelTimeLedger {
    open: HashMap<VehicleId, u64>,
    completed: HashMap<VehicleId, u64>,
    exits_total: u64,
}

impl TravelTimeLedger {
    /// Record the step at which `id` arrived (joined the entry queue).
    pub fn record_entry(&mut self, id: VehicleId, step: u64) {
        self.open.insert(id, step);
    }

    /// Finalize `id` on exit. Returns the travel time, or `None` when the
    /// vehicle has no open entry (already finalized, or its entry was
    /// discarded by a reset).
    pub fn finalize(&mut self, id: VehicleId, exit_step: u64) -> Option<u64> {
        self.exits_total += 1;
        let entered = self.open.remove(&id)?;
        let duration = exit_step.saturating_sub(entered);
        self.completed.insert(id, duration);
        Some(duration)
    }

    /// Drop a vehicle that left without completing the road (lane closure,
    /// queue reset).
    pub fn discard(&mut self, id: VehicleId) {
        self.open.remove(&id);
    }

    pub fn travel_times(&self) -> Vec<u64> {
        self.completed.values().copied().collect()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn is_open(&self, id: VehicleId) -> bool {
        self.open.contains_key(&id)
    }

    /// Vehicles that left the end of the road since construction, counted
    /// whether or not their travel time was recorded.
    pub fn exits_total(&self) -> u64 {
        self.exits_total
    }

    /// Forget completed travel times. Vehicles still on the road keep their
    /// entry step.
    pub fn clear_completed(&mut self) {
        self.completed.clear();
    }
}

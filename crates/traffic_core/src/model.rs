//! Multi-lane Nagel–Schreckenberg automaton.
//!
//! [`TrafficModel::step`] is a synchronous update: every vehicle reads the
//! previous road and writes into a freshly built next road. Vehicle speeds
//! are kept in an id → speed map separate from the grid, so discarding a
//! vehicle never needs a companion grid write.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::{validate_traffic, ConfigError, ModelParams};
use crate::entry::{admission_order, admission_speed, sample_arrivals, EntryQueue};
use crate::ledger::TravelTimeLedger;
use crate::road::{Cell, Road, RoadSnapshot, SnapshotCell, VehicleId};
use crate::rules::plan_manoeuvre;

#[derive(Debug, Clone)]
pub struct TrafficModel {
    params: ModelParams,
    road: Road,
    speeds: HashMap<VehicleId, u32>,
    entry_queue: EntryQueue,
    ledger: TravelTimeLedger,
    /// Lane → first step at which the lane is open again.
    closures: BTreeMap<usize, u64>,
    current_step: u64,
    next_vehicle_id: VehicleId,
    rng: StdRng,
}

impl TrafficModel {
    /// Build an empty road. Fails fast on an invalid configuration.
    pub fn new(params: ModelParams) -> Result<Self, ConfigError> {
        params.validate()?;
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            road: Road::new(params.lanes, params.road_length),
            speeds: HashMap::new(),
            entry_queue: EntryQueue::default(),
            ledger: TravelTimeLedger::default(),
            closures: BTreeMap::new(),
            current_step: 0,
            next_vehicle_id: 0,
            rng,
            params,
        })
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    pub fn road(&self) -> &Road {
        &self.road
    }

    pub fn speed_of(&self, id: VehicleId) -> Option<u32> {
        self.speeds.get(&id).copied()
    }

    pub fn vehicle_count(&self) -> usize {
        self.speeds.len()
    }

    pub fn queue_len(&self) -> usize {
        self.entry_queue.len()
    }

    pub fn ledger(&self) -> &TravelTimeLedger {
        &self.ledger
    }

    /// Whether `lane` is forced closed at the current step.
    pub fn is_lane_closed(&self, lane: usize) -> bool {
        self.closures
            .get(&lane)
            .is_some_and(|&end| self.current_step < end)
    }

    /// Advance simulated time by one step.
    pub fn step(&mut self) {
        let mut next = Road::new(self.params.lanes, self.params.road_length);
        let mut next_speeds = HashMap::with_capacity(self.speeds.len() + self.params.lanes);

        let now = self.current_step;
        self.closures.retain(|_, end| now < *end);
        for &lane in self.closures.keys() {
            next.close_lane(lane);
        }

        let vehicles: Vec<_> = self.road.vehicles().collect();
        for (lane, pos, id) in vehicles {
            let speed = self.speeds.get(&id).copied().unwrap_or(0);
            let plan = plan_manoeuvre(
                &self.road,
                lane,
                pos,
                speed,
                self.params.v_max,
                self.params.multi_lane_rules,
            );

            let dawdles =
                plan.speed > 0 && self.rng.gen::<f64>() < self.params.dawdle_probability;
            let slowdown = u32::from(dawdles);

            // Two lane changers can aim for the same cell from opposite
            // sides. The later one stays on its lane, which is always free:
            // nothing else can land on a cell reachable from the own lane.
            let candidates = [
                (plan.lane, plan.speed.saturating_sub(slowdown)),
                (lane, plan.own_lane_speed.saturating_sub(slowdown)),
                (lane, 0),
            ];
            let mut placed = false;
            for (target_lane, final_speed) in candidates {
                let new_pos = pos + final_speed as usize;
                if new_pos >= self.params.road_length {
                    self.ledger.finalize(id, now);
                    placed = true;
                    break;
                }
                if next.cell(target_lane, new_pos).is_empty() {
                    next.set(target_lane, new_pos, Cell::Occupied(id));
                    next_speeds.insert(id, final_speed);
                    placed = true;
                    break;
                }
            }
            debug_assert!(placed, "vehicle {id} found no cell at lane {lane} pos {pos}");
        }

        for _ in 0..sample_arrivals(self.params.entry_rate, &mut self.rng) {
            let id = self.next_vehicle_id;
            self.next_vehicle_id += 1;
            self.entry_queue.push(id);
            self.ledger.record_entry(id, now);
        }

        for lane in admission_order(self.params.lanes, &mut self.rng) {
            if self.entry_queue.is_empty() {
                break;
            }
            if !next.cell(lane, 0).is_empty() {
                continue;
            }
            if let Some(id) = self.entry_queue.pop() {
                let speed = admission_speed(self.params.entry_speed, self.params.v_max, &mut self.rng);
                next.set(lane, 0, Cell::Occupied(id));
                next_speeds.insert(id, speed);
            }
        }

        self.road = next;
        self.speeds = next_speeds;
        self.current_step += 1;
    }

    /// Copy of the road with each vehicle replaced by its current speed.
    pub fn road_snapshot(&self) -> RoadSnapshot {
        let mut cells = Vec::with_capacity(self.params.lanes * self.params.road_length);
        for lane in 0..self.params.lanes {
            for pos in 0..self.params.road_length {
                cells.push(match self.road.cell(lane, pos) {
                    Cell::Empty => SnapshotCell::Empty,
                    Cell::Closed => SnapshotCell::Closed,
                    Cell::Occupied(id) => {
                        SnapshotCell::Vehicle(self.speeds.get(&id).copied().unwrap_or(0))
                    }
                });
            }
        }
        RoadSnapshot {
            step: self.current_step,
            lanes: self.params.lanes,
            length: self.params.road_length,
            cells,
        }
    }

    /// Travel times of every vehicle that left the road since the last reset.
    pub fn travel_times(&self) -> Vec<u64> {
        self.ledger.travel_times()
    }

    /// Clear recorded travel times without touching the road.
    pub fn reset_statistics(&mut self) {
        self.ledger.clear_completed();
    }

    /// Drop every vehicle waiting to enter, along with its ledger entry.
    pub fn reset_entry_queue(&mut self) {
        for id in self.entry_queue.drain() {
            self.ledger.discard(id);
        }
    }

    /// Change dawdle probability and entry rate from the next step on.
    pub fn set_parameters(
        &mut self,
        dawdle_probability: f64,
        entry_rate: f64,
    ) -> Result<(), ConfigError> {
        validate_traffic(dawdle_probability, entry_rate)?;
        self.params.dawdle_probability = dawdle_probability;
        self.params.entry_rate = entry_rate;
        Ok(())
    }

    /// Close `lane` from now through step `current_step + duration`; a
    /// duration of `u64::MAX` keeps it closed for the rest of the run.
    /// Vehicles on the lane are removed and never recorded as completed.
    pub fn close_lane(&mut self, lane: usize, duration: u64) -> Result<(), ConfigError> {
        if lane >= self.params.lanes {
            return Err(ConfigError::LaneOutOfRange {
                lane,
                lanes: self.params.lanes,
            });
        }
        let end = self.current_step.saturating_add(duration);
        self.closures.insert(lane, end);
        if duration == 0 {
            return Ok(());
        }

        let removed = self.road.close_lane(lane);
        for id in &removed {
            self.speeds.remove(id);
            self.ledger.discard(*id);
        }
        debug!(
            lane,
            duration,
            removed = removed.len(),
            step = self.current_step,
            "lane closed"
        );
        Ok(())
    }
}

//! Deterministic part of the per-vehicle update: acceleration, gap
//! following, overtaking and merging. Reads only the previous road state.
//!
//! Random slowdown and the move itself happen in [`crate::model`].

use crate::road::Road;

/// Outcome of the deterministic rules for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Manoeuvre {
    /// Lane the vehicle moves on this step.
    pub lane: usize,
    /// Speed before random slowdown.
    pub speed: u32,
    /// Gap-limited speed on the current lane, used when a lane change has
    /// to be abandoned.
    pub own_lane_speed: u32,
}

impl Manoeuvre {
    pub fn changes_lane(&self, from: usize) -> bool {
        self.lane != from
    }
}

/// Highest speed up to `desired` that does not run into an occupied or
/// closed cell ahead on `lane`. Cells beyond the road end never obstruct.
pub fn gap_limited_speed(road: &Road, lane: usize, pos: usize, desired: u32) -> u32 {
    for gap in 1..=desired {
        let target = pos + gap as usize;
        if target < road.length() && !road.cell(lane, target).is_empty() {
            return gap - 1;
        }
    }
    desired
}

/// Apply acceleration, gap, overtake and merge rules to the vehicle at
/// (`lane`, `pos`) travelling at `speed`.
pub fn plan_manoeuvre(
    road: &Road,
    lane: usize,
    pos: usize,
    speed: u32,
    v_max: u32,
    multi_lane_rules: bool,
) -> Manoeuvre {
    let desired = (speed + 1).min(v_max);
    let own_lane_speed = gap_limited_speed(road, lane, pos, desired);
    let mut plan = Manoeuvre {
        lane,
        speed: own_lane_speed,
        own_lane_speed,
    };
    if !multi_lane_rules {
        return plan;
    }

    // Vehicles coming from behind on the target lane have priority, so the
    // whole stretch a follower could close in one step must be free.
    let lookback_start = pos.saturating_sub(v_max as usize);

    if lane > 0 && own_lane_speed < desired && road.is_clear(lane - 1, lookback_start, pos) {
        let left_speed = gap_limited_speed(road, lane - 1, pos, desired);
        if left_speed > own_lane_speed {
            plan.lane = lane - 1;
            plan.speed = left_speed;
            return plan;
        }
    }

    if lane + 1 < road.lanes()
        && road.is_clear(lane + 1, lookback_start, pos + own_lane_speed as usize)
    {
        plan.lane = lane + 1;
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::road::Cell;

    fn road_with(lanes: usize, length: usize, vehicles: &[(usize, usize)]) -> Road {
        let mut road = Road::new(lanes, length);
        for (index, &(lane, pos)) in vehicles.iter().enumerate() {
            road.set(lane, pos, Cell::Occupied(index as u64 + 100));
        }
        road
    }

    #[test]
    fn accelerates_up_to_v_max() {
        let road = road_with(1, 50, &[(0, 10)]);
        let plan = plan_manoeuvre(&road, 0, 10, 2, 5, true);
        assert_eq!(plan.speed, 3);
        let plan = plan_manoeuvre(&road, 0, 10, 5, 5, true);
        assert_eq!(plan.speed, 5);
    }

    #[test]
    fn brakes_to_gap() {
        let road = road_with(1, 50, &[(0, 10), (0, 13)]);
        let plan = plan_manoeuvre(&road, 0, 10, 4, 5, true);
        assert_eq!(plan.speed, 2);
        assert_eq!(plan.lane, 0);
    }

    #[test]
    fn closed_cells_obstruct() {
        let mut road = road_with(1, 50, &[(0, 10)]);
        road.set(0, 12, Cell::Closed);
        assert_eq!(gap_limited_speed(&road, 0, 10, 5), 1);
    }

    #[test]
    fn road_end_does_not_obstruct() {
        let road = road_with(1, 20, &[(0, 18)]);
        assert_eq!(gap_limited_speed(&road, 0, 18, 5), 5);
    }

    #[test]
    fn overtakes_when_left_lane_is_faster() {
        // Lane 1 blocked two cells ahead, lane 0 free.
        let road = road_with(2, 50, &[(1, 10), (1, 12)]);
        let plan = plan_manoeuvre(&road, 1, 10, 4, 5, true);
        assert_eq!(plan.lane, 0);
        assert_eq!(plan.speed, 5);
        assert_eq!(plan.own_lane_speed, 1);
    }

    #[test]
    fn does_not_overtake_into_traffic_from_behind() {
        let road = road_with(2, 50, &[(1, 10), (1, 12), (0, 6)]);
        let plan = plan_manoeuvre(&road, 1, 10, 4, 5, true);
        assert_eq!(plan.lane, 1);
        assert_eq!(plan.speed, 1);
    }

    #[test]
    fn does_not_overtake_without_gain() {
        // Left lane blocked at the same distance.
        let road = road_with(2, 50, &[(1, 10), (1, 12), (0, 12)]);
        let plan = plan_manoeuvre(&road, 1, 10, 4, 5, true);
        assert_eq!(plan.lane, 1);
        assert_eq!(plan.speed, 1);
    }

    #[test]
    fn merges_right_when_window_is_clear() {
        let road = road_with(2, 50, &[(0, 20)]);
        let plan = plan_manoeuvre(&road, 0, 20, 5, 5, true);
        assert_eq!(plan.lane, 1);
        assert_eq!(plan.speed, 5);
    }

    #[test]
    fn yields_to_vehicle_already_on_right_lane() {
        let road = road_with(2, 50, &[(0, 20), (1, 23)]);
        let plan = plan_manoeuvre(&road, 0, 20, 5, 5, true);
        assert_eq!(plan.lane, 0);

        let road = road_with(2, 50, &[(0, 20), (1, 16)]);
        let plan = plan_manoeuvre(&road, 0, 20, 5, 5, true);
        assert_eq!(plan.lane, 0);
    }

    #[test]
    fn rightmost_lane_never_merges() {
        let road = road_with(2, 50, &[(1, 20)]);
        let plan = plan_manoeuvre(&road, 1, 20, 5, 5, true);
        assert_eq!(plan.lane, 1);
    }

    #[test]
    fn lane_rules_can_be_disabled() {
        let road = road_with(2, 50, &[(1, 10), (1, 12)]);
        let plan = plan_manoeuvre(&road, 1, 10, 4, 5, false);
        assert_eq!(plan.lane, 1);
        assert_eq!(plan.speed, 1);

        let road = road_with(2, 50, &[(0, 20)]);
        let plan = plan_manoeuvre(&road, 0, 20, 5, 5, false);
        assert_eq!(plan.lane, 0);
    }

    #[test]
    fn closed_lane_is_never_a_target() {
        let mut road = road_with(3, 50, &[(1, 10), (1, 12)]);
        road.close_lane(0);
        road.close_lane(2);
        let plan = plan_manoeuvre(&road, 1, 10, 4, 5, true);
        assert_eq!(plan.lane, 1);
        assert_eq!(plan.speed, 1);
    }
}

//! Road grid: `lanes × length` cells, each empty, closed, or holding one vehicle id.
//!
//! Lane 0 is the leftmost (overtaking) lane; higher indices are further right.
//! Cells carry identifiers only. Speeds live in the model's id → speed map.

use serde::Serialize;

/// Monotonically increasing vehicle identifier, never reused.
pub type VehicleId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Closed,
    Occupied(VehicleId),
}

impl Cell {
    pub fn is_empty(self) -> bool {
        matches!(self, Cell::Empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Road {
    lanes: usize,
    length: usize,
    cells: Vec<Cell>,
}

impl Road {
    pub fn new(lanes: usize, length: usize) -> Self {
        Self {
            lanes,
            length,
            cells: vec![Cell::Empty; lanes * length],
        }
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn cell(&self, lane: usize, pos: usize) -> Cell {
        self.cells[lane * self.length + pos]
    }

    pub fn set(&mut self, lane: usize, pos: usize, cell: Cell) {
        self.cells[lane * self.length + pos] = cell;
    }

    /// Whether every cell of `lane` in `from..=to` is empty. `to` is clipped
    /// to the end of the road.
    pub fn is_clear(&self, lane: usize, from: usize, to: usize) -> bool {
        let to = to.min(self.length - 1);
        (from..=to).all(|pos| self.cell(lane, pos).is_empty())
    }

    /// Overwrite every cell of `lane` with [`Cell::Closed`], returning the ids
    /// of the vehicles that were on it.
    pub fn close_lane(&mut self, lane: usize) -> Vec<VehicleId> {
        let start = lane * self.length;
        let mut removed = Vec::new();
        for cell in &mut self.cells[start..start + self.length] {
            if let Cell::Occupied(id) = *cell {
                removed.push(id);
            }
            *cell = Cell::Closed;
        }
        removed
    }

    /// Occupied cells ordered by lane, then position.
    pub fn vehicles(&self) -> impl Iterator<Item = (usize, usize, VehicleId)> + '_ {
        self.cells.iter().enumerate().filter_map(|(index, cell)| match cell {
            Cell::Occupied(id) => Some((index / self.length, index % self.length, *id)),
            _ => None,
        })
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles().count()
    }
}

/// View of one cell in a [`RoadSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "speed", rename_all = "snake_case")]
pub enum SnapshotCell {
    Empty,
    Closed,
    Vehicle(u32),
}

impl SnapshotCell {
    /// Numeric encoding used by exports: speed for vehicles, `-1` empty, `-2` closed.
    pub fn code(self) -> i32 {
        match self {
            SnapshotCell::Empty => -1,
            SnapshotCell::Closed => -2,
            SnapshotCell::Vehicle(speed) => speed as i32,
        }
    }
}

/// Owned copy of the road at one step, with vehicle ids replaced by speeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoadSnapshot {
    pub step: u64,
    pub lanes: usize,
    pub length: usize,
    pub cells: Vec<SnapshotCell>,
}

impl RoadSnapshot {
    pub fn cell(&self, lane: usize, pos: usize) -> SnapshotCell {
        self.cells[lane * self.length + pos]
    }

    pub fn speed_at(&self, lane: usize, pos: usize) -> Option<u32> {
        match self.cell(lane, pos) {
            SnapshotCell::Vehicle(speed) => Some(speed),
            _ => None,
        }
    }

    pub fn lane(&self, lane: usize) -> &[SnapshotCell] {
        &self.cells[lane * self.length..(lane + 1) * self.length]
    }

    pub fn vehicles_in_lane(&self, lane: usize) -> usize {
        self.lane(lane)
            .iter()
            .filter(|cell| matches!(cell, SnapshotCell::Vehicle(_)))
            .count()
    }

    pub fn vehicle_count(&self) -> usize {
        (0..self.lanes).map(|lane| self.vehicles_in_lane(lane)).sum()
    }

    pub fn is_lane_closed(&self, lane: usize) -> bool {
        self.lane(lane)
            .iter()
            .all(|cell| matches!(cell, SnapshotCell::Closed))
    }
}

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, UInt32Array, UInt64Array};
use arrow::datatypes::Schema;

use crate::road::SnapshotCell;
use crate::telemetry::SnapshotHistory;

#[path = "telemetry_export/utils.rs"]
mod utils;

use utils::{bool_field, nullable_u32_field, u32_field, u64_field, write_record_batch};

/// One row per non-empty cell per snapshot. `speed` is null for closed
/// cells.
pub fn write_road_snapshots_parquet<P: AsRef<Path>>(
    path: P,
    history: &SnapshotHistory,
) -> Result<(), Box<dyn Error>> {
    let mut steps = Vec::new();
    let mut lanes = Vec::new();
    let mut positions = Vec::new();
    let mut speeds = Vec::new();
    let mut closed = Vec::new();

    for snapshot in history.iter() {
        for lane in 0..snapshot.lanes {
            for (pos, cell) in snapshot.lane(lane).iter().enumerate() {
                let speed = match *cell {
                    SnapshotCell::Empty => continue,
                    SnapshotCell::Closed => None,
                    SnapshotCell::Vehicle(speed) => Some(speed),
                };
                steps.push(snapshot.step);
                lanes.push(lane as u32);
                positions.push(pos as u32);
                speeds.push(speed);
                closed.push(speed.is_none());
            }
        }
    }

    let schema = Schema::new(vec![
        u64_field("step"),
        u32_field("lane"),
        u32_field("position"),
        nullable_u32_field("speed"),
        bool_field("closed"),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(steps)),
        Arc::new(UInt32Array::from(lanes)),
        Arc::new(UInt32Array::from(positions)),
        Arc::new(UInt32Array::from(speeds)),
        Arc::new(BooleanArray::from(closed)),
    ];

    write_record_batch(path, schema, arrays)
}

pub fn write_travel_times_parquet<P: AsRef<Path>>(
    path: P,
    travel_times: &[u64],
) -> Result<(), Box<dyn Error>> {
    let schema = Schema::new(vec![u64_field("travel_time")]);
    let arrays: Vec<ArrayRef> = vec![Arc::new(UInt64Array::from(travel_times.to_vec()))];
    write_record_batch(path, schema, arrays)
}

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, BooleanArray, UInt32Array, UInt64Array};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use traffic_core::runner::{run_simulation, RunConfig};
use traffic_core::telemetry_export::{write_road_snapshots_parquet, write_travel_times_parquet};
use traffic_core::test_helpers::busy_params;

fn parquet_fields(path: &Path) -> Vec<(String, String, bool)> {
    let file = File::open(path).expect("parquet file should exist");
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).expect("parquet reader should build");
    builder
        .schema()
        .fields()
        .iter()
        .map(|field| {
            (
                field.name().to_string(),
                field.data_type().to_string(),
                field.is_nullable(),
            )
        })
        .collect()
}

#[test]
fn road_snapshots_parquet_has_one_row_per_occupied_cell() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("road.parquet");

    let output = run_simulation(&busy_params(2), &RunConfig::with_steps(100, 50).with_snapshots(20))
        .expect("run");
    write_road_snapshots_parquet(&path, &output.snapshots).expect("write snapshots");

    assert_eq!(
        parquet_fields(&path),
        vec![
            ("step".to_string(), "UInt64".to_string(), false),
            ("lane".to_string(), "UInt32".to_string(), false),
            ("position".to_string(), "UInt32".to_string(), false),
            ("speed".to_string(), "UInt32".to_string(), true),
            ("closed".to_string(), "Boolean".to_string(), false),
        ]
    );

    let expected_rows: usize = output.snapshots.iter().map(|s| s.vehicle_count()).sum();
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).expect("open"))
        .expect("reader")
        .build()
        .expect("build");
    let mut rows = 0;
    for batch in reader {
        let batch = batch.expect("batch");
        let speeds = batch
            .column(3)
            .as_any()
            .downcast_ref::<UInt32Array>()
            .expect("speed column");
        let closed = batch
            .column(4)
            .as_any()
            .downcast_ref::<BooleanArray>()
            .expect("closed column");
        for i in 0..batch.num_rows() {
            assert!(!closed.value(i));
            assert!(speeds.is_valid(i));
            assert!(speeds.value(i) <= 5);
        }
        rows += batch.num_rows();
    }
    assert_eq!(rows, expected_rows);
}

#[test]
fn closed_cells_are_exported_without_speed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("closed.parquet");

    let mut model = traffic_core::test_helpers::test_model(busy_params(1));
    model.close_lane(0, 5).expect("lane exists");
    let mut history = traffic_core::telemetry::SnapshotHistory::with_capacity(1);
    history.push(model.road_snapshot());
    write_road_snapshots_parquet(&path, &history).expect("write snapshots");

    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).expect("open"))
        .expect("reader")
        .build()
        .expect("build");
    let batches: Vec<_> = reader.map(|b| b.expect("batch")).collect();
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 100);
    for batch in &batches {
        let speeds = batch.column(3);
        assert_eq!(speeds.null_count(), batch.num_rows());
    }
}

#[test]
fn travel_times_parquet_round_trips_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("times.parquet");
    write_travel_times_parquet(&path, &[20, 21, 35]).expect("write");

    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).expect("open"))
        .expect("reader")
        .build()
        .expect("build");
    let mut values = Vec::new();
    for batch in reader {
        let batch = batch.expect("batch");
        let column = batch
            .column(0)
            .as_any()
            .downcast_ref::<UInt64Array>()
            .expect("u64 column");
        values.extend(column.values().iter().copied());
    }
    assert_eq!(values, vec![20, 21, 35]);
}

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::metrics::SimulationResult;

pub(crate) fn export_to_parquet_impl(
    results: &[SimulationResult],
    file: std::fs::File,
) -> Result<(), Box<dyn std::error::Error>> {
    let batch = build_record_batch(results)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

fn build_record_batch(
    results: &[SimulationResult],
) -> Result<RecordBatch, arrow::error::ArrowError> {
    let schema = Arc::new(parquet_schema());
    let arrays = build_arrays(results);

    RecordBatch::try_new(schema, arrays)
}

fn parquet_schema() -> Schema {
    Schema::new(vec![
        Field::new("cars", DataType::UInt64, false),
        Field::new("time_min", DataType::UInt64, false),
        Field::new("time_max", DataType::UInt64, false),
        Field::new("time_avg", DataType::Float64, false),
        Field::new("time_median", DataType::Float64, false),
        Field::new("time_p90", DataType::Float64, false),
        Field::new("velocity_avg_kmh", DataType::Float64, false),
        Field::new("throughput", DataType::Float64, false),
        Field::new("mean_occupancy", DataType::Float64, false),
        Field::new("time_interpolated", DataType::Float64, false),
    ])
}

fn u64_column(results: &[SimulationResult], value: impl Fn(&SimulationResult) -> u64) -> ArrayRef {
    Arc::new(UInt64Array::from(
        results.iter().map(value).collect::<Vec<_>>(),
    ))
}

fn f64_column(results: &[SimulationResult], value: impl Fn(&SimulationResult) -> f64) -> ArrayRef {
    Arc::new(Float64Array::from(
        results.iter().map(value).collect::<Vec<_>>(),
    ))
}

fn build_arrays(results: &[SimulationResult]) -> Vec<ArrayRef> {
    vec![
        u64_column(results, |r| r.cars as u64),
        u64_column(results, |r| r.time_min),
        u64_column(results, |r| r.time_max),
        f64_column(results, |r| r.time_avg),
        f64_column(results, |r| r.time_median),
        f64_column(results, |r| r.time_p90),
        f64_column(results, |r| r.velocity_avg_kmh),
        f64_column(results, |r| r.throughput),
        f64_column(results, |r| r.mean_occupancy),
        f64_column(results, |r| r.time_interpolated),
    ]
}

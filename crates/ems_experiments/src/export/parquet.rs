use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ems_core::clock::CALL_TIME_FORMAT;
use ems_core::simulation::DispatchRecord;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::error::DatasetError;

pub(crate) fn export_records_impl(
    records: &[DispatchRecord],
    file: std::fs::File,
) -> Result<(), DatasetError> {
    let batch = build_record_batch(records)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

fn build_record_batch(records: &[DispatchRecord]) -> Result<RecordBatch, arrow::error::ArrowError> {
    let schema = Arc::new(parquet_schema());
    let arrays = build_arrays(records);

    RecordBatch::try_new(schema, arrays)
}

fn parquet_schema() -> Schema {
    Schema::new(vec![
        Field::new("patient_id", DataType::UInt32, false),
        Field::new("latitude", DataType::Float64, false),
        Field::new("longitude", DataType::Float64, false),
        Field::new("severity", DataType::Utf8, false),
        Field::new("condition", DataType::Utf8, false),
        Field::new("call_time_ms", DataType::UInt64, false),
        Field::new("Call_Time", DataType::Utf8, false),
        Field::new("queue_delay_min", DataType::Float64, false),
        Field::new("unit_id", DataType::UInt32, false),
        Field::new("ems_base_id", DataType::UInt32, false),
        Field::new("ems_base_name", DataType::Utf8, false),
        Field::new("distance_to_patient_km", DataType::Float64, false),
        Field::new("hospital_id", DataType::UInt32, true),
        Field::new("hospital_level", DataType::UInt32, true),
        Field::new("distance_to_hospital_km", DataType::Float64, true),
        Field::new("dispatch_min", DataType::Float64, false),
        Field::new("to_patient_min", DataType::Float64, false),
        Field::new("on_scene_min", DataType::Float64, false),
        Field::new("to_hospital_min", DataType::Float64, false),
        Field::new("handover_min", DataType::Float64, false),
        Field::new("response_time_min", DataType::Float64, false),
        Field::new("is_estimated", DataType::Boolean, false),
    ])
}

fn floats(records: &[DispatchRecord], f: impl Fn(&DispatchRecord) -> f64) -> ArrayRef {
    Arc::new(Float64Array::from(records.iter().map(f).collect::<Vec<_>>()))
}

fn ids(records: &[DispatchRecord], f: impl Fn(&DispatchRecord) -> u32) -> ArrayRef {
    Arc::new(UInt32Array::from(records.iter().map(f).collect::<Vec<_>>()))
}

fn strings(records: &[DispatchRecord], f: impl Fn(&DispatchRecord) -> String) -> ArrayRef {
    Arc::new(StringArray::from(records.iter().map(f).collect::<Vec<_>>()))
}

fn build_arrays(records: &[DispatchRecord]) -> Vec<ArrayRef> {
    vec![
        ids(records, |r| r.incident_id),
        floats(records, |r| r.location.lat),
        floats(records, |r| r.location.lon),
        strings(records, |r| r.severity.as_str().to_string()),
        strings(records, |r| r.condition.as_str().to_string()),
        Arc::new(UInt64Array::from(
            records.iter().map(|r| r.call_time_ms).collect::<Vec<_>>(),
        )),
        strings(records, |r| r.call_time.format(CALL_TIME_FORMAT).to_string()),
        floats(records, |r| r.queue_delay_min),
        ids(records, |r| r.unit_id),
        ids(records, |r| r.base_id),
        strings(records, |r| r.base_name.clone()),
        floats(records, |r| r.distance_to_patient_km),
        Arc::new(UInt32Array::from(
            records.iter().map(|r| r.hospital_id()).collect::<Vec<_>>(),
        )),
        Arc::new(UInt32Array::from(
            records
                .iter()
                .map(|r| r.hospital.as_ref().map(|h| u32::from(h.level)))
                .collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            records
                .iter()
                .map(|r| r.distance_to_hospital_km())
                .collect::<Vec<_>>(),
        )),
        floats(records, |r| r.breakdown.dispatch_min),
        floats(records, |r| r.breakdown.to_patient_min),
        floats(records, |r| r.breakdown.on_scene_min),
        floats(records, |r| r.breakdown.to_hospital_min),
        floats(records, |r| r.breakdown.handover_min),
        floats(records, |r| r.total_response_min),
        Arc::new(BooleanArray::from(
            records.iter().map(|r| r.is_estimated).collect::<Vec<_>>(),
        )),
    ]
}

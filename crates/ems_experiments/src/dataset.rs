//! CSV tables consumed by the simulator and the training pipeline.
//!
//! Headers are matched after trimming whitespace. The hospital table keeps the
//! historical `Longtitude` spelling and also accepts `Longitude`.

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, Trim};

use crate::error::DatasetError;

#[path = "dataset/bases.rs"]
mod bases;
#[path = "dataset/hospitals.rs"]
mod hospitals;
#[path = "dataset/records.rs"]
mod records;

pub use bases::read_bases;
pub use hospitals::{parse_flag, read_hospitals};
pub use records::{read_records, RecordRow};

pub(crate) fn csv_reader<R: std::io::Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new().trim(Trim::All).from_reader(reader)
}

fn open(path: impl AsRef<Path>) -> Result<File, DatasetError> {
    Ok(File::open(path)?)
}

pub fn read_hospitals_csv(
    path: impl AsRef<Path>,
) -> Result<Vec<ems_core::hospital::Hospital>, DatasetError> {
    read_hospitals(open(path)?)
}

pub fn read_bases_csv(
    path: impl AsRef<Path>,
) -> Result<Vec<ems_core::fleet::EmsBase>, DatasetError> {
    read_bases(open(path)?)
}

pub fn read_records_csv(path: impl AsRef<Path>) -> Result<Vec<RecordRow>, DatasetError> {
    read_records(open(path)?)
}

/// Line number of a record for error messages (1-based, header included).
pub(crate) fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

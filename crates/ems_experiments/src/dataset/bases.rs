use std::io::Read;

use ems_core::fleet::EmsBase;
use ems_core::geo::GeoPoint;
use serde::Deserialize;

use super::csv_reader;
use crate::error::DatasetError;

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct BaseRow {
    base_id: u32,
    base_name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default = "one")]
    ambulances: u32,
}

/// Base roster; `ambulances` defaults to one when the column is absent.
pub fn read_bases<R: Read>(reader: R) -> Result<Vec<EmsBase>, DatasetError> {
    let mut rdr = csv_reader(reader);
    let mut bases = Vec::new();
    for row in rdr.deserialize::<BaseRow>() {
        let row = row?;
        bases.push(EmsBase {
            base_id: row.base_id,
            base_name: row.base_name,
            location: GeoPoint::new(row.latitude, row.longitude),
            ambulances: row.ambulances,
        });
    }
    Ok(bases)
}

use std::io::Read;

use ems_core::geo::GeoPoint;
use ems_core::hospital::{Hospital, HospitalId};
use serde::Deserialize;

use super::{csv_reader, line_of};
use crate::error::DatasetError;

#[derive(Debug, Deserialize)]
struct HospitalRow {
    #[serde(rename = "ID")]
    id: HospitalId,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longtitude", alias = "Longitude")]
    longitude: f64,
    #[serde(rename = "Level")]
    level: Option<u8>,
    #[serde(rename = "Has ER", default)]
    has_er: String,
}

/// `Yes/No`, `true/false` and `1/0`, case-insensitive; empty reads as `false`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Some(true),
        "no" | "n" | "false" | "0" | "" => Some(false),
        _ => None,
    }
}

pub fn read_hospitals<R: Read>(reader: R) -> Result<Vec<Hospital>, DatasetError> {
    let mut rdr = csv_reader(reader);
    let headers = rdr.headers()?.clone();
    let mut hospitals = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = line_of(&record);
        let row: HospitalRow = record.deserialize(Some(&headers))?;
        let level = row.level.ok_or_else(|| DatasetError::InvalidRow {
            line,
            message: format!("hospital {} has no Level", row.id),
        })?;
        let has_er = parse_flag(&row.has_er).ok_or_else(|| DatasetError::InvalidRow {
            line,
            message: format!("unrecognised Has ER value {:?}", row.has_er),
        })?;
        hospitals.push(Hospital {
            id: row.id,
            name: row.name,
            address: row.address,
            location: GeoPoint::new(row.latitude, row.longitude),
            level,
            has_er,
        });
    }
    Ok(hospitals)
}

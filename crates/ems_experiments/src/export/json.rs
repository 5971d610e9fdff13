use std::io::{BufReader, BufWriter, Write};

use ems_core::geo::GeoPoint;
use ems_core::hospital::HospitalId;
use ems_core::recommender::Recommendation;
use ems_core::simulation::ResponseBreakdown;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

/// Coordinates and timing of a recommended trip, for an external map renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteHandoff {
    pub patient: GeoPoint,
    pub severity: String,
    pub condition: String,
    pub base_id: u32,
    pub base_name: String,
    pub base: GeoPoint,
    pub hospital_id: HospitalId,
    pub hospital_name: String,
    pub hospital: GeoPoint,
    pub breakdown: ResponseBreakdown,
    pub total_response_min: f64,
}

impl RouteHandoff {
    pub fn new(
        patient: GeoPoint,
        severity: &str,
        condition: &str,
        recommendation: &Recommendation<'_>,
    ) -> Self {
        let features = &recommendation.features;
        Self {
            patient,
            severity: severity.to_string(),
            condition: condition.to_string(),
            base_id: features.base.base_id,
            base_name: features.base.base_name.clone(),
            base: features.base.location,
            hospital_id: recommendation.hospital.id,
            hospital_name: recommendation.hospital.name.clone(),
            hospital: recommendation.hospital.location,
            breakdown: features.breakdown,
            total_response_min: features.response_time_min(),
        }
    }
}

pub(crate) fn write_pretty<T: Serialize + ?Sized>(
    value: &T,
    file: std::fs::File,
) -> Result<(), DatasetError> {
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

pub(crate) fn read<T: DeserializeOwned>(file: std::fs::File) -> Result<T, DatasetError> {
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

use std::io::Read;

use ems_core::clock::CALL_TIME_FORMAT;
use ems_core::fleet::UnitId;
use ems_core::geo::GeoPoint;
use ems_core::hospital::HospitalId;
use ems_core::recommender::TrainingExample;
use ems_core::simulation::DispatchRecord;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use super::csv_reader;
use crate::error::DatasetError;

/// One row of the dispatch-record table (the training corpus).
///
/// The first eleven columns keep the names of the historical dataset; the
/// trailing ones are optional so older files still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    pub patient_id: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub severity: String,
    pub condition: String,
    #[serde(rename = "Call_Time")]
    pub call_time: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub hospital_id: Option<HospitalId>,
    #[serde(default)]
    pub distance_to_hospital_km: Option<f64>,
    pub response_time_min: f64,
    pub ems_base_id: u32,
    pub ems_base_name: String,
    #[serde(default)]
    pub unit_id: Option<UnitId>,
    #[serde(default)]
    pub queue_delay_min: Option<f64>,
    #[serde(default)]
    pub is_estimated: Option<bool>,
}

/// Hospital ids written by float-typed tools come back as `"3.0"`.
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<HospitalId>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let raw = match raw {
        Some(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
        _ => return Ok(None),
    };
    if let Ok(id) = raw.parse::<HospitalId>() {
        return Ok(Some(id));
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_nan() => Ok(None),
        Ok(v) if v >= 0.0 && v.fract() == 0.0 && v <= HospitalId::MAX as f64 => {
            Ok(Some(v as HospitalId))
        }
        _ => Err(D::Error::custom(format!("invalid hospital_id {raw:?}"))),
    }
}

impl RecordRow {
    pub fn from_record(record: &DispatchRecord) -> Self {
        Self {
            patient_id: record.incident_id,
            latitude: record.location.lat,
            longitude: record.location.lon,
            severity: record.severity.as_str().to_string(),
            condition: record.condition.as_str().to_string(),
            call_time: record.call_time.format(CALL_TIME_FORMAT).to_string(),
            hospital_id: record.hospital_id(),
            distance_to_hospital_km: record.distance_to_hospital_km(),
            response_time_min: record.total_response_min,
            ems_base_id: record.base_id,
            ems_base_name: record.base_name.clone(),
            unit_id: Some(record.unit_id),
            queue_delay_min: Some(record.queue_delay_min),
            is_estimated: Some(record.is_estimated),
        }
    }

    /// Labelled example, or `None` for rows without a destination hospital.
    pub fn to_training_example(&self) -> Option<TrainingExample> {
        Some(TrainingExample {
            location: GeoPoint::new(self.latitude, self.longitude),
            severity: self.severity.clone(),
            condition: self.condition.clone(),
            distance_to_hospital_km: self.distance_to_hospital_km?,
            response_time_min: self.response_time_min,
            hospital_id: self.hospital_id?,
        })
    }
}

pub fn read_records<R: Read>(reader: R) -> Result<Vec<RecordRow>, DatasetError> {
    let mut rdr = csv_reader(reader);
    let rows = rdr.deserialize().collect::<Result<Vec<RecordRow>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "patient_id,latitude,longitude,severity,condition,Call_Time,hospital_id,distance_to_hospital_km,response_time_min,ems_base_id,ems_base_name";

    #[test]
    fn reads_historical_columns() {
        let csv = format!(
            "{HEADER}\n\
             1,14.62,121.09,high,Stroke,2025-05-13 08:07:00,12,1.52,31.4,166,166 Base\n\
             2,14.66,121.11,medium,Fracture,2025-05-13 08:19:00,,,20.1,164,164 Base\n"
        );
        let rows = read_records(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].hospital_id, Some(12));
        assert_eq!(rows[0].unit_id, None);
        assert_eq!(rows[1].hospital_id, None);
        assert_eq!(rows[1].distance_to_hospital_km, None);

        let example = rows[0].to_training_example().unwrap();
        assert_eq!(example.condition, "Stroke");
        assert_eq!(example.hospital_id, 12);
        assert!(rows[1].to_training_example().is_none());
    }

    #[test]
    fn float_formatted_ids_are_accepted() {
        let csv = format!("{HEADER}\n3,14.63,121.1,low,Fever,2025-05-13 08:30:00,4.0,0.8,19.0,163,163 Base\n");
        let rows = read_records(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].hospital_id, Some(4));

        let csv = format!("{HEADER}\n3,14.63,121.1,low,Fever,2025-05-13 08:30:00,4.5,0.8,19.0,163,163 Base\n");
        assert!(read_records(csv.as_bytes()).is_err());
    }
}

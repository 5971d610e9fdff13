//! Exports: dispatch records (CSV, Parquet), unit rosters, sweep tables,
//! trained model bundles and the route handoff file for map renderers.

use std::path::Path;

use ems_core::fleet::FleetState;
use ems_core::recommender::HospitalModel;
use ems_core::simulation::DispatchRecord;
use ems_core::telemetry::SimulationSummary;

use crate::error::DatasetError;
use crate::sweep::SweepResult;

#[path = "export/csv.rs"]
mod csv;
#[path = "export/json.rs"]
mod json;
#[path = "export/parquet.rs"]
mod parquet;
#[path = "export/writer_utils.rs"]
mod writer_utils;

pub use json::RouteHandoff;

/// Write the training corpus with the historical column names.
///
/// Records without a hospital leave `hospital_id` and `distance_to_hospital_km` empty.
pub fn export_records_csv(
    records: &[DispatchRecord],
    path: impl AsRef<Path>,
) -> Result<(), DatasetError> {
    writer_utils::ensure_not_empty(records, "dispatch records")?;
    let file = writer_utils::create_output_file(path)?;
    csv::export_records_impl(records, file)
}

pub fn export_records_parquet(
    records: &[DispatchRecord],
    path: impl AsRef<Path>,
) -> Result<(), DatasetError> {
    writer_utils::ensure_not_empty(records, "dispatch records")?;
    let file = writer_utils::create_output_file(path)?;
    parquet::export_records_impl(records, file)
}

/// Unit roster with status and next availability, one row per unit.
pub fn export_roster_csv(fleet: &FleetState, path: impl AsRef<Path>) -> Result<(), DatasetError> {
    let roster = fleet.roster();
    writer_utils::ensure_not_empty(&roster, "units")?;
    let file = writer_utils::create_output_file(path)?;
    csv::export_roster_impl(&roster, file)
}

pub fn export_sweep_csv(
    results: &[SweepResult],
    path: impl AsRef<Path>,
) -> Result<(), DatasetError> {
    writer_utils::ensure_not_empty(results, "sweep results")?;
    let file = writer_utils::create_output_file(path)?;
    csv::export_sweep_impl(results, file)
}

pub fn export_summary_json(
    summary: &SimulationSummary,
    path: impl AsRef<Path>,
) -> Result<(), DatasetError> {
    let file = writer_utils::create_output_file(path)?;
    json::write_pretty(summary, file)
}

pub fn save_model(model: &HospitalModel, path: impl AsRef<Path>) -> Result<(), DatasetError> {
    let file = writer_utils::create_output_file(path)?;
    json::write_pretty(model, file)
}

pub fn load_model(path: impl AsRef<Path>) -> Result<HospitalModel, DatasetError> {
    let file = std::fs::File::open(path)?;
    json::read(file)
}

pub fn export_route_handoff(
    handoff: &RouteHandoff,
    path: impl AsRef<Path>,
) -> Result<(), DatasetError> {
    let file = writer_utils::create_output_file(path)?;
    json::write_pretty(handoff, file)
}

use ems_core::fleet::RosterRow;
use ems_core::simulation::DispatchRecord;

use crate::dataset::RecordRow;
use crate::error::DatasetError;
use crate::sweep::SweepResult;

pub(crate) fn export_records_impl(
    records: &[DispatchRecord],
    file: std::fs::File,
) -> Result<(), DatasetError> {
    let mut wtr = csv::Writer::from_writer(file);
    for record in records {
        wtr.serialize(RecordRow::from_record(record))?;
    }
    wtr.flush()?;
    Ok(())
}

pub(crate) fn export_roster_impl(
    roster: &[RosterRow],
    file: std::fs::File,
) -> Result<(), DatasetError> {
    let mut wtr = csv::Writer::from_writer(file);
    for row in roster {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub(crate) fn export_sweep_impl(
    results: &[SweepResult],
    file: std::fs::File,
) -> Result<(), DatasetError> {
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record([
        "seed",
        "dispatched",
        "failed",
        "without_hospital",
        "queued",
        "estimated",
        "avg_response_min",
        "median_response_min",
        "p90_response_min",
        "max_queue_delay_min",
    ])?;

    for result in results {
        let s = &result.summary;
        wtr.write_record([
            result.seed.to_string(),
            s.dispatched.to_string(),
            s.failed.to_string(),
            s.without_hospital.to_string(),
            s.queued.to_string(),
            s.estimated.to_string(),
            format!("{:.4}", s.avg_response_min),
            format!("{:.4}", s.median_response_min),
            format!("{:.4}", s.p90_response_min),
            format!("{:.4}", s.max_queue_delay_min),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

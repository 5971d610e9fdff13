//! Run-level KPIs derived from the dispatch record stream.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::hospital::HospitalId;
use crate::incident::Severity;
use crate::simulation::DispatchRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeverityStats {
    pub count: usize,
    pub avg_response_min: f64,
}

/// Aggregate view of one simulation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub dispatched: usize,
    pub failed: usize,
    pub without_hospital: usize,
    pub queued: usize,
    pub estimated: usize,
    pub avg_response_min: f64,
    pub median_response_min: f64,
    pub p90_response_min: f64,
    pub max_queue_delay_min: f64,
    pub by_severity: BTreeMap<Severity, SeverityStats>,
    pub by_hospital: BTreeMap<HospitalId, usize>,
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

impl SimulationSummary {
    pub fn from_records(records: &[DispatchRecord], failed: usize) -> Self {
        let mut summary = Self {
            dispatched: records.len(),
            failed,
            ..Default::default()
        };
        if records.is_empty() {
            return summary;
        }

        let mut responses: Vec<f64> = Vec::with_capacity(records.len());
        for record in records {
            responses.push(record.total_response_min);
            if record.queue_delay_min > 0.0 {
                summary.queued += 1;
            }
            if record.is_estimated {
                summary.estimated += 1;
            }
            summary.max_queue_delay_min = summary.max_queue_delay_min.max(record.queue_delay_min);
            match record.hospital_id() {
                Some(id) => *summary.by_hospital.entry(id).or_default() += 1,
                None => summary.without_hospital += 1,
            }
            let stats = summary.by_severity.entry(record.severity).or_default();
            stats.count += 1;
            stats.avg_response_min += record.total_response_min;
        }
        for stats in summary.by_severity.values_mut() {
            stats.avg_response_min /= stats.count as f64;
        }

        summary.avg_response_min = responses.iter().sum::<f64>() / responses.len() as f64;
        responses.sort_by(|a, b| a.total_cmp(b));
        summary.median_response_min = percentile(&responses, 0.5);
        summary.p90_response_min = percentile(&responses, 0.9);
        summary
    }
}

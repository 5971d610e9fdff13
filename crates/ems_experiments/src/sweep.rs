//! Independent simulations over many seeds, run in parallel with rayon.

use ems_core::fleet::EmsBase;
use ems_core::hospital::Hospital;
use ems_core::scenario::{run_scenario, ScenarioError, ScenarioParams};
use ems_core::telemetry::SimulationSummary;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepResult {
    pub seed: u64,
    pub summary: SimulationSummary,
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("seed {seed}: {source}")]
    Scenario {
        seed: u64,
        #[source]
        source: ScenarioError,
    },
}

/// Run one simulation per seed; every other parameter comes from `params`.
pub fn run_seed(
    params: &ScenarioParams,
    seed: u64,
    bases: &[EmsBase],
    hospitals: &[Hospital],
) -> Result<SweepResult, SweepError> {
    let params = params.clone().with_seed(seed);
    let (_, outcome) = run_scenario(&params, bases, hospitals.to_vec())
        .map_err(|source| SweepError::Scenario { seed, source })?;
    Ok(SweepResult {
        seed,
        summary: outcome.summary(),
    })
}

fn progress_bar(total: usize) -> Option<ProgressBar> {
    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .ok()?
        .progress_chars("#>-");
    bar.set_style(style);
    Some(bar)
}

/// Results come back in `seeds` order.
pub fn sweep_seeds(
    params: &ScenarioParams,
    seeds: &[u64],
    bases: &[EmsBase],
    hospitals: &[Hospital],
    num_threads: Option<usize>,
    show_progress: bool,
) -> Result<Vec<SweepResult>, SweepError> {
    let pb = if show_progress && !seeds.is_empty() {
        progress_bar(seeds.len())
    } else {
        None
    };

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = num_threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    let results = pool.install(|| {
        seeds
            .par_iter()
            .map(|&seed| {
                let result = run_seed(params, seed, bases, hospitals);
                if let Some(ref progress_bar) = pb {
                    progress_bar.inc(1);
                }
                result
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    if let Some(ref progress_bar) = pb {
        progress_bar.finish_with_message("Completed");
    }
    info!("sweep finished: {} seeds", results.len());
    Ok(results)
}

//! Dataset I/O, model training and parallel seed sweeps for the EMS dispatch simulation.
//!
//! - [`dataset`]: hospital, base and dispatch-record tables (CSV)
//! - [`export`]: record export to CSV/Parquet, unit rosters, model bundles and route handoff JSON
//! - [`training`]: train/test split, random-forest fitting and the evaluation report
//! - [`sweep`]: independent simulations over many seeds, run in parallel with rayon
//!
//! ```no_run
//! use ems_core::scenario::{default_bases, default_hospitals, ScenarioParams};
//! use ems_experiments::sweep::sweep_seeds;
//!
//! let params = ScenarioParams::default().with_num_incidents(1_000);
//! let (bases, hospitals) = (default_bases(), default_hospitals());
//! let results = sweep_seeds(&params, &[1, 2, 3], &bases, &hospitals, None, false)?;
//! # Ok::<(), ems_experiments::sweep::SweepError>(())
//! ```

pub mod dataset;
pub mod error;
pub mod export;
pub mod sweep;
pub mod training;

pub use dataset::{read_bases_csv, read_hospitals_csv, read_records_csv, RecordRow};
pub use error::DatasetError;
pub use export::{
    export_records_csv, export_records_parquet, export_roster_csv, export_route_handoff,
    export_sweep_csv, load_model, save_model, RouteHandoff,
};
pub use sweep::{sweep_seeds, SweepResult};
pub use training::{train_and_evaluate, EvaluationReport, TrainingConfig};

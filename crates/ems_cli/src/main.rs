use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ems_core::fleet::EmsBase;
use ems_core::hospital::Hospital;
use ems_core::recommender::ForestConfig;
use ems_core::routing::RouteProviderKind;
use ems_core::scenario::{default_bases, default_hospitals, run_scenario, ScenarioParams};
use ems_experiments::dataset::{read_bases_csv, read_hospitals_csv, read_records_csv};
use ems_experiments::export::{
    export_records_csv, export_records_parquet, export_roster_csv, export_summary_json,
    export_sweep_csv, save_model,
};
use ems_experiments::sweep::sweep_seeds;
use ems_experiments::training::{examples_from_rows, train_and_evaluate, TrainingConfig};
use log::info;

mod recommend;

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "ems",
    about = "EMS dispatch simulation and hospital recommendation",
    long_about = "Simulate ambulance dispatch over a municipality, train a hospital\n\
                  recommender on the simulated dispatches, and query it for a patient."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate incidents and simulate dispatch, writing the training corpus
    Simulate(SimulateArgs),
    /// Train the hospital recommender on a dispatch-record CSV
    Train(TrainArgs),
    /// Recommend a hospital for one patient (prompts for missing fields)
    Recommend(recommend::RecommendArgs),
    /// Run the same scenario over many seeds in parallel
    Sweep(SweepArgs),
}

#[derive(Args)]
pub(crate) struct RosterArgs {
    /// Hospital CSV (ID, Name, Address, Latitude, Longtitude, Level, Has ER)
    #[arg(long)]
    hospitals: Option<PathBuf>,
    /// Base CSV (base_id, base_name, latitude, longitude[, ambulances])
    #[arg(long)]
    bases: Option<PathBuf>,
}

impl RosterArgs {
    pub(crate) fn load(&self) -> Result<(Vec<EmsBase>, Vec<Hospital>)> {
        let bases = match &self.bases {
            Some(path) => read_bases_csv(path)
                .with_context(|| format!("reading bases from {}", path.display()))?,
            None => default_bases(),
        };
        let hospitals = match &self.hospitals {
            Some(path) => read_hospitals_csv(path)
                .with_context(|| format!("reading hospitals from {}", path.display()))?,
            None => default_hospitals(),
        };
        info!("{} bases, {} hospitals", bases.len(), hospitals.len());
        Ok((bases, hospitals))
    }
}

#[derive(Args)]
pub(crate) struct RoutingArgs {
    /// OpenRouteService base URL; haversine estimates are used when absent
    #[arg(long)]
    ors_endpoint: Option<String>,
    #[arg(long, env = "ORS_API_KEY", hide_env_values = true)]
    ors_api_key: Option<String>,
    /// Precomputed route table (bincode)
    #[arg(long)]
    route_table: Option<PathBuf>,
}

impl RoutingArgs {
    pub(crate) fn kind(&self) -> Result<Option<RouteProviderKind>> {
        if let Some(endpoint) = &self.ors_endpoint {
            let Some(api_key) = &self.ors_api_key else {
                bail!("--ors-endpoint needs an API key (--ors-api-key or ORS_API_KEY)");
            };
            return ors_kind(endpoint, api_key).map(Some);
        }
        if let Some(path) = &self.route_table {
            return precomputed_kind(path).map(Some);
        }
        Ok(None)
    }
}

#[cfg(feature = "ors")]
fn ors_kind(endpoint: &str, api_key: &str) -> Result<RouteProviderKind> {
    Ok(RouteProviderKind::OpenRouteService {
        endpoint: endpoint.to_string(),
        api_key: api_key.to_string(),
    })
}

#[cfg(not(feature = "ors"))]
fn ors_kind(_endpoint: &str, _api_key: &str) -> Result<RouteProviderKind> {
    bail!("this binary was built without the `ors` feature")
}

#[cfg(feature = "precomputed")]
fn precomputed_kind(path: &Path) -> Result<RouteProviderKind> {
    Ok(RouteProviderKind::Precomputed {
        path: path.display().to_string(),
    })
}

#[cfg(not(feature = "precomputed"))]
fn precomputed_kind(_path: &Path) -> Result<RouteProviderKind> {
    bail!("this binary was built without the `precomputed` feature")
}

#[derive(Args)]
struct ScenarioArgs {
    /// JSON file with scenario parameters; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    num_incidents: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Average ambulance speed for haversine travel times
    #[arg(long)]
    speed_kmh: Option<f64>,
    #[command(flatten)]
    routing: RoutingArgs,
}

impl ScenarioArgs {
    fn params(&self) -> Result<ScenarioParams> {
        let mut params = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing scenario config {}", path.display()))?
            }
            None => ScenarioParams::default(),
        };
        if let Some(n) = self.num_incidents {
            params = params.with_num_incidents(n);
        }
        if let Some(seed) = self.seed {
            params = params.with_seed(seed);
        }
        if let Some(speed) = self.speed_kmh {
            params = params.with_average_speed_kmh(speed);
        }
        if let Some(kind) = self.routing.kind()? {
            params = params.with_route_provider(kind);
        }
        Ok(params)
    }
}

#[derive(Args)]
struct SimulateArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,
    #[command(flatten)]
    roster: RosterArgs,
    /// Dispatch-record CSV (training corpus)
    #[arg(long, default_value = "data/marikina_patients.csv")]
    output: PathBuf,
    #[arg(long)]
    parquet: Option<PathBuf>,
    /// Unit roster CSV with final availability
    #[arg(long)]
    units: Option<PathBuf>,
    /// Run summary JSON
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Args)]
struct TrainArgs {
    #[arg(long, default_value = "data/marikina_patients.csv")]
    records: PathBuf,
    #[arg(long, default_value = "data/hospital_model.json")]
    model: PathBuf,
    #[arg(long, default_value_t = 100)]
    trees: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 0.2)]
    test_fraction: f64,
    #[arg(long)]
    max_depth: Option<usize>,
    /// Evaluation report JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args)]
struct SweepArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,
    #[command(flatten)]
    roster: RosterArgs,
    #[arg(long, default_value_t = 1)]
    first_seed: u64,
    #[arg(long, default_value_t = 20)]
    runs: u64,
    #[arg(long)]
    threads: Option<usize>,
    #[arg(long, default_value = "data/sweep_results.csv")]
    output: PathBuf,
}

// ── commands ───────────────────────────────────────────────────────

fn simulate(args: &SimulateArgs) -> Result<()> {
    let params = args.scenario.params()?;
    let (bases, hospitals) = args.roster.load()?;
    info!(
        "simulating {} incidents (seed {:?})",
        params.num_incidents, params.seed
    );
    let (simulator, outcome) = run_scenario(&params, &bases, hospitals)?;
    if outcome.records.is_empty() {
        bail!("no incidents were dispatched");
    }

    export_records_csv(&outcome.records, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("Wrote {} records to {}", outcome.records.len(), args.output.display());

    if let Some(path) = &args.parquet {
        export_records_parquet(&outcome.records, path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &args.units {
        export_roster_csv(simulator.fleet(), path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &args.summary {
        export_summary_json(&outcome.summary(), path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn train(args: &TrainArgs) -> Result<()> {
    let rows = read_records_csv(&args.records)
        .with_context(|| format!("reading {}", args.records.display()))?;
    let examples = examples_from_rows(&rows);
    let config = TrainingConfig {
        test_fraction: args.test_fraction,
        split_seed: args.seed,
        forest: ForestConfig {
            n_estimators: args.trees,
            max_depth: args.max_depth,
            seed: args.seed,
            ..Default::default()
        },
    };

    let (model, report) = train_and_evaluate(&examples, &config)?;
    println!("{report}");

    save_model(&model, &args.model)
        .with_context(|| format!("writing {}", args.model.display()))?;
    println!("Saved model to {}", args.model.display());

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn sweep(args: &SweepArgs) -> Result<()> {
    let params = args.scenario.params()?;
    let (bases, hospitals) = args.roster.load()?;
    let seeds: Vec<u64> = (0..args.runs).map(|i| args.first_seed.wrapping_add(i)).collect();

    let results = sweep_seeds(&params, &seeds, &bases, &hospitals, args.threads, true)?;
    export_sweep_csv(&results, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    let n = results.len().max(1) as f64;
    let mean_response = results.iter().map(|r| r.summary.avg_response_min).sum::<f64>() / n;
    println!(
        "{} runs, mean response {:.2} min, results in {}",
        results.len(),
        mean_response,
        args.output.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Simulate(args) => simulate(args),
        Commands::Train(args) => train(args),
        Commands::Recommend(args) => recommend::run(args),
        Commands::Sweep(args) => sweep(args),
    }
}

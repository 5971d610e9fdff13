//! `ems recommend`: validate one patient's details and print the recommended hospital.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::Args;
use ems_core::geo::{BoundingBox, GeoPoint};
use ems_core::incident::Severity;
use ems_core::recommender::{HospitalModel, HospitalRecommender};
use ems_core::routing::GeoDistance;
use ems_core::scenario::MARIKINA_BBOX;
use ems_experiments::export::{export_route_handoff, load_model, RouteHandoff};

use crate::{RosterArgs, RoutingArgs};

#[derive(Args)]
pub(crate) struct RecommendArgs {
    #[arg(long, default_value = "data/hospital_model.json")]
    model: PathBuf,
    #[command(flatten)]
    roster: RosterArgs,
    #[command(flatten)]
    routing: RoutingArgs,
    #[arg(long, default_value_t = 30.0)]
    speed_kmh: f64,
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,
    #[arg(long)]
    severity: Option<String>,
    #[arg(long)]
    condition: Option<String>,
    /// Write base, patient and hospital coordinates for a map renderer
    #[arg(long)]
    handoff: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PatientInput {
    pub location: GeoPoint,
    pub severity: String,
    pub condition: String,
}

pub(crate) fn check_latitude(lat: f64, bbox: &BoundingBox) -> Result<f64, String> {
    if (bbox.lat_min..=bbox.lat_max).contains(&lat) {
        Ok(lat)
    } else {
        Err(format!("latitude must be between {} and {}", bbox.lat_min, bbox.lat_max))
    }
}

pub(crate) fn check_longitude(lon: f64, bbox: &BoundingBox) -> Result<f64, String> {
    if (bbox.lon_min..=bbox.lon_max).contains(&lon) {
        Ok(lon)
    } else {
        Err(format!("longitude must be between {} and {}", bbox.lon_min, bbox.lon_max))
    }
}

/// Severity names are case-insensitive; the result must be in the model's vocabulary.
pub(crate) fn check_severity(value: &str, model: &HospitalModel) -> Result<String, String> {
    let canonical = Severity::from_str(value)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| value.trim().to_string());
    in_vocabulary(canonical, model.severity_encoder().classes())
}

pub(crate) fn check_condition(value: &str, model: &HospitalModel) -> Result<String, String> {
    in_vocabulary(value.trim().to_string(), model.condition_encoder().classes())
}

fn in_vocabulary(value: String, classes: &[String]) -> Result<String, String> {
    if classes.contains(&value) {
        Ok(value)
    } else {
        Err(format!("expected one of: {}", classes.join(", ")))
    }
}

fn parse_number(raw: &str) -> Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| format!("{:?} is not a number", raw.trim()))
}

/// Ask until `check` accepts the answer. End of input is an error.
fn prompt<R: BufRead, W: Write, T>(
    input: &mut R,
    output: &mut W,
    label: &str,
    check: impl Fn(&str) -> Result<T, String>,
) -> Result<T> {
    loop {
        write!(output, "{label}: ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("input closed before {label} was given");
        }
        match check(&line) {
            Ok(value) => return Ok(value),
            Err(message) => writeln!(output, "Invalid input: {message}")?,
        }
    }
}

/// Use flag values when valid, prompting for anything missing or rejected.
pub(crate) fn read_patient<R: BufRead, W: Write>(
    args_lat: Option<f64>,
    args_lon: Option<f64>,
    args_severity: Option<&str>,
    args_condition: Option<&str>,
    model: &HospitalModel,
    input: &mut R,
    output: &mut W,
) -> Result<PatientInput> {
    let bbox = MARIKINA_BBOX;
    let lat = match args_lat.map(|v| check_latitude(v, &bbox)) {
        Some(Ok(lat)) => lat,
        other => {
            if let Some(Err(message)) = other {
                writeln!(output, "Invalid input: {message}")?;
            }
            prompt(input, output, "Latitude", |raw| {
                check_latitude(parse_number(raw)?, &bbox)
            })?
        }
    };
    let lon = match args_lon.map(|v| check_longitude(v, &bbox)) {
        Some(Ok(lon)) => lon,
        other => {
            if let Some(Err(message)) = other {
                writeln!(output, "Invalid input: {message}")?;
            }
            prompt(input, output, "Longitude", |raw| {
                check_longitude(parse_number(raw)?, &bbox)
            })?
        }
    };
    let severity = match args_severity.map(|v| check_severity(v, model)) {
        Some(Ok(severity)) => severity,
        other => {
            if let Some(Err(message)) = other {
                writeln!(output, "Invalid input: {message}")?;
            }
            prompt(input, output, "Severity", |raw| check_severity(raw, model))?
        }
    };
    let condition = match args_condition.map(|v| check_condition(v, model)) {
        Some(Ok(condition)) => condition,
        other => {
            if let Some(Err(message)) = other {
                writeln!(output, "Invalid input: {message}")?;
            }
            prompt(input, output, "Condition", |raw| check_condition(raw, model))?
        }
    };
    Ok(PatientInput {
        location: GeoPoint::new(lat, lon),
        severity,
        condition,
    })
}

pub(crate) fn run(args: &RecommendArgs) -> Result<()> {
    let model = load_model(&args.model)
        .with_context(|| format!("loading model from {}", args.model.display()))?;
    let (bases, hospitals) = args.roster.load()?;
    let geo = match args.routing.kind()? {
        Some(kind) => GeoDistance::from_kind(&kind, args.speed_kmh),
        None => GeoDistance::haversine(args.speed_kmh),
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let patient = read_patient(
        args.lat,
        args.lon,
        args.severity.as_deref(),
        args.condition.as_deref(),
        &model,
        &mut input,
        &mut output,
    )?;

    let recommender = HospitalRecommender::new(model, bases, hospitals, geo);
    let recommendation = recommender.recommend_for_location(
        patient.location,
        &patient.severity,
        &patient.condition,
    )?;
    let features = &recommendation.features;
    let hospital = recommendation.hospital;

    println!();
    println!(
        "Recommended hospital: {} (ID {}, Level {})",
        hospital.name, hospital.id, hospital.level
    );
    println!(
        "Dispatching from {} ({:.2} km, {:.1} min)",
        features.base.base_name, features.to_patient.distance_km, features.to_patient.duration_min
    );
    println!(
        "Closest hospital {:.2} km away; estimated total response {:.1} min",
        features.distance_to_hospital_km(),
        features.response_time_min()
    );

    if let Some(path) = &args.handoff {
        let handoff = RouteHandoff::new(
            patient.location,
            &patient.severity,
            &patient.condition,
            &recommendation,
        );
        export_route_handoff(&handoff, path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Route handoff written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ems_core::recommender::{ForestConfig, RandomForest, TrainingExample};
    use std::io::Cursor;

    fn model() -> HospitalModel {
        let examples: Vec<TrainingExample> = [("low", "Fever", 1), ("high", "Stroke", 2)]
            .iter()
            .enumerate()
            .map(|(i, (severity, condition, id))| TrainingExample {
                location: GeoPoint::new(14.62 + 0.02 * i as f64, 121.1),
                severity: severity.to_string(),
                condition: condition.to_string(),
                distance_to_hospital_km: 1.0,
                response_time_min: 20.0,
                hospital_id: *id,
            })
            .collect();
        let forest = RandomForest::new(ForestConfig {
            n_estimators: 3,
            ..Default::default()
        });
        HospitalModel::fit(&examples, forest).unwrap()
    }

    #[test]
    fn reprompts_until_every_field_is_valid() {
        let model = model();
        let mut input = Cursor::new("abc\n14.9\n14.63\n121.10\nsevere\nHIGH\nsprain\nStroke\n");
        let mut output = Vec::new();

        let patient =
            read_patient(None, None, None, None, &model, &mut input, &mut output).unwrap();

        assert_eq!(patient.location, GeoPoint::new(14.63, 121.10));
        assert_eq!(patient.severity, "high");
        assert_eq!(patient.condition, "Stroke");
        let transcript = String::from_utf8(output).unwrap();
        assert_eq!(transcript.matches("Invalid input").count(), 4);
    }

    #[test]
    fn valid_flags_skip_prompts() {
        let model = model();
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        let patient = read_patient(
            Some(14.65),
            Some(121.08),
            Some("Low"),
            Some("Fever"),
            &model,
            &mut input,
            &mut output,
        )
        .unwrap();
        assert_eq!(patient.severity, "low");
        assert!(output.is_empty());
    }

    #[test]
    fn closed_input_is_an_error() {
        let model = model();
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        let result = read_patient(Some(14.0), None, None, None, &model, &mut input, &mut output);
        assert!(result.is_err());
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(check_latitude(14.60, &MARIKINA_BBOX).is_ok());
        assert!(check_latitude(14.68, &MARIKINA_BBOX).is_ok());
        assert!(check_longitude(121.131, &MARIKINA_BBOX).is_err());
    }
}

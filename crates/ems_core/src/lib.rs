pub mod clock;
pub mod fleet;
pub mod geo;
pub mod hospital;
pub mod incident;
pub mod recommender;
pub mod routing;
pub mod runner;
pub mod scenario;
pub mod simulation;
pub mod telemetry;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

//! Pluggable route providers and the [`GeoDistance`] facade used by the simulator.
//!
//! Implementations, selectable via [`RouteProviderKind`]:
//!
//! - **`HaversineRouteProvider`**: great-circle distance at a constant average speed. Never fails.
//! - **`OpenRouteServiceProvider`** (feature `ors`): driving distance/duration from an
//!   OpenRouteService HTTP endpoint.
//! - **`PrecomputedRouteProvider`** (feature `precomputed`): route table loaded from disk.
//!
//! Live providers are wrapped in [`CachedRouteProvider`] and [`ThrottledRouteProvider`].
//! [`GeoDistance`] falls back to the haversine estimate whenever the provider fails,
//! so a routing outage never interrupts a simulation run.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::warn;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{haversine_km, travel_minutes, GeoPoint, DEFAULT_AVERAGE_SPEED_KMH};

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Minimum delay between consecutive calls to a live routing endpoint.
pub const DEFAULT_MIN_CALL_INTERVAL: Duration = Duration::from_millis(100);

/// Request timeout for live routing endpoints.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One driving leg between two points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub distance_km: f64,
    pub duration_min: f64,
}

#[derive(Debug, Error)]
pub enum RoutingError {
    /// Provider failed, timed out or returned an unusable payload.
    #[error("routing provider unavailable: {0}")]
    Unavailable(String),
}

/// Which routing backend to use.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum RouteProviderKind {
    /// Haversine estimate only, no external dependencies.
    #[default]
    Haversine,
    /// OpenRouteService directions endpoint (e.g. `"https://api.openrouteservice.org"`).
    #[cfg(feature = "ors")]
    OpenRouteService { endpoint: String, api_key: String },
    /// Pre-computed route table loaded from a binary file at startup.
    #[cfg(feature = "precomputed")]
    Precomputed { path: String },
}

/// Trait for routing backends.
pub trait RouteProvider: Send + Sync {
    fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteLeg, RoutingError>;
}

// ---------------------------------------------------------------------------
// Haversine provider (always available)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct HaversineRouteProvider {
    pub average_speed_kmh: f64,
}

impl Default for HaversineRouteProvider {
    fn default() -> Self {
        Self {
            average_speed_kmh: DEFAULT_AVERAGE_SPEED_KMH,
        }
    }
}

impl RouteProvider for HaversineRouteProvider {
    fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteLeg, RoutingError> {
        let distance_km = haversine_km(from, to);
        Ok(RouteLeg {
            distance_km,
            duration_min: travel_minutes(distance_km, self.average_speed_kmh),
        })
    }
}

// ---------------------------------------------------------------------------
// OpenRouteService provider (behind `ors` feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "ors")]
pub mod ors {
    use super::*;
    use reqwest::blocking::Client;
    use reqwest::Url;

    /// Routes via the OpenRouteService `driving-car` directions endpoint.
    pub struct OpenRouteServiceProvider {
        client: Client,
        endpoint: String,
        api_key: String,
    }

    impl OpenRouteServiceProvider {
        pub fn new(endpoint: &str, api_key: &str) -> Result<Self, RoutingError> {
            let client = Client::builder()
                .timeout(DEFAULT_REQUEST_TIMEOUT)
                .build()
                .map_err(|err| RoutingError::Unavailable(format!("http client: {err}")))?;
            Ok(Self {
                client,
                endpoint: endpoint.trim_end_matches('/').to_string(),
                api_key: api_key.to_string(),
            })
        }
    }

    /// Minimal GeoJSON directions response.
    #[derive(Deserialize)]
    struct DirectionsResponse {
        features: Vec<DirectionsFeature>,
    }

    #[derive(Deserialize)]
    struct DirectionsFeature {
        properties: DirectionsProperties,
    }

    #[derive(Deserialize)]
    struct DirectionsProperties {
        summary: DirectionsSummary,
    }

    #[derive(Deserialize)]
    struct DirectionsSummary {
        #[serde(default)]
        distance: f64, // metres
        #[serde(default)]
        duration: f64, // seconds
    }

    impl RouteProvider for OpenRouteServiceProvider {
        fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteLeg, RoutingError> {
            let base = format!("{}/v2/directions/driving-car", self.endpoint);
            let mut url = Url::parse(&base)
                .map_err(|err| RoutingError::Unavailable(format!("bad endpoint URL: {err}")))?;
            // ORS expects lon,lat ordering.
            url.query_pairs_mut()
                .append_pair("api_key", &self.api_key)
                .append_pair("start", &format!("{},{}", from.lon, from.lat))
                .append_pair("end", &format!("{},{}", to.lon, to.lat));

            let response = self
                .client
                .get(url)
                .send()
                .map_err(|err| RoutingError::Unavailable(err.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(RoutingError::Unavailable(format!("HTTP {status}")));
            }

            let parsed: DirectionsResponse = response
                .json()
                .map_err(|err| RoutingError::Unavailable(format!("malformed payload: {err}")))?;
            let summary = parsed
                .features
                .into_iter()
                .next()
                .map(|feature| feature.properties.summary)
                .ok_or_else(|| RoutingError::Unavailable("no route in response".to_string()))?;

            Ok(RouteLeg {
                distance_km: summary.distance / 1000.0,
                duration_min: summary.duration / 60.0,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Pre-computed provider (behind `precomputed` feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "precomputed")]
pub mod precomputed {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    /// Coordinates quantized to 1e-5 degrees (~1 m) so they can be hashed.
    #[derive(Clone, Copy, Hash, Eq, PartialEq, Debug, Serialize, Deserialize)]
    pub struct CoordPair(pub [i64; 4]);

    impl CoordPair {
        pub fn new(from: GeoPoint, to: GeoPoint) -> Self {
            let q = |v: f64| (v * 1e5).round() as i64;
            Self([q(from.lat), q(from.lon), q(to.lat), q(to.lon)])
        }
    }

    pub struct PrecomputedRouteProvider {
        table: HashMap<CoordPair, RouteLeg>,
    }

    impl PrecomputedRouteProvider {
        /// Load from a bincode-serialized file.
        pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
            let data = fs::read(path)?;
            let table: HashMap<CoordPair, RouteLeg> = bincode::deserialize(&data)?;
            Ok(Self { table })
        }

        pub fn from_table(table: HashMap<CoordPair, RouteLeg>) -> Self {
            Self { table }
        }

        pub fn save_to_file(
            table: &HashMap<CoordPair, RouteLeg>,
            path: &str,
        ) -> Result<(), Box<dyn std::error::Error>> {
            let data = bincode::serialize(table)?;
            fs::write(path, data)?;
            Ok(())
        }
    }

    impl RouteProvider for PrecomputedRouteProvider {
        fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteLeg, RoutingError> {
            self.table
                .get(&CoordPair::new(from, to))
                .copied()
                .ok_or_else(|| RoutingError::Unavailable("pair not in route table".to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Caching and throttling wrappers
// ---------------------------------------------------------------------------

fn cache_key(from: GeoPoint, to: GeoPoint) -> [u64; 4] {
    [
        from.lat.to_bits(),
        from.lon.to_bits(),
        to.lat.to_bits(),
        to.lon.to_bits(),
    ]
}

/// LRU-cached wrapper around any [`RouteProvider`].
///
/// Cache key is the exact (from, to) coordinate pair (directional). Failures are
/// not cached, so a transient outage is retried on the next lookup.
pub struct CachedRouteProvider {
    inner: Box<dyn RouteProvider>,
    cache: Mutex<LruCache<[u64; 4], RouteLeg>>,
}

impl CachedRouteProvider {
    pub fn new(inner: Box<dyn RouteProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl RouteProvider for CachedRouteProvider {
    fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteLeg, RoutingError> {
        let key = cache_key(from, to);

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&key) {
                return Ok(*cached);
            }
        }

        let leg = self.inner.route(from, to)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, leg);
        }
        Ok(leg)
    }
}

/// Enforces a minimum delay between consecutive calls to the inner provider.
pub struct ThrottledRouteProvider {
    inner: Box<dyn RouteProvider>,
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl ThrottledRouteProvider {
    pub fn new(inner: Box<dyn RouteProvider>, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_call: Mutex::new(None),
        }
    }
}

impl RouteProvider for ThrottledRouteProvider {
    fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteLeg, RoutingError> {
        // Holding the lock across the call serializes requests to the endpoint.
        let mut last_call = self
            .last_call
            .lock()
            .map_err(|_| RoutingError::Unavailable("throttle lock poisoned".to_string()))?;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        let result = self.inner.route(from, to);
        *last_call = Some(Instant::now());
        result
    }
}

// ---------------------------------------------------------------------------
// Factory: build a provider from RouteProviderKind
// ---------------------------------------------------------------------------

/// Default route cache capacity for live and pre-computed providers.
#[cfg(any(feature = "ors", feature = "precomputed"))]
const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 20_000;

/// Construct the road-network provider for a [`RouteProviderKind`].
///
/// Returns `None` for `Haversine`: [`GeoDistance`] estimates directly in that case.
/// A provider that cannot be constructed is reported and also yields `None`.
pub fn build_route_provider(kind: &RouteProviderKind) -> Option<Box<dyn RouteProvider>> {
    match kind {
        RouteProviderKind::Haversine => None,

        #[cfg(feature = "ors")]
        RouteProviderKind::OpenRouteService { endpoint, api_key } => {
            match ors::OpenRouteServiceProvider::new(endpoint, api_key) {
                Ok(provider) => {
                    let throttled =
                        ThrottledRouteProvider::new(Box::new(provider), DEFAULT_MIN_CALL_INTERVAL);
                    Some(Box::new(CachedRouteProvider::new(
                        Box::new(throttled),
                        DEFAULT_ROUTE_CACHE_CAPACITY,
                    )))
                }
                Err(err) => {
                    warn!(
                        "OpenRouteService provider unavailable ({err}); using haversine estimates"
                    );
                    None
                }
            }
        }

        #[cfg(feature = "precomputed")]
        RouteProviderKind::Precomputed { path } => {
            match precomputed::PrecomputedRouteProvider::from_file(path) {
                Ok(provider) => Some(Box::new(CachedRouteProvider::new(
                    Box::new(provider),
                    DEFAULT_ROUTE_CACHE_CAPACITY,
                ))),
                Err(e) => {
                    warn!(
                        "failed to load pre-computed route table from '{}': {}; using haversine estimates",
                        path, e
                    );
                    None
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// GeoDistance facade
// ---------------------------------------------------------------------------

/// Distance/duration between two points and whether it came from the estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TravelEstimate {
    pub distance_km: f64,
    pub duration_min: f64,
    /// `true` when the value is the haversine estimate rather than a road route.
    pub is_estimated: bool,
}

/// Distance/time oracle with an optional road-network provider.
pub struct GeoDistance {
    provider: Option<Box<dyn RouteProvider>>,
    estimator: HaversineRouteProvider,
}

impl GeoDistance {
    /// Haversine-only estimator at the given average speed.
    pub fn haversine(average_speed_kmh: f64) -> Self {
        Self {
            provider: None,
            estimator: HaversineRouteProvider { average_speed_kmh },
        }
    }

    pub fn with_provider(provider: Box<dyn RouteProvider>, average_speed_kmh: f64) -> Self {
        Self {
            provider: Some(provider),
            estimator: HaversineRouteProvider { average_speed_kmh },
        }
    }

    pub fn from_kind(kind: &RouteProviderKind, average_speed_kmh: f64) -> Self {
        Self {
            provider: build_route_provider(kind),
            estimator: HaversineRouteProvider { average_speed_kmh },
        }
    }

    pub fn average_speed_kmh(&self) -> f64 {
        self.estimator.average_speed_kmh
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Haversine estimate, ignoring any configured provider.
    pub fn estimate(&self, a: GeoPoint, b: GeoPoint) -> TravelEstimate {
        let distance_km = haversine_km(a, b);
        TravelEstimate {
            distance_km,
            duration_min: travel_minutes(distance_km, self.estimator.average_speed_kmh),
            is_estimated: true,
        }
    }

    pub fn distance_and_time(&self, a: GeoPoint, b: GeoPoint) -> TravelEstimate {
        let Some(provider) = self.provider.as_ref() else {
            return self.estimate(a, b);
        };
        match provider.route(a, b) {
            Ok(leg) => TravelEstimate {
                distance_km: leg.distance_km,
                duration_min: leg.duration_min,
                is_estimated: false,
            },
            Err(err) => {
                warn!(
                    "route ({:.6},{:.6}) -> ({:.6},{:.6}) falling back to haversine: {}",
                    a.lat, a.lon, b.lat, b.lon, err
                );
                self.estimate(a, b)
            }
        }
    }
}

impl Default for GeoDistance {
    fn default() -> Self {
        Self::haversine(DEFAULT_AVERAGE_SPEED_KMH)
    }
}

impl std::fmt::Debug for GeoDistance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoDistance")
            .field("has_provider", &self.provider.is_some())
            .field("average_speed_kmh", &self.estimator.average_speed_kmh)
            .finish()
    }
}

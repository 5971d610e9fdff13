//! Fleet registry: the single owner of EMS unit status and availability.
//!
//! Units move between two states:
//!
//! ```text
//! Available --dispatch(busy_until)--> Dispatched --release(available_at)--> Available
//! ```
//!
//! All mutation goes through [`FleetState::dispatch`] and [`FleetState::release`],
//! which is where the "never double-booked" and "availability only moves forward"
//! invariants are enforced.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::SimTime;
use crate::geo::GeoPoint;

pub type UnitId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Ambulance,
    Rescue,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Ambulance => f.write_str("Ambulance"),
            UnitKind::Rescue => f.write_str("Rescue"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Available,
    Dispatched { busy_until: SimTime },
}

impl UnitStatus {
    pub fn label(&self) -> &'static str {
        match self {
            UnitStatus::Available => "Available",
            UnitStatus::Dispatched { .. } => "Dispatched",
        }
    }
}

/// A station that houses EMS units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmsBase {
    pub base_id: u32,
    pub base_name: String,
    pub location: GeoPoint,
    /// Ambulances stationed here; every base also gets one rescue vehicle.
    pub ambulances: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmsUnit {
    pub unit_id: UnitId,
    pub kind: UnitKind,
    pub base_id: u32,
    pub base_name: String,
    pub base_location: GeoPoint,
    status: UnitStatus,
    next_available_at: SimTime,
}

impl EmsUnit {
    pub fn new(unit_id: UnitId, kind: UnitKind, base: &EmsBase, available_at: SimTime) -> Self {
        Self {
            unit_id,
            kind,
            base_id: base.base_id,
            base_name: base.base_name.clone(),
            base_location: base.location,
            status: UnitStatus::Available,
            next_available_at: available_at,
        }
    }

    pub fn status(&self) -> UnitStatus {
        self.status
    }

    pub fn next_available_at(&self) -> SimTime {
        self.next_available_at
    }

    fn is_free_at(&self, at: SimTime) -> bool {
        self.status == UnitStatus::Available && self.next_available_at <= at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FleetError {
    #[error("invalid transition for unit {unit_id}: {reason}")]
    InvalidTransition {
        unit_id: UnitId,
        reason: &'static str,
    },
}

fn invalid(unit_id: UnitId, reason: &'static str) -> FleetError {
    FleetError::InvalidTransition { unit_id, reason }
}

/// Flat view of a unit for roster exports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterRow {
    pub unit_id: UnitId,
    pub kind: UnitKind,
    pub base_id: u32,
    pub base_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: &'static str,
    pub next_available_at_ms: SimTime,
}

/// Owned mapping from unit id to unit record.
#[derive(Debug, Clone, Default)]
pub struct FleetState {
    units: BTreeMap<UnitId, EmsUnit>,
}

impl FleetState {
    pub fn new(units: impl IntoIterator<Item = EmsUnit>) -> Self {
        Self {
            units: units.into_iter().map(|u| (u.unit_id, u)).collect(),
        }
    }

    /// Seed the roster: each base's ambulances followed by one rescue, ids from 1.
    pub fn from_bases(bases: &[EmsBase], start: SimTime) -> Self {
        let mut units = Vec::new();
        let mut next_id: UnitId = 1;
        for base in bases {
            for _ in 0..base.ambulances {
                units.push(EmsUnit::new(next_id, UnitKind::Ambulance, base, start));
                next_id += 1;
            }
            units.push(EmsUnit::new(next_id, UnitKind::Rescue, base, start));
            next_id += 1;
        }
        Self::new(units)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn unit(&self, unit_id: UnitId) -> Option<&EmsUnit> {
        self.units.get(&unit_id)
    }

    /// Units in id order.
    pub fn units(&self) -> impl Iterator<Item = &EmsUnit> {
        self.units.values()
    }

    pub fn roster(&self) -> Vec<RosterRow> {
        self.units
            .values()
            .map(|u| RosterRow {
                unit_id: u.unit_id,
                kind: u.kind,
                base_id: u.base_id,
                base_name: u.base_name.clone(),
                latitude: u.base_location.lat,
                longitude: u.base_location.lon,
                status: u.status.label(),
                next_available_at_ms: u.next_available_at,
            })
            .collect()
    }

    /// Units of `kind` that are Available and free no later than `at`.
    pub fn available_units(&self, kind: UnitKind, at: SimTime) -> BTreeSet<UnitId> {
        self.units
            .values()
            .filter(|u| u.kind == kind && u.is_free_at(at))
            .map(|u| u.unit_id)
            .collect()
    }

    /// Earliest `next_available_at` among units of `kind`, or `None` if there are none.
    pub fn earliest_available(&self, kind: UnitKind) -> Option<SimTime> {
        self.units
            .values()
            .filter(|u| u.kind == kind)
            .map(|u| u.next_available_at)
            .min()
    }

    pub fn dispatch(&mut self, unit_id: UnitId, busy_until: SimTime) -> Result<(), FleetError> {
        let unit = self
            .units
            .get_mut(&unit_id)
            .ok_or_else(|| invalid(unit_id, "unknown unit"))?;
        match unit.status {
            UnitStatus::Dispatched { .. } => Err(invalid(unit_id, "unit is already dispatched")),
            UnitStatus::Available => {
                unit.status = UnitStatus::Dispatched { busy_until };
                Ok(())
            }
        }
    }

    pub fn release(&mut self, unit_id: UnitId, available_at: SimTime) -> Result<(), FleetError> {
        let unit = self
            .units
            .get_mut(&unit_id)
            .ok_or_else(|| invalid(unit_id, "unknown unit"))?;
        match unit.status {
            UnitStatus::Available => Err(invalid(unit_id, "unit is not dispatched")),
            UnitStatus::Dispatched { .. } if available_at < unit.next_available_at => {
                Err(invalid(unit_id, "availability would move backwards"))
            }
            UnitStatus::Dispatched { .. } => {
                unit.status = UnitStatus::Available;
                unit.next_available_at = available_at;
                Ok(())
            }
        }
    }
}

//! In-memory simulation store
//!
//! Holds every simulation, version and version-owned record, assembles
//! projection snapshots, and keeps the version history consistent:
//! version numbers run 1..=n without gaps and exactly one version per
//! simulation is flagged latest.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::data::{
    Allocation, AllocationRecord, AllocationType, Frequency, Insurance, Movement, MovementType, Simulation,
    SimulationVersion,
};
use crate::errors::{PlannerError, Result};
use crate::projection::{latest_records_as_of, InitialAllocation, SimulationVersionSnapshot};

/// Simulation that mirrors the user's current situation; its name and
/// parameters are fixed
pub const PROTECTED_SIMULATION_NAME: &str = "Situação Atual";

/// Anything able to hand the projection runner a version snapshot
pub trait SnapshotSource {
    /// Fails with `NotFound` when the version does not exist
    fn load_snapshot(&self, version_id: u32) -> Result<SimulationVersionSnapshot>;
}

/// Fields of a version that may be changed after creation
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionUpdate {
    /// Renames the owning simulation
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub real_interest_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMovement {
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub description: String,
    pub value: f64,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInsurance {
    pub name: String,
    pub start_date: NaiveDate,
    pub duration_months: u32,
    pub monthly_premium: f64,
    pub insured_value: f64,
}

/// New allocation together with its first valuation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAllocation {
    pub name: String,
    #[serde(rename = "type")]
    pub allocation_type: AllocationType,
    pub value: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub initial_payment: Option<f64>,
    #[serde(default)]
    pub installments: Option<u32>,
    #[serde(default)]
    pub interest_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAllocationRecord {
    pub simulation_version_id: u32,
    pub value: f64,
    pub date: NaiveDate,
}

/// Optional replacements for a movement's fields
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementUpdate {
    #[serde(default, rename = "type")]
    pub movement_type: Option<MovementType>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// `Some(None)` makes the movement open-ended
    #[serde(default, deserialize_with = "deserialize_some")]
    pub end_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub duration_months: Option<u32>,
    #[serde(default)]
    pub monthly_premium: Option<f64>,
    #[serde(default)]
    pub insured_value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub allocation_type: Option<AllocationType>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRecordUpdate {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Distinguishes an explicit `null` from a missing field
fn deserialize_some<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Complete planner data set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStore {
    #[serde(default)]
    pub simulations: Vec<Simulation>,
    #[serde(default)]
    pub versions: Vec<SimulationVersion>,
    #[serde(default)]
    pub movements: Vec<Movement>,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
    #[serde(default)]
    pub allocation_records: Vec<AllocationRecord>,
    #[serde(default)]
    pub insurances: Vec<Insurance>,
}

impl SimulationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn simulation(&self, id: u32) -> Result<&Simulation> {
        self.simulations
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| PlannerError::not_found("Simulation", id))
    }

    pub fn version(&self, id: u32) -> Result<&SimulationVersion> {
        self.versions
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| PlannerError::not_found("Simulation version", id))
    }

    pub fn allocation(&self, id: u32) -> Result<&Allocation> {
        self.allocations
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| PlannerError::not_found("Allocation", id))
    }

    pub fn find_simulation_by_name(&self, name: &str) -> Option<&Simulation> {
        self.simulations.iter().find(|s| s.name == name)
    }

    /// Versions of one simulation, oldest first
    pub fn versions_of(&self, simulation_id: u32) -> Vec<&SimulationVersion> {
        let mut versions: Vec<_> = self.versions.iter().filter(|v| v.simulation_id == simulation_id).collect();
        versions.sort_by_key(|v| v.version);
        versions
    }

    /// Latest version of every simulation
    pub fn latest_versions(&self) -> Vec<&SimulationVersion> {
        self.versions.iter().filter(|v| v.is_latest).collect()
    }

    /// Assemble the projection input for a version.
    ///
    /// Every allocation with at least one record under this version
    /// contributes its most recent record (from any version) dated on or
    /// before the start date. Allocations with no such record contribute
    /// nothing.
    pub fn snapshot(&self, version_id: u32) -> Result<SimulationVersionSnapshot> {
        let version = self.version(version_id)?;

        let relevant: HashSet<u32> = self
            .allocation_records
            .iter()
            .filter(|r| r.simulation_version_id == version_id)
            .map(|r| r.allocation_id)
            .collect();

        let types: BTreeMap<u32, AllocationType> =
            self.allocations.iter().map(|a| (a.id, a.allocation_type)).collect();

        let candidates = self.allocation_records.iter().filter(|r| relevant.contains(&r.allocation_id));
        let initial_allocations = latest_records_as_of(candidates, version.start_date)
            .into_iter()
            .map(|record| {
                let allocation_type = types
                    .get(&record.allocation_id)
                    .copied()
                    .ok_or_else(|| PlannerError::not_found("Allocation", record.allocation_id))?;
                Ok(InitialAllocation::from_record(record, allocation_type))
            })
            .collect::<Result<Vec<_>>>()?;

        let movements = self
            .movements
            .iter()
            .filter(|m| m.simulation_version_id == version_id)
            .cloned()
            .collect();
        let insurances = self
            .insurances
            .iter()
            .filter(|i| i.simulation_version_id == version_id)
            .cloned()
            .collect();

        let snapshot = SimulationVersionSnapshot::new(version, movements, insurances, initial_allocations);
        debug!(
            "Assembled snapshot for version {}: {} movements, {} policies, {} opening allocations",
            version_id,
            snapshot.movements.len(),
            snapshot.insurances.len(),
            snapshot.initial_allocations.len(),
        );
        Ok(snapshot)
    }

    /// Create a simulation with an empty version 1
    pub fn create_simulation(&mut self, name: &str, start_date: NaiveDate, real_interest_rate: f64) -> Result<SimulationVersion> {
        require_name(name)?;
        require_rate(real_interest_rate)?;
        self.require_unused_name(name)?;

        let simulation = Simulation { id: next_id(self.simulations.iter().map(|s| s.id)), name: name.to_string() };
        let version = SimulationVersion {
            id: next_id(self.versions.iter().map(|v| v.id)),
            simulation_id: simulation.id,
            version: 1,
            is_latest: true,
            start_date,
            real_interest_rate,
        };

        info!("Created simulation '{}' ({})", simulation.name, simulation.id);
        self.simulations.push(simulation);
        self.versions.push(version.clone());
        Ok(version)
    }

    /// Append a new latest version copying the current latest one
    pub fn create_new_version(&mut self, simulation_id: u32) -> Result<SimulationVersion> {
        self.simulation(simulation_id)?;
        let latest = self
            .versions
            .iter()
            .find(|v| v.simulation_id == simulation_id && v.is_latest)
            .cloned()
            .ok_or_else(|| PlannerError::invalid(format!("simulation {} has no latest version", simulation_id)))?;

        let new_version = SimulationVersion {
            id: next_id(self.versions.iter().map(|v| v.id)),
            version: latest.version + 1,
            is_latest: true,
            ..latest.clone()
        };

        for version in self.versions.iter_mut().filter(|v| v.simulation_id == simulation_id) {
            version.is_latest = false;
        }
        self.versions.push(new_version.clone());
        self.copy_version_contents(latest.id, new_version.id);

        info!(
            "Simulation {}: version {} created from version {}",
            simulation_id, new_version.version, latest.version
        );
        Ok(new_version)
    }

    /// Start a new simulation whose version 1 copies an existing version
    pub fn create_from_version(&mut self, source_version_id: u32, new_name: &str) -> Result<SimulationVersion> {
        require_name(new_name)?;
        self.require_unused_name(new_name)?;
        let source = self.version(source_version_id)?.clone();

        let simulation = Simulation { id: next_id(self.simulations.iter().map(|s| s.id)), name: new_name.to_string() };
        let version = SimulationVersion {
            id: next_id(self.versions.iter().map(|v| v.id)),
            simulation_id: simulation.id,
            version: 1,
            is_latest: true,
            start_date: source.start_date,
            real_interest_rate: source.real_interest_rate,
        };

        self.simulations.push(simulation);
        self.versions.push(version.clone());
        self.copy_version_contents(source.id, version.id);

        info!("Created simulation '{}' from version {}", new_name, source_version_id);
        Ok(version)
    }

    /// Change a version's parameters and optionally rename its simulation
    pub fn update_version(&mut self, version_id: u32, update: VersionUpdate) -> Result<SimulationVersion> {
        let version = self.version(version_id)?.clone();
        let simulation = self.simulation(version.simulation_id)?.clone();

        if simulation.name == PROTECTED_SIMULATION_NAME {
            return Err(PlannerError::Conflict(format!(
                "the name and date of \"{}\" cannot be changed",
                PROTECTED_SIMULATION_NAME
            )));
        }
        if let Some(rate) = update.real_interest_rate {
            require_rate(rate)?;
        }

        if let Some(name) = update.name.as_deref().filter(|n| *n != simulation.name) {
            require_name(name)?;
            self.require_unused_name(name)?;
            if let Some(s) = self.simulations.iter_mut().find(|s| s.id == simulation.id) {
                s.name = name.to_string();
            }
        }

        let stored = self
            .versions
            .iter_mut()
            .find(|v| v.id == version_id)
            .ok_or_else(|| PlannerError::not_found("Simulation version", version_id))?;
        if let Some(start_date) = update.start_date {
            stored.start_date = start_date;
        }
        if let Some(rate) = update.real_interest_rate {
            stored.real_interest_rate = rate;
        }
        Ok(stored.clone())
    }

    pub fn add_movement(&mut self, version_id: u32, new: NewMovement) -> Result<Movement> {
        self.version(version_id)?;

        let movement = Movement {
            id: next_id(self.movements.iter().map(|m| m.id)),
            simulation_version_id: version_id,
            movement_type: new.movement_type,
            description: new.description,
            value: new.value,
            frequency: new.frequency,
            start_date: new.start_date,
            end_date: new.end_date,
        };
        validate_movement(&movement)?;
        self.movements.push(movement.clone());
        Ok(movement)
    }

    pub fn add_insurance(&mut self, version_id: u32, new: NewInsurance) -> Result<Insurance> {
        self.version(version_id)?;

        let insurance = Insurance {
            id: next_id(self.insurances.iter().map(|i| i.id)),
            simulation_version_id: version_id,
            name: new.name,
            start_date: new.start_date,
            duration_months: new.duration_months,
            monthly_premium: new.monthly_premium,
            insured_value: new.insured_value,
        };
        validate_insurance(&insurance)?;
        self.insurances.push(insurance.clone());
        Ok(insurance)
    }

    /// Create an allocation and its first record under `version_id`
    pub fn add_allocation(&mut self, version_id: u32, new: NewAllocation) -> Result<Allocation> {
        self.version(version_id)?;
        require_name(&new.name)?;
        require_positive("value", new.value)?;
        if new.installments == Some(0) {
            return Err(PlannerError::invalid("installments must be positive"));
        }
        if let Some(rate) = new.interest_rate {
            require_positive("interestRate", rate)?;
        }

        let allocation = Allocation {
            id: next_id(self.allocations.iter().map(|a| a.id)),
            name: new.name,
            allocation_type: new.allocation_type,
        };
        let record = AllocationRecord {
            id: next_id(self.allocation_records.iter().map(|r| r.id)),
            allocation_id: allocation.id,
            simulation_version_id: version_id,
            value: new.value,
            date: new.date,
            initial_payment: new.initial_payment,
            installments: new.installments,
            interest_rate: new.interest_rate,
        };

        self.allocations.push(allocation.clone());
        self.allocation_records.push(record);
        Ok(allocation)
    }

    /// Record a new valuation of an existing allocation
    pub fn add_allocation_record(&mut self, allocation_id: u32, new: NewAllocationRecord) -> Result<AllocationRecord> {
        self.allocation(allocation_id)?;
        self.version(new.simulation_version_id)?;
        require_positive("value", new.value)?;

        let record = AllocationRecord {
            id: next_id(self.allocation_records.iter().map(|r| r.id)),
            allocation_id,
            simulation_version_id: new.simulation_version_id,
            value: new.value,
            date: new.date,
            initial_payment: None,
            installments: None,
            interest_rate: None,
        };
        self.allocation_records.push(record.clone());
        Ok(record)
    }

    /// Movements of one version
    pub fn movements_of(&self, version_id: u32) -> Result<Vec<&Movement>> {
        self.version(version_id)?;
        Ok(self.movements.iter().filter(|m| m.simulation_version_id == version_id).collect())
    }

    /// Insurance policies of one version
    pub fn insurances_of(&self, version_id: u32) -> Result<Vec<&Insurance>> {
        self.version(version_id)?;
        Ok(self.insurances.iter().filter(|i| i.simulation_version_id == version_id).collect())
    }

    /// Allocation records of one version joined with their allocation
    pub fn allocation_records_of(&self, version_id: u32) -> Result<Vec<(&AllocationRecord, &Allocation)>> {
        self.version(version_id)?;
        self.allocation_records
            .iter()
            .filter(|r| r.simulation_version_id == version_id)
            .map(|r| Ok((r, self.allocation(r.allocation_id)?)))
            .collect()
    }

    /// Every allocation with all of its records, across versions
    pub fn allocations_with_records(&self) -> Vec<(&Allocation, Vec<&AllocationRecord>)> {
        self.allocations
            .iter()
            .map(|a| (a, self.allocation_records.iter().filter(|r| r.allocation_id == a.id).collect()))
            .collect()
    }

    pub fn update_movement(&mut self, id: u32, update: MovementUpdate) -> Result<Movement> {
        let stored = self
            .movements
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| PlannerError::not_found("Movement", id))?;

        let mut movement = stored.clone();
        if let Some(movement_type) = update.movement_type {
            movement.movement_type = movement_type;
        }
        if let Some(description) = update.description {
            movement.description = description;
        }
        if let Some(value) = update.value {
            movement.value = value;
        }
        if let Some(frequency) = update.frequency {
            movement.frequency = frequency;
        }
        if let Some(start_date) = update.start_date {
            movement.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            movement.end_date = end_date;
        }

        validate_movement(&movement)?;
        *stored = movement.clone();
        Ok(movement)
    }

    pub fn delete_movement(&mut self, id: u32) -> Result<Movement> {
        let index = self
            .movements
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| PlannerError::not_found("Movement", id))?;
        Ok(self.movements.remove(index))
    }

    pub fn update_insurance(&mut self, id: u32, update: InsuranceUpdate) -> Result<Insurance> {
        let stored = self
            .insurances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| PlannerError::not_found("Insurance", id))?;

        let mut insurance = stored.clone();
        if let Some(name) = update.name {
            insurance.name = name;
        }
        if let Some(start_date) = update.start_date {
            insurance.start_date = start_date;
        }
        if let Some(duration_months) = update.duration_months {
            insurance.duration_months = duration_months;
        }
        if let Some(monthly_premium) = update.monthly_premium {
            insurance.monthly_premium = monthly_premium;
        }
        if let Some(insured_value) = update.insured_value {
            insurance.insured_value = insured_value;
        }

        validate_insurance(&insurance)?;
        *stored = insurance.clone();
        Ok(insurance)
    }

    pub fn delete_insurance(&mut self, id: u32) -> Result<Insurance> {
        let index = self
            .insurances
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| PlannerError::not_found("Insurance", id))?;
        Ok(self.insurances.remove(index))
    }

    pub fn update_allocation(&mut self, id: u32, update: AllocationUpdate) -> Result<Allocation> {
        if let Some(name) = update.name.as_deref() {
            require_name(name)?;
        }
        let stored = self
            .allocations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| PlannerError::not_found("Allocation", id))?;

        if let Some(name) = update.name {
            stored.name = name;
        }
        if let Some(allocation_type) = update.allocation_type {
            stored.allocation_type = allocation_type;
        }
        Ok(stored.clone())
    }

    /// Remove an allocation together with all of its records, in every version
    pub fn delete_allocation(&mut self, id: u32) -> Result<Allocation> {
        let index = self
            .allocations
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| PlannerError::not_found("Allocation", id))?;

        let removed = self.allocations.remove(index);
        let before = self.allocation_records.len();
        self.allocation_records.retain(|r| r.allocation_id != id);
        debug!(
            "Deleted allocation {} and {} records",
            id,
            before - self.allocation_records.len()
        );
        Ok(removed)
    }

    /// Change a record's value or date; the opening valuation of any version may move
    pub fn update_allocation_record(&mut self, id: u32, update: AllocationRecordUpdate) -> Result<AllocationRecord> {
        if let Some(value) = update.value {
            require_positive("value", value)?;
        }
        let stored = self
            .allocation_records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PlannerError::not_found("Allocation record", id))?;

        if let Some(value) = update.value {
            stored.value = value;
        }
        if let Some(date) = update.date {
            stored.date = date;
        }
        Ok(stored.clone())
    }

    pub fn delete_allocation_record(&mut self, id: u32) -> Result<AllocationRecord> {
        let index = self
            .allocation_records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| PlannerError::not_found("Allocation record", id))?;
        Ok(self.allocation_records.remove(index))
    }

    /// Check every reference in the document points at an existing row
    pub fn check_references(&self) -> Result<()> {
        let simulation_ids: HashSet<u32> = self.simulations.iter().map(|s| s.id).collect();
        let version_ids: HashSet<u32> = self.versions.iter().map(|v| v.id).collect();
        let allocation_ids: HashSet<u32> = self.allocations.iter().map(|a| a.id).collect();

        let dangling = |kind: &str, id: u32, target: &str, target_id: u32| {
            PlannerError::invalid(format!("{} {} references missing {} {}", kind, id, target, target_id))
        };

        if let Some(v) = self.versions.iter().find(|v| !simulation_ids.contains(&v.simulation_id)) {
            return Err(dangling("version", v.id, "simulation", v.simulation_id));
        }
        if let Some(m) = self.movements.iter().find(|m| !version_ids.contains(&m.simulation_version_id)) {
            return Err(dangling("movement", m.id, "version", m.simulation_version_id));
        }
        if let Some(i) = self.insurances.iter().find(|i| !version_ids.contains(&i.simulation_version_id)) {
            return Err(dangling("insurance", i.id, "version", i.simulation_version_id));
        }
        for record in &self.allocation_records {
            if !version_ids.contains(&record.simulation_version_id) {
                return Err(dangling("allocation record", record.id, "version", record.simulation_version_id));
            }
            if !allocation_ids.contains(&record.allocation_id) {
                return Err(dangling("allocation record", record.id, "allocation", record.allocation_id));
            }
        }
        Ok(())
    }

    /// Check every simulation's versions run 1..=n and exactly one is latest
    pub fn check_version_history(&self) -> Result<()> {
        for simulation in &self.simulations {
            let versions = self.versions_of(simulation.id);
            if versions.is_empty() {
                continue;
            }

            let gapless = versions.iter().enumerate().all(|(i, v)| v.version == i as u32 + 1);
            if !gapless {
                return Err(PlannerError::invalid(format!(
                    "simulation {} version numbers are not a gapless sequence from 1",
                    simulation.id
                )));
            }

            let latest = versions.iter().filter(|v| v.is_latest).count();
            if latest != 1 {
                return Err(PlannerError::invalid(format!(
                    "simulation {} has {} latest versions",
                    simulation.id, latest
                )));
            }
        }
        Ok(())
    }

    fn require_unused_name(&self, name: &str) -> Result<()> {
        if self.find_simulation_by_name(name).is_some() {
            return Err(PlannerError::Conflict(format!("a simulation named \"{}\" already exists", name)));
        }
        Ok(())
    }

    /// Duplicate movements, allocation records and insurances of one version into another
    fn copy_version_contents(&mut self, from_version: u32, to_version: u32) {
        let mut movement_id = next_id(self.movements.iter().map(|m| m.id));
        let movements: Vec<Movement> = self
            .movements
            .iter()
            .filter(|m| m.simulation_version_id == from_version)
            .map(|m| {
                let copy = Movement { id: movement_id, simulation_version_id: to_version, ..m.clone() };
                movement_id += 1;
                copy
            })
            .collect();
        self.movements.extend(movements);

        let mut record_id = next_id(self.allocation_records.iter().map(|r| r.id));
        let records: Vec<AllocationRecord> = self
            .allocation_records
            .iter()
            .filter(|r| r.simulation_version_id == from_version)
            .map(|r| {
                let copy = AllocationRecord { id: record_id, simulation_version_id: to_version, ..r.clone() };
                record_id += 1;
                copy
            })
            .collect();
        self.allocation_records.extend(records);

        let mut insurance_id = next_id(self.insurances.iter().map(|i| i.id));
        let insurances: Vec<Insurance> = self
            .insurances
            .iter()
            .filter(|i| i.simulation_version_id == from_version)
            .map(|i| {
                let copy = Insurance { id: insurance_id, simulation_version_id: to_version, ..i.clone() };
                insurance_id += 1;
                copy
            })
            .collect();
        self.insurances.extend(insurances);
    }
}

impl SnapshotSource for SimulationStore {
    fn load_snapshot(&self, version_id: u32) -> Result<SimulationVersionSnapshot> {
        self.snapshot(version_id)
    }
}

fn next_id(ids: impl Iterator<Item = u32>) -> u32 {
    ids.max().map_or(1, |max| max + 1)
}

fn validate_movement(movement: &Movement) -> Result<()> {
    require_name(&movement.description)?;
    require_positive("value", movement.value)?;
    if let Some(end) = movement.end_date {
        if end < movement.start_date {
            return Err(PlannerError::invalid("movement end date is before its start date"));
        }
    }
    Ok(())
}

fn validate_insurance(insurance: &Insurance) -> Result<()> {
    require_name(&insurance.name)?;
    if insurance.duration_months == 0 {
        return Err(PlannerError::invalid("durationMonths must be positive"));
    }
    require_positive("monthlyPremium", insurance.monthly_premium)?;
    require_positive("insuredValue", insurance.insured_value)
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PlannerError::invalid("name must not be empty"));
    }
    Ok(())
}

fn require_positive(field: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(PlannerError::invalid(format!("{} must be positive, got {}", field, value)));
    }
    Ok(())
}

fn require_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || rate < -1.0 {
        return Err(PlannerError::invalid(format!("real interest rate {} is out of range", rate)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Store holding the seeded "Plano Original" plan
    fn seeded_store() -> (SimulationStore, SimulationVersion) {
        let mut store = SimulationStore::new();
        let version = store.create_simulation("Plano Original", date(2025, 1, 1), 0.04).unwrap();

        store
            .add_allocation(version.id, NewAllocation {
                name: "Conta Corrente".to_string(),
                allocation_type: AllocationType::Financial,
                value: 75_000.0,
                date: date(2025, 1, 1),
                initial_payment: None,
                installments: None,
                interest_rate: None,
            })
            .unwrap();
        store
            .add_allocation(version.id, NewAllocation {
                name: "Casa de Praia".to_string(),
                allocation_type: AllocationType::FixedAsset,
                value: 850_000.0,
                date: date(2025, 1, 1),
                initial_payment: None,
                installments: None,
                interest_rate: None,
            })
            .unwrap();
        store
            .add_movement(version.id, NewMovement {
                movement_type: MovementType::Inflow,
                description: "Salário Mensal".to_string(),
                value: 22_000.0,
                frequency: Frequency::Monthly,
                start_date: date(2025, 1, 1),
                end_date: Some(date(2055, 12, 31)),
            })
            .unwrap();
        store
            .add_insurance(version.id, NewInsurance {
                name: "Vida".to_string(),
                start_date: date(2025, 1, 1),
                duration_months: 120,
                monthly_premium: 300.0,
                insured_value: 1_000_000.0,
            })
            .unwrap();

        (store, version)
    }

    #[test]
    fn test_snapshot_collects_version_contents() {
        let (store, version) = seeded_store();
        let snapshot = store.snapshot(version.id).unwrap();

        assert_eq!(snapshot.version_id, version.id);
        assert_eq!(snapshot.real_interest_rate, 0.04);
        assert_eq!(snapshot.movements.len(), 1);
        assert_eq!(snapshot.insurances.len(), 1);
        assert_eq!(snapshot.initial_financial(), 75_000.0);
        assert_eq!(snapshot.initial_non_financial(), 850_000.0);
    }

    #[test]
    fn test_snapshot_of_unknown_version_is_not_found() {
        let (store, _) = seeded_store();
        let err = store.load_snapshot(999).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_record_after_start_date_contributes_nothing() {
        let (mut store, version) = seeded_store();
        let car = store
            .add_allocation(version.id, NewAllocation {
                name: "Carro".to_string(),
                allocation_type: AllocationType::FixedAsset,
                value: 90_000.0,
                date: date(2025, 1, 2),
                initial_payment: Some(20_000.0),
                installments: Some(36),
                interest_rate: Some(0.012),
            })
            .unwrap();

        let snapshot = store.snapshot(version.id).unwrap();
        assert_eq!(snapshot.initial_non_financial(), 850_000.0);
        assert!(snapshot.initial_allocations.iter().all(|a| a.allocation_id != car.id));
    }

    #[test]
    fn test_latest_valuation_wins() {
        let (mut store, version) = seeded_store();
        let checking = store.find_allocation_id("Conta Corrente");
        store
            .add_allocation_record(checking, NewAllocationRecord {
                simulation_version_id: version.id,
                value: 60_000.0,
                date: date(2024, 6, 1),
            })
            .unwrap();
        store
            .add_allocation_record(checking, NewAllocationRecord {
                simulation_version_id: version.id,
                value: 80_000.0,
                date: date(2025, 1, 1),
            })
            .unwrap();

        // Same date as the first record; the higher id wins
        assert_eq!(store.snapshot(version.id).unwrap().initial_financial(), 80_000.0);
    }

    #[test]
    fn test_new_version_copies_and_moves_latest_flag() {
        let (mut store, version) = seeded_store();
        let v2 = store.create_new_version(version.simulation_id).unwrap();
        let v3 = store.create_new_version(version.simulation_id).unwrap();

        assert_eq!(v2.version, 2);
        assert_eq!(v3.version, 3);
        assert!(!store.version(version.id).unwrap().is_latest);
        assert!(!store.version(v2.id).unwrap().is_latest);
        assert!(store.version(v3.id).unwrap().is_latest);
        store.check_version_history().unwrap();

        let original = store.snapshot(version.id).unwrap();
        let copied = store.snapshot(v3.id).unwrap();
        assert_eq!(copied.movements.len(), original.movements.len());
        assert_eq!(copied.insurances.len(), original.insurances.len());
        assert_eq!(copied.initial_financial(), original.initial_financial());
        assert!(copied.movements.iter().all(|m| m.simulation_version_id == v3.id));
    }

    #[test]
    fn test_create_from_version_requires_unique_name() {
        let (mut store, version) = seeded_store();
        let err = store.create_from_version(version.id, "Plano Original").unwrap_err();
        assert!(matches!(err, PlannerError::Conflict(_)));

        let copy = store.create_from_version(version.id, "Aposentadoria").unwrap();
        assert_eq!(copy.version, 1);
        assert!(copy.is_latest);
        assert_ne!(copy.simulation_id, version.simulation_id);
        assert_eq!(store.latest_versions().len(), 2);
        assert_eq!(store.snapshot(copy.id).unwrap().movements.len(), 1);
    }

    #[test]
    fn test_update_version() {
        let (mut store, version) = seeded_store();
        let updated = store
            .update_version(version.id, VersionUpdate {
                name: Some("Plano Revisado".to_string()),
                start_date: Some(date(2026, 1, 1)),
                real_interest_rate: Some(0.05),
            })
            .unwrap();

        assert_eq!(updated.start_date, date(2026, 1, 1));
        assert_eq!(updated.real_interest_rate, 0.05);
        assert_eq!(store.simulation(version.simulation_id).unwrap().name, "Plano Revisado");
    }

    #[test]
    fn test_protected_simulation_cannot_be_updated() {
        let mut store = SimulationStore::new();
        let version = store.create_simulation(PROTECTED_SIMULATION_NAME, date(2025, 1, 1), 0.04).unwrap();

        let err = store
            .update_version(version.id, VersionUpdate { real_interest_rate: Some(0.1), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, PlannerError::Conflict(_)));
    }

    #[test]
    fn test_entity_validation() {
        let (mut store, version) = seeded_store();

        let err = store
            .add_movement(version.id, NewMovement {
                movement_type: MovementType::Outflow,
                description: "Aluguel".to_string(),
                value: -10.0,
                frequency: Frequency::Monthly,
                start_date: date(2025, 1, 1),
                end_date: None,
            })
            .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidInput(_)));

        let err = store
            .add_movement(version.id, NewMovement {
                movement_type: MovementType::Outflow,
                description: "Aluguel".to_string(),
                value: 10.0,
                frequency: Frequency::Monthly,
                start_date: date(2025, 1, 1),
                end_date: Some(date(2024, 1, 1)),
            })
            .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidInput(_)));

        let err = store
            .add_insurance(version.id, NewInsurance {
                name: "Vida".to_string(),
                start_date: date(2025, 1, 1),
                duration_months: 0,
                monthly_premium: 100.0,
                insured_value: 1_000.0,
            })
            .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidInput(_)));

        let err = store
            .add_allocation_record(999, NewAllocationRecord {
                simulation_version_id: version.id,
                value: 1.0,
                date: date(2025, 1, 1),
            })
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_version_history_check_detects_gaps() {
        let (mut store, version) = seeded_store();
        store.versions.push(SimulationVersion {
            id: 50,
            simulation_id: version.simulation_id,
            version: 3,
            is_latest: false,
            start_date: date(2025, 1, 1),
            real_interest_rate: 0.04,
        });
        assert!(store.check_version_history().is_err());
    }

    #[test]
    fn test_update_and_delete_movement() {
        let (mut store, version) = seeded_store();
        let salary = store.movements_of(version.id).unwrap()[0].id;

        let updated = store
            .update_movement(salary, MovementUpdate {
                value: Some(25_000.0),
                end_date: Some(None),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.value, 25_000.0);
        assert_eq!(updated.end_date, None);
        assert_eq!(updated.description, "Salário Mensal");

        // Rejected updates leave the stored movement untouched
        let err = store
            .update_movement(salary, MovementUpdate { end_date: Some(Some(date(2020, 1, 1))), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidInput(_)));
        assert_eq!(store.movements_of(version.id).unwrap()[0].end_date, None);

        store.delete_movement(salary).unwrap();
        assert!(store.movements_of(version.id).unwrap().is_empty());
        assert!(store.delete_movement(salary).unwrap_err().is_not_found());
        assert!(store.update_movement(salary, MovementUpdate::default()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_movement_update_wire_format() {
        let update: MovementUpdate = serde_json::from_str(r#"{ "type": "SAIDA", "endDate": null }"#).unwrap();
        assert_eq!(update.movement_type, Some(MovementType::Outflow));
        assert_eq!(update.end_date, Some(None));

        let update: MovementUpdate = serde_json::from_str(r#"{ "value": 10.0 }"#).unwrap();
        assert_eq!(update.end_date, None);
    }

    #[test]
    fn test_update_and_delete_insurance() {
        let (mut store, version) = seeded_store();
        let policy = store.insurances_of(version.id).unwrap()[0].id;

        let updated = store
            .update_insurance(policy, InsuranceUpdate { monthly_premium: Some(450.0), ..Default::default() })
            .unwrap();
        assert_eq!(updated.monthly_premium, 450.0);
        assert_eq!(store.snapshot(version.id).unwrap().insurances[0].monthly_premium, 450.0);

        let err = store
            .update_insurance(policy, InsuranceUpdate { duration_months: Some(0), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidInput(_)));

        store.delete_insurance(policy).unwrap();
        assert!(store.snapshot(version.id).unwrap().insurances.is_empty());
        assert!(store.delete_insurance(policy).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_and_delete_allocation() {
        let (mut store, version) = seeded_store();
        let house = store.find_allocation_id("Casa de Praia");

        let updated = store
            .update_allocation(house, AllocationUpdate {
                allocation_type: Some(AllocationType::Financial),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.name, "Casa de Praia");
        assert_eq!(store.snapshot(version.id).unwrap().initial_financial(), 925_000.0);

        let err = store
            .update_allocation(house, AllocationUpdate { name: Some("  ".to_string()), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidInput(_)));

        store.delete_allocation(house).unwrap();
        assert!(store.allocation_records.iter().all(|r| r.allocation_id != house));
        assert_eq!(store.allocation_records_of(version.id).unwrap().len(), 1);
        assert_eq!(store.snapshot(version.id).unwrap().initial_financial(), 75_000.0);
        assert!(store.delete_allocation(house).unwrap_err().is_not_found());
        store.check_references().unwrap();
    }

    #[test]
    fn test_deleting_latest_record_falls_back_to_older_one() {
        let (mut store, version) = seeded_store();
        let checking = store.find_allocation_id("Conta Corrente");
        store
            .add_allocation_record(checking, NewAllocationRecord {
                simulation_version_id: version.id,
                value: 60_000.0,
                date: date(2024, 6, 1),
            })
            .unwrap();
        assert_eq!(store.snapshot(version.id).unwrap().initial_financial(), 75_000.0);

        let latest = store
            .allocation_records_of(version.id)
            .unwrap()
            .into_iter()
            .find(|(r, _)| r.allocation_id == checking && r.date == date(2025, 1, 1))
            .map(|(r, _)| r.id)
            .unwrap();
        store.delete_allocation_record(latest).unwrap();

        assert_eq!(store.snapshot(version.id).unwrap().initial_financial(), 60_000.0);
        assert!(store.delete_allocation_record(latest).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_allocation_record() {
        let (mut store, version) = seeded_store();
        let checking = store.find_allocation_id("Conta Corrente");
        let record = store
            .allocation_records_of(version.id)
            .unwrap()
            .into_iter()
            .find(|(r, _)| r.allocation_id == checking)
            .map(|(r, _)| r.id)
            .unwrap();

        let updated = store
            .update_allocation_record(record, AllocationRecordUpdate { value: Some(90_000.0), date: None })
            .unwrap();
        assert_eq!(updated.date, date(2025, 1, 1));
        assert_eq!(store.snapshot(version.id).unwrap().initial_financial(), 90_000.0);

        // Moving the only valuation past the start date drops the allocation
        store
            .update_allocation_record(record, AllocationRecordUpdate { value: None, date: Some(date(2026, 1, 1)) })
            .unwrap();
        assert_eq!(store.snapshot(version.id).unwrap().initial_financial(), 0.0);

        let err = store
            .update_allocation_record(record, AllocationRecordUpdate { value: Some(0.0), date: None })
            .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidInput(_)));
        assert!(store
            .update_allocation_record(999, AllocationRecordUpdate::default())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_listings_of_unknown_version_are_not_found() {
        let (store, version) = seeded_store();
        assert!(store.movements_of(999).unwrap_err().is_not_found());
        assert!(store.insurances_of(999).unwrap_err().is_not_found());
        assert!(store.allocation_records_of(999).unwrap_err().is_not_found());

        let records = store.allocation_records_of(version.id).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|(r, a)| r.allocation_id == a.id));

        let by_allocation = store.allocations_with_records();
        assert_eq!(by_allocation.len(), 2);
        assert!(by_allocation.iter().all(|(_, records)| records.len() == 1));
    }

    #[test]
    fn test_reference_check_detects_dangling_record() {
        let (mut store, version) = seeded_store();
        store.check_references().unwrap();

        store.allocation_records.push(AllocationRecord {
            id: 77,
            allocation_id: 404,
            simulation_version_id: version.id,
            value: 1_000.0,
            date: date(2025, 1, 1),
            initial_payment: None,
            installments: None,
            interest_rate: None,
        });
        let err = store.check_references().unwrap_err();
        assert!(matches!(err, PlannerError::InvalidInput(_)));
    }

    impl SimulationStore {
        fn find_allocation_id(&self, name: &str) -> u32 {
            self.allocations.iter().find(|a| a.name == name).unwrap().id
        }
    }
}

//! Canonical projection input assembled from one simulation version

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::simulation::{AllocationRecord, AllocationType, Insurance, Movement, SimulationVersion};

/// Opening valuation of one allocation, joined with the allocation's type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialAllocation {
    pub allocation_id: u32,
    pub allocation_type: AllocationType,

    /// Record the valuation was taken from
    pub record_id: u32,
    pub value: f64,
    pub date: NaiveDate,
}

impl InitialAllocation {
    pub fn from_record(record: &AllocationRecord, allocation_type: AllocationType) -> Self {
        Self {
            allocation_id: record.allocation_id,
            allocation_type,
            record_id: record.id,
            value: record.value,
            date: record.date,
        }
    }
}

/// Everything the projection engine reads about a simulation version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationVersionSnapshot {
    pub version_id: u32,
    pub start_date: NaiveDate,
    pub real_interest_rate: f64,
    pub movements: Vec<Movement>,
    pub insurances: Vec<Insurance>,

    /// At most one entry per allocation, all dated on or before `start_date`
    pub initial_allocations: Vec<InitialAllocation>,
}

impl SimulationVersionSnapshot {
    pub fn new(
        version: &SimulationVersion,
        movements: Vec<Movement>,
        insurances: Vec<Insurance>,
        initial_allocations: Vec<InitialAllocation>,
    ) -> Self {
        Self {
            version_id: version.id,
            start_date: version.start_date,
            real_interest_rate: version.real_interest_rate,
            movements,
            insurances,
            initial_allocations,
        }
    }

    pub fn start_year(&self) -> i32 {
        self.start_date.year()
    }

    /// Opening value of financial allocations
    pub fn initial_financial(&self) -> f64 {
        self.initial_value_of(AllocationType::Financial)
    }

    /// Opening value of fixed assets; held constant through the projection
    pub fn initial_non_financial(&self) -> f64 {
        self.initial_value_of(AllocationType::FixedAsset)
    }

    fn initial_value_of(&self, allocation_type: AllocationType) -> f64 {
        self.initial_allocations
            .iter()
            .filter(|a| a.allocation_type == allocation_type)
            .map(|a| a.value)
            .sum()
    }
}

/// Most recent record per allocation dated on or before `as_of`.
///
/// Ties on date go to the highest record id so repeated assemblies of the
/// same data always pick the same record. Output is ordered by allocation id.
pub fn latest_records_as_of<'a, I>(records: I, as_of: NaiveDate) -> Vec<&'a AllocationRecord>
where
    I: IntoIterator<Item = &'a AllocationRecord>,
{
    let mut latest: BTreeMap<u32, &'a AllocationRecord> = BTreeMap::new();

    for record in records.into_iter().filter(|r| r.date <= as_of) {
        latest
            .entry(record.allocation_id)
            .and_modify(|current| {
                if (record.date, record.id) > (current.date, current.id) {
                    *current = record;
                }
            })
            .or_insert(record);
    }

    latest.into_values().collect()
}

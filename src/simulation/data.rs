//! Simulation records matching the planner's JSON document format

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Direction of a cash movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementType {
    #[serde(rename = "ENTRADA", alias = "inflow")]
    Inflow,
    #[serde(rename = "SAIDA", alias = "outflow")]
    Outflow,
}

/// How often a movement's value is paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "UNICA", alias = "one-time")]
    OneTime,
    #[serde(rename = "MENSAL", alias = "monthly")]
    Monthly,
    #[serde(rename = "ANUAL", alias = "annual")]
    Annual,
}

impl Frequency {
    /// Factor turning a movement value into its yearly amount.
    /// One-time movements count in full for every year they are in range.
    pub fn annual_multiplier(&self) -> f64 {
        match self {
            Frequency::Monthly => 12.0,
            Frequency::OneTime | Frequency::Annual => 1.0,
        }
    }
}

/// Kind of asset an allocation represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationType {
    /// Liquid or invested assets, grown at the version's real interest rate
    #[serde(rename = "FINANCEIRA", alias = "financial")]
    Financial,
    /// Property and other illiquid assets, held flat
    #[serde(rename = "IMOBILIZADA", alias = "fixed-asset")]
    FixedAsset,
}

/// Named financial plan; owns an ordered history of versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    pub id: u32,
    pub name: String,
}

/// One dated, parameterized instance of a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationVersion {
    pub id: u32,
    pub simulation_id: u32,

    /// 1-based, gapless within the owning simulation
    pub version: u32,

    pub is_latest: bool,

    /// Date the projection begins
    pub start_date: NaiveDate,

    /// Annual growth applied to financial patrimony (0.04 = 4%/yr)
    pub real_interest_rate: f64,
}

/// Recurring or one-time cash flow attached to a version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: u32,
    pub simulation_version_id: u32,

    #[serde(rename = "type")]
    pub movement_type: MovementType,

    #[serde(default)]
    pub description: String,

    /// Positive magnitude; direction comes from `movement_type`
    pub value: f64,

    pub frequency: Frequency,
    pub start_date: NaiveDate,

    /// None = open-ended
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl Movement {
    /// Whether the movement contributes to the given calendar year
    pub fn is_active_in(&self, year: i32) -> bool {
        self.start_date.year() <= year && self.end_date.map_or(true, |end| end.year() >= year)
    }

    /// Yearly contribution of this movement
    pub fn annual_amount(&self) -> f64 {
        self.value * self.frequency.annual_multiplier()
    }
}

/// Named asset whose value is recorded over time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub id: u32,
    pub name: String,

    #[serde(rename = "type")]
    pub allocation_type: AllocationType,
}

/// Dated valuation of one allocation within one version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRecord {
    pub id: u32,
    pub allocation_id: u32,
    pub simulation_version_id: u32,
    pub value: f64,
    pub date: NaiveDate,

    // Financing details for financed purchases. Bookkeeping only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_payment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installments: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<f64>,
}

/// Insurance policy generating a monthly premium for a bounded duration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insurance {
    pub id: u32,
    pub simulation_version_id: u32,
    pub name: String,
    pub start_date: NaiveDate,
    pub duration_months: u32,
    pub monthly_premium: f64,
    pub insured_value: f64,
}

impl Insurance {
    /// Inclusive calendar-year window during which premiums are charged:
    /// `[start year, start year + whole years of duration]`
    pub fn coverage_years(&self) -> (i32, i32) {
        let first = self.start_date.year();
        (first, first + (self.duration_months / 12) as i32)
    }

    /// Whether the policy charges premiums in the given year
    pub fn is_active_in(&self, year: i32) -> bool {
        let (first, last) = self.coverage_years();
        first <= year && year <= last
    }

    pub fn annual_premium(&self) -> f64 {
        self.monthly_premium * 12.0
    }
}

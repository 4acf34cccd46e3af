//! Core projection engine for yearly net worth forecasts

use log::debug;
use serde::{Deserialize, Serialize};

use super::cashflows::{ProjectionResult, YearCashflow};
use super::snapshot::SimulationVersionSnapshot;
use super::state::PatrimonyState;
use crate::errors::{PlannerError, Result};
use crate::simulation::MovementType;

/// Last projected year unless configured otherwise
pub const DEFAULT_HORIZON_END_YEAR: i32 = 2060;

/// Configuration for a projection run
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionConfig {
    /// Final projection year (inclusive)
    pub horizon_end_year: i32,

    /// Whether to keep the per-year cashflow breakdown
    pub detailed_output: bool,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            horizon_end_year: DEFAULT_HORIZON_END_YEAR,
            detailed_output: false,
        }
    }
}

/// Whether the plan's subject is alive over the projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeStatus {
    #[serde(rename = "Vivo", alias = "alive")]
    Alive,
    /// Expenses drop to half from the start year on
    #[serde(rename = "Morto", alias = "deceased")]
    Deceased,
}

impl LifeStatus {
    /// Share of the year's expenses that is actually spent
    pub fn expense_factor(&self) -> f64 {
        match self {
            LifeStatus::Alive => 1.0,
            LifeStatus::Deceased => 0.5,
        }
    }
}

/// Main projection engine
#[derive(Debug, Clone, Default)]
pub struct ProjectionEngine {
    config: ProjectionConfig,
}

impl ProjectionEngine {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Project one snapshot year by year from its start year through the horizon.
    ///
    /// Each year folds the previous closing balance forward: growth at the
    /// version's real rate (skipped in the start year), then income minus
    /// expenses. Negative balances are carried as-is.
    pub fn project(
        &self,
        snapshot: &SimulationVersionSnapshot,
        status: LifeStatus,
        include_insurance: bool,
    ) -> Result<ProjectionResult> {
        self.validate(snapshot)?;

        let start_year = snapshot.start_year();
        let end_year = self.config.horizon_end_year;
        let growth_factor = 1.0 + snapshot.real_interest_rate;
        let non_financial = snapshot.initial_non_financial();

        debug!(
            "Projecting version {} {}..={} (status {:?}, insurance {}, {} movements, {} policies)",
            snapshot.version_id,
            start_year,
            end_year,
            status,
            include_insurance,
            snapshot.movements.len(),
            snapshot.insurances.len(),
        );

        let (_, rows) = (start_year..=end_year).fold(
            (PatrimonyState::opening(snapshot), Vec::with_capacity((end_year - start_year + 1) as usize)),
            |(state, mut rows), year| {
                let opening_balance = state.balance_before_flows(year, growth_factor);
                let row = self.year_cashflow(
                    snapshot,
                    year,
                    status,
                    include_insurance,
                    opening_balance,
                    opening_balance - state.financial_patrimony,
                    non_financial,
                );
                rows.push(row);
                (state.close_year(year, opening_balance, row.net_flow), rows)
            },
        );

        let mut result = ProjectionResult::new(snapshot.version_id, status, include_insurance);
        result.points = rows.iter().map(YearCashflow::point).collect();
        if self.config.detailed_output {
            result.cashflows = rows;
        }

        Ok(result)
    }

    /// Reject inputs that would produce meaningless output
    fn validate(&self, snapshot: &SimulationVersionSnapshot) -> Result<()> {
        let rate = snapshot.real_interest_rate;
        if !rate.is_finite() || rate < -1.0 {
            return Err(PlannerError::invalid(format!(
                "real interest rate {} must be a finite value of at least -100%",
                rate
            )));
        }

        if self.config.horizon_end_year < snapshot.start_year() {
            return Err(PlannerError::invalid(format!(
                "horizon end year {} is before start year {}",
                self.config.horizon_end_year,
                snapshot.start_year()
            )));
        }

        Ok(())
    }

    /// Cash flows for a single year, applied to the grown opening balance
    #[allow(clippy::too_many_arguments)]
    fn year_cashflow(
        &self,
        snapshot: &SimulationVersionSnapshot,
        year: i32,
        status: LifeStatus,
        include_insurance: bool,
        opening_balance: f64,
        growth: f64,
        non_financial: f64,
    ) -> YearCashflow {
        let income = movement_total(snapshot, MovementType::Inflow, year);
        let movement_expenses = movement_total(snapshot, MovementType::Outflow, year);

        let insurance_expense = if include_insurance {
            snapshot
                .insurances
                .iter()
                .filter(|i| i.is_active_in(year))
                .map(|i| i.annual_premium())
                .sum()
        } else {
            0.0
        };

        let total_expenses = (movement_expenses + insurance_expense) * status.expense_factor();
        let net_flow = income - total_expenses;

        YearCashflow {
            year,
            growth,
            income,
            movement_expenses,
            insurance_expense,
            total_expenses,
            net_flow,
            financial_patrimony: opening_balance + net_flow,
            non_financial_patrimony: non_financial,
        }
    }
}

/// Yearly amount of all movements of one direction active in `year`
fn movement_total(snapshot: &SimulationVersionSnapshot, movement_type: MovementType, year: i32) -> f64 {
    snapshot
        .movements
        .iter()
        .filter(|m| m.movement_type == movement_type && m.is_active_in(year))
        .map(|m| m.annual_amount())
        .sum()
}

//! Running patrimony carried from one projection year to the next

use super::snapshot::SimulationVersionSnapshot;

/// Financial patrimony as of the close of `year`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatrimonyState {
    /// Last year folded into this state
    pub year: i32,

    /// Financial patrimony after that year's cash flows
    pub financial_patrimony: f64,
}

impl PatrimonyState {
    /// Opening position: the start year, holding the initial financial
    /// allocations with no cash flows applied yet
    pub fn opening(snapshot: &SimulationVersionSnapshot) -> Self {
        Self {
            year: snapshot.start_year(),
            financial_patrimony: snapshot.initial_financial(),
        }
    }

    /// Balance `year`'s cash flows are applied to.
    /// Any year after the one already folded in earns one year of growth first.
    pub fn balance_before_flows(&self, year: i32, growth_factor: f64) -> f64 {
        if year > self.year {
            self.financial_patrimony * growth_factor
        } else {
            self.financial_patrimony
        }
    }

    /// State after closing `year` with the given opening balance and net flow
    pub fn close_year(&self, year: i32, opening_balance: f64, net_flow: f64) -> Self {
        Self {
            year,
            financial_patrimony: opening_balance + net_flow,
        }
    }
}

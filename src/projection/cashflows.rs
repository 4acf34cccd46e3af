//! Projection output structures

use std::io::Write;

use serde::{Deserialize, Serialize};

use super::engine::LifeStatus;
use crate::errors::Result;

/// Net worth at the close of one projection year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyPoint {
    pub year: i32,
    pub financial_patrimony: f64,
    pub non_financial_patrimony: f64,
    pub total_patrimony: f64,
}

impl YearlyPoint {
    pub fn new(year: i32, financial_patrimony: f64, non_financial_patrimony: f64) -> Self {
        Self {
            year,
            financial_patrimony,
            non_financial_patrimony,
            total_patrimony: financial_patrimony + non_financial_patrimony,
        }
    }
}

/// Breakdown of one projection year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearCashflow {
    pub year: i32,

    /// Interest earned on the prior year's closing balance (0 in the start year)
    pub growth: f64,

    /// Inflow movements active this year
    pub income: f64,

    /// Outflow movements active this year
    pub movement_expenses: f64,

    /// Premiums of active policies (0 when insurance is excluded)
    pub insurance_expense: f64,

    /// Expenses actually subtracted, after the status adjustment
    pub total_expenses: f64,

    pub net_flow: f64,
    pub financial_patrimony: f64,
    pub non_financial_patrimony: f64,
}

impl YearCashflow {
    pub fn point(&self) -> YearlyPoint {
        YearlyPoint::new(self.year, self.financial_patrimony, self.non_financial_patrimony)
    }
}

/// Complete projection of one snapshot under one status/insurance choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub version_id: u32,
    pub status: LifeStatus,
    pub include_insurance: bool,

    /// One point per year, start year through horizon end year
    pub points: Vec<YearlyPoint>,

    /// Per-year breakdown; empty unless detailed output was requested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cashflows: Vec<YearCashflow>,
}

impl ProjectionResult {
    pub fn new(version_id: u32, status: LifeStatus, include_insurance: bool) -> Self {
        Self {
            version_id,
            status,
            include_insurance,
            points: Vec::new(),
            cashflows: Vec::new(),
        }
    }

    pub fn final_point(&self) -> Option<&YearlyPoint> {
        self.points.last()
    }

    /// Get summary statistics
    pub fn summary(&self) -> ProjectionSummary {
        ProjectionSummary::from_points(&self.points)
    }

    /// Write the series as CSV; the breakdown columns are included when present
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        if self.cashflows.is_empty() {
            for point in &self.points {
                csv_writer.serialize(PointCsvRow::from(point))?;
            }
        } else {
            for row in &self.cashflows {
                csv_writer.serialize(DetailedCsvRow::from(row))?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }
}

/// Summary statistics for a projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSummary {
    pub total_years: u32,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub final_financial_patrimony: f64,
    pub final_total_patrimony: f64,
    pub min_financial_patrimony: f64,

    /// First year financial patrimony closes below zero
    pub first_negative_year: Option<i32>,
}

impl ProjectionSummary {
    /// Summarize any yearly series, e.g. one half of a `FullProjectionResult`
    pub fn from_points(points: &[YearlyPoint]) -> Self {
        let first_negative_year = points.iter().find(|p| p.financial_patrimony < 0.0).map(|p| p.year);

        let min_financial_patrimony = points
            .iter()
            .map(|p| p.financial_patrimony)
            .fold(f64::INFINITY, f64::min);

        let last = points.last();
        Self {
            total_years: points.len() as u32,
            first_year: points.first().map(|p| p.year),
            last_year: last.map(|p| p.year),
            final_financial_patrimony: last.map(|p| p.financial_patrimony).unwrap_or(0.0),
            final_total_patrimony: last.map(|p| p.total_patrimony).unwrap_or(0.0),
            min_financial_patrimony: if points.is_empty() { 0.0 } else { min_financial_patrimony },
            first_negative_year,
        }
    }
}

/// Result of the orchestrated projection: always with insurance, optionally without
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullProjectionResult {
    pub with_insurance: Vec<YearlyPoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub without_insurance: Option<Vec<YearlyPoint>>,
}

#[derive(Serialize)]
struct PointCsvRow {
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "FinancialPatrimony")]
    financial_patrimony: f64,
    #[serde(rename = "NonFinancialPatrimony")]
    non_financial_patrimony: f64,
    #[serde(rename = "TotalPatrimony")]
    total_patrimony: f64,
}

impl From<&YearlyPoint> for PointCsvRow {
    fn from(point: &YearlyPoint) -> Self {
        Self {
            year: point.year,
            financial_patrimony: point.financial_patrimony,
            non_financial_patrimony: point.non_financial_patrimony,
            total_patrimony: point.total_patrimony,
        }
    }
}

#[derive(Serialize)]
struct DetailedCsvRow {
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "FinancialPatrimony")]
    financial_patrimony: f64,
    #[serde(rename = "NonFinancialPatrimony")]
    non_financial_patrimony: f64,
    #[serde(rename = "TotalPatrimony")]
    total_patrimony: f64,
    #[serde(rename = "Growth")]
    growth: f64,
    #[serde(rename = "Income")]
    income: f64,
    #[serde(rename = "MovementExpenses")]
    movement_expenses: f64,
    #[serde(rename = "InsuranceExpense")]
    insurance_expense: f64,
    #[serde(rename = "TotalExpenses")]
    total_expenses: f64,
    #[serde(rename = "NetFlow")]
    net_flow: f64,
}

impl From<&YearCashflow> for DetailedCsvRow {
    fn from(row: &YearCashflow) -> Self {
        let point = row.point();
        Self {
            year: row.year,
            financial_patrimony: point.financial_patrimony,
            non_financial_patrimony: point.non_financial_patrimony,
            total_patrimony: point.total_patrimony,
            growth: row.growth,
            income: row.income,
            movement_expenses: row.movement_expenses,
            insurance_expense: row.insurance_expense,
            total_expenses: row.total_expenses,
            net_flow: row.net_flow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(financials: &[f64]) -> ProjectionResult {
        let mut result = ProjectionResult::new(1, LifeStatus::Alive, true);
        result.points = financials
            .iter()
            .enumerate()
            .map(|(i, &f)| YearlyPoint::new(2025 + i as i32, f, 100.0))
            .collect();
        result
    }

    #[test]
    fn test_summary_tracks_first_negative_year() {
        let summary = result_with(&[500.0, 100.0, -50.0, -300.0, -10.0]).summary();
        assert_eq!(summary.total_years, 5);
        assert_eq!(summary.first_year, Some(2025));
        assert_eq!(summary.last_year, Some(2029));
        assert_eq!(summary.first_negative_year, Some(2027));
        assert_eq!(summary.min_financial_patrimony, -300.0);
        assert_eq!(summary.final_financial_patrimony, -10.0);
        assert_eq!(summary.final_total_patrimony, 90.0);
    }

    #[test]
    fn test_summary_of_empty_result() {
        let summary = result_with(&[]).summary();
        assert_eq!(summary.total_years, 0);
        assert_eq!(summary.first_year, None);
        assert_eq!(summary.min_financial_patrimony, 0.0);
        assert_eq!(summary.first_negative_year, None);
    }

    #[test]
    fn test_summary_of_bare_series_matches_result_summary() {
        let result = result_with(&[10.0, -5.0, 20.0]);
        assert_eq!(ProjectionSummary::from_points(&result.points), result.summary());
    }

    #[test]
    fn test_write_points_csv() {
        let mut buffer = Vec::new();
        result_with(&[165_000.0, 261_600.0]).write_csv(&mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Year,FinancialPatrimony,NonFinancialPatrimony,TotalPatrimony");
        assert_eq!(lines[1], "2025,165000.0,100.0,165100.0");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_full_result_omits_missing_comparison() {
        let full = FullProjectionResult {
            with_insurance: vec![YearlyPoint::new(2025, 1.0, 2.0)],
            without_insurance: None,
        };
        let json = serde_json::to_value(&full).unwrap();
        assert!(json.get("withoutInsurance").is_none());
        assert_eq!(json["withInsurance"][0]["totalPatrimony"], serde_json::json!(3.0));
    }
}

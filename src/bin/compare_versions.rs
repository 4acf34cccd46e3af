//! Project the latest version of every simulation and compare outcomes
//!
//! Writes one summary row per simulation to CSV, then prints the final
//! patrimony of every stored version

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use patrimony_planner::projection::{LifeStatus, ProjectionSummary};
use patrimony_planner::simulation::{load_store, SimulationVersion, DEFAULT_STORE_PATH};
use patrimony_planner::{ProjectionRequest, ProjectionRunner};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(version, about = "Compare the latest version of every simulation")]
struct Args {
    #[arg(long, default_value = DEFAULT_STORE_PATH)]
    store: PathBuf,

    #[arg(long, default_value = "version_comparison.csv")]
    output: PathBuf,
}

#[derive(Debug, Serialize)]
struct ComparisonRow {
    #[serde(rename = "Simulation")]
    simulation: String,
    #[serde(rename = "VersionId")]
    version_id: u32,
    #[serde(rename = "Version")]
    version: u32,
    #[serde(rename = "StartDate")]
    start_date: String,
    #[serde(rename = "RealInterestRate")]
    real_interest_rate: f64,
    #[serde(rename = "FinalFinancialAlive")]
    final_financial_alive: f64,
    #[serde(rename = "FinalTotalAlive")]
    final_total_alive: f64,
    #[serde(rename = "FinalTotalDeceased")]
    final_total_deceased: f64,
    #[serde(rename = "FinalTotalWithoutInsurance")]
    final_total_without_insurance: f64,
    #[serde(rename = "MinFinancial")]
    min_financial: f64,
    #[serde(rename = "FirstNegativeYear")]
    first_negative_year: Option<i32>,
}

/// Alive (with the uninsured comparison) and deceased request for each version
fn requests_for(versions: &[&SimulationVersion]) -> Vec<ProjectionRequest> {
    versions
        .iter()
        .flat_map(|v| {
            [
                ProjectionRequest::new(v.id, LifeStatus::Alive).with_comparison(),
                ProjectionRequest::new(v.id, LifeStatus::Deceased),
            ]
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    println!("Loading simulations from {}...", args.store.display());
    let store = load_store(&args.store).with_context(|| format!("loading {}", args.store.display()))?;

    let mut versions = store.latest_versions();
    versions.sort_by_key(|v| v.simulation_id);
    println!("Loaded {} simulations in {:?}", versions.len(), start.elapsed());

    let runner = ProjectionRunner::new(&store);

    println!("Running projections...");
    let proj_start = Instant::now();

    let requests = requests_for(&versions);
    let results = runner.run_batch(&requests);

    let mut rows = Vec::with_capacity(versions.len());
    for (version, pair) in versions.iter().zip(results.chunks(2)) {
        let [alive, deceased] = pair else {
            anyhow::bail!("missing projection results for version {}", version.id);
        };
        let alive = alive.as_ref().map_err(|e| anyhow::anyhow!("version {}: {}", version.id, e))?;
        let deceased = deceased.as_ref().map_err(|e| anyhow::anyhow!("version {}: {}", version.id, e))?;

        let alive_summary = ProjectionSummary::from_points(&alive.with_insurance);
        let uninsured = alive
            .without_insurance
            .as_deref()
            .map(ProjectionSummary::from_points)
            .context("comparison series missing")?;

        rows.push(ComparisonRow {
            simulation: store.simulation(version.simulation_id)?.name.clone(),
            version_id: version.id,
            version: version.version,
            start_date: version.start_date.to_string(),
            real_interest_rate: version.real_interest_rate,
            final_financial_alive: alive_summary.final_financial_patrimony,
            final_total_alive: alive_summary.final_total_patrimony,
            final_total_deceased: ProjectionSummary::from_points(&deceased.with_insurance).final_total_patrimony,
            final_total_without_insurance: uninsured.final_total_patrimony,
            min_financial: alive_summary.min_financial_patrimony,
            first_negative_year: alive_summary.first_negative_year,
        });
    }

    println!("Projections complete in {:?}", proj_start.elapsed());

    let mut writer = csv::Writer::from_path(&args.output).with_context(|| format!("creating {}", args.output.display()))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    println!("Output written to {}", args.output.display());

    println!("\nComparison:");
    for row in &rows {
        println!(
            "  {:<24} v{:<3} alive=${:>16.2} deceased=${:>16.2} no-insurance=${:>16.2}",
            row.simulation, row.version, row.final_total_alive, row.final_total_deceased, row.final_total_without_insurance
        );
    }

    let mut all_versions: Vec<_> = store.versions.iter().map(|v| (v.simulation_id, v.version, v.id)).collect();
    all_versions.sort();
    let ids: Vec<u32> = all_versions.iter().map(|&(_, _, id)| id).collect();

    println!("\nVersion history:");
    for ((simulation_id, version, _), patrimony) in all_versions.iter().zip(runner.final_patrimony_by_version(&ids)) {
        let name = store.simulation(*simulation_id).map(|s| s.name.as_str()).unwrap_or("?");
        println!("  {:<24} v{:<3} final=${:>16.2}", name, version, patrimony.final_patrimony);
    }

    println!("\nTotal time: {:?}", start.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use patrimony_planner::simulation::load_default_store;

    #[test]
    fn test_requests_pair_alive_comparison_with_deceased() {
        let store = load_default_store().unwrap();
        let versions = store.latest_versions();
        let requests = requests_for(&versions);

        assert_eq!(requests.len(), 2 * versions.len());
        assert!(requests[0].calculate_without_insurance);
        assert_eq!(requests[0].status, LifeStatus::Alive);
        assert_eq!(requests[1].status, LifeStatus::Deceased);
        assert!(!requests[1].calculate_without_insurance);
        assert_eq!(requests[0].simulation_version_id, requests[1].simulation_version_id);
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["compare_versions"]);
        assert_eq!(args.store, PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(args.output, PathBuf::from("version_comparison.csv"));

        let args = Args::parse_from(["compare_versions", "--store", "a.json", "--output", "b.csv"]);
        assert_eq!(args.store, PathBuf::from("a.json"));
        assert_eq!(args.output, PathBuf::from("b.csv"));
    }
}

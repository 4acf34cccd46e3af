//! Patrimony Planner CLI
//!
//! Projects one simulation version from the store and writes the yearly series to CSV

use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use patrimony_planner::projection::{LifeStatus, ProjectionConfig, DEFAULT_HORIZON_END_YEAR};
use patrimony_planner::simulation::{load_store, DEFAULT_STORE_PATH};
use patrimony_planner::ProjectionRunner;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Status {
    Alive,
    Deceased,
}

impl From<Status> for LifeStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Alive => LifeStatus::Alive,
            Status::Deceased => LifeStatus::Deceased,
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about = "Project net worth for a simulation version")]
struct Args {
    /// Simulation version to project (defaults to the first latest version)
    #[arg(long)]
    version_id: Option<u32>,

    #[arg(long, value_enum, default_value = "alive")]
    status: Status,

    /// Also compute the series without insurance premiums
    #[arg(long)]
    without_insurance: bool,

    #[arg(long, default_value_t = DEFAULT_HORIZON_END_YEAR)]
    horizon_end_year: i32,

    #[arg(long, default_value = DEFAULT_STORE_PATH)]
    store: PathBuf,

    /// CSV output for the with-insurance series
    #[arg(long, default_value = "projection_output.csv")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("Patrimony Planner v{}", env!("CARGO_PKG_VERSION"));
    println!("========================\n");

    let store = load_store(&args.store).with_context(|| format!("loading {}", args.store.display()))?;

    let version_id = match args.version_id {
        Some(id) => id,
        None => store
            .latest_versions()
            .first()
            .map(|v| v.id)
            .context("store has no simulation versions")?,
    };
    let version = store.version(version_id)?;
    let simulation = store.simulation(version.simulation_id)?;

    println!("Simulation: {} (version {})", simulation.name, version.version);
    println!("  Start Date: {}", version.start_date);
    println!("  Real Interest Rate: {:.2}%", version.real_interest_rate * 100.0);
    println!();

    let config = ProjectionConfig {
        horizon_end_year: args.horizon_end_year,
        detailed_output: true,
    };
    let runner = ProjectionRunner::with_config(&store, config);
    let status = LifeStatus::from(args.status);

    let (result, comparison) = if args.without_insurance {
        let (with, without) = runner.project_detailed_comparison(version_id, status)?;
        (with, Some(without))
    } else {
        (runner.project_detailed(version_id, status, true)?, None)
    };

    println!("{:>6} {:>16} {:>16} {:>16} {:>14} {:>14}", "Year", "Financial", "NonFinancial", "Total", "Income", "Expenses");
    println!("{}", "-".repeat(88));
    for row in &result.cashflows {
        let point = row.point();
        println!(
            "{:>6} {:>16.2} {:>16.2} {:>16.2} {:>14.2} {:>14.2}",
            point.year, point.financial_patrimony, point.non_financial_patrimony, point.total_patrimony,
            row.income, row.total_expenses,
        );
    }

    let file = File::create(&args.output).with_context(|| format!("creating {}", args.output.display()))?;
    result.write_csv(file)?;
    println!("\nFull results written to: {}", args.output.display());

    let summary = result.summary();
    println!("\nSummary:");
    println!("  Years: {}", summary.total_years);
    println!("  Final Financial Patrimony: ${:.2}", summary.final_financial_patrimony);
    println!("  Final Total Patrimony: ${:.2}", summary.final_total_patrimony);
    println!("  Minimum Financial Patrimony: ${:.2}", summary.min_financial_patrimony);
    match summary.first_negative_year {
        Some(year) => println!("  Financial patrimony turns negative in {}", year),
        None => println!("  Financial patrimony stays non-negative"),
    }

    if let Some(without) = comparison {
        let final_without = without.summary().final_total_patrimony;
        println!("\nWithout insurance:");
        println!("  Final Total Patrimony: ${:.2}", final_without);
        println!("  Premium impact: ${:.2}", final_without - summary.final_total_patrimony);
    }

    Ok(())
}

//! Projection runner: fetches a version snapshot once and runs the engine
//! with and, on request, without insurance over it.

use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::projection::{
    FullProjectionResult, LifeStatus, ProjectionConfig, ProjectionEngine, ProjectionResult, SimulationVersionSnapshot,
};
use crate::simulation::SnapshotSource;

/// Parameters of one projection call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionRequest {
    pub simulation_version_id: u32,
    pub status: LifeStatus,

    /// Also produce the series without insurance premiums
    #[serde(default)]
    pub calculate_without_insurance: bool,
}

impl ProjectionRequest {
    pub fn new(simulation_version_id: u32, status: LifeStatus) -> Self {
        Self {
            simulation_version_id,
            status,
            calculate_without_insurance: false,
        }
    }

    pub fn with_comparison(mut self) -> Self {
        self.calculate_without_insurance = true;
        self
    }
}

/// Closing total patrimony of one version's default projection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionPatrimony {
    pub version_id: u32,
    pub final_patrimony: f64,
}

/// Runs projections against a snapshot source
///
/// # Example
/// ```ignore
/// let store = load_default_store()?;
/// let runner = ProjectionRunner::new(&store);
///
/// let request = ProjectionRequest::new(1, LifeStatus::Alive).with_comparison();
/// let result = runner.project(&request)?;
/// ```
pub struct ProjectionRunner<'a, S: ?Sized> {
    source: &'a S,
    engine: ProjectionEngine,
}

impl<'a, S: SnapshotSource + ?Sized> ProjectionRunner<'a, S> {
    /// Create runner with the default horizon
    pub fn new(source: &'a S) -> Self {
        Self::with_config(source, ProjectionConfig::default())
    }

    pub fn with_config(source: &'a S, config: ProjectionConfig) -> Self {
        Self {
            source,
            engine: ProjectionEngine::new(config),
        }
    }

    pub fn engine(&self) -> &ProjectionEngine {
        &self.engine
    }

    /// Fetch the snapshot and project it. `NotFound` from the source is
    /// returned unchanged.
    pub fn project(&self, request: &ProjectionRequest) -> Result<FullProjectionResult> {
        let snapshot = self.source.load_snapshot(request.simulation_version_id)?;
        self.project_snapshot(&snapshot, request)
    }

    /// Project an already assembled snapshot; both series share it
    pub fn project_snapshot(
        &self,
        snapshot: &SimulationVersionSnapshot,
        request: &ProjectionRequest,
    ) -> Result<FullProjectionResult> {
        let with_insurance = self.engine.project(snapshot, request.status, true)?;

        let without_insurance = if request.calculate_without_insurance {
            Some(self.engine.project(snapshot, request.status, false)?.points)
        } else {
            None
        };

        Ok(FullProjectionResult {
            with_insurance: with_insurance.points,
            without_insurance,
        })
    }

    /// Single projection keeping the engine's full result (summary, breakdown)
    pub fn project_detailed(
        &self,
        version_id: u32,
        status: LifeStatus,
        include_insurance: bool,
    ) -> Result<ProjectionResult> {
        let snapshot = self.source.load_snapshot(version_id)?;
        self.engine.project(&snapshot, status, include_insurance)
    }

    /// Detailed results with and without insurance from one snapshot fetch
    pub fn project_detailed_comparison(
        &self,
        version_id: u32,
        status: LifeStatus,
    ) -> Result<(ProjectionResult, ProjectionResult)> {
        let snapshot = self.source.load_snapshot(version_id)?;
        let with_insurance = self.engine.project(&snapshot, status, true)?;
        let without_insurance = self.engine.project(&snapshot, status, false)?;
        Ok((with_insurance, without_insurance))
    }
}

impl<'a, S: SnapshotSource + Sync + ?Sized> ProjectionRunner<'a, S> {
    /// Run many requests in parallel; results keep the request order
    pub fn run_batch(&self, requests: &[ProjectionRequest]) -> Vec<Result<FullProjectionResult>> {
        requests.par_iter().map(|request| self.project(request)).collect()
    }

    /// Final total patrimony of each version (alive, with insurance).
    /// Versions that fail to project report 0.
    pub fn final_patrimony_by_version(&self, version_ids: &[u32]) -> Vec<VersionPatrimony> {
        info!("Computing final patrimony for {} versions", version_ids.len());

        version_ids
            .par_iter()
            .map(|&version_id| {
                let final_patrimony = match self.project(&ProjectionRequest::new(version_id, LifeStatus::Alive)) {
                    Ok(result) => result.with_insurance.last().map(|p| p.total_patrimony).unwrap_or(0.0),
                    Err(e) => {
                        warn!("Error calculating patrimony for version {}: {}", version_id, e);
                        0.0
                    }
                };
                VersionPatrimony { version_id, final_patrimony }
            })
            .collect()
    }
}

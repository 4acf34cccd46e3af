//! AWS Lambda handler for running projections
//!
//! Accepts `{ simulationVersionId, status, calculateWithoutInsurance? }` as JSON
//! and returns `{ withInsurance, withoutInsurance? }`.
//!
//! Supports Lambda Function URLs for direct HTTP access.

use std::sync::OnceLock;

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use log::{error, info};
use patrimony_planner::simulation::{load_store, SimulationStore, DEFAULT_STORE_PATH};
use patrimony_planner::{PlannerError, ProjectionRequest, ProjectionRunner};

/// Environment variable overriding the simulation document location
const STORE_PATH_VAR: &str = "PATRIMONY_STORE_PATH";

static STORE: OnceLock<SimulationStore> = OnceLock::new();

/// Return the cached store, loading it on first use. Failed loads are not
/// cached, so a later invocation retries.
fn cached_store<F>(cell: &'static OnceLock<SimulationStore>, load: F) -> Result<&'static SimulationStore, PlannerError>
where
    F: FnOnce() -> Result<SimulationStore, PlannerError>,
{
    if let Some(store) = cell.get() {
        return Ok(store);
    }
    let loaded = load()?;
    Ok(cell.get_or_init(|| loaded))
}

fn store() -> Result<&'static SimulationStore, PlannerError> {
    cached_store(&STORE, || {
        let path = std::env::var(STORE_PATH_VAR).unwrap_or_else(|_| DEFAULT_STORE_PATH.to_string());
        info!("Loading simulation store from {}", path);
        load_store(&path)
    })
}

fn response(status: u16, body: String) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Body::Text(body))?)
}

fn error_response(status: u16, message: &str) -> Result<Response<Body>, Error> {
    response(status, serde_json::json!({ "error": message }).to_string())
}

fn status_for(err: &PlannerError) -> u16 {
    match err {
        PlannerError::NotFound { .. } => 404,
        PlannerError::InvalidInput(_) => 400,
        PlannerError::Conflict(_) => 409,
        PlannerError::Io(_) | PlannerError::Json(_) | PlannerError::Csv(_) => 500,
    }
}

/// Lambda handler function
async fn handler(event: Request) -> Result<Response<Body>, Error> {
    // Handle CORS preflight
    if event.method().as_str() == "OPTIONS" {
        return Ok(Response::builder()
            .status(200)
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "POST, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type")
            .body(Body::Empty)?);
    }

    let body_str = match event.body() {
        Body::Text(s) => s.clone(),
        Body::Binary(b) => String::from_utf8_lossy(b).to_string(),
        Body::Empty => "{}".to_string(),
    };

    let request: ProjectionRequest = match serde_json::from_str(&body_str) {
        Ok(r) => r,
        Err(e) => return error_response(400, &format!("Invalid JSON: {}", e)),
    };

    let store = match store() {
        Ok(s) => s,
        Err(e) => {
            error!("Simulation store unavailable: {}", e);
            return error_response(500, &format!("Failed to load simulations: {}", e));
        }
    };

    let runner = ProjectionRunner::new(store);
    match runner.project(&request) {
        Ok(result) => response(200, serde_json::to_string(&result)?),
        Err(e) => error_response(status_for(&e), &e.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    run(service_fn(handler)).await
}

//! Load and save the planner's simulation document

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use log::info;

use super::store::SimulationStore;
use crate::errors::Result;

/// Default location of the simulation document
pub const DEFAULT_STORE_PATH: &str = "data/simulations.json";

/// Load a store from a JSON file
pub fn load_store<P: AsRef<Path>>(path: P) -> Result<SimulationStore> {
    let path = path.as_ref();
    let store = load_store_from_reader(BufReader::new(File::open(path)?))?;
    info!(
        "Loaded {} simulations ({} versions) from {}",
        store.simulations.len(),
        store.versions.len(),
        path.display()
    );
    Ok(store)
}

/// Load a store from any reader (e.g., string buffer, request body)
pub fn load_store_from_reader<R: Read>(reader: R) -> Result<SimulationStore> {
    let store: SimulationStore = serde_json::from_reader(reader)?;
    store.check_version_history()?;
    store.check_references()?;
    Ok(store)
}

/// Load the store from the default data/simulations.json location
pub fn load_default_store() -> Result<SimulationStore> {
    load_store(DEFAULT_STORE_PATH)
}

/// Write a store back to disk as pretty-printed JSON
pub fn save_store<P: AsRef<Path>>(store: &SimulationStore, path: P) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, store)?;
    Ok(())
}

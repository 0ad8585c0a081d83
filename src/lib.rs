use crate::domain::simulation::simulation::Simulation;
use crate::error::Result;
use crate::loader::parser::load_scenario;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Builds a ready-to-run simulation from a JSON scenario file.
pub fn generate_simulation(file_path: &str) -> Result<Simulation> {
    logger::init();
    log::info!("Logger initialized. Starting simulation construction.");

    let root_dto = load_scenario(file_path)?;
    log::info!("Scenario file '{}' parsed successfully.", file_path);

    let simulation = Simulation::from_dto(root_dto)?;
    log::info!("Simulation constructed successfully.");

    Ok(simulation)
}

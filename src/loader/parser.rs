use serde::de::DeserializeOwned;
use std::fs;

use crate::api::simulation_dto::SimulationDto;
use crate::error::{Error, Result};

/// Parses a JSON file into a given type `T`.
///
/// # Returns
/// - `Error::IoError` if the file cannot be read.
/// - `Error::DeserializationError` if the JSON does not match `T`.
pub fn parse_json_file<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let data = fs::read_to_string(file_path)?;

    parse_json_str(&data)
}

pub fn parse_json_str<T: DeserializeOwned>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(Error::DeserializationError)
}

/// Loads a scenario file and rejects scenarios that cannot describe a run at all.
pub fn load_scenario(file_path: &str) -> Result<SimulationDto> {
    let dto: SimulationDto = parse_json_file(file_path)?;

    if dto.clock.number_of_ticks == 0 {
        log::warn!("Scenario '{}' configures zero ticks.", file_path);
    }

    if dto.vehicles.is_empty() {
        log::warn!("Scenario '{}' has no vehicles, no task will be generated.", file_path);
    }

    log::debug!("Scenario '{}' has {} solver(s) and {} vehicle(s).", file_path, dto.solvers.len(), dto.vehicles.len());
    Ok(dto)
}

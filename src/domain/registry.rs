use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;

use crate::domain::solver::solver::Solver;
use crate::domain::vehicle::vehicle::Vehicle;
use crate::error::{Error, Result};

new_key_type! {
    /// Non-owning handle of a solver. Tasks and tokens refer to solvers only through it.
    pub struct SolverId;

    /// Non-owning handle of a vehicle. Tasks and tokens refer to their owner only through it.
    pub struct VehicleId;
}

/// Owns every solver and vehicle of a simulation and resolves the handles stored in tasks and tokens.
#[derive(Debug, Default)]
pub struct Registry {
    solvers: SlotMap<SolverId, Solver>,
    vehicles: SlotMap<VehicleId, Vehicle>,

    /// Index lookup of solver handles by configured name.
    solver_names: HashMap<String, SolverId>,

    /// Index lookup of vehicle handles by configured name.
    vehicle_names: HashMap<String, VehicleId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a solver and stamps it with its new handle.
    pub fn add_solver(&mut self, solver: Solver) -> Result<SolverId> {
        let name = solver.get_name().to_string();
        if self.solver_names.contains_key(&name) {
            return Err(Error::ConfigurationError(format!("Solver name {} is used twice.", name)));
        }

        let id = self.solvers.insert(solver);
        self.solvers[id].set_id(id);
        self.solver_names.insert(name, id);

        Ok(id)
    }

    /// Stores a vehicle and stamps it with its new handle.
    pub fn add_vehicle(&mut self, vehicle: Vehicle) -> Result<VehicleId> {
        let name = vehicle.get_name().to_string();
        if self.vehicle_names.contains_key(&name) {
            return Err(Error::ConfigurationError(format!("Vehicle name {} is used twice.", name)));
        }

        let id = self.vehicles.insert(vehicle);
        self.vehicles[id].set_id(id);
        self.vehicle_names.insert(name, id);

        Ok(id)
    }

    pub fn get_solver(&self, id: SolverId) -> Result<&Solver> {
        self.solvers.get(id).ok_or_else(|| Error::UnknownSolver(format!("{:?}", id)))
    }

    pub fn get_solver_mut(&mut self, id: SolverId) -> Result<&mut Solver> {
        self.solvers.get_mut(id).ok_or_else(|| Error::UnknownSolver(format!("{:?}", id)))
    }

    pub fn get_vehicle(&self, id: VehicleId) -> Result<&Vehicle> {
        self.vehicles.get(id).ok_or_else(|| Error::UnknownVehicle(format!("{:?}", id)))
    }

    pub fn get_vehicle_mut(&mut self, id: VehicleId) -> Result<&mut Vehicle> {
        self.vehicles.get_mut(id).ok_or_else(|| Error::UnknownVehicle(format!("{:?}", id)))
    }

    pub fn get_solver_by_name(&self, name: &str) -> Option<SolverId> {
        self.solver_names.get(name).copied()
    }

    pub fn get_vehicle_by_name(&self, name: &str) -> Option<VehicleId> {
        self.vehicle_names.get(name).copied()
    }

    /// Solver handles in insertion order.
    pub fn solver_ids(&self) -> Vec<SolverId> {
        self.solvers.keys().collect()
    }

    /// Vehicle handles in insertion order.
    pub fn vehicle_ids(&self) -> Vec<VehicleId> {
        self.vehicles.keys().collect()
    }

    pub fn solvers(&self) -> impl Iterator<Item = &Solver> {
        self.solvers.values()
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn number_of_solvers(&self) -> usize {
        self.solvers.len()
    }

    pub fn number_of_vehicles(&self) -> usize {
        self.vehicles.len()
    }

    /// Display name of a solver handle, used in records and log lines.
    pub fn solver_name(&self, id: SolverId) -> String {
        match self.solvers.get(id) {
            Some(solver) => solver.get_name().to_string(),
            None => format!("{:?}", id),
        }
    }

    /// Display name of a vehicle handle, used in records and log lines.
    pub fn vehicle_name(&self, id: VehicleId) -> String {
        match self.vehicles.get(id) {
            Some(vehicle) => vehicle.get_name().to_string(),
            None => format!("{:?}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::simulation_dto::{ReservationMode, TaskTemplateDto, VehicleDto};

    fn vehicle(name: &str) -> Vehicle {
        Vehicle::from_dto(&VehicleDto {
            name: name.to_string(),
            latitude: 48.7,
            longitude: 21.25,
            mode: ReservationMode::BestEffort,
            task: TaskTemplateDto { size_in_megabytes: 1.0, instruction_count: 10.0, solving_time: 0.3, limit_time: 0.5 },
            task_interval_ticks: 1,
            instruction_jitter: 0.0,
        })
        .unwrap()
    }

    #[test]
    fn added_vehicle_knows_its_handle() {
        let mut registry = Registry::new();
        let id = registry.add_vehicle(vehicle("car_1")).unwrap();

        assert_eq!(registry.get_vehicle(id).unwrap().get_id(), id);
        assert_eq!(registry.get_vehicle_by_name("car_1"), Some(id));
        assert_eq!(registry.vehicle_name(id), "car_1");
    }

    #[test]
    fn duplicate_names_and_stale_handles_are_errors() {
        let mut registry = Registry::new();
        registry.add_vehicle(vehicle("car_1")).unwrap();

        assert!(matches!(registry.add_vehicle(vehicle("car_1")), Err(Error::ConfigurationError(_))));
        assert!(matches!(registry.get_solver(SolverId::default()), Err(Error::UnknownSolver(_))));
        assert_eq!(registry.number_of_vehicles(), 1);
    }
}

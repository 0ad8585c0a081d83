use std::collections::{BTreeSet, HashMap};

use crate::domain::registry::{Registry, SolverId, VehicleId};
use crate::domain::task::task::Task;
use crate::error::Result;

/// Which solver serves which vehicle over the radio.
///
/// Each vehicle is attached to at most one solver. Attaching creates the vehicle's uplink and downlink processors on
/// the solver, detaching removes them together with any radio work still queued there.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    vehicle_to_solver: HashMap<VehicleId, SolverId>,
    solver_to_vehicles: HashMap<SolverId, BTreeSet<VehicleId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_serving_solver(&self, vehicle: VehicleId) -> Option<SolverId> {
        self.vehicle_to_solver.get(&vehicle).copied()
    }

    pub fn get_connected_vehicles(&self, solver: SolverId) -> Vec<VehicleId> {
        match self.solver_to_vehicles.get(&solver) {
            Some(vehicles) => vehicles.iter().copied().collect(),
            None => Vec::new(),
        }
    }

    /// Attaches `vehicle` to `solver`, detaching it from its previous solver first.
    ///
    /// # Returns
    /// The tasks whose radio transfer was cut off by the switch. They are marked `ProcessingFailed`.
    pub fn connect(&mut self, vehicle: VehicleId, solver: SolverId, registry: &mut Registry) -> Result<Vec<Task>> {
        if self.get_serving_solver(vehicle) == Some(solver) {
            return Ok(Vec::new());
        }

        // Resolve first so that an unknown solver leaves the current connection in place.
        registry.get_solver(solver)?;

        let dropped = self.disconnect(vehicle, registry)?;

        registry.get_solver_mut(solver)?.connect_peer(vehicle);
        self.vehicle_to_solver.insert(vehicle, solver);
        self.solver_to_vehicles.entry(solver).or_default().insert(vehicle);

        log::debug!("{:?} connected to {:?}.", vehicle, solver);
        Ok(dropped)
    }

    /// Detaches `vehicle` from its serving solver, if any.
    ///
    /// # Returns
    /// The tasks whose radio transfer was cut off. They are marked `ProcessingFailed`.
    pub fn disconnect(&mut self, vehicle: VehicleId, registry: &mut Registry) -> Result<Vec<Task>> {
        let Some(solver) = self.vehicle_to_solver.remove(&vehicle) else {
            return Ok(Vec::new());
        };

        if let Some(vehicles) = self.solver_to_vehicles.get_mut(&solver) {
            vehicles.remove(&vehicle);
        }

        let dropped = registry.get_solver_mut(solver)?.disconnect_peer(vehicle)?;
        if !dropped.is_empty() {
            log::warn!("{:?} left {:?} with {} task(s) in transfer, marked as failed.", vehicle, solver, dropped.len());
        }

        Ok(dropped)
    }
}

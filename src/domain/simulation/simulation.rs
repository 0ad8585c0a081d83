use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

use crate::api::simulation_dto::{ReservationMode, SimulationDto};
use crate::domain::location::Location;
use crate::domain::radio::connection_registry::ConnectionRegistry;
use crate::domain::radio::radio_data_rate::ModulationTable;
use crate::domain::radio::sinr::{RadioProfile, calculate_sinr};
use crate::domain::radio::sinr_map::SinrMap;
use crate::domain::registry::{Registry, SolverId, VehicleId};
use crate::domain::search::solver_search::search_best_solver;
use crate::domain::solver::solver::Solver;
use crate::domain::statistics::simulation_summary::SimulationSummary;
use crate::domain::statistics::task_record_collector::TaskRecordCollector;
use crate::domain::task::task::{Task, TaskStatus};
use crate::domain::task::task_record::TaskRecord;
use crate::domain::time::{SimulationClock, default_start};
use crate::domain::utils::id::{IdGenerator, TaskTag};
use crate::domain::vehicle::vehicle::Vehicle;
use crate::error::{Error, Result};

/// The tick driver. Owns every solver and vehicle, the radio state and the clock.
///
/// One `step` covers the tick `[now, now + tick)`:
/// 1. the radio profiles of all solvers are snapshotted,
/// 2. link qualities of connected vehicles are refreshed,
/// 3. due vehicles create tasks, which are reserved and admitted (**NFT** vehicles) or uploaded over the radio
///    (**best-effort** vehicles),
/// 4. every solver runs `solve_tasks`, finished tasks go back to their owners and to the record collector,
/// 5. the clock advances.
pub struct Simulation {
    registry: Registry,
    connections: ConnectionRegistry,
    sinr_map: SinrMap,

    clock: SimulationClock,
    number_of_ticks: u64,
    tick_number: u64,

    task_ids: IdGenerator<TaskTag>,
    rng: StdRng,

    collector: Option<TaskRecordCollector>,
    summary: SimulationSummary,
}

impl Simulation {
    pub fn from_dto(dto: SimulationDto) -> Result<Self> {
        let clock_dto = &dto.clock;
        if clock_dto.tick_seconds <= 0.0 || clock_dto.processing_iteration_seconds <= 0.0 {
            return Err(Error::ConfigurationError("Tick and processing iteration must be positive.".to_string()));
        }

        let sinr_dto = &dto.sinr_map;
        if sinr_dto.cell_size <= 0.0 || !(0.0..=1.0).contains(&sinr_dto.update_param) {
            return Err(Error::ConfigurationError(format!(
                "SINR map needs a positive cell size and an update parameter within [0, 1], got {} and {}.",
                sinr_dto.cell_size, sinr_dto.update_param
            )));
        }

        let start = clock_dto.start.unwrap_or_else(default_start);
        let tick_seconds = clock_dto.tick_seconds;
        let iteration_seconds = clock_dto.processing_iteration_seconds;

        let modulation = match &dto.modulation_table_path {
            Some(path) => {
                log::info!("Loading modulation table from '{}'.", path);
                ModulationTable::from_csv_file(path)?
            }
            None => ModulationTable::lte_cqi(),
        };
        let modulation = Arc::new(modulation);

        let mut registry = Registry::new();
        for solver_dto in &dto.solvers {
            let solver = Solver::from_dto(solver_dto, start, iteration_seconds, tick_seconds, Arc::clone(&modulation), sinr_dto.floor)?;
            registry.add_solver(solver)?;
        }

        for vehicle_dto in &dto.vehicles {
            registry.add_vehicle(Vehicle::from_dto(vehicle_dto)?)?;
        }

        if registry.number_of_solvers() == 0 {
            log::warn!("Scenario without solvers: every task will fail to find a solver.");
        }

        log::info!(
            "Simulation built with {} solver(s) and {} vehicle(s), {} tick(s) of {} s starting at {}.",
            registry.number_of_solvers(),
            registry.number_of_vehicles(),
            clock_dto.number_of_ticks,
            tick_seconds,
            start
        );

        Ok(Simulation {
            registry,
            connections: ConnectionRegistry::new(),
            sinr_map: SinrMap::new(sinr_dto.cell_size, sinr_dto.update_param, sinr_dto.floor, sinr_dto.history_capacity),
            clock: SimulationClock::new(start, tick_seconds),
            number_of_ticks: clock_dto.number_of_ticks,
            tick_number: 0,
            task_ids: IdGenerator::new(),
            rng: StdRng::seed_from_u64(dto.seed),
            collector: None,
            summary: SimulationSummary::default(),
        })
    }

    /// Attaches a record sink. Every task that reaches a final state from now on is written to it.
    pub fn set_collector(&mut self, collector: TaskRecordCollector) {
        self.collector = Some(collector);
    }

    /// Waits until all task records are written.
    pub fn shutdown_collector(&mut self) {
        if let Some(collector) = self.collector.take() {
            collector.shutdown();
        }
    }

    pub fn get_registry(&self) -> &Registry {
        &self.registry
    }

    pub fn get_registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn get_connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn get_sinr_map(&self) -> &SinrMap {
        &self.sinr_map
    }

    pub fn get_clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn get_number_of_ticks(&self) -> u64 {
        self.number_of_ticks
    }

    pub fn get_tick_number(&self) -> u64 {
        self.tick_number
    }

    pub fn get_summary(&self) -> &SimulationSummary {
        &self.summary
    }

    /// Runs `ticks` steps, or the configured number of ticks with `None`.
    pub fn run(&mut self, ticks: Option<u64>) -> Result<SimulationSummary> {
        let ticks = ticks.unwrap_or(self.number_of_ticks);
        log::info!("Running {} tick(s).", ticks);

        for _ in 0..ticks {
            self.step()?;
        }

        if let Some(collector) = &self.collector {
            collector.flush();
        }

        log::info!(
            "Run finished at {}: {} generated, {} solved, {} timed out, {} without solver, {} failed in processing.",
            self.clock.get_current_time(),
            self.summary.generated,
            self.summary.solved,
            self.summary.timed_out,
            self.summary.failed_to_find_solver,
            self.summary.processing_failed
        );

        Ok(self.summary)
    }

    /// Simulates one tick.
    ///
    /// Errors classified as fatal abort the step; all others are logged and end up as a task status.
    pub fn step(&mut self) -> Result<()> {
        let now = self.clock.get_current_time();
        let snapshot: Vec<(SolverId, RadioProfile)> = self.registry.solvers().map(|s| (s.get_id(), s.get_radio_profile())).collect();
        let candidates = self.registry.solver_ids();

        self.refresh_link_qualities(&snapshot)?;

        for vehicle_id in self.registry.vehicle_ids() {
            let vehicle = self.registry.get_vehicle_mut(vehicle_id)?;
            if !vehicle.is_task_due(self.tick_number) {
                continue;
            }

            let task = vehicle.create_task(&self.task_ids, now, &mut self.rng);
            let location = vehicle.get_location();
            let mode = vehicle.get_mode();
            self.summary.record_generated();

            let submitted = match mode {
                ReservationMode::Nft => self.submit_reserved(task, &location, &candidates, &snapshot),
                ReservationMode::BestEffort => self.submit_best_effort(task, &location, &snapshot),
            };

            if let Err(e) = submitted {
                if e.is_fatal() {
                    log::error!("Aborting tick at {}: {}", now, e);
                    return Err(e);
                }
                log::warn!("Task of vehicle {} was not admitted: {}", self.registry.vehicle_name(vehicle_id), e);
            }
        }

        for solver_id in candidates {
            let finished = self.registry.get_solver_mut(solver_id)?.solve_tasks(now)?;
            for task in finished {
                self.deliver(task)?;
            }
        }

        if self.clock.advance() {
            log::info!("Simulation entered a new day: {}.", self.clock.get_current_time().date());
        }
        self.tick_number += 1;

        log::debug!(
            "Tick {} done, {} task(s) in flight, {} SINR value(s) cached.",
            self.tick_number,
            self.summary.in_flight(),
            self.sinr_map.number_of_cached_values()
        );

        Ok(())
    }

    /// Feeds a fresh SINR sample of every connected vehicle into the map and hands the smoothed value to its solver.
    fn refresh_link_qualities(&mut self, snapshot: &[(SolverId, RadioProfile)]) -> Result<()> {
        for vehicle_id in self.registry.vehicle_ids() {
            let Some(solver_id) = self.connections.get_serving_solver(vehicle_id) else {
                continue;
            };

            let location = self.registry.get_vehicle(vehicle_id)?.get_location();
            let profile = self.registry.get_solver(solver_id)?.get_radio_profile();
            let sample = calculate_sinr(&location, solver_id, &profile, snapshot);
            let sinr = self.sinr_map.update(&location, solver_id, sample, Some(vehicle_id));

            self.registry.get_solver_mut(solver_id)?.update_link_quality(vehicle_id, sinr);
        }

        Ok(())
    }

    /// Searches a solver, signs the priced token and admits the task into the solver's NFT lane.
    fn submit_reserved(
        &mut self,
        mut task: Task,
        location: &Location,
        candidates: &[SolverId],
        snapshot: &[(SolverId, RadioProfile)],
    ) -> Result<()> {
        let token = match search_best_solver(&task, location, candidates, &self.registry, &mut self.sinr_map, snapshot) {
            Ok(token) => token,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::debug!("{:?}: {}", task.get_id(), e);
                return self.fail_to_find_solver(task);
            }
        };

        let solver = self.registry.get_solver_mut(token.get_solver())?;
        let signed = match solver.commit_reservation(token) {
            Ok(signed) => signed,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::info!("Solver {} refused to sign for {:?}: {}", solver.get_name(), task.get_id(), e);
                return self.fail_to_find_solver(task);
            }
        };

        let transfer_seconds = signed.get_single_transfer_time();
        task.set_token(signed);

        solver.receive_task(task, transfer_seconds)
    }

    /// Connects the vehicle to the solver it hears best and queues the task on that solver's uplink.
    fn submit_best_effort(&mut self, task: Task, location: &Location, snapshot: &[(SolverId, RadioProfile)]) -> Result<()> {
        let Some((solver_id, sinr)) = self.sinr_map.best_serving_solver(location, snapshot) else {
            return self.fail_to_find_solver(task);
        };

        let owner = task.get_owner();
        let dropped = self.connections.connect(owner, solver_id, &mut self.registry)?;
        for dropped_task in dropped {
            self.deliver(dropped_task)?;
        }

        let solver = self.registry.get_solver_mut(solver_id)?;
        solver.update_link_quality(owner, sinr);
        solver.upload_task(task)
    }

    fn fail_to_find_solver(&mut self, mut task: Task) -> Result<()> {
        task.transition(TaskStatus::FailedToFindSolver)?;
        self.deliver(task)
    }

    /// Hands a finished task back to its owner, counts it and writes its record.
    fn deliver(&mut self, task: Task) -> Result<()> {
        let owner = task.get_owner();
        self.registry.get_vehicle_mut(owner)?.receive_solved_task(&task)?;
        self.summary.record(&task);

        if let Some(collector) = &self.collector {
            let solver = task.get_solver().map(|id| self.registry.solver_name(id));
            collector.add_record(TaskRecord::from_task(&task, self.registry.vehicle_name(owner), solver));
        }

        Ok(())
    }

    /// Drops a vehicle's radio link, failing its in-transfer tasks.
    pub fn disconnect_vehicle(&mut self, vehicle: VehicleId) -> Result<()> {
        for task in self.connections.disconnect(vehicle, &mut self.registry)? {
            self.deliver(task)?;
        }

        Ok(())
    }
}

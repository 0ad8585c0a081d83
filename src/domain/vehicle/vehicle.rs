use rand::Rng;
use std::collections::{HashMap, HashSet};

use crate::api::simulation_dto::{ReservationMode, TaskTemplateDto, VehicleDto};
use crate::domain::location::Location;
use crate::domain::registry::{SolverId, VehicleId};
use crate::domain::task::task::{Task, TaskId, TaskStatus};
use crate::domain::time::SimTime;
use crate::domain::utils::id::{IdGenerator, TaskTag};
use crate::error::{Error, Result};

/// The vehicle's own record of how a solver treated its tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverView {
    pub successful: u64,
    pub failed: u64,
}

impl SolverView {
    pub fn reputation(&self) -> f64 {
        let total = self.successful + self.failed;
        if total == 0 {
            return 1.0;
        }

        self.successful as f64 / total as f64
    }
}

/// A mobile client offloading periodic tasks.
#[derive(Debug, Clone)]
pub struct Vehicle {
    id: VehicleId,
    name: String,
    location: Location,
    mode: ReservationMode,
    template: TaskTemplateDto,
    task_interval_ticks: u64,
    instruction_jitter: f64,

    active_tasks: HashSet<TaskId>,

    solved: u64,
    timed_out: u64,
    processing_failed: u64,
    failed_to_find_solver: u64,

    solver_views: HashMap<SolverId, SolverView>,
}

impl Vehicle {
    pub fn from_dto(dto: &VehicleDto) -> Result<Self> {
        let template = &dto.task;
        if template.solving_time <= 0.0 || template.limit_time <= template.solving_time {
            return Err(Error::ConfigurationError(format!(
                "Vehicle {}: the task limit time ({} s) must exceed a positive solving time ({} s).",
                dto.name, template.limit_time, template.solving_time
            )));
        }

        if template.instruction_count <= 0.0 || template.size_in_megabytes < 0.0 {
            return Err(Error::ConfigurationError(format!("Vehicle {}: the task template needs positive work.", dto.name)));
        }

        if dto.task_interval_ticks == 0 || !(0.0..1.0).contains(&dto.instruction_jitter) {
            return Err(Error::ConfigurationError(format!(
                "Vehicle {}: task interval must be positive and instruction jitter within [0, 1).",
                dto.name
            )));
        }

        Ok(Vehicle {
            id: VehicleId::default(),
            name: dto.name.clone(),
            location: Location::new(dto.latitude, dto.longitude),
            mode: dto.mode,
            template: dto.task.clone(),
            task_interval_ticks: dto.task_interval_ticks,
            instruction_jitter: dto.instruction_jitter,
            active_tasks: HashSet::new(),
            solved: 0,
            timed_out: 0,
            processing_failed: 0,
            failed_to_find_solver: 0,
            solver_views: HashMap::new(),
        })
    }

    pub fn get_id(&self) -> VehicleId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: VehicleId) {
        self.id = id;
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_location(&self) -> Location {
        self.location
    }

    /// Positions come from the movement layer; the vehicle only stores the latest one.
    pub fn set_location(&mut self, location: Location) {
        self.location = location;
    }

    pub fn get_mode(&self) -> ReservationMode {
        self.mode
    }

    pub fn get_active_tasks(&self) -> usize {
        self.active_tasks.len()
    }

    pub fn get_solved(&self) -> u64 {
        self.solved
    }

    pub fn get_timed_out(&self) -> u64 {
        self.timed_out
    }

    pub fn get_processing_failed(&self) -> u64 {
        self.processing_failed
    }

    pub fn get_failed_to_find_solver(&self) -> u64 {
        self.failed_to_find_solver
    }

    /// Whether the vehicle emits a task in tick number `tick`.
    pub fn is_task_due(&self, tick: u64) -> bool {
        tick % self.task_interval_ticks == 0
    }

    /// Creates a task from the template, with the instruction count jittered by up to `instruction_jitter`.
    pub fn create_task<R: Rng>(&mut self, ids: &IdGenerator<TaskTag>, now: SimTime, rng: &mut R) -> Task {
        let mut instruction_count = self.template.instruction_count;
        if self.instruction_jitter > 0.0 {
            instruction_count *= 1.0 + rng.random_range(-self.instruction_jitter..=self.instruction_jitter);
        }

        let task = Task::new(
            ids.next_id(),
            self.id,
            self.template.size_in_megabytes,
            instruction_count,
            self.template.solving_time,
            self.template.limit_time,
            now,
        );
        self.active_tasks.insert(task.get_id());

        task
    }

    /// Bookkeeping once a task of this vehicle reached a final state.
    pub fn receive_solved_task(&mut self, task: &Task) -> Result<()> {
        if task.get_owner() != self.id {
            return Err(Error::UnknownVehicle(format!("{:?} does not belong to vehicle {}", task.get_id(), self.name)));
        }

        self.active_tasks.remove(&task.get_id());

        let status = task.get_status();
        match status {
            Some(TaskStatus::Solved) => self.solved += 1,
            Some(TaskStatus::TaskTimedOut) => self.timed_out += 1,
            Some(TaskStatus::ProcessingFailed) => self.processing_failed += 1,
            Some(TaskStatus::FailedToFindSolver) => self.failed_to_find_solver += 1,
            _ => log::warn!("Vehicle {} got back {:?} in state {:?}.", self.name, task.get_id(), status),
        }

        if let Some(solver) = task.get_solver() {
            let view = self.solver_views.entry(solver).or_default();
            match status {
                Some(TaskStatus::Solved) => view.successful += 1,
                Some(TaskStatus::TaskTimedOut) | Some(TaskStatus::ProcessingFailed) => view.failed += 1,
                _ => {}
            }
        }

        Ok(())
    }

    /// This vehicle's view of a solver's reliability, `1.0` without any history.
    pub fn reputation_of(&self, solver: SolverId) -> f64 {
        self.solver_views.get(&solver).map(|view| view.reputation()).unwrap_or(1.0)
    }
}

use serde::Serialize;

use crate::domain::registry::{SolverId, VehicleId};
use crate::domain::reservation::token::ReservationToken;
use crate::domain::time::{SimTime, seconds, seconds_between};
use crate::domain::utils::id::{Id, TaskTag};
use crate::error::{Error, Result};

pub type TaskId = Id<TaskTag>;

/// Lifecycle state of a task. The numeric codes are part of the persisted record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskStatus {
    Submitted,
    BeingProcessed,
    Solved,
    ProcessingFailed,
    TaskTimedOut,
    FailedToFindSolver,
}

impl TaskStatus {
    pub fn code(&self) -> u8 {
        match self {
            TaskStatus::Submitted => 1,
            TaskStatus::BeingProcessed => 2,
            TaskStatus::Solved => 3,
            TaskStatus::ProcessingFailed => 4,
            TaskStatus::TaskTimedOut => 5,
            TaskStatus::FailedToFindSolver => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TaskStatus::Submitted => "SUBMITTED",
            TaskStatus::BeingProcessed => "BEING_PROCESSED",
            TaskStatus::Solved => "SOLVED",
            TaskStatus::ProcessingFailed => "PROCESSING_FAILED",
            TaskStatus::TaskTimedOut => "TASK_TIMED_OUT",
            TaskStatus::FailedToFindSolver => "FAILED_TO_FIND_SOLVER",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TaskStatus::Solved | TaskStatus::ProcessingFailed | TaskStatus::TaskTimedOut | TaskStatus::FailedToFindSolver
        )
    }

    /// Whether a task may move from `from` to `to`. States are never revisited.
    fn is_allowed(from: Option<TaskStatus>, to: TaskStatus) -> bool {
        match (from, to) {
            (None, TaskStatus::Submitted) | (None, TaskStatus::FailedToFindSolver) => true,
            (Some(TaskStatus::Submitted), TaskStatus::BeingProcessed) => true,
            (Some(TaskStatus::Submitted), TaskStatus::ProcessingFailed) | (Some(TaskStatus::Submitted), TaskStatus::TaskTimedOut) => true,
            (Some(TaskStatus::BeingProcessed), s) => matches!(s, TaskStatus::Solved | TaskStatus::ProcessingFailed | TaskStatus::TaskTimedOut),
            _ => false,
        }
    }
}

/// The unit of work a vehicle offloads to a solver.
///
/// Owner and solver are handles into the simulation registry. The task keeps a copy of its reservation token so that
/// records can be written after the solver dropped the token from its collection.
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    owner: VehicleId,
    solver: Option<SolverId>,

    size_in_megabytes: f64,

    /// Remaining work. Only ever decreases.
    instruction_count: f64,
    initial_instruction_count: f64,

    /// Planned compute duration in seconds.
    solving_time: f64,

    /// Total round-trip budget in seconds.
    limit_time: f64,

    created_at: SimTime,
    deadline_at: SimTime,
    received_at: Option<SimTime>,
    solved_at: Option<SimTime>,
    returned_at: Option<SimTime>,

    /// One-way transfer time in seconds, known once the task was priced or uploaded.
    single_transfer_time: Option<f64>,

    token: Option<ReservationToken>,
    status: Option<TaskStatus>,
}

impl Task {
    pub fn new(
        id: TaskId,
        owner: VehicleId,
        size_in_megabytes: f64,
        instruction_count: f64,
        solving_time: f64,
        limit_time: f64,
        created_at: SimTime,
    ) -> Self {
        Task {
            id,
            owner,
            solver: None,
            size_in_megabytes,
            instruction_count,
            initial_instruction_count: instruction_count,
            solving_time,
            limit_time,
            created_at,
            deadline_at: created_at + seconds(limit_time),
            received_at: None,
            solved_at: None,
            returned_at: None,
            single_transfer_time: None,
            token: None,
            status: None,
        }
    }

    pub fn get_id(&self) -> TaskId {
        self.id
    }

    pub fn get_owner(&self) -> VehicleId {
        self.owner
    }

    pub fn get_solver(&self) -> Option<SolverId> {
        self.solver
    }

    pub fn set_solver(&mut self, solver: SolverId) {
        self.solver = Some(solver);
    }

    pub fn get_size_in_megabytes(&self) -> f64 {
        self.size_in_megabytes
    }

    pub fn get_instruction_count(&self) -> f64 {
        self.instruction_count
    }

    pub fn get_initial_instruction_count(&self) -> f64 {
        self.initial_instruction_count
    }

    pub fn get_solving_time(&self) -> f64 {
        self.solving_time
    }

    pub fn get_limit_time(&self) -> f64 {
        self.limit_time
    }

    pub fn get_created_at(&self) -> SimTime {
        self.created_at
    }

    pub fn get_deadline_at(&self) -> SimTime {
        self.deadline_at
    }

    pub fn get_received_at(&self) -> Option<SimTime> {
        self.received_at
    }

    pub fn set_received_at(&mut self, time: SimTime) {
        self.received_at = Some(time);
    }

    pub fn get_solved_at(&self) -> Option<SimTime> {
        self.solved_at
    }

    pub fn set_solved_at(&mut self, time: SimTime) {
        self.solved_at = Some(time);
    }

    pub fn get_returned_at(&self) -> Option<SimTime> {
        self.returned_at
    }

    pub fn set_returned_at(&mut self, time: SimTime) {
        self.returned_at = Some(time);
    }

    pub fn get_single_transfer_time(&self) -> Option<f64> {
        self.single_transfer_time
    }

    pub fn set_single_transfer_time(&mut self, transfer_seconds: f64) {
        self.single_transfer_time = Some(transfer_seconds);
    }

    pub fn get_token(&self) -> Option<&ReservationToken> {
        self.token.as_ref()
    }

    /// Attaches a reservation token and binds the task to the token's solver.
    pub fn set_token(&mut self, token: ReservationToken) {
        self.solver = Some(token.get_solver());
        self.single_transfer_time = Some(token.get_single_transfer_time());
        self.token = Some(token);
    }

    pub fn get_status(&self) -> Option<TaskStatus> {
        self.status
    }

    /// Removes up to `amount` instructions and returns how many were actually removed.
    pub fn consume_instructions(&mut self, amount: f64) -> f64 {
        let used = amount.max(0.0).min(self.instruction_count);
        self.instruction_count -= used;
        used
    }

    pub fn is_solved(&self) -> bool {
        self.instruction_count <= 0.0
    }

    /// Moves the task to `status`, rejecting transitions that would revisit a state.
    ///
    /// Only `BeingProcessed` may be entered again, once per pipeline stage the task passes.
    pub fn transition(&mut self, status: TaskStatus) -> Result<()> {
        if status == TaskStatus::BeingProcessed && self.status == Some(status) {
            return Ok(());
        }

        if !TaskStatus::is_allowed(self.status, status) {
            return Err(Error::InvalidTaskTransition { task: self.id, from: self.status, to: status });
        }

        log::trace!("{:?} moves from {:?} to {:?}.", self.id, self.status, status);
        self.status = Some(status);
        Ok(())
    }

    /// Checks whether the task already missed its deadline at `time`.
    pub fn is_late_at(&self, time: SimTime) -> bool {
        time > self.deadline_at
    }

    /// Final classification after the result came back: `Solved` unless the return missed the deadline.
    ///
    /// # Returns
    /// The status the task ended in.
    pub fn finish(&mut self, returned_at: SimTime) -> Result<TaskStatus> {
        self.returned_at = Some(returned_at);

        let status = if self.is_late_at(returned_at) { TaskStatus::TaskTimedOut } else { TaskStatus::Solved };
        self.transition(status)?;

        Ok(status)
    }

    /// Seconds from creation to the return of the result, if the result came back.
    pub fn get_total_time(&self) -> Option<f64> {
        self.returned_at.map(|returned| seconds_between(self.created_at, returned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time::default_start;

    fn task() -> Task {
        Task::new(Id::new(1), VehicleId::default(), 1.0, 9.0, 0.3, 0.5, default_start())
    }

    #[test]
    fn deadline_is_creation_plus_limit() {
        let task = task();
        assert_eq!(task.get_deadline_at(), default_start() + seconds(0.5));
    }

    #[test]
    fn status_codes_match_record_format() {
        assert_eq!(TaskStatus::Submitted.code(), 1);
        assert_eq!(TaskStatus::FailedToFindSolver.code(), 6);
        assert_eq!(TaskStatus::TaskTimedOut.name(), "TASK_TIMED_OUT");
    }

    #[test]
    fn transitions_are_monotone() {
        let mut task = task();

        assert!(task.transition(TaskStatus::BeingProcessed).is_err());
        task.transition(TaskStatus::Submitted).unwrap();
        task.transition(TaskStatus::BeingProcessed).unwrap();
        task.transition(TaskStatus::BeingProcessed).unwrap();
        task.transition(TaskStatus::Solved).unwrap();

        let back = task.transition(TaskStatus::Submitted);
        assert!(matches!(back, Err(Error::InvalidTaskTransition { from: Some(TaskStatus::Solved), .. })));
    }

    #[test]
    fn task_is_submitted_only_once() {
        let mut task = task();
        task.transition(TaskStatus::Submitted).unwrap();

        let again = task.transition(TaskStatus::Submitted);
        assert!(matches!(again, Err(Error::InvalidTaskTransition { from: Some(TaskStatus::Submitted), to: TaskStatus::Submitted, .. })));

        task.transition(TaskStatus::TaskTimedOut).unwrap();
        assert!(task.transition(TaskStatus::TaskTimedOut).is_err());
    }

    #[test]
    fn instructions_never_go_below_zero() {
        let mut task = task();

        assert_eq!(task.consume_instructions(4.0), 4.0);
        assert_eq!(task.consume_instructions(-1.0), 0.0);
        assert_eq!(task.consume_instructions(10.0), 5.0);
        assert!(task.is_solved());
    }

    #[test]
    fn late_return_is_timed_out() {
        let mut task = task();
        task.transition(TaskStatus::Submitted).unwrap();
        task.transition(TaskStatus::BeingProcessed).unwrap();

        let status = task.finish(default_start() + seconds(0.51)).unwrap();
        assert_eq!(status, TaskStatus::TaskTimedOut);
        assert!((task.get_total_time().unwrap() - 0.51).abs() < 1e-9);
    }
}

use crate::domain::task::task::{Task, TaskStatus};
use crate::domain::time::SimTime;
use crate::error::Result;

/// A divisible unit of work consumed incrementally by a [`crate::domain::processing::fifo_processor::FifoProcessor`].
pub trait Processable {
    /// Identifier used as tie-break when two items can start at the same time.
    fn get_order_id(&self) -> u64;

    /// Earliest time processing may begin.
    fn can_start_process_at(&self) -> SimTime;

    /// Remaining amount of work.
    fn to_process_amount(&self) -> f64;

    /// Time after which the item is no longer worth processing. `None` means it never times out.
    fn timeout_at(&self) -> Option<SimTime> {
        None
    }

    /// Consumes up to `available` units of work.
    ///
    /// # Returns
    /// The amount actually used.
    fn process(&mut self, available: f64) -> f64;

    fn is_processed(&self) -> bool {
        self.to_process_amount() <= 0.0
    }

    fn get_processed_at(&self) -> Option<SimTime>;

    fn set_processed_at(&mut self, time: SimTime);

    /// Hook invoked right before the item first consumes power.
    fn on_processing_started(&mut self) -> Result<()> {
        Ok(())
    }
}

/// What a [`TaskProcessable`] consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessableKind {
    /// CPU work, measured in instructions. Consumes the task's own instruction count.
    Compute,
    /// A radio transfer, measured in megabytes.
    Connection,
}

/// A task wrapped for one stage of its processing pipeline.
///
/// The processable carries the task through the queue and hands it back once the stage finished or timed out.
#[derive(Debug, Clone)]
pub struct TaskProcessable {
    task: Task,
    kind: ProcessableKind,
    can_start_at: SimTime,

    /// Megabytes still to transfer. Unused for compute items.
    remaining_transfer: f64,

    processed_at: Option<SimTime>,
}

impl TaskProcessable {
    pub fn compute(task: Task, can_start_at: SimTime) -> Self {
        TaskProcessable { task, kind: ProcessableKind::Compute, can_start_at, remaining_transfer: 0.0, processed_at: None }
    }

    pub fn connection(task: Task, can_start_at: SimTime) -> Self {
        let remaining_transfer = task.get_size_in_megabytes();
        TaskProcessable { task, kind: ProcessableKind::Connection, can_start_at, remaining_transfer, processed_at: None }
    }

    pub fn get_task(&self) -> &Task {
        &self.task
    }

    pub fn get_task_mut(&mut self) -> &mut Task {
        &mut self.task
    }

    pub fn into_task(self) -> Task {
        self.task
    }
}

impl Processable for TaskProcessable {
    fn get_order_id(&self) -> u64 {
        self.task.get_id().get()
    }

    fn can_start_process_at(&self) -> SimTime {
        self.can_start_at
    }

    fn to_process_amount(&self) -> f64 {
        match self.kind {
            ProcessableKind::Compute => self.task.get_instruction_count(),
            ProcessableKind::Connection => self.remaining_transfer,
        }
    }

    fn timeout_at(&self) -> Option<SimTime> {
        Some(self.task.get_deadline_at())
    }

    fn process(&mut self, available: f64) -> f64 {
        match self.kind {
            ProcessableKind::Compute => self.task.consume_instructions(available),
            ProcessableKind::Connection => {
                let used = available.max(0.0).min(self.remaining_transfer);
                self.remaining_transfer -= used;
                used
            }
        }
    }

    fn get_processed_at(&self) -> Option<SimTime> {
        self.processed_at
    }

    fn set_processed_at(&mut self, time: SimTime) {
        self.processed_at = Some(time);
    }

    fn on_processing_started(&mut self) -> Result<()> {
        self.task.transition(TaskStatus::BeingProcessed)
    }
}

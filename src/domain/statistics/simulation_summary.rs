use serde::Serialize;

use crate::domain::task::task::{Task, TaskStatus};

/// Outcome counters of a simulation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub generated: u64,
    pub solved: u64,
    pub timed_out: u64,
    pub failed_to_find_solver: u64,
    pub processing_failed: u64,

    total_time_of_solved: f64,
}

impl SimulationSummary {
    pub fn record_generated(&mut self) {
        self.generated += 1;
    }

    /// Counts a task that reached a final state.
    pub fn record(&mut self, task: &Task) {
        match task.get_status() {
            Some(TaskStatus::Solved) => {
                self.solved += 1;
                self.total_time_of_solved += task.get_total_time().unwrap_or(0.0);
            }
            Some(TaskStatus::TaskTimedOut) => self.timed_out += 1,
            Some(TaskStatus::FailedToFindSolver) => self.failed_to_find_solver += 1,
            Some(TaskStatus::ProcessingFailed) => self.processing_failed += 1,
            _ => {}
        }
    }

    pub fn finished(&self) -> u64 {
        self.solved + self.timed_out + self.failed_to_find_solver + self.processing_failed
    }

    /// Tasks generated but not final yet.
    pub fn in_flight(&self) -> u64 {
        self.generated.saturating_sub(self.finished())
    }

    /// Mean round-trip time of solved tasks in seconds, `None` if nothing was solved.
    pub fn mean_total_time(&self) -> Option<f64> {
        if self.solved == 0 {
            return None;
        }

        Some(self.total_time_of_solved / self.solved as f64)
    }
}

use serde::Serialize;

use crate::domain::task::task::Task;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// One row of the per-task result table. Column order and names are a stable contract with downstream tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub task_id: u64,
    pub owner: String,
    pub solver: Option<String>,
    pub instruction_count: f64,
    pub size_in_megabytes: f64,
    pub single_transfer_time: Option<f64>,
    pub status_code: Option<u8>,
    pub status: Option<String>,
    pub created_at: String,
    pub received_at: Option<String>,
    pub solved_at: Option<String>,
    pub returned_at: Option<String>,
    pub deadline_from: String,
    pub deadline_to: String,
    pub total_time: Option<f64>,
    pub token_id: Option<String>,
    pub token_signed: Option<bool>,
    pub token_valid_from: Option<String>,
    pub token_valid_to: Option<String>,
    pub token_reserved_ips: Option<f64>,
    pub token_reserved_rbs: Option<u32>,
}

impl TaskRecord {
    /// Builds the record of a task. Owner and solver are passed as display names resolved by the caller.
    pub fn from_task(task: &Task, owner: String, solver: Option<String>) -> Self {
        let format = |time: chrono::NaiveDateTime| time.format(TIMESTAMP_FORMAT).to_string();
        let token = task.get_token();

        TaskRecord {
            task_id: task.get_id().get(),
            owner,
            solver,
            instruction_count: task.get_initial_instruction_count(),
            size_in_megabytes: task.get_size_in_megabytes(),
            single_transfer_time: task.get_single_transfer_time(),
            status_code: task.get_status().map(|s| s.code()),
            status: task.get_status().map(|s| s.name().to_string()),
            created_at: format(task.get_created_at()),
            received_at: task.get_received_at().map(format),
            solved_at: task.get_solved_at().map(format),
            returned_at: task.get_returned_at().map(format),
            deadline_from: format(task.get_created_at()),
            deadline_to: format(task.get_deadline_at()),
            total_time: task.get_total_time(),
            token_id: token.map(|t| t.get_id().to_string()),
            token_signed: token.map(|t| t.is_signed()),
            token_valid_from: token.map(|t| format(t.get_valid_from())),
            token_valid_to: token.map(|t| format(t.get_valid_to())),
            token_reserved_ips: token.map(|t| t.get_reserved_ips()),
            token_reserved_rbs: token.map(|t| t.get_reserved_rbs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::VehicleId;
    use crate::domain::task::task::TaskStatus;
    use crate::domain::time::default_start;
    use crate::domain::utils::id::Id;

    #[test]
    fn record_without_token_leaves_token_columns_empty() {
        let mut task = Task::new(Id::new(7), VehicleId::default(), 2.0, 100.0, 0.5, 1.0, default_start());
        task.transition(TaskStatus::FailedToFindSolver).unwrap();

        let record = TaskRecord::from_task(&task, "car_1".to_string(), None);

        assert_eq!(record.task_id, 7);
        assert_eq!(record.status_code, Some(6));
        assert_eq!(record.created_at, "2020-01-01 00:00:00.000");
        assert_eq!(record.deadline_to, "2020-01-01 00:00:01.000");
        assert!(record.token_id.is_none());
        assert!(record.total_time.is_none());
    }
}

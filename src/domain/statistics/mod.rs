pub mod simulation_summary;
pub mod task_record_collector;

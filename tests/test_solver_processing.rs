use std::sync::Arc;

use nft_offloading_sim::api::simulation_dto::{ReservationMode, SolverDto, TaskTemplateDto, VehicleDto};
use nft_offloading_sim::domain::radio::connection_registry::ConnectionRegistry;
use nft_offloading_sim::domain::radio::radio_data_rate::ModulationTable;
use nft_offloading_sim::domain::registry::{Registry, SolverId, VehicleId};
use nft_offloading_sim::domain::reservation::time_window::TimeWindow;
use nft_offloading_sim::domain::solver::solver::Solver;
use nft_offloading_sim::domain::task::task::{Task, TaskStatus};
use nft_offloading_sim::domain::time::{default_start, seconds, seconds_between};
use nft_offloading_sim::domain::utils::id::Id;
use nft_offloading_sim::domain::vehicle::vehicle::Vehicle;
use nft_offloading_sim::error::Error;

const EPSILON: f64 = 1e-6;

fn setup() -> (Registry, SolverId, VehicleId) {
    let mut registry = Registry::new();
    let dto: SolverDto = serde_json::from_value(serde_json::json!({ "name": "bs_1", "latitude": 48.7, "longitude": 21.25 })).unwrap();
    let solver = Solver::from_dto(&dto, default_start(), 0.1, 1.0, Arc::new(ModulationTable::lte_cqi()), -100.0).unwrap();
    let solver_id = registry.add_solver(solver).unwrap();

    let vehicle = VehicleDto {
        name: "car_1".to_string(),
        latitude: 48.7,
        longitude: 21.25,
        mode: ReservationMode::Nft,
        task: TaskTemplateDto { size_in_megabytes: 0.1, instruction_count: 9.0, solving_time: 0.3, limit_time: 0.5 },
        task_interval_ticks: 1,
        instruction_jitter: 0.0,
    };
    let vehicle_id = registry.add_vehicle(Vehicle::from_dto(&vehicle).unwrap()).unwrap();

    (registry, solver_id, vehicle_id)
}

fn task(id: u64, owner: VehicleId, limit_time: f64) -> Task {
    Task::new(Id::new(id), owner, 0.1, 9.0, 0.3, limit_time, default_start())
}

#[test]
fn best_effort_task_with_fixed_transfer_is_solved() {
    let (mut registry, solver_id, owner) = setup();
    let solver = registry.get_solver_mut(solver_id).unwrap();

    solver.receive_task(task(1, owner, 0.5), 0.1).unwrap();
    let finished = solver.solve_tasks(default_start()).unwrap();

    assert_eq!(finished.len(), 1);
    let done = &finished[0];
    assert_eq!(done.get_status(), Some(TaskStatus::Solved));
    assert_eq!(done.get_received_at(), Some(default_start() + seconds(0.1)));

    // 9 instructions at 70 ips, then 0.1 s back.
    let total = done.get_total_time().unwrap();
    assert!((total - (0.1 + 9.0 / 70.0 + 0.1)).abs() < 1e-3, "total time {}", total);
    assert_eq!(solver.get_successful_tasks(), 1);
}

#[test]
fn slow_transfer_makes_the_task_time_out() {
    let (mut registry, solver_id, owner) = setup();
    let solver = registry.get_solver_mut(solver_id).unwrap();

    solver.receive_task(task(1, owner, 0.5), 0.2).unwrap();
    let finished = solver.solve_tasks(default_start()).unwrap();

    assert_eq!(finished[0].get_status(), Some(TaskStatus::TaskTimedOut));
    assert!(finished[0].get_returned_at().unwrap() > finished[0].get_deadline_at());
    assert_eq!(solver.reputation(), 0.0);
}

#[test]
fn arrival_after_deadline_times_out_at_admission() {
    let (mut registry, solver_id, owner) = setup();
    let solver = registry.get_solver_mut(solver_id).unwrap();

    solver.receive_task(task(1, owner, 0.5), 0.6).unwrap();
    let finished = solver.solve_tasks(default_start()).unwrap();

    assert_eq!(finished[0].get_status(), Some(TaskStatus::TaskTimedOut));
    assert_eq!(finished[0].get_solved_at(), None);
}

#[test]
fn reserved_task_runs_at_its_reserved_rate() {
    let (mut registry, solver_id, owner) = setup();
    let solver = registry.get_solver_mut(solver_id).unwrap();

    let mut reserved = task(1, owner, 0.5);
    let window = TimeWindow::new(default_start(), reserved.get_deadline_at()).unwrap();
    let token = solver.price_reservation(owner, window, 30.0, 0.1, 1.0, 1).unwrap();
    reserved.set_token(solver.commit_reservation(token).unwrap());

    solver.receive_task(reserved, 0.1).unwrap();
    assert_eq!(solver.get_nft_lane_len(), 1);

    let finished = solver.solve_tasks(default_start()).unwrap();
    let done = &finished[0];

    assert_eq!(done.get_status(), Some(TaskStatus::Solved));
    assert!((seconds_between(default_start(), done.get_solved_at().unwrap()) - 0.4).abs() < 1e-3);
    assert!(done.get_returned_at().unwrap() <= done.get_deadline_at());
    assert!(solver.get_tokens().is_empty(), "token of a finished task is removed");
}

#[test]
fn arrival_outside_the_token_window_fails_the_task() {
    let (mut registry, solver_id, owner) = setup();
    let solver = registry.get_solver_mut(solver_id).unwrap();

    let mut reserved = task(1, owner, 2.0);
    let window = TimeWindow::new(default_start() + seconds(0.5), default_start() + seconds(1.0)).unwrap();
    let token = solver.price_reservation(owner, window, 30.0, 0.1, 1.0, 1).unwrap();
    reserved.set_token(solver.commit_reservation(token).unwrap());

    let result = solver.receive_task(reserved, 0.1);
    assert!(matches!(result, Err(Error::ReservationWindowViolation { .. })));

    let finished = solver.solve_tasks(default_start()).unwrap();
    assert_eq!(finished[0].get_status(), Some(TaskStatus::ProcessingFailed));
    assert_eq!(solver.get_failed_tasks(), 1);
}

#[test]
fn reserved_capacity_is_not_given_to_best_effort_work() {
    let (mut registry, solver_id, owner) = setup();
    let solver = registry.get_solver_mut(solver_id).unwrap();

    let window = TimeWindow::new(default_start(), default_start() + seconds(1.0)).unwrap();
    let token = solver.price_reservation(owner, window, 70.0, 0.1, 1.0, 1).unwrap();
    solver.commit_reservation(token).unwrap();

    solver.receive_task(task(1, owner, 3.0), 0.1).unwrap();

    let first_tick = solver.solve_tasks(default_start()).unwrap();
    assert!(first_tick.is_empty());
    assert_eq!(solver.get_best_effort_len(), 1);

    let second_tick = solver.solve_tasks(default_start() + seconds(1.0)).unwrap();
    assert_eq!(second_tick.len(), 1);
    assert_eq!(second_tick[0].get_status(), Some(TaskStatus::Solved));
    assert!(second_tick[0].get_solved_at().unwrap() >= default_start() + seconds(1.0));
}

#[test]
fn radio_path_uploads_computes_and_downloads() {
    let (mut registry, solver_id, owner) = setup();
    let mut connections = ConnectionRegistry::new();

    assert!(connections.connect(owner, solver_id, &mut registry).unwrap().is_empty());

    let solver = registry.get_solver_mut(solver_id).unwrap();
    solver.update_link_quality(owner, 20.0);
    solver.upload_task(task(1, owner, 0.5)).unwrap();

    let finished = solver.solve_tasks(default_start()).unwrap();
    let done = &finished[0];

    assert_eq!(done.get_status(), Some(TaskStatus::Solved));
    let received = done.get_received_at().unwrap();
    let solved = done.get_solved_at().unwrap();
    let returned = done.get_returned_at().unwrap();
    assert!(default_start() < received && received < solved && solved < returned);
    assert!((seconds_between(received, solved) - 9.0 / 70.0).abs() < 1e-3 + EPSILON);
}

#[test]
fn upload_without_connection_fails() {
    let (mut registry, solver_id, owner) = setup();
    let solver = registry.get_solver_mut(solver_id).unwrap();

    let result = solver.upload_task(task(1, owner, 0.5));
    assert!(matches!(result, Err(Error::UnknownVehicle(_))));

    let finished = solver.solve_tasks(default_start()).unwrap();
    assert_eq!(finished[0].get_status(), Some(TaskStatus::ProcessingFailed));
}

#[test]
fn switching_solver_fails_tasks_in_transfer() {
    let (mut registry, solver_id, owner) = setup();
    let dto: SolverDto = serde_json::from_value(serde_json::json!({ "name": "bs_2", "latitude": 48.71, "longitude": 21.25 })).unwrap();
    let other = Solver::from_dto(&dto, default_start(), 0.1, 1.0, Arc::new(ModulationTable::lte_cqi()), -100.0).unwrap();
    let other_id = registry.add_solver(other).unwrap();

    let mut connections = ConnectionRegistry::new();
    connections.connect(owner, solver_id, &mut registry).unwrap();
    registry.get_solver_mut(solver_id).unwrap().upload_task(task(1, owner, 0.5)).unwrap();

    let dropped = connections.connect(owner, other_id, &mut registry).unwrap();

    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].get_status(), Some(TaskStatus::ProcessingFailed));
    assert_eq!(connections.get_serving_solver(owner), Some(other_id));
    assert!(!registry.get_solver(solver_id).unwrap().is_peer_connected(owner));
    assert!(connections.connect(owner, other_id, &mut registry).unwrap().is_empty());
}

#[test]
fn result_of_an_owner_that_switched_solver_is_not_returned() {
    let (mut registry, solver_id, owner) = setup();
    let dto: SolverDto = serde_json::from_value(serde_json::json!({ "name": "bs_2", "latitude": 48.71, "longitude": 21.25 })).unwrap();
    let other = Solver::from_dto(&dto, default_start(), 0.1, 1.0, Arc::new(ModulationTable::lte_cqi()), -100.0).unwrap();
    let other_id = registry.add_solver(other).unwrap();

    let mut connections = ConnectionRegistry::new();
    connections.connect(owner, solver_id, &mut registry).unwrap();

    // 100 instructions at 70 ips keep the CPU busy past the first tick.
    let solver = registry.get_solver_mut(solver_id).unwrap();
    solver.update_link_quality(owner, 20.0);
    solver.upload_task(Task::new(Id::new(1), owner, 0.1, 100.0, 0.3, 5.0, default_start())).unwrap();

    assert!(solver.solve_tasks(default_start()).unwrap().is_empty());
    assert_eq!(solver.get_best_effort_len(), 1);

    let dropped = connections.connect(owner, other_id, &mut registry).unwrap();
    assert!(dropped.is_empty(), "the task already left the uplink");

    let solver = registry.get_solver_mut(solver_id).unwrap();
    let finished = solver.solve_tasks(default_start() + seconds(1.0)).unwrap();

    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].get_status(), Some(TaskStatus::ProcessingFailed));
    assert!(finished[0].get_solved_at().is_some());
    assert_eq!(finished[0].get_returned_at(), None);
    assert_eq!(solver.get_successful_tasks(), 0);
    assert_eq!(solver.get_failed_tasks(), 1);
}

#[test]
fn fully_reserved_solver_still_times_out_best_effort_work() {
    let (mut registry, solver_id, owner) = setup();
    let solver = registry.get_solver_mut(solver_id).unwrap();

    let window = TimeWindow::new(default_start(), default_start() + seconds(10.0)).unwrap();
    let token = solver.price_reservation(owner, window, 70.0, 0.1, 1.0, 1).unwrap();
    solver.commit_reservation(token).unwrap();

    solver.receive_task(task(1, owner, 0.5), 0.1).unwrap();
    let finished = solver.solve_tasks(default_start()).unwrap();

    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].get_status(), Some(TaskStatus::TaskTimedOut));
    assert_eq!(finished[0].get_solved_at(), None);
    assert_eq!(solver.get_best_effort_len(), 0);

    assert!(solver.solve_tasks(default_start() + seconds(1.0)).unwrap().is_empty());
}

#[test]
fn submitted_task_cannot_be_received_again() {
    let (mut registry, solver_id, owner) = setup();
    let solver = registry.get_solver_mut(solver_id).unwrap();

    let mut submitted = task(1, owner, 0.5);
    submitted.transition(TaskStatus::Submitted).unwrap();
    let result = solver.receive_task(submitted, 0.1);

    assert!(matches!(result, Err(Error::InvalidTaskTransition { from: Some(TaskStatus::Submitted), .. })));
    assert_eq!(solver.get_best_effort_len(), 0);
}

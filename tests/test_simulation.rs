use nft_offloading_sim::api::simulation_dto::SimulationDto;
use nft_offloading_sim::domain::simulation::simulation::Simulation;
use nft_offloading_sim::domain::statistics::task_record_collector::TaskRecordCollector;
use nft_offloading_sim::domain::time::seconds;
use nft_offloading_sim::error::Error;
use nft_offloading_sim::loader::parser::parse_json_str;

const SCENARIO: &str = r#"{
    "clock": { "start": "2021-06-01T08:00:00", "tickSeconds": 1.0, "processingIterationSeconds": 0.1, "numberOfTicks": 10 },
    "seed": 7,
    "solvers": [
        { "name": "bs_center", "latitude": 48.7000, "longitude": 21.2500 },
        { "name": "bs_north", "latitude": 48.7100, "longitude": 21.2500, "txFrequency": 2100000000.0 }
    ],
    "vehicles": [
        {
            "name": "car_nft", "latitude": 48.7004, "longitude": 21.2502, "mode": "NFT",
            "task": { "sizeInMegabytes": 0.2, "instructionCount": 9.0, "solvingTime": 0.3, "limitTime": 0.8 },
            "instructionJitter": 0.1
        },
        {
            "name": "car_be", "latitude": 48.7096, "longitude": 21.2501, "mode": "BEST_EFFORT",
            "task": { "sizeInMegabytes": 0.2, "instructionCount": 9.0, "solvingTime": 0.3, "limitTime": 0.8 },
            "taskIntervalTicks": 2
        },
        {
            "name": "car_greedy", "latitude": 48.7001, "longitude": 21.2499, "mode": "NFT",
            "task": { "sizeInMegabytes": 0.2, "instructionCount": 500.0, "solvingTime": 0.3, "limitTime": 0.8 }
        }
    ]
}"#;

fn simulation() -> Simulation {
    let dto: SimulationDto = parse_json_str(SCENARIO).unwrap();
    Simulation::from_dto(dto).unwrap()
}

#[test]
fn run_accounts_for_every_task() {
    let mut simulation = simulation();
    let summary = simulation.run(None).unwrap();

    // 10 + 5 + 10 tasks.
    assert_eq!(summary.generated, 25);
    assert_eq!(summary.finished() + summary.in_flight(), summary.generated);
    assert_eq!(summary.failed_to_find_solver, 10, "the greedy vehicle asks for more compute than any solver has");
    assert!(summary.solved >= 10, "summary {:?}", summary);
    assert!(summary.mean_total_time().unwrap() <= 0.8);

    let start = simulation.get_clock().get_start();
    assert_eq!(simulation.get_clock().get_current_time(), start + seconds(10.0));
}

#[test]
fn vehicles_see_their_outcomes() {
    let mut simulation = simulation();
    simulation.run(Some(4)).unwrap();

    let registry = simulation.get_registry();
    let greedy = registry.get_vehicle(registry.get_vehicle_by_name("car_greedy").unwrap()).unwrap();
    let nft = registry.get_vehicle(registry.get_vehicle_by_name("car_nft").unwrap()).unwrap();

    assert_eq!(greedy.get_failed_to_find_solver(), 4);
    assert_eq!(nft.get_solved(), 4);
    assert_eq!(nft.get_active_tasks(), 0);

    let center = registry.get_solver_by_name("bs_center").unwrap();
    assert_eq!(nft.reputation_of(center), 1.0);
    assert_eq!(registry.get_solver(center).unwrap().reputation(), 1.0);
}

#[test]
fn best_effort_vehicle_is_served_by_the_nearest_solver() {
    let mut simulation = simulation();
    simulation.run(Some(3)).unwrap();

    let registry = simulation.get_registry();
    let vehicle = registry.get_vehicle_by_name("car_be").unwrap();
    let north = registry.get_solver_by_name("bs_north").unwrap();

    assert_eq!(simulation.get_connections().get_serving_solver(vehicle), Some(north));
    assert_eq!(simulation.get_connections().get_connected_vehicles(north), vec![vehicle]);
    assert!(!simulation.get_sinr_map().get_history(vehicle, north).is_empty());
}

#[test]
fn same_seed_gives_same_run() {
    let first = simulation().run(None).unwrap();
    let second = simulation().run(None).unwrap();

    assert_eq!(first, second);
}

#[test]
fn records_are_written_for_finished_tasks() {
    let path = std::env::temp_dir().join(format!("simulation_records_{}.csv", uuid::Uuid::new_v4()));
    let mut simulation = simulation();
    simulation.set_collector(TaskRecordCollector::init(Some(path.to_string_lossy().to_string())).unwrap());

    let summary = simulation.run(Some(3)).unwrap();
    simulation.shutdown_collector();

    let content = std::fs::read_to_string(&path).unwrap();
    let rows = content.lines().count() as u64;
    assert_eq!(rows, summary.finished() + 1);
    assert!(content.contains("car_greedy"));
    assert!(content.contains("FAILED_TO_FIND_SOLVER"));
    assert!(content.contains("SOLVED"));

    let _ = std::fs::remove_file(path);
}

#[test]
fn iteration_longer_than_tick_is_rejected() {
    let mut dto: SimulationDto = parse_json_str(SCENARIO).unwrap();
    dto.clock.processing_iteration_seconds = 2.0;

    assert!(matches!(Simulation::from_dto(dto), Err(Error::ConfigurationError(_))));
}

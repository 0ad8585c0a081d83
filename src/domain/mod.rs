pub mod ledger;
pub mod location;
pub mod processing;
pub mod radio;
pub mod registry;
pub mod reservation;
pub mod search;
pub mod simulation;
pub mod solver;
pub mod statistics;
pub mod task;
pub mod time;
pub mod utils;
pub mod vehicle;

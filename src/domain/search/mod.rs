pub mod solver_search;

pub mod bucket_grid;
pub mod capacity_ledger;

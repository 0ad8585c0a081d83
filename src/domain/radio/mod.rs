pub mod connection_registry;
pub mod radio_data_rate;
pub mod sinr;
pub mod sinr_map;

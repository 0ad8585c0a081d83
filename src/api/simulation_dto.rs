use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

fn default_tick_seconds() -> f64 {
    1.0
}

fn default_processing_iteration_seconds() -> f64 {
    0.1
}

fn default_number_of_ticks() -> u64 {
    60
}

fn default_ips_capacity() -> f64 {
    70.0
}

fn default_resource_blocks() -> u32 {
    50
}

fn default_tx_power() -> f64 {
    0.0316
}

fn default_tx_frequency() -> f64 {
    2e9
}

fn default_bandwidth() -> f64 {
    10e6
}

fn default_coverage_radius() -> f64 {
    900.0
}

fn default_update_param() -> f64 {
    0.5
}

fn default_sinr_floor() -> f64 {
    -100.0
}

fn default_cell_size() -> f64 {
    0.0005
}

fn default_history_capacity() -> usize {
    100
}

fn default_task_interval_ticks() -> u64 {
    1
}

fn default_instruction_jitter() -> f64 {
    0.0
}

/// Root of a simulation scenario file.
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationDto {
    #[serde(default)]
    pub clock: ClockDto,

    /// Seed of the workload generator. The same seed reproduces the same run.
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub sinr_map: SinrMapDto,

    /// Optional CSV file with the columns `SINR,Modulation,CodeRate`. The built-in LTE CQI table is used without it.
    #[serde(default)]
    pub modulation_table_path: Option<String>,

    pub solvers: Vec<SolverDto>,

    #[serde(default)]
    pub vehicles: Vec<VehicleDto>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockDto {
    /// Simulation start. Defaults to 2020-01-01 00:00:00.
    #[serde(default)]
    pub start: Option<NaiveDateTime>,

    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: f64,

    #[serde(default = "default_processing_iteration_seconds")]
    pub processing_iteration_seconds: f64,

    #[serde(default = "default_number_of_ticks")]
    pub number_of_ticks: u64,
}

impl Default for ClockDto {
    fn default() -> Self {
        ClockDto {
            start: None,
            tick_seconds: default_tick_seconds(),
            processing_iteration_seconds: default_processing_iteration_seconds(),
            number_of_ticks: default_number_of_ticks(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinrMapDto {
    /// Grid cell edge length in degrees.
    #[serde(default = "default_cell_size")]
    pub cell_size: f64,

    #[serde(default = "default_update_param")]
    pub update_param: f64,

    #[serde(default = "default_sinr_floor")]
    pub floor: f64,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for SinrMapDto {
    fn default() -> Self {
        SinrMapDto {
            cell_size: default_cell_size(),
            update_param: default_update_param(),
            floor: default_sinr_floor(),
            history_capacity: default_history_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverDto {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,

    /// Compute capacity in instructions per second.
    #[serde(default = "default_ips_capacity")]
    pub ips_capacity: f64,

    #[serde(default = "default_resource_blocks")]
    pub resource_blocks: u32,

    /// Transmit power in watts.
    #[serde(default = "default_tx_power")]
    pub tx_power: f64,

    /// Carrier frequency in hertz.
    #[serde(default = "default_tx_frequency")]
    pub tx_frequency: f64,

    /// Channel bandwidth in hertz.
    #[serde(default = "default_bandwidth")]
    pub bandwidth: f64,

    /// Interference radius in metres.
    #[serde(default = "default_coverage_radius")]
    pub coverage_radius: f64,
}

/// How a vehicle gets its tasks solved.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationMode {
    /// Prices and signs a reservation token for every task.
    Nft,
    /// Uploads tasks over the radio into the best-effort lane of the best-SINR solver.
    BestEffort,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplateDto {
    pub size_in_megabytes: f64,
    pub instruction_count: f64,

    /// Planned compute duration in seconds.
    pub solving_time: f64,

    /// Round-trip budget in seconds.
    pub limit_time: f64,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDto {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub mode: ReservationMode,
    pub task: TaskTemplateDto,

    /// A new task is created every that many ticks.
    #[serde(default = "default_task_interval_ticks")]
    pub task_interval_ticks: u64,

    /// Relative jitter of the instruction count, e.g. `0.1` for ±10 %.
    #[serde(default = "default_instruction_jitter")]
    pub instruction_jitter: f64,
}

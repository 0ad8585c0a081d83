use std::collections::{HashMap, VecDeque};

use crate::domain::location::Location;
use crate::domain::radio::sinr::{RadioProfile, calculate_sinr};
use crate::domain::registry::{SolverId, VehicleId};

/// Grid cell index of a location.
pub type Cell = (i64, i64);

/// Cached SINR values per (grid cell, solver).
///
/// A cell's first sample is stored as is; later samples are blended in with an exponential moving average
/// `new = (1 − α)·old + α·sample`. Samples are clamped to the configured floor before they are used.
#[derive(Debug, Clone)]
pub struct SinrMap {
    /// Cell edge length in degrees.
    cell_size: f64,

    /// EMA weight α of a new sample.
    update_param: f64,

    floor: f64,

    history_capacity: usize,

    values: HashMap<(Cell, SolverId), f64>,

    /// Raw samples a vehicle reported towards a solver, newest last.
    history: HashMap<(VehicleId, SolverId), VecDeque<f64>>,
}

impl SinrMap {
    pub fn new(cell_size: f64, update_param: f64, floor: f64, history_capacity: usize) -> Self {
        SinrMap { cell_size, update_param, floor, history_capacity, values: HashMap::new(), history: HashMap::new() }
    }

    pub fn get_floor(&self) -> f64 {
        self.floor
    }

    pub fn cell_of(&self, location: &Location) -> Cell {
        ((location.latitude / self.cell_size).floor() as i64, (location.longitude / self.cell_size).floor() as i64)
    }

    /// Cached value for the cell of `location`, if any.
    pub fn get(&self, location: &Location, solver: SolverId) -> Option<f64> {
        self.values.get(&(self.cell_of(location), solver)).copied()
    }

    /// Folds a measured sample into the cell of `location`. With `vehicle` set the sample also goes into that
    /// vehicle's bounded history.
    pub fn update(&mut self, location: &Location, solver: SolverId, sample: f64, vehicle: Option<VehicleId>) -> f64 {
        let sample = sample.max(self.floor);
        let cell = self.cell_of(location);
        let alpha = self.update_param;

        let value = self.values.entry((cell, solver)).and_modify(|old| *old = (1.0 - alpha) * *old + alpha * sample).or_insert(sample);
        let value = *value;

        if let Some(vehicle) = vehicle {
            let capacity = self.history_capacity;
            let samples = self.history.entry((vehicle, solver)).or_insert_with(|| VecDeque::with_capacity(capacity));
            if samples.len() == capacity {
                samples.pop_front();
            }
            if capacity > 0 {
                samples.push_back(sample);
            }
        }

        value
    }

    /// Returns the cached value, computing and caching it from the link budget on a miss.
    pub fn get_or_compute(&mut self, location: &Location, solver: SolverId, profile: &RadioProfile, snapshot: &[(SolverId, RadioProfile)]) -> f64 {
        if let Some(value) = self.get(location, solver) {
            return value;
        }

        let sample = calculate_sinr(location, solver, profile, snapshot);
        self.update(location, solver, sample, None)
    }

    pub fn get_history(&self, vehicle: VehicleId, solver: SolverId) -> Vec<f64> {
        match self.history.get(&(vehicle, solver)) {
            Some(samples) => samples.iter().copied().collect(),
            None => Vec::new(),
        }
    }

    /// Solver with the highest SINR at `location`, first in `snapshot` order on ties.
    pub fn best_serving_solver(&mut self, location: &Location, snapshot: &[(SolverId, RadioProfile)]) -> Option<(SolverId, f64)> {
        let mut best: Option<(SolverId, f64)> = None;

        for (id, profile) in snapshot {
            let sinr = self.get_or_compute(location, *id, profile, snapshot);
            match best {
                Some((_, best_sinr)) if best_sinr >= sinr => {}
                _ => best = Some((*id, sinr)),
            }
        }

        best
    }

    pub fn number_of_cached_values(&self) -> usize {
        self.values.len()
    }
}

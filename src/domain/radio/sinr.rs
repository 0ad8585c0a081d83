use crate::domain::location::Location;
use crate::domain::registry::SolverId;

/// Thermal noise power density k·T at room temperature, W/Hz.
const THERMAL_NOISE_DENSITY: f64 = 4.002e-21;

/// Interference floor added before the log conversion, W.
const INTERFERENCE_FLOOR_W: f64 = 1e-26;

/// Distances below one metre are clamped to one metre.
const MIN_DISTANCE_M: f64 = 1.0;

/// Transmitter characteristics of a solver, as far as the link budget is concerned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadioProfile {
    pub location: Location,

    /// Transmit power in watts.
    pub tx_power: f64,

    /// Carrier frequency in hertz. Only solvers on the same frequency interfere.
    pub tx_frequency: f64,

    /// Channel bandwidth in hertz.
    pub bandwidth: f64,

    /// Radius in metres inside which the solver's signal interferes with others.
    pub coverage_radius: f64,
}

pub fn dbm_to_w(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0) / 1000.0
}

pub fn w_to_dbm(watts: f64) -> f64 {
    10.0 * (watts * 1000.0).log10()
}

/// Urban macro-cell path loss in dB for a distance in kilometres.
pub fn city_path_loss(distance_km: f64) -> f64 {
    128.1 + 37.6 * distance_km.log10()
}

/// Combines received signal, noise and interference (all in dBm) into an SINR in dB.
pub fn sinr_from_dbm(signal: f64, noise: f64, interference: f64) -> f64 {
    let ratio = dbm_to_w(signal) / (dbm_to_w(noise) + dbm_to_w(interference));
    w_to_dbm(ratio / 1000.0)
}

/// Computes the SINR (dB) a receiver at `location` sees from `serving`.
///
/// `snapshot` holds the radio profiles of all solvers, taken before the tick's mutations. Every solver other than
/// `serving_id` on the serving frequency whose coverage radius reaches `location` adds interference.
pub fn calculate_sinr(location: &Location, serving_id: SolverId, serving: &RadioProfile, snapshot: &[(SolverId, RadioProfile)]) -> f64 {
    let distance = location.distance_to(&serving.location).max(MIN_DISTANCE_M);
    let signal = w_to_dbm(serving.tx_power) - city_path_loss(distance / 1000.0);

    let mut interference_w = 0.0;
    for (id, other) in snapshot {
        if *id == serving_id || other.tx_frequency != serving.tx_frequency {
            continue;
        }

        let distance = location.distance_to(&other.location).max(MIN_DISTANCE_M);
        if distance <= other.coverage_radius {
            interference_w += dbm_to_w(w_to_dbm(other.tx_power) - city_path_loss(distance / 1000.0));
        }
    }

    let noise = w_to_dbm(THERMAL_NOISE_DENSITY * serving.bandwidth);
    let interference = w_to_dbm(interference_w + INTERFERENCE_FLOOR_W);

    sinr_from_dbm(signal, noise, interference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn profile(latitude: f64, longitude: f64) -> RadioProfile {
        RadioProfile {
            location: Location::new(latitude, longitude),
            tx_power: 0.0316,
            tx_frequency: 2e9,
            bandwidth: 10e6,
            coverage_radius: 900.0,
        }
    }

    #[test]
    fn dbm_conversions_are_inverse() {
        assert!((w_to_dbm(1.0) - 30.0).abs() < 1e-9);
        assert!((dbm_to_w(w_to_dbm(0.0316)) - 0.0316).abs() < 1e-12);
    }

    #[test]
    fn sinr_drops_with_distance_and_interference() {
        let mut ids: SlotMap<SolverId, ()> = SlotMap::with_key();
        let serving_id = ids.insert(());
        let other_id = ids.insert(());

        let serving = profile(48.70, 21.25);
        let interferer = profile(48.704, 21.25);
        let alone = vec![(serving_id, serving)];
        let crowded = vec![(serving_id, serving), (other_id, interferer)];

        let near = Location::new(48.701, 21.25);
        let far = Location::new(48.699, 21.25);

        let near_alone = calculate_sinr(&near, serving_id, &serving, &alone);
        let near_crowded = calculate_sinr(&near, serving_id, &serving, &crowded);

        assert!(near_alone > near_crowded);
        assert!(calculate_sinr(&far, serving_id, &serving, &alone) < calculate_sinr(&Location::new(48.7001, 21.25), serving_id, &serving, &alone));
    }

    #[test]
    fn other_frequencies_do_not_interfere() {
        let mut ids: SlotMap<SolverId, ()> = SlotMap::with_key();
        let serving_id = ids.insert(());
        let other_id = ids.insert(());

        let serving = profile(48.70, 21.25);
        let mut interferer = profile(48.702, 21.25);
        interferer.tx_frequency = 3.5e9;

        let location = Location::new(48.701, 21.25);
        let alone = calculate_sinr(&location, serving_id, &serving, &[(serving_id, serving)]);
        let other_band = calculate_sinr(&location, serving_id, &serving, &[(serving_id, serving), (other_id, interferer)]);

        assert!((alone - other_band).abs() < 1e-12);
    }
}

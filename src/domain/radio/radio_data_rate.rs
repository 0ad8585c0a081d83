use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};

/// Symbols per resource block per second, scaled so that data rates come out in megabytes per second.
pub const SYMBOL_RATE: f64 = 0.168;

/// Modulation schemes of the CQI table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Modulation {
    #[serde(rename = "QPSK")]
    Qpsk,
    #[serde(rename = "16QAM")]
    Qam16,
    #[serde(rename = "64QAM")]
    Qam64,
    #[serde(rename = "256QAM")]
    Qam256,
}

impl Modulation {
    pub fn bits_per_symbol(&self) -> u32 {
        match self {
            Modulation::Qpsk => 2,
            Modulation::Qam16 => 4,
            Modulation::Qam64 => 6,
            Modulation::Qam256 => 8,
        }
    }
}

/// One row of the modulation table.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ModulationEntry {
    #[serde(rename = "SINR")]
    pub sinr: f64,
    #[serde(rename = "Modulation")]
    pub modulation: Modulation,
    #[serde(rename = "CodeRate")]
    pub code_rate: f64,
}

/// Discretized SINR → (modulation, code rate) mapping used to size radio allocations.
#[derive(Debug, Clone)]
pub struct ModulationTable {
    entries: Vec<ModulationEntry>,
}

impl Default for ModulationTable {
    fn default() -> Self {
        Self::lte_cqi()
    }
}

impl ModulationTable {
    pub fn new(entries: Vec<ModulationEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::ConfigurationError("The modulation table has no entries.".to_string()));
        }

        Ok(ModulationTable { entries })
    }

    /// The 15-step LTE CQI table.
    pub fn lte_cqi() -> Self {
        let rows: [(f64, Modulation, f64); 15] = [
            (-6.7, Modulation::Qpsk, 0.0762),
            (-4.7, Modulation::Qpsk, 0.1172),
            (-2.3, Modulation::Qpsk, 0.1885),
            (0.2, Modulation::Qpsk, 0.3008),
            (2.4, Modulation::Qpsk, 0.4385),
            (4.3, Modulation::Qpsk, 0.5879),
            (5.9, Modulation::Qam16, 0.3691),
            (8.1, Modulation::Qam16, 0.4785),
            (10.3, Modulation::Qam16, 0.6016),
            (11.7, Modulation::Qam64, 0.4551),
            (14.1, Modulation::Qam64, 0.5537),
            (16.3, Modulation::Qam64, 0.6504),
            (18.7, Modulation::Qam64, 0.7539),
            (21.0, Modulation::Qam64, 0.8525),
            (22.7, Modulation::Qam64, 0.9258),
        ];

        ModulationTable {
            entries: rows.iter().map(|(sinr, modulation, code_rate)| ModulationEntry { sinr: *sinr, modulation: *modulation, code_rate: *code_rate }).collect(),
        }
    }

    /// Reads a comma separated table with the header `SINR,Modulation,CodeRate`.
    pub fn from_csv_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().delimiter(b',').trim(csv::Trim::All).from_path(path)?;

        let mut entries = Vec::new();
        for row in reader.deserialize() {
            let entry: ModulationEntry = row?;
            entries.push(entry);
        }

        Self::new(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry whose SINR threshold is closest to `sinr`. The first entry wins on equal distance.
    pub fn lookup(&self, sinr: f64) -> ModulationEntry {
        let mut best = self.entries[0];
        let mut best_distance = (best.sinr - sinr).abs();

        for entry in self.entries.iter().skip(1) {
            let distance = (entry.sinr - sinr).abs();
            if distance < best_distance {
                best = *entry;
                best_distance = distance;
            }
        }

        best
    }

    /// Data rate one resource block carries at `sinr`.
    pub fn rate_per_resource_block(&self, sinr: f64) -> f64 {
        let entry = self.lookup(sinr);
        entry.modulation.bits_per_symbol() as f64 * entry.code_rate * SYMBOL_RATE
    }

    /// Minimum number of resource blocks needed to reach `required_datarate` at `sinr`.
    pub fn rb_count(&self, sinr: f64, required_datarate: f64) -> u32 {
        let blocks = (required_datarate / self.rate_per_resource_block(sinr)).ceil();
        blocks.max(0.0) as u32
    }

    /// Data rate of `resource_blocks` dedicated blocks at `sinr`.
    pub fn datarate(&self, sinr: f64, resource_blocks: u32) -> f64 {
        self.average_datarate(sinr, resource_blocks, 1)
    }

    /// Data rate per peer when `resource_blocks` are shared evenly among `connected_peers` (zero counts as one).
    pub fn average_datarate(&self, sinr: f64, resource_blocks: u32, connected_peers: usize) -> f64 {
        let peers = connected_peers.max(1) as f64;
        self.rate_per_resource_block(sinr) * resource_blocks as f64 / peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_entry_is_selected() {
        let table = ModulationTable::lte_cqi();

        assert_eq!(table.lookup(-50.0).code_rate, 0.0762);
        assert_eq!(table.lookup(9.0).modulation, Modulation::Qam16);
        assert_eq!(table.lookup(40.0).code_rate, 0.9258);
    }

    #[test]
    fn first_entry_wins_on_equal_distance() {
        let table = ModulationTable::new(vec![
            ModulationEntry { sinr: 0.0, modulation: Modulation::Qpsk, code_rate: 0.1 },
            ModulationEntry { sinr: 2.0, modulation: Modulation::Qam16, code_rate: 0.5 },
        ])
        .unwrap();

        assert_eq!(table.lookup(1.0).modulation, Modulation::Qpsk);
    }

    #[test]
    fn rb_count_and_datarate_agree() {
        let table = ModulationTable::lte_cqi();
        let sinr = 14.1;
        let per_block = 6.0 * 0.5537 * SYMBOL_RATE;

        let blocks = table.rb_count(sinr, 5.0);
        assert_eq!(blocks, (5.0 / per_block).ceil() as u32);
        assert!(table.datarate(sinr, blocks) >= 5.0);
        assert!(table.datarate(sinr, blocks - 1) < 5.0);
    }

    #[test]
    fn shared_rate_divides_by_peers() {
        let table = ModulationTable::lte_cqi();

        let full = table.average_datarate(10.3, 50, 1);
        assert!((table.average_datarate(10.3, 50, 4) - full / 4.0).abs() < 1e-12);
        assert_eq!(table.average_datarate(10.3, 50, 0), full);
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(ModulationTable::new(Vec::new()).is_err());
    }
}

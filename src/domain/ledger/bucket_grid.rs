use chrono::TimeDelta;

use crate::domain::time::{SimTime, millis_since};
use crate::error::{Error, Result};

/// The discretization shared by all ledger operations of one solver.
///
/// A timestamp is mapped to its **bucket** by rounding its milliseconds-since-simulation-start to the nearest
/// multiple of the processing-iteration length. Range operations walk the buckets `[bucket(t0), bucket(t1))`
/// stepped by the same length, so every lookup, check and reduction lands on the same keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketGrid {
    /// The simulation start. Buckets are measured relative to it.
    epoch: SimTime,

    /// Length of one processing iteration in milliseconds. Also the rounding resolution.
    iteration_ms: i64,
}

impl BucketGrid {
    pub fn new(epoch: SimTime, iteration_seconds: f64) -> Result<Self> {
        let iteration_ms = (iteration_seconds * 1000.0).round() as i64;

        if iteration_ms < 1 {
            return Err(Error::ConfigurationError(format!(
                "The processing iteration must last at least one millisecond, got {} s.",
                iteration_seconds
            )));
        }

        Ok(BucketGrid { epoch, iteration_ms })
    }

    pub fn get_epoch(&self) -> SimTime {
        self.epoch
    }

    pub fn get_iteration_ms(&self) -> i64 {
        self.iteration_ms
    }

    pub fn get_iteration_seconds(&self) -> f64 {
        self.iteration_ms as f64 / 1000.0
    }

    /// Computes the **bucket key** (rounded milliseconds since the simulation start) of a timestamp.
    ///
    /// Rounding is half away from zero. The function is pure, so repeated calls are stable, and it is monotone
    /// in `time`.
    pub fn get_bucket(&self, time: SimTime) -> i64 {
        let millis = millis_since(self.epoch, time);
        let rounded = (millis as f64 / self.iteration_ms as f64).round() as i64;

        rounded * self.iteration_ms
    }

    /// Iterates the bucket keys of the half-open range `[bucket(start), bucket(end))`.
    ///
    /// **Note:** If `end` rounds to the same or an earlier bucket than `start`, the range is empty.
    pub fn get_buckets_between(&self, start: SimTime, end: SimTime) -> impl Iterator<Item = i64> + use<> {
        let first = self.get_bucket(start);
        let last = self.get_bucket(end);

        (first..last).step_by(self.iteration_ms as usize)
    }

    /// Computes the **absolute start time** of a bucket.
    pub fn get_bucket_start_time(&self, bucket: i64) -> SimTime {
        self.epoch + TimeDelta::milliseconds(bucket)
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Sub;

use crate::domain::ledger::bucket_grid::BucketGrid;
use crate::domain::time::SimTime;
use crate::error::{Error, LedgerResource, Result};

/// A quantity that can be booked in a [`CapacityLedger`].
pub trait LedgerAmount: Copy + PartialOrd + Sub<Output = Self> + fmt::Debug + fmt::Display {
    fn as_f64(self) -> f64;
}

impl LedgerAmount for f64 {
    fn as_f64(self) -> f64 {
        self
    }
}

impl LedgerAmount for u32 {
    fn as_f64(self) -> f64 {
        self as f64
    }
}

/// Sparse, time-bucketed record of the **remaining capacity** of one resource.
///
/// A bucket that was never touched holds the full nominal capacity; it is materialized on first read by
/// [`CapacityLedger::capacity_at`]. Buckets are keyed by absolute time, not by the reservation that consumed them,
/// so capacity expires together with its bucket and is never handed back.
///
/// Invariant: no bucket ever holds a negative amount. [`CapacityLedger::reduce_between`] validates the whole
/// range before it touches a single bucket.
#[derive(Debug, Clone)]
pub struct CapacityLedger<A: LedgerAmount> {
    resource: LedgerResource,

    /// The capacity of an untouched bucket.
    nominal_capacity: A,

    grid: BucketGrid,

    buckets: BTreeMap<i64, A>,
}

impl<A: LedgerAmount> CapacityLedger<A> {
    pub fn new(resource: LedgerResource, nominal_capacity: A, grid: BucketGrid) -> Self {
        CapacityLedger { resource, nominal_capacity, grid, buckets: BTreeMap::new() }
    }

    pub fn get_resource(&self) -> LedgerResource {
        self.resource
    }

    pub fn get_nominal_capacity(&self) -> A {
        self.nominal_capacity
    }

    pub fn get_grid(&self) -> &BucketGrid {
        &self.grid
    }

    /// Number of buckets that have been materialized so far.
    pub fn get_number_of_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the remaining capacity of the bucket containing `time`, initializing the bucket to the nominal
    /// capacity if it was never accessed.
    pub fn capacity_at(&mut self, time: SimTime) -> A {
        let bucket = self.grid.get_bucket(time);
        let nominal = self.nominal_capacity;

        *self.buckets.entry(bucket).or_insert(nominal)
    }

    /// Remaining capacity of a bucket without materializing it.
    fn peek_bucket(&self, bucket: i64) -> A {
        match self.buckets.get(&bucket) {
            Some(amount) => *amount,
            None => self.nominal_capacity,
        }
    }

    /// Checks that every bucket of `[bucket(start), bucket(end))` has at least `required` capacity left.
    /// Never mutates the ledger.
    pub fn check_between(&self, start: SimTime, end: SimTime, required: A) -> bool {
        self.grid.get_buckets_between(start, end).all(|bucket| self.peek_bucket(bucket) >= required)
    }

    /// Subtracts `required` from every bucket of `[bucket(start), bucket(end))`.
    ///
    /// The operation is atomic: the whole range is validated first and, if any bucket is short, nothing is
    /// changed and `InsufficientWindowCapacity` is returned.
    pub fn reduce_between(&mut self, start: SimTime, end: SimTime, required: A) -> Result<()> {
        if !self.check_between(start, end, required) {
            log::debug!(
                "Reduction of {} {} between {} and {} rejected, range is short of capacity.",
                required,
                self.resource,
                start,
                end
            );

            return Err(Error::InsufficientWindowCapacity { resource: self.resource, from: start, to: end });
        }

        let nominal = self.nominal_capacity;
        for bucket in self.grid.get_buckets_between(start, end) {
            let amount = self.buckets.entry(bucket).or_insert(nominal);
            *amount = *amount - required;
        }

        Ok(())
    }

    /// Returns the smallest remaining capacity in `[bucket(start), bucket(end))`, or the nominal capacity for an
    /// empty range.
    pub fn max_available_between(&self, start: SimTime, end: SimTime) -> A {
        let mut available = self.nominal_capacity;

        for bucket in self.grid.get_buckets_between(start, end) {
            let remaining = self.peek_bucket(bucket);
            if remaining < available {
                available = remaining;
            }
        }

        available
    }

    /// Sum of the remaining capacity over `[bucket(start), bucket(end))`.
    pub fn total_available_between(&self, start: SimTime, end: SimTime) -> f64 {
        self.grid.get_buckets_between(start, end).map(|bucket| self.peek_bucket(bucket).as_f64()).sum()
    }

    /// Drops all materialized buckets that lie before `time`. Nothing is ever booked into the past, so these
    /// buckets are never read again.
    pub fn forget_before(&mut self, time: SimTime) {
        let bucket = self.grid.get_bucket(time);
        self.buckets = self.buckets.split_off(&bucket);
    }

    /// Iterates the materialized buckets in time order as `(bucket start, remaining capacity)`.
    pub fn iter_buckets(&self) -> impl Iterator<Item = (SimTime, A)> + '_ {
        self.buckets.iter().map(|(bucket, amount)| (self.grid.get_bucket_start_time(*bucket), *amount))
    }
}

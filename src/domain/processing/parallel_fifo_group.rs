use std::collections::BTreeMap;

use crate::domain::processing::fifo_processor::{FifoProcessor, ProcessOutcome};
use crate::domain::processing::processable::Processable;
use crate::domain::time::{SimTime, seconds};
use crate::error::Result;

/// One FIFO processor per connected peer, processed side by side over the same tick window.
///
/// Peers are kept in a `BTreeMap` so that iteration order, and with it the tie order of equal completion times, is
/// deterministic.
#[derive(Debug)]
pub struct ParallelFifoGroup<K: Ord + Copy, P: Processable> {
    dt: f64,
    fifos: BTreeMap<K, FifoProcessor<P>>,
}

impl<K: Ord + Copy, P: Processable> ParallelFifoGroup<K, P> {
    pub fn new(dt: f64) -> Self {
        ParallelFifoGroup { dt, fifos: BTreeMap::new() }
    }

    pub fn get_dt(&self) -> f64 {
        self.dt
    }

    /// Creates an empty processor for `peer` unless one exists.
    pub fn add_peer(&mut self, peer: K) {
        let dt = self.dt;
        self.fifos.entry(peer).or_insert_with(|| FifoProcessor::new(0.0, dt));
    }

    /// Removes the processor of `peer`.
    ///
    /// # Returns
    /// The items still queued for that peer.
    pub fn remove_peer(&mut self, peer: K) -> Vec<P> {
        match self.fifos.remove(&peer) {
            Some(mut fifo) => fifo.drain(),
            None => Vec::new(),
        }
    }

    pub fn contains_peer(&self, peer: K) -> bool {
        self.fifos.contains_key(&peer)
    }

    pub fn number_of_peers(&self) -> usize {
        self.fifos.len()
    }

    /// Queues `item` on the processor of `peer`. Returns the item back if the peer is not connected.
    pub fn add(&mut self, peer: K, item: P) -> std::result::Result<(), P> {
        match self.fifos.get_mut(&peer) {
            Some(fifo) => {
                fifo.add(item);
                Ok(())
            }
            None => Err(item),
        }
    }

    pub fn pending(&self) -> usize {
        self.fifos.values().map(|fifo| fifo.len()).sum()
    }

    /// Recomputes every processor's power as `rate(peer, number_of_peers)` and processes all of them over
    /// `[current_time, current_time + dt)`.
    ///
    /// # Returns
    /// The merged outcome, completed and timed out items each sorted by `processed_at`.
    pub fn process(&mut self, current_time: SimTime, rate: impl Fn(K, usize) -> f64) -> Result<ProcessOutcome<P>> {
        let connections = self.fifos.len();
        let deadline = current_time + seconds(self.dt);

        let mut completed = Vec::new();
        let mut timed_out = Vec::new();
        let mut used_power = 0.0;

        for (peer, fifo) in self.fifos.iter_mut() {
            fifo.set_power(rate(*peer, connections));

            let outcome = fifo.process(current_time, Some(deadline))?;
            completed.extend(outcome.completed);
            timed_out.extend(outcome.timed_out);
            used_power += outcome.used_power;
        }

        completed.sort_by_key(|item| item.get_processed_at());
        timed_out.sort_by_key(|item| item.get_processed_at());

        Ok(ProcessOutcome { completed, timed_out, used_power })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::processing::processable::TaskProcessable;
    use crate::domain::registry::VehicleId;
    use crate::domain::task::task::Task;
    use crate::domain::time::{default_start, seconds_between};
    use crate::domain::utils::id::Id;
    use slotmap::SlotMap;

    #[test]
    fn results_are_merged_in_completion_order() {
        let t0 = default_start();
        let mut peers: SlotMap<VehicleId, ()> = SlotMap::with_key();
        let slow = peers.insert(());
        let fast = peers.insert(());

        let mut group: ParallelFifoGroup<VehicleId, TaskProcessable> = ParallelFifoGroup::new(1.0);
        group.add_peer(slow);
        group.add_peer(fast);

        for (index, peer) in [slow, fast].into_iter().enumerate() {
            let mut task = Task::new(Id::new(index as u64 + 1), peer, 15.0, 10.0, 1.0, 5.0, t0);
            task.transition(crate::domain::task::task::TaskStatus::Submitted).unwrap();
            group.add(peer, TaskProcessable::connection(task, t0 + seconds(0.2))).unwrap();
        }

        let outcome = group.process(t0, |peer, connections| if peer == fast { 60.0 / connections as f64 } else { 20.0 }).unwrap();

        assert_eq!(outcome.completed.len(), 2);
        assert_eq!(outcome.completed[0].get_task().get_owner(), fast);
        assert!((seconds_between(t0, outcome.completed[0].get_processed_at().unwrap()) - 0.7).abs() < 1e-6);
        assert!((seconds_between(t0, outcome.completed[1].get_processed_at().unwrap()) - 0.95).abs() < 1e-6);
    }

    #[test]
    fn removing_a_peer_returns_its_backlog() {
        let t0 = default_start();
        let mut peers: SlotMap<VehicleId, ()> = SlotMap::with_key();
        let peer = peers.insert(());

        let mut group: ParallelFifoGroup<VehicleId, TaskProcessable> = ParallelFifoGroup::new(1.0);
        group.add_peer(peer);
        group.add(peer, TaskProcessable::connection(Task::new(Id::new(1), peer, 1.0, 1.0, 1.0, 1.0, t0), t0)).unwrap();

        assert_eq!(group.remove_peer(peer).len(), 1);
        assert!(!group.contains_peer(peer));
        assert!(group.add(peer, TaskProcessable::connection(Task::new(Id::new(2), peer, 1.0, 1.0, 1.0, 1.0, t0), t0)).is_err());
    }
}

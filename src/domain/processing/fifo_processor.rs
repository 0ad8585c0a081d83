use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::binary_heap::PeekMut;

use crate::domain::processing::processable::Processable;
use crate::domain::time::{SimTime, as_seconds, seconds};
use crate::error::Result;

/// Queue position of an item: `(can_start_process_at, order id, insertion sequence)`, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueueKey {
    pub start_at: SimTime,
    pub order_id: u64,
    pub sequence: u64,
}

#[derive(Debug)]
struct QueuedItem<P> {
    key: QueueKey,
    item: P,
}

impl<P> PartialEq for QueuedItem<P> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<P> Eq for QueuedItem<P> {}

impl<P> Ord for QueuedItem<P> {
    /// Reversed so that the max-heap `BinaryHeap` pops the smallest key first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key.cmp(&self.key)
    }
}

impl<P> PartialOrd for QueuedItem<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Result of one processing call.
#[derive(Debug)]
pub struct ProcessOutcome<P> {
    /// Fully processed items in completion order, `processed_at` stamped.
    pub completed: Vec<P>,

    /// Items dropped because their timeout fell inside the processed window before they could finish.
    /// `processed_at` holds the timeout instant.
    pub timed_out: Vec<P>,

    /// Power consumed, including time spent waiting for items to become ready.
    pub used_power: f64,
}

impl<P> ProcessOutcome<P> {
    fn empty() -> Self {
        ProcessOutcome { completed: Vec::new(), timed_out: Vec::new(), used_power: 0.0 }
    }
}

/// Discrete-event FIFO engine draining a priority-ordered backlog at a fixed rate.
///
/// `power` is the amount of work the processor can do in `dt` seconds. Capacity is conserved as power × wall-clock
/// time: waiting for an item to become ready burns power just like processing it, so one call never spends more than
/// `power × (deadline − current_time) / dt`.
#[derive(Debug)]
pub struct FifoProcessor<P: Processable> {
    power: f64,
    dt: f64,
    queue: BinaryHeap<QueuedItem<P>>,
    next_sequence: u64,
}

impl<P: Processable> FifoProcessor<P> {
    pub fn new(power: f64, dt: f64) -> Self {
        FifoProcessor { power, dt, queue: BinaryHeap::new(), next_sequence: 0 }
    }

    pub fn get_power(&self) -> f64 {
        self.power
    }

    pub fn set_power(&mut self, power: f64) {
        self.power = power;
    }

    pub fn get_dt(&self) -> f64 {
        self.dt
    }

    pub fn add(&mut self, item: P) {
        let key = QueueKey { start_at: item.can_start_process_at(), order_id: item.get_order_id(), sequence: self.next_sequence };
        self.next_sequence += 1;

        self.queue.push(QueuedItem { key, item });
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn peek(&self) -> Option<&P> {
        self.queue.peek().map(|queued| &queued.item)
    }

    /// Empties the queue and returns the pending items in queue order.
    pub fn drain(&mut self) -> Vec<P> {
        let mut items = Vec::with_capacity(self.queue.len());
        while let Some(queued) = self.queue.pop() {
            items.push(queued.item);
        }

        items
    }

    /// Removes every item whose timeout is at or before `until`, in queue order, with the timeout as `processed_at`.
    fn drain_timed_out(&mut self, until: SimTime) -> Vec<P> {
        let mut timed_out = Vec::new();
        let mut pending = BinaryHeap::with_capacity(self.queue.len());

        while let Some(mut queued) = self.queue.pop() {
            match queued.item.timeout_at() {
                Some(timeout) if timeout <= until => {
                    queued.item.set_processed_at(timeout);
                    timed_out.push(queued.item);
                }
                _ => pending.push(queued),
            }
        }

        self.queue = pending;
        timed_out
    }

    /// Processes the queue over `[current_time, deadline)`, `deadline` defaulting to `current_time + dt`.
    ///
    /// Items that are not finished when the power runs out stay at the head of the queue for the next call. An item
    /// whose timeout lies inside the window and before its would-be completion gets exactly the power needed to reach
    /// the timeout and is reported as timed out. Without power nothing completes, and every item whose timeout lies
    /// at or before `deadline` is reported as timed out.
    pub fn process(&mut self, current_time: SimTime, deadline: Option<SimTime>) -> Result<ProcessOutcome<P>> {
        let mut outcome = ProcessOutcome::empty();
        let deadline = deadline.unwrap_or(current_time + seconds(self.dt.max(0.0)));

        if self.power <= 0.0 || self.dt <= 0.0 {
            outcome.timed_out = self.drain_timed_out(deadline);
            return Ok(outcome);
        }

        let (power, dt) = (self.power, self.dt);
        let power_for_seconds = |secs: f64| secs / dt * power;
        let seconds_for_power = |amount: f64| amount / power * dt;
        let mut available_power = power_for_seconds(as_seconds(deadline - current_time));
        let mut processed_time = current_time;

        while deadline > processed_time && available_power > 0.0 {
            let Some(head) = self.queue.peek() else {
                break;
            };

            let started_time = processed_time.max(head.item.can_start_process_at());
            if started_time >= deadline {
                break;
            }

            let wasted = power_for_seconds(as_seconds(started_time - processed_time));
            available_power -= wasted;
            outcome.used_power += wasted;
            processed_time = started_time;

            if available_power <= 0.0 {
                break;
            }

            let Some(mut queued) = self.queue.peek_mut() else {
                break;
            };
            let item = &mut queued.item;

            let finish_at = processed_time + seconds(seconds_for_power(item.to_process_amount()));
            let times_out = match item.timeout_at() {
                Some(timeout) => timeout <= deadline && timeout < finish_at,
                None => false,
            };

            if times_out {
                let timeout = item.timeout_at().unwrap_or(processed_time).max(processed_time);
                let granted = power_for_seconds(as_seconds(timeout - processed_time)).min(available_power);

                item.on_processing_started()?;
                let used = item.process(granted);
                item.set_processed_at(timeout);

                available_power -= used;
                outcome.used_power += used;
                processed_time = timeout;

                let queued = PeekMut::pop(queued);
                log::trace!("Processable {} timed out at {}.", queued.item.get_order_id(), timeout);
                outcome.timed_out.push(queued.item);
                continue;
            }

            item.on_processing_started()?;
            let used = item.process(available_power);

            if !item.is_processed() {
                outcome.used_power += used;
                break;
            }

            processed_time += seconds(seconds_for_power(used));
            item.set_processed_at(processed_time);
            available_power -= used;
            outcome.used_power += used;

            let queued = PeekMut::pop(queued);
            outcome.completed.push(queued.item);
        }

        Ok(outcome)
    }
}

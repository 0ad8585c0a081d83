use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

/// A point in simulated (logical) time.
pub type SimTime = NaiveDateTime;

/// Converts a duration in (fractional) seconds into a `TimeDelta` with nanosecond resolution.
pub fn seconds(value: f64) -> TimeDelta {
    TimeDelta::nanoseconds((value * 1e9).round() as i64)
}

/// Converts a `TimeDelta` into fractional seconds.
pub fn as_seconds(delta: TimeDelta) -> f64 {
    match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

/// Seconds elapsed from `from` to `to` (negative if `to` is earlier).
pub fn seconds_between(from: SimTime, to: SimTime) -> f64 {
    as_seconds(to - from)
}

/// The default simulation start, 2020-01-01 00:00:00.
pub fn default_start() -> SimTime {
    NaiveDate::from_ymd_opt(2020, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)).unwrap_or_default()
}

/// The simulation clock driven by the tick loop.
///
/// The clock is an explicit value owned by the tick driver. Every ledger and processor call receives its time as a
/// parameter; nothing in the crate reads the clock implicitly.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    /// The instant the simulation started. Ledger buckets are measured relative to it.
    start: SimTime,

    /// The current tick's start.
    now: SimTime,

    /// Length of one tick.
    tick: TimeDelta,
}

impl SimulationClock {
    pub fn new(start: SimTime, tick_seconds: f64) -> Self {
        SimulationClock { start, now: start, tick: seconds(tick_seconds) }
    }

    pub fn get_start(&self) -> SimTime {
        self.start
    }

    pub fn get_current_time(&self) -> SimTime {
        self.now
    }

    pub fn get_tick(&self) -> TimeDelta {
        self.tick
    }

    pub fn get_tick_seconds(&self) -> f64 {
        as_seconds(self.tick)
    }

    /// End of the current tick (exclusive).
    pub fn get_tick_end(&self) -> SimTime {
        self.now + self.tick
    }

    /// Moves the clock forward by one tick.
    ///
    /// # Returns
    /// `true` if the calendar day changed with this step.
    pub fn advance(&mut self) -> bool {
        let before = self.now;
        self.now += self.tick;

        before.date() != self.now.date()
    }

    /// Whole milliseconds elapsed since the simulation start (truncated towards zero).
    pub fn millis_since_start(&self, time: SimTime) -> i64 {
        millis_since(self.start, time)
    }

    pub fn from_millis_since_start(&self, millis: i64) -> SimTime {
        self.start + TimeDelta::milliseconds(millis)
    }
}

/// Whole milliseconds elapsed from `epoch` to `time` (truncated towards zero).
pub fn millis_since(epoch: SimTime, time: SimTime) -> i64 {
    (time - epoch).num_milliseconds()
}

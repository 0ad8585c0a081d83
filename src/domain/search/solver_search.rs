use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::domain::location::Location;
use crate::domain::radio::sinr::RadioProfile;
use crate::domain::radio::sinr_map::SinrMap;
use crate::domain::registry::{Registry, SolverId};
use crate::domain::reservation::time_window::TimeWindow;
use crate::domain::reservation::token::ReservationToken;
use crate::domain::task::task::Task;
use crate::domain::time::seconds;
use crate::error::{Error, Result};

/// Margin added to derived rates so that rounding never prices a request just below what it needs.
pub const RATE_EPSILON: f64 = 1e-6;

/// A feasible allocation on one solver.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub rb_count: u32,
    pub solver: SolverId,
    pub sinr: f64,
    pub datarate: f64,

    /// Position in the candidate list, the tie-break between equal RB counts.
    pub sequence: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.rb_count == other.rb_count && self.sequence == other.sequence
    }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    /// Reversed: the heap yields the fewest resource blocks first, earlier candidates first on ties.
    fn cmp(&self, other: &Self) -> Ordering {
        other.rb_count.cmp(&self.rb_count).then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Requirements a task puts on any solver serving it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskRequirements {
    /// Longest one-way transfer that still leaves time for solving and the way back.
    pub max_single_transfer_time: f64,
    pub min_required_datarate: f64,
    pub required_ips: f64,
}

impl TaskRequirements {
    pub fn of(task: &Task) -> Self {
        let max_single_transfer_time = (task.get_limit_time() - task.get_solving_time()) / 2.0;

        TaskRequirements {
            max_single_transfer_time,
            min_required_datarate: task.get_size_in_megabytes() / max_single_transfer_time + RATE_EPSILON,
            required_ips: task.get_instruction_count() / task.get_solving_time() + RATE_EPSILON,
        }
    }
}

/// Greedy per-task allocator: picks the solver needing the fewest resource blocks among those that can serve the
/// task over `[created_at, created_at + limit_time)`.
///
/// `candidates` are tried in the given order; `snapshot` holds the radio profiles of all solvers for interference
/// and must be taken before the tick mutates anything.
///
/// # Returns
/// An unsigned token priced on the winning solver, or `NoFeasibleSolver`.
pub fn search_best_solver(
    task: &Task,
    location: &Location,
    candidates: &[SolverId],
    registry: &Registry,
    sinr_map: &mut SinrMap,
    snapshot: &[(SolverId, RadioProfile)],
) -> Result<ReservationToken> {
    let requirements = TaskRequirements::of(task);
    let start = task.get_created_at();
    let end = start + seconds(task.get_limit_time());

    if requirements.max_single_transfer_time <= 0.0 {
        log::debug!("{:?} leaves no time for transfers, no solver can serve it.", task.get_id());
        return Err(Error::NoFeasibleSolver(task.get_id()));
    }

    let mut heap = BinaryHeap::new();

    for (sequence, solver_id) in candidates.iter().enumerate() {
        let solver = registry.get_solver(*solver_id)?;

        if !solver.has_compute_between(start, end, requirements.required_ips) {
            log::trace!("Solver {} lacks compute for {:?}.", solver.get_name(), task.get_id());
            continue;
        }

        let sinr = sinr_map.get_or_compute(location, *solver_id, &solver.get_radio_profile(), snapshot);
        let table = solver.get_modulation_table();
        let rb_count = table.rb_count(sinr, requirements.min_required_datarate);

        if rb_count > solver.max_available_rbs_between(start, end) {
            log::trace!("Solver {} lacks resource blocks ({} needed) for {:?}.", solver.get_name(), rb_count, task.get_id());
            continue;
        }

        let datarate = table.datarate(sinr, rb_count);
        heap.push(Candidate { rb_count, solver: *solver_id, sinr, datarate, sequence });
    }

    let Some(best) = heap.pop() else {
        log::debug!("No feasible solver for {:?} among {} candidate(s).", task.get_id(), candidates.len());
        return Err(Error::NoFeasibleSolver(task.get_id()));
    };

    let solver = registry.get_solver(best.solver)?;
    let transfer_time = task.get_size_in_megabytes() / best.datarate;
    let window = TimeWindow::new(start, end)?;

    solver.price_reservation(task.get_owner(), window, requirements.required_ips, transfer_time, best.datarate, best.rb_count)
}

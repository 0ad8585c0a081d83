use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::domain::registry::{SolverId, VehicleId};
use crate::domain::reservation::time_window::TimeWindow;
use crate::domain::time::SimTime;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TokenId(Uuid);

impl TokenId {
    pub fn new_random() -> Self {
        TokenId(Uuid::new_v4())
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId: {}", self.0)
    }
}

/// Where a token is in its lifecycle at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Priced, nothing booked yet.
    Unsigned,
    /// Booked in the solver's ledgers and held in its token collection.
    Signed,
    /// Signed, but `valid_to` already passed.
    Expired,
    /// Signed and no longer part of the solver's token collection.
    Removed,
}

/// A capacity commitment ("NFT") of one solver towards one vehicle over a time window.
///
/// An unsigned token is only a price quote. Signing it through [`crate::domain::solver::solver::Solver::commit_reservation`]
/// books `reserved_ips` and `reserved_rbs` in every ledger bucket of the window exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationToken {
    id: TokenId,
    owner: VehicleId,
    solver: SolverId,
    window: TimeWindow,

    /// Compute units per second reserved for the whole window.
    reserved_ips: f64,
    reserved_rbs: u32,

    /// One-way transfer time in seconds at the priced data rate.
    single_transfer_time: f64,

    /// Data rate in megabytes per second the resource blocks were priced for.
    transfer_rate: f64,

    signed: bool,
}

impl ReservationToken {
    pub fn new_unsigned(
        owner: VehicleId,
        solver: SolverId,
        window: TimeWindow,
        reserved_ips: f64,
        single_transfer_time: f64,
        transfer_rate: f64,
        reserved_rbs: u32,
    ) -> Self {
        ReservationToken {
            id: TokenId::new_random(),
            owner,
            solver,
            window,
            reserved_ips,
            reserved_rbs,
            single_transfer_time,
            transfer_rate,
            signed: false,
        }
    }

    pub fn get_id(&self) -> TokenId {
        self.id
    }

    pub fn get_owner(&self) -> VehicleId {
        self.owner
    }

    pub fn get_solver(&self) -> SolverId {
        self.solver
    }

    pub fn get_window(&self) -> TimeWindow {
        self.window
    }

    pub fn get_valid_from(&self) -> SimTime {
        self.window.get_start()
    }

    pub fn get_valid_to(&self) -> SimTime {
        self.window.get_end()
    }

    pub fn get_reserved_ips(&self) -> f64 {
        self.reserved_ips
    }

    pub fn get_reserved_rbs(&self) -> u32 {
        self.reserved_rbs
    }

    pub fn get_single_transfer_time(&self) -> f64 {
        self.single_transfer_time
    }

    pub fn get_transfer_rate(&self) -> f64 {
        self.transfer_rate
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Marks the token as committed. Only the solver's commit path calls this, after both ledgers were reduced.
    pub(crate) fn mark_signed(&mut self) {
        self.signed = true;
    }
}

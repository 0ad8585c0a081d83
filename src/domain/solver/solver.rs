use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::api::simulation_dto::SolverDto;
use crate::domain::ledger::bucket_grid::BucketGrid;
use crate::domain::ledger::capacity_ledger::CapacityLedger;
use crate::domain::location::Location;
use crate::domain::processing::fifo_processor::FifoProcessor;
use crate::domain::processing::parallel_fifo_group::ParallelFifoGroup;
use crate::domain::processing::processable::{Processable, TaskProcessable};
use crate::domain::radio::radio_data_rate::ModulationTable;
use crate::domain::radio::sinr::RadioProfile;
use crate::domain::registry::{SolverId, VehicleId};
use crate::domain::reservation::time_window::TimeWindow;
use crate::domain::reservation::token::{ReservationToken, TokenId};
use crate::domain::reservation::token_collection::TokenCollection;
use crate::domain::task::task::{Task, TaskId, TaskStatus};
use crate::domain::time::{SimTime, seconds, seconds_between};
use crate::error::{Error, LedgerResource, Result};

/// Static configuration of a solver.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub name: String,
    pub radio: RadioProfile,

    /// Nominal compute capacity in instructions per second.
    pub ips_capacity: f64,

    pub resource_blocks: u32,
}

/// An edge-compute node offering compute throughput and radio resource blocks.
///
/// Work arrives through two lanes:
/// - the **NFT lane** holds tasks backed by a signed reservation token. Each of them is processed at its reserved
///   rate inside its token window and never competes with other work.
/// - the **best-effort lane** is the CPU processor. It only gets the compute capacity no reservation booked, and
///   returns its results through the per-vehicle downlink.
///
/// Within one tick the NFT lane is always drained first.
#[derive(Debug)]
pub struct Solver {
    id: SolverId,
    config: SolverConfig,
    tick_seconds: f64,

    /// Remaining compute per processing iteration, in instructions.
    compute_ledger: CapacityLedger<f64>,

    rb_ledger: CapacityLedger<u32>,

    tokens: TokenCollection,

    /// Reserved tasks ordered by `(received_at, task id)`.
    nft_lane: BTreeMap<(SimTime, TaskId), Task>,

    cpu: FifoProcessor<TaskProcessable>,
    uplink: ParallelFifoGroup<VehicleId, TaskProcessable>,
    downlink: ParallelFifoGroup<VehicleId, TaskProcessable>,

    modulation: Arc<ModulationTable>,

    /// Latest SINR of every connected peer, supplied by the tick driver before each tick.
    peer_sinr: HashMap<VehicleId, f64>,
    sinr_floor: f64,

    /// Tasks that reached a final state and wait to be handed back by `solve_tasks`.
    finished: Vec<Task>,

    successful_tasks: u64,
    failed_tasks: u64,
}

impl Solver {
    pub fn new(
        config: SolverConfig,
        start: SimTime,
        processing_iteration_seconds: f64,
        tick_seconds: f64,
        modulation: Arc<ModulationTable>,
        sinr_floor: f64,
    ) -> Result<Self> {
        if config.ips_capacity <= 0.0 || config.resource_blocks == 0 {
            return Err(Error::ConfigurationError(format!("Solver {} needs positive compute and radio capacity.", config.name)));
        }

        if tick_seconds <= 0.0 || processing_iteration_seconds > tick_seconds {
            return Err(Error::ConfigurationError(format!(
                "Solver {}: the processing iteration ({} s) must be positive and not longer than the tick ({} s).",
                config.name, processing_iteration_seconds, tick_seconds
            )));
        }

        let grid = BucketGrid::new(start, processing_iteration_seconds)?;
        let per_iteration = config.ips_capacity * grid.get_iteration_seconds();

        Ok(Solver {
            id: SolverId::default(),
            compute_ledger: CapacityLedger::new(LedgerResource::Compute, per_iteration, grid),
            rb_ledger: CapacityLedger::new(LedgerResource::ResourceBlocks, config.resource_blocks, grid),
            tokens: TokenCollection::new_empty(),
            nft_lane: BTreeMap::new(),
            cpu: FifoProcessor::new(0.0, tick_seconds),
            uplink: ParallelFifoGroup::new(tick_seconds),
            downlink: ParallelFifoGroup::new(tick_seconds),
            modulation,
            peer_sinr: HashMap::new(),
            sinr_floor,
            finished: Vec::new(),
            successful_tasks: 0,
            failed_tasks: 0,
            tick_seconds,
            config,
        })
    }

    pub fn from_dto(
        dto: &SolverDto,
        start: SimTime,
        processing_iteration_seconds: f64,
        tick_seconds: f64,
        modulation: Arc<ModulationTable>,
        sinr_floor: f64,
    ) -> Result<Self> {
        let config = SolverConfig {
            name: dto.name.clone(),
            radio: RadioProfile {
                location: Location::new(dto.latitude, dto.longitude),
                tx_power: dto.tx_power,
                tx_frequency: dto.tx_frequency,
                bandwidth: dto.bandwidth,
                coverage_radius: dto.coverage_radius,
            },
            ips_capacity: dto.ips_capacity,
            resource_blocks: dto.resource_blocks,
        };

        Self::new(config, start, processing_iteration_seconds, tick_seconds, modulation, sinr_floor)
    }

    pub fn get_id(&self) -> SolverId {
        self.id
    }

    /// Stamps the registry handle. Called once by the registry on insertion.
    pub(crate) fn set_id(&mut self, id: SolverId) {
        self.id = id;
    }

    pub fn get_name(&self) -> &str {
        &self.config.name
    }

    pub fn get_location(&self) -> Location {
        self.config.radio.location
    }

    pub fn get_radio_profile(&self) -> RadioProfile {
        self.config.radio
    }

    pub fn get_ips_capacity(&self) -> f64 {
        self.config.ips_capacity
    }

    pub fn get_resource_blocks(&self) -> u32 {
        self.config.resource_blocks
    }

    pub fn get_compute_ledger(&self) -> &CapacityLedger<f64> {
        &self.compute_ledger
    }

    pub fn get_rb_ledger(&self) -> &CapacityLedger<u32> {
        &self.rb_ledger
    }

    pub fn get_tokens(&self) -> &TokenCollection {
        &self.tokens
    }

    pub fn get_modulation_table(&self) -> &ModulationTable {
        &self.modulation
    }

    pub fn get_nft_lane_len(&self) -> usize {
        self.nft_lane.len()
    }

    pub fn get_best_effort_len(&self) -> usize {
        self.cpu.len()
    }

    pub fn get_successful_tasks(&self) -> u64 {
        self.successful_tasks
    }

    pub fn get_failed_tasks(&self) -> u64 {
        self.failed_tasks
    }

    /// Share of successful tasks among all finished ones, `1.0` without any history.
    pub fn reputation(&self) -> f64 {
        let total = self.successful_tasks + self.failed_tasks;
        if total == 0 {
            return 1.0;
        }

        self.successful_tasks as f64 / total as f64
    }

    fn compute_per_iteration(&self, ips: f64) -> f64 {
        ips * self.compute_ledger.get_grid().get_iteration_seconds()
    }

    /// Checks whether `required_ips` are free in every processing iteration of `[start, end)`.
    pub fn has_compute_between(&self, start: SimTime, end: SimTime, required_ips: f64) -> bool {
        self.compute_ledger.check_between(start, end, self.compute_per_iteration(required_ips))
    }

    /// Largest number of resource blocks free throughout `[start, end)`.
    pub fn max_available_rbs_between(&self, start: SimTime, end: SimTime) -> u32 {
        self.rb_ledger.max_available_between(start, end)
    }

    /// Prices a reservation without booking anything.
    ///
    /// # Returns
    /// An unsigned token, or
    /// - `InsufficientNominalCapacity` if `required_ips` exceeds what the solver can ever provide,
    /// - `InsufficientWindowCapacity` if compute or resource blocks are already booked in the window.
    pub fn price_reservation(
        &self,
        owner: VehicleId,
        window: TimeWindow,
        required_ips: f64,
        single_transfer_time: f64,
        transfer_rate: f64,
        required_rbs: u32,
    ) -> Result<ReservationToken> {
        if required_ips > self.config.ips_capacity {
            return Err(Error::InsufficientNominalCapacity {
                solver: self.config.name.clone(),
                required: required_ips,
                nominal: self.config.ips_capacity,
            });
        }

        let (start, end) = (window.get_start(), window.get_end());

        if !self.has_compute_between(start, end, required_ips) {
            return Err(Error::InsufficientWindowCapacity { resource: LedgerResource::Compute, from: start, to: end });
        }

        if !self.rb_ledger.check_between(start, end, required_rbs) {
            return Err(Error::InsufficientWindowCapacity { resource: LedgerResource::ResourceBlocks, from: start, to: end });
        }

        Ok(ReservationToken::new_unsigned(owner, self.id, window, required_ips, single_transfer_time, transfer_rate, required_rbs))
    }

    /// Signs a priced token: books its amounts in both ledgers and stores it in the token collection.
    ///
    /// If the window filled up since pricing, nothing is booked and `InsufficientWindowCapacity` is returned. A
    /// booking that fails after both ledgers accepted the window is a `LedgerConsistencyFault`.
    pub fn commit_reservation(&mut self, mut token: ReservationToken) -> Result<ReservationToken> {
        if token.is_signed() {
            return Err(Error::TokenAlreadySigned(token.get_id()));
        }

        if token.get_solver() != self.id {
            return Err(Error::TokenSolverMismatch {
                token: token.get_id(),
                expected: format!("{:?}", token.get_solver()),
                actual: self.config.name.clone(),
            });
        }

        let (start, end) = (token.get_valid_from(), token.get_valid_to());
        let compute = self.compute_per_iteration(token.get_reserved_ips());

        if !self.compute_ledger.check_between(start, end, compute) {
            return Err(Error::InsufficientWindowCapacity { resource: LedgerResource::Compute, from: start, to: end });
        }

        if !self.rb_ledger.check_between(start, end, token.get_reserved_rbs()) {
            return Err(Error::InsufficientWindowCapacity { resource: LedgerResource::ResourceBlocks, from: start, to: end });
        }

        self.compute_ledger.reduce_between(start, end, compute).map_err(|e| self.consistency_fault(&token, e))?;
        self.rb_ledger.reduce_between(start, end, token.get_reserved_rbs()).map_err(|e| self.consistency_fault(&token, e))?;

        token.mark_signed();
        self.tokens.insert(token.clone())?;

        log::debug!(
            "Solver {} signed {:?}: {:.3} ips and {} RBs between {} and {}.",
            self.config.name,
            token.get_id(),
            token.get_reserved_ips(),
            token.get_reserved_rbs(),
            start,
            end
        );

        Ok(token)
    }

    fn consistency_fault(&self, token: &ReservationToken, cause: Error) -> Error {
        let message = format!("solver {} failed to book validated {:?}: {}", self.config.name, token.get_id(), cause);
        log::error!("Capacity ledger consistency fault, {}", message);

        Error::LedgerConsistencyFault(message)
    }

    /// Drops a token from the collection. The capacity it booked is not given back.
    pub fn remove_token(&mut self, id: &TokenId) -> Result<ReservationToken> {
        let token = self.tokens.remove(id)?;
        log::debug!("Solver {} removed {:?}.", self.config.name, id);

        Ok(token)
    }

    pub fn is_token_valid_for(&self, id: &TokenId, time: SimTime) -> bool {
        self.tokens.is_valid_for(id, time)
    }

    /// Admits a task whose transfer to the solver takes `transfer_seconds`.
    ///
    /// Tasks with a signed token go into the NFT lane, all others into the best-effort lane. A task arriving outside
    /// its token window is failed and `ReservationWindowViolation` is returned; a task arriving after its deadline is
    /// timed out right away. Either way the task is handed back by the next `solve_tasks`.
    pub fn receive_task(&mut self, mut task: Task, transfer_seconds: f64) -> Result<()> {
        let received_at = task.get_created_at() + seconds(transfer_seconds);
        task.set_solver(self.id);
        task.set_single_transfer_time(transfer_seconds);
        task.set_received_at(received_at);
        task.transition(TaskStatus::Submitted)?;

        if task.is_late_at(received_at) {
            log::debug!("Solver {}: {:?} arrived after its deadline.", self.config.name, task.get_id());
            return self.finish_task(task, TaskStatus::TaskTimedOut);
        }

        let reservation = task.get_token().filter(|token| token.is_signed()).map(|token| token.get_window());

        match reservation {
            Some(window) if window.contains(received_at) => {
                log::trace!("Solver {}: {:?} enters the NFT lane at {}.", self.config.name, task.get_id(), received_at);
                self.nft_lane.insert((received_at, task.get_id()), task);
                Ok(())
            }
            Some(window) => {
                let error = Error::ReservationWindowViolation {
                    task: task.get_id(),
                    arrival: received_at,
                    valid_from: window.get_start(),
                    valid_to: window.get_end(),
                };
                log::warn!("Solver {}: {}", self.config.name, error);

                self.finish_task(task, TaskStatus::ProcessingFailed)?;
                Err(error)
            }
            None => {
                self.cpu.add(TaskProcessable::compute(task, received_at));
                Ok(())
            }
        }
    }

    /// Queues a best-effort task on the uplink of its owner, starting at the task's creation.
    ///
    /// The owner must be connected to this solver; otherwise the task is failed and `UnknownVehicle` is returned.
    pub fn upload_task(&mut self, mut task: Task) -> Result<()> {
        let owner = task.get_owner();
        task.set_solver(self.id);
        task.transition(TaskStatus::Submitted)?;

        let created_at = task.get_created_at();
        if let Err(processable) = self.uplink.add(owner, TaskProcessable::connection(task, created_at)) {
            self.finish_task(processable.into_task(), TaskStatus::ProcessingFailed)?;
            return Err(Error::UnknownVehicle(format!("{:?} is not connected to solver {}", owner, self.config.name)));
        }

        Ok(())
    }

    /// Creates the uplink and downlink processors of a newly connected vehicle.
    pub fn connect_peer(&mut self, vehicle: VehicleId) {
        self.uplink.add_peer(vehicle);
        self.downlink.add_peer(vehicle);
    }

    /// Removes a vehicle's radio processors.
    ///
    /// # Returns
    /// The tasks that were still in transfer, marked `ProcessingFailed`.
    pub fn disconnect_peer(&mut self, vehicle: VehicleId) -> Result<Vec<Task>> {
        self.peer_sinr.remove(&vehicle);

        let mut dropped = self.uplink.remove_peer(vehicle);
        dropped.extend(self.downlink.remove_peer(vehicle));

        let mut tasks = Vec::with_capacity(dropped.len());
        for processable in dropped {
            let mut task = processable.into_task();
            task.transition(TaskStatus::ProcessingFailed)?;
            self.failed_tasks += 1;
            tasks.push(task);
        }

        Ok(tasks)
    }

    pub fn is_peer_connected(&self, vehicle: VehicleId) -> bool {
        self.uplink.contains_peer(vehicle)
    }

    /// Stores the SINR a connected vehicle currently sees towards this solver.
    pub fn update_link_quality(&mut self, vehicle: VehicleId, sinr: f64) {
        self.peer_sinr.insert(vehicle, sinr);
    }

    /// Runs one tick `[tick_start, tick_start + tick)`: first the NFT lane, then the best-effort pipeline
    /// uplink → CPU → downlink.
    ///
    /// # Returns
    /// Every task that reached a final state since the previous call, including tasks failed at admission.
    pub fn solve_tasks(&mut self, tick_start: SimTime) -> Result<Vec<Task>> {
        let tick_end = tick_start + seconds(self.tick_seconds);

        self.solve_nft_lane(tick_start, tick_end)?;
        self.solve_best_effort_lane(tick_start, tick_end)?;

        let expired = self.tokens.remove_expired(tick_start);
        if expired > 0 {
            log::debug!("Solver {} dropped {} expired token(s).", self.config.name, expired);
        }
        self.compute_ledger.forget_before(tick_start);
        self.rb_ledger.forget_before(tick_start);

        Ok(std::mem::take(&mut self.finished))
    }

    fn solve_nft_lane(&mut self, tick_start: SimTime, tick_end: SimTime) -> Result<()> {
        let due: Vec<(SimTime, TaskId)> = self.nft_lane.range(..(tick_end, TaskId::new(0))).map(|(key, _)| *key).collect();

        for key in due {
            let Some(mut task) = self.nft_lane.remove(&key) else {
                continue;
            };
            let Some(token) = task.get_token().cloned() else {
                self.finish_task(task, TaskStatus::ProcessingFailed)?;
                continue;
            };

            if !self.tokens.contains(&token.get_id()) {
                log::warn!("Solver {}: token of {:?} was removed before processing.", self.config.name, task.get_id());
                self.finish_task(task, TaskStatus::ProcessingFailed)?;
                continue;
            }

            let start = key.0.max(tick_start).max(token.get_valid_from());
            let end = token.get_valid_to().min(tick_end);

            if start < end {
                task.transition(TaskStatus::BeingProcessed)?;

                let rate = token.get_reserved_ips();
                let needed = task.get_instruction_count() / rate;
                let available = seconds_between(start, end);

                if needed <= available {
                    task.consume_instructions(task.get_instruction_count());
                    let solved_at = start + seconds(needed);
                    task.set_solved_at(solved_at);

                    let returned_at = solved_at + seconds(token.get_single_transfer_time());
                    self.tokens.remove(&token.get_id())?;
                    self.return_task(task, returned_at)?;
                    continue;
                }

                task.consume_instructions(rate * available);
            }

            if token.get_valid_to() <= tick_end {
                log::debug!("Solver {}: reservation of {:?} closed before it finished.", self.config.name, task.get_id());
                self.tokens.remove(&token.get_id())?;
                self.finish_task(task, TaskStatus::TaskTimedOut)?;
                continue;
            }

            self.nft_lane.insert(key, task);
        }

        Ok(())
    }

    fn solve_best_effort_lane(&mut self, tick_start: SimTime, tick_end: SimTime) -> Result<()> {
        let resource_blocks = self.config.resource_blocks;
        let tick_seconds = self.tick_seconds;
        let floor = self.sinr_floor;
        let modulation = Arc::clone(&self.modulation);
        let peer_sinr = self.peer_sinr.clone();
        let radio_rate = |peer: VehicleId, connections: usize| {
            let sinr = peer_sinr.get(&peer).copied().unwrap_or(floor);
            modulation.average_datarate(sinr, resource_blocks, connections) * tick_seconds
        };

        let uploaded = self.uplink.process(tick_start, &radio_rate)?;
        for processable in uploaded.completed {
            let received_at = processable.get_processed_at().unwrap_or(tick_start);
            let mut task = processable.into_task();
            task.set_received_at(received_at);
            self.cpu.add(TaskProcessable::compute(task, received_at));
        }
        for processable in uploaded.timed_out {
            self.finish_task(processable.into_task(), TaskStatus::TaskTimedOut)?;
        }

        // Best-effort work only gets what no reservation booked for this tick.
        self.cpu.set_power(self.compute_ledger.total_available_between(tick_start, tick_end));
        let computed = self.cpu.process(tick_start, Some(tick_end))?;
        for processable in computed.completed {
            let solved_at = processable.get_processed_at().unwrap_or(tick_start);
            let mut task = processable.into_task();
            task.set_solved_at(solved_at);

            if task.is_late_at(solved_at) {
                self.finish_task(task, TaskStatus::TaskTimedOut)?;
                continue;
            }

            // Tasks admitted with a fixed transfer time return after that time. Uploaded tasks whose owner has
            // switched solvers since have no way back.
            let owner = task.get_owner();
            if let Err(processable) = self.downlink.add(owner, TaskProcessable::connection(task, solved_at)) {
                let task = processable.into_task();
                match task.get_single_transfer_time() {
                    Some(transfer_seconds) => self.return_task(task, solved_at + seconds(transfer_seconds))?,
                    None => {
                        log::debug!("Solver {}: owner of {:?} is gone, its result cannot be returned.", self.config.name, task.get_id());
                        self.finish_task(task, TaskStatus::ProcessingFailed)?;
                    }
                }
            }
        }
        for processable in computed.timed_out {
            self.finish_task(processable.into_task(), TaskStatus::TaskTimedOut)?;
        }

        let returned = self.downlink.process(tick_start, &radio_rate)?;
        for processable in returned.completed {
            let returned_at = processable.get_processed_at().unwrap_or(tick_end);
            self.return_task(processable.into_task(), returned_at)?;
        }
        for processable in returned.timed_out {
            self.finish_task(processable.into_task(), TaskStatus::TaskTimedOut)?;
        }

        Ok(())
    }

    /// Hands a result back to its owner at `returned_at`; a late return makes the task timed out.
    fn return_task(&mut self, mut task: Task, returned_at: SimTime) -> Result<()> {
        let status = task.finish(returned_at)?;
        self.record_outcome(task.get_id(), status);
        self.finished.push(task);

        Ok(())
    }

    fn finish_task(&mut self, mut task: Task, status: TaskStatus) -> Result<()> {
        task.transition(status)?;
        self.record_outcome(task.get_id(), status);
        self.finished.push(task);

        Ok(())
    }

    fn record_outcome(&mut self, task: TaskId, status: TaskStatus) {
        match status {
            TaskStatus::Solved => self.successful_tasks += 1,
            TaskStatus::TaskTimedOut | TaskStatus::ProcessingFailed => {
                log::debug!("Solver {}: {:?} ended as {}.", self.config.name, task, status.name());
                self.failed_tasks += 1;
            }
            _ => {}
        }
    }
}

//! Transactional execution over the world state.
//!
//! [`Host::transact`] runs a closure against a [`Tx`] that reads through a
//! journal of pending writes and never touches committed state. The journal
//! is applied only when the closure returns `Ok`; on `Err` it is dropped,
//! which discards every balance, allowance, storage and log mutation of the
//! run, including ones made by collaborators deep in the call stack.
//!
//! The world state is locked for the whole transaction, so transactions are
//! strictly serial.

use alloy::primitives::{Address, B256, U256};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::HostResult;
use crate::events::LogRecord;
use crate::gas::{GasSchedule, ResourceMeter};
use crate::ledger::TransferHook;
use crate::state::{AllowanceKey, BalanceKey, StorageKey, WorldState};

/// Default per-transaction resource limit.
pub const DEFAULT_RESOURCE_LIMIT: u64 = 3_000_000;

/// Execution environment parameters, fixed for the host's lifetime.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Resource units available to each transaction
    pub resource_limit: u64,
    /// Block timestamp seen by every transaction (seconds)
    pub timestamp: u64,
    /// Unit costs
    pub schedule: GasSchedule,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            resource_limit: DEFAULT_RESOURCE_LIMIT,
            timestamp: 0,
            schedule: GasSchedule::default(),
        }
    }
}

impl HostConfig {
    pub fn with_resource_limit(mut self, limit: u64) -> Self {
        self.resource_limit = limit;
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Outcome of a committed transaction.
#[derive(Debug, Clone)]
pub struct Receipt<T> {
    /// Value returned by the transaction body
    pub value: T,
    /// Records emitted by this transaction, in order
    pub logs: Vec<LogRecord>,
    /// Resource units consumed
    pub resources_used: u64,
}

impl<T> Receipt<T> {
    /// Number of `Swapped` records in this receipt.
    pub fn swap_count(&self) -> usize {
        self.logs.iter().filter(|log| log.is_swap()).count()
    }
}

/// Pending writes of one transaction.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    balances: HashMap<BalanceKey, U256>,
    allowances: HashMap<AllowanceKey, U256>,
    storage: HashMap<StorageKey, U256>,
    logs: Vec<LogRecord>,
}

impl Journal {
    fn apply(self, state: &mut WorldState) {
        for (key, value) in self.balances {
            state.write_balance(key, value);
        }
        for (key, value) in self.allowances {
            state.write_allowance(key, value);
        }
        for ((contract, slot), value) in self.storage {
            state.set_storage(contract, slot, value);
        }
        state.logs.extend(self.logs);
    }
}

/// Single-threaded execution host owning the world state.
pub struct Host {
    state: Mutex<WorldState>,
    hooks: HashMap<Address, Arc<dyn TransferHook>>,
    config: HostConfig,
}

impl Host {
    pub fn new(state: WorldState, config: HostConfig) -> Self {
        Self {
            state: Mutex::new(state),
            hooks: HashMap::new(),
            config,
        }
    }

    /// Register a hook invoked after every transfer of `asset`.
    pub fn with_hook(mut self, asset: Address, hook: Arc<dyn TransferHook>) -> Self {
        self.hooks.insert(asset, hook);
        self
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Copy of the committed state.
    pub fn snapshot(&self) -> WorldState {
        self.state.lock().clone()
    }

    /// Read the committed state without copying it.
    pub fn read<R>(&self, f: impl FnOnce(&WorldState) -> R) -> R {
        f(&self.state.lock())
    }

    /// Run `body` as one all-or-nothing transaction sent by `origin`.
    pub fn transact<T, E, F>(&self, origin: Address, body: F) -> Result<Receipt<T>, E>
    where
        F: FnOnce(&mut Tx<'_>) -> Result<T, E>,
        E: std::fmt::Display,
    {
        let mut state = self.state.lock();
        let mut tx = Tx::new(&state, &self.hooks, origin, &self.config);

        match body(&mut tx) {
            Ok(value) => {
                let (journal, resources_used) = tx.finish();
                let logs = journal.logs.clone();
                journal.apply(&mut state);

                debug!(
                    origin = %origin,
                    logs = logs.len(),
                    resources_used,
                    "Transaction committed"
                );

                Ok(Receipt {
                    value,
                    logs,
                    resources_used,
                })
            }
            Err(err) => {
                warn!(
                    origin = %origin,
                    resources_used = tx.resources_used(),
                    discarded_logs = tx.logs().len(),
                    error = %err,
                    "Transaction reverted, journal discarded"
                );
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Handle to the in-flight transaction.
///
/// Reads fall through the journal to committed state; writes land in the
/// journal only.
pub struct Tx<'a> {
    state: &'a WorldState,
    hooks: &'a HashMap<Address, Arc<dyn TransferHook>>,
    journal: Journal,
    meter: ResourceMeter,
    origin: Address,
    timestamp: u64,
}

impl<'a> Tx<'a> {
    fn new(
        state: &'a WorldState,
        hooks: &'a HashMap<Address, Arc<dyn TransferHook>>,
        origin: Address,
        config: &HostConfig,
    ) -> Self {
        Self {
            state,
            hooks,
            journal: Journal::default(),
            meter: ResourceMeter::new(config.resource_limit, config.schedule),
            origin,
            timestamp: config.timestamp,
        }
    }

    fn finish(self) -> (Journal, u64) {
        (self.journal, self.meter.used())
    }

    /// Account that sent the transaction.
    pub fn origin(&self) -> Address {
        self.origin
    }

    /// Block timestamp (seconds).
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn resources_used(&self) -> u64 {
        self.meter.used()
    }

    pub fn schedule(&self) -> GasSchedule {
        *self.meter.schedule()
    }

    /// Charge resource units against this transaction.
    pub fn charge(&mut self, units: u64) -> HostResult<()> {
        self.meter.charge(units)
    }

    /// Charge for a call into another contract.
    pub fn charge_call(&mut self) -> HostResult<()> {
        let units = self.meter.schedule().call;
        self.meter.charge(units)
    }

    /// Read a storage word of `contract`.
    pub fn sload(&mut self, contract: Address, slot: B256) -> HostResult<U256> {
        let units = self.meter.schedule().storage_read;
        self.meter.charge(units)?;
        Ok(self.read_storage(contract, slot))
    }

    /// Write a storage word of `contract`.
    pub fn sstore(&mut self, contract: Address, slot: B256, value: U256) -> HostResult<()> {
        let units = self.meter.schedule().storage_write;
        self.meter.charge(units)?;
        self.journal.storage.insert((contract, slot), value);
        Ok(())
    }

    /// Append a record to this transaction's log.
    pub fn emit(&mut self, record: LogRecord) -> HostResult<()> {
        let units = self.meter.schedule().log;
        self.meter.charge(units)?;
        self.journal.logs.push(record);
        Ok(())
    }

    /// Records emitted so far in this transaction.
    pub fn logs(&self) -> &[LogRecord] {
        &self.journal.logs
    }

    pub(crate) fn hook_for(&self, asset: Address) -> Option<Arc<dyn TransferHook>> {
        self.hooks.get(&asset).cloned()
    }

    pub(crate) fn read_balance(&self, asset: Address, holder: Address) -> U256 {
        match self.journal.balances.get(&(asset, holder)) {
            Some(value) => *value,
            None => self.state.balance_of(asset, holder),
        }
    }

    pub(crate) fn write_balance(&mut self, asset: Address, holder: Address, value: U256) {
        self.journal.balances.insert((asset, holder), value);
    }

    pub(crate) fn read_allowance(&self, asset: Address, owner: Address, spender: Address) -> U256 {
        match self.journal.allowances.get(&(asset, owner, spender)) {
            Some(value) => *value,
            None => self.state.allowance(asset, owner, spender),
        }
    }

    pub(crate) fn write_allowance(
        &mut self,
        asset: Address,
        owner: Address,
        spender: Address,
        value: U256,
    ) {
        self.journal.allowances.insert((asset, owner, spender), value);
    }

    fn read_storage(&self, contract: Address, slot: B256) -> U256 {
        match self.journal.storage.get(&(contract, slot)) {
            Some(value) => *value,
            None => self.state.storage(contract, slot),
        }
    }
}

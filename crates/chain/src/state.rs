//! Committed world state.
//!
//! The only place balances, allowances and contract storage live between
//! transactions. Mutation outside genesis seeding happens exclusively by
//! applying a transaction's journal.

use alloy::primitives::{Address, B256, U256};
use std::collections::HashMap;

use crate::events::LogRecord;

pub(crate) type BalanceKey = (Address, Address);
pub(crate) type AllowanceKey = (Address, Address, Address);
pub(crate) type StorageKey = (Address, B256);

/// Balances, allowances, contract storage and the committed log.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    pub(crate) balances: HashMap<BalanceKey, U256>,
    pub(crate) allowances: HashMap<AllowanceKey, U256>,
    pub(crate) storage: HashMap<StorageKey, U256>,
    pub(crate) logs: Vec<LogRecord>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `holder` in `asset`.
    pub fn balance_of(&self, asset: Address, holder: Address) -> U256 {
        self.balances
            .get(&(asset, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Amount `spender` may pull from `owner` in `asset`.
    pub fn allowance(&self, asset: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(asset, owner, spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Storage word of `contract` at `slot`.
    pub fn storage(&self, contract: Address, slot: B256) -> U256 {
        self.storage
            .get(&(contract, slot))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Every record committed so far, oldest first.
    pub fn logs(&self) -> &[LogRecord] {
        &self.logs
    }

    /// Genesis credit of `amount` to `holder`. Emits nothing.
    pub fn mint(&mut self, asset: Address, holder: Address, amount: U256) {
        let balance = self.balances.entry((asset, holder)).or_insert(U256::ZERO);
        *balance = balance.saturating_add(amount);
    }

    /// Genesis write of a storage word.
    pub fn set_storage(&mut self, contract: Address, slot: B256, value: U256) {
        if value.is_zero() {
            self.storage.remove(&(contract, slot));
        } else {
            self.storage.insert((contract, slot), value);
        }
    }

    pub(crate) fn write_balance(&mut self, key: BalanceKey, value: U256) {
        if value.is_zero() {
            self.balances.remove(&key);
        } else {
            self.balances.insert(key, value);
        }
    }

    pub(crate) fn write_allowance(&mut self, key: AllowanceKey, value: U256) {
        if value.is_zero() {
            self.allowances.remove(&key);
        } else {
            self.allowances.insert(key, value);
        }
    }
}

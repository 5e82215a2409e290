//! Multi-asset balance and allowance ledger.
//!
//! ERC20 semantics over the transaction journal: conserving transfers,
//! overwrite-style approvals, allowance consumption on delegated transfers
//! (an allowance of `U256::MAX` is never consumed). Each mutation emits the
//! matching record.

use alloy::primitives::{Address, U256};
use tracing::trace;

use crate::error::{HostError, HostResult};
use crate::events::LogRecord;
use crate::journal::Tx;

/// Callback run after every transfer of the asset it is registered for.
///
/// Hooks execute inside the transfer's transaction and can call back into
/// any contract, which is how reentrant assets are modelled.
pub trait TransferHook: Send + Sync {
    fn on_transfer(
        &self,
        tx: &mut Tx<'_>,
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> HostResult<()>;
}

impl Tx<'_> {
    /// Balance of `holder` in `asset`.
    pub fn balance_of(&mut self, asset: Address, holder: Address) -> HostResult<U256> {
        let units = self.schedule().storage_read;
        self.charge(units)?;
        Ok(self.read_balance(asset, holder))
    }

    /// Amount `spender` may pull from `owner`.
    pub fn allowance(
        &mut self,
        asset: Address,
        owner: Address,
        spender: Address,
    ) -> HostResult<U256> {
        let units = self.schedule().storage_read;
        self.charge(units)?;
        Ok(self.read_allowance(asset, owner, spender))
    }

    /// Set `owner`'s allowance to `spender` to exactly `amount`.
    pub fn approve(
        &mut self,
        asset: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> HostResult<()> {
        let units = self.schedule().approve;
        self.charge(units)?;
        self.write_allowance(asset, owner, spender, amount);

        trace!(asset = %asset, owner = %owner, spender = %spender, amount = %amount, "approve");

        self.emit(LogRecord::Approval {
            asset,
            owner,
            spender,
            amount,
        })
    }

    /// Move `amount` of `asset` from `from` to `to`.
    pub fn transfer(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> HostResult<()> {
        let units = self.schedule().transfer;
        self.charge(units)?;

        let balance = self.read_balance(asset, from);
        if balance < amount {
            return Err(HostError::InsufficientBalance {
                asset,
                holder: from,
                balance,
                required: amount,
            });
        }

        if from != to {
            let credited = self
                .read_balance(asset, to)
                .checked_add(amount)
                .ok_or(HostError::Overflow("transfer credit"))?;
            self.write_balance(asset, from, balance - amount);
            self.write_balance(asset, to, credited);
        }

        trace!(asset = %asset, from = %from, to = %to, amount = %amount, "transfer");

        self.emit(LogRecord::Transfer {
            asset,
            from,
            to,
            amount,
        })?;

        if let Some(hook) = self.hook_for(asset) {
            hook.on_transfer(self, asset, from, to, amount)?;
        }
        Ok(())
    }

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance.
    pub fn transfer_from(
        &mut self,
        asset: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> HostResult<()> {
        let allowance = self.allowance(asset, from, spender)?;
        if allowance < amount {
            return Err(HostError::InsufficientAllowance {
                asset,
                owner: from,
                spender,
                allowance,
                required: amount,
            });
        }
        if allowance != U256::MAX {
            self.write_allowance(asset, from, spender, allowance - amount);
        }
        self.transfer(asset, from, to, amount)
    }
}

//! Per-invocation scratch state.
//!
//! Lives for exactly one loan callback and is dropped on both the success
//! and the failure path.

use alloy::primitives::{Address, U256};
use smallvec::SmallVec;

use crate::error::Result;
use crate::request::{LiquidationRequest, LoanBatch};
use flash_liquidator_chain::{HostResult, Tx};

/// An authorization the liquidator granted during the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantedApproval {
    pub asset: Address,
    pub spender: Address,
    pub amount: U256,
}

/// Result of the collateral swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    pub from_amount: U256,
    pub received_amount: U256,
}

#[derive(Debug)]
pub struct ExecutionContext {
    /// Address of the liquidator running this invocation
    pub liquidator: Address,
    pub request: LiquidationRequest,
    pub batch: LoanBatch,
    /// Collateral delivered by the liquidation; the most a swap may spend
    pub collateral_received: U256,
    approvals: SmallVec<[GrantedApproval; 4]>,
}

impl ExecutionContext {
    pub fn new(liquidator: Address, request: LiquidationRequest, batch: LoanBatch) -> Self {
        Self {
            liquidator,
            request,
            batch,
            collateral_received: U256::ZERO,
            approvals: SmallVec::new(),
        }
    }

    /// Principal plus premium owed on the debt-asset loan.
    pub fn owed(&self) -> Result<U256> {
        self.batch.loan().owed()
    }

    /// Liquidator balance of `asset`.
    pub fn balance(&self, tx: &mut Tx<'_>, asset: Address) -> HostResult<U256> {
        tx.balance_of(asset, self.liquidator)
    }

    /// Set the liquidator's allowance to `spender` and record the grant.
    pub fn approve(
        &mut self,
        tx: &mut Tx<'_>,
        asset: Address,
        spender: Address,
        amount: U256,
    ) -> HostResult<()> {
        tx.approve(asset, self.liquidator, spender, amount)?;
        self.approvals.push(GrantedApproval {
            asset,
            spender,
            amount,
        });
        Ok(())
    }

    /// Every authorization granted so far, oldest first.
    pub fn approvals(&self) -> &[GrantedApproval] {
        &self.approvals
    }

    /// Zero every allowance granted to `spender` in this run that was not
    /// fully consumed. Returns the assets revoked.
    pub fn revoke_grants_to(
        &mut self,
        tx: &mut Tx<'_>,
        spender: Address,
    ) -> HostResult<SmallVec<[Address; 2]>> {
        let mut assets: SmallVec<[Address; 2]> = SmallVec::new();
        for grant in self.approvals.iter().filter(|grant| grant.spender == spender) {
            if !assets.contains(&grant.asset) {
                assets.push(grant.asset);
            }
        }

        let mut revoked = SmallVec::new();
        for asset in assets {
            if !tx.allowance(asset, self.liquidator, spender)?.is_zero() {
                self.approve(tx, asset, spender, U256::ZERO)?;
                revoked.push(asset);
            }
        }
        Ok(revoked)
    }
}

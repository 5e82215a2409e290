//! Authorize the lender to pull principal plus premium.
//!
//! Premiums come from the authenticated lender and are used as given.

use alloy::primitives::Address;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::error::{classify_host, LiquidatorError, Result};
use flash_liquidator_chain::Tx;

pub struct RepaymentCalculator {
    lending_pool: Address,
}

impl RepaymentCalculator {
    pub fn new(lending_pool: Address) -> Self {
        Self { lending_pool }
    }

    /// Approve the pool for `amount + premium` of every loaned asset.
    pub fn authorize(&self, tx: &mut Tx<'_>, ctx: &mut ExecutionContext) -> Result<()> {
        let loans: Vec<_> = ctx.batch.iter().copied().collect();
        for loan in loans {
            let owed = loan.owed()?;
            let available = ctx.balance(tx, loan.asset).map_err(classify_host)?;
            if available < owed {
                return Err(LiquidatorError::InsufficientRepayment {
                    asset: loan.asset,
                    owed,
                    available,
                });
            }

            ctx.approve(tx, loan.asset, self.lending_pool, owed)
                .map_err(classify_host)?;
            debug!(asset = %loan.asset, owed = %owed, surplus = %(available - owed), "Repayment authorized");
        }
        Ok(())
    }

    /// Every loaned asset has an allowance to the pool covering what is owed.
    pub fn is_settled(&self, tx: &mut Tx<'_>, ctx: &ExecutionContext) -> Result<bool> {
        for loan in ctx.batch.iter() {
            let allowance = tx
                .allowance(loan.asset, ctx.liquidator, self.lending_pool)
                .map_err(classify_host)?;
            if allowance < loan.owed()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

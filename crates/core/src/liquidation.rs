//! Liquidation step: repay the target's debt and collect its collateral.

use tracing::{debug, instrument};

use crate::context::ExecutionContext;
use crate::error::{classify, classify_host, LiquidatorError, Result};
use flash_liquidator_chain::{HostError, LendingProtocol, LiquidationCallParams, Tx};

pub struct LiquidationExecutor<'a> {
    pool: &'a dyn LendingProtocol,
}

impl<'a> LiquidationExecutor<'a> {
    pub fn new(pool: &'a dyn LendingProtocol) -> Self {
        Self { pool }
    }

    /// Approve the pool for `debt_to_cover` and liquidate.
    ///
    /// Collateral received and debt repaid are measured from balance and
    /// allowance deltas, never taken from the pool's return value. A call
    /// that repays nothing is treated as the position not being liquidatable.
    #[instrument(skip_all, fields(user = %ctx.request.target_user))]
    pub fn execute(&self, tx: &mut Tx<'_>, ctx: &mut ExecutionContext) -> Result<()> {
        let request = ctx.request;
        let pool = self.pool.address();

        let collateral_before = ctx
            .balance(tx, request.collateral_asset)
            .map_err(classify_host)?;
        ctx.approve(tx, request.debt_asset, pool, request.debt_to_cover)
            .map_err(classify_host)?;

        let params = LiquidationCallParams {
            collateral_asset: request.collateral_asset,
            debt_asset: request.debt_asset,
            user: request.target_user,
            debt_to_cover: request.debt_to_cover,
            receive_reserve_token: false,
        };
        self.pool
            .liquidation_call(tx, ctx.liquidator, &params)
            .map_err(|err| {
                classify(err, |source| LiquidatorError::NotLiquidatable {
                    user: request.target_user,
                    source,
                })
            })?;

        let allowance_left = tx
            .allowance(request.debt_asset, ctx.liquidator, pool)
            .map_err(classify_host)?;
        let debt_repaid = request.debt_to_cover.saturating_sub(allowance_left);
        if debt_repaid.is_zero() {
            return Err(LiquidatorError::NotLiquidatable {
                user: request.target_user,
                source: HostError::InvalidAmount("liquidation repaid no debt"),
            });
        }

        let collateral_after = ctx
            .balance(tx, request.collateral_asset)
            .map_err(classify_host)?;
        // Same asset: the repayment left through the same balance
        let collateral_received = if request.is_same_asset() {
            (collateral_after + debt_repaid).saturating_sub(collateral_before)
        } else {
            collateral_after.saturating_sub(collateral_before)
        };

        ctx.collateral_received = collateral_received;

        debug!(
            debt_repaid = %debt_repaid,
            collateral_received = %collateral_received,
            "Liquidation step complete"
        );
        Ok(())
    }
}

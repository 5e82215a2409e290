//! Collateral to debt-asset conversion through the AMM router.
//!
//! At most one exact-output swap per run. The direct pair is preferred;
//! the configured reference asset is the fallback hop.

use alloy::primitives::{Address, U256};
use smallvec::{smallvec, SmallVec};
use tracing::{debug, info, instrument};

use crate::context::{ExecutionContext, SwapOutcome};
use crate::error::{classify, classify_host, LiquidatorError, Result};
use flash_liquidator_chain::u256_math::{apply_basis_points_up, min};
use flash_liquidator_chain::{ExactOutputOrder, HostError, LogRecord, SwapRouter, Tx};

/// Swap decided for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPlan {
    pub from_asset: Address,
    pub to_asset: Address,
    /// Token hops, collateral first
    pub path: SmallVec<[Address; 3]>,
    /// Debt asset still missing to cover the loan
    pub exact_output_required: U256,
    /// Collateral the liquidator holds
    pub max_input_available: U256,
    /// Router quote for the required output along `path`
    pub quoted_input: U256,
}

impl SwapPlan {
    /// Input ceiling passed to the router: the quote plus slippage
    /// headroom, never more than what is available.
    pub fn amount_in_max(&self, max_slippage_bps: u16) -> U256 {
        min(
            apply_basis_points_up(self.quoted_input, max_slippage_bps),
            self.max_input_available,
        )
    }
}

pub struct SwapRouterAdapter<'a> {
    router: &'a dyn SwapRouter,
    reference_asset: Address,
    max_slippage_bps: u16,
}

impl<'a> SwapRouterAdapter<'a> {
    pub fn new(router: &'a dyn SwapRouter, reference_asset: Address, max_slippage_bps: u16) -> Self {
        Self {
            router,
            reference_asset,
            max_slippage_bps,
        }
    }

    fn candidate_paths(&self, from: Address, to: Address) -> SmallVec<[SmallVec<[Address; 3]>; 2]> {
        let mut paths: SmallVec<[SmallVec<[Address; 3]>; 2]> = smallvec![smallvec![from, to]];
        if self.reference_asset != from && self.reference_asset != to {
            paths.push(smallvec![from, self.reference_asset, to]);
        }
        paths
    }

    /// Decide whether and how to swap.
    ///
    /// `None` only when collateral and debt are the same asset. A cross-asset
    /// run always swaps exactly once, so debt asset already on hand that
    /// covers the loan is an error rather than a skipped swap. The input is
    /// capped at the collateral the liquidation delivered.
    pub fn plan(&self, tx: &mut Tx<'_>, ctx: &ExecutionContext) -> Result<Option<SwapPlan>> {
        let request = ctx.request;
        if request.is_same_asset() {
            return Ok(None);
        }

        let owed = ctx.owed()?;
        let on_hand = ctx.balance(tx, request.debt_asset).map_err(classify_host)?;
        let required = owed.saturating_sub(on_hand);

        let held = ctx
            .balance(tx, request.collateral_asset)
            .map_err(classify_host)?;
        let available = min(held, ctx.collateral_received);

        let insufficient = |reason: String| LiquidatorError::InsufficientCollateralForSwap {
            collateral_asset: request.collateral_asset,
            debt_asset: request.debt_asset,
            required,
            available,
            reason,
        };

        if required.is_zero() {
            debug!(owed = %owed, on_hand = %on_hand, "Debt asset on hand covers the loan");
            return Err(insufficient(format!(
                "{on_hand} debt asset on hand already covers {owed} owed"
            )));
        }

        let mut reasons: Vec<String> = Vec::new();
        for path in self.candidate_paths(request.collateral_asset, request.debt_asset) {
            match self.router.get_amounts_in(tx, required, &path) {
                Ok(amounts) if amounts[0] <= available => {
                    debug!(hops = path.len(), quoted_input = %amounts[0], "Swap path selected");
                    return Ok(Some(SwapPlan {
                        from_asset: request.collateral_asset,
                        to_asset: request.debt_asset,
                        path,
                        exact_output_required: required,
                        max_input_available: available,
                        quoted_input: amounts[0],
                    }));
                }
                Ok(amounts) => {
                    reasons.push(format!("{}-hop path needs {}", path.len() - 1, amounts[0]));
                }
                Err(err) if err.is_out_of_resources() => return Err(classify_host(err)),
                Err(err) => reasons.push(format!("{}-hop path: {}", path.len() - 1, err)),
            }
        }

        Err(insufficient(reasons.join("; ")))
    }

    /// Execute `plan`, revoke the leftover router allowance and emit
    /// `Swapped`.
    #[instrument(skip_all, fields(from = %plan.from_asset, to = %plan.to_asset, hops = plan.path.len() - 1))]
    pub fn execute(
        &self,
        tx: &mut Tx<'_>,
        ctx: &mut ExecutionContext,
        plan: &SwapPlan,
    ) -> Result<SwapOutcome> {
        let router = self.router.address();
        let from_before = ctx.balance(tx, plan.from_asset).map_err(classify_host)?;
        let to_before = ctx.balance(tx, plan.to_asset).map_err(classify_host)?;

        ctx.approve(tx, plan.from_asset, router, plan.max_input_available)
            .map_err(classify_host)?;

        let amount_in_max = plan.amount_in_max(self.max_slippage_bps);
        let order = ExactOutputOrder {
            amount_out: plan.exact_output_required,
            amount_in_max,
            path: &plan.path,
            recipient: ctx.liquidator,
            deadline: tx.timestamp(),
        };
        self.router
            .swap_tokens_for_exact_tokens(tx, ctx.liquidator, &order)
            .map_err(|err| {
                classify(err, |source: HostError| {
                    LiquidatorError::InsufficientCollateralForSwap {
                        collateral_asset: plan.from_asset,
                        debt_asset: plan.to_asset,
                        required: plan.exact_output_required,
                        available: amount_in_max,
                        reason: source.to_string(),
                    }
                })
            })?;

        let revoked = ctx.revoke_grants_to(tx, router).map_err(classify_host)?;
        if !revoked.is_empty() {
            debug!(assets = revoked.len(), "Residual router allowance revoked");
        }

        let from_after = ctx.balance(tx, plan.from_asset).map_err(classify_host)?;
        let to_after = ctx.balance(tx, plan.to_asset).map_err(classify_host)?;
        let outcome = SwapOutcome {
            from_amount: from_before.saturating_sub(from_after),
            received_amount: to_after.saturating_sub(to_before),
        };

        tx.emit(LogRecord::Swapped {
            emitter: ctx.liquidator,
            from_asset: plan.from_asset,
            to_asset: plan.to_asset,
            from_amount: outcome.from_amount,
            received_amount: outcome.received_amount,
        })
        .map_err(classify_host)?;

        info!(
            from_amount = %outcome.from_amount,
            received_amount = %outcome.received_amount,
            "Collateral swapped"
        );

        Ok(outcome)
    }
}

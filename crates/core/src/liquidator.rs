//! Flash liquidator: loan entry point and loan callback orchestration.
//!
//! One run is one transaction:
//!
//! 1. `request_loan` decodes the request and asks the pool for a flash loan
//! 2. the pool calls back `on_loan_received`, which liquidates, swaps the
//!    seized collateral if needed and authorizes repayment
//! 3. the pool pulls principal plus premium
//! 4. `request_loan` sweeps what is left to the caller
//!
//! Any failure unwinds the whole transaction, loan transfer included.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::Serialize;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::{LiquidatorConfig, LoanAccess};
use crate::context::ExecutionContext;
use crate::error::{classify, classify_host, LiquidatorError, Result};
use crate::liquidation::LiquidationExecutor;
use crate::repayment::RepaymentCalculator;
use crate::request::{LiquidationRequest, Loan, LoanBatch};
use crate::sweeper::{ProfitSweeper, SweptAmount};
use crate::swap::SwapRouterAdapter;
use flash_liquidator_chain::{
    FlashLoanReceiver, FlashLoanRequest, HostError, HostResult, LendingProtocol, LoanCallback,
    LogRecord, SwapRouter, Tx,
};

/// Storage slot of the single-flight guard.
pub const GUARD_SLOT: B256 = B256::ZERO;

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub request: LiquidationRequest,
    /// Loans settled by the pool in this run
    pub loans: Vec<Loan>,
    /// `Swapped` records emitted in this run
    pub swaps: usize,
    /// Residual balances handed to the caller
    pub swept: Vec<SweptAmount>,
    pub resources_used: u64,
}

/// Flash-loan liquidation orchestrator.
pub struct FlashLiquidator {
    address: Address,
    config: LiquidatorConfig,
    lending_pool: Arc<dyn LendingProtocol>,
    router: Arc<dyn SwapRouter>,
}

impl FlashLiquidator {
    /// Bind the liquidator to its collaborators.
    ///
    /// The collaborators' addresses must match the configuration; they are
    /// resolved here once and never again.
    pub fn new(
        address: Address,
        config: LiquidatorConfig,
        lending_pool: Arc<dyn LendingProtocol>,
        router: Arc<dyn SwapRouter>,
    ) -> Result<Self> {
        config.validate()?;
        if lending_pool.address() != config.lending_pool {
            return Err(LiquidatorError::Config(format!(
                "lending pool at {} does not match configured {}",
                lending_pool.address(),
                config.lending_pool
            )));
        }
        if router.address() != config.amm_router {
            return Err(LiquidatorError::Config(format!(
                "router at {} does not match configured {}",
                router.address(),
                config.amm_router
            )));
        }
        if address == config.lending_pool || address == config.amm_router {
            return Err(LiquidatorError::Config(
                "liquidator address collides with a collaborator".into(),
            ));
        }

        Ok(Self {
            address,
            config,
            lending_pool,
            router,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &LiquidatorConfig {
        &self.config
    }

    /// Start a run: borrow `amounts` of `assets` and liquidate as described
    /// by `request_bytes`.
    #[instrument(skip(self, tx, assets, amounts, modes, request_bytes), fields(caller = %caller))]
    pub fn request_loan(
        &self,
        tx: &mut Tx<'_>,
        caller: Address,
        assets: &[Address],
        amounts: &[U256],
        modes: &[u8],
        request_bytes: &Bytes,
    ) -> Result<RunReport> {
        if !self.config.permits_loan_request(caller) {
            let expected = match self.config.loan_access {
                LoanAccess::Operator(operator) => operator,
                LoanAccess::Open => caller,
            };
            return Err(LiquidatorError::Unauthorized { caller, expected });
        }

        // Fail on a bad payload before any external call
        let request = LiquidationRequest::decode(request_bytes)?;

        info!(
            user = %request.target_user,
            collateral = %request.collateral_asset,
            debt = %request.debt_asset,
            debt_to_cover = %request.debt_to_cover,
            "Requesting flash loan"
        );

        let first_log = tx.logs().len();
        let loan = FlashLoanRequest {
            assets,
            amounts,
            modes,
            params: request_bytes,
            referral_code: 0,
        };
        self.lending_pool
            .flash_loan(tx, self.address, self, &loan)
            .map_err(|err| classify(err, |err| self.loan_failure(err, assets, amounts)))?;

        let mut sweep_assets: SmallVec<[Address; 4]> = assets.iter().copied().collect();
        sweep_assets.push(request.collateral_asset);
        sweep_assets.push(request.debt_asset);
        let swept = ProfitSweeper::new(self.address)
            .sweep(tx, caller, &sweep_assets)
            .map_err(classify_host)?;

        let run_logs = &tx.logs()[first_log..];
        let loans = run_logs
            .iter()
            .filter_map(|log| match log {
                LogRecord::FlashLoan {
                    target,
                    asset,
                    amount,
                    premium,
                    ..
                } if *target == self.address => Some(Loan {
                    asset: *asset,
                    amount: *amount,
                    premium: *premium,
                }),
                _ => None,
            })
            .collect();
        let swaps = run_logs
            .iter()
            .filter(|log| log.is_swap() && log.emitter() == self.address)
            .count();

        let report = RunReport {
            request,
            loans,
            swaps,
            swept,
            resources_used: tx.resources_used(),
        };

        info!(
            swaps = report.swaps,
            swept = report.swept.len(),
            resources_used = report.resources_used,
            "Liquidation run complete"
        );
        Ok(report)
    }

    /// Loan callback. Only the configured lending pool may call it, only for
    /// loans this liquidator initiated, and never reentrantly.
    #[instrument(skip(self, tx, loan), fields(caller = %caller, initiator = %loan.initiator))]
    pub fn on_loan_received(
        &self,
        tx: &mut Tx<'_>,
        caller: Address,
        loan: &LoanCallback<'_>,
    ) -> Result<bool> {
        let guard = tx.sload(self.address, GUARD_SLOT).map_err(classify_host)?;
        if !guard.is_zero() {
            warn!("Loan callback re-entered while a run is in flight");
            return Err(LiquidatorError::ReentrancyDetected);
        }
        if caller != self.config.lending_pool {
            return Err(LiquidatorError::Unauthorized {
                caller,
                expected: self.config.lending_pool,
            });
        }
        if loan.initiator != self.address {
            return Err(LiquidatorError::Unauthorized {
                caller: loan.initiator,
                expected: self.address,
            });
        }
        tx.sstore(self.address, GUARD_SLOT, U256::from(1u64))
            .map_err(classify_host)?;

        let batch = LoanBatch::from_parts(loan.assets, loan.amounts, loan.premiums)?;
        let request = LiquidationRequest::decode(loan.params)?;
        let borrowed = *batch.loan();
        if borrowed.asset != request.debt_asset {
            return Err(LiquidatorError::MalformedBatch(format!(
                "loaned {} but the debt asset is {}",
                borrowed.asset, request.debt_asset
            )));
        }
        if borrowed.amount < request.debt_to_cover {
            return Err(LiquidatorError::MalformedBatch(format!(
                "loan of {} does not cover debt_to_cover {}",
                borrowed.amount, request.debt_to_cover
            )));
        }

        let mut ctx = ExecutionContext::new(self.address, request, batch);

        LiquidationExecutor::new(self.lending_pool.as_ref()).execute(tx, &mut ctx)?;

        let swapper = SwapRouterAdapter::new(
            self.router.as_ref(),
            self.config.reference_asset,
            self.config.max_slippage_bps,
        );
        if let Some(plan) = swapper.plan(tx, &ctx)? {
            let outcome = swapper.execute(tx, &mut ctx, &plan)?;
            if outcome.received_amount < plan.exact_output_required {
                return Err(LiquidatorError::InsufficientCollateralForSwap {
                    collateral_asset: plan.from_asset,
                    debt_asset: plan.to_asset,
                    required: plan.exact_output_required,
                    available: plan.max_input_available,
                    reason: format!("router delivered {}", outcome.received_amount),
                });
            }
        }

        let repayment = RepaymentCalculator::new(self.config.lending_pool);
        repayment.authorize(tx, &mut ctx)?;

        tx.sstore(self.address, GUARD_SLOT, U256::ZERO)
            .map_err(classify_host)?;

        let settled = repayment.is_settled(tx, &ctx)?;
        debug!(
            settled,
            approvals = ctx.approvals().len(),
            "Loan callback complete"
        );
        Ok(settled)
    }

    /// Classify a failed flash loan that did not carry a liquidator error.
    fn loan_failure(&self, err: HostError, assets: &[Address], amounts: &[U256]) -> LiquidatorError {
        match err {
            HostError::InsufficientAllowance {
                asset,
                owner,
                allowance,
                required,
                ..
            } if owner == self.address => LiquidatorError::InsufficientRepayment {
                asset,
                owed: required,
                available: allowance,
            },
            HostError::InsufficientBalance {
                asset,
                holder,
                balance,
                required,
            } if holder == self.address => LiquidatorError::InsufficientRepayment {
                asset,
                owed: required,
                available: balance,
            },
            HostError::InvalidFlashLoanReturn(_) => LiquidatorError::InsufficientRepayment {
                asset: assets.first().copied().unwrap_or_default(),
                owed: amounts.first().copied().unwrap_or_default(),
                available: U256::ZERO,
            },
            err @ (HostError::InconsistentFlashLoanParams(_)
            | HostError::UnsupportedLoanMode(_)
            | HostError::UnknownReserve(_)
            | HostError::InsufficientBalance { .. }) => {
                LiquidatorError::MalformedBatch(err.to_string())
            }
            other => LiquidatorError::Host(other),
        }
    }
}

impl FlashLoanReceiver for FlashLiquidator {
    fn address(&self) -> Address {
        self.address
    }

    fn execute_operation(
        &self,
        tx: &mut Tx<'_>,
        caller: Address,
        loan: &LoanCallback<'_>,
    ) -> HostResult<bool> {
        self.on_loan_received(tx, caller, loan)
            .map_err(HostError::callback)
    }
}

impl std::fmt::Debug for FlashLiquidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashLiquidator")
            .field("address", &self.address)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

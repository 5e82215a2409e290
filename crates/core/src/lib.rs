//! Flash-loan liquidation core.
//!
//! This crate provides the liquidator contract logic:
//! - Liquidation request decoding and loan batch validation
//! - Loan callback orchestration behind a reentrancy guard
//! - Collateral seizure through the lending pool
//! - Exact-output collateral swaps with bounded slippage
//! - Repayment authorization and residual sweep
//! - Post-run invariant checks
//!
//! Collaborators (lending pool, swap router, ledger) come from
//! `flash-liquidator-chain`.

pub mod config;
mod context;
pub mod error;
pub mod invariants;
mod liquidation;
mod liquidator;
mod repayment;
pub mod request;
mod swap;
mod sweeper;

#[cfg(test)]
mod testkit;

pub use config::{LiquidatorConfig, LoanAccess, MAX_SLIPPAGE_BPS};
pub use context::{ExecutionContext, GrantedApproval, SwapOutcome};
pub use error::{LiquidatorError, Result};
pub use invariants::{InvariantGuard, InvariantReport, Violation};
pub use liquidation::LiquidationExecutor;
pub use liquidator::{FlashLiquidator, RunReport, GUARD_SLOT};
pub use repayment::RepaymentCalculator;
pub use request::{LiquidationRequest, Loan, LoanBatch, ENCODED_REQUEST_LEN};
pub use swap::{SwapPlan, SwapRouterAdapter};
pub use sweeper::{ProfitSweeper, SweptAmount};

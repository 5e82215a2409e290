//! Lending protocol capability.
//!
//! The liquidator talks to its lender only through these traits, so the
//! in-memory pool can be swapped for a test double.
//!
//! # Architecture
//!
//! - [`LendingProtocol`]: health queries, liquidation and flash loans
//! - [`FlashLoanReceiver`]: the callback surface a borrower exposes
//!
//! # Example
//!
//! ```rust,ignore
//! let health = pool.account_health(tx, user)?;
//! if health.is_liquidatable() {
//!     pool.liquidation_call(tx, liquidator, &params)?;
//! }
//! ```

mod pool;

pub use pool::{InMemoryLendingPool, LendingPoolBuilder, ReserveConfig};

use alloy::primitives::{Address, Bytes, U256};
use std::fmt::Debug;

use crate::error::HostResult;
use crate::journal::Tx;
use crate::u256_math::is_liquidatable_wad;

/// Aggregate position health of one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountHealth {
    /// Collateral value (WAD)
    pub total_collateral: U256,
    /// Debt value (WAD)
    pub total_debt: U256,
    /// Threshold-weighted collateral over debt (WAD), `U256::MAX` without debt
    pub health_factor: U256,
}

impl AccountHealth {
    /// Check if position is liquidatable (HF < 1.0).
    pub fn is_liquidatable(&self) -> bool {
        is_liquidatable_wad(self.health_factor)
    }
}

/// Parameters for a liquidation call.
#[derive(Debug, Clone)]
pub struct LiquidationCallParams {
    /// Collateral asset to seize
    pub collateral_asset: Address,
    /// Debt asset to repay
    pub debt_asset: Address,
    /// User to liquidate
    pub user: Address,
    /// Amount of debt to cover
    pub debt_to_cover: U256,
    /// Credit seized collateral as a pool position instead of the asset
    pub receive_reserve_token: bool,
}

/// Flash loan terms as submitted by the borrower.
#[derive(Debug, Clone, Copy)]
pub struct FlashLoanRequest<'a> {
    pub assets: &'a [Address],
    pub amounts: &'a [U256],
    /// Repayment mode per asset; only 0 (repay in full) is supported
    pub modes: &'a [u8],
    /// Opaque payload forwarded to the receiver
    pub params: &'a Bytes,
    pub referral_code: u16,
}

/// Loan terms handed to the receiver.
#[derive(Debug, Clone, Copy)]
pub struct LoanCallback<'a> {
    /// Account that requested the loan
    pub initiator: Address,
    pub assets: &'a [Address],
    pub amounts: &'a [U256],
    /// Fee owed on top of each amount
    pub premiums: &'a [U256],
    pub params: &'a Bytes,
}

/// Core trait for lending protocol interactions.
pub trait LendingProtocol: Send + Sync + Debug {
    /// Pool contract address.
    fn address(&self) -> Address;

    /// Aggregate health of `user` across every reserve.
    fn account_health(&self, tx: &mut Tx<'_>, user: Address) -> HostResult<AccountHealth>;

    /// Repay part of `user`'s debt and seize collateral at a bonus.
    ///
    /// The debt asset is pulled from `caller`, which must have approved the
    /// pool beforehand. Returns the collateral amount seized.
    fn liquidation_call(
        &self,
        tx: &mut Tx<'_>,
        caller: Address,
        params: &LiquidationCallParams,
    ) -> HostResult<U256>;

    /// Lend `request.amounts` to `receiver`, invoke it, then pull back
    /// principal plus premium.
    fn flash_loan(
        &self,
        tx: &mut Tx<'_>,
        caller: Address,
        receiver: &dyn FlashLoanReceiver,
        request: &FlashLoanRequest<'_>,
    ) -> HostResult<()>;
}

/// Contract able to receive a flash loan.
pub trait FlashLoanReceiver {
    fn address(&self) -> Address;

    /// Invoked by the lender once the loan has been transferred.
    ///
    /// `caller` is the contract making the call. Returning `false` or an
    /// error fails the loan.
    fn execute_operation(
        &self,
        tx: &mut Tx<'_>,
        caller: Address,
        loan: &LoanCallback<'_>,
    ) -> HostResult<bool>;
}

//! AMM router capability.
//!
//! The liquidator quotes and executes exact-output swaps through
//! [`SwapRouter`]; [`ConstantProductRouter`] is the in-memory reference
//! implementation.

mod constant_product;

pub use constant_product::ConstantProductRouter;

use alloy::primitives::{Address, U256};
use std::fmt::Debug;

use crate::error::HostResult;
use crate::journal::Tx;

/// Exact-output swap request.
#[derive(Debug, Clone, Copy)]
pub struct ExactOutputOrder<'a> {
    /// Output to deliver to `recipient`
    pub amount_out: U256,
    /// Upper bound on the input pulled from the caller
    pub amount_in_max: U256,
    /// Token hops, input first
    pub path: &'a [Address],
    pub recipient: Address,
    /// Latest acceptable block timestamp
    pub deadline: u64,
}

pub trait SwapRouter: Send + Sync + Debug {
    /// Router contract address; the spender callers must approve.
    fn address(&self) -> Address;

    /// Input required at every hop of `path` to receive `amount_out`.
    ///
    /// `amounts[0]` is the input owed by the caller, the last entry equals
    /// `amount_out`.
    fn get_amounts_in(
        &self,
        tx: &mut Tx<'_>,
        amount_out: U256,
        path: &[Address],
    ) -> HostResult<Vec<U256>>;

    /// Pull at most `order.amount_in_max` from `caller` and deliver exactly
    /// `order.amount_out` to the recipient.
    fn swap_tokens_for_exact_tokens(
        &self,
        tx: &mut Tx<'_>,
        caller: Address,
        order: &ExactOutputOrder<'_>,
    ) -> HostResult<Vec<U256>>;
}

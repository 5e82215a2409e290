//! Failures raised by the host environment and its collaborators.
//!
//! A `HostError` aborts the enclosing transaction. Nothing here is
//! recoverable inside a run; callers classify these into their own error
//! taxonomy and let the transaction unwind.

use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Result alias used across the host environment.
pub type HostResult<T> = Result<T, HostError>;

/// Boxed error raised by a callback (flash loan receiver, transfer hook)
/// and carried back up the call stack unchanged.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("insufficient {asset} balance for {holder}: have {balance}, need {required}")]
    InsufficientBalance {
        asset: Address,
        holder: Address,
        balance: U256,
        required: U256,
    },

    #[error(
        "insufficient {asset} allowance from {owner} to {spender}: have {allowance}, need {required}"
    )]
    InsufficientAllowance {
        asset: Address,
        owner: Address,
        spender: Address,
        allowance: U256,
        required: U256,
    },

    #[error("resource limit exceeded: used {used} of {limit}")]
    OutOfResources { used: u64, limit: u64 },

    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    // Lending pool rejections
    #[error("health factor {health_factor} of {user} is not below the liquidation threshold")]
    HealthFactorNotBelowThreshold { user: Address, health_factor: U256 },

    #[error("debt to cover {requested} exceeds the close factor limit {max}")]
    CloseFactorExceeded { requested: U256, max: U256 },

    #[error("{user} has no {asset} debt")]
    NoDebt { user: Address, asset: Address },

    #[error("{user} has no {asset} collateral")]
    NoCollateral { user: Address, asset: Address },

    #[error("invalid amount: {0}")]
    InvalidAmount(&'static str),

    #[error("unknown reserve {0}")]
    UnknownReserve(Address),

    #[error("inconsistent flash loan parameters: {0}")]
    InconsistentFlashLoanParams(String),

    #[error("unsupported flash loan mode {0}")]
    UnsupportedLoanMode(u8),

    #[error("flash loan receiver {0} returned false")]
    InvalidFlashLoanReturn(Address),

    // Router rejections
    #[error("swap path must contain at least two distinct hops")]
    InvalidPath,

    #[error("insufficient liquidity between {token_in} and {token_out}")]
    InsufficientLiquidity { token_in: Address, token_out: Address },

    #[error("swap needs {required} input, maximum is {max}")]
    ExcessiveInputAmount { required: U256, max: U256 },

    #[error("deadline {deadline} passed at {now}")]
    Expired { deadline: u64, now: u64 },

    #[error("callback failed: {0}")]
    Callback(CallbackError),
}

impl HostError {
    /// Wrap an error raised inside a callback so it can cross a
    /// collaborator boundary.
    pub fn callback<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Callback(Box::new(err))
    }

    pub fn is_out_of_resources(&self) -> bool {
        matches!(self, Self::OutOfResources { .. })
    }
}

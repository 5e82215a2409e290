//! Liquidator error taxonomy.
//!
//! Every variant aborts the run; the enclosing transaction unwinds and no
//! state change survives.

use alloy::primitives::{Address, U256};
use flash_liquidator_chain::HostError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LiquidatorError>;

#[derive(Debug, Error)]
pub enum LiquidatorError {
    #[error("unauthorized caller {caller}, expected {expected}")]
    Unauthorized { caller: Address, expected: Address },

    #[error("malformed request params: {0}")]
    MalformedParams(String),

    #[error("malformed loan batch: {0}")]
    MalformedBatch(String),

    #[error("position of {user} is not liquidatable: {source}")]
    NotLiquidatable {
        user: Address,
        #[source]
        source: HostError,
    },

    #[error(
        "cannot swap {collateral_asset} into {required} of {debt_asset} with {available} available: {reason}"
    )]
    InsufficientCollateralForSwap {
        collateral_asset: Address,
        debt_asset: Address,
        required: U256,
        available: U256,
        reason: String,
    },

    #[error("insufficient {asset} to repay: owed {owed}, available {available}")]
    InsufficientRepayment {
        asset: Address,
        owed: U256,
        available: U256,
    },

    #[error("reentrant loan callback")]
    ReentrancyDetected,

    #[error("resource limit exceeded: used {used} of {limit}")]
    OutOfResources { used: u64, limit: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Collaborator failure with no more specific classification
    #[error(transparent)]
    Host(HostError),
}

impl LiquidatorError {
    /// Short stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "Unauthorized",
            Self::MalformedParams(_) => "MalformedParams",
            Self::MalformedBatch(_) => "MalformedBatch",
            Self::NotLiquidatable { .. } => "NotLiquidatable",
            Self::InsufficientCollateralForSwap { .. } => "InsufficientCollateralForSwap",
            Self::InsufficientRepayment { .. } => "InsufficientRepayment",
            Self::ReentrancyDetected => "ReentrancyDetected",
            Self::OutOfResources { .. } => "OutOfResources",
            Self::Config(_) => "Config",
            Self::Host(_) => "Host",
        }
    }
}

/// Map a collaborator failure into the taxonomy.
///
/// Resource exhaustion always stays `OutOfResources`, and a liquidator
/// error that crossed a collaborator inside `HostError::Callback` comes
/// back out unchanged. Everything else goes through `fallback`.
pub(crate) fn classify(
    err: HostError,
    fallback: impl FnOnce(HostError) -> LiquidatorError,
) -> LiquidatorError {
    match err {
        HostError::OutOfResources { used, limit } => LiquidatorError::OutOfResources { used, limit },
        HostError::Callback(inner) => match inner.downcast::<LiquidatorError>() {
            Ok(err) => *err,
            Err(other) => fallback(HostError::Callback(other)),
        },
        other => fallback(other),
    }
}

/// Classify with no component-specific fallback.
pub(crate) fn classify_host(err: HostError) -> LiquidatorError {
    classify(err, LiquidatorError::Host)
}

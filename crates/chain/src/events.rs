//! Log records emitted during a transaction.
//!
//! Records are journaled with every other mutation: a failed transaction
//! emits nothing.

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolEvent;
use serde::Serialize;

use crate::contracts::{common_signatures, ILendingPool, ILiquidator};

/// A single emitted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum LogRecord {
    /// Ledger transfer (emitted by the asset)
    Transfer {
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
    },
    /// Allowance update (emitted by the asset)
    Approval {
        asset: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    },
    /// Liquidation executed by the lending pool
    LiquidationCall {
        pool: Address,
        collateral_asset: Address,
        debt_asset: Address,
        user: Address,
        debt_to_cover: U256,
        liquidated_collateral_amount: U256,
        liquidator: Address,
        receive_a_token: bool,
    },
    /// Flash loan settled by the lending pool
    FlashLoan {
        pool: Address,
        target: Address,
        initiator: Address,
        asset: Address,
        amount: U256,
        premium: U256,
        referral_code: u16,
    },
    /// Collateral converted into the debt asset by the liquidator
    Swapped {
        emitter: Address,
        from_asset: Address,
        to_asset: Address,
        from_amount: U256,
        received_amount: U256,
    },
}

impl LogRecord {
    /// Contract that emitted the record.
    pub fn emitter(&self) -> Address {
        match self {
            Self::Transfer { asset, .. } | Self::Approval { asset, .. } => *asset,
            Self::LiquidationCall { pool, .. } | Self::FlashLoan { pool, .. } => *pool,
            Self::Swapped { emitter, .. } => *emitter,
        }
    }

    /// Event signature hash, as it would appear in `topics[0]`.
    pub fn topic0(&self) -> B256 {
        match self {
            Self::Transfer { .. } => common_signatures::ERC20_TRANSFER,
            Self::Approval { .. } => common_signatures::ERC20_APPROVAL,
            Self::LiquidationCall { .. } => ILendingPool::LiquidationCall::SIGNATURE_HASH,
            Self::FlashLoan { .. } => ILendingPool::FlashLoan::SIGNATURE_HASH,
            Self::Swapped { .. } => ILiquidator::Swapped::SIGNATURE_HASH,
        }
    }

    pub fn is_swap(&self) -> bool {
        matches!(self, Self::Swapped { .. })
    }

    /// Transfer or approval record; the ledger-level side effects.
    pub fn is_ledger_record(&self) -> bool {
        matches!(self, Self::Transfer { .. } | Self::Approval { .. })
    }
}

//! Host execution environment for the flash liquidator.
//!
//! This crate provides:
//! - World state with a transactional journal (all-or-nothing runs)
//! - Multi-asset ledger with ERC20 semantics and transfer hooks
//! - Resource metering per transaction
//! - Log records keyed by `sol!` event signatures
//! - Lending protocol and AMM router capabilities with in-memory
//!   reference implementations
//!
//! Execution is synchronous: one transaction holds the world state lock for
//! its whole duration.

pub mod amm;
pub mod contracts;
pub mod error;
pub mod events;
pub mod gas;
pub mod journal;
pub mod ledger;
pub mod protocol;
pub mod state;
pub mod u256_math;

pub use amm::{ConstantProductRouter, ExactOutputOrder, SwapRouter};
pub use contracts::{common_signatures, ILendingPool, ILiquidator, LiquidationParams, IERC20};
pub use error::{CallbackError, HostError, HostResult};
pub use events::LogRecord;
pub use gas::{GasSchedule, ResourceMeter};
pub use journal::{Host, HostConfig, Receipt, Tx, DEFAULT_RESOURCE_LIMIT};
pub use ledger::TransferHook;
pub use protocol::{
    AccountHealth, FlashLoanReceiver, FlashLoanRequest, InMemoryLendingPool, LendingPoolBuilder,
    LendingProtocol, LiquidationCallParams, LoanCallback, ReserveConfig,
};
pub use state::WorldState;

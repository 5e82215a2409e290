//! ABI bindings used by the host environment and the liquidator.

pub mod bindings;
pub mod common;

pub use bindings::{ILendingPool, ILiquidator, LiquidationParams};
pub use common::{common_signatures, IERC20};

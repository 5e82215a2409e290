//! Residual balance sweep to the run's initiator.

use alloy::primitives::{Address, U256};
use serde::Serialize;
use smallvec::SmallVec;
use tracing::info;

use flash_liquidator_chain::{HostResult, Tx};

/// Amount of one asset handed to the initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweptAmount {
    pub asset: Address,
    pub amount: U256,
}

pub struct ProfitSweeper {
    liquidator: Address,
}

impl ProfitSweeper {
    pub fn new(liquidator: Address) -> Self {
        Self { liquidator }
    }

    /// Transfer the liquidator's whole balance of each asset to `recipient`.
    ///
    /// Duplicates are swept once; zero balances are skipped.
    pub fn sweep(
        &self,
        tx: &mut Tx<'_>,
        recipient: Address,
        assets: &[Address],
    ) -> HostResult<Vec<SweptAmount>> {
        let mut seen: SmallVec<[Address; 4]> = SmallVec::new();
        let mut swept = Vec::new();

        for asset in assets {
            if seen.contains(asset) {
                continue;
            }
            seen.push(*asset);

            let amount = tx.balance_of(*asset, self.liquidator)?;
            if amount.is_zero() {
                continue;
            }
            tx.transfer(*asset, self.liquidator, recipient, amount)?;
            info!(asset = %asset, amount = %amount, recipient = %recipient, "Swept residual");
            swept.push(SweptAmount {
                asset: *asset,
                amount,
            });
        }
        Ok(swept)
    }
}

//! Contract bindings for the lending pool, the liquidator and the request
//! payload.
//!
//! Only events and the request tuple are bound: the in-memory collaborators
//! are called through Rust traits, but their records and the opaque
//! request bytes keep the on-chain ABI layout.

use alloy::sol;

// ============================================================================
// Lending Pool
// ============================================================================

sol! {
    /// Lending pool events consumed read-only by the liquidator.
    interface ILendingPool {
        event LiquidationCall(
            address indexed collateralAsset,
            address indexed debtAsset,
            address indexed user,
            uint256 debtToCover,
            uint256 liquidatedCollateralAmount,
            address liquidator,
            bool receiveAToken
        );

        event FlashLoan(
            address indexed target,
            address indexed initiator,
            address indexed asset,
            uint256 amount,
            uint256 premium,
            uint16 referralCode
        );
    }
}

// ============================================================================
// Liquidator
// ============================================================================

sol! {
    /// Records emitted by the flash liquidator itself.
    interface ILiquidator {
        event Swapped(
            address indexed fromAsset,
            address indexed toAsset,
            uint256 fromAmount,
            uint256 receivedAmount
        );
    }

    /// Request payload carried through the flash loan as opaque bytes.
    ///
    /// Encoded as `abi.encode(address, address, address, uint256, bool)`.
    #[derive(Debug, PartialEq, Eq)]
    struct LiquidationParams {
        address collateralAsset;
        address debtAsset;
        address user;
        uint256 debtToCover;
        bool receiveAToken;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{keccak256, Address, U256};
    use alloy::sol_types::{SolEvent, SolType};

    #[test]
    fn test_liquidation_params_layout() {
        let params = LiquidationParams {
            collateralAsset: Address::repeat_byte(0x01),
            debtAsset: Address::repeat_byte(0x02),
            user: Address::repeat_byte(0x03),
            debtToCover: U256::from(42u64),
            receiveAToken: true,
        };

        let encoded = LiquidationParams::abi_encode(&params);
        // Static tuple: five words, no offset header
        assert_eq!(encoded.len(), 5 * 32);
        assert_eq!(&encoded[12..32], Address::repeat_byte(0x01).as_slice());
        assert_eq!(encoded[159], 1);
    }

    #[test]
    fn test_event_signatures() {
        assert_eq!(
            ILendingPool::LiquidationCall::SIGNATURE_HASH,
            keccak256("LiquidationCall(address,address,address,uint256,uint256,address,bool)")
        );
        assert_eq!(
            ILendingPool::FlashLoan::SIGNATURE_HASH,
            keccak256("FlashLoan(address,address,address,uint256,uint256,uint16)")
        );
        assert_eq!(
            ILiquidator::Swapped::SIGNATURE_HASH,
            keccak256("Swapped(address,address,uint256,uint256)")
        );
    }
}

//! Liquidation request decoding and loan batch validation.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolType;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::debug;

use crate::error::{LiquidatorError, Result};
use flash_liquidator_chain::LiquidationParams;

/// Encoded size of a request: five static ABI words.
pub const ENCODED_REQUEST_LEN: usize = 5 * 32;

/// Offset of the `receiveCollateralAsReserveToken` word.
const BOOL_WORD: usize = 4 * 32;

/// What to liquidate, decoded from the opaque payload carried through the
/// flash loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationRequest {
    pub collateral_asset: Address,
    pub debt_asset: Address,
    pub target_user: Address,
    pub debt_to_cover: U256,
    pub receive_collateral_as_reserve_token: bool,
}

impl LiquidationRequest {
    /// Decode `abi.encode(address,address,address,uint256,bool)`.
    ///
    /// Strict: the payload must be exactly five words, addresses must be
    /// left-padded with zeros and the bool word must be 0 or 1.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ENCODED_REQUEST_LEN {
            debug!(
                len = bytes.len(),
                head = %hex::encode(&bytes[..bytes.len().min(32)]),
                "Rejected request payload"
            );
            return Err(LiquidatorError::MalformedParams(format!(
                "expected {} bytes, got {}",
                ENCODED_REQUEST_LEN,
                bytes.len()
            )));
        }

        // abi_decode validation accepts any non-zero low byte as true
        let flag = &bytes[BOOL_WORD..];
        if flag[..31].iter().any(|byte| *byte != 0) || flag[31] > 1 {
            return Err(LiquidatorError::MalformedParams(format!(
                "bool word 0x{} is not 0 or 1",
                hex::encode(flag)
            )));
        }

        let params = <LiquidationParams as SolType>::abi_decode(bytes, true)
            .map_err(|err| LiquidatorError::MalformedParams(err.to_string()))?;

        Ok(Self {
            collateral_asset: params.collateralAsset,
            debt_asset: params.debtAsset,
            target_user: params.user,
            debt_to_cover: params.debtToCover,
            receive_collateral_as_reserve_token: params.receiveAToken,
        })
    }

    pub fn encode(&self) -> Bytes {
        let params = LiquidationParams {
            collateralAsset: self.collateral_asset,
            debtAsset: self.debt_asset,
            user: self.target_user,
            debtToCover: self.debt_to_cover,
            receiveAToken: self.receive_collateral_as_reserve_token,
        };
        Bytes::from(<LiquidationParams as SolType>::abi_encode(&params))
    }

    /// Collateral and debt are the same asset; no swap is needed.
    pub fn is_same_asset(&self) -> bool {
        self.collateral_asset == self.debt_asset
    }
}

/// One borrowed asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Loan {
    pub asset: Address,
    pub amount: U256,
    pub premium: U256,
}

impl Loan {
    /// Principal plus premium.
    pub fn owed(&self) -> Result<U256> {
        self.amount
            .checked_add(self.premium)
            .ok_or_else(|| LiquidatorError::MalformedBatch("repayment overflows".into()))
    }
}

/// The loans of one invocation.
///
/// Built from the lender's parallel sequences; exactly one loan is
/// supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanBatch {
    loans: SmallVec<[Loan; 1]>,
}

impl LoanBatch {
    pub fn from_parts(assets: &[Address], amounts: &[U256], premiums: &[U256]) -> Result<Self> {
        if assets.is_empty() || assets.len() != amounts.len() || assets.len() != premiums.len() {
            return Err(LiquidatorError::MalformedBatch(format!(
                "{} assets, {} amounts, {} premiums",
                assets.len(),
                amounts.len(),
                premiums.len()
            )));
        }
        if assets.len() > 1 {
            return Err(LiquidatorError::MalformedBatch(format!(
                "{} loans, only one is supported",
                assets.len()
            )));
        }

        let loans = assets
            .iter()
            .zip(amounts)
            .zip(premiums)
            .map(|((asset, amount), premium)| Loan {
                asset: *asset,
                amount: *amount,
                premium: *premium,
            })
            .collect();
        Ok(Self { loans })
    }

    /// The single loan of the batch.
    pub fn loan(&self) -> &Loan {
        &self.loans[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Loan> {
        self.loans.iter()
    }

    pub fn assets(&self) -> impl Iterator<Item = Address> + '_ {
        self.loans.iter().map(|loan| loan.asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolValue;

    fn sample() -> LiquidationRequest {
        LiquidationRequest {
            collateral_asset: Address::repeat_byte(0xee),
            debt_asset: Address::repeat_byte(0x0d),
            target_user: Address::repeat_byte(0x42),
            debt_to_cover: U256::from(800u64),
            receive_collateral_as_reserve_token: false,
        }
    }

    #[test]
    fn test_decode_encoded_request() {
        let request = sample();
        let bytes = request.encode();
        assert_eq!(bytes.len(), ENCODED_REQUEST_LEN);
        assert_eq!(LiquidationRequest::decode(&bytes).unwrap(), request);
        assert!(!request.is_same_asset());
    }

    #[test]
    fn test_decode_rejects_wrong_arity() {
        let four_fields = (
            Address::repeat_byte(0xee),
            Address::repeat_byte(0x0d),
            Address::repeat_byte(0x42),
            U256::from(800u64),
        )
            .abi_encode_params();
        assert_eq!(four_fields.len(), 128);

        let err = LiquidationRequest::decode(&four_fields).unwrap_err();
        assert!(matches!(err, LiquidatorError::MalformedParams(_)));

        let mut six_fields = sample().encode().to_vec();
        six_fields.extend_from_slice(&[0u8; 32]);
        assert!(LiquidationRequest::decode(&six_fields).is_err());
        assert!(LiquidationRequest::decode(&[]).is_err());
    }

    #[test]
    fn test_decode_rejects_dirty_address() {
        let mut bytes = sample().encode().to_vec();
        // Non-zero padding in the first address word
        bytes[0] = 0x01;
        let err = LiquidationRequest::decode(&bytes).unwrap_err();
        assert!(matches!(err, LiquidatorError::MalformedParams(_)));
    }

    #[test]
    fn test_decode_rejects_non_canonical_bool() {
        for low_byte in [2u8, 0x7f, 0xff] {
            let mut bytes = sample().encode().to_vec();
            bytes[159] = low_byte;
            assert!(
                matches!(
                    LiquidationRequest::decode(&bytes),
                    Err(LiquidatorError::MalformedParams(_))
                ),
                "bool word 0x{low_byte:02x} accepted"
            );
        }

        let mut high_byte = sample().encode().to_vec();
        high_byte[128] = 1;
        assert!(LiquidationRequest::decode(&high_byte).is_err());

        let mut set = sample();
        set.receive_collateral_as_reserve_token = true;
        let bytes = set.encode();
        assert_eq!(bytes[159], 1);
        assert!(LiquidationRequest::decode(&bytes).unwrap().receive_collateral_as_reserve_token);
    }

    #[test]
    fn test_batch_requires_parallel_sequences() {
        let asset = Address::repeat_byte(0x0d);
        let one = U256::from(1u64);

        let batch = LoanBatch::from_parts(&[asset], &[U256::from(100u64)], &[one]).unwrap();
        assert_eq!(batch.loan().owed().unwrap(), U256::from(101u64));
        assert_eq!(batch.assets().collect::<Vec<_>>(), vec![asset]);

        assert!(matches!(
            LoanBatch::from_parts(&[], &[], &[]),
            Err(LiquidatorError::MalformedBatch(_))
        ));
        assert!(LoanBatch::from_parts(&[asset], &[one, one], &[one]).is_err());
        assert!(LoanBatch::from_parts(&[asset, asset], &[one, one], &[one, one]).is_err());
    }

    #[test]
    fn test_owed_overflow() {
        let loan = Loan {
            asset: Address::ZERO,
            amount: U256::MAX,
            premium: U256::from(1u64),
        };
        assert!(loan.owed().is_err());
    }
}

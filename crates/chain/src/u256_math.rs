//! Fixed-point U256 arithmetic shared by the pool, the router and the
//! liquidator.
//!
//! Values are WAD (1e18) scaled unless stated otherwise. Prices are WAD per
//! whole token unit.

use alloy::primitives::U256;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: U256 = U256::from_limbs([10000u64, 0, 0, 0]);

/// Power of 10 for token decimal scaling.
#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Apply basis points reduction.
/// Returns: value * (10000 - basis_points) / 10000
///
/// Example: apply_basis_points(1000, 100) = 990 (1% reduction)
#[inline(always)]
pub fn apply_basis_points(value: U256, basis_points: u16) -> U256 {
    let factor = U256::from(10000u16.saturating_sub(basis_points));
    (value * factor) / BPS_DENOMINATOR
}

/// Apply basis points increase (e.g. liquidation bonus, slippage headroom).
/// Returns: value * (10000 + basis_points) / 10000
///
/// Example: apply_basis_points_up(1000, 2000) = 1200 (20% increase)
#[inline(always)]
pub fn apply_basis_points_up(value: U256, basis_points: u16) -> U256 {
    let factor = U256::from(10000u32 + basis_points as u32);
    (value * factor) / BPS_DENOMINATOR
}

/// Portion of `value` expressed in basis points: value * bps / 10000
#[inline(always)]
pub fn bps_of(value: U256, basis_points: u16) -> U256 {
    (value * U256::from(basis_points)) / BPS_DENOMINATOR
}

/// Value (WAD) of a raw token amount at a WAD price.
///
/// Formula: amount * price / 10^decimals
#[inline(always)]
pub fn value_wad(amount: U256, price: U256, decimals: u8) -> U256 {
    if amount.is_zero() || price.is_zero() {
        return U256::ZERO;
    }
    (amount * price) / pow10(decimals)
}

/// Raw token amount worth `value` (WAD) at a WAD price. Rounds down.
#[inline(always)]
pub fn amount_for_value(value: U256, price: U256, decimals: u8) -> U256 {
    if price.is_zero() {
        return U256::ZERO;
    }
    (value * pow10(decimals)) / price
}

/// Calculate health factor in WAD (18 decimals).
/// HF = (total_collateral_adjusted * 10^18) / total_debt
///
/// Returns U256::MAX if debt is zero.
#[inline(always)]
pub fn calculate_hf_wad(collateral_adjusted_wad: U256, debt_wad: U256) -> U256 {
    if debt_wad.is_zero() {
        return U256::MAX;
    }
    (collateral_adjusted_wad * WAD) / debt_wad
}

/// Check if health factor indicates liquidatable position (HF < 1.0).
#[inline(always)]
pub fn is_liquidatable_wad(hf_wad: U256) -> bool {
    hf_wad < WAD
}

/// Safe minimum of two U256 values
#[inline(always)]
pub fn min(a: U256, b: U256) -> U256 {
    if a < b {
        a
    } else {
        b
    }
}

//! In-memory lending pool.
//!
//! Aave-style liquidation and flash loan semantics over the host ledger.
//! Positions are pool storage words, so every change to them unwinds with
//! the enclosing transaction.

use alloy::primitives::{keccak256, Address, B256, U256};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use super::{
    AccountHealth, FlashLoanReceiver, FlashLoanRequest, LendingProtocol, LiquidationCallParams,
    LoanCallback,
};
use crate::error::{HostError, HostResult};
use crate::events::LogRecord;
use crate::journal::Tx;
use crate::state::WorldState;
use crate::u256_math::{
    amount_for_value, apply_basis_points_up, bps_of, calculate_hf_wad, value_wad,
};

/// Default close factor: half the debt per liquidation.
pub const DEFAULT_CLOSE_FACTOR_BPS: u16 = 5_000;

/// Default flash loan premium (0.09%).
pub const DEFAULT_FLASH_PREMIUM_BPS: u16 = 9;

/// Risk parameters of one reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveConfig {
    /// Oracle price (WAD per whole token)
    pub price: U256,
    /// Token decimals
    pub decimals: u8,
    /// Liquidation threshold in basis points
    pub liquidation_threshold_bps: u16,
    /// Liquidation bonus in basis points
    pub liquidation_bonus_bps: u16,
}

#[derive(Debug, Clone, Copy)]
enum PositionKind {
    Collateral = 0,
    Debt = 1,
}

fn position_slot(user: Address, asset: Address, kind: PositionKind) -> B256 {
    let mut preimage = [0u8; 41];
    preimage[..20].copy_from_slice(user.as_slice());
    preimage[20..40].copy_from_slice(asset.as_slice());
    preimage[40] = kind as u8;
    keccak256(preimage)
}

/// Builder for an [`InMemoryLendingPool`].
#[derive(Debug)]
pub struct LendingPoolBuilder {
    address: Address,
    reserves: BTreeMap<Address, ReserveConfig>,
    close_factor_bps: u16,
    flash_premium_bps: u16,
}

impl LendingPoolBuilder {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            reserves: BTreeMap::new(),
            close_factor_bps: DEFAULT_CLOSE_FACTOR_BPS,
            flash_premium_bps: DEFAULT_FLASH_PREMIUM_BPS,
        }
    }

    /// List a reserve.
    pub fn reserve(mut self, asset: Address, config: ReserveConfig) -> Self {
        self.reserves.insert(asset, config);
        self
    }

    pub fn close_factor_bps(mut self, bps: u16) -> Self {
        self.close_factor_bps = bps;
        self
    }

    pub fn flash_premium_bps(mut self, bps: u16) -> Self {
        self.flash_premium_bps = bps;
        self
    }

    pub fn build(self) -> InMemoryLendingPool {
        InMemoryLendingPool {
            address: self.address,
            reserves: self.reserves,
            close_factor_bps: self.close_factor_bps,
            flash_premium_bps: self.flash_premium_bps,
        }
    }
}

/// Lending pool holding reserves and user positions in host state.
#[derive(Debug, Clone)]
pub struct InMemoryLendingPool {
    address: Address,
    reserves: BTreeMap<Address, ReserveConfig>,
    close_factor_bps: u16,
    flash_premium_bps: u16,
}

impl InMemoryLendingPool {
    pub fn builder(address: Address) -> LendingPoolBuilder {
        LendingPoolBuilder::new(address)
    }

    pub fn reserve(&self, asset: Address) -> HostResult<&ReserveConfig> {
        self.reserves
            .get(&asset)
            .ok_or(HostError::UnknownReserve(asset))
    }

    pub fn flash_premium_bps(&self) -> u16 {
        self.flash_premium_bps
    }

    /// Genesis: open a position for `user`.
    ///
    /// The collateral is minted to the pool, which custodies it.
    pub fn seed_position(
        &self,
        state: &mut WorldState,
        user: Address,
        asset: Address,
        collateral: U256,
        debt: U256,
    ) {
        state.set_storage(
            self.address,
            position_slot(user, asset, PositionKind::Collateral),
            collateral,
        );
        state.set_storage(
            self.address,
            position_slot(user, asset, PositionKind::Debt),
            debt,
        );
        state.mint(asset, self.address, collateral);
    }

    /// Genesis: lendable liquidity.
    pub fn seed_liquidity(&self, state: &mut WorldState, asset: Address, amount: U256) {
        state.mint(asset, self.address, amount);
    }

    pub fn collateral_of(&self, state: &WorldState, user: Address, asset: Address) -> U256 {
        state.storage(
            self.address,
            position_slot(user, asset, PositionKind::Collateral),
        )
    }

    pub fn debt_of(&self, state: &WorldState, user: Address, asset: Address) -> U256 {
        state.storage(self.address, position_slot(user, asset, PositionKind::Debt))
    }

    fn load(
        &self,
        tx: &mut Tx<'_>,
        user: Address,
        asset: Address,
        kind: PositionKind,
    ) -> HostResult<U256> {
        tx.sload(self.address, position_slot(user, asset, kind))
    }

    fn store(
        &self,
        tx: &mut Tx<'_>,
        user: Address,
        asset: Address,
        kind: PositionKind,
        value: U256,
    ) -> HostResult<()> {
        tx.sstore(self.address, position_slot(user, asset, kind), value)
    }
}

impl LendingProtocol for InMemoryLendingPool {
    fn address(&self) -> Address {
        self.address
    }

    fn account_health(&self, tx: &mut Tx<'_>, user: Address) -> HostResult<AccountHealth> {
        let mut total_collateral = U256::ZERO;
        let mut adjusted_collateral = U256::ZERO;
        let mut total_debt = U256::ZERO;

        for (asset, reserve) in &self.reserves {
            let collateral = self.load(tx, user, *asset, PositionKind::Collateral)?;
            let debt = self.load(tx, user, *asset, PositionKind::Debt)?;

            let collateral_value = value_wad(collateral, reserve.price, reserve.decimals);
            total_collateral += collateral_value;
            adjusted_collateral += bps_of(collateral_value, reserve.liquidation_threshold_bps);
            total_debt += value_wad(debt, reserve.price, reserve.decimals);
        }

        Ok(AccountHealth {
            total_collateral,
            total_debt,
            health_factor: calculate_hf_wad(adjusted_collateral, total_debt),
        })
    }

    #[instrument(skip(self, tx, params), fields(user = %params.user, debt_to_cover = %params.debt_to_cover))]
    fn liquidation_call(
        &self,
        tx: &mut Tx<'_>,
        caller: Address,
        params: &LiquidationCallParams,
    ) -> HostResult<U256> {
        tx.charge_call()?;

        let collateral_reserve = *self.reserve(params.collateral_asset)?;
        let debt_reserve = *self.reserve(params.debt_asset)?;
        if params.debt_to_cover.is_zero() {
            return Err(HostError::InvalidAmount("debt to cover is zero"));
        }

        let health = self.account_health(tx, params.user)?;
        if !health.is_liquidatable() {
            return Err(HostError::HealthFactorNotBelowThreshold {
                user: params.user,
                health_factor: health.health_factor,
            });
        }

        let user_debt = self.load(tx, params.user, params.debt_asset, PositionKind::Debt)?;
        if user_debt.is_zero() {
            return Err(HostError::NoDebt {
                user: params.user,
                asset: params.debt_asset,
            });
        }
        let user_collateral = self.load(
            tx,
            params.user,
            params.collateral_asset,
            PositionKind::Collateral,
        )?;
        if user_collateral.is_zero() {
            return Err(HostError::NoCollateral {
                user: params.user,
                asset: params.collateral_asset,
            });
        }

        let max_cover = bps_of(user_debt, self.close_factor_bps);
        if params.debt_to_cover > max_cover {
            return Err(HostError::CloseFactorExceeded {
                requested: params.debt_to_cover,
                max: max_cover,
            });
        }

        // Debt value plus bonus, expressed in collateral units
        let debt_value = value_wad(params.debt_to_cover, debt_reserve.price, debt_reserve.decimals);
        let seize_value = apply_basis_points_up(debt_value, collateral_reserve.liquidation_bonus_bps);
        let mut seized = amount_for_value(
            seize_value,
            collateral_reserve.price,
            collateral_reserve.decimals,
        );
        let mut repaid = params.debt_to_cover;
        if seized > user_collateral {
            repaid = params.debt_to_cover * user_collateral / seized;
            seized = user_collateral;
        }

        tx.transfer_from(params.debt_asset, self.address, caller, self.address, repaid)?;

        self.store(
            tx,
            params.user,
            params.debt_asset,
            PositionKind::Debt,
            user_debt - repaid,
        )?;
        self.store(
            tx,
            params.user,
            params.collateral_asset,
            PositionKind::Collateral,
            user_collateral - seized,
        )?;

        if params.receive_reserve_token {
            let held = self.load(tx, caller, params.collateral_asset, PositionKind::Collateral)?;
            self.store(
                tx,
                caller,
                params.collateral_asset,
                PositionKind::Collateral,
                held + seized,
            )?;
        } else {
            tx.transfer(params.collateral_asset, self.address, caller, seized)?;
        }

        tx.emit(LogRecord::LiquidationCall {
            pool: self.address,
            collateral_asset: params.collateral_asset,
            debt_asset: params.debt_asset,
            user: params.user,
            debt_to_cover: repaid,
            liquidated_collateral_amount: seized,
            liquidator: caller,
            receive_a_token: params.receive_reserve_token,
        })?;

        debug!(
            repaid = %repaid,
            seized = %seized,
            liquidator = %caller,
            "Liquidation executed"
        );

        Ok(seized)
    }

    #[instrument(skip_all, fields(receiver = %receiver.address(), initiator = %caller))]
    fn flash_loan(
        &self,
        tx: &mut Tx<'_>,
        caller: Address,
        receiver: &dyn FlashLoanReceiver,
        request: &FlashLoanRequest<'_>,
    ) -> HostResult<()> {
        tx.charge_call()?;

        let len = request.assets.len();
        if len == 0 || request.amounts.len() != len || request.modes.len() != len {
            return Err(HostError::InconsistentFlashLoanParams(format!(
                "{} assets, {} amounts, {} modes",
                len,
                request.amounts.len(),
                request.modes.len()
            )));
        }
        if let Some(mode) = request.modes.iter().find(|mode| **mode != 0) {
            return Err(HostError::UnsupportedLoanMode(*mode));
        }
        for asset in request.assets {
            self.reserve(*asset)?;
        }

        let target = receiver.address();
        let premiums: Vec<U256> = request
            .amounts
            .iter()
            .map(|amount| bps_of(*amount, self.flash_premium_bps))
            .collect();

        for (asset, amount) in request.assets.iter().zip(request.amounts) {
            tx.transfer(*asset, self.address, target, *amount)?;
        }

        let callback = LoanCallback {
            initiator: caller,
            assets: request.assets,
            amounts: request.amounts,
            premiums: &premiums,
            params: request.params,
        };
        tx.charge_call()?;
        if !receiver.execute_operation(tx, self.address, &callback)? {
            return Err(HostError::InvalidFlashLoanReturn(target));
        }

        for ((asset, amount), premium) in request.assets.iter().zip(request.amounts).zip(&premiums) {
            let owed = amount
                .checked_add(*premium)
                .ok_or(HostError::Overflow("flash loan repayment"))?;
            tx.transfer_from(*asset, self.address, target, self.address, owed)?;

            tx.emit(LogRecord::FlashLoan {
                pool: self.address,
                target,
                initiator: caller,
                asset: *asset,
                amount: *amount,
                premium: *premium,
                referral_code: request.referral_code,
            })?;
        }

        debug!(assets = len, "Flash loan settled");
        Ok(())
    }
}

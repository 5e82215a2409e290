//! Seeded worlds for liquidator tests.
//!
//! Three reserves (DAI, WETH, WBTC), a pool holding an under-water
//! borrower, router pairs, and a deployed liquidator.

use alloy::primitives::{Address, Bytes, U256};
use std::sync::Arc;

use crate::config::{LiquidatorConfig, LoanAccess};
use crate::error::LiquidatorError;
use crate::invariants::{InvariantGuard, InvariantReport};
use crate::liquidator::{FlashLiquidator, RunReport};
use crate::request::LiquidationRequest;
use flash_liquidator_chain::u256_math::WAD;
use flash_liquidator_chain::{
    ConstantProductRouter, ExactOutputOrder, Host, HostConfig, HostError, HostResult,
    InMemoryLendingPool, Receipt, ReserveConfig, SwapRouter, TransferHook, Tx, WorldState,
};

pub const DAI: Address = Address::repeat_byte(0x0d);
pub const WETH: Address = Address::repeat_byte(0xee);
pub const WBTC: Address = Address::repeat_byte(0xbb);
pub const POOL: Address = Address::repeat_byte(0xa0);
pub const ROUTER: Address = Address::repeat_byte(0xb0);
pub const LIQUIDATOR: Address = Address::repeat_byte(0x11);
pub const OPERATOR: Address = Address::repeat_byte(0x01);
pub const BORROWER: Address = Address::repeat_byte(0x42);
pub const ATTACKER: Address = Address::repeat_byte(0x66);

pub const TIMESTAMP: u64 = 1_700_000_000;
pub const SLIPPAGE_BPS: u16 = 50;

pub fn wad(n: u64) -> U256 {
    U256::from(n) * WAD
}

pub fn sats(n: u64) -> U256 {
    U256::from(n)
}

fn reference_pool(premium_bps: u16) -> InMemoryLendingPool {
    InMemoryLendingPool::builder(POOL)
        .reserve(
            DAI,
            ReserveConfig {
                price: wad(1),
                decimals: 18,
                liquidation_threshold_bps: 8_000,
                liquidation_bonus_bps: 500,
            },
        )
        .reserve(
            WETH,
            ReserveConfig {
                price: wad(2_000),
                decimals: 18,
                liquidation_threshold_bps: 8_000,
                liquidation_bonus_bps: 500,
            },
        )
        .reserve(
            WBTC,
            ReserveConfig {
                price: wad(30_000),
                decimals: 8,
                liquidation_threshold_bps: 7_500,
                liquidation_bonus_bps: 1_000,
            },
        )
        .flash_premium_bps(premium_bps)
        .build()
}

/// Transfer hook that starts a second run when the liquidator receives the
/// hooked asset.
struct ReentrantHook {
    liquidator: Arc<FlashLiquidator>,
    request: LiquidationRequest,
    loan_amount: U256,
}

impl TransferHook for ReentrantHook {
    fn on_transfer(
        &self,
        tx: &mut Tx<'_>,
        _asset: Address,
        _from: Address,
        to: Address,
        _amount: U256,
    ) -> HostResult<()> {
        if to != self.liquidator.address() {
            return Ok(());
        }
        self.liquidator
            .request_loan(
                tx,
                ATTACKER,
                &[self.request.debt_asset],
                &[self.loan_amount],
                &[0],
                &self.request.encode(),
            )
            .map(|_| ())
            .map_err(HostError::callback)
    }
}

/// Router whose quotes understate the input its swaps actually pull.
#[derive(Debug)]
struct QuoteSkewRouter {
    inner: ConstantProductRouter,
    understate_bps: u16,
}

impl SwapRouter for QuoteSkewRouter {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn get_amounts_in(
        &self,
        tx: &mut Tx<'_>,
        amount_out: U256,
        path: &[Address],
    ) -> HostResult<Vec<U256>> {
        let mut amounts = self.inner.get_amounts_in(tx, amount_out, path)?;
        amounts[0] = amounts[0] * U256::from(10_000 - self.understate_bps) / U256::from(10_000u64);
        Ok(amounts)
    }

    fn swap_tokens_for_exact_tokens(
        &self,
        tx: &mut Tx<'_>,
        caller: Address,
        order: &ExactOutputOrder<'_>,
    ) -> HostResult<Vec<U256>> {
        self.inner.swap_tokens_for_exact_tokens(tx, caller, order)
    }
}

pub struct WorldBuilder {
    state: WorldState,
    premium_bps: u16,
    host_config: HostConfig,
    loan_access: LoanAccess,
    reentrant: Option<(Address, LiquidationRequest, U256)>,
    quote_skew_bps: Option<u16>,
}

impl WorldBuilder {
    pub fn new() -> Self {
        let mut state = WorldState::new();
        reference_pool(0).seed_liquidity(&mut state, DAI, wad(10_000));
        Self {
            state,
            premium_bps: 9,
            host_config: HostConfig::default().with_timestamp(TIMESTAMP),
            loan_access: LoanAccess::Open,
            reentrant: None,
            quote_skew_bps: None,
        }
    }

    /// Extra flash-loanable balance held by the pool.
    pub fn liquidity(mut self, asset: Address, amount: U256) -> Self {
        reference_pool(self.premium_bps).seed_liquidity(&mut self.state, asset, amount);
        self
    }

    /// Mint `amount` of `asset` straight to `holder`.
    pub fn fund(mut self, asset: Address, holder: Address, amount: U256) -> Self {
        self.state.mint(asset, holder, amount);
        self
    }

    /// Quote `bps` less input than the router's swaps pull.
    pub fn skewed_quotes(mut self, bps: u16) -> Self {
        self.quote_skew_bps = Some(bps);
        self
    }

    pub fn position(mut self, user: Address, asset: Address, collateral: U256, debt: U256) -> Self {
        reference_pool(self.premium_bps).seed_position(&mut self.state, user, asset, collateral, debt);
        self
    }

    pub fn pair(mut self, a: Address, reserve_a: U256, b: Address, reserve_b: U256) -> Self {
        ConstantProductRouter::new(ROUTER).seed_pair(&mut self.state, a, reserve_a, b, reserve_b);
        self
    }

    pub fn premium_bps(mut self, bps: u16) -> Self {
        self.premium_bps = bps;
        self
    }

    pub fn resource_limit(mut self, limit: u64) -> Self {
        self.host_config = self.host_config.with_resource_limit(limit);
        self
    }

    pub fn loan_access(mut self, access: LoanAccess) -> Self {
        self.loan_access = access;
        self
    }

    /// Re-enter `request_loan` whenever the liquidator receives `asset`.
    pub fn reentrant_on(mut self, asset: Address, request: LiquidationRequest, loan: U256) -> Self {
        self.reentrant = Some((asset, request, loan));
        self
    }

    pub fn build(self) -> World {
        let pool = Arc::new(reference_pool(self.premium_bps));
        let router = Arc::new(ConstantProductRouter::new(ROUTER));
        let swap_router: Arc<dyn SwapRouter> = match self.quote_skew_bps {
            Some(understate_bps) => Arc::new(QuoteSkewRouter {
                inner: ConstantProductRouter::new(ROUTER),
                understate_bps,
            }),
            None => router.clone(),
        };
        let config = LiquidatorConfig::new(POOL, ROUTER, WETH, SLIPPAGE_BPS)
            .with_loan_access(self.loan_access);
        let liquidator = Arc::new(
            FlashLiquidator::new(LIQUIDATOR, config, pool.clone(), swap_router)
                .expect("valid liquidator config"),
        );

        let mut host = Host::new(self.state, self.host_config);
        if let Some((asset, request, loan_amount)) = self.reentrant {
            host = host.with_hook(
                asset,
                Arc::new(ReentrantHook {
                    liquidator: liquidator.clone(),
                    request,
                    loan_amount,
                }),
            );
        }

        World {
            host,
            pool,
            router,
            liquidator,
        }
    }
}

pub struct World {
    pub host: Host,
    pub pool: Arc<InMemoryLendingPool>,
    pub router: Arc<ConstantProductRouter>,
    pub liquidator: Arc<FlashLiquidator>,
}

impl World {
    /// One full run: borrow `loan` of the debt asset and liquidate.
    pub fn run(
        &self,
        caller: Address,
        request: &LiquidationRequest,
        loan: U256,
    ) -> Result<Receipt<RunReport>, LiquidatorError> {
        self.run_raw(caller, &[request.debt_asset], &[loan], &request.encode())
    }

    pub fn run_raw(
        &self,
        caller: Address,
        assets: &[Address],
        amounts: &[U256],
        request_bytes: &Bytes,
    ) -> Result<Receipt<RunReport>, LiquidatorError> {
        let modes = vec![0u8; assets.len()];
        self.host.transact(caller, |tx| {
            self.liquidator
                .request_loan(tx, caller, assets, amounts, &modes, request_bytes)
        })
    }

    pub fn guard(&self) -> InvariantGuard {
        InvariantGuard::new(LIQUIDATOR, POOL, ROUTER)
    }

    pub fn check(&self, receipt: &Receipt<RunReport>, request: &LiquidationRequest) -> InvariantReport {
        let guard = self.guard();
        self.host
            .read(|state| guard.check(state, &receipt.logs, request))
    }

    pub fn balance(&self, asset: Address, holder: Address) -> U256 {
        self.host.read(|state| state.balance_of(asset, holder))
    }
}

/// Scenario A: DAI collateral and DAI debt.
///
/// 1000 DAI collateral against 810 DAI debt (HF 0.988); covers 405 DAI.
pub fn same_asset() -> (WorldBuilder, LiquidationRequest) {
    let builder = WorldBuilder::new()
        .position(BORROWER, DAI, wad(1_000), wad(810));
    let request = LiquidationRequest {
        collateral_asset: DAI,
        debt_asset: DAI,
        target_user: BORROWER,
        debt_to_cover: wad(405),
        receive_collateral_as_reserve_token: false,
    };
    (builder, request)
}

/// Scenario B: WETH collateral, DAI debt, direct WETH/DAI pair.
///
/// 1 WETH ($2000) against 1700 DAI (HF 0.94); covers 800 DAI.
pub fn cross_asset() -> (WorldBuilder, LiquidationRequest) {
    cross_asset_with_pair(wad(1_000), wad(2_000_000))
}

/// Scenario B with custom WETH/DAI pair reserves.
pub fn cross_asset_with_pair(weth: U256, dai: U256) -> (WorldBuilder, LiquidationRequest) {
    let builder = WorldBuilder::new()
        .position(BORROWER, WETH, wad(1), U256::ZERO)
        .position(BORROWER, DAI, U256::ZERO, wad(1_700))
        .pair(WETH, weth, DAI, dai);
    let request = LiquidationRequest {
        collateral_asset: WETH,
        debt_asset: DAI,
        target_user: BORROWER,
        debt_to_cover: wad(800),
        receive_collateral_as_reserve_token: false,
    };
    (builder, request)
}

/// WBTC collateral, DAI debt, no WBTC/DAI pair: swaps through WETH.
///
/// 0.1 WBTC ($3000) against 2400 DAI (HF 0.94); covers 1000 DAI.
pub fn via_reference() -> (WorldBuilder, LiquidationRequest) {
    let builder = WorldBuilder::new()
        .position(BORROWER, WBTC, sats(10_000_000), U256::ZERO)
        .position(BORROWER, DAI, U256::ZERO, wad(2_400))
        .pair(WBTC, sats(10_000_000_000), WETH, wad(1_500))
        .pair(WETH, wad(1_000), DAI, wad(2_000_000));
    let request = LiquidationRequest {
        collateral_asset: WBTC,
        debt_asset: DAI,
        target_user: BORROWER,
        debt_to_cover: wad(1_000),
        receive_collateral_as_reserve_token: false,
    };
    (builder, request)
}

//! Flash Liquidator scenario runner
//!
//! Loads a TOML scenario (reserves, positions, AMM pairs, liquidator
//! deployment and request), seeds an in-memory host and executes one
//! flash-loan liquidation run against it.
//!
//! Usage: `flash-liquidator [scenario.toml]` or `SCENARIO_PATH=...`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flash_liquidator_chain::{
    ConstantProductRouter, Host, HostConfig, InMemoryLendingPool, LendingPoolBuilder,
    ReserveConfig, WorldState, DEFAULT_RESOURCE_LIMIT,
};
use flash_liquidator_core::{FlashLiquidator, InvariantGuard, LiquidationRequest, LiquidatorConfig};

/// Environment variable names.
mod env {
    pub const SCENARIO_PATH: &str = "SCENARIO_PATH";
    pub const LIQUIDATOR_CONFIG: &str = "LIQUIDATOR_CONFIG";
}

const DEFAULT_SCENARIO: &str = "scenarios/cross_asset.toml";

fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,flash_liquidator_core=debug,flash_liquidator_chain=debug")
        }))
        .init();

    let path = scenario_path();
    let scenario = Scenario::from_file(&path)?;
    info!(path = %path.display(), "Scenario loaded");

    // A standalone liquidator config overrides the scenario's
    let config = match std::env::var(env::LIQUIDATOR_CONFIG) {
        Ok(config_path) => LiquidatorConfig::from_file(&config_path)?,
        Err(_) => scenario.liquidator.config.clone(),
    };
    config.log_config();

    let deployment = scenario.deploy(config)?;
    let outcome = deployment.run(&scenario)?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn scenario_path() -> PathBuf {
    std::env::var(env::SCENARIO_PATH)
        .ok()
        .or_else(|| std::env::args().nth(1))
        .unwrap_or_else(|| DEFAULT_SCENARIO.to_string())
        .into()
}

#[derive(Debug, Deserialize)]
struct Scenario {
    /// Caller of `request_loan`; receives the swept profit
    caller: Address,
    /// Flash loan amount of the debt asset
    loan_amount: U256,
    /// Block timestamp; defaults to now
    timestamp: Option<u64>,
    resource_limit: Option<u64>,
    liquidator: LiquidatorSection,
    pool: PoolSection,
    #[serde(default)]
    positions: Vec<PositionSection>,
    #[serde(default)]
    pairs: Vec<PairSection>,
    request: RequestSection,
}

#[derive(Debug, Deserialize)]
struct LiquidatorSection {
    address: Address,
    #[serde(flatten)]
    config: LiquidatorConfig,
}

#[derive(Debug, Deserialize)]
struct PoolSection {
    flash_premium_bps: Option<u16>,
    close_factor_bps: Option<u16>,
    reserves: Vec<ReserveSection>,
}

#[derive(Debug, Deserialize)]
struct ReserveSection {
    asset: Address,
    /// USD price, 18 decimals
    price: U256,
    decimals: u8,
    liquidation_threshold_bps: u16,
    liquidation_bonus_bps: u16,
    /// Flash-loanable balance held by the pool
    #[serde(default)]
    liquidity: U256,
}

#[derive(Debug, Deserialize)]
struct PositionSection {
    user: Address,
    asset: Address,
    #[serde(default)]
    collateral: U256,
    #[serde(default)]
    debt: U256,
}

#[derive(Debug, Deserialize)]
struct PairSection {
    token_a: Address,
    reserve_a: U256,
    token_b: Address,
    reserve_b: U256,
}

#[derive(Debug, Deserialize)]
struct RequestSection {
    collateral_asset: Address,
    debt_asset: Address,
    target_user: Address,
    debt_to_cover: U256,
    #[serde(default)]
    receive_collateral_as_reserve_token: bool,
}

impl From<&RequestSection> for LiquidationRequest {
    fn from(section: &RequestSection) -> Self {
        Self {
            collateral_asset: section.collateral_asset,
            debt_asset: section.debt_asset,
            target_user: section.target_user,
            debt_to_cover: section.debt_to_cover,
            receive_collateral_as_reserve_token: section.receive_collateral_as_reserve_token,
        }
    }
}

impl Scenario {
    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing scenario {}", path.display()))
    }

    fn lending_pool(&self, address: Address) -> InMemoryLendingPool {
        let mut builder = LendingPoolBuilder::new(address);
        for reserve in &self.pool.reserves {
            builder = builder.reserve(
                reserve.asset,
                ReserveConfig {
                    price: reserve.price,
                    decimals: reserve.decimals,
                    liquidation_threshold_bps: reserve.liquidation_threshold_bps,
                    liquidation_bonus_bps: reserve.liquidation_bonus_bps,
                },
            );
        }
        if let Some(bps) = self.pool.close_factor_bps {
            builder = builder.close_factor_bps(bps);
        }
        if let Some(bps) = self.pool.flash_premium_bps {
            builder = builder.flash_premium_bps(bps);
        }
        builder.build()
    }

    fn deploy(&self, config: LiquidatorConfig) -> Result<Deployment> {
        let pool = Arc::new(self.lending_pool(config.lending_pool));
        let router = Arc::new(ConstantProductRouter::new(config.amm_router));

        let mut state = WorldState::new();
        for reserve in &self.pool.reserves {
            if !reserve.liquidity.is_zero() {
                pool.seed_liquidity(&mut state, reserve.asset, reserve.liquidity);
            }
        }
        for position in &self.positions {
            pool.seed_position(
                &mut state,
                position.user,
                position.asset,
                position.collateral,
                position.debt,
            );
        }
        for pair in &self.pairs {
            router.seed_pair(
                &mut state,
                pair.token_a,
                pair.reserve_a,
                pair.token_b,
                pair.reserve_b,
            );
        }
        info!(
            reserves = self.pool.reserves.len(),
            positions = self.positions.len(),
            pairs = self.pairs.len(),
            "World seeded"
        );

        let timestamp = match self.timestamp {
            Some(timestamp) => timestamp,
            None => u64::try_from(chrono::Utc::now().timestamp())
                .context("system clock before the unix epoch")?,
        };
        let host_config = HostConfig::default()
            .with_timestamp(timestamp)
            .with_resource_limit(self.resource_limit.unwrap_or(DEFAULT_RESOURCE_LIMIT));

        let guard = InvariantGuard::new(self.liquidator.address, config.lending_pool, config.amm_router);
        let liquidator = FlashLiquidator::new(self.liquidator.address, config, pool, router)
            .context("deploying liquidator")?;

        Ok(Deployment {
            host: Host::new(state, host_config),
            liquidator,
            guard,
        })
    }
}

struct Deployment {
    host: Host,
    liquidator: FlashLiquidator,
    guard: InvariantGuard,
}

impl Deployment {
    fn run(&self, scenario: &Scenario) -> Result<serde_json::Value> {
        let request = LiquidationRequest::from(&scenario.request);
        let request_bytes = request.encode();
        let caller = scenario.caller;

        info!(
            caller = %caller,
            liquidator = %self.liquidator.address(),
            loan_amount = %scenario.loan_amount,
            "Running liquidation"
        );

        let receipt = match self.host.transact(caller, |tx| {
            self.liquidator.request_loan(
                tx,
                caller,
                &[request.debt_asset],
                &[scenario.loan_amount],
                &[0],
                &request_bytes,
            )
        }) {
            Ok(receipt) => receipt,
            Err(err) => {
                error!(kind = err.kind(), error = %err, "Liquidation run reverted");
                bail!("liquidation run reverted: {err}");
            }
        };

        let invariants = self
            .host
            .read(|state| self.guard.check(state, &receipt.logs, &request));
        for violation in &invariants.violations {
            warn!(%violation, "Invariant violated");
        }

        let outcome = serde_json::json!({
            "report": receipt.value,
            "logs": receipt.logs,
            "resourcesUsed": receipt.resources_used,
            "invariants": invariants,
        });

        if !invariants.is_clean() {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            bail!("{} invariant violation(s)", invariants.violations.len());
        }
        info!(
            swaps = receipt.swap_count(),
            resources_used = receipt.resources_used,
            "Liquidation run committed"
        );
        Ok(outcome)
    }
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ╔═╗┬  ┌─┐┌─┐┬ ┬  ╦  ┬┌─┐ ┬ ┬┬┌┬┐┌─┐┌┬┐┌─┐┬─┐
    ╠╣ │  ├─┤└─┐├─┤  ║  ││─┼┐│ ││ ││├─┤ │ │ │├┬┘
    ╚  ┴─┘┴ ┴└─┘┴ ┴  ╩═╝┴└─┘└└─┘┴─┴┘┴ ┴ ┴ └─┘┴└─
    Flash Liquidator v0.1.0
    "#
    );
}

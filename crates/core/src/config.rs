//! Liquidator deployment configuration.
//!
//! Set once at construction and immutable afterwards. Loaded from TOML:
//!
//! ```toml
//! lending_pool = "0xa0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0"
//! amm_router = "0xb0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0"
//! reference_asset = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"
//! max_slippage_bps = 50
//! loan_access = { operator = "0x0101010101010101010101010101010101010101" }
//! ```

use alloy::primitives::Address;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{LiquidatorError, Result};

/// Upper bound for `max_slippage_bps` (100%).
pub const MAX_SLIPPAGE_BPS: u16 = 10_000;

/// Who may start a run through `request_loan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanAccess {
    /// Any caller
    #[default]
    Open,
    /// Only the given operator
    Operator(Address),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidatorConfig {
    /// Lending pool: flash lender, liquidation venue and the only
    /// accepted loan callback caller
    pub lending_pool: Address,

    /// AMM router used for collateral swaps
    pub amm_router: Address,

    /// Intermediate hop when no direct pair can fill a swap
    pub reference_asset: Address,

    /// Headroom over the router quote accepted on a swap (basis points).
    /// Required; there is no default.
    pub max_slippage_bps: u16,

    #[serde(default)]
    pub loan_access: LoanAccess,
}

impl LiquidatorConfig {
    pub fn new(
        lending_pool: Address,
        amm_router: Address,
        reference_asset: Address,
        max_slippage_bps: u16,
    ) -> Self {
        Self {
            lending_pool,
            amm_router,
            reference_asset,
            max_slippage_bps,
            loan_access: LoanAccess::Open,
        }
    }

    pub fn with_loan_access(mut self, access: LoanAccess) -> Self {
        self.loan_access = access;
        self
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading liquidator config {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content).context("parsing liquidator config")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lending_pool.is_zero() {
            return Err(LiquidatorError::Config("lending_pool is unset".into()));
        }
        if self.amm_router.is_zero() {
            return Err(LiquidatorError::Config("amm_router is unset".into()));
        }
        if self.reference_asset.is_zero() {
            return Err(LiquidatorError::Config("reference_asset is unset".into()));
        }
        if self.lending_pool == self.amm_router {
            return Err(LiquidatorError::Config(
                "lending_pool and amm_router must differ".into(),
            ));
        }
        if self.max_slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(LiquidatorError::Config(format!(
                "max_slippage_bps {} exceeds 10000",
                self.max_slippage_bps
            )));
        }
        if let LoanAccess::Operator(operator) = self.loan_access {
            if operator.is_zero() {
                return Err(LiquidatorError::Config("operator is unset".into()));
            }
        }
        Ok(())
    }

    /// Whether `caller` may start a run.
    pub fn permits_loan_request(&self, caller: Address) -> bool {
        match self.loan_access {
            LoanAccess::Open => true,
            LoanAccess::Operator(operator) => caller == operator,
        }
    }

    /// Log the effective configuration.
    pub fn log_config(&self) {
        tracing::info!(
            lending_pool = %self.lending_pool,
            amm_router = %self.amm_router,
            reference_asset = %self.reference_asset,
            "Liquidator collaborators"
        );
        tracing::info!(
            max_slippage_bps = self.max_slippage_bps,
            loan_access = ?self.loan_access,
            "Liquidator parameters"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        lending_pool = "0xa0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0"
        amm_router = "0xb0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0"
        reference_asset = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"
        max_slippage_bps = 50
    "#;

    #[test]
    fn test_parse_defaults_to_open_access() {
        let config = LiquidatorConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.lending_pool, Address::repeat_byte(0xa0));
        assert_eq!(config.max_slippage_bps, 50);
        assert_eq!(config.loan_access, LoanAccess::Open);
        assert!(config.validate().is_ok());
        assert!(config.permits_loan_request(Address::repeat_byte(0x99)));
    }

    #[test]
    fn test_parse_operator_access() {
        let content = format!(
            "{SAMPLE}\nloan_access = {{ operator = \"0x0101010101010101010101010101010101010101\" }}\n"
        );
        let config = LiquidatorConfig::from_toml_str(&content).unwrap();
        assert_eq!(
            config.loan_access,
            LoanAccess::Operator(Address::repeat_byte(0x01))
        );
        assert!(config.permits_loan_request(Address::repeat_byte(0x01)));
        assert!(!config.permits_loan_request(Address::repeat_byte(0x02)));
    }

    #[test]
    fn test_slippage_is_required() {
        let content = SAMPLE.replace("max_slippage_bps = 50", "");
        assert!(LiquidatorConfig::from_toml_str(&content).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = LiquidatorConfig::new(
            Address::repeat_byte(0xa0),
            Address::repeat_byte(0xb0),
            Address::repeat_byte(0xee),
            50,
        );
        assert!(base.validate().is_ok());

        let mut config = base.clone();
        config.max_slippage_bps = 10_001;
        assert!(matches!(config.validate(), Err(LiquidatorError::Config(_))));

        let mut config = base.clone();
        config.amm_router = config.lending_pool;
        assert!(config.validate().is_err());

        let config = base.with_loan_access(LoanAccess::Operator(Address::ZERO));
        assert!(config.validate().is_err());
    }
}

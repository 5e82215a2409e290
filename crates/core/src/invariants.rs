//! Post-run invariant checklist.
//!
//! Evaluated against committed state and a run's records. Reports every
//! violation instead of stopping at the first.

use alloy::primitives::{Address, U256};
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

use crate::request::LiquidationRequest;
use flash_liquidator_chain::{LogRecord, WorldState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum Violation {
    /// The liquidator still holds a loaned or collateral asset
    ResidualBalance { asset: Address, amount: U256 },
    /// An authorization from the liquidator was not fully consumed
    OutstandingAllowance {
        asset: Address,
        spender: Address,
        amount: U256,
    },
    /// Swap records do not match the collateral/debt relationship
    SwapCountMismatch { expected: usize, actual: usize },
    /// The pool was not authorized, or did not pull, principal plus premium
    RepaymentNotSettled { asset: Address, owed: U256 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResidualBalance { asset, amount } => {
                write!(f, "liquidator holds {amount} of {asset}")
            }
            Self::OutstandingAllowance {
                asset,
                spender,
                amount,
            } => write!(f, "{spender} may still pull {amount} of {asset}"),
            Self::SwapCountMismatch { expected, actual } => {
                write!(f, "expected {expected} swap(s), found {actual}")
            }
            Self::RepaymentNotSettled { asset, owed } => {
                write!(f, "repayment of {owed} {asset} not settled")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvariantReport {
    pub violations: Vec<Violation>,
}

impl InvariantReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Checklist bound to one deployment.
#[derive(Debug, Clone, Copy)]
pub struct InvariantGuard {
    liquidator: Address,
    lending_pool: Address,
    router: Address,
}

impl InvariantGuard {
    pub fn new(liquidator: Address, lending_pool: Address, router: Address) -> Self {
        Self {
            liquidator,
            lending_pool,
            router,
        }
    }

    /// Check a committed run. `logs` are the run's records, in order.
    pub fn check(
        &self,
        state: &WorldState,
        logs: &[LogRecord],
        request: &LiquidationRequest,
    ) -> InvariantReport {
        let mut violations = Vec::new();

        let loans: Vec<(Address, U256)> = logs
            .iter()
            .filter_map(|log| match log {
                LogRecord::FlashLoan {
                    pool,
                    target,
                    asset,
                    amount,
                    premium,
                    ..
                } if *pool == self.lending_pool && *target == self.liquidator => {
                    Some((*asset, amount.saturating_add(*premium)))
                }
                _ => None,
            })
            .collect();

        let mut assets: SmallVec<[Address; 4]> = SmallVec::new();
        for asset in loans
            .iter()
            .map(|(asset, _)| *asset)
            .chain([request.collateral_asset, request.debt_asset])
        {
            if !assets.contains(&asset) {
                assets.push(asset);
            }
        }

        for asset in &assets {
            let amount = state.balance_of(*asset, self.liquidator);
            if !amount.is_zero() {
                violations.push(Violation::ResidualBalance {
                    asset: *asset,
                    amount,
                });
            }
            for spender in [self.lending_pool, self.router] {
                let amount = state.allowance(*asset, self.liquidator, spender);
                if !amount.is_zero() {
                    violations.push(Violation::OutstandingAllowance {
                        asset: *asset,
                        spender,
                        amount,
                    });
                }
            }
        }

        for (asset, owed) in &loans {
            let authorized = logs.iter().any(|log| {
                matches!(log, LogRecord::Approval { asset: a, owner, spender, amount }
                    if a == asset && *owner == self.liquidator && *spender == self.lending_pool && amount >= owed)
            });
            let pulled = logs.iter().any(|log| {
                matches!(log, LogRecord::Transfer { asset: a, from, to, amount }
                    if a == asset && *from == self.liquidator && *to == self.lending_pool && amount >= owed)
            });
            if !(authorized && pulled) {
                violations.push(Violation::RepaymentNotSettled {
                    asset: *asset,
                    owed: *owed,
                });
            }
        }

        let expected = usize::from(!request.is_same_asset());
        let actual = logs
            .iter()
            .filter(|log| log.is_swap() && log.emitter() == self.liquidator)
            .count();
        if expected != actual {
            violations.push(Violation::SwapCountMismatch { expected, actual });
        }

        InvariantReport { violations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::*;

    fn flash_loan(amount: U256, premium: U256) -> LogRecord {
        LogRecord::FlashLoan {
            pool: POOL,
            target: LIQUIDATOR,
            initiator: LIQUIDATOR,
            asset: DAI,
            amount,
            premium,
            referral_code: 0,
        }
    }

    fn same_asset_request() -> LiquidationRequest {
        same_asset().1
    }

    #[test]
    fn test_clean_record_set() {
        let guard = InvariantGuard::new(LIQUIDATOR, POOL, ROUTER);
        let logs = vec![
            LogRecord::Approval {
                asset: DAI,
                owner: LIQUIDATOR,
                spender: POOL,
                amount: wad(101),
            },
            LogRecord::Transfer {
                asset: DAI,
                from: LIQUIDATOR,
                to: POOL,
                amount: wad(101),
            },
            flash_loan(wad(100), wad(1)),
        ];

        let report = guard.check(&WorldState::new(), &logs, &same_asset_request());
        assert!(report.is_clean(), "{:?}", report.violations);
    }

    #[test]
    fn test_reports_every_violation() {
        let guard = InvariantGuard::new(LIQUIDATOR, POOL, ROUTER);
        let mut state = WorldState::new();
        state.mint(DAI, LIQUIDATOR, wad(3));

        // Pulled, never approved; plus a stray swap on a same-asset run
        let logs = vec![
            LogRecord::Transfer {
                asset: DAI,
                from: LIQUIDATOR,
                to: POOL,
                amount: wad(101),
            },
            flash_loan(wad(100), wad(1)),
            LogRecord::Swapped {
                emitter: LIQUIDATOR,
                from_asset: WETH,
                to_asset: DAI,
                from_amount: wad(1),
                received_amount: wad(101),
            },
        ];

        let report = guard.check(&state, &logs, &same_asset_request());
        assert_eq!(
            report.violations,
            vec![
                Violation::ResidualBalance {
                    asset: DAI,
                    amount: wad(3),
                },
                Violation::RepaymentNotSettled {
                    asset: DAI,
                    owed: wad(101),
                },
                Violation::SwapCountMismatch {
                    expected: 0,
                    actual: 1,
                },
            ]
        );
        assert_eq!(
            report.violations[2].to_string(),
            "expected 0 swap(s), found 1"
        );
    }

    #[test]
    fn test_swaps_by_others_are_ignored() {
        let guard = InvariantGuard::new(LIQUIDATOR, POOL, ROUTER);
        let (_, request) = cross_asset();
        let logs = vec![LogRecord::Swapped {
            emitter: ATTACKER,
            from_asset: WETH,
            to_asset: DAI,
            from_amount: wad(1),
            received_amount: wad(2),
        }];

        let report = guard.check(&WorldState::new(), &logs, &request);
        assert_eq!(
            report.violations,
            vec![Violation::SwapCountMismatch {
                expected: 1,
                actual: 0,
            }]
        );
    }

    #[test]
    fn test_violation_serializes_with_kind_tag() {
        let violation = Violation::OutstandingAllowance {
            asset: WETH,
            spender: ROUTER,
            amount: U256::from(5u64),
        };
        let json = serde_json::to_value(&violation).unwrap();
        assert_eq!(json["kind"], "OutstandingAllowance");
        assert!(json.get("spender").is_some());
    }
}

//! Constant-product (x·y = k) router with a 0.3% fee.
//!
//! Pair reserves are plain ledger balances held at a deterministic pair
//! address, so swaps are ordinary transfers and unwind like any other.

use alloy::primitives::{keccak256, Address, U256};
use tracing::{debug, instrument};

use super::{ExactOutputOrder, SwapRouter};
use crate::error::{HostError, HostResult};
use crate::journal::Tx;
use crate::state::WorldState;

const FEE_NUMERATOR: u64 = 997;
const FEE_DENOMINATOR: u64 = 1000;

/// Input needed to take `amount_out` out of a pair.
///
/// Formula: reserve_in * amount_out * 1000 / ((reserve_out - amount_out) * 997) + 1
fn get_amount_in(
    amount_out: U256,
    reserve_in: U256,
    reserve_out: U256,
    token_in: Address,
    token_out: Address,
) -> HostResult<U256> {
    if amount_out.is_zero() {
        return Err(HostError::InvalidAmount("insufficient output amount"));
    }
    if reserve_in.is_zero() || reserve_out.is_zero() || amount_out >= reserve_out {
        return Err(HostError::InsufficientLiquidity {
            token_in,
            token_out,
        });
    }

    let numerator = reserve_in
        .checked_mul(amount_out)
        .and_then(|v| v.checked_mul(U256::from(FEE_DENOMINATOR)))
        .ok_or(HostError::Overflow("amount in"))?;
    let denominator = (reserve_out - amount_out) * U256::from(FEE_NUMERATOR);
    Ok(numerator / denominator + U256::from(1u64))
}

#[derive(Debug, Clone)]
pub struct ConstantProductRouter {
    address: Address,
}

impl ConstantProductRouter {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Address holding the reserves of the `a`/`b` pair (order-independent).
    pub fn pair_address(&self, a: Address, b: Address) -> Address {
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let mut preimage = [0u8; 60];
        preimage[..20].copy_from_slice(self.address.as_slice());
        preimage[20..40].copy_from_slice(low.as_slice());
        preimage[40..].copy_from_slice(high.as_slice());
        Address::from_slice(&keccak256(preimage)[12..])
    }

    /// Genesis: fund a pair with initial reserves.
    pub fn seed_pair(
        &self,
        state: &mut WorldState,
        token_a: Address,
        reserve_a: U256,
        token_b: Address,
        reserve_b: U256,
    ) {
        let pair = self.pair_address(token_a, token_b);
        state.mint(token_a, pair, reserve_a);
        state.mint(token_b, pair, reserve_b);
    }

    /// Current `(reserve_a, reserve_b)` of a pair in committed state.
    pub fn reserves(&self, state: &WorldState, token_a: Address, token_b: Address) -> (U256, U256) {
        let pair = self.pair_address(token_a, token_b);
        (state.balance_of(token_a, pair), state.balance_of(token_b, pair))
    }

    fn validate_path(path: &[Address]) -> HostResult<()> {
        if path.len() < 2 || path.windows(2).any(|hop| hop[0] == hop[1]) {
            return Err(HostError::InvalidPath);
        }
        Ok(())
    }
}

impl SwapRouter for ConstantProductRouter {
    fn address(&self) -> Address {
        self.address
    }

    fn get_amounts_in(
        &self,
        tx: &mut Tx<'_>,
        amount_out: U256,
        path: &[Address],
    ) -> HostResult<Vec<U256>> {
        Self::validate_path(path)?;

        let mut amounts = vec![U256::ZERO; path.len()];
        amounts[path.len() - 1] = amount_out;
        for i in (1..path.len()).rev() {
            let (token_in, token_out) = (path[i - 1], path[i]);
            let pair = self.pair_address(token_in, token_out);
            let reserve_in = tx.balance_of(token_in, pair)?;
            let reserve_out = tx.balance_of(token_out, pair)?;
            amounts[i - 1] = get_amount_in(amounts[i], reserve_in, reserve_out, token_in, token_out)?;
        }
        Ok(amounts)
    }

    #[instrument(skip_all, fields(caller = %caller, amount_out = %order.amount_out, hops = order.path.len()))]
    fn swap_tokens_for_exact_tokens(
        &self,
        tx: &mut Tx<'_>,
        caller: Address,
        order: &ExactOutputOrder<'_>,
    ) -> HostResult<Vec<U256>> {
        tx.charge_call()?;

        let now = tx.timestamp();
        if order.deadline < now {
            return Err(HostError::Expired {
                deadline: order.deadline,
                now,
            });
        }

        let amounts = self.get_amounts_in(tx, order.amount_out, order.path)?;
        if amounts[0] > order.amount_in_max {
            return Err(HostError::ExcessiveInputAmount {
                required: amounts[0],
                max: order.amount_in_max,
            });
        }

        let path = order.path;
        tx.transfer_from(
            path[0],
            self.address,
            caller,
            self.pair_address(path[0], path[1]),
            amounts[0],
        )?;

        for i in 0..path.len() - 1 {
            let from = self.pair_address(path[i], path[i + 1]);
            let to = if i + 2 < path.len() {
                self.pair_address(path[i + 1], path[i + 2])
            } else {
                order.recipient
            };
            tx.transfer(path[i + 1], from, to, amounts[i + 1])?;
        }

        debug!(amount_in = %amounts[0], "Exact-output swap executed");
        Ok(amounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{Host, HostConfig};
    use crate::u256_math::WAD;

    const ROUTER: Address = Address::repeat_byte(0xb0);
    const DAI: Address = Address::repeat_byte(0x0d);
    const WETH: Address = Address::repeat_byte(0xee);
    const WBTC: Address = Address::repeat_byte(0xbb);
    const TRADER: Address = Address::repeat_byte(0x11);

    fn wad(n: u64) -> U256 {
        U256::from(n) * WAD
    }

    #[test]
    fn test_get_amount_in_formula() {
        // 1000 in-reserve, 1000 out-reserve, take 100: 1000*100*1000/(900*997) + 1
        let amount = get_amount_in(
            U256::from(100u64),
            U256::from(1000u64),
            U256::from(1000u64),
            WETH,
            DAI,
        )
        .unwrap();
        assert_eq!(amount, U256::from(112u64));
    }

    #[test]
    fn test_get_amount_in_drained_pair() {
        let err = get_amount_in(
            U256::from(1000u64),
            U256::from(1000u64),
            U256::from(1000u64),
            WETH,
            DAI,
        )
        .unwrap_err();
        assert!(matches!(err, HostError::InsufficientLiquidity { .. }));
    }

    #[test]
    fn test_pair_address_is_order_independent() {
        let router = ConstantProductRouter::new(ROUTER);
        assert_eq!(router.pair_address(DAI, WETH), router.pair_address(WETH, DAI));
        assert_ne!(router.pair_address(DAI, WETH), router.pair_address(DAI, WBTC));
    }

    #[test]
    fn test_missing_pair_has_no_liquidity() {
        let router = ConstantProductRouter::new(ROUTER);
        let host = Host::new(WorldState::new(), HostConfig::default());

        let err = host
            .transact(TRADER, |tx| router.get_amounts_in(tx, wad(1), &[WBTC, DAI]))
            .unwrap_err();
        assert!(matches!(err, HostError::InsufficientLiquidity { .. }));
    }

    fn two_hop_host(router: &ConstantProductRouter) -> Host {
        let mut state = WorldState::new();
        router.seed_pair(&mut state, WBTC, U256::from(10_000_000_000u64), WETH, wad(1_500));
        router.seed_pair(&mut state, WETH, wad(1_000), DAI, wad(2_000_000));
        state.mint(WBTC, TRADER, U256::from(100_000_000u64));
        Host::new(state, HostConfig::default().with_timestamp(1_000))
    }

    #[test]
    fn test_exact_output_through_two_hops() {
        let router = ConstantProductRouter::new(ROUTER);
        let host = two_hop_host(&router);
        let path = [WBTC, WETH, DAI];

        let receipt = host
            .transact(TRADER, |tx| {
                tx.approve(WBTC, TRADER, ROUTER, U256::from(100_000_000u64))?;
                router.swap_tokens_for_exact_tokens(
                    tx,
                    TRADER,
                    &ExactOutputOrder {
                        amount_out: wad(1_000),
                        amount_in_max: U256::from(100_000_000u64),
                        path: &path,
                        recipient: TRADER,
                        deadline: 1_000,
                    },
                )
            })
            .unwrap();

        let amounts = receipt.value;
        assert_eq!(amounts.len(), 3);
        assert_eq!(amounts[2], wad(1_000));

        let state = host.snapshot();
        assert_eq!(state.balance_of(DAI, TRADER), wad(1_000));
        assert_eq!(
            state.balance_of(WBTC, TRADER),
            U256::from(100_000_000u64) - amounts[0]
        );
        // Intermediate hop passes straight through
        assert_eq!(router.reserves(&state, WETH, DAI).0, wad(1_000) + amounts[1]);
    }

    #[test]
    fn test_swap_respects_input_bound() {
        let router = ConstantProductRouter::new(ROUTER);
        let host = two_hop_host(&router);
        let path = [WETH, DAI];

        let err = host
            .transact(TRADER, |tx| {
                router.swap_tokens_for_exact_tokens(
                    tx,
                    TRADER,
                    &ExactOutputOrder {
                        amount_out: wad(1_000),
                        amount_in_max: U256::from(1u64),
                        path: &path,
                        recipient: TRADER,
                        deadline: 1_000,
                    },
                )
            })
            .unwrap_err();
        assert!(matches!(err, HostError::ExcessiveInputAmount { .. }));
    }

    #[test]
    fn test_swap_rejects_expired_deadline() {
        let router = ConstantProductRouter::new(ROUTER);
        let host = two_hop_host(&router);
        let path = [WETH, DAI];

        let err = host
            .transact(TRADER, |tx| {
                router.swap_tokens_for_exact_tokens(
                    tx,
                    TRADER,
                    &ExactOutputOrder {
                        amount_out: wad(1),
                        amount_in_max: U256::MAX,
                        path: &path,
                        recipient: TRADER,
                        deadline: 999,
                    },
                )
            })
            .unwrap_err();
        assert!(matches!(err, HostError::Expired { deadline: 999, now: 1_000 }));
    }

    #[test]
    fn test_invalid_path() {
        let router = ConstantProductRouter::new(ROUTER);
        let host = two_hop_host(&router);

        let err = host
            .transact(TRADER, |tx| router.get_amounts_in(tx, wad(1), &[DAI, DAI]))
            .unwrap_err();
        assert!(matches!(err, HostError::InvalidPath));
    }
}

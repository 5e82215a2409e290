//! Common contract interfaces shared across collaborators.
//!
//! The asset ledger follows ERC20 semantics; these bindings supply the
//! event signatures its records are keyed by.

use alloy::primitives::B256;
use alloy::sol;

// ERC20 interface for token interactions
sol! {
    /// Standard ERC20 events (the ledger's record shapes)
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);
    }
}

/// Event signature constants for common events.
pub mod common_signatures {
    use super::*;

    /// keccak256("Transfer(address,address,uint256)")
    pub const ERC20_TRANSFER: B256 = B256::new([
        0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b, 0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d,
        0xaa, 0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16, 0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23,
        0xb3, 0xef,
    ]);

    /// keccak256("Approval(address,address,uint256)")
    pub const ERC20_APPROVAL: B256 = B256::new([
        0x8c, 0x5b, 0xe1, 0xe5, 0xeb, 0xec, 0x7d, 0x5b, 0xd1, 0x4f, 0x71, 0x42, 0x7d, 0x1e, 0x84,
        0xf3, 0xdd, 0x03, 0x14, 0xc0, 0xf7, 0xb2, 0x29, 0x1e, 0x5b, 0x20, 0x0a, 0xc8, 0xc7, 0xc3,
        0xb9, 0x25,
    ]);
}

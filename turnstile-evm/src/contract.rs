//! Solidity definitions for on-chain interactions.

use alloy_sol_types::sol;

sol! {
    /// ERC-20 `Transfer` event, emitted by the settlement token on every transfer.
    #[allow(missing_docs)]
    #[derive(Debug)]
    event Transfer(address indexed from, address indexed to, uint256 value);
}

//! Settlement assets accepted by the gate.
//!
//! A gate settles in exactly one asset on exactly one chain. The known
//! deployments are USDC on Base and on Base Sepolia.

use alloy_primitives::{Address, U256, address};
use rust_decimal::Decimal;

/// USDC contract address on Base Mainnet.
pub const USDC_BASE: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// USDC contract address on Base Sepolia.
pub const USDC_BASE_SEPOLIA: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

/// Token decimals for USDC.
pub const USDC_DECIMALS: u8 = 6;

/// An ERC-20 token deployment payments are settled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementAsset {
    /// Currency symbol advertised in challenges (e.g. `"USDC"`).
    pub symbol: &'static str,
    /// Network name advertised in challenges (e.g. `"base"`).
    pub network: &'static str,
    /// EIP-155 chain ID.
    pub chain_id: u64,
    /// Token contract address.
    pub address: Address,
    /// Number of decimals of the token.
    pub decimals: u8,
}

impl SettlementAsset {
    /// USDC on Base Mainnet.
    pub const USDC_ON_BASE: Self = Self {
        symbol: "USDC",
        network: "base",
        chain_id: 8453,
        address: USDC_BASE,
        decimals: USDC_DECIMALS,
    };

    /// USDC on Base Sepolia.
    pub const USDC_ON_BASE_SEPOLIA: Self = Self {
        symbol: "USDC",
        network: "base-sepolia",
        chain_id: 84532,
        address: USDC_BASE_SEPOLIA,
        decimals: USDC_DECIMALS,
    };

    /// Returns all known settlement assets.
    #[must_use]
    pub const fn known() -> &'static [Self] {
        &[Self::USDC_ON_BASE, Self::USDC_ON_BASE_SEPOLIA]
    }

    /// Finds a known settlement asset by network name (case-insensitive).
    #[must_use]
    pub fn by_network(network: &str) -> Option<Self> {
        Self::known()
            .iter()
            .find(|asset| asset.network.eq_ignore_ascii_case(network))
            .copied()
    }

    /// Converts a raw token amount into a decimal amount using the token precision.
    ///
    /// Returns `None` when the raw amount does not fit a [`Decimal`] mantissa.
    #[must_use]
    pub fn to_decimal(&self, raw: U256) -> Option<Decimal> {
        let raw = i128::try_from(raw).ok()?;
        Decimal::try_from_i128_with_scale(raw, u32::from(self.decimals)).ok()
    }
}

impl Default for SettlementAsset {
    fn default() -> Self {
        Self::USDC_ON_BASE
    }
}

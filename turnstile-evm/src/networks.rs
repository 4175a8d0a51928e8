//! Public RPC endpoints of the known settlement networks.

use turnstile::asset::SettlementAsset;
use url::Url;

/// Public RPC endpoint of Base Mainnet.
pub const BASE_MAINNET_RPC: &str = "https://mainnet.base.org";

/// Public RPC endpoint of Base Sepolia.
pub const BASE_SEPOLIA_RPC: &str = "https://sepolia.base.org";

/// Returns the public RPC endpoint for the network of `asset`, if one is known.
#[must_use]
pub fn default_rpc_url(asset: &SettlementAsset) -> Option<Url> {
    let url = match asset.chain_id {
        8453 => BASE_MAINNET_RPC,
        84532 => BASE_SEPOLIA_RPC,
        _ => return None,
    };
    Url::parse(url).ok()
}

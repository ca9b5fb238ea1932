//! Wallet configuration from environment variables.
//!
//! Controls the Bitcoin network, the chain API endpoint and the fee tier used
//! for new transactions. Defaults to Testnet against mempool.space.

use std::env;
use std::time::Duration;

use crate::chain::FeePriority;

#[derive(Clone, Debug)]
pub struct WalletConfig {
    /// Bitcoin network type
    pub network: bitcoin::Network,
    /// Esplora/mempool.space REST API base URL
    pub chain_api_url: String,
    /// Fee tier selected when building transactions
    pub fee_priority: FeePriority,
    /// Per-request timeout for chain API calls
    pub chain_timeout: Duration,
}

impl WalletConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `BITCOIN_NETWORK`: "testnet" (default), "mainnet", "signet" or "regtest"
    /// - `CHAIN_API_URL`: Esplora REST endpoint (optional, has per-network defaults)
    /// - `FEE_PRIORITY`: "fastest" (default), "economy", "hour" or "minimum"
    /// - `CHAIN_TIMEOUT_SECS`: per-request timeout, default 10
    pub fn from_env() -> Self {
        let network_str = env::var("BITCOIN_NETWORK")
            .unwrap_or_else(|_| "testnet".to_string())
            .to_lowercase();

        let network = match network_str.as_str() {
            "mainnet" | "bitcoin" => bitcoin::Network::Bitcoin,
            "signet" => bitcoin::Network::Signet,
            "regtest" => bitcoin::Network::Regtest,
            "testnet" | "" => bitcoin::Network::Testnet,
            other => {
                log::warn!("Unknown network '{}', defaulting to Testnet", other);
                bitcoin::Network::Testnet
            }
        };

        let chain_api_url = env::var("CHAIN_API_URL").unwrap_or_else(|_| {
            let default_url = match network {
                bitcoin::Network::Bitcoin => "https://mempool.space/api",
                bitcoin::Network::Signet => "https://mempool.space/signet/api",
                bitcoin::Network::Regtest => "http://localhost:3000",
                _ => "https://mempool.space/testnet/api",
            };
            default_url.to_string()
        });
        log::info!("Using {} via {}", network, chain_api_url);

        let fee_priority = env::var("FEE_PRIORITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(FeePriority::Fastest);

        let chain_timeout = env::var("CHAIN_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Self {
            network,
            chain_api_url,
            fee_priority,
            chain_timeout,
        }
    }

    /// BIP44 coin type for this network
    ///
    /// - Mainnet: 0
    /// - Testnet/Signet/Regtest: 1
    pub fn coin_type(&self) -> u32 {
        match self.network {
            bitcoin::Network::Bitcoin => 0,
            _ => 1,
        }
    }
}

impl Default for WalletConfig {
    /// Default configuration (Testnet)
    fn default() -> Self {
        Self {
            network: bitcoin::Network::Testnet,
            chain_api_url: "https://mempool.space/testnet/api".to_string(),
            fee_priority: FeePriority::Fastest,
            chain_timeout: Duration::from_secs(10),
        }
    }
}

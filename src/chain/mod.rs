//! Chain data access: per-address UTXO sets, recommended fees, broadcast.
//!
//! The engine is transport-agnostic; callers that need an anonymized route
//! inject a proxied `reqwest::Client` into [`EsploraClient`], or provide a
//! different [`ChainDataClient`] entirely.

pub mod esplora;
pub mod types;

pub use esplora::EsploraClient;
pub use types::{FeePriority, FetchedUtxo, RecommendedFees, UtxoStatus};

use async_trait::async_trait;

use crate::error::WalletError;

/// External source of chain state. Errors are surfaced as-is; retry policy
/// belongs to the caller.
#[async_trait]
pub trait ChainDataClient: Send + Sync {
    /// The full current UTXO set for one address, confirmed and unconfirmed.
    async fn utxos_for_address(&self, address: &str) -> Result<Vec<FetchedUtxo>, WalletError>;

    async fn recommended_fees(&self) -> Result<RecommendedFees, WalletError>;

    /// Broadcast a raw transaction, returning its txid.
    async fn broadcast(&self, tx_hex: &str) -> Result<String, WalletError>;
}

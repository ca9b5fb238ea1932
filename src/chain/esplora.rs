//! Esplora/mempool.space REST client.

use std::time::Duration;

use async_trait::async_trait;

use super::types::{FetchedUtxo, RecommendedFees};
use super::ChainDataClient;
use crate::error::WalletError;

pub struct EsploraClient {
    base_url: String,
    client: reqwest::Client,
}

impl EsploraClient {
    /// Client with a bounded per-request timeout. Timeouts surface as
    /// retryable `Network` errors instead of hanging a sync pass.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, WalletError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::Network(e.to_string()))?;
        Ok(Self::with_client(base_url, client))
    }

    /// Use a caller-built client, e.g. one routed through a SOCKS proxy.
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, WalletError> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WalletError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WalletError::Network(format!("{} on {}: {}", status, path, body)));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChainDataClient for EsploraClient {
    async fn utxos_for_address(&self, address: &str) -> Result<Vec<FetchedUtxo>, WalletError> {
        self.get(&format!("/address/{}/utxo", address))
            .await?
            .json()
            .await
            .map_err(|e| WalletError::Network(e.to_string()))
    }

    async fn recommended_fees(&self) -> Result<RecommendedFees, WalletError> {
        self.get("/v1/fees/recommended")
            .await?
            .json()
            .await
            .map_err(|e| WalletError::Network(e.to_string()))
    }

    async fn broadcast(&self, tx_hex: &str) -> Result<String, WalletError> {
        let url = format!("{}/tx", self.base_url);
        log::debug!("Broadcasting transaction to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "text/plain")
            .body(tx_hex.to_string())
            .send()
            .await
            .map_err(|e| WalletError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WalletError::Network(format!("Broadcast failed: {}", body)));
        }

        response
            .text()
            .await
            .map_err(|e| WalletError::Network(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_stripped() {
        let client = EsploraClient::with_client(
            "https://mempool.space/testnet/api//",
            reqwest::Client::new(),
        );
        assert_eq!(client.base_url, "https://mempool.space/testnet/api");
    }
}

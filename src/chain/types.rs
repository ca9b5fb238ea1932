//! Wire types for the Esplora/mempool.space REST API.

use serde::Deserialize;
use std::str::FromStr;

use crate::store::models::Outpoint;

/// A UTXO as returned by `GET /address/{addr}/utxo`.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchedUtxo {
    pub txid: String,
    pub vout: u32,
    /// Amount in satoshis.
    pub value: u64,
    pub status: UtxoStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UtxoStatus {
    pub confirmed: bool,
}

impl FetchedUtxo {
    pub fn outpoint(&self) -> Outpoint {
        Outpoint {
            txid: self.txid.clone(),
            vout: self.vout,
        }
    }
}

/// Fee tiers from `GET /v1/fees/recommended`, in sats/vByte.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RecommendedFees {
    #[serde(rename = "fastestFee")]
    pub fastest: u64,
    #[serde(rename = "economyFee")]
    pub economy: u64,
    #[serde(rename = "hourFee")]
    pub hour: u64,
    #[serde(rename = "minimumFee")]
    pub minimum: u64,
}

/// User-selected fee tier. Picks one of the recommended rates
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeePriority {
    Fastest,
    Economy,
    Hour,
    Minimum,
}

impl FeePriority {
    pub fn rate(self, fees: &RecommendedFees) -> u64 {
        match self {
            FeePriority::Fastest => fees.fastest,
            FeePriority::Economy => fees.economy,
            FeePriority::Hour => fees.hour,
            FeePriority::Minimum => fees.minimum,
        }
    }
}

impl FromStr for FeePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fastest" | "high" => Ok(FeePriority::Fastest),
            "economy" | "low" => Ok(FeePriority::Economy),
            "hour" => Ok(FeePriority::Hour),
            "minimum" => Ok(FeePriority::Minimum),
            other => Err(format!("unknown fee priority '{}'", other)),
        }
    }
}

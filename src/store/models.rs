//! Typed records for the entity store.
//!
//! Each persisted row is a plain struct parsed at the storage boundary;
//! malformed data surfaces as a `StorageError`, never a crash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::keys::Chain;

/// The single wallet record. One per device.
///
/// `encrypted_bip84_xprv` and `bip84_xpub` must exist before any address
/// derivation or signing can happen. The mnemonic is recovery material only
/// and may be deleted once the user has backed it up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub id: Uuid,
    /// Next unused receive index. Never decreases.
    pub receive_index: u32,
    /// Next unused change index. Never decreases.
    pub change_index: u32,
    pub encrypted_mnemonic: Option<Vec<u8>>,
    pub encrypted_bip84_xprv: Vec<u8>,
    pub bip84_xpub: String,
    pub encrypted_passphrase: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

impl WalletRecord {
    pub fn chain_index(&self, chain: Chain) -> u32 {
        match chain {
            Chain::Receive => self.receive_index,
            Chain::Change => self.change_index,
        }
    }
}

/// A pre-derived keypool address, kept until fully consumed on-chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressEntry {
    pub id: Uuid,
    pub address: String,
    pub index: u32,
    pub pubkey: Vec<u8>,
    /// Full path, e.g. `m/84'/1'/0'/0/5`. The `/<chain>/<index>` suffix is
    /// what the signer derives from.
    pub derivation: String,
}

/// The (txid, vout) pair that uniquely identifies a UTXO.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Outpoint {
    pub txid: String,
    pub vout: u32,
}

/// A cached unspent output belonging to one of our addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub id: Uuid,
    pub txid: String,
    pub vout: u32,
    /// Amount in satoshis.
    pub value: u64,
    pub confirmed: bool,
    pub address: String,
    pub pubkey: Vec<u8>,
    pub derivation: String,
}

impl UtxoEntry {
    pub fn outpoint(&self) -> Outpoint {
        Outpoint {
            txid: self.txid.clone(),
            vout: self.vout,
        }
    }
}

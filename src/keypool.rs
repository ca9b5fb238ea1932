//! Keypool management: two sliding windows of pre-derived addresses.
//!
//! Each chain keeps a window of [`KEYPOOL_SIZE`] addresses beyond the
//! wallet's current index. Indices are append-only and never reused within a
//! wallet's lifetime.

use std::str::FromStr;

use bitcoin::bip32::Xpub;
use bitcoin::Network;
use uuid::Uuid;

use crate::error::{StorageError, WalletError};
use crate::keys::{self, Chain};
use crate::store::models::{AddressEntry, WalletRecord};
use crate::store::WalletRepository;

/// Addresses derived per batch.
pub const KEYPOOL_SIZE: u32 = 20;

/// Refill when fewer than this many lookahead addresses remain. Buffers
/// against burst address consumption outrunning reconciliation.
pub const REFILL_THRESHOLD: u32 = 6;

pub struct KeypoolManager<'a> {
    repo: &'a dyn WalletRepository,
    network: Network,
    coin_type: u32,
}

impl<'a> KeypoolManager<'a> {
    pub fn new(repo: &'a dyn WalletRepository, network: Network, coin_type: u32) -> Self {
        Self {
            repo,
            network,
            coin_type,
        }
    }

    /// Initial fill at wallet creation: one full batch per chain, starting at
    /// the wallet's (zero) indices.
    pub fn fill_initial(&self, wallet: &WalletRecord) -> Result<(), WalletError> {
        let xpub = self.account_xpub(wallet)?;
        for chain in Chain::ALL {
            self.derive_batch(&xpub, chain, wallet.chain_index(chain))?;
        }
        Ok(())
    }

    /// Top up any chain whose lookahead has shrunk below the threshold.
    /// New entries always start one past the highest cached index.
    ///
    /// Returns the number of addresses derived.
    pub fn refill(&self) -> Result<u32, WalletError> {
        let wallet = self
            .repo
            .wallet()?
            .ok_or_else(|| StorageError::MissingRecord("wallet".to_string()))?;
        let xpub = self.account_xpub(&wallet)?;

        let mut derived = 0;
        for chain in Chain::ALL {
            let entries = self.repo.addresses(chain)?;
            let wallet_index = wallet.chain_index(chain);

            let start = match entries.last() {
                None => Some(wallet_index),
                Some(last) if last.index.saturating_sub(wallet_index) < REFILL_THRESHOLD => {
                    Some(last.index + 1)
                }
                Some(_) => None,
            };

            if let Some(start) = start {
                log::debug!(
                    "Refilling {:?} keypool from index {} ({} entries cached)",
                    chain,
                    start,
                    entries.len()
                );
                self.derive_batch(&xpub, chain, start)?;
                derived += KEYPOOL_SIZE;
            }
        }
        Ok(derived)
    }

    fn account_xpub(&self, wallet: &WalletRecord) -> Result<Xpub, WalletError> {
        Xpub::from_str(&wallet.bip84_xpub).map_err(|e| WalletError::KeyDerivation(e.to_string()))
    }

    fn derive_batch(&self, xpub: &Xpub, chain: Chain, start: u32) -> Result<(), WalletError> {
        for index in start..start + KEYPOOL_SIZE {
            let (address, pubkey) = keys::derive_address(xpub, chain, index, self.network)?;
            let entry = AddressEntry {
                id: Uuid::new_v4(),
                address: address.to_string(),
                index,
                pubkey: pubkey.to_bytes().to_vec(),
                derivation: keys::derivation_path(self.coin_type, chain, index),
            };
            self.repo.save_address(chain, &entry)?;
        }
        Ok(())
    }
}

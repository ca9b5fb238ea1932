//! In-memory repository, used as the test double and for ephemeral wallets.

use std::sync::Mutex;

use uuid::Uuid;

use super::models::{AddressEntry, UtxoEntry, WalletRecord};
use super::WalletRepository;
use crate::error::StorageError;
use crate::keys::Chain;

#[derive(Default)]
struct Inner {
    wallet: Option<WalletRecord>,
    receive: Vec<AddressEntry>,
    change: Vec<AddressEntry>,
    utxos: Vec<UtxoEntry>,
}

impl Inner {
    fn pool_mut(&mut self, chain: Chain) -> &mut Vec<AddressEntry> {
        match chain {
            Chain::Receive => &mut self.receive,
            Chain::Change => &mut self.change,
        }
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WalletRepository for MemoryRepository {
    fn wallet(&self) -> Result<Option<WalletRecord>, StorageError> {
        Ok(self.lock().wallet.clone())
    }

    fn save_wallet(&self, wallet: &WalletRecord) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.wallet.is_some() {
            return Err(StorageError::AlreadyExists("wallet".to_string()));
        }
        inner.wallet = Some(wallet.clone());
        Ok(())
    }

    fn set_chain_index(&self, chain: Chain, index: u32) -> Result<(), StorageError> {
        let mut inner = self.lock();
        let wallet = inner
            .wallet
            .as_mut()
            .ok_or_else(|| StorageError::MissingRecord("wallet".to_string()))?;
        match chain {
            Chain::Receive => wallet.receive_index = index,
            Chain::Change => wallet.change_index = index,
        }
        Ok(())
    }

    fn clear_mnemonic(&self) -> Result<(), StorageError> {
        let mut inner = self.lock();
        let wallet = inner
            .wallet
            .as_mut()
            .ok_or_else(|| StorageError::MissingRecord("wallet".to_string()))?;
        wallet.encrypted_mnemonic = None;
        Ok(())
    }

    fn addresses(&self, chain: Chain) -> Result<Vec<AddressEntry>, StorageError> {
        let mut inner = self.lock();
        let mut entries = inner.pool_mut(chain).clone();
        entries.sort_by_key(|e| e.index);
        Ok(entries)
    }

    fn save_address(&self, chain: Chain, entry: &AddressEntry) -> Result<(), StorageError> {
        self.lock().pool_mut(chain).push(entry.clone());
        Ok(())
    }

    fn delete_address(&self, chain: Chain, id: Uuid) -> Result<(), StorageError> {
        let mut inner = self.lock();
        let pool = inner.pool_mut(chain);
        let before = pool.len();
        pool.retain(|e| e.id != id);
        if pool.len() == before {
            return Err(StorageError::MissingRecord(format!("address {}", id)));
        }
        Ok(())
    }

    fn utxos(&self) -> Result<Vec<UtxoEntry>, StorageError> {
        Ok(self.lock().utxos.clone())
    }

    fn save_utxo(&self, utxo: &UtxoEntry) -> Result<(), StorageError> {
        self.lock().utxos.push(utxo.clone());
        Ok(())
    }

    fn set_utxo_confirmed(&self, id: Uuid, confirmed: bool) -> Result<(), StorageError> {
        let mut inner = self.lock();
        let utxo = inner
            .utxos
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StorageError::MissingRecord(format!("utxo {}", id)))?;
        utxo.confirmed = confirmed;
        Ok(())
    }

    fn delete_utxo(&self, id: Uuid) -> Result<(), StorageError> {
        let mut inner = self.lock();
        let before = inner.utxos.len();
        inner.utxos.retain(|u| u.id != id);
        if inner.utxos.len() == before {
            return Err(StorageError::MissingRecord(format!("utxo {}", id)));
        }
        Ok(())
    }

    fn wipe(&self) -> Result<(), StorageError> {
        let mut inner = self.lock();
        *inner = Inner::default();
        Ok(())
    }
}

//! JSON-file-backed repository.
//!
//! One document per concern under a base directory: `wallet.json`,
//! `receive_addresses.json`, `change_addresses.json`, `utxos.json`.

use std::fs;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::models::{AddressEntry, UtxoEntry, WalletRecord};
use super::WalletRepository;
use crate::error::StorageError;
use crate::keys::Chain;

pub struct FileRepository {
    base_path: PathBuf,
}

impl FileRepository {
    pub fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_path
    }

    fn pool_file(chain: Chain) -> &'static str {
        match chain {
            Chain::Receive => "receive_addresses.json",
            Chain::Change => "change_addresses.json",
        }
    }

    fn read_doc<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>, StorageError> {
        let path = self.base_path.join(file);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn write_doc<T: Serialize>(&self, file: &str, doc: &T) -> Result<(), StorageError> {
        let path = self.base_path.join(file);
        let json = serde_json::to_string_pretty(doc)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn read_list<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, StorageError> {
        Ok(self.read_doc(file)?.unwrap_or_default())
    }

    fn mutate_wallet(
        &self,
        f: impl FnOnce(&mut WalletRecord),
    ) -> Result<(), StorageError> {
        let mut wallet: WalletRecord = self
            .read_doc("wallet.json")?
            .ok_or_else(|| StorageError::MissingRecord("wallet".to_string()))?;
        f(&mut wallet);
        self.write_doc("wallet.json", &wallet)
    }
}

impl WalletRepository for FileRepository {
    fn wallet(&self) -> Result<Option<WalletRecord>, StorageError> {
        self.read_doc("wallet.json")
    }

    fn save_wallet(&self, wallet: &WalletRecord) -> Result<(), StorageError> {
        if self.base_path.join("wallet.json").exists() {
            return Err(StorageError::AlreadyExists("wallet".to_string()));
        }
        self.write_doc("wallet.json", wallet)
    }

    fn set_chain_index(&self, chain: Chain, index: u32) -> Result<(), StorageError> {
        self.mutate_wallet(|w| match chain {
            Chain::Receive => w.receive_index = index,
            Chain::Change => w.change_index = index,
        })
    }

    fn clear_mnemonic(&self) -> Result<(), StorageError> {
        self.mutate_wallet(|w| w.encrypted_mnemonic = None)
    }

    fn addresses(&self, chain: Chain) -> Result<Vec<AddressEntry>, StorageError> {
        let mut entries: Vec<AddressEntry> = self.read_list(Self::pool_file(chain))?;
        entries.sort_by_key(|e| e.index);
        Ok(entries)
    }

    fn save_address(&self, chain: Chain, entry: &AddressEntry) -> Result<(), StorageError> {
        let file = Self::pool_file(chain);
        let mut entries: Vec<AddressEntry> = self.read_list(file)?;
        entries.push(entry.clone());
        self.write_doc(file, &entries)
    }

    fn delete_address(&self, chain: Chain, id: Uuid) -> Result<(), StorageError> {
        let file = Self::pool_file(chain);
        let mut entries: Vec<AddressEntry> = self.read_list(file)?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Err(StorageError::MissingRecord(format!("address {}", id)));
        }
        self.write_doc(file, &entries)
    }

    fn utxos(&self) -> Result<Vec<UtxoEntry>, StorageError> {
        self.read_list("utxos.json")
    }

    fn save_utxo(&self, utxo: &UtxoEntry) -> Result<(), StorageError> {
        let mut utxos: Vec<UtxoEntry> = self.read_list("utxos.json")?;
        utxos.push(utxo.clone());
        self.write_doc("utxos.json", &utxos)
    }

    fn set_utxo_confirmed(&self, id: Uuid, confirmed: bool) -> Result<(), StorageError> {
        let mut utxos: Vec<UtxoEntry> = self.read_list("utxos.json")?;
        let utxo = utxos
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StorageError::MissingRecord(format!("utxo {}", id)))?;
        utxo.confirmed = confirmed;
        self.write_doc("utxos.json", &utxos)
    }

    fn delete_utxo(&self, id: Uuid) -> Result<(), StorageError> {
        let mut utxos: Vec<UtxoEntry> = self.read_list("utxos.json")?;
        let before = utxos.len();
        utxos.retain(|u| u.id != id);
        if utxos.len() == before {
            return Err(StorageError::MissingRecord(format!("utxo {}", id)));
        }
        self.write_doc("utxos.json", &utxos)
    }

    fn wipe(&self) -> Result<(), StorageError> {
        log::warn!("Wiping wallet store at {:?}", self.base_path);
        for file in [
            "wallet.json",
            "receive_addresses.json",
            "change_addresses.json",
            "utxos.json",
        ] {
            let path = self.base_path.join(file);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn wallet() -> WalletRecord {
        WalletRecord {
            id: Uuid::new_v4(),
            receive_index: 0,
            change_index: 0,
            encrypted_mnemonic: Some(vec![1, 2, 3]),
            encrypted_bip84_xprv: vec![4, 5, 6],
            bip84_xpub: "tpubDC00000".to_string(),
            encrypted_passphrase: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_wallet_round_trip_and_single_wallet_rule() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path().to_path_buf()).unwrap();

        assert!(repo.wallet().unwrap().is_none());
        repo.save_wallet(&wallet()).unwrap();
        assert!(repo.wallet().unwrap().is_some());
        assert!(matches!(
            repo.save_wallet(&wallet()),
            Err(StorageError::AlreadyExists(_))
        ));

        repo.set_chain_index(Chain::Receive, 3).unwrap();
        repo.clear_mnemonic().unwrap();
        let loaded = repo.wallet().unwrap().unwrap();
        assert_eq!(loaded.receive_index, 3);
        assert!(loaded.encrypted_mnemonic.is_none());
    }

    #[test]
    fn test_addresses_sorted_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path().to_path_buf()).unwrap();

        for index in [5u32, 1, 3] {
            repo.save_address(
                Chain::Receive,
                &AddressEntry {
                    id: Uuid::new_v4(),
                    address: format!("tb1q-{}", index),
                    index,
                    pubkey: vec![],
                    derivation: format!("m/84'/1'/0'/0/{}", index),
                },
            )
            .unwrap();
        }

        let entries = repo.addresses(Chain::Receive).unwrap();
        let indices: Vec<u32> = entries.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![1, 3, 5]);
        assert!(repo.addresses(Chain::Change).unwrap().is_empty());
    }

    #[test]
    fn test_utxo_update_delete_and_wipe() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path().to_path_buf()).unwrap();
        repo.save_wallet(&wallet()).unwrap();

        let utxo = UtxoEntry {
            id: Uuid::new_v4(),
            txid: "aa".repeat(32),
            vout: 0,
            value: 10_000,
            confirmed: false,
            address: "tb1q-0".to_string(),
            pubkey: vec![],
            derivation: "m/84'/1'/0'/0/0".to_string(),
        };
        repo.save_utxo(&utxo).unwrap();
        repo.set_utxo_confirmed(utxo.id, true).unwrap();
        assert!(repo.utxos().unwrap()[0].confirmed);

        repo.delete_utxo(utxo.id).unwrap();
        assert!(matches!(
            repo.delete_utxo(utxo.id),
            Err(StorageError::MissingRecord(_))
        ));

        repo.wipe().unwrap();
        assert!(repo.wallet().unwrap().is_none());
        assert!(repo.utxos().unwrap().is_empty());
    }
}

//! Wallet lifecycle and operation orchestration.
//!
//! [`WalletManager`] owns the repository, chain client, secure store and
//! config, and serializes every wallet-mutating operation behind one
//! `tokio::sync::Mutex`. A sync pass and a transaction build can therefore
//! never interleave against the same wallet.

use std::str::FromStr;
use std::sync::Arc;

use bitcoin::bip32::Xpriv;
use bitcoin::Address;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::builder::TransactionBuilder;
use crate::chain::ChainDataClient;
use crate::config::WalletConfig;
use crate::error::{StorageError, WalletError};
use crate::keypool::KeypoolManager;
use crate::keys::{self, Chain};
use crate::reconcile::{ReconcileSummary, UtxoReconciler};
use crate::secure::SecureStore;
use crate::signer::{SignedTransaction, Signer};
use crate::store::models::{AddressEntry, WalletRecord};
use crate::store::WalletRepository;

/// Satoshi balances split by confirmation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub confirmed: u64,
    pub unconfirmed: u64,
}

impl Balance {
    pub fn total(&self) -> u64 {
        self.confirmed + self.unconfirmed
    }
}

/// Outcome of one `sync()` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncSummary {
    /// Keypool entries derived by the refill step.
    pub addresses_derived: u32,
    pub reconcile: ReconcileSummary,
}

pub struct WalletManager {
    config: WalletConfig,
    repo: Arc<dyn WalletRepository>,
    chain: Arc<dyn ChainDataClient>,
    secure: SecureStore,
    write_lock: Mutex<()>,
}

impl WalletManager {
    pub fn new(
        config: WalletConfig,
        repo: Arc<dyn WalletRepository>,
        chain: Arc<dyn ChainDataClient>,
        secure: SecureStore,
    ) -> Self {
        Self {
            config,
            repo,
            chain,
            secure,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Create a fresh wallet: new mnemonic, account keys, sealed key
    /// material, initial keypool. Returns the mnemonic words once, for the
    /// user's backup; they are never returned again.
    pub async fn create_wallet(&self, passphrase: &str) -> Result<Zeroizing<String>, WalletError> {
        let _guard = self.write_lock.lock().await;
        let mnemonic = keys::generate_mnemonic()?;
        self.install_wallet(&mnemonic, passphrase)?;
        Ok(Zeroizing::new(mnemonic.to_string()))
    }

    /// Recover a wallet from an existing mnemonic and optional passphrase.
    /// The address sequence is identical to the original wallet's; a
    /// follow-up `sync()` repopulates the UTXO cache.
    pub async fn recover_wallet(
        &self,
        words: &str,
        passphrase: &str,
    ) -> Result<(), WalletError> {
        let _guard = self.write_lock.lock().await;
        let mnemonic = keys::parse_mnemonic(words)?;
        self.install_wallet(&mnemonic, passphrase)
    }

    fn install_wallet(
        &self,
        mnemonic: &bip39::Mnemonic,
        passphrase: &str,
    ) -> Result<(), WalletError> {
        if self.repo.wallet()?.is_some() {
            return Err(StorageError::AlreadyExists("wallet".to_string()).into());
        }

        let master = keys::master_key(mnemonic, passphrase, self.config.network)?;
        let account = keys::account_xprv(&master, self.config.coin_type())?;
        let xpub = keys::account_xpub(&account);

        let encrypted_passphrase = if passphrase.is_empty() {
            None
        } else {
            Some(self.secure.encrypt(passphrase.as_bytes())?)
        };

        let wallet = WalletRecord {
            id: Uuid::new_v4(),
            receive_index: 0,
            change_index: 0,
            encrypted_mnemonic: Some(self.secure.encrypt(mnemonic.to_string().as_bytes())?),
            encrypted_bip84_xprv: self.secure.encrypt(account.to_string().as_bytes())?,
            bip84_xpub: xpub.to_string(),
            encrypted_passphrase,
            created_at: Utc::now(),
        };
        self.repo.save_wallet(&wallet)?;

        KeypoolManager::new(self.repo.as_ref(), self.config.network, self.config.coin_type())
            .fill_initial(&wallet)?;

        log::info!("Wallet {} installed on {}", wallet.id, self.config.network);
        Ok(())
    }

    /// Drop the sealed mnemonic once the user has confirmed their backup.
    /// Signing keeps working from the stored account key.
    pub async fn delete_mnemonic(&self) -> Result<(), WalletError> {
        let _guard = self.write_lock.lock().await;
        self.repo.clear_mnemonic()?;
        Ok(())
    }

    /// Reveal the mnemonic for backup, if it has not been deleted yet.
    pub async fn mnemonic(&self) -> Result<Option<Zeroizing<String>>, WalletError> {
        let wallet = self.require_wallet()?;
        match wallet.encrypted_mnemonic {
            Some(sealed) => Ok(Some(self.secure.decrypt_string(&sealed)?)),
            None => Ok(None),
        }
    }

    /// Full store wipe. Used when switching networks.
    pub async fn wipe(&self) -> Result<(), WalletError> {
        let _guard = self.write_lock.lock().await;
        self.repo.wipe()?;
        log::info!("Wallet store wiped");
        Ok(())
    }

    /// One serialized sync pass: top up the keypool, then reconcile the UTXO
    /// cache address by address.
    pub async fn sync(&self) -> Result<SyncSummary, WalletError> {
        let _guard = self.write_lock.lock().await;
        self.require_wallet()?;

        let pool =
            KeypoolManager::new(self.repo.as_ref(), self.config.network, self.config.coin_type());
        let addresses_derived = pool.refill()?;

        let reconcile = UtxoReconciler::new(self.repo.as_ref(), self.chain.as_ref())
            .reconcile()
            .await?;

        // Index advances during reconciliation may have eaten into the
        // lookahead; restore the floor before the pass ends.
        let addresses_derived = addresses_derived + pool.refill()?;

        Ok(SyncSummary {
            addresses_derived,
            reconcile,
        })
    }

    /// Confirmed/unconfirmed satoshi sums over the cached UTXOs.
    pub fn balance(&self) -> Result<Balance, WalletError> {
        let mut balance = Balance::default();
        for utxo in self.repo.utxos()? {
            if utxo.confirmed {
                balance.confirmed += utxo.value;
            } else {
                balance.unconfirmed += utxo.value;
            }
        }
        Ok(balance)
    }

    /// The keypool entry at the wallet's current receive index.
    pub fn next_receive_address(&self) -> Result<AddressEntry, WalletError> {
        let wallet = self.require_wallet()?;
        self.chain_entry(Chain::Receive, wallet.receive_index)
    }

    /// Build and sign a payment. The caller confirms and then broadcasts.
    pub async fn build_payment(
        &self,
        destination: &str,
        amount: u64,
    ) -> Result<SignedTransaction, WalletError> {
        let _guard = self.write_lock.lock().await;
        let wallet = self.require_wallet()?;
        let rate = self.fee_rate().await?;

        let change = self.chain_entry(Chain::Change, wallet.change_index)?;
        let unsigned = TransactionBuilder::new(self.repo.as_ref(), self.config.network)
            .build_payment(destination, &change, amount, rate)?;

        self.signer(&wallet)?.sign(&unsigned)
    }

    /// Build and sign a sweep of every cached UTXO to one destination.
    pub async fn build_sweep(&self, destination: &str) -> Result<SignedTransaction, WalletError> {
        let _guard = self.write_lock.lock().await;
        let wallet = self.require_wallet()?;
        let rate = self.fee_rate().await?;

        let unsigned = TransactionBuilder::new(self.repo.as_ref(), self.config.network)
            .build_sweep(destination, rate)?;

        self.signer(&wallet)?.sign(&unsigned)
    }

    /// Post a signed transaction. Returns the txid reported by the chain API.
    pub async fn broadcast(&self, signed: &SignedTransaction) -> Result<String, WalletError> {
        let txid = self.chain.broadcast(&signed.hex).await?;
        log::info!("Broadcast {} (fee {} sats)", txid, signed.fee);
        Ok(txid)
    }

    /// Check a destination string against the configured network.
    pub fn valid_address(&self, address: &str) -> bool {
        Address::from_str(address)
            .map(|a| a.require_network(self.config.network).is_ok())
            .unwrap_or(false)
    }

    /// Current sats/vByte for the configured fee priority.
    pub async fn fee_rate(&self) -> Result<u64, WalletError> {
        let fees = self.chain.recommended_fees().await?;
        Ok(self.config.fee_priority.rate(&fees))
    }

    fn require_wallet(&self) -> Result<WalletRecord, WalletError> {
        Ok(self
            .repo
            .wallet()?
            .ok_or_else(|| StorageError::MissingRecord("wallet".to_string()))?)
    }

    fn chain_entry(&self, chain: Chain, index: u32) -> Result<AddressEntry, WalletError> {
        self.repo
            .addresses(chain)?
            .into_iter()
            .find(|e| e.index == index)
            .ok_or_else(|| {
                StorageError::MissingRecord(format!("{:?} address at index {}", chain, index))
                    .into()
            })
    }

    fn signer(&self, wallet: &WalletRecord) -> Result<Signer, WalletError> {
        let xprv = self.secure.decrypt_string(&wallet.encrypted_bip84_xprv)?;
        let account =
            Xpriv::from_str(&xprv).map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
        Ok(Signer::new(account, self.config.network))
    }
}

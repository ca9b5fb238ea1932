//! Shared test infrastructure: a scripted chain-API double plus a fully
//! wired wallet manager over the in-memory repository.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use wallet_core::chain::{ChainDataClient, FetchedUtxo, RecommendedFees, UtxoStatus};
use wallet_core::error::WalletError;
use wallet_core::keys::Chain;
use wallet_core::secure::SecureStore;
use wallet_core::store::{MemoryRepository, WalletRepository};
use wallet_core::{WalletConfig, WalletManager};

/// A deterministic 64-hex-char txid from a one-byte tag.
pub fn txid(tag: u8) -> String {
    hex::encode([tag; 32])
}

/// External testnet destination (not owned by the test wallet).
pub const DEST: &str = "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7";

pub fn decode_tx(tx_hex: &str) -> bitcoin::Transaction {
    bitcoin::consensus::encode::deserialize(&hex::decode(tx_hex).unwrap()).unwrap()
}

/// Chain client double with per-address scripted UTXO sets.
pub struct MockChainClient {
    utxos: Mutex<HashMap<String, Vec<FetchedUtxo>>>,
    fees: Mutex<RecommendedFees>,
    fail_address: Mutex<Option<String>>,
    pub broadcasts: Mutex<Vec<String>>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self {
            utxos: Mutex::new(HashMap::new()),
            fees: Mutex::new(RecommendedFees {
                fastest: 10,
                economy: 2,
                hour: 5,
                minimum: 1,
            }),
            fail_address: Mutex::new(None),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    /// Add one UTXO to an address's scripted set.
    pub fn fund(&self, address: &str, txid: &str, vout: u32, value: u64, confirmed: bool) {
        self.utxos
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .push(FetchedUtxo {
                txid: txid.to_string(),
                vout,
                value,
                status: UtxoStatus { confirmed },
            });
    }

    /// Replace an address's scripted set wholesale.
    pub fn set_utxos(&self, address: &str, utxos: Vec<FetchedUtxo>) {
        self.utxos
            .lock()
            .unwrap()
            .insert(address.to_string(), utxos);
    }

    /// Script the address as fully spent.
    pub fn clear(&self, address: &str) {
        self.utxos.lock().unwrap().insert(address.to_string(), vec![]);
    }

    pub fn set_fees(&self, fees: RecommendedFees) {
        *self.fees.lock().unwrap() = fees;
    }

    /// Make the next fetches for this address fail with a network error.
    pub fn fail_on(&self, address: Option<&str>) {
        *self.fail_address.lock().unwrap() = address.map(str::to_string);
    }
}

#[async_trait]
impl ChainDataClient for MockChainClient {
    async fn utxos_for_address(&self, address: &str) -> Result<Vec<FetchedUtxo>, WalletError> {
        if self.fail_address.lock().unwrap().as_deref() == Some(address) {
            return Err(WalletError::Network(format!("scripted failure for {}", address)));
        }
        Ok(self
            .utxos
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    async fn recommended_fees(&self) -> Result<RecommendedFees, WalletError> {
        Ok(*self.fees.lock().unwrap())
    }

    async fn broadcast(&self, tx_hex: &str) -> Result<String, WalletError> {
        self.broadcasts.lock().unwrap().push(tx_hex.to_string());
        Ok(decode_tx(tx_hex).compute_txid().to_string())
    }
}

/// A wallet manager wired to the in-memory store and the mock chain, with
/// direct handles on both for assertions.
pub struct TestEnvironment {
    pub repo: Arc<MemoryRepository>,
    pub chain: Arc<MockChainClient>,
    pub manager: WalletManager,
}

impl TestEnvironment {
    /// Fresh testnet wallet, empty chain, default fee tiers.
    pub async fn with_wallet() -> anyhow::Result<Self> {
        let _ = env_logger::builder().is_test(true).try_init();

        let repo = Arc::new(MemoryRepository::new());
        let chain = Arc::new(MockChainClient::new());
        let manager = WalletManager::new(
            WalletConfig::default(),
            repo.clone(),
            chain.clone(),
            SecureStore::new(&[9u8; 32]),
        );
        manager.create_wallet("").await?;

        Ok(Self {
            repo,
            chain,
            manager,
        })
    }

    /// The keypool address string at `index` on `chain`.
    pub fn address_at(&self, chain: Chain, index: u32) -> String {
        self.repo
            .addresses(chain)
            .unwrap()
            .into_iter()
            .find(|e| e.index == index)
            .unwrap_or_else(|| panic!("no {:?} address at index {}", chain, index))
            .address
    }

    pub fn receive_index(&self) -> u32 {
        self.repo.wallet().unwrap().unwrap().receive_index
    }

    pub fn change_index(&self) -> u32 {
        self.repo.wallet().unwrap().unwrap().change_index
    }
}

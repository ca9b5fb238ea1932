//! Entity store contract and implementations.
//!
//! The engine only ever touches persistence through [`WalletRepository`], so
//! the backing store can be swapped (file-based, platform database, or the
//! in-memory double used by tests).

pub mod file;
pub mod memory;
pub mod models;

pub use file::FileRepository;
pub use memory::MemoryRepository;
pub use models::{AddressEntry, Outpoint, UtxoEntry, WalletRecord};

use uuid::Uuid;

use crate::error::StorageError;
use crate::keys::Chain;

/// The entity-store contract the wallet engine consumes.
///
/// Single-wallet design: the wallet record needs no lookup key. Address
/// entries are kept per chain; UTXO order is insertion order, which coin
/// selection relies on.
pub trait WalletRepository: Send + Sync {
    fn wallet(&self) -> Result<Option<WalletRecord>, StorageError>;

    /// Insert the wallet record. Fails if one already exists; overwriting
    /// key material is never allowed.
    fn save_wallet(&self, wallet: &WalletRecord) -> Result<(), StorageError>;

    /// Set the next-unused index for one chain.
    fn set_chain_index(&self, chain: Chain, index: u32) -> Result<(), StorageError>;

    /// Drop the encrypted mnemonic after the user has backed it up.
    fn clear_mnemonic(&self) -> Result<(), StorageError>;

    /// All keypool entries for a chain, ordered by derivation index.
    fn addresses(&self, chain: Chain) -> Result<Vec<AddressEntry>, StorageError>;

    fn save_address(&self, chain: Chain, entry: &AddressEntry) -> Result<(), StorageError>;

    fn delete_address(&self, chain: Chain, id: Uuid) -> Result<(), StorageError>;

    /// All cached UTXOs in insertion order.
    fn utxos(&self) -> Result<Vec<UtxoEntry>, StorageError>;

    fn save_utxo(&self, utxo: &UtxoEntry) -> Result<(), StorageError>;

    fn set_utxo_confirmed(&self, id: Uuid, confirmed: bool) -> Result<(), StorageError>;

    fn delete_utxo(&self, id: Uuid) -> Result<(), StorageError>;

    /// Full wipe: wallet, keypool and UTXO cache. Used on network switch.
    fn wipe(&self) -> Result<(), StorageError>;

    /// Cached UTXOs owned by one address, in insertion order.
    fn utxos_for_address(&self, address: &str) -> Result<Vec<UtxoEntry>, StorageError> {
        Ok(self
            .utxos()?
            .into_iter()
            .filter(|u| u.address == address)
            .collect())
    }
}

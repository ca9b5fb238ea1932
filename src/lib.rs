//! Non-custodial single-wallet Bitcoin engine: BIP84 key derivation, sealed
//! key storage, keypool management, UTXO cache reconciliation against an
//! Esplora-style API, and P2WPKH transaction building/signing. All amounts
//! are integer satoshis end to end.
//!
//! [`manager::WalletManager`] is the front door; the modules underneath are
//! usable on their own and take their dependencies through the
//! [`store::WalletRepository`] and [`chain::ChainDataClient`] traits.

pub mod builder;
pub mod chain;
pub mod config;
pub mod error;
pub mod invoice;
pub mod keypool;
pub mod keys;
pub mod manager;
pub mod reconcile;
pub mod secure;
pub mod signer;
pub mod store;
pub mod units;

pub use config::WalletConfig;
pub use error::{StorageError, WalletError};
pub use manager::{Balance, SyncSummary, WalletManager};

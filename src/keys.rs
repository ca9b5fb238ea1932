//! BIP39/BIP32/BIP84 key and address derivation.
//!
//! Everything here is deterministic: identical (mnemonic, passphrase) pairs
//! always yield the identical account key and address sequence, which is what
//! makes wallet recovery possible.

use bip39::Mnemonic;
use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv, Xpub};
use bitcoin::key::CompressedPublicKey;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address, Network, PublicKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::str::FromStr;

use crate::error::WalletError;

/// Which side of the BIP84 account an address belongs to.
///
/// Receive is the external chain (`.../0/i`), Change the internal one
/// (`.../1/i`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Receive,
    Change,
}

impl Chain {
    pub const ALL: [Chain; 2] = [Chain::Receive, Chain::Change];

    /// The chain's path segment value: 0 for receive, 1 for change.
    pub fn segment(self) -> u32 {
        match self {
            Chain::Receive => 0,
            Chain::Change => 1,
        }
    }
}

/// Generate a fresh 24-word mnemonic.
///
/// Draws 32 bytes from the OS RNG and runs them through three rounds of
/// SHA-256 before encoding. The extra hashing mixes the raw entropy; BIP39
/// itself does not require it.
pub fn generate_mnemonic() -> Result<Mnemonic, WalletError> {
    let mut entropy = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(|e| WalletError::EntropyUnavailable(e.to_string()))?;

    let mut digest: [u8; 32] = entropy;
    for _ in 0..3 {
        digest = Sha256::digest(digest).into();
    }

    Mnemonic::from_entropy(&digest).map_err(|e| WalletError::KeyDerivation(e.to_string()))
}

/// Derive the BIP32 root extended private key from a mnemonic and passphrase.
pub fn master_key(
    mnemonic: &Mnemonic,
    passphrase: &str,
    network: Network,
) -> Result<Xpriv, WalletError> {
    let seed = mnemonic.to_seed(passphrase);
    Xpriv::new_master(network, &seed).map_err(|e| WalletError::KeyDerivation(e.to_string()))
}

/// Parse a mnemonic phrase, rejecting bad words and bad checksums.
pub fn parse_mnemonic(words: &str) -> Result<Mnemonic, WalletError> {
    Mnemonic::parse(words).map_err(|e| WalletError::InvalidMnemonic(e.to_string()))
}

/// Full BIP39 validation: wordlist membership plus checksum.
pub fn valid_mnemonic(words: &str) -> bool {
    Mnemonic::parse(words).is_ok()
}

/// Derive the BIP84 account key at `m/84'/<coin_type>'/0'`.
///
/// Hardened derivation stops at the account level; address derivation below
/// it is non-hardened so it can run from the xpub alone.
pub fn account_xprv(master: &Xpriv, coin_type: u32) -> Result<Xpriv, WalletError> {
    let secp = Secp256k1::new();
    let path = DerivationPath::from_str(&format!("m/84'/{}'/0'", coin_type))
        .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;

    master
        .derive_priv(&secp, &path)
        .map_err(|e| WalletError::KeyDerivation(e.to_string()))
}

/// The account extended public key for watch-only address derivation.
pub fn account_xpub(account: &Xpriv) -> Xpub {
    let secp = Secp256k1::new();
    Xpub::from_priv(&secp, account)
}

/// Derive the native segwit P2WPKH address and pubkey at `<chain>/<index>`
/// below the account xpub.
pub fn derive_address(
    account_xpub: &Xpub,
    chain: Chain,
    index: u32,
    network: Network,
) -> Result<(Address, CompressedPublicKey), WalletError> {
    let secp = Secp256k1::new();

    let chain_child = ChildNumber::from_normal_idx(chain.segment())
        .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
    let index_child = ChildNumber::from_normal_idx(index)
        .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;

    let derived = account_xpub
        .derive_pub(&secp, &[chain_child, index_child])
        .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;

    let pubkey = PublicKey::new(derived.public_key);
    let compressed = CompressedPublicKey::try_from(pubkey)
        .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
    let address = Address::p2wpkh(&compressed, network);

    Ok((address, compressed))
}

/// Full derivation path string stored alongside each address and UTXO.
pub fn derivation_path(coin_type: u32, chain: Chain, index: u32) -> String {
    format!("m/84'/{}'/0'/{}/{}", coin_type, chain.segment(), index)
}

/// Extract the `<chain>/<index>` suffix from a stored derivation path.
///
/// The account-level prefix is already baked into the stored account key, so
/// signing only needs the last two segments.
pub fn parse_chain_index(derivation: &str) -> Result<(u32, u32), WalletError> {
    let mut segments = derivation.rsplit('/');
    let index = segments
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| WalletError::KeyDerivation(format!("Bad derivation path: {}", derivation)))?;
    let chain = segments
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|c| *c <= 1)
        .ok_or_else(|| WalletError::KeyDerivation(format!("Bad derivation path: {}", derivation)))?;

    Ok((chain, index))
}

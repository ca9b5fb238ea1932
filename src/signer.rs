//! Per-input P2WPKH signing.
//!
//! Each input carries the derivation path of the address it pays, recorded
//! when the UTXO was cached. Signing re-derives the child key from the
//! account key and cross-checks the derived pubkey against the cached one
//! before producing a signature; any mismatch aborts the whole transaction.

use bitcoin::bip32::{ChildNumber, Xpriv};
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::hashes::Hash;
use bitcoin::key::CompressedPublicKey;
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::sighash::SighashCache;
use bitcoin::{Amount, EcdsaSighashType, Network, PublicKey, ScriptBuf, Txid, Witness};

use crate::builder::UnsignedTransaction;
use crate::error::WalletError;
use crate::keys;

/// A fully signed transaction ready to broadcast.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub hex: String,
    pub txid: Txid,
    /// Actual fee paid: input sum minus output sum.
    pub fee: u64,
}

pub struct Signer {
    account: Xpriv,
    network: Network,
}

impl Signer {
    /// `account` is the BIP84 account-level key (`m/84'/<coin>'/0'`); only
    /// the non-hardened `<chain>/<index>` tail is derived here.
    pub fn new(account: Xpriv, network: Network) -> Self {
        Self { account, network }
    }

    pub fn sign(&self, unsigned: &UnsignedTransaction) -> Result<SignedTransaction, WalletError> {
        if unsigned.tx.input.len() != unsigned.inputs.len() {
            return Err(WalletError::SigningFailed(format!(
                "Input metadata mismatch: {} tx inputs, {} cache entries",
                unsigned.tx.input.len(),
                unsigned.inputs.len()
            )));
        }

        let secp = Secp256k1::new();
        let mut tx = unsigned.tx.clone();
        let mut cache = SighashCache::new(&mut tx);

        for (i, entry) in unsigned.inputs.iter().enumerate() {
            let (chain, index) = keys::parse_chain_index(&entry.derivation)
                .map_err(|e| WalletError::SigningFailed(e.to_string()))?;

            let path = [
                ChildNumber::from_normal_idx(chain)
                    .map_err(|e| WalletError::SigningFailed(e.to_string()))?,
                ChildNumber::from_normal_idx(index)
                    .map_err(|e| WalletError::SigningFailed(e.to_string()))?,
            ];
            let child = self
                .account
                .derive_priv(&secp, &path)
                .map_err(|e| WalletError::SigningFailed(e.to_string()))?;

            let pubkey = PublicKey::new(child.private_key.public_key(&secp));
            let compressed = CompressedPublicKey::try_from(pubkey)
                .map_err(|e| WalletError::SigningFailed(e.to_string()))?;

            if compressed.to_bytes().as_slice() != entry.pubkey.as_slice() {
                return Err(WalletError::SigningFailed(format!(
                    "Derived pubkey does not match cached pubkey for input {} ({})",
                    i, entry.derivation
                )));
            }

            let script = ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash());
            let sighash = cache
                .p2wpkh_signature_hash(
                    i,
                    &script,
                    Amount::from_sat(entry.value),
                    EcdsaSighashType::All,
                )
                .map_err(|e| WalletError::SigningFailed(e.to_string()))?;

            let message = Message::from_digest(sighash.to_byte_array());
            let signature = bitcoin::ecdsa::Signature {
                signature: secp.sign_ecdsa(&message, &child.private_key),
                sighash_type: EcdsaSighashType::All,
            };

            let mut witness = Witness::new();
            witness.push(signature.to_vec());
            witness.push(compressed.to_bytes());

            *cache
                .witness_mut(i)
                .ok_or_else(|| WalletError::SigningFailed(format!("No input at {}", i)))? =
                witness;
        }

        let tx = cache.into_transaction();
        let fee = unsigned
            .total_input()
            .checked_sub(unsigned.total_output())
            .ok_or_else(|| {
                WalletError::SigningFailed("Outputs exceed inputs".to_string())
            })?;

        let txid = tx.compute_txid();
        log::debug!("Signed {} ({} inputs, fee {} sats)", txid, unsigned.inputs.len(), fee);

        Ok(SignedTransaction {
            hex: serialize_hex(&*tx),
            txid,
            fee,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

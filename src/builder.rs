//! Coin selection, fee estimation and unsigned transaction construction.
//!
//! All amounts are integer satoshis; no floating point touches selection or
//! fee math. Fees come from a fixed weight model for native segwit P2WPKH:
//! 272 WU per input, plus 248+42 WU for a two-output payment or 124+42 WU for
//! a single-output sweep, converted to vBytes (weight/4, floor) and priced at
//! the target rate in sats/vByte.

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::blockdata::script::ScriptBuf;
use bitcoin::blockdata::transaction::{OutPoint, Sequence, Transaction, TxIn, TxOut, Version};
use bitcoin::blockdata::witness::Witness;
use bitcoin::{Address, Amount, Network};

use crate::error::{StorageError, WalletError};
use crate::store::models::{AddressEntry, UtxoEntry};
use crate::store::WalletRepository;

/// Weight of one P2WPKH input, in weight units.
const INPUT_WU: u64 = 272;
/// Outputs + overhead for a destination-plus-change transaction.
const PAYMENT_TAIL_WU: u64 = 248 + 42;
/// Single output + overhead for a sweep.
const SWEEP_TAIL_WU: u64 = 124 + 42;

/// Output layout the fee estimate assumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxShape {
    /// Destination plus change.
    Payment,
    /// Single output, no change.
    Sweep,
}

/// Estimated fee in satoshis for `num_inputs` P2WPKH inputs at
/// `fee_rate` sats/vByte.
pub fn estimate_fee(num_inputs: usize, shape: TxShape, fee_rate: u64) -> u64 {
    let tail = match shape {
        TxShape::Payment => PAYMENT_TAIL_WU,
        TxShape::Sweep => SWEEP_TAIL_WU,
    };
    let weight = num_inputs as u64 * INPUT_WU + tail;
    (weight / 4) * fee_rate
}

/// An unsigned transaction plus the cache entries behind its inputs, in
/// input order. The signer needs the per-input value, pubkey and derivation
/// path; the 1:1 ordering is load-bearing.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub tx: Transaction,
    pub inputs: Vec<UtxoEntry>,
}

impl UnsignedTransaction {
    pub fn total_input(&self) -> u64 {
        self.inputs.iter().map(|u| u.value).sum()
    }

    pub fn total_output(&self) -> u64 {
        self.tx.output.iter().map(|o| o.value.to_sat()).sum()
    }

    /// Input sum minus output sum. Construction guarantees this is the
    /// estimated fee and never negative.
    pub fn fee(&self) -> u64 {
        self.total_input().saturating_sub(self.total_output())
    }
}

pub struct TransactionBuilder<'a> {
    repo: &'a dyn WalletRepository,
    network: Network,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(repo: &'a dyn WalletRepository, network: Network) -> Self {
        Self { repo, network }
    }

    /// Parse and network-check a destination address.
    pub fn validate_address(&self, address: &str) -> Result<Address, WalletError> {
        Address::from_str(address)
            .map_err(|e| WalletError::AddressInvalid(e.to_string()))?
            .require_network(self.network)
            .map_err(|e| WalletError::AddressInvalid(e.to_string()))
    }

    /// Greedy selection over confirmed cached UTXOs in cache order,
    /// accumulating until the target plus the running two-output fee
    /// estimate is covered.
    pub fn select_utxos(
        &self,
        target_amount: u64,
        fee_rate: u64,
    ) -> Result<Vec<UtxoEntry>, WalletError> {
        let mut selected = Vec::new();
        let mut total = 0u64;

        for utxo in self.repo.utxos()? {
            if !utxo.confirmed {
                continue;
            }
            total += utxo.value;
            selected.push(utxo);

            let fee = estimate_fee(selected.len(), TxShape::Payment, fee_rate);
            let required = target_amount.checked_add(fee).ok_or_else(|| {
                WalletError::InsufficientFunds(format!(
                    "Requested {} sats exceeds representable total",
                    target_amount
                ))
            })?;
            if total >= required {
                return Ok(selected);
            }
        }

        Err(WalletError::InsufficientFunds(format!(
            "Need {} sats plus fee, have {} sats confirmed",
            target_amount, total
        )))
    }

    /// Build a payment of `amount` sats to `destination`, with any remainder
    /// above the fee going to `change`.
    pub fn build_payment(
        &self,
        destination: &str,
        change: &AddressEntry,
        amount: u64,
        fee_rate: u64,
    ) -> Result<UnsignedTransaction, WalletError> {
        let dest_address = self.validate_address(destination)?;
        let change_address = self.validate_address(&change.address)?;

        let inputs = self.select_utxos(amount, fee_rate)?;
        let total: u64 = inputs.iter().map(|u| u.value).sum();
        let fee = estimate_fee(inputs.len(), TxShape::Payment, fee_rate);

        if total < fee {
            return Err(WalletError::FeeExceedsFunds(format!(
                "Estimated fee {} sats exceeds available {} sats",
                fee, total
            )));
        }
        let required = amount.checked_add(fee).ok_or_else(|| {
            WalletError::InsufficientFunds(format!(
                "Requested {} sats exceeds representable total",
                amount
            ))
        })?;
        let remainder = total.checked_sub(required).ok_or_else(|| {
            WalletError::InsufficientFunds(format!(
                "Need {} sats, selected {} sats",
                required, total
            ))
        })?;

        let mut outputs = vec![TxOut {
            value: Amount::from_sat(amount),
            script_pubkey: dest_address.script_pubkey(),
        }];
        if remainder > 0 {
            outputs.push(TxOut {
                value: Amount::from_sat(remainder),
                script_pubkey: change_address.script_pubkey(),
            });
        }

        log::debug!(
            "Built payment: {} inputs, {} sats out, {} sats change, {} sats fee",
            inputs.len(),
            amount,
            remainder,
            fee
        );
        let tx = assemble(&inputs, outputs)?;
        Ok(UnsignedTransaction { tx, inputs })
    }

    /// Spend every cached UTXO to one destination, no change. Amount is the
    /// total input minus the estimated fee.
    pub fn build_sweep(
        &self,
        destination: &str,
        fee_rate: u64,
    ) -> Result<UnsignedTransaction, WalletError> {
        let dest_address = self.validate_address(destination)?;

        let inputs = self.repo.utxos()?;
        if inputs.is_empty() {
            return Err(WalletError::InsufficientFunds("No UTXOs to sweep".to_string()));
        }

        let total: u64 = inputs.iter().map(|u| u.value).sum();
        let fee = estimate_fee(inputs.len(), TxShape::Sweep, fee_rate);
        if total <= fee {
            return Err(WalletError::FeeExceedsFunds(format!(
                "Estimated fee {} sats exceeds available {} sats",
                fee, total
            )));
        }

        let outputs = vec![TxOut {
            value: Amount::from_sat(total - fee),
            script_pubkey: dest_address.script_pubkey(),
        }];

        log::debug!(
            "Built sweep: {} inputs, {} sats out, {} sats fee",
            inputs.len(),
            total - fee,
            fee
        );
        let tx = assemble(&inputs, outputs)?;
        Ok(UnsignedTransaction { tx, inputs })
    }
}

fn assemble(inputs: &[UtxoEntry], outputs: Vec<TxOut>) -> Result<Transaction, WalletError> {
    let mut tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: Vec::with_capacity(inputs.len()),
        output: outputs,
    };

    for utxo in inputs {
        let txid = utxo
            .txid
            .parse()
            .map_err(|e| StorageError::Corrupt(format!("utxo txid {}: {}", utxo.txid, e)))?;
        tx.input.push(TxIn {
            previous_output: OutPoint {
                txid,
                vout: utxo.vout,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        });
    }

    Ok(tx)
}

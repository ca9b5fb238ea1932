//! UTXO cache reconciliation against the chain API.
//!
//! One pass walks every cached address in order (receive chain first, then
//! change), fetches the live UTXO set for each active address and converges
//! the local cache on it. The pass is strictly sequential: receiving into the
//! wallet's current address advances that chain's index, and the advanced
//! index decides whether later addresses in the same pass are queried at all.
//!
//! A pass is idempotent per address. On any fetch or persistence error the
//! whole pass aborts with that error; the caller simply re-runs it.

use uuid::Uuid;

use crate::chain::{ChainDataClient, FetchedUtxo};
use crate::error::{StorageError, WalletError};
use crate::keys::Chain;
use crate::store::models::{AddressEntry, UtxoEntry};
use crate::store::WalletRepository;

/// What one address's cache needs to converge with a fetch result.
///
/// Computed by [`diff_address`], which is pure so the branch logic is
/// testable without storage or network.
#[derive(Debug, Default)]
pub struct AddressDiff {
    /// Fetched outpoints with no cached counterpart.
    pub inserts: Vec<FetchedUtxo>,
    /// Cached rows whose confirmed flag changed, with the new value.
    pub confirm_updates: Vec<(Uuid, bool)>,
    /// Cached rows whose outpoint is gone from the fetch: spent.
    pub stale_deletes: Vec<Uuid>,
    /// The fetch came back empty for an address that had cached UTXOs; the
    /// address is fully drained and leaves the keypool.
    pub remove_address: bool,
}

/// Reconcile one address's cached UTXOs against a fresh fetch, by outpoint.
///
/// Every branch is per-outpoint, including deletion: a cached outpoint
/// missing from a non-empty fetch is a partial spend and is deleted just like
/// a full drain.
pub fn diff_address(cached: &[UtxoEntry], fetched: &[FetchedUtxo]) -> AddressDiff {
    let mut diff = AddressDiff::default();

    for remote in fetched {
        match cached.iter().find(|c| c.outpoint() == remote.outpoint()) {
            None => diff.inserts.push(remote.clone()),
            Some(local) if local.confirmed != remote.status.confirmed => {
                diff.confirm_updates.push((local.id, remote.status.confirmed));
            }
            Some(_) => {}
        }
    }

    for local in cached {
        if !fetched.iter().any(|r| r.outpoint() == local.outpoint()) {
            diff.stale_deletes.push(local.id);
        }
    }

    diff.remove_address = fetched.is_empty() && !cached.is_empty();
    diff
}

/// Counts from one reconciliation pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileSummary {
    pub addresses_checked: u32,
    pub utxos_inserted: u32,
    pub utxos_updated: u32,
    pub utxos_deleted: u32,
    pub addresses_pruned: u32,
}

pub struct UtxoReconciler<'a> {
    repo: &'a dyn WalletRepository,
    chain_client: &'a dyn ChainDataClient,
}

impl<'a> UtxoReconciler<'a> {
    pub fn new(repo: &'a dyn WalletRepository, chain_client: &'a dyn ChainDataClient) -> Self {
        Self { repo, chain_client }
    }

    /// Run one full pass. Must not run concurrently with another pass or a
    /// transaction build against the same wallet.
    pub async fn reconcile(&self) -> Result<ReconcileSummary, WalletError> {
        // Fresh ordered list per pass; the cursor is local to this call.
        let mut plan: Vec<(Chain, AddressEntry)> = Vec::new();
        for chain in Chain::ALL {
            for entry in self.repo.addresses(chain)? {
                plan.push((chain, entry));
            }
        }

        let mut summary = ReconcileSummary::default();

        for (chain, entry) in plan {
            // Re-read the wallet so index advances made earlier in this pass
            // are visible: eligibility depends on the live index.
            let wallet = self
                .repo
                .wallet()?
                .ok_or_else(|| StorageError::MissingRecord("wallet".to_string()))?;

            // Addresses beyond the current index are reserved lookahead and
            // have never been handed out; querying them is wasted calls.
            if entry.index > wallet.chain_index(chain) {
                continue;
            }

            let fetched = self.chain_client.utxos_for_address(&entry.address).await?;
            let cached = self.repo.utxos_for_address(&entry.address)?;
            let diff = diff_address(&cached, &fetched);

            self.apply(chain, &entry, diff, &mut summary)?;
            summary.addresses_checked += 1;
        }

        log::debug!(
            "Reconciled {} addresses: +{} utxos, ~{} updated, -{} deleted, {} addresses pruned",
            summary.addresses_checked,
            summary.utxos_inserted,
            summary.utxos_updated,
            summary.utxos_deleted,
            summary.addresses_pruned,
        );
        Ok(summary)
    }

    fn apply(
        &self,
        chain: Chain,
        entry: &AddressEntry,
        diff: AddressDiff,
        summary: &mut ReconcileSummary,
    ) -> Result<(), WalletError> {
        let inserted_any = !diff.inserts.is_empty();
        for remote in diff.inserts {
            let utxo = UtxoEntry {
                id: Uuid::new_v4(),
                txid: remote.txid,
                vout: remote.vout,
                value: remote.value,
                confirmed: remote.status.confirmed,
                address: entry.address.clone(),
                pubkey: entry.pubkey.clone(),
                derivation: entry.derivation.clone(),
            };
            self.repo.save_utxo(&utxo)?;
            summary.utxos_inserted += 1;
        }

        // Receiving into the current address moves the wallet forward so the
        // next refill derives beyond it. One check per address: a burst of
        // UTXOs landing on the same address advances the index exactly once.
        if inserted_any {
            let wallet = self
                .repo
                .wallet()?
                .ok_or_else(|| StorageError::MissingRecord("wallet".to_string()))?;
            if entry.index == wallet.chain_index(chain) {
                self.repo.set_chain_index(chain, entry.index + 1)?;
            }
        }

        for (id, confirmed) in diff.confirm_updates {
            self.repo.set_utxo_confirmed(id, confirmed)?;
            summary.utxos_updated += 1;
        }

        for id in diff.stale_deletes {
            self.repo.delete_utxo(id)?;
            summary.utxos_deleted += 1;
        }

        if diff.remove_address {
            log::debug!("Pruning drained address {} (index {})", entry.address, entry.index);
            self.repo.delete_address(chain, entry.id)?;
            summary.addresses_pruned += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::types::UtxoStatus;

    fn cached(txid: &str, vout: u32, confirmed: bool) -> UtxoEntry {
        UtxoEntry {
            id: Uuid::new_v4(),
            txid: txid.to_string(),
            vout,
            value: 1_000,
            confirmed,
            address: "tb1q-test".to_string(),
            pubkey: vec![],
            derivation: "m/84'/1'/0'/0/0".to_string(),
        }
    }

    fn fetched(txid: &str, vout: u32, confirmed: bool) -> FetchedUtxo {
        FetchedUtxo {
            txid: txid.to_string(),
            vout,
            value: 1_000,
            status: UtxoStatus { confirmed },
        }
    }

    #[test]
    fn test_empty_both_sides_is_noop() {
        let diff = diff_address(&[], &[]);
        assert!(diff.inserts.is_empty());
        assert!(diff.confirm_updates.is_empty());
        assert!(diff.stale_deletes.is_empty());
        assert!(!diff.remove_address);
    }

    #[test]
    fn test_new_utxos_are_inserts() {
        let diff = diff_address(&[], &[fetched("aa", 0, true), fetched("aa", 1, false)]);
        assert_eq!(diff.inserts.len(), 2);
        assert!(!diff.remove_address);
    }

    #[test]
    fn test_empty_fetch_drains_address() {
        let rows = [cached("aa", 0, true), cached("bb", 3, true)];
        let diff = diff_address(&rows, &[]);
        assert_eq!(diff.stale_deletes.len(), 2);
        assert!(diff.remove_address);
    }

    #[test]
    fn test_confirmation_update_detected() {
        let row = cached("aa", 0, false);
        let diff = diff_address(std::slice::from_ref(&row), &[fetched("aa", 0, true)]);
        assert!(diff.inserts.is_empty());
        assert_eq!(diff.confirm_updates, vec![(row.id, true)]);
        assert!(diff.stale_deletes.is_empty());
    }

    #[test]
    fn test_partial_spend_deletes_only_missing_outpoint() {
        let kept = cached("aa", 0, true);
        let spent = cached("aa", 1, true);
        let diff = diff_address(&[kept, spent.clone()], &[fetched("aa", 0, true)]);
        assert!(diff.inserts.is_empty());
        assert_eq!(diff.stale_deletes, vec![spent.id]);
        assert!(!diff.remove_address);
    }

    #[test]
    fn test_same_txid_different_vout_is_distinct() {
        let row = cached("aa", 0, true);
        let diff = diff_address(std::slice::from_ref(&row), &[fetched("aa", 1, true)]);
        assert_eq!(diff.inserts.len(), 1);
        assert_eq!(diff.stale_deletes, vec![row.id]);
    }
}

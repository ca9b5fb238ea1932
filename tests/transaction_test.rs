//! Transaction construction end to end: funding via a sync pass, building
//! and signing through the manager, decoding the resulting raw transaction.

mod common;

use std::str::FromStr;

use common::*;
use wallet_core::builder::{estimate_fee, TxShape};
use wallet_core::chain::RecommendedFees;
use wallet_core::error::WalletError;
use wallet_core::keys::Chain;
use wallet_core::store::WalletRepository;

#[tokio::test]
async fn test_payment_with_change() -> anyhow::Result<()> {
    let env = TestEnvironment::with_wallet().await?;
    let addr0 = env.address_at(Chain::Receive, 0);
    env.chain.fund(&addr0, &txid(1), 0, 100_000, true);
    env.manager.sync().await?;

    // One input, two outputs at 10 sats/vB: (272 + 290) / 4 * 10 = 1400.
    let signed = env.manager.build_payment(DEST, 50_000).await?;
    assert_eq!(signed.fee, 1_400);

    let tx = decode_tx(&signed.hex);
    assert_eq!(tx.input.len(), 1);
    assert_eq!(tx.output.len(), 2);
    assert_eq!(tx.output[0].value.to_sat(), 50_000);
    assert_eq!(tx.output[1].value.to_sat(), 48_600);

    let dest = bitcoin::Address::from_str(DEST)?.assume_checked();
    assert_eq!(tx.output[0].script_pubkey, dest.script_pubkey());
    Ok(())
}

#[tokio::test]
async fn test_change_returns_to_own_change_address() -> anyhow::Result<()> {
    let env = TestEnvironment::with_wallet().await?;
    let addr0 = env.address_at(Chain::Receive, 0);
    env.chain.fund(&addr0, &txid(1), 0, 100_000, true);
    env.manager.sync().await?;

    let signed = env.manager.build_payment(DEST, 50_000).await?;
    let tx = decode_tx(&signed.hex);

    let change_addr = env.address_at(Chain::Change, env.change_index());
    let change = bitcoin::Address::from_str(&change_addr)?.assume_checked();
    assert_eq!(tx.output[1].script_pubkey, change.script_pubkey());
    Ok(())
}

#[tokio::test]
async fn test_selection_spans_multiple_inputs() -> anyhow::Result<()> {
    let env = TestEnvironment::with_wallet().await?;
    let addr0 = env.address_at(Chain::Receive, 0);
    let addr1 = env.address_at(Chain::Receive, 1);
    env.chain.fund(&addr0, &txid(1), 0, 30_000, true);
    env.chain.fund(&addr1, &txid(2), 0, 30_000, true);
    env.manager.sync().await?;

    // Two inputs at 10 sats/vB: (544 + 290) / 4 * 10 = 2080.
    let signed = env.manager.build_payment(DEST, 50_000).await?;
    assert_eq!(signed.fee, 2_080);

    let tx = decode_tx(&signed.hex);
    assert_eq!(tx.input.len(), 2);
    assert_eq!(tx.output[1].value.to_sat(), 60_000 - 50_000 - 2_080);
    Ok(())
}

#[tokio::test]
async fn test_empty_wallet_payment_is_insufficient_funds() -> anyhow::Result<()> {
    let env = TestEnvironment::with_wallet().await?;
    assert!(matches!(
        env.manager.build_payment(DEST, 100_000).await,
        Err(WalletError::InsufficientFunds(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_unconfirmed_funds_not_selectable_but_sweepable() -> anyhow::Result<()> {
    let env = TestEnvironment::with_wallet().await?;
    let addr0 = env.address_at(Chain::Receive, 0);
    env.chain.fund(&addr0, &txid(1), 0, 100_000, false);
    env.manager.sync().await?;

    assert!(matches!(
        env.manager.build_payment(DEST, 10_000).await,
        Err(WalletError::InsufficientFunds(_))
    ));

    // Sweep takes the whole cache, unconfirmed included.
    let signed = env.manager.build_sweep(DEST).await?;
    let tx = decode_tx(&signed.hex);
    assert_eq!(tx.input.len(), 1);
    assert_eq!(tx.output.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_sweep_pays_total_minus_fee() -> anyhow::Result<()> {
    let env = TestEnvironment::with_wallet().await?;
    let addr0 = env.address_at(Chain::Receive, 0);
    env.chain.fund(&addr0, &txid(1), 0, 10_000, true);
    env.manager.sync().await?;
    env.chain.set_fees(RecommendedFees {
        fastest: 3,
        economy: 1,
        hour: 2,
        minimum: 1,
    });

    // One input, one output at 3 sats/vB: (272 + 166) / 4 * 3 = 327.
    let signed = env.manager.build_sweep(DEST).await?;
    assert_eq!(signed.fee, 327);

    let tx = decode_tx(&signed.hex);
    assert_eq!(tx.output.len(), 1);
    assert_eq!(tx.output[0].value.to_sat(), 10_000 - 327);
    Ok(())
}

#[tokio::test]
async fn test_sweep_of_dust_is_fee_exceeds_funds() -> anyhow::Result<()> {
    let env = TestEnvironment::with_wallet().await?;
    let addr0 = env.address_at(Chain::Receive, 0);
    env.chain.fund(&addr0, &txid(1), 0, 100, true);
    env.manager.sync().await?;

    assert!(matches!(
        env.manager.build_sweep(DEST).await,
        Err(WalletError::FeeExceedsFunds(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_wrong_network_destination_rejected() -> anyhow::Result<()> {
    let env = TestEnvironment::with_wallet().await?;
    let addr0 = env.address_at(Chain::Receive, 0);
    env.chain.fund(&addr0, &txid(1), 0, 100_000, true);
    env.manager.sync().await?;

    let mainnet = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    assert!(matches!(
        env.manager.build_payment(mainnet, 10_000).await,
        Err(WalletError::AddressInvalid(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_fee_matches_weight_model_for_actual_inputs() -> anyhow::Result<()> {
    let env = TestEnvironment::with_wallet().await?;
    let addr0 = env.address_at(Chain::Receive, 0);
    let addr1 = env.address_at(Chain::Receive, 1);
    env.chain.fund(&addr0, &txid(1), 0, 25_000, true);
    env.chain.fund(&addr1, &txid(2), 0, 25_000, true);
    env.manager.sync().await?;

    let signed = env.manager.build_payment(DEST, 40_000).await?;
    let tx = decode_tx(&signed.hex);
    assert_eq!(signed.fee, estimate_fee(tx.input.len(), TxShape::Payment, 10));
    Ok(())
}

#[tokio::test]
async fn test_broadcast_posts_signed_hex() -> anyhow::Result<()> {
    let env = TestEnvironment::with_wallet().await?;
    let addr0 = env.address_at(Chain::Receive, 0);
    env.chain.fund(&addr0, &txid(1), 0, 100_000, true);
    env.manager.sync().await?;

    let signed = env.manager.build_payment(DEST, 50_000).await?;
    let reported = env.manager.broadcast(&signed).await?;

    assert_eq!(reported, signed.txid.to_string());
    let posted = env.chain.broadcasts.lock().unwrap();
    assert_eq!(posted.as_slice(), &[signed.hex.clone()]);
    Ok(())
}

#[tokio::test]
async fn test_spent_inputs_disappear_after_next_sync() -> anyhow::Result<()> {
    let env = TestEnvironment::with_wallet().await?;
    let addr0 = env.address_at(Chain::Receive, 0);
    env.chain.fund(&addr0, &txid(1), 0, 100_000, true);
    env.manager.sync().await?;

    let signed = env.manager.build_payment(DEST, 50_000).await?;
    env.manager.broadcast(&signed).await?;

    // The chain now reports the input as spent.
    env.chain.clear(&addr0);
    env.manager.sync().await?;
    assert!(env.repo.utxos()?.is_empty());
    assert_eq!(env.manager.balance()?.confirmed, 0);
    Ok(())
}

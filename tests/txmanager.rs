//! End-to-end delivery tests against an in-memory chain on a paused clock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use txmanager::blockchain::ChainError;
use txmanager::config::ConfigError;
use txmanager::txmanager::{Delivery, TxError};
use txmanager::TxManager;

mod common;

use common::{fast_config, manager, manager_with_signer, transfer, FakeSigner, MockChain};

const WAIT: Duration = Duration::from_secs(3600);

#[tokio::test(start_paused = true)]
async fn test_sequential_sends_use_consecutive_nonces() {
    let chain = MockChain::new(100);
    chain.set_chain_nonce(7);
    let mgr = manager(&chain, fast_config());

    for value in 0..3 {
        mgr.async_send_tx(transfer(value), false, "", None).await.unwrap();
    }

    let nonces: Vec<u64> = chain.sent().iter().map(|s| s.tx.nonce).collect();
    assert_eq!(nonces, vec![7, 8, 9]);
    assert_eq!(chain.state().nonce_fetches, 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_sends_never_share_a_nonce() {
    let chain = MockChain::new(100);
    let mgr = manager(&chain, fast_config());

    let mut handles = Vec::new();
    for value in 0..16 {
        let mgr = mgr.clone();
        handles.push(tokio::spawn(async move {
            mgr.async_send_tx(transfer(value), false, "", None).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let nonces: HashSet<u64> = chain.sent().iter().map(|s| s.tx.nonce).collect();
    assert_eq!(nonces, (0..16).collect::<HashSet<u64>>());
}

#[tokio::test(start_paused = true)]
async fn test_missing_gas_fields_are_filled() {
    let chain = MockChain::new(123);
    let mgr = manager(&chain, fast_config());

    mgr.async_send_tx(transfer(1), false, "", None).await.unwrap();

    let sent = chain.sent();
    assert_eq!(sent[0].tx.gas_price, 123);
    assert_eq!(sent[0].tx.gas_limit, 21_000);
    assert_eq!(sent[0].tx.from, common::SENDER);
}

#[tokio::test(start_paused = true)]
async fn test_nonce_too_low_resets_cache() {
    let chain = MockChain::new(100);
    let mgr = manager(&chain, fast_config());

    mgr.async_send_tx(transfer(1), false, "", None).await.unwrap();

    // Another process used nonces 1..=4 meanwhile
    chain.set_chain_nonce(5);
    chain.reject_next_send(ChainError::NonceTooLow("nonce too low".into()));
    let err = mgr.async_send_tx(transfer(2), false, "", None).await.unwrap_err();
    assert!(matches!(err, TxError::Broadcast(ChainError::NonceTooLow(_))));
    assert!(err.to_string().starts_with("sendRawTransaction: "));

    mgr.async_send_tx(transfer(3), false, "", None).await.unwrap();
    let nonces: Vec<u64> = chain.sent().iter().map(|s| s.tx.nonce).collect();
    assert_eq!(nonces, vec![0, 5]);
    assert_eq!(chain.state().nonce_fetches, 2);
}

#[tokio::test(start_paused = true)]
async fn test_other_broadcast_failures_keep_cache() {
    let chain = MockChain::new(100);
    let mgr = manager(&chain, fast_config());

    chain.reject_next_send(ChainError::InsufficientFunds("insufficient funds".into()));
    let err = mgr.async_send_tx(transfer(1), false, "", None).await.unwrap_err();
    assert!(matches!(err, TxError::Broadcast(ChainError::InsufficientFunds(_))));

    mgr.async_send_tx(transfer(2), false, "", None).await.unwrap();
    assert_eq!(chain.sent()[0].tx.nonce, 1);
    assert_eq!(chain.state().nonce_fetches, 1);
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_waits_for_depth() {
    let chain = MockChain::new(100);
    let mut config = fast_config();
    config.confirm_height = 2;
    let mgr = manager(&chain, config);
    let mut confirms = mgr.subscribe_confirm_events();

    let hash = mgr
        .async_send_tx(transfer(1), false, "order-42", None)
        .await
        .unwrap();
    chain.mine(hash, 10, true);
    chain.set_head(10);

    sleep(Duration::from_secs(11)).await;
    assert!(confirms.try_recv().is_none());

    chain.set_head(11);
    sleep(Duration::from_secs(10)).await;
    assert!(confirms.try_recv().is_none());

    chain.set_head(12);
    let event = timeout(WAIT, confirms.recv()).await.unwrap().unwrap();
    assert_eq!(event.tx.hash, hash);
    assert_eq!(event.info, "order-42");

    sleep(Duration::from_secs(600)).await;
    assert!(confirms.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reverted_receipt_is_not_confirmed() {
    let chain = MockChain::new(100);
    let mut config = fast_config();
    config.period_secs = 60;
    let mgr = manager(&chain, config);
    let mut confirms = mgr.subscribe_confirm_events();
    let mut errors = mgr.subscribe_error_events();

    let hash = mgr.async_send_tx(transfer(1), false, "", None).await.unwrap();
    chain.mine(hash, 0, false);
    chain.set_head(50);

    let event = timeout(WAIT, errors.recv()).await.unwrap().unwrap();
    assert!(matches!(event.error, TxError::Timeout(_)));
    assert!(confirms.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_emits_single_timeout() {
    let chain = MockChain::new(100);
    let mut config = fast_config();
    config.period_secs = 60;
    let mgr = manager(&chain, config);
    let mut confirms = mgr.subscribe_confirm_events();
    let mut errors = mgr.subscribe_error_events();

    let hash = mgr.async_send_tx(transfer(1), false, "", None).await.unwrap();

    let event = timeout(WAIT, errors.recv()).await.unwrap().unwrap();
    assert_eq!(event.tx.hash, hash);
    assert!(matches!(event.error, TxError::Timeout(d) if d == Duration::from_secs(60)));

    // Mining after the deadline changes nothing
    chain.mine(hash, 0, true);
    sleep(Duration::from_secs(600)).await;
    assert!(errors.try_recv().is_none());
    assert!(confirms.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_sync_send_returns_confirmation() {
    let chain = MockChain::new(100);
    chain.state().mine_on_send = true;
    let mgr = manager(&chain, fast_config());
    let mut confirms = mgr.subscribe_confirm_events();

    let delivery = mgr
        .sync_send_tx(transfer(1), false, "payout-1", None)
        .await
        .unwrap();

    let Delivery::Confirmed(event) = &delivery else {
        panic!("expected confirmation, got {delivery:?}");
    };
    assert_eq!(event.info, "payout-1");
    assert_eq!(event.tx.hash, chain.sent()[0].hash);

    let report = delivery.report();
    assert_eq!(report.status, "confirmed");
    assert_eq!(report.gas_price, "100");

    let published = confirms.try_recv().unwrap();
    assert_eq!(published.tx.hash, event.tx.hash);
}

#[tokio::test(start_paused = true)]
async fn test_sync_send_reports_timeout() {
    let chain = MockChain::new(100);
    let mut config = fast_config();
    config.period_secs = 45;
    let mgr = manager(&chain, config);

    let delivery = mgr.sync_send_tx(transfer(1), false, "", None).await.unwrap();

    let Delivery::Failed(event) = &delivery else {
        panic!("expected failure, got {delivery:?}");
    };
    assert!(matches!(event.error, TxError::Timeout(_)));
    assert_eq!(delivery.report().status, "failed");
}

#[tokio::test(start_paused = true)]
async fn test_fee_escalation_is_monotonic_and_bounded() {
    let chain = MockChain::new(100);
    let mgr = manager(&chain, fast_config());
    let mut errors = mgr.subscribe_error_events();

    mgr.async_send_tx(transfer(1), false, "", Some(250))
        .await
        .unwrap();

    // Market barely moved: the 10% premium wins
    chain.set_gas_price(105);
    sleep(Duration::from_secs(31)).await;
    assert_eq!(chain.sent_prices(), vec![100, 110]);

    // Market jumped past the premium: follow it
    chain.set_gas_price(200);
    sleep(Duration::from_secs(30)).await;
    assert_eq!(chain.sent_prices(), vec![100, 110, 200]);

    chain.set_gas_price(300);
    let event = timeout(WAIT, errors.recv()).await.unwrap().unwrap();
    assert!(matches!(
        event.error,
        TxError::OverPriceLimit {
            limit: 250,
            price: 300
        }
    ));
    assert_eq!(event.tx.tx.gas_price, 200);

    let sent = chain.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|s| s.tx.nonce == 0));
    assert!(sent.iter().all(|s| s.tx.gas_price <= 250));
}

#[tokio::test(start_paused = true)]
async fn test_falling_market_keeps_current_price() {
    let chain = MockChain::new(100);
    let mgr = manager(&chain, fast_config());

    mgr.async_send_tx(transfer(1), false, "", None).await.unwrap();
    chain.set_gas_price(80);
    sleep(Duration::from_secs(100)).await;
    chain.set_gas_price(100);
    sleep(Duration::from_secs(100)).await;

    assert_eq!(chain.sent_prices(), vec![100]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_estimate_is_retried_next_tick() {
    let chain = MockChain::new(100);
    let mgr = manager(&chain, fast_config());

    let mut tx = transfer(1);
    tx.gas_limit = 50_000;
    mgr.async_send_tx(tx, true, "", None).await.unwrap();
    assert_eq!(chain.state().estimate_calls, 0);

    chain.set_gas_price(200);
    chain.state().failing_estimates = 1;

    sleep(Duration::from_secs(31)).await;
    assert_eq!(chain.sent().len(), 1);

    sleep(Duration::from_secs(30)).await;
    let sent = chain.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].tx.gas_limit, 21_000);
    assert_eq!(sent[1].tx.gas_price, 200);
    assert_eq!(chain.state().estimate_calls, 2);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_replacement_keeps_previous_variant() {
    let chain = MockChain::new(100);
    let mgr = manager(&chain, fast_config());

    mgr.async_send_tx(transfer(1), false, "", None).await.unwrap();
    chain.set_gas_price(150);
    chain.reject_next_send(ChainError::Underpriced("replacement transaction underpriced".into()));

    sleep(Duration::from_secs(31)).await;
    assert_eq!(chain.sent_prices(), vec![100]);

    // Retried from the committed price on the next tick
    sleep(Duration::from_secs(30)).await;
    assert_eq!(chain.sent_prices(), vec![100, 150]);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_variant_can_confirm() {
    let chain = MockChain::new(100);
    let mgr = manager(&chain, fast_config());
    let mut confirms = mgr.subscribe_confirm_events();

    let first = mgr.async_send_tx(transfer(1), false, "", None).await.unwrap();
    chain.set_gas_price(150);
    sleep(Duration::from_secs(31)).await;
    assert_eq!(chain.sent().len(), 2);

    // The block producer picked up the first variant before the replacement
    chain.mine(first, 0, true);
    let event = timeout(WAIT, confirms.recv()).await.unwrap().unwrap();
    assert_eq!(event.tx.hash, first);
    assert_eq!(event.tx.tx.gas_price, 100);
}

#[tokio::test(start_paused = true)]
async fn test_zero_intervals_are_rejected_up_front() {
    let chain = MockChain::new(100);

    let mut config = fast_config();
    config.change_interval_secs = 0;
    let result = TxManager::new(config, chain.clone(), Arc::new(FakeSigner::default()));
    let Err(ConfigError::Validation(errors)) = result else {
        panic!("zero change interval accepted");
    };
    assert_eq!(errors[0].field, "txmanager.change_interval_secs");

    let mut config = fast_config();
    config.listen_interval_secs = 0;
    assert!(TxManager::new(config, chain.clone(), Arc::new(FakeSigner::default())).is_err());
    assert!(chain.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_sync_send_stops_polling() {
    let chain = MockChain::new(100);
    let mgr = manager(&chain, fast_config());

    let waited = timeout(
        Duration::from_secs(15),
        mgr.sync_send_tx(transfer(1), false, "", None),
    )
    .await;
    assert!(waited.is_err());
    let queries = chain.state().receipt_queries;
    assert_eq!(queries, 1);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(chain.state().receipt_queries, queries);
}

#[tokio::test(start_paused = true)]
async fn test_signing_failure_does_not_consume_nonce() {
    let chain = MockChain::new(100);
    let signer = Arc::new(FakeSigner::default());
    let mgr = manager_with_signer(&chain, fast_config(), signer.clone());

    mgr.async_send_tx(transfer(1), false, "", None).await.unwrap();

    signer.fail_next();
    let err = mgr.async_send_tx(transfer(2), false, "", None).await.unwrap_err();
    assert!(matches!(err, TxError::Sign(ChainError::Wallet(_))));

    mgr.async_send_tx(transfer(3), false, "", None).await.unwrap();
    let nonces: Vec<u64> = chain.sent().iter().map(|s| s.tx.nonce).collect();
    assert_eq!(nonces, vec![0, 1]);
    assert_eq!(chain.state().nonce_fetches, 1);
}

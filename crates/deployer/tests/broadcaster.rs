mod common;

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use common::{FakeL1Client, addr};
use ethereum_types::U256;
use op_deployer_core::{
    broadcaster::{Broadcast, Broadcaster, BroadcasterError, KeyedBroadcaster},
    signer::{LocalSigner, TxSigner, keccak},
};
use tokio_util::sync::CancellationToken;

const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

fn broadcast(to: u64, data: &'static [u8]) -> Broadcast {
    Broadcast {
        to: Some(addr(to)),
        input: Bytes::from_static(data),
        value: U256::zero(),
    }
}

fn keyed(client: Arc<FakeL1Client>) -> KeyedBroadcaster {
    let signer: Arc<dyn TxSigner> = Arc::new(LocalSigner::from_hex(DEV_KEY).unwrap());
    KeyedBroadcaster::new(client, signer, 900).with_receipt_poll_interval(Duration::from_millis(1))
}

/// Decodes the nonce of a signed type-2 envelope.
fn nonce_of(raw: &[u8]) -> u64 {
    assert_eq!(raw[0], 0x02);
    rlp::Rlp::new(&raw[1..]).val_at(1).unwrap()
}

#[tokio::test]
async fn sends_pending_calls_with_sequential_nonces() {
    let client = Arc::new(FakeL1Client::new(900));
    let broadcaster = keyed(client.clone());
    broadcaster.hook(broadcast(1, b"\x01"));
    broadcaster.hook(broadcast(2, b"\x02"));

    let results = broadcaster
        .broadcast(&CancellationToken::new())
        .await
        .unwrap();

    let sent = client.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(nonce_of(&sent[0]), 5);
    assert_eq!(nonce_of(&sent[1]), 6);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].tx_hash, keccak(&sent[0]));
    assert_eq!(results[1].broadcast, broadcast(2, b"\x02"));
    assert!(results.iter().all(|r| r.receipt.succeeded()));

    // Everything was drained by the first flush.
    let again = broadcaster
        .broadcast(&CancellationToken::new())
        .await
        .unwrap();
    assert!(again.is_empty());
    assert_eq!(client.sent().len(), 2);
}

#[tokio::test]
async fn reverted_receipt_fails_the_broadcast() {
    let mut client = FakeL1Client::new(900);
    client.receipt_status = 0;
    let client = Arc::new(client);
    let broadcaster = keyed(client.clone());
    broadcaster.hook(broadcast(1, b"\xde\xad"));

    let err = broadcaster
        .broadcast(&CancellationToken::new())
        .await
        .unwrap_err();

    let tx_hash = keccak(&client.sent()[0]);
    assert!(matches!(err, BroadcasterError::Reverted { tx_hash: hash } if hash == tx_hash));
}

#[tokio::test]
async fn head_without_base_fee_is_rejected() {
    let mut client = FakeL1Client::new(900);
    client.head.base_fee_per_gas = None;
    let client = Arc::new(client);
    let broadcaster = keyed(client.clone());
    broadcaster.hook(broadcast(1, b"\x01"));

    let err = broadcaster
        .broadcast(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BroadcasterError::MissingBaseFee));
    assert!(client.sent().is_empty());
}

#[tokio::test]
async fn cancelled_broadcast_sends_nothing() {
    let client = Arc::new(FakeL1Client::new(900));
    let broadcaster = keyed(client.clone());
    broadcaster.hook(broadcast(1, b"\x01"));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = broadcaster.broadcast(&cancel).await.unwrap_err();

    assert!(matches!(err, BroadcasterError::Cancelled));
    assert!(client.sent().is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_a_stalled_rpc_call() {
    let mut client = FakeL1Client::new(900);
    client.stall_nonce = true;
    let client = Arc::new(client);
    let broadcaster = keyed(client.clone());
    broadcaster.hook(broadcast(1, b"\x01"));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(3), broadcaster.broadcast(&cancel))
        .await
        .expect("broadcast ignored cancellation");

    assert!(matches!(result, Err(BroadcasterError::Cancelled)));
    assert!(client.sent().is_empty());
}

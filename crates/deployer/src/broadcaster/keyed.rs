use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use ethereum_types::H256;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    Broadcast, BroadcastResult, Broadcaster, BroadcasterError, DEFAULT_GAS_LIMIT,
    estimate_gas_prices,
};
use crate::{
    rpc::{L1Client, TxReceipt},
    signer::{Eip1559Transaction, TxSigner},
};

const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

async fn or_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, BroadcasterError>>,
) -> Result<T, BroadcasterError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BroadcasterError::Cancelled),
        result = fut => result,
    }
}

/// Signs recorded calls with a local key and sends them to L1.
pub struct KeyedBroadcaster {
    client: Arc<dyn L1Client>,
    signer: Arc<dyn TxSigner>,
    chain_id: u64,
    pending: Mutex<Vec<Broadcast>>,
    receipt_poll_interval: Duration,
}

impl KeyedBroadcaster {
    pub fn new(client: Arc<dyn L1Client>, signer: Arc<dyn TxSigner>, chain_id: u64) -> Self {
        Self {
            client,
            signer,
            chain_id,
            pending: Mutex::new(Vec::new()),
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
        }
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        cancel: &CancellationToken,
    ) -> Result<TxReceipt, BroadcasterError> {
        loop {
            let receipt = tokio::select! {
                receipt = self.client.transaction_receipt(tx_hash) => {
                    receipt.map_err(|source| BroadcasterError::Receipt { tx_hash, source })?
                }
                _ = cancel.cancelled() => return Err(BroadcasterError::Cancelled),
            };
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            tokio::select! {
                _ = tokio::time::sleep(self.receipt_poll_interval) => {}
                _ = cancel.cancelled() => return Err(BroadcasterError::Cancelled),
            }
        }
    }
}

#[async_trait]
impl Broadcaster for KeyedBroadcaster {
    fn hook(&self, broadcast: Broadcast) {
        match self.pending.lock() {
            Ok(mut pending) => pending.push(broadcast),
            Err(poisoned) => poisoned.into_inner().push(broadcast),
        }
    }

    async fn broadcast(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<BroadcastResult>, BroadcasterError> {
        let pending = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let sender = self.signer.address();
        let mut nonce = or_cancelled(cancel, async {
            self.client
                .pending_nonce_at(sender)
                .await
                .map_err(BroadcasterError::Nonce)
        })
        .await?;
        let prices = or_cancelled(cancel, estimate_gas_prices(self.client.as_ref())).await?;

        info!(count = pending.len(), sender = %format!("{sender:#x}"), "broadcasting transactions");

        let mut sent = Vec::with_capacity(pending.len());
        for (index, broadcast) in pending.into_iter().enumerate() {
            let tx = Eip1559Transaction {
                chain_id: self.chain_id,
                nonce,
                max_priority_fee_per_gas: prices.tip,
                max_fee_per_gas: prices.fee_cap(),
                gas_limit: DEFAULT_GAS_LIMIT,
                to: broadcast.to,
                value: broadcast.value,
                data: broadcast.input.clone(),
            };
            let raw = self.signer.sign(&tx)?;
            let tx_hash = or_cancelled(cancel, async {
                self.client
                    .send_raw_transaction(&raw)
                    .await
                    .map_err(|source| BroadcasterError::Send { index, source })
            })
            .await?;
            debug!(tx_hash = %format!("{tx_hash:#x}"), nonce, "transaction sent");
            sent.push((broadcast, tx_hash));
            nonce += 1;
        }

        let mut results = Vec::with_capacity(sent.len());
        for (broadcast, tx_hash) in sent {
            let receipt = self.wait_for_receipt(tx_hash, cancel).await?;
            if !receipt.succeeded() {
                return Err(BroadcasterError::Reverted { tx_hash });
            }
            info!(tx_hash = %format!("{tx_hash:#x}"), block = receipt.block_number, "transaction confirmed");
            results.push(BroadcastResult {
                broadcast,
                tx_hash,
                receipt,
            });
        }
        Ok(results)
    }
}

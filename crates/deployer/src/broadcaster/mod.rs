//! Sinks for the ledger calls recorded while running deployment scripts.

mod calldata;
mod gas_estimator;
mod keyed;
mod noop;

use async_trait::async_trait;
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{rpc::RpcError, rpc::TxReceipt, signer::SignerError};

pub use calldata::{CalldataBroadcaster, CalldataDump};
pub use gas_estimator::{GasPrices, estimate_gas_prices, pad_gas_prices};
pub use keyed::KeyedBroadcaster;
pub use noop::NoopBroadcaster;

/// Gas limit attached to every recorded call.
pub const DEFAULT_GAS_LIMIT: u64 = 30_000_000;

/// A pending call emitted by the scripting engine. `to` is `None` for
/// contract creations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast {
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(with = "crate::serde_utils::bytes")]
    pub input: Bytes,
    #[serde(default)]
    pub value: U256,
}

#[derive(Debug, Clone)]
pub struct BroadcastResult {
    pub broadcast: Broadcast,
    pub tx_hash: H256,
    pub receipt: TxReceipt,
}

#[derive(Debug, thiserror::Error)]
pub enum BroadcasterError {
    #[error("failed to get block: {0}")]
    Header(#[source] RpcError),
    #[error("failed to get gas tip cap: {0}")]
    GasTip(#[source] RpcError),
    #[error("head block has no base fee")]
    MissingBaseFee,
    #[error("failed to get nonce: {0}")]
    Nonce(#[source] RpcError),
    #[error("failed to send transaction {index}: {source}")]
    Send {
        index: usize,
        #[source]
        source: RpcError,
    },
    #[error("failed to get receipt for {tx_hash:#x}: {source}")]
    Receipt {
        tx_hash: H256,
        #[source]
        source: RpcError,
    },
    #[error("transaction {tx_hash:#x} reverted")]
    Reverted { tx_hash: H256 },
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error("broadcast cancelled")]
    Cancelled,
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Records a call produced by a script run.
    fn hook(&self, broadcast: Broadcast);

    /// Dispatches everything recorded since the previous call.
    async fn broadcast(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<BroadcastResult>, BroadcasterError>;
}

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{Broadcast, BroadcastResult, Broadcaster, BroadcasterError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalldataDump {
    pub to: Option<Address>,
    #[serde(with = "crate::serde_utils::bytes")]
    pub data: Bytes,
    pub value: Option<U256>,
}

/// Records calls without sending them so they can be executed out of band.
#[derive(Debug, Default)]
pub struct CalldataBroadcaster {
    txs: Mutex<Vec<Broadcast>>,
}

impl CalldataBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the recorded calls in the order they were hooked.
    pub fn dump(&self) -> Vec<CalldataDump> {
        let txs = match self.txs.lock() {
            Ok(mut txs) => std::mem::take(&mut *txs),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        txs.into_iter()
            .map(|tx| CalldataDump {
                to: tx.to,
                data: tx.input,
                value: Some(tx.value),
            })
            .collect()
    }
}

#[async_trait]
impl Broadcaster for CalldataBroadcaster {
    fn hook(&self, broadcast: Broadcast) {
        match self.txs.lock() {
            Ok(mut txs) => txs.push(broadcast),
            Err(poisoned) => poisoned.into_inner().push(broadcast),
        }
    }

    async fn broadcast(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<Vec<BroadcastResult>, BroadcasterError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(to: Option<u64>, data: &'static [u8], value: u64) -> Broadcast {
        Broadcast {
            to: to.map(Address::from_low_u64_be),
            input: Bytes::from_static(data),
            value: U256::from(value),
        }
    }

    #[tokio::test]
    async fn dump_preserves_order_and_drains() {
        let bcaster = CalldataBroadcaster::new();
        bcaster.hook(call(Some(0x01), &[0x01], 0));
        bcaster.hook(call(None, &[0x60, 0x80], 0));
        bcaster.hook(call(Some(0x02), &[0x03], 7));

        let results = bcaster.broadcast(&CancellationToken::new()).await.unwrap();
        assert!(results.is_empty());

        let dump = bcaster.dump();
        assert_eq!(
            dump,
            vec![
                CalldataDump {
                    to: Some(Address::from_low_u64_be(0x01)),
                    data: Bytes::from_static(&[0x01]),
                    value: Some(U256::zero()),
                },
                CalldataDump {
                    to: None,
                    data: Bytes::from_static(&[0x60, 0x80]),
                    value: Some(U256::zero()),
                },
                CalldataDump {
                    to: Some(Address::from_low_u64_be(0x02)),
                    data: Bytes::from_static(&[0x03]),
                    value: Some(U256::from(7)),
                },
            ]
        );
        assert!(bcaster.dump().is_empty());
    }

    #[test]
    fn dump_json_format() {
        let bcaster = CalldataBroadcaster::new();
        bcaster.hook(call(None, &[0xde, 0xad], 1));
        let json = serde_json::to_value(bcaster.dump()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "to": null, "data": "0xdead", "value": "0x1" }])
        );
    }
}

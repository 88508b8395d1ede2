use ethereum_types::U256;

use super::BroadcasterError;
use crate::rpc::L1Client;

const GWEI: u64 = 1_000_000_000;

/// Lower bound for the suggested tip.
pub const MIN_TIP: u64 = GWEI;
/// Upper bound for the suggested tip.
pub const MAX_TIP: u64 = 50 * GWEI;
const TIP_MULTIPLIER: u64 = 5;
/// The deployer never posts blobs.
const DUMMY_BLOB_FEE: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPrices {
    pub tip: U256,
    pub base_fee: U256,
    pub blob_fee: U256,
}

impl GasPrices {
    /// `maxFeePerGas` for a transaction priced with these values.
    pub fn fee_cap(&self) -> U256 {
        self.tip.saturating_add(self.base_fee.saturating_mul(U256::from(2)))
    }
}

/// Pads the head base fee by 50% and multiplies the suggested tip by five,
/// keeping the tip between 1 and 50 gwei.
pub fn pad_gas_prices(base_fee: U256, suggested_tip: U256) -> GasPrices {
    let padded_base_fee = base_fee.saturating_add(base_fee / 2);
    let padded_tip = suggested_tip
        .saturating_mul(U256::from(TIP_MULTIPLIER))
        .clamp(U256::from(MIN_TIP), U256::from(MAX_TIP));

    GasPrices {
        tip: padded_tip,
        base_fee: padded_base_fee,
        blob_fee: U256::from(DUMMY_BLOB_FEE),
    }
}

pub async fn estimate_gas_prices(client: &dyn L1Client) -> Result<GasPrices, BroadcasterError> {
    let head = client
        .latest_header()
        .await
        .map_err(BroadcasterError::Header)?;
    let base_fee = head.base_fee_per_gas.ok_or(BroadcasterError::MissingBaseFee)?;
    let tip = client
        .suggest_gas_tip_cap()
        .await
        .map_err(BroadcasterError::GasTip)?;
    Ok(pad_gas_prices(base_fee, tip))
}

use std::time::{SystemTime, UNIX_EPOCH};

use rlp::RlpStream;
use tracing::{info, warn};

use super::{Env, StageError};
use crate::{
    signer::keccak,
    state::{Allocs, L1DevGenesis, L1DevGenesisParams, State},
};

const DEFAULT_L1_GAS_LIMIT: u64 = 30_000_000;

pub(super) async fn seal_l1_dev_genesis(env: &Env, st: &mut State) -> Result<(), StageError> {
    info!(stage = "seal-l1-dev-genesis", "Sealing L1 dev genesis");

    let params = match &env.intent.l1_dev_genesis_params {
        Some(params) => params.clone(),
        None => {
            warn!("Using dev L1 genesis without any customization");
            L1DevGenesisParams::default()
        }
    };

    let dump = env
        .l1_host
        .state_dump()
        .await
        .map_err(StageError::script("failed to dump L1 state"))?;

    let mut timestamp = params.block_params.timestamp;
    if timestamp == 0 {
        timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StageError::Seal(e.to_string()))?
            .as_secs();
        warn!(timestamp, "Dynamically determined dev L1 genesis timestamp");
    }

    let genesis = seal(env.intent.l1_chain_id, &params, timestamp, &dump)?;
    info!(
        block_hash = ?genesis.block_hash,
        state_hash = ?genesis.state_hash,
        "Sealed L1 dev genesis"
    );
    st.l1_state_dump = Some(dump);
    st.l1_dev_genesis = Some(genesis);
    Ok(())
}

/// Commits to the dumped accounts and the block parameters. The state hash
/// is the keccak digest of the canonical JSON dump; the block hash covers
/// the header fields and the state hash.
fn seal(
    chain_id: u64,
    params: &L1DevGenesisParams,
    timestamp: u64,
    dump: &Allocs,
) -> Result<L1DevGenesis, StageError> {
    let encoded = serde_json::to_vec(dump).map_err(|e| StageError::Seal(e.to_string()))?;
    let state_hash = keccak(&encoded);
    let prague_time = params.prague_time_offset.map(|offset| timestamp + offset);
    let gas_limit = match params.block_params.gas_limit {
        0 => DEFAULT_L1_GAS_LIMIT,
        limit => limit,
    };

    let mut header = RlpStream::new_list(6);
    header
        .append(&chain_id)
        .append(&timestamp)
        .append(&gas_limit)
        .append(&params.block_params.excess_blob_gas)
        .append(&prague_time.unwrap_or_default())
        .append(&state_hash);
    let block_hash = keccak(&header.out());

    Ok(L1DevGenesis {
        chain_id,
        timestamp,
        gas_limit,
        excess_blob_gas: params.block_params.excess_blob_gas,
        prague_time,
        state_hash,
        block_hash,
    })
}

#[cfg(test)]
mod tests {
    use ethereum_types::{Address, U256};

    use super::*;
    use crate::state::GenesisAccount;

    #[test]
    fn seal_is_deterministic_and_covers_state() {
        let params = L1DevGenesisParams {
            prague_time_offset: Some(10),
            ..Default::default()
        };
        let mut dump = Allocs::new();
        dump.insert(
            Address::repeat_byte(1),
            GenesisAccount {
                balance: U256::from(1000u64),
                ..Default::default()
            },
        );

        let a = seal(900, &params, 1_700_000_000, &dump).unwrap();
        let b = seal(900, &params, 1_700_000_000, &dump).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.prague_time, Some(1_700_000_010));
        assert_eq!(a.gas_limit, DEFAULT_L1_GAS_LIMIT);
        assert_eq!(a.block_ref().hash, a.block_hash);

        dump.get_mut(&Address::repeat_byte(1)).unwrap().balance = U256::from(1u64);
        let c = seal(900, &params, 1_700_000_000, &dump).unwrap();
        assert_ne!(a.state_hash, c.state_hash);
        assert_ne!(a.block_hash, c.block_hash);
    }
}

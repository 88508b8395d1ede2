use ethereum_types::H256;
use tracing::info;

use super::{Env, StageError};
use crate::state::{L1BlockRef, State};

pub(super) async fn set_start_block(env: &Env, st: &mut State, id: H256) -> Result<(), StageError> {
    if env.target.is_genesis() {
        set_start_block_genesis(st, id)
    } else {
        set_start_block_live(env, st, id).await
    }
}

async fn set_start_block_live(env: &Env, st: &mut State, id: H256) -> Result<(), StageError> {
    info!(
        stage = "set-start-block",
        strategy = "live",
        id = %format!("{id:#x}"),
        "Setting start block"
    );
    let chain = env.intent.chain(id)?;
    let chain_state = st.chain_mut(id)?;
    let client = env.require_l1_client("live")?;

    let header = env
        .cancellable(async {
            match chain.l1_start_block_hash {
                Some(hash) => client.header_by_hash(hash).await,
                None => client.latest_header().await,
            }
            .map_err(StageError::rpc("failed to get L1 block header for block"))
        })
        .await?;
    chain_state.start_block = Some(L1BlockRef::from(&header));
    Ok(())
}

fn set_start_block_genesis(st: &mut State, id: H256) -> Result<(), StageError> {
    info!(
        stage = "set-start-block",
        strategy = "genesis",
        id = %format!("{id:#x}"),
        "Setting start block"
    );
    let start_block = st
        .l1_dev_genesis
        .as_ref()
        .ok_or(StageError::UnsealedL1Genesis)?
        .block_ref();
    st.chain_mut(id)?.start_block = Some(start_block);
    Ok(())
}

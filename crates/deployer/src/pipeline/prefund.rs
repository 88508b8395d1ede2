//! Development genesis stages that seed balances and predeploys.

use ethereum_types::H256;
use tracing::{info, warn};

use super::{Env, StageError};
use crate::{opcm, state::State};

pub(super) async fn prefund_l2_dev_genesis(
    env: &Env,
    st: &mut State,
    id: H256,
) -> Result<(), StageError> {
    info!(stage = "prefund-l2-dev-genesis", "Prefunding accounts in L2 dev genesis");
    let chain = env.intent.chain(id)?;
    let chain_state = st.chain_mut(id)?;

    let Some(params) = &chain.l2_dev_genesis_params else {
        warn!("No L2 dev params, will not prefund any accounts");
        return Ok(());
    };
    if params.prefund.is_empty() {
        warn!("Not prefunding any L2 dev accounts. L2 dev genesis may not be usable.");
        return Ok(());
    }

    let allocs = chain_state
        .allocs
        .as_mut()
        .ok_or(StageError::MissingAllocs(id))?;
    for (address, amount) in &params.prefund {
        allocs.entry(*address).or_default().balance = *amount;
    }
    info!(accounts = params.prefund.len(), "Prefunded dev accounts on L2");
    Ok(())
}

pub(super) async fn prefund_l1_dev_genesis(env: &Env, _st: &mut State) -> Result<(), StageError> {
    info!(stage = "prefund-l1-dev-genesis", "Prefunding accounts in L1 dev genesis");

    let Some(params) = &env.intent.l1_dev_genesis_params else {
        warn!("No L1 dev params, will not prefund any accounts");
        return Ok(());
    };
    if params.prefund.is_empty() {
        warn!("Not prefunding any L1 dev accounts. L1 dev genesis may not be usable.");
        return Ok(());
    }

    for (address, amount) in &params.prefund {
        env.l1_host
            .set_balance(*address, *amount)
            .await
            .map_err(StageError::script("failed to prefund L1 account"))?;
    }
    info!(accounts = params.prefund.len(), "Prefunded dev accounts on L1");
    Ok(())
}

pub(super) async fn preinstall_l1_dev_genesis(
    env: &Env,
    _st: &mut State,
) -> Result<(), StageError> {
    info!(stage = "preinstall-l1-dev-genesis", "Adding preinstalls to L1 dev genesis");
    opcm::insert_preinstalls(env.l1_host.as_ref())
        .await
        .map_err(StageError::script("failed to add preinstalls to L1 dev state"))?;
    env.l1_host
        .wipe(env.deployer)
        .await
        .map_err(StageError::script("failed to wipe deployer from L1 state"))?;
    Ok(())
}

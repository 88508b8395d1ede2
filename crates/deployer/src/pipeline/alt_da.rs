use ethereum_types::H256;
use tracing::info;

use super::{Env, StageError};
use crate::{
    opcm::{self, DeployAltDaInput},
    state::State,
};

pub(super) async fn deploy_alt_da(env: &Env, st: &mut State, id: H256) -> Result<(), StageError> {
    let chain = env.intent.chain(id)?;
    let salt = st.create2_salt;
    let chain_state = st.chain_mut(id)?;

    let alt_da = &chain.dangerous_alt_da_config;
    if !alt_da.uses_keccak_commitments() || !chain_state.contracts.alt_da_challenge_impl.is_zero() {
        info!(stage = "deploy-alt-da", "Alt-DA deployment not needed");
        return Ok(());
    }
    info!(stage = "deploy-alt-da", "Deploying alt-DA contracts");

    let out = opcm::deploy_alt_da(
        env.l1_host.as_ref(),
        &DeployAltDaInput {
            salt,
            proxy_admin: chain_state.contracts.op_chain_proxy_admin_impl,
            challenge_contract_owner: chain.roles.l1_proxy_admin_owner,
            challenge_window: alt_da.da_challenge_window,
            resolve_window: alt_da.da_resolve_window,
            bond_size: alt_da.da_bond_size,
            resolver_refund_percentage: alt_da.da_resolver_refund_percentage,
        },
    )
    .await
    .map_err(StageError::script("failed to deploy alt-da contracts"))?;

    chain_state.contracts.alt_da_challenge_proxy = out.data_availability_challenge_proxy;
    chain_state.contracts.alt_da_challenge_impl = out.data_availability_challenge_impl;
    Ok(())
}

use tracing::info;

use super::{Env, StageError};
use crate::{
    opcm::{self, DeploySuperchainInput, OP_STACK_SUPPORT},
    state::{State, SuperchainContracts},
};

pub(super) async fn deploy_superchain(env: &Env, st: &mut State) -> Result<(), StageError> {
    if st.superchain_deployment.is_some() {
        info!(stage = "deploy-superchain", "Superchain deployment not needed");
        return Ok(());
    }
    info!(stage = "deploy-superchain", "Deploying superchain");

    let roles = env
        .intent
        .superchain_roles
        .clone()
        .ok_or(StageError::MissingSuperchainRoles)?;

    let out = opcm::deploy_superchain(
        env.l1_host.as_ref(),
        &DeploySuperchainInput {
            superchain_proxy_admin_owner: roles.superchain_proxy_admin_owner,
            protocol_versions_owner: roles.protocol_versions_owner,
            guardian: roles.superchain_guardian,
            paused: false,
            required_protocol_version: OP_STACK_SUPPORT,
            recommended_protocol_version: OP_STACK_SUPPORT,
        },
    )
    .await
    .map_err(StageError::script("failed to deploy superchain"))?;

    st.superchain_deployment = Some(SuperchainContracts {
        superchain_proxy_admin_impl: out.superchain_proxy_admin,
        superchain_config_proxy: out.superchain_config_proxy,
        superchain_config_impl: out.superchain_config_impl,
        protocol_versions_proxy: out.protocol_versions_proxy,
        protocol_versions_impl: out.protocol_versions_impl,
    });
    st.superchain_roles = Some(roles);
    Ok(())
}

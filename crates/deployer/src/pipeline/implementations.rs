use tracing::info;

use super::{Env, StageError};
use crate::{
    opcm::{self, DeployImplementationsInput},
    state::{ImplementationsContracts, State, SuperchainProofParams, merge_overrides},
};

pub(super) async fn deploy_implementations(env: &Env, st: &mut State) -> Result<(), StageError> {
    if st.implementations_deployment.is_some() {
        info!(
            stage = "deploy-implementations",
            "Implementations deployment not needed"
        );
        return Ok(());
    }
    info!(stage = "deploy-implementations", "Deploying implementations");

    let intent = &env.intent;
    let superchain = st
        .superchain_deployment
        .as_ref()
        .ok_or(StageError::MissingDependency("superchain"))?;
    let roles = st
        .superchain_roles
        .as_ref()
        .ok_or(StageError::MissingDependency("superchain"))?;

    let proof_params = merge_overrides(
        SuperchainProofParams::default(),
        &[&intent.global_deploy_overrides],
    )
    .map_err(StageError::Overrides)?;

    let out = opcm::deploy_implementations(
        env.l1_host.as_ref(),
        &DeployImplementationsInput {
            withdrawal_delay_seconds: proof_params.withdrawal_delay_seconds,
            min_proposal_size_bytes: proof_params.min_proposal_size_bytes,
            challenge_period_seconds: proof_params.challenge_period_seconds,
            proof_maturity_delay_seconds: proof_params.proof_maturity_delay_seconds,
            dispute_game_finality_delay_seconds: proof_params.dispute_game_finality_delay_seconds,
            mips_version: proof_params.mips_version,
            l1_contracts_release: intent.l1_contracts_release(),
            superchain_config_proxy: superchain.superchain_config_proxy,
            protocol_versions_proxy: superchain.protocol_versions_proxy,
            superchain_proxy_admin: superchain.superchain_proxy_admin_impl,
            upgrade_controller: roles.superchain_proxy_admin_owner,
            use_interop: intent.use_interop,
        },
    )
    .await
    .map_err(StageError::script("error deploying implementations"))?;

    st.implementations_deployment = Some(ImplementationsContracts {
        opcm_impl: out.opcm,
        opcm_game_type_adder_impl: out.opcm_game_type_adder,
        opcm_deployer_impl: out.opcm_deployer,
        opcm_upgrader_impl: out.opcm_upgrader,
        opcm_interop_migrator_impl: out.opcm_interop_migrator,
        delayed_weth_impl: out.delayed_weth_impl,
        optimism_portal_impl: out.optimism_portal_impl,
        eth_lockbox_impl: out.eth_lockbox_impl,
        preimage_oracle_impl: out.preimage_oracle_singleton,
        mips_impl: out.mips_singleton,
        system_config_impl: out.system_config_impl,
        l1_cross_domain_messenger_impl: out.l1_cross_domain_messenger_impl,
        l1_erc721_bridge_impl: out.l1_erc721_bridge_impl,
        l1_standard_bridge_impl: out.l1_standard_bridge_impl,
        optimism_mintable_erc20_factory_impl: out.optimism_mintable_erc20_factory_impl,
        dispute_game_factory_impl: out.dispute_game_factory_impl,
        anchor_state_registry_impl: out.anchor_state_registry_impl,
    });
    Ok(())
}

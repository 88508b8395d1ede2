use ethereum_types::H256;
use tracing::info;

use super::{Env, StageError};
use crate::{
    opcm::{self, DeployOpChainInput, DeployOpChainOutput, ReadImplementationAddressesInput},
    standard,
    state::{ChainProofParams, ChainState, OpChainContracts, State, merge_overrides},
};

pub(super) async fn deploy_op_chain(env: &Env, st: &mut State, id: H256) -> Result<(), StageError> {
    if st.has_chain(id) {
        info!(stage = "deploy-opchain", id = %format!("{id:#x}"), "OP chain deployment not needed");
        return Ok(());
    }

    let intent = &env.intent;
    let chain = intent.chain(id)?;
    info!(stage = "deploy-opchain", id = %format!("{id:#x}"), "Deploying OP chain");

    let opcm_address = st
        .implementations_deployment
        .as_ref()
        .ok_or(StageError::MissingDependency("implementations"))?
        .opcm_impl;

    let proof_params = merge_overrides(
        ChainProofParams::default(),
        &[&intent.global_deploy_overrides, &chain.deploy_overrides],
    )
    .map_err(StageError::Overrides)?;

    let input = DeployOpChainInput {
        op_chain_proxy_admin_owner: chain.roles.l1_proxy_admin_owner,
        system_config_owner: chain.roles.system_config_owner,
        batcher: chain.roles.batcher,
        unsafe_block_signer: chain.roles.unsafe_block_signer,
        proposer: chain.roles.proposer,
        challenger: chain.roles.challenger,
        basefee_scalar: standard::BASEFEE_SCALAR,
        blob_base_fee_scalar: standard::BLOB_BASE_FEE_SCALAR,
        l2_chain_id: opcm::chain_id_to_u256(id),
        opcm: opcm_address,
        salt_mixer: format!("{:#x}", st.create2_salt),
        gas_limit: standard::GAS_LIMIT,
        dispute_game_type: proof_params.dispute_game_type,
        dispute_absolute_prestate: proof_params.dispute_absolute_prestate,
        dispute_max_game_depth: proof_params.dispute_max_game_depth,
        dispute_split_depth: proof_params.dispute_split_depth,
        dispute_clock_extension: proof_params.dispute_clock_extension,
        dispute_max_clock_duration: proof_params.dispute_max_clock_duration,
        allow_custom_dispute_parameters: proof_params.dangerously_allow_custom_dispute_parameters,
        operator_fee_scalar: chain.operator_fee_scalar,
        operator_fee_constant: chain.operator_fee_constant,
    };

    let out = opcm::deploy_op_chain(env.l1_host.as_ref(), &input)
        .await
        .map_err(StageError::script("error deploying OP chain"))?;
    st.chains.push(ChainState::new(id, chain_contracts(&out)));

    let impls = opcm::read_implementation_addresses(
        env.l1_host.as_ref(),
        &ReadImplementationAddressesInput {
            deploy_op_chain_output: out,
            opcm: opcm_address,
            release: intent.l1_contracts_release(),
        },
    )
    .await
    .map_err(StageError::script("failed to read implementation addresses"))?;

    let deployment = st
        .implementations_deployment
        .as_mut()
        .ok_or(StageError::MissingDependency("implementations"))?;
    deployment.delayed_weth_impl = impls.delayed_weth;
    deployment.optimism_portal_impl = impls.optimism_portal;
    deployment.eth_lockbox_impl = impls.eth_lockbox;
    deployment.system_config_impl = impls.system_config;
    deployment.l1_cross_domain_messenger_impl = impls.l1_cross_domain_messenger;
    deployment.l1_erc721_bridge_impl = impls.l1_erc721_bridge;
    deployment.l1_standard_bridge_impl = impls.l1_standard_bridge;
    deployment.optimism_mintable_erc20_factory_impl = impls.optimism_mintable_erc20_factory;
    deployment.dispute_game_factory_impl = impls.dispute_game_factory;
    deployment.mips_impl = impls.mips_singleton;
    deployment.preimage_oracle_impl = impls.preimage_oracle_singleton;
    Ok(())
}

fn chain_contracts(out: &DeployOpChainOutput) -> OpChainContracts {
    OpChainContracts {
        op_chain_proxy_admin_impl: out.op_chain_proxy_admin,
        address_manager_impl: out.address_manager,
        l1_erc721_bridge_proxy: out.l1_erc721_bridge_proxy,
        system_config_proxy: out.system_config_proxy,
        optimism_mintable_erc20_factory_proxy: out.optimism_mintable_erc20_factory_proxy,
        l1_standard_bridge_proxy: out.l1_standard_bridge_proxy,
        l1_cross_domain_messenger_proxy: out.l1_cross_domain_messenger_proxy,
        optimism_portal_proxy: out.optimism_portal_proxy,
        eth_lockbox_proxy: out.eth_lockbox_proxy,
        dispute_game_factory_proxy: out.dispute_game_factory_proxy,
        anchor_state_registry_proxy: out.anchor_state_registry_proxy,
        fault_dispute_game_impl: out.fault_dispute_game,
        permissioned_dispute_game_impl: out.permissioned_dispute_game,
        delayed_weth_permissioned_game_proxy: out.delayed_weth_permissioned_game_proxy,
        delayed_weth_permissionless_game_proxy: out.delayed_weth_permissionless_game_proxy,
        ..Default::default()
    }
}

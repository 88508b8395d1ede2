//! Read-only views over the state of a finished deployment.

use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    opcm::chain_id_to_u256,
    standard,
    state::{
        ImplementationsContracts, IntentError, OpChainContracts, State, StateError,
        SuperchainContracts, merge_overrides,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("can only inspect a deployment after a full apply")]
    NotApplied,
    #[error("{0} has not been deployed")]
    NotDeployed(&'static str),
    #[error(transparent)]
    Intent(#[from] IntentError),
    #[error(transparent)]
    State(#[from] StateError),
}

/// Every L1 contract address belonging to one L2 chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct L1Contracts {
    pub superchain_deployment: SuperchainContracts,
    pub implementations_deployment: ImplementationsContracts,
    pub op_chain_deployment: OpChainContracts,
}

pub fn l1_contracts(st: &State, id: H256) -> Result<L1Contracts, InspectError> {
    let superchain = st
        .superchain_deployment
        .clone()
        .ok_or(InspectError::NotDeployed("superchain"))?;
    let implementations = st
        .implementations_deployment
        .clone()
        .ok_or(InspectError::NotDeployed("implementations"))?;
    let chain = st.chain(id)?;
    Ok(L1Contracts {
        superchain_deployment: superchain,
        implementations_deployment: implementations,
        op_chain_deployment: chain.contracts.clone(),
    })
}

/// Rollup node and genesis tooling configuration for one chain, as derived
/// from the applied intent and the deployed addresses. Deploy overrides are
/// layered on top, global first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    #[serde(rename = "l1ChainID")]
    pub l1_chain_id: u64,
    #[serde(rename = "l2ChainID")]
    pub l2_chain_id: U256,
    pub l1_starting_block_tag: Option<H256>,
    pub l1_genesis_block_timestamp: Option<u64>,

    pub final_system_owner: Address,
    pub proxy_admin_owner: Address,
    pub system_config_owner: Address,
    pub p2p_sequencer_address: Address,
    pub batch_sender_address: Address,
    pub l2_output_oracle_proposer: Address,
    pub l2_output_oracle_challenger: Address,
    pub superchain_config_guardian: Address,

    pub base_fee_vault_recipient: Address,
    pub l1_fee_vault_recipient: Address,
    pub sequencer_fee_vault_recipient: Address,

    pub l2_genesis_block_gas_limit: u64,
    pub gas_price_oracle_base_fee_scalar: u32,
    pub gas_price_oracle_blob_base_fee_scalar: u32,
    #[serde(rename = "eip1559Denominator")]
    pub eip1559_denominator: u64,
    #[serde(rename = "eip1559DenominatorCanyon")]
    pub eip1559_denominator_canyon: u64,
    #[serde(rename = "eip1559Elasticity")]
    pub eip1559_elasticity: u64,
    pub use_interop: bool,
    pub fund_dev_accounts: bool,

    pub superchain_config_proxy: Address,
    pub protocol_versions_proxy: Address,
    pub system_config_proxy: Address,
    pub optimism_portal_proxy: Address,
    pub l1_standard_bridge_proxy: Address,
    pub l1_cross_domain_messenger_proxy: Address,
    #[serde(rename = "l1ERC721BridgeProxy")]
    pub l1_erc721_bridge_proxy: Address,
    pub dispute_game_factory_proxy: Address,
}

pub fn deploy_config(st: &State, id: H256) -> Result<DeployConfig, InspectError> {
    let intent = st.applied_intent.as_ref().ok_or(InspectError::NotApplied)?;
    let chain = intent.chain(id)?;
    let chain_state = st.chain(id)?;
    let superchain = st
        .superchain_deployment
        .as_ref()
        .ok_or(InspectError::NotDeployed("superchain"))?;
    let guardian = st
        .superchain_roles
        .as_ref()
        .map(|roles| roles.superchain_guardian)
        .unwrap_or_default();
    let start_block = chain_state.start_block.as_ref();
    let contracts = &chain_state.contracts;

    let config = DeployConfig {
        l1_chain_id: intent.l1_chain_id,
        l2_chain_id: chain_id_to_u256(id),
        l1_starting_block_tag: start_block.map(|block| block.hash),
        l1_genesis_block_timestamp: start_block.map(|block| block.timestamp),

        final_system_owner: chain.roles.l1_proxy_admin_owner,
        proxy_admin_owner: chain.roles.l2_proxy_admin_owner,
        system_config_owner: chain.roles.system_config_owner,
        p2p_sequencer_address: chain.roles.unsafe_block_signer,
        batch_sender_address: chain.roles.batcher,
        l2_output_oracle_proposer: chain.roles.proposer,
        l2_output_oracle_challenger: chain.roles.challenger,
        superchain_config_guardian: guardian,

        base_fee_vault_recipient: chain.base_fee_vault_recipient,
        l1_fee_vault_recipient: chain.l1_fee_vault_recipient,
        sequencer_fee_vault_recipient: chain.sequencer_fee_vault_recipient,

        l2_genesis_block_gas_limit: standard::GAS_LIMIT,
        gas_price_oracle_base_fee_scalar: standard::BASEFEE_SCALAR,
        gas_price_oracle_blob_base_fee_scalar: standard::BLOB_BASE_FEE_SCALAR,
        eip1559_denominator: chain.eip1559_denominator,
        eip1559_denominator_canyon: chain.eip1559_denominator_canyon,
        eip1559_elasticity: chain.eip1559_elasticity,
        use_interop: intent.use_interop,
        fund_dev_accounts: intent.fund_dev_accounts,

        superchain_config_proxy: superchain.superchain_config_proxy,
        protocol_versions_proxy: superchain.protocol_versions_proxy,
        system_config_proxy: contracts.system_config_proxy,
        optimism_portal_proxy: contracts.optimism_portal_proxy,
        l1_standard_bridge_proxy: contracts.l1_standard_bridge_proxy,
        l1_cross_domain_messenger_proxy: contracts.l1_cross_domain_messenger_proxy,
        l1_erc721_bridge_proxy: contracts.l1_erc721_bridge_proxy,
        dispute_game_factory_proxy: contracts.dispute_game_factory_proxy,
    };

    Ok(merge_overrides(
        config,
        &[&intent.global_deploy_overrides, &chain.deploy_overrides],
    )?)
}

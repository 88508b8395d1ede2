//! Typed bindings for the contract deployment scripts.
//!
//! Every wrapper serializes its input as camelCase JSON, runs the named
//! script on a [`ScriptHost`] and decodes the output the same way.

use ethereum_types::{Address, H256, U256};
use hex_literal::hex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::script::{ScriptError, ScriptHost};

/// Protocol version `v9.0.0` in the bytes32 encoding used on chain.
pub const OP_STACK_SUPPORT: H256 = H256(hex!(
    "0000000000000000000000000000000000000009000000000000000000000000"
));

async fn run_script<I, O>(host: &dyn ScriptHost, script: &str, input: &I) -> Result<O, ScriptError>
where
    I: Serialize,
    O: DeserializeOwned,
{
    let input = serde_json::to_value(input).map_err(|e| ScriptError::Input {
        script: script.to_string(),
        cause: e.to_string(),
    })?;
    let output = host.run(script, input).await?;
    serde_json::from_value(output).map_err(|e| ScriptError::Output {
        script: script.to_string(),
        cause: e.to_string(),
    })
}

async fn run_script_void<I: Serialize>(
    host: &dyn ScriptHost,
    script: &str,
    input: &I,
) -> Result<(), ScriptError> {
    let input = serde_json::to_value(input).map_err(|e| ScriptError::Input {
        script: script.to_string(),
        cause: e.to_string(),
    })?;
    host.run(script, input).await.map(|_| ())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySuperchainInput {
    pub superchain_proxy_admin_owner: Address,
    pub protocol_versions_owner: Address,
    pub guardian: Address,
    pub paused: bool,
    pub required_protocol_version: H256,
    pub recommended_protocol_version: H256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySuperchainOutput {
    pub superchain_proxy_admin: Address,
    pub superchain_config_impl: Address,
    pub superchain_config_proxy: Address,
    pub protocol_versions_impl: Address,
    pub protocol_versions_proxy: Address,
}

pub async fn deploy_superchain(
    host: &dyn ScriptHost,
    input: &DeploySuperchainInput,
) -> Result<DeploySuperchainOutput, ScriptError> {
    run_script(host, "DeploySuperchain.s.sol:DeploySuperchain", input).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployImplementationsInput {
    pub withdrawal_delay_seconds: u64,
    pub min_proposal_size_bytes: u64,
    pub challenge_period_seconds: u64,
    pub proof_maturity_delay_seconds: u64,
    pub dispute_game_finality_delay_seconds: u64,
    pub mips_version: u64,
    /// `op-contracts/vX.Y.Z`, or `dev` for untagged artifacts.
    pub l1_contracts_release: String,
    pub superchain_config_proxy: Address,
    pub protocol_versions_proxy: Address,
    pub superchain_proxy_admin: Address,
    pub upgrade_controller: Address,
    pub use_interop: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployImplementationsOutput {
    pub opcm: Address,
    #[serde(default)]
    pub opcm_contracts_container: Address,
    pub opcm_game_type_adder: Address,
    pub opcm_deployer: Address,
    pub opcm_upgrader: Address,
    pub opcm_interop_migrator: Address,
    #[serde(rename = "delayedWETHImpl")]
    pub delayed_weth_impl: Address,
    pub optimism_portal_impl: Address,
    #[serde(rename = "ethLockboxImpl")]
    pub eth_lockbox_impl: Address,
    pub preimage_oracle_singleton: Address,
    pub mips_singleton: Address,
    pub system_config_impl: Address,
    pub l1_cross_domain_messenger_impl: Address,
    #[serde(rename = "l1ERC721BridgeImpl")]
    pub l1_erc721_bridge_impl: Address,
    pub l1_standard_bridge_impl: Address,
    #[serde(rename = "optimismMintableERC20FactoryImpl")]
    pub optimism_mintable_erc20_factory_impl: Address,
    pub dispute_game_factory_impl: Address,
    pub anchor_state_registry_impl: Address,
}

pub async fn deploy_implementations(
    host: &dyn ScriptHost,
    input: &DeployImplementationsInput,
) -> Result<DeployImplementationsOutput, ScriptError> {
    run_script(host, "DeployImplementations.s.sol:DeployImplementations", input).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOpChainInput {
    pub op_chain_proxy_admin_owner: Address,
    pub system_config_owner: Address,
    pub batcher: Address,
    pub unsafe_block_signer: Address,
    pub proposer: Address,
    pub challenger: Address,

    pub basefee_scalar: u32,
    pub blob_base_fee_scalar: u32,
    pub l2_chain_id: U256,
    pub opcm: Address,
    pub salt_mixer: String,
    pub gas_limit: u64,

    pub dispute_game_type: u32,
    pub dispute_absolute_prestate: H256,
    pub dispute_max_game_depth: u64,
    pub dispute_split_depth: u64,
    pub dispute_clock_extension: u64,
    pub dispute_max_clock_duration: u64,
    pub allow_custom_dispute_parameters: bool,

    pub operator_fee_scalar: u32,
    pub operator_fee_constant: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOpChainOutput {
    pub op_chain_proxy_admin: Address,
    pub address_manager: Address,
    #[serde(rename = "l1ERC721BridgeProxy")]
    pub l1_erc721_bridge_proxy: Address,
    pub system_config_proxy: Address,
    #[serde(rename = "optimismMintableERC20FactoryProxy")]
    pub optimism_mintable_erc20_factory_proxy: Address,
    pub l1_standard_bridge_proxy: Address,
    pub l1_cross_domain_messenger_proxy: Address,
    pub optimism_portal_proxy: Address,
    pub eth_lockbox_proxy: Address,
    pub dispute_game_factory_proxy: Address,
    pub anchor_state_registry_proxy: Address,
    pub fault_dispute_game: Address,
    pub permissioned_dispute_game: Address,
    #[serde(rename = "delayedWETHPermissionedGameProxy")]
    pub delayed_weth_permissioned_game_proxy: Address,
    #[serde(rename = "delayedWETHPermissionlessGameProxy")]
    pub delayed_weth_permissionless_game_proxy: Address,
}

pub async fn deploy_op_chain(
    host: &dyn ScriptHost,
    input: &DeployOpChainInput,
) -> Result<DeployOpChainOutput, ScriptError> {
    run_script(host, "DeployOPChain.s.sol:DeployOPChain", input).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadImplementationAddressesInput {
    #[serde(flatten)]
    pub deploy_op_chain_output: DeployOpChainOutput,
    pub opcm: Address,
    pub release: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadImplementationAddressesOutput {
    #[serde(rename = "delayedWETH")]
    pub delayed_weth: Address,
    pub optimism_portal: Address,
    pub eth_lockbox: Address,
    pub system_config: Address,
    pub l1_cross_domain_messenger: Address,
    #[serde(rename = "l1ERC721Bridge")]
    pub l1_erc721_bridge: Address,
    pub l1_standard_bridge: Address,
    #[serde(rename = "optimismMintableERC20Factory")]
    pub optimism_mintable_erc20_factory: Address,
    pub dispute_game_factory: Address,
    pub mips_singleton: Address,
    pub preimage_oracle_singleton: Address,
}

pub async fn read_implementation_addresses(
    host: &dyn ScriptHost,
    input: &ReadImplementationAddressesInput,
) -> Result<ReadImplementationAddressesOutput, ScriptError> {
    run_script(
        host,
        "ReadImplementationAddresses.s.sol:ReadImplementationAddresses",
        input,
    )
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadSuperchainDeploymentInput {
    pub opcm_address: Address,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadSuperchainDeploymentOutput {
    pub protocol_versions_impl: Address,
    pub protocol_versions_proxy: Address,
    pub superchain_config_impl: Address,
    pub superchain_config_proxy: Address,
    pub superchain_proxy_admin: Address,
    pub guardian: Address,
    pub protocol_versions_owner: Address,
    pub superchain_proxy_admin_owner: Address,
    pub recommended_protocol_version: H256,
    pub required_protocol_version: H256,
}

pub async fn read_superchain_deployment(
    host: &dyn ScriptHost,
    input: &ReadSuperchainDeploymentInput,
) -> Result<ReadSuperchainDeploymentOutput, ScriptError> {
    run_script(
        host,
        "ReadSuperchainDeployment.s.sol:ReadSuperchainDeployment",
        input,
    )
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployAltDaInput {
    pub salt: H256,
    pub proxy_admin: Address,
    pub challenge_contract_owner: Address,
    pub challenge_window: u64,
    pub resolve_window: u64,
    pub bond_size: u64,
    pub resolver_refund_percentage: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployAltDaOutput {
    pub data_availability_challenge_proxy: Address,
    pub data_availability_challenge_impl: Address,
}

pub async fn deploy_alt_da(
    host: &dyn ScriptHost,
    input: &DeployAltDaInput,
) -> Result<DeployAltDaOutput, ScriptError> {
    run_script(host, "DeployAltDA.s.sol:DeployAltDA", input).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployPreimageOracleInput {
    pub min_proposal_size: u64,
    pub challenge_period: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployPreimageOracleOutput {
    pub preimage_oracle: Address,
}

pub async fn deploy_preimage_oracle(
    host: &dyn ScriptHost,
    input: &DeployPreimageOracleInput,
) -> Result<DeployPreimageOracleOutput, ScriptError> {
    run_script(host, "DeployPreimageOracle.s.sol:DeployPreimageOracle", input).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployAlphabetVmInput {
    pub absolute_prestate: H256,
    pub preimage_oracle: Address,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployAlphabetVmOutput {
    #[serde(rename = "alphabetVM")]
    pub alphabet_vm: Address,
}

pub async fn deploy_alphabet_vm(
    host: &dyn ScriptHost,
    input: &DeployAlphabetVmInput,
) -> Result<DeployAlphabetVmOutput, ScriptError> {
    run_script(host, "DeployAlphabetVM.s.sol:DeployAlphabetVM", input).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployMipsInput {
    pub mips_version: u64,
    pub preimage_oracle: Address,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployMipsOutput {
    pub mips_singleton: Address,
}

pub async fn deploy_mips(
    host: &dyn ScriptHost,
    input: &DeployMipsInput,
) -> Result<DeployMipsOutput, ScriptError> {
    run_script(host, "DeployMIPS.s.sol:DeployMIPS", input).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployDisputeGameInput {
    pub release: String,
    pub vm_address: Address,
    pub game_kind: String,
    pub game_type: u32,
    pub absolute_prestate: H256,
    pub max_game_depth: u64,
    pub split_depth: u64,
    pub clock_extension: u64,
    pub max_clock_duration: u64,
    pub delayed_weth_proxy: Address,
    pub anchor_state_registry_proxy: Address,
    pub l2_chain_id: H256,
    pub proposer: Address,
    pub challenger: Address,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployDisputeGameOutput {
    pub dispute_game_impl: Address,
}

pub async fn deploy_dispute_game(
    host: &dyn ScriptHost,
    input: &DeployDisputeGameInput,
) -> Result<DeployDisputeGameOutput, ScriptError> {
    run_script(host, "DeployDisputeGame.s.sol:DeployDisputeGame", input).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDisputeGameImplInput {
    pub factory: Address,
    pub impl_address: Address,
    pub game_type: u32,
    /// Set only when the new game should become the respected game type.
    pub anchor_state_registry: Address,
}

pub async fn set_dispute_game_impl(
    host: &dyn ScriptHost,
    input: &SetDisputeGameImplInput,
) -> Result<(), ScriptError> {
    run_script_void(host, "SetDisputeGameImpl.s.sol:SetDisputeGameImpl", input).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct L2GenesisInput {
    #[serde(rename = "l1ChainID")]
    pub l1_chain_id: u64,
    #[serde(rename = "l2ChainID")]
    pub l2_chain_id: U256,
    pub l1_cross_domain_messenger_proxy: Address,
    pub l1_standard_bridge_proxy: Address,
    #[serde(rename = "l1ERC721BridgeProxy")]
    pub l1_erc721_bridge_proxy: Address,
    pub op_chain_proxy_admin_owner: Address,
    pub sequencer_fee_vault_recipient: Address,
    pub sequencer_fee_vault_minimum_withdrawal_amount: U256,
    pub sequencer_fee_vault_withdrawal_network: u8,
    pub base_fee_vault_recipient: Address,
    pub base_fee_vault_minimum_withdrawal_amount: U256,
    pub base_fee_vault_withdrawal_network: u8,
    pub l1_fee_vault_recipient: Address,
    pub l1_fee_vault_minimum_withdrawal_amount: U256,
    pub l1_fee_vault_withdrawal_network: u8,
    pub governance_token_owner: Address,
    pub fork: u64,
    pub use_interop: bool,
    pub enable_governance: bool,
    pub fund_dev_accounts: bool,
}

pub async fn l2_genesis(host: &dyn ScriptHost, input: &L2GenesisInput) -> Result<(), ScriptError> {
    run_script_void(host, "L2Genesis.s.sol:L2Genesis", input).await
}

pub async fn insert_preinstalls(host: &dyn ScriptHost) -> Result<(), ScriptError> {
    host.run("SetPreinstalls.s.sol:SetPreinstalls", Value::Null)
        .await
        .map(|_| ())
}

/// Interprets a 32-byte chain id as a big-endian integer.
pub fn chain_id_to_u256(id: H256) -> U256 {
    U256::from_big_endian(id.as_bytes())
}

use std::collections::BTreeMap;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use super::{Intent, StateError, SuperchainRoles, VmType};
use crate::broadcaster::CalldataDump;

/// The only state layout this version reads and writes.
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperchainContracts {
    pub superchain_proxy_admin_impl: Address,
    pub superchain_config_proxy: Address,
    pub superchain_config_impl: Address,
    pub protocol_versions_proxy: Address,
    pub protocol_versions_impl: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImplementationsContracts {
    pub opcm_impl: Address,
    pub opcm_game_type_adder_impl: Address,
    pub opcm_deployer_impl: Address,
    pub opcm_upgrader_impl: Address,
    pub opcm_interop_migrator_impl: Address,
    pub delayed_weth_impl: Address,
    pub optimism_portal_impl: Address,
    pub eth_lockbox_impl: Address,
    pub preimage_oracle_impl: Address,
    pub mips_impl: Address,
    pub system_config_impl: Address,
    pub l1_cross_domain_messenger_impl: Address,
    pub l1_erc721_bridge_impl: Address,
    pub l1_standard_bridge_impl: Address,
    pub optimism_mintable_erc20_factory_impl: Address,
    pub dispute_game_factory_impl: Address,
    pub anchor_state_registry_impl: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpChainContracts {
    pub op_chain_proxy_admin_impl: Address,
    pub address_manager_impl: Address,
    pub l1_erc721_bridge_proxy: Address,
    pub system_config_proxy: Address,
    pub optimism_mintable_erc20_factory_proxy: Address,
    pub l1_standard_bridge_proxy: Address,
    pub l1_cross_domain_messenger_proxy: Address,
    pub optimism_portal_proxy: Address,
    pub eth_lockbox_proxy: Address,
    pub dispute_game_factory_proxy: Address,
    pub anchor_state_registry_proxy: Address,
    pub fault_dispute_game_impl: Address,
    pub permissioned_dispute_game_impl: Address,
    pub delayed_weth_permissioned_game_proxy: Address,
    pub delayed_weth_permissionless_game_proxy: Address,
    #[serde(rename = "altDAChallengeProxy")]
    pub alt_da_challenge_proxy: Address,
    #[serde(rename = "altDAChallengeImpl")]
    pub alt_da_challenge_impl: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalDisputeGameState {
    pub game_type: u32,
    pub vm_type: VmType,
    pub game_address: Address,
    pub oracle_address: Address,
    pub vm_address: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    #[serde(default, skip_serializing_if = "U256::is_zero")]
    pub balance: U256,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub nonce: u64,
    #[serde(
        default,
        with = "crate::serde_utils::bytes",
        skip_serializing_if = "Bytes::is_empty"
    )]
    pub code: Bytes,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<H256, H256>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// Account state dumped by the scripting engine.
pub type Allocs = BTreeMap<Address, GenesisAccount>;

/// An L1 block reference, encoded the way `eth_getBlockBy*` reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1BlockRef {
    pub hash: H256,
    pub parent_hash: H256,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub number: u64,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub timestamp: u64,
}

impl From<&crate::rpc::BlockHeader> for L1BlockRef {
    fn from(header: &crate::rpc::BlockHeader) -> Self {
        Self {
            hash: header.hash,
            parent_hash: header.parent_hash,
            number: header.number,
            timestamp: header.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainState {
    pub id: H256,
    #[serde(flatten)]
    pub contracts: OpChainContracts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_dispute_games: Vec<AdditionalDisputeGameState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocs: Option<Allocs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_block: Option<L1BlockRef>,
}

impl ChainState {
    pub fn new(id: H256, contracts: OpChainContracts) -> Self {
        Self {
            id,
            contracts,
            additional_dispute_games: Vec::new(),
            allocs: None,
            start_block: None,
        }
    }
}

/// Sealed development L1 genesis. The account state is kept once, in
/// [`State::l1_state_dump`]; `state_hash` commits to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1DevGenesis {
    #[serde(rename = "chainID")]
    pub chain_id: u64,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub timestamp: u64,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub gas_limit: u64,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub excess_blob_gas: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prague_time: Option<u64>,
    pub state_hash: H256,
    pub block_hash: H256,
}

impl L1DevGenesis {
    /// Block reference of the genesis block itself.
    pub fn block_ref(&self) -> L1BlockRef {
        L1BlockRef {
            hash: self.block_hash,
            parent_hash: H256::zero(),
            number: 0,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteropDependency {
    pub chain_index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteropDepSet {
    /// Keyed by decimal chain id.
    pub dependencies: BTreeMap<String, InteropDependency>,
}

/// Everything the pipeline has produced so far. Persisted to `state.json`
/// after every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub version: u32,
    #[serde(default)]
    pub create2_salt: H256,
    #[serde(default)]
    pub applied_intent: Option<Intent>,
    #[serde(default)]
    pub superchain_deployment: Option<SuperchainContracts>,
    #[serde(default)]
    pub superchain_roles: Option<SuperchainRoles>,
    #[serde(default)]
    pub implementations_deployment: Option<ImplementationsContracts>,
    #[serde(rename = "opChainDeployments", default)]
    pub chains: Vec<ChainState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l1_state_dump: Option<Allocs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l1_dev_genesis: Option<L1DevGenesis>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployment_calldata: Vec<CalldataDump>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interop_dep_set: Option<InteropDepSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prestate_manifest: Option<BTreeMap<String, String>>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            create2_salt: H256::zero(),
            applied_intent: None,
            superchain_deployment: None,
            superchain_roles: None,
            implementations_deployment: None,
            chains: Vec::new(),
            l1_state_dump: None,
            l1_dev_genesis: None,
            deployment_calldata: Vec::new(),
            interop_dep_set: None,
            prestate_manifest: None,
        }
    }
}

impl State {
    pub fn chain(&self, id: H256) -> Result<&ChainState, StateError> {
        self.chains
            .iter()
            .find(|chain| chain.id == id)
            .ok_or(StateError::ChainNotFound(id))
    }

    pub fn chain_mut(&mut self, id: H256) -> Result<&mut ChainState, StateError> {
        self.chains
            .iter_mut()
            .find(|chain| chain.id == id)
            .ok_or(StateError::ChainNotFound(id))
    }

    pub fn has_chain(&self, id: H256) -> bool {
        self.chains.iter().any(|chain| chain.id == id)
    }
}

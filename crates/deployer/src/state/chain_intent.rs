use std::collections::BTreeMap;

use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use super::IntentError;
use crate::standard;

pub const KECCAK_COMMITMENT: &str = "KeccakCommitment";
pub const GENERIC_COMMITMENT: &str = "GenericCommitment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmType {
    #[serde(rename = "ALPHABET")]
    Alphabet,
    /// The currently released Cannon state version.
    #[serde(rename = "CANNON")]
    Cannon,
    /// The in-development Cannon state version.
    #[serde(rename = "CANNON-NEXT")]
    CannonNext,
}

impl VmType {
    pub fn mips_version(&self) -> u64 {
        match self {
            VmType::Cannon => standard::MIPS_VERSION,
            VmType::CannonNext => standard::MIPS_VERSION + 1,
            VmType::Alphabet => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProofParams {
    #[serde(rename = "respectedGameType")]
    pub dispute_game_type: u32,
    #[serde(rename = "faultGameAbsolutePrestate")]
    pub dispute_absolute_prestate: H256,
    #[serde(rename = "faultGameMaxDepth")]
    pub dispute_max_game_depth: u64,
    #[serde(rename = "faultGameSplitDepth")]
    pub dispute_split_depth: u64,
    #[serde(rename = "faultGameClockExtension")]
    pub dispute_clock_extension: u64,
    #[serde(rename = "faultGameMaxClockDuration")]
    pub dispute_max_clock_duration: u64,
    #[serde(rename = "dangerouslyAllowCustomDisputeParameters", default)]
    pub dangerously_allow_custom_dispute_parameters: bool,
}

impl Default for ChainProofParams {
    fn default() -> Self {
        Self {
            dispute_game_type: standard::DISPUTE_GAME_TYPE,
            dispute_absolute_prestate: standard::DISPUTE_ABSOLUTE_PRESTATE,
            dispute_max_game_depth: standard::DISPUTE_MAX_GAME_DEPTH,
            dispute_split_depth: standard::DISPUTE_SPLIT_DEPTH,
            dispute_clock_extension: standard::DISPUTE_CLOCK_EXTENSION,
            dispute_max_clock_duration: standard::DISPUTE_MAX_CLOCK_DURATION,
            dangerously_allow_custom_dispute_parameters: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalDisputeGame {
    #[serde(flatten)]
    pub proof_params: ChainProofParams,
    pub vm_type: VmType,
    #[serde(default)]
    pub use_custom_oracle: bool,
    #[serde(default)]
    pub oracle_min_proposal_size: u64,
    #[serde(default)]
    pub oracle_challenge_period_seconds: u64,
    #[serde(default)]
    pub make_respected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AltDaConfig {
    #[serde(rename = "useAltDA")]
    pub use_alt_da: bool,
    #[serde(rename = "daCommitmentType")]
    pub da_commitment_type: String,
    pub da_challenge_window: u64,
    pub da_resolve_window: u64,
    pub da_bond_size: u64,
    pub da_resolver_refund_percentage: u64,
}

impl AltDaConfig {
    pub fn uses_keccak_commitments(&self) -> bool {
        self.use_alt_da && self.da_commitment_type == KECCAK_COMMITMENT
    }

    fn check(&self) -> Result<(), IntentError> {
        match self.da_commitment_type.as_str() {
            KECCAK_COMMITMENT => {
                if self.da_challenge_window == 0 {
                    return Err(IntentError::AltDa("daChallengeWindow must not be 0".into()));
                }
                if self.da_resolve_window == 0 {
                    return Err(IntentError::AltDa("daResolveWindow must not be 0".into()));
                }
                Ok(())
            }
            GENERIC_COMMITMENT => Ok(()),
            other => Err(IntentError::AltDa(format!(
                "daCommitmentType must be either {KECCAK_COMMITMENT} or {GENERIC_COMMITMENT}, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRoles {
    pub l1_proxy_admin_owner: Address,
    pub l2_proxy_admin_owner: Address,
    pub system_config_owner: Address,
    pub unsafe_block_signer: Address,
    pub batcher: Address,
    pub proposer: Address,
    pub challenger: Address,
}

impl ChainRoles {
    fn check_no_zero_addresses(&self) -> Result<(), IntentError> {
        let roles = [
            ("l1ProxyAdminOwner", self.l1_proxy_admin_owner),
            ("l2ProxyAdminOwner", self.l2_proxy_admin_owner),
            ("systemConfigOwner", self.system_config_owner),
            ("unsafeBlockSigner", self.unsafe_block_signer),
            ("batcher", self.batcher),
            ("proposer", self.proposer),
            ("challenger", self.challenger),
        ];
        match roles.iter().find(|(_, address)| address.is_zero()) {
            Some((role, _)) => Err(IntentError::ZeroAddress(*role)),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2DevGenesisParams {
    #[serde(default)]
    pub prefund: BTreeMap<Address, U256>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainIntent {
    pub id: H256,
    #[serde(default)]
    pub base_fee_vault_recipient: Address,
    #[serde(default)]
    pub l1_fee_vault_recipient: Address,
    #[serde(default)]
    pub sequencer_fee_vault_recipient: Address,
    #[serde(default)]
    pub eip1559_denominator_canyon: u64,
    #[serde(default)]
    pub eip1559_denominator: u64,
    #[serde(default)]
    pub eip1559_elasticity: u64,
    #[serde(default)]
    pub roles: ChainRoles,
    #[serde(default)]
    pub deploy_overrides: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "dangerousAltDAConfig", default)]
    pub dangerous_alt_da_config: AltDaConfig,
    #[serde(
        rename = "dangerousAdditionalDisputeGames",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub additional_dispute_games: Vec<AdditionalDisputeGame>,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub operator_fee_scalar: u32,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub operator_fee_constant: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l1_start_block_hash: Option<H256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l2_dev_genesis_params: Option<L2DevGenesisParams>,
}

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

fn is_zero_u64(value: &u64) -> bool {
    *value == 0
}

impl ChainIntent {
    /// A chain entry carrying only its id, for the user to fill in.
    pub fn empty(id: H256) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn check(&self) -> Result<(), IntentError> {
        if self.id.is_zero() {
            return Err(IntentError::ChainIdUnset);
        }

        self.roles.check_no_zero_addresses()?;

        if self.eip1559_denominator_canyon == 0
            || self.eip1559_denominator == 0
            || self.eip1559_elasticity == 0
        {
            return Err(IntentError::Eip1559ZeroValue(self.id));
        }

        if self.base_fee_vault_recipient.is_zero()
            || self.l1_fee_vault_recipient.is_zero()
            || self.sequencer_fee_vault_recipient.is_zero()
        {
            return Err(IntentError::FeeVaultZeroAddress(self.id));
        }

        if self.dangerous_alt_da_config.use_alt_da {
            self.dangerous_alt_da_config.check()?;
        }

        Ok(())
    }

    pub fn has_standard_eip1559_params(&self) -> bool {
        self.eip1559_denominator_canyon == standard::EIP1559_DENOMINATOR_CANYON
            && self.eip1559_denominator == standard::EIP1559_DENOMINATOR
            && self.eip1559_elasticity == standard::EIP1559_ELASTICITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn valid_chain() -> ChainIntent {
        ChainIntent {
            id: H256::from_low_u64_be(901),
            base_fee_vault_recipient: addr(1),
            l1_fee_vault_recipient: addr(2),
            sequencer_fee_vault_recipient: addr(3),
            eip1559_denominator_canyon: standard::EIP1559_DENOMINATOR_CANYON,
            eip1559_denominator: standard::EIP1559_DENOMINATOR,
            eip1559_elasticity: standard::EIP1559_ELASTICITY,
            roles: ChainRoles {
                l1_proxy_admin_owner: addr(10),
                l2_proxy_admin_owner: addr(11),
                system_config_owner: addr(12),
                unsafe_block_signer: addr(13),
                batcher: addr(14),
                proposer: addr(15),
                challenger: addr(16),
            },
            ..Default::default()
        }
    }

    #[test]
    fn valid_chain_passes() {
        valid_chain().check().unwrap();
    }

    #[test]
    fn check_failures() {
        let mut chain = valid_chain();
        chain.id = H256::zero();
        assert!(matches!(chain.check(), Err(IntentError::ChainIdUnset)));

        let mut chain = valid_chain();
        chain.roles.batcher = Address::zero();
        assert!(matches!(chain.check(), Err(IntentError::ZeroAddress("batcher"))));

        let mut chain = valid_chain();
        chain.eip1559_elasticity = 0;
        assert!(matches!(chain.check(), Err(IntentError::Eip1559ZeroValue(_))));

        let mut chain = valid_chain();
        chain.l1_fee_vault_recipient = Address::zero();
        assert!(matches!(chain.check(), Err(IntentError::FeeVaultZeroAddress(_))));

        let mut chain = valid_chain();
        chain.dangerous_alt_da_config = AltDaConfig {
            use_alt_da: true,
            da_commitment_type: KECCAK_COMMITMENT.into(),
            ..Default::default()
        };
        assert!(matches!(chain.check(), Err(IntentError::AltDa(_))));
    }

    #[test]
    fn additional_game_flattens_proof_params() {
        let game: AdditionalDisputeGame = serde_json::from_value(serde_json::json!({
            "respectedGameType": 255,
            "faultGameAbsolutePrestate": "0x038512e02c4c3f7bdaec27d00edf55b7155e0905301e1a88083e4e0a6764d54c",
            "faultGameMaxDepth": 50,
            "faultGameSplitDepth": 14,
            "faultGameClockExtension": 0,
            "faultGameMaxClockDuration": 1200,
            "vmType": "ALPHABET",
            "useCustomOracle": true,
            "oracleMinProposalSize": 10000,
            "oracleChallengePeriodSeconds": 120
        }))
        .unwrap();
        assert_eq!(game.proof_params.dispute_game_type, 255);
        assert_eq!(game.vm_type, VmType::Alphabet);
        assert!(!game.make_respected);
    }
}

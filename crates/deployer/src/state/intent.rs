use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    str::FromStr,
};

use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use super::{ChainIntent, ChainRoles, IntentError};
use crate::{artifacts::Locator, standard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentType {
    Standard,
    Custom,
    StandardOverrides,
}

impl Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentType::Standard => write!(f, "standard"),
            IntentType::Custom => write!(f, "custom"),
            IntentType::StandardOverrides => write!(f, "standard-overrides"),
        }
    }
}

impl FromStr for IntentType {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(IntentType::Standard),
            "custom" => Ok(IntentType::Custom),
            "standard-overrides" => Ok(IntentType::StandardOverrides),
            other => Err(IntentError::UnsupportedIntentType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperchainRoles {
    pub superchain_proxy_admin_owner: Address,
    pub protocol_versions_owner: Address,
    pub superchain_guardian: Address,
}

impl SuperchainRoles {
    fn check_no_zero_addresses(&self) -> Result<(), IntentError> {
        let roles = [
            ("superchainProxyAdminOwner", self.superchain_proxy_admin_owner),
            ("protocolVersionsOwner", self.protocol_versions_owner),
            ("superchainGuardian", self.superchain_guardian),
        ];
        match roles.iter().find(|(_, address)| address.is_zero()) {
            Some((role, _)) => Err(IntentError::ZeroAddress(*role)),
            None => Ok(()),
        }
    }
}

/// Proof parameters shared by every chain, overridable through
/// `globalDeployOverrides`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperchainProofParams {
    #[serde(rename = "faultGameWithdrawalDelay")]
    pub withdrawal_delay_seconds: u64,
    #[serde(rename = "preimageOracleMinProposalSize")]
    pub min_proposal_size_bytes: u64,
    #[serde(rename = "preimageOracleChallengePeriod")]
    pub challenge_period_seconds: u64,
    #[serde(rename = "proofMaturityDelaySeconds")]
    pub proof_maturity_delay_seconds: u64,
    #[serde(rename = "disputeGameFinalityDelaySeconds")]
    pub dispute_game_finality_delay_seconds: u64,
    #[serde(rename = "mipsVersion")]
    pub mips_version: u64,
}

impl Default for SuperchainProofParams {
    fn default() -> Self {
        Self {
            withdrawal_delay_seconds: standard::WITHDRAWAL_DELAY_SECONDS,
            min_proposal_size_bytes: standard::MIN_PROPOSAL_SIZE_BYTES,
            challenge_period_seconds: standard::CHALLENGE_PERIOD_SECONDS,
            proof_maturity_delay_seconds: standard::PROOF_MATURITY_DELAY_SECONDS,
            dispute_game_finality_delay_seconds: standard::DISPUTE_GAME_FINALITY_DELAY_SECONDS,
            mips_version: standard::MIPS_VERSION,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct L1DevGenesisBlockParams {
    /// Zero means the current time when the genesis is sealed.
    pub timestamp: u64,
    /// Zero selects the default gas limit.
    pub gas_limit: u64,
    pub excess_blob_gas: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct L1DevGenesisParams {
    pub block_params: L1DevGenesisBlockParams,
    /// Prague activation, relative to the genesis timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prague_time_offset: Option<u64>,
    pub prefund: BTreeMap<Address, U256>,
}

/// What the operator wants deployed. Read from `intent.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub config_type: IntentType,
    #[serde(rename = "l1ChainID")]
    pub l1_chain_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opcm_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superchain_config_proxy: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superchain_roles: Option<SuperchainRoles>,
    #[serde(default)]
    pub fund_dev_accounts: bool,
    #[serde(default)]
    pub use_interop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l1_contracts_locator: Option<Locator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l2_contracts_locator: Option<Locator>,
    #[serde(default)]
    pub chains: Vec<ChainIntent>,
    #[serde(default)]
    pub global_deploy_overrides: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l1_dev_genesis_params: Option<L1DevGenesisParams>,
}

impl Intent {
    pub fn new(
        config_type: IntentType,
        l1_chain_id: u64,
        l2_chain_ids: &[H256],
    ) -> Result<Self, IntentError> {
        match config_type {
            IntentType::Custom => Ok(Self::new_custom(l1_chain_id, l2_chain_ids)),
            IntentType::Standard | IntentType::StandardOverrides => {
                let mut intent = Self::new_standard(l1_chain_id, l2_chain_ids);
                intent.config_type = config_type;
                Ok(intent)
            }
        }
    }

    /// Leaves every field at its zero value for the operator to populate.
    fn new_custom(l1_chain_id: u64, l2_chain_ids: &[H256]) -> Self {
        Self {
            config_type: IntentType::Custom,
            l1_chain_id,
            opcm_address: None,
            superchain_config_proxy: None,
            superchain_roles: Some(SuperchainRoles::default()),
            fund_dev_accounts: false,
            use_interop: false,
            l1_contracts_locator: None,
            l2_contracts_locator: None,
            chains: l2_chain_ids.iter().copied().map(ChainIntent::empty).collect(),
            global_deploy_overrides: Default::default(),
            l1_dev_genesis_params: None,
        }
    }

    fn new_standard(l1_chain_id: u64, l2_chain_ids: &[H256]) -> Self {
        let chains = l2_chain_ids
            .iter()
            .map(|id| ChainIntent {
                id: *id,
                eip1559_denominator_canyon: standard::EIP1559_DENOMINATOR_CANYON,
                eip1559_denominator: standard::EIP1559_DENOMINATOR,
                eip1559_elasticity: standard::EIP1559_ELASTICITY,
                roles: ChainRoles::default(),
                ..Default::default()
            })
            .collect();

        Self {
            config_type: IntentType::Standard,
            l1_chain_id,
            opcm_address: None,
            superchain_config_proxy: None,
            superchain_roles: None,
            fund_dev_accounts: false,
            use_interop: false,
            l1_contracts_locator: Some(Locator::default_l1()),
            l2_contracts_locator: Some(Locator::default_l2()),
            chains,
            global_deploy_overrides: Default::default(),
            l1_dev_genesis_params: None,
        }
    }

    pub fn check(&self) -> Result<(), IntentError> {
        if self.l1_chain_id == 0 {
            return Err(IntentError::ZeroL1ChainId);
        }
        if self.l1_contracts_locator.is_none() {
            return Err(IntentError::L1LocatorUndefined);
        }
        if self.l2_contracts_locator.is_none() {
            return Err(IntentError::L2LocatorUndefined);
        }

        let result = match self.config_type {
            IntentType::Standard => self.validate_standard_values(),
            IntentType::Custom | IntentType::StandardOverrides => self.validate_custom_config(),
        };
        result.map_err(|source| IntentError::Validation {
            config_type: self.config_type,
            source: Box::new(source),
        })
    }

    pub fn chain(&self, id: H256) -> Result<&ChainIntent, IntentError> {
        self.chains
            .iter()
            .find(|chain| chain.id == id)
            .ok_or(IntentError::ChainNotFound(id))
    }

    pub fn l1_locator(&self) -> Result<&Locator, IntentError> {
        self.l1_contracts_locator
            .as_ref()
            .ok_or(IntentError::L1LocatorUndefined)
    }

    pub fn l2_locator(&self) -> Result<&Locator, IntentError> {
        self.l2_contracts_locator
            .as_ref()
            .ok_or(IntentError::L2LocatorUndefined)
    }

    /// Release name passed to the contract scripts: the tag, or `dev` for
    /// untagged artifacts.
    pub fn l1_contracts_release(&self) -> String {
        self.l1_contracts_locator
            .as_ref()
            .and_then(Locator::tag)
            .unwrap_or("dev")
            .to_string()
    }

    fn validate_custom_config(&self) -> Result<(), IntentError> {
        match (&self.opcm_address, &self.superchain_roles) {
            (None, None) => {
                return Err(IntentError::Incompatible(
                    "must set superchain roles if OPCM address is nil".into(),
                ));
            }
            (None, Some(roles)) => roles.check_no_zero_addresses()?,
            (Some(_), Some(_)) => {
                return Err(IntentError::Incompatible(
                    "must not set superchain roles if OPCM address is set".into(),
                ));
            }
            (Some(_), None) => {}
        }

        if self.chains.is_empty() {
            return Err(IntentError::NoChains);
        }
        self.chains.iter().try_for_each(ChainIntent::check)
    }

    /// Rejects values a standard chain may not customize. Registry-provided
    /// role and OPCM addresses are not checked here.
    fn validate_standard_values(&self) -> Result<(), IntentError> {
        let l1_tag = self.l1_locator()?.tag().unwrap_or_default();
        if !standard::is_supported_l1_version(l1_tag) {
            return Err(IntentError::NonStandard(format!(
                "l1ContractsLocator={}",
                self.l1_locator()?
            )));
        }
        if let Some(l2_tag) = self.l2_locator()?.tag() {
            standard::artifacts_url_for_tag(l2_tag)?;
        } else {
            return Err(IntentError::NonStandard(format!(
                "l2ContractsLocator={}",
                self.l2_locator()?
            )));
        }

        if self.superchain_config_proxy.is_some() {
            return Err(IntentError::Incompatible("superchainConfigProxy".into()));
        }
        if self.superchain_roles.is_some() {
            return Err(IntentError::Incompatible("superchainRoles".into()));
        }

        for chain in &self.chains {
            chain.check()?;
            if !chain.has_standard_eip1559_params() {
                return Err(IntentError::NonStandard(format!("chainId={:#x}", chain.id)));
            }
            if !chain.additional_dispute_games.is_empty() {
                return Err(IntentError::NonStandard(format!(
                    "chainId={:#x} additionalDisputeGames must be nil",
                    chain.id
                )));
            }
        }
        Ok(())
    }
}

//! Registry of tagged contract releases and standard chain parameters.

use ethereum_types::{Address, H160, H256, U256};
use hex_literal::hex;
use serde::{Deserialize, Serialize};
use url::Url;

pub const GAS_LIMIT: u64 = 60_000_000;
pub const BASEFEE_SCALAR: u32 = 1368;
pub const BLOB_BASE_FEE_SCALAR: u32 = 801949;
pub const WITHDRAWAL_DELAY_SECONDS: u64 = 302400;
pub const MIN_PROPOSAL_SIZE_BYTES: u64 = 126000;
pub const CHALLENGE_PERIOD_SECONDS: u64 = 86400;
pub const PROOF_MATURITY_DELAY_SECONDS: u64 = 604800;
pub const DISPUTE_GAME_FINALITY_DELAY_SECONDS: u64 = 302400;
pub const MIPS_VERSION: u64 = 7;
/// Permissioned game type.
pub const DISPUTE_GAME_TYPE: u32 = 1;
pub const DISPUTE_MAX_GAME_DEPTH: u64 = 73;
pub const DISPUTE_SPLIT_DEPTH: u64 = 30;
pub const DISPUTE_CLOCK_EXTENSION: u64 = 10800;
pub const DISPUTE_MAX_CLOCK_DURATION: u64 = 302400;
pub const EIP1559_DENOMINATOR_CANYON: u64 = 250;
pub const EIP1559_DENOMINATOR: u64 = 50;
pub const EIP1559_ELASTICITY: u64 = 6;

pub const CONTRACTS_V160_TAG: &str = "op-contracts/v1.6.0";
pub const CONTRACTS_V170_BETA1_L2_TAG: &str = "op-contracts/v1.7.0-beta.1+l2-contracts";
pub const CONTRACTS_V180_TAG: &str = "op-contracts/v1.8.0-rc.4";
pub const CONTRACTS_V200_TAG: &str = "op-contracts/v2.0.0-rc.1";
pub const CONTRACTS_V300_TAG: &str = "op-contracts/v3.0.0-rc.2";

pub const DEFAULT_L1_CONTRACTS_TAG: &str = CONTRACTS_V300_TAG;
pub const DEFAULT_L2_CONTRACTS_TAG: &str = CONTRACTS_V300_TAG;

pub const DISPUTE_ABSOLUTE_PRESTATE: H256 = H256(hex!(
    "038512e02c4c3f7bdaec27d00edf55b7155e0905301e1a88083e4e0a6764d54c"
));

pub const GOVERNANCE_TOKEN_OWNER: Address =
    H160(hex!("DeaDDEaDDeAdDeAdDEAdDEaddeAddEAdDEAdDEad"));

/// 10 ether, the minimum withdrawal amount of the fee vaults.
pub fn vault_min_withdrawal_amount() -> U256 {
    U256::from(0x8ac7230489e80000_u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedRelease {
    /// SHA-256 of the archive bytes.
    pub artifacts_hash: H256,
    /// Content hash, used to build the download URL.
    pub content_hash: H256,
}

impl TaggedRelease {
    pub fn url(&self) -> String {
        format!(
            "https://storage.googleapis.com/oplabs-contract-artifacts/artifacts-v1-{}.tar.gz",
            hex::encode(self.content_hash)
        )
    }
}

const TAGGED_RELEASES: [(&str, TaggedRelease); 5] = [
    (
        CONTRACTS_V160_TAG,
        TaggedRelease {
            artifacts_hash: H256(hex!(
                "d20a930cc0ff204c2d93b7aa60755ec7859ba4f328b881f5090c6a6a2a86dcba"
            )),
            content_hash: H256(hex!(
                "e1f0c4020618c4a98972e7124c39686cab2e31d5d7846f9ce5e0d5eed0f5ff32"
            )),
        },
    ),
    (
        CONTRACTS_V170_BETA1_L2_TAG,
        TaggedRelease {
            artifacts_hash: H256(hex!(
                "9e3ad322ec9b2775d59143ce6874892f9b04781742c603ad59165159e90b00b9"
            )),
            content_hash: H256(hex!(
                "b0fb1f6f674519d637cff39a22187a5993d7f81a6d7b7be6507a0b50a5e38597"
            )),
        },
    ),
    (
        CONTRACTS_V180_TAG,
        TaggedRelease {
            artifacts_hash: H256(hex!(
                "78f186df4e9a02a6421bd9c3641b281e297535140967faa428c938286923976a"
            )),
            content_hash: H256(hex!(
                "361ebf1f520c20d932695b00babfff6923ce2530cd05b2776eb74e07038898a6"
            )),
        },
    ),
    (
        CONTRACTS_V200_TAG,
        TaggedRelease {
            artifacts_hash: H256(hex!(
                "32e11c96e07b83619f419595facb273368dccfe2439287549e7b436c9b522204"
            )),
            content_hash: H256(hex!(
                "1cec51ed629c0394b8fb17ff2c6fa45c406c30f94ebbd37d4c90ede6c29ad608"
            )),
        },
    ),
    (
        CONTRACTS_V300_TAG,
        TaggedRelease {
            artifacts_hash: H256(hex!(
                "40661d078e6efe7106b95d6fc5c4fda8db144487d85a47abd246cb3afcb41ab2"
            )),
            content_hash: H256(hex!(
                "147b9fae70608da2975a01be3d98948306f89ba1930af7c917eea41a54d87cdb"
            )),
        },
    ),
];

#[derive(Debug, thiserror::Error)]
pub enum StandardError {
    #[error("unsupported tag: {tag}\nValid tags are:\n{valid}")]
    UnsupportedTag { tag: String, valid: String },
    #[error("invalid release URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

pub fn tagged_release(tag: &str) -> Result<TaggedRelease, StandardError> {
    TAGGED_RELEASES
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, release)| *release)
        .ok_or_else(|| StandardError::UnsupportedTag {
            tag: tag.to_string(),
            valid: TAGGED_RELEASES
                .iter()
                .map(|(name, _)| format!("  {name}\n"))
                .collect(),
        })
}

pub fn artifacts_url_for_tag(tag: &str) -> Result<Url, StandardError> {
    Ok(Url::parse(&tagged_release(tag)?.url())?)
}

pub fn artifacts_hash_for_tag(tag: &str) -> Result<H256, StandardError> {
    Ok(tagged_release(tag)?.artifacts_hash)
}

pub fn is_supported_l1_version(tag: &str) -> bool {
    tag == CONTRACTS_V300_TAG
}

pub fn is_supported_l2_version(tag: &str) -> bool {
    tag == CONTRACTS_V300_TAG
}

/// Genesis offsets of the L2 hardforks, `None` meaning not scheduled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardforkSchedule {
    pub l2_genesis_regolith_time_offset: Option<u64>,
    pub l2_genesis_canyon_time_offset: Option<u64>,
    pub l2_genesis_delta_time_offset: Option<u64>,
    pub l2_genesis_ecotone_time_offset: Option<u64>,
    pub l2_genesis_fjord_time_offset: Option<u64>,
    pub l2_genesis_granite_time_offset: Option<u64>,
    pub l2_genesis_holocene_time_offset: Option<u64>,
    pub l2_genesis_isthmus_time_offset: Option<u64>,
    pub l2_genesis_interop_time_offset: Option<u64>,
    #[serde(default)]
    pub use_interop: bool,
}

impl HardforkSchedule {
    /// Index of the latest fork active at `time`, in the numbering used by
    /// the L2 genesis script (`0` = none, `1` = delta, ... `7` = interop).
    pub fn solidity_fork_number(&self, time: u64) -> u64 {
        let forks = [
            self.l2_genesis_delta_time_offset,
            self.l2_genesis_ecotone_time_offset,
            self.l2_genesis_fjord_time_offset,
            self.l2_genesis_granite_time_offset,
            self.l2_genesis_holocene_time_offset,
            self.l2_genesis_isthmus_time_offset,
            self.l2_genesis_interop_time_offset,
        ];
        forks
            .iter()
            .rposition(|offset| offset.is_some_and(|at| at <= time))
            .map_or(0, |i| i as u64 + 1)
    }
}

/// Hardforks activated at genesis by default for a given contracts tag.
pub fn default_hardfork_schedule_for_tag(tag: &str) -> HardforkSchedule {
    let mut schedule = HardforkSchedule {
        l2_genesis_regolith_time_offset: Some(0),
        l2_genesis_canyon_time_offset: Some(0),
        l2_genesis_delta_time_offset: Some(0),
        l2_genesis_ecotone_time_offset: Some(0),
        l2_genesis_fjord_time_offset: Some(0),
        l2_genesis_granite_time_offset: Some(0),
        ..Default::default()
    };

    match tag {
        CONTRACTS_V160_TAG | CONTRACTS_V170_BETA1_L2_TAG => {}
        CONTRACTS_V180_TAG | CONTRACTS_V200_TAG | CONTRACTS_V300_TAG => {
            schedule.l2_genesis_holocene_time_offset = Some(0);
        }
        _ => {
            schedule.l2_genesis_holocene_time_offset = Some(0);
            schedule.l2_genesis_isthmus_time_offset = Some(0);
        }
    }
    schedule
}

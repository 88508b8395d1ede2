//! Deployment intent (`intent.toml`) and checkpointed pipeline state
//! (`state.json`).

mod chain_intent;
mod deployment;
mod intent;

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use ethereum_types::H256;
use serde::{Serialize, de::DeserializeOwned};

use crate::standard::StandardError;

pub use chain_intent::{
    AdditionalDisputeGame, AltDaConfig, ChainIntent, ChainProofParams, ChainRoles,
    GENERIC_COMMITMENT, KECCAK_COMMITMENT, L2DevGenesisParams, VmType,
};
pub use deployment::{
    AdditionalDisputeGameState, Allocs, ChainState, GenesisAccount, ImplementationsContracts,
    InteropDepSet, InteropDependency, L1BlockRef, L1DevGenesis, OpChainContracts, STATE_VERSION,
    State, SuperchainContracts,
};
pub use intent::{
    Intent, IntentType, L1DevGenesisBlockParams, L1DevGenesisParams, SuperchainProofParams,
    SuperchainRoles,
};

pub const INTENT_FILE: &str = "intent.toml";
pub const STATE_FILE: &str = "state.json";

#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error("l1ChainID cannot be 0")]
    ZeroL1ChainId,
    #[error("L1ContractsLocator undefined")]
    L1LocatorUndefined,
    #[error("L2ContractsLocator undefined")]
    L2LocatorUndefined,
    #[error("must define at least one l2 chain")]
    NoChains,
    #[error("id must be set")]
    ChainIdUnset,
    #[error("{0} cannot be the zero address")]
    ZeroAddress(&'static str),
    #[error("eip1559 param is set to zero value: chainId={0:#x}")]
    Eip1559ZeroValue(H256),
    #[error("chain has a fee vault set to zero address: chainId={0:#x}")]
    FeeVaultZeroAddress(H256),
    #[error("chain contains incompatible config value: {0}")]
    Incompatible(String),
    #[error("chain contains non-standard config value: {0}")]
    NonStandard(String),
    #[error("invalid alt-DA config: {0}")]
    AltDa(String),
    #[error(transparent)]
    UnknownTag(#[from] StandardError),
    #[error("intent type not supported: {0} (valid types: standard, custom, standard-overrides)")]
    UnsupportedIntentType(String),
    #[error("chain {0:#x} not found")]
    ChainNotFound(H256),
    #[error("failed to validate intent-type={config_type}: {source}")]
    Validation {
        config_type: IntentType,
        #[source]
        source: Box<IntentError>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {cause}")]
    Decode { path: PathBuf, cause: String },
    #[error("failed to encode {what}: {cause}")]
    Encode { what: &'static str, cause: String },
    #[error("failed to merge deploy overrides: {0}")]
    Overrides(#[source] serde_json::Error),
    #[error("chain {0:#x} not found in state")]
    ChainNotFound(H256),
}

/// Durable sink for pipeline checkpoints.
pub trait StateWriter: Send + Sync {
    fn write_state(&self, state: &State) -> Result<(), StateError>;
}

/// Writes `state.json` into a working directory.
#[derive(Debug, Clone)]
pub struct WorkdirStateWriter {
    workdir: PathBuf,
}

impl WorkdirStateWriter {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

impl StateWriter for WorkdirStateWriter {
    fn write_state(&self, state: &State) -> Result<(), StateError> {
        write_state(&self.workdir, state)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStateWriter;

impl StateWriter for NoopStateWriter {
    fn write_state(&self, _state: &State) -> Result<(), StateError> {
        Ok(())
    }
}

pub fn read_intent(workdir: &Path) -> Result<Intent, StateError> {
    let path = workdir.join(INTENT_FILE);
    let text = fs::read_to_string(&path).map_err(|source| StateError::Read {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&text).map_err(|e| StateError::Decode {
        path,
        cause: e.to_string(),
    })
}

pub fn write_intent(workdir: &Path, intent: &Intent) -> Result<(), StateError> {
    let text = toml::to_string(intent).map_err(|e| StateError::Encode {
        what: "intent",
        cause: e.to_string(),
    })?;
    write_atomic(&workdir.join(INTENT_FILE), text.as_bytes())
}

pub fn read_state(workdir: &Path) -> Result<State, StateError> {
    let path = workdir.join(STATE_FILE);
    let data = fs::read(&path).map_err(|source| StateError::Read {
        path: path.clone(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|e| StateError::Decode {
        path,
        cause: e.to_string(),
    })
}

pub fn write_state(workdir: &Path, state: &State) -> Result<(), StateError> {
    let data = serde_json::to_vec_pretty(state).map_err(|e| StateError::Encode {
        what: "state",
        cause: e.to_string(),
    })?;
    write_atomic(&workdir.join(STATE_FILE), &data)
}

/// Writes `value` as indented JSON to `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    let data = serde_json::to_vec_pretty(value).map_err(|e| StateError::Encode {
        what: "output",
        cause: e.to_string(),
    })?;
    write_atomic(path, &data)
}

/// Replaces `path` through a temporary sibling so readers never observe a
/// partially written file.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StateError> {
    let write_err = |source| StateError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(data).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Overlays each override map, in order, onto the JSON form of `base`.
/// Unknown keys are ignored.
pub fn merge_overrides<T>(
    base: T,
    overrides: &[&serde_json::Map<String, serde_json::Value>],
) -> Result<T, StateError>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_json::to_value(base).map_err(StateError::Overrides)?;
    if let serde_json::Value::Object(fields) = &mut value {
        for layer in overrides {
            for (key, override_value) in layer.iter() {
                fields.insert(key.clone(), override_value.clone());
            }
        }
    }
    serde_json::from_value(value).map_err(StateError::Overrides)
}

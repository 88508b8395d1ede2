use std::path::PathBuf;

use ethereum_types::H256;
use tracing::info;

use crate::state::{self, Intent, IntentError, IntentType, State, StateError};

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("invalid config for init: {0}")]
    InvalidConfig(&'static str),
    #[error("failed to create workdir {path}: {source}")]
    Workdir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Intent(#[from] IntentError),
    #[error(transparent)]
    State(#[from] StateError),
}

pub struct InitConfig {
    pub intent_type: IntentType,
    pub l1_chain_id: u64,
    pub workdir: PathBuf,
    pub l2_chain_ids: Vec<H256>,
}

impl InitConfig {
    pub fn check(&self) -> Result<(), InitError> {
        if self.l1_chain_id == 0 {
            return Err(InitError::InvalidConfig("l1ChainID must be specified"));
        }
        if self.workdir.as_os_str().is_empty() {
            return Err(InitError::InvalidConfig("workDir must be specified"));
        }
        if self.l2_chain_ids.is_empty() {
            return Err(InitError::InvalidConfig(
                "must specify at least one L2 chain ID",
            ));
        }
        if self.l2_chain_ids.iter().any(H256::is_zero) {
            return Err(InitError::InvalidConfig("L2 chain IDs must be non-zero"));
        }
        Ok(())
    }
}

/// Writes a fresh intent and an empty state into the workdir.
pub fn init(cfg: &InitConfig) -> Result<Intent, InitError> {
    cfg.check()?;

    let intent = Intent::new(cfg.intent_type, cfg.l1_chain_id, &cfg.l2_chain_ids)?;

    std::fs::create_dir_all(&cfg.workdir).map_err(|source| InitError::Workdir {
        path: cfg.workdir.clone(),
        source,
    })?;
    state::write_intent(&cfg.workdir, &intent)?;
    state::write_state(&cfg.workdir, &State::default())?;

    info!(
        workdir = %cfg.workdir.display(),
        intent_type = %cfg.intent_type,
        chains = cfg.l2_chain_ids.len(),
        "Initialized deployment workdir"
    );
    Ok(intent)
}

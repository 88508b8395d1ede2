use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Env, StageError};
use crate::{
    opcm::chain_id_to_u256,
    state::{ChainIntent, ChainState, State},
};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PreStateError(pub String);

/// Per-chain configuration handed to the prestate builder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrestateChainConfig {
    /// Decimal chain id.
    pub chain_id: String,
    pub intent: ChainIntent,
    pub state: ChainState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrestateRequest {
    pub chains: Vec<PrestateChainConfig>,
    pub generate_interop_dep_set: bool,
}

/// Builds fault proof prestates for the deployed chains and returns the
/// resulting manifest (prestate name to hash).
#[async_trait]
pub trait PreStateBuilder: Send + Sync {
    async fn build_prestate(
        &self,
        request: PrestateRequest,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, String>, PreStateError>;
}

pub(super) async fn generate_pre_state(env: &Env, st: &mut State) -> Result<(), StageError> {
    let Some(builder) = &env.prestate_builder else {
        warn!(
            stage = "deploy-pre-state",
            "PreStateBuilder not found - skipping prestate generation"
        );
        return Ok(());
    };

    let intent = &env.intent;
    let mut chains = Vec::with_capacity(intent.chains.len());
    for chain in &intent.chains {
        let state = st.chain(chain.id)?;
        if state.allocs.is_none() {
            return Err(StageError::MissingAllocs(chain.id));
        }
        if state.start_block.is_none() {
            return Err(StageError::MissingStartBlock(chain.id));
        }
        chains.push(PrestateChainConfig {
            chain_id: chain_id_to_u256(chain.id).to_string(),
            intent: chain.clone(),
            state: state.clone(),
        });
    }

    if intent.use_interop {
        info!("Adding the interop dependency set to the prestate build");
    }
    info!(stage = "deploy-pre-state", chains = chains.len(), "Building the prestate");
    let manifest = builder
        .build_prestate(
            PrestateRequest {
                chains,
                generate_interop_dep_set: intent.use_interop,
            },
            &env.cancel,
        )
        .await?;
    info!("Prestate built successfully");
    st.prestate_manifest = Some(manifest);
    Ok(())
}

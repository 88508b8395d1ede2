//! The staged deployment pipeline.
//!
//! [`build_stages`] decides the full, ordered stage list up front from the
//! intent and the deployment target. [`run_stages`] applies them one at a
//! time, flushing the broadcaster and checkpointing the state after each
//! one, so a failed run can be resumed from the last written state.

mod alt_da;
mod dispute_games;
mod implementations;
mod init;
mod interop_depset;
mod l2genesis;
mod opchain;
mod pre_state;
mod prefund;
mod seal;
mod start_block;
mod superchain;

use std::{fmt, str::FromStr, sync::Arc};

use ethereum_types::{Address, H256};
use futures::{FutureExt, future::BoxFuture};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    artifacts::{ArtifactsError, ArtifactsFs},
    broadcaster::{Broadcaster, BroadcasterError},
    rpc::{L1Client, RpcError},
    script::{ScriptError, ScriptHost, ScriptHostFactory},
    state::{IntentError, State, StateError, StateWriter},
};

pub use pre_state::{PreStateBuilder, PreStateError, PrestateChainConfig, PrestateRequest};

/// Where the pipeline's effects end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentTarget {
    /// Signed and sent to the L1.
    Live,
    /// Executed in memory to build a development L1 genesis.
    Genesis,
    /// Recorded as calldata for out-of-band execution.
    Calldata,
    /// Executed against a fork and discarded.
    Noop,
}

impl DeploymentTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentTarget::Live => "live",
            DeploymentTarget::Genesis => "genesis",
            DeploymentTarget::Calldata => "calldata",
            DeploymentTarget::Noop => "noop",
        }
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self, DeploymentTarget::Genesis)
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentTarget {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(DeploymentTarget::Live),
            "genesis" => Ok(DeploymentTarget::Genesis),
            "calldata" => Ok(DeploymentTarget::Calldata),
            "noop" => Ok(DeploymentTarget::Noop),
            other => Err(PipelineError::InvalidDeploymentTarget(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Intent(#[from] IntentError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("{context}: {source}")]
    Script {
        context: &'static str,
        #[source]
        source: ScriptError,
    },
    #[error("{context}: {source}")]
    Rpc {
        context: &'static str,
        #[source]
        source: RpcError,
    },
    #[error("unsupported state version: {0}")]
    UnsupportedStateVersion(u32),
    #[error("unsupported L1 version: {0}")]
    UnsupportedL1Version(String),
    #[error("unsupported L2 version: {0}")]
    UnsupportedL2Version(String),
    #[error("cannot set {0} for predeployed OPCM")]
    PredeployedOpcm(&'static str),
    #[error("l1 chain ID mismatch: got {got}, expected {expected}")]
    L1ChainIdMismatch { got: u64, expected: u64 },
    #[error("deterministic deployer is not deployed on this chain - please deploy it first")]
    MissingDeterministicDeployer,
    #[error("{field} is immutable: was {was}, is {is}")]
    Immutable {
        field: &'static str,
        was: String,
        is: String,
    },
    #[error("superchain roles must be set for genesis strategy")]
    MissingSuperchainRoles,
    #[error("{0} must be deployed first")]
    MissingDependency(&'static str),
    #[error("an L1 client is required for the {0} strategy")]
    MissingL1Client(&'static str),
    #[error("cannot deploy additional dispute games when deployer is not L1PAO")]
    DeployerNotL1ProxyAdminOwner,
    #[error("expecting isthmus fork to be enabled for interop deployments")]
    InteropRequiresIsthmus,
    #[error("failed to merge deploy overrides: {0}")]
    Overrides(#[source] StateError),
    #[error("L2 genesis for chain {0:#x} has not been generated")]
    MissingAllocs(H256),
    #[error("start block for chain {0:#x} has not been set")]
    MissingStartBlock(H256),
    #[error("must seal L1 genesis state before determining start-block")]
    UnsealedL1Genesis,
    #[error("failed to build prestate: {0}")]
    PreState(#[from] PreStateError),
    #[error("failed to seal L1 dev genesis: {0}")]
    Seal(String),
    #[error("stage cancelled")]
    Cancelled,
}

impl StageError {
    pub(crate) fn script(context: &'static str) -> impl Fn(ScriptError) -> StageError {
        move |source| StageError::Script { context, source }
    }

    pub(crate) fn rpc(context: &'static str) -> impl Fn(RpcError) -> StageError {
        move |source| StageError::Rpc { context, source }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Intent(#[from] IntentError),
    #[error("invalid deployment target: '{0}'")]
    InvalidDeploymentTarget(String),
    #[error("failed to download {which} artifacts: {source}")]
    Artifacts {
        which: &'static str,
        #[source]
        source: ArtifactsError,
    },
    #[error("failed to create {which} script host: {source}")]
    Host {
        which: &'static str,
        #[source]
        source: ScriptError,
    },
    #[error("{context}: {source}")]
    Rpc {
        context: &'static str,
        #[source]
        source: RpcError,
    },
    #[error("an L1 client is required for deployment target {0}")]
    MissingL1Client(DeploymentTarget),
    #[error("a signer is required for deployment target {0}")]
    MissingSigner(DeploymentTarget),
    #[error("error in pipeline stage {stage}: {source}")]
    Stage {
        stage: String,
        #[source]
        source: StageError,
    },
    #[error("failed to broadcast stage {stage}: {source}")]
    Broadcast {
        stage: String,
        #[source]
        source: BroadcasterError,
    },
    #[error("failed to write state after {stage}: {source}")]
    WriteState {
        stage: String,
        #[source]
        source: StateError,
    },
    #[error("pipeline cancelled at stage {stage}")]
    Cancelled { stage: String },
    #[error("pipeline cancelled before any stage ran")]
    CancelledBeforeStart,
}

/// Collaborators shared by every stage of a run.
pub struct Env {
    pub intent: crate::state::Intent,
    pub target: DeploymentTarget,
    pub deployer: Address,
    pub l1_host: Arc<dyn ScriptHost>,
    pub l1_client: Option<Arc<dyn L1Client>>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub state_writer: Arc<dyn StateWriter>,
    pub host_factory: Arc<dyn ScriptHostFactory>,
    pub l2_artifacts: ArtifactsFs,
    pub prestate_builder: Option<Arc<dyn PreStateBuilder>>,
    pub cancel: CancellationToken,
}

impl Env {
    /// Runs `fut` unless the run is cancelled first.
    pub(crate) async fn cancellable<T, F>(&self, fut: F) -> Result<T, StageError>
    where
        F: std::future::Future<Output = Result<T, StageError>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(StageError::Cancelled),
            result = fut => result,
        }
    }

    pub(crate) fn require_l1_client(
        &self,
        strategy: &'static str,
    ) -> Result<&Arc<dyn L1Client>, StageError> {
        self.l1_client
            .as_ref()
            .ok_or(StageError::MissingL1Client(strategy))
    }
}

type StageFn =
    Box<dyn for<'s> Fn(&'s Env, &'s mut State) -> BoxFuture<'s, Result<(), StageError>> + Send + Sync>;

/// A named unit of work over the shared state.
pub struct Stage {
    name: String,
    apply: StageFn,
}

impl Stage {
    pub fn new<F>(name: impl Into<String>, apply: F) -> Self
    where
        F: for<'s> Fn(&'s Env, &'s mut State) -> BoxFuture<'s, Result<(), StageError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            apply: Box::new(apply),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage").field("name", &self.name).finish()
    }
}

fn chain_stage_name(prefix: &str, id: H256) -> String {
    format!("{prefix}-{id:#x}")
}

/// Builds the ordered stage list for `env.intent` and `env.target`.
pub fn build_stages(env: &Env) -> Vec<Stage> {
    let intent = &env.intent;
    let genesis = env.target.is_genesis();

    let mut stages = vec![
        Stage::new("init", |env, st| init::init(env, st).boxed()),
        Stage::new("deploy-superchain", |env, st| {
            superchain::deploy_superchain(env, st).boxed()
        }),
        Stage::new("deploy-implementations", |env, st| {
            implementations::deploy_implementations(env, st).boxed()
        }),
    ];

    for chain in &intent.chains {
        let id = chain.id;
        stages.push(Stage::new(
            chain_stage_name("deploy-opchain", id),
            move |env, st| opchain::deploy_op_chain(env, st, id).boxed(),
        ));
        stages.push(Stage::new(
            chain_stage_name("deploy-alt-da", id),
            move |env, st| alt_da::deploy_alt_da(env, st, id).boxed(),
        ));
        stages.push(Stage::new(
            chain_stage_name("deploy-additional-dispute-games", id),
            move |env, st| dispute_games::deploy_additional_dispute_games(env, st, id).boxed(),
        ));
        stages.push(Stage::new(
            chain_stage_name("generate-l2-genesis", id),
            move |env, st| l2genesis::generate_l2_genesis(env, st, id).boxed(),
        ));
    }

    if genesis {
        for chain in &intent.chains {
            let id = chain.id;
            stages.push(Stage::new(
                chain_stage_name("prefund-l2-dev-genesis", id),
                move |env, st| prefund::prefund_l2_dev_genesis(env, st, id).boxed(),
            ));
        }
        stages.push(Stage::new("prefund-l1-dev-genesis", |env, st| {
            prefund::prefund_l1_dev_genesis(env, st).boxed()
        }));
        stages.push(Stage::new("preinstall-l1-dev-genesis", |env, st| {
            prefund::preinstall_l1_dev_genesis(env, st).boxed()
        }));
        stages.push(Stage::new("seal-l1-dev-genesis", |env, st| {
            seal::seal_l1_dev_genesis(env, st).boxed()
        }));
    }

    // Start blocks come last so every chain already exists in a genesis L1.
    for chain in &intent.chains {
        let id = chain.id;
        stages.push(Stage::new(
            chain_stage_name("set-start-block", id),
            move |env, st| start_block::set_start_block(env, st, id).boxed(),
        ));
    }

    if intent.use_interop {
        stages.push(Stage::new("generate-interop-depset", |env, st| {
            interop_depset::generate_interop_depset(env, st).boxed()
        }));
    }

    stages.push(Stage::new("deploy-pre-state", |env, st| {
        pre_state::generate_pre_state(env, st).boxed()
    }));

    stages
}

/// Applies `stages` in order. After each stage the broadcaster is flushed
/// and the state is written; the first failure stops the run. Cancellation
/// aborts the running stage without checkpointing it.
pub async fn run_stages(env: &Env, stages: &[Stage], st: &mut State) -> Result<(), PipelineError> {
    for stage in stages {
        if env.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                stage: stage.name.clone(),
            });
        }

        info!(stage = %stage.name, target = %env.target, "Applying pipeline stage");
        // Dropping the stage future abandons whatever it was awaiting; the
        // state it touched is never written.
        let applied = tokio::select! {
            biased;
            _ = env.cancel.cancelled() => {
                return Err(PipelineError::Cancelled {
                    stage: stage.name.clone(),
                });
            }
            applied = (stage.apply)(env, st) => applied,
        };
        applied.map_err(|source| PipelineError::Stage {
            stage: stage.name.clone(),
            source,
        })?;

        env.broadcaster
            .broadcast(&env.cancel)
            .await
            .map_err(|source| PipelineError::Broadcast {
                stage: stage.name.clone(),
                source,
            })?;

        env.state_writer
            .write_state(st)
            .map_err(|source| PipelineError::WriteState {
                stage: stage.name.clone(),
                source,
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_target_parses_known_names() {
        for target in [
            DeploymentTarget::Live,
            DeploymentTarget::Genesis,
            DeploymentTarget::Calldata,
            DeploymentTarget::Noop,
        ] {
            assert_eq!(target.as_str().parse::<DeploymentTarget>().unwrap(), target);
        }
        let err = "mainnet".parse::<DeploymentTarget>().unwrap_err();
        assert_eq!(err.to_string(), "invalid deployment target: 'mainnet'");
    }

    #[test]
    fn chain_stage_names_use_full_hex_id() {
        assert_eq!(
            chain_stage_name("deploy-opchain", H256::from_low_u64_be(0x385)),
            "deploy-opchain-0x0000000000000000000000000000000000000000000000000000000000000385"
        );
    }
}

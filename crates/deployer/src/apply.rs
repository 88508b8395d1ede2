//! Entry points that run the deployment pipeline against a working
//! directory.

use std::{path::PathBuf, sync::Arc};

use ethereum_types::Address;
use hex_literal::hex;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use crate::{
    artifacts::{self, DownloadProgressor},
    broadcaster::{Broadcaster, CalldataBroadcaster, KeyedBroadcaster, NoopBroadcaster},
    pipeline::{self, Env, PipelineError, PreStateBuilder},
    rpc::{EthRpcClient, L1Client},
    script::{ForkConfig, HostConfig, ProcessScriptHostFactory, ScriptHostFactory},
    signer::{LocalSigner, SignerError, TxSigner},
    state::{self, Intent, State, StateError, StateWriter, WorkdirStateWriter},
};

pub use crate::pipeline::DeploymentTarget;

/// Deployer used when no key is configured.
pub const DEFAULT_DEPLOYER: Address =
    ethereum_types::H160(hex!("0100000000000000000000000000000000000000"));

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("invalid config for apply: {0}")]
    InvalidConfig(&'static str),
    #[error("failed to parse private key: {0}")]
    PrivateKey(#[source] SignerError),
    #[error("failed to read intent: {0}")]
    ReadIntent(#[source] StateError),
    #[error("failed to read state: {0}")]
    ReadState(#[source] StateError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// An L1 endpoint together with the URL script hosts fork from.
#[derive(Clone)]
pub struct L1Connection {
    pub client: Arc<dyn L1Client>,
    pub rpc_url: Url,
}

impl L1Connection {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            client: Arc::new(EthRpcClient::new(rpc_url.clone())),
            rpc_url,
        }
    }
}

pub struct ApplyConfig {
    pub l1_rpc_url: Option<Url>,
    pub workdir: PathBuf,
    pub private_key: Option<String>,
    pub target: DeploymentTarget,
    pub cache_dir: PathBuf,
    /// Scripting engine binary and the arguments it is started with.
    pub script_engine: PathBuf,
    pub script_engine_args: Vec<String>,
    pub prestate_builder: Option<Arc<dyn PreStateBuilder>>,
}

impl ApplyConfig {
    /// Validates the configuration and parses the deployer key, if any.
    pub fn check(&self) -> Result<Option<LocalSigner>, ApplyError> {
        if self.workdir.as_os_str().is_empty() {
            return Err(ApplyError::InvalidConfig("workdir must be specified"));
        }

        let signer = self
            .private_key
            .as_deref()
            .map(LocalSigner::from_hex)
            .transpose()
            .map_err(ApplyError::PrivateKey)?;

        match self.target {
            DeploymentTarget::Genesis if self.l1_rpc_url.is_some() => {
                return Err(ApplyError::InvalidConfig(
                    "l1-rpc-url should not be specified when deployment-target is genesis",
                ));
            }
            DeploymentTarget::Live => {
                if self.l1_rpc_url.is_none() {
                    return Err(ApplyError::InvalidConfig(
                        "l1 RPC URL must be specified for live deployment",
                    ));
                }
                if signer.is_none() {
                    return Err(ApplyError::InvalidConfig(
                        "private key must be specified for live deployment",
                    ));
                }
            }
            DeploymentTarget::Calldata | DeploymentTarget::Noop if self.l1_rpc_url.is_none() => {
                return Err(ApplyError::InvalidConfig(
                    "l1 RPC URL must be specified for calldata and noop deployments",
                ));
            }
            _ => {}
        }
        Ok(signer)
    }
}

/// Reads the workdir, runs the pipeline and checkpoints into the workdir.
pub async fn apply(cfg: ApplyConfig, cancel: CancellationToken) -> Result<(), ApplyError> {
    let signer = cfg.check()?;

    let intent = state::read_intent(&cfg.workdir).map_err(ApplyError::ReadIntent)?;
    let st = state::read_state(&cfg.workdir).map_err(ApplyError::ReadState)?;

    let host_factory =
        ProcessScriptHostFactory::new(&cfg.script_engine).with_args(cfg.script_engine_args);

    apply_pipeline(ApplyPipelineOpts {
        intent,
        state: st,
        target: cfg.target,
        state_writer: Arc::new(WorkdirStateWriter::new(&cfg.workdir)),
        cache_dir: cfg.cache_dir,
        l1: cfg.l1_rpc_url.map(L1Connection::new),
        signer: signer.map(|s| Arc::new(s) as Arc<dyn TxSigner>),
        host_factory: Arc::new(host_factory),
        prestate_builder: cfg.prestate_builder,
        progressor: Some(artifacts::log_progressor()),
        cancel,
    })
    .await?;
    Ok(())
}

pub struct ApplyPipelineOpts {
    pub intent: Intent,
    pub state: State,
    pub target: DeploymentTarget,
    pub state_writer: Arc<dyn StateWriter>,
    pub cache_dir: PathBuf,
    pub l1: Option<L1Connection>,
    pub signer: Option<Arc<dyn TxSigner>>,
    pub host_factory: Arc<dyn ScriptHostFactory>,
    pub prestate_builder: Option<Arc<dyn PreStateBuilder>>,
    pub progressor: Option<DownloadProgressor>,
    pub cancel: CancellationToken,
}

/// Runs every stage for `opts.intent` and returns the final state, which has
/// also been handed to the state writer.
pub async fn apply_pipeline(opts: ApplyPipelineOpts) -> Result<State, PipelineError> {
    let ApplyPipelineOpts {
        intent,
        mut state,
        target,
        state_writer,
        cache_dir,
        l1,
        signer,
        host_factory,
        prestate_builder,
        progressor,
        cancel,
    } = opts;

    intent.check()?;

    let l1_locator = intent.l1_locator()?;
    let l2_locator = intent.l2_locator()?;
    let l1_artifacts = artifacts::download(l1_locator, progressor.clone(), &cache_dir, &cancel)
        .await
        .map_err(|source| PipelineError::Artifacts { which: "L1", source })?;
    let l2_artifacts = if l1_locator.equal(l2_locator) {
        l1_artifacts.clone()
    } else {
        artifacts::download(l2_locator, progressor, &cache_dir, &cancel)
            .await
            .map_err(|source| PipelineError::Artifacts { which: "L2", source })?
    };

    let deployer = signer
        .as_ref()
        .map(|signer| signer.address())
        .unwrap_or(DEFAULT_DEPLOYER);

    let mut calldata = None;
    let broadcaster: Arc<dyn Broadcaster> = match target {
        DeploymentTarget::Live => {
            let l1 = l1.as_ref().ok_or(PipelineError::MissingL1Client(target))?;
            let signer = signer.clone().ok_or(PipelineError::MissingSigner(target))?;
            Arc::new(KeyedBroadcaster::new(
                l1.client.clone(),
                signer,
                intent.l1_chain_id,
            ))
        }
        DeploymentTarget::Calldata | DeploymentTarget::Noop => {
            let recorder = Arc::new(CalldataBroadcaster::new());
            calldata = Some(recorder.clone());
            recorder
        }
        DeploymentTarget::Genesis => Arc::new(NoopBroadcaster),
    };

    let fork = match (&l1, target) {
        (_, DeploymentTarget::Genesis) => None,
        (Some(l1), _) => {
            let latest = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::CancelledBeforeStart),
                latest = l1.client.latest_header() => latest.map_err(|source| PipelineError::Rpc {
                    context: "failed to get latest block",
                    source,
                })?,
            };
            Some(ForkConfig {
                rpc_url: l1.rpc_url.clone(),
                block_number: latest.number,
            })
        }
        (None, _) => return Err(PipelineError::MissingL1Client(target)),
    };

    info!(
        target = %target,
        deployer = ?deployer,
        forked_at = fork.as_ref().map(|f| f.block_number),
        "Starting deployment pipeline"
    );

    let l1_host = host_factory
        .create(HostConfig {
            artifacts: l1_artifacts,
            deployer,
            broadcaster: broadcaster.clone(),
            fork,
        })
        .await
        .map_err(|source| PipelineError::Host { which: "L1", source })?;

    let env = Env {
        intent,
        target,
        deployer,
        l1_host,
        l1_client: l1.map(|l1| l1.client),
        broadcaster,
        state_writer,
        host_factory,
        l2_artifacts,
        prestate_builder,
        cancel,
    };

    let stages = pipeline::build_stages(&env);
    pipeline::run_stages(&env, &stages, &mut state).await?;

    if let Some(calldata) = calldata.filter(|_| target == DeploymentTarget::Calldata) {
        state.deployment_calldata = calldata.dump();
    }
    state.applied_intent = Some(env.intent.clone());
    env.state_writer
        .write_state(&state)
        .map_err(|source| PipelineError::WriteState {
            stage: "finalize".into(),
            source,
        })?;

    info!(stages = stages.len(), "Deployment pipeline complete");
    Ok(state)
}

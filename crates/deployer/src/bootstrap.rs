//! One-off deployments of shared L1 contracts outside the staged pipeline.
//!
//! Each command forks L1 at its current head, runs a single deployment
//! script with a keyed broadcaster and submits the resulting transactions.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use crate::{
    apply::L1Connection,
    artifacts::{self, ArtifactsError, DownloadProgressor, Locator},
    broadcaster::{Broadcaster, BroadcasterError, KeyedBroadcaster},
    opcm::{
        self, DeployImplementationsInput, DeployImplementationsOutput, DeploySuperchainInput,
        DeploySuperchainOutput,
    },
    rpc::RpcError,
    script::{
        ForkConfig, HostConfig, ProcessScriptHostFactory, ScriptError, ScriptHost,
        ScriptHostFactory,
    },
    signer::{LocalSigner, SignerError, TxSigner},
    state::{self, StateError},
};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("failed to parse private key: {0}")]
    PrivateKey(#[source] SignerError),
    #[error("failed to download artifacts: {0}")]
    Artifacts(#[source] ArtifactsError),
    #[error("{context}: {source}")]
    Rpc {
        context: &'static str,
        #[source]
        source: RpcError,
    },
    #[error("failed to create script host: {0}")]
    Host(#[source] ScriptError),
    #[error("{context}: {source}")]
    Script {
        context: &'static str,
        #[source]
        source: ScriptError,
    },
    #[error("failed to broadcast: {0}")]
    Broadcast(#[source] BroadcasterError),
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] StateError),
    #[error("bootstrap cancelled")]
    Cancelled,
}

/// Settings shared by every bootstrap command.
pub struct BootstrapConfig {
    pub l1_rpc_url: Url,
    pub private_key: String,
    pub artifacts_locator: Locator,
    pub cache_dir: PathBuf,
    pub script_engine: PathBuf,
    pub script_engine_args: Vec<String>,
    /// Output file. Printed to stdout when unset.
    pub outfile: Option<PathBuf>,
}

pub struct BootstrapOpts {
    pub l1: L1Connection,
    pub signer: Arc<dyn TxSigner>,
    pub artifacts_locator: Locator,
    pub cache_dir: PathBuf,
    pub host_factory: Arc<dyn ScriptHostFactory>,
    pub progressor: Option<DownloadProgressor>,
    /// Receipt polling interval; the broadcaster default when unset.
    pub receipt_poll_interval: Option<Duration>,
    pub cancel: CancellationToken,
}

/// A script host forked from L1 whose broadcasts go out through a local key.
pub struct Bootstrapper {
    host: Arc<dyn ScriptHost>,
    broadcaster: Arc<KeyedBroadcaster>,
    cancel: CancellationToken,
}

impl Bootstrapper {
    pub async fn connect(opts: BootstrapOpts) -> Result<Self, BootstrapError> {
        let BootstrapOpts {
            l1,
            signer,
            artifacts_locator,
            cache_dir,
            host_factory,
            progressor,
            receipt_poll_interval,
            cancel,
        } = opts;

        let artifacts = artifacts::download(&artifacts_locator, progressor, &cache_dir, &cancel)
            .await
            .map_err(BootstrapError::Artifacts)?;

        let chain_id = or_cancelled(&cancel, async {
            l1.client.chain_id().await.map_err(|source| BootstrapError::Rpc {
                context: "failed to get L1 chain ID",
                source,
            })
        })
        .await?;
        let head = or_cancelled(&cancel, async {
            l1.client
                .latest_header()
                .await
                .map_err(|source| BootstrapError::Rpc {
                    context: "failed to get latest block",
                    source,
                })
        })
        .await?;

        let mut broadcaster = KeyedBroadcaster::new(l1.client.clone(), signer.clone(), chain_id);
        if let Some(interval) = receipt_poll_interval {
            broadcaster = broadcaster.with_receipt_poll_interval(interval);
        }
        let broadcaster = Arc::new(broadcaster);

        let host = host_factory
            .create(HostConfig {
                artifacts,
                deployer: signer.address(),
                broadcaster: broadcaster.clone(),
                fork: Some(ForkConfig {
                    rpc_url: l1.rpc_url.clone(),
                    block_number: head.number,
                }),
            })
            .await
            .map_err(BootstrapError::Host)?;

        info!(
            chain_id,
            forked_at = head.number,
            deployer = %format!("{:#x}", signer.address()),
            "Bootstrap host ready"
        );
        Ok(Self {
            host,
            broadcaster,
            cancel,
        })
    }

    pub async fn deploy_superchain(
        &self,
        input: &DeploySuperchainInput,
    ) -> Result<DeploySuperchainOutput, BootstrapError> {
        info!("Deploying superchain");
        let out = or_cancelled(&self.cancel, async {
            opcm::deploy_superchain(self.host.as_ref(), input)
                .await
                .map_err(|source| BootstrapError::Script {
                    context: "failed to deploy superchain",
                    source,
                })
        })
        .await?;
        self.broadcast().await?;
        Ok(out)
    }

    pub async fn deploy_implementations(
        &self,
        input: &DeployImplementationsInput,
    ) -> Result<DeployImplementationsOutput, BootstrapError> {
        info!(release = %input.l1_contracts_release, "Deploying implementations");
        let out = or_cancelled(&self.cancel, async {
            opcm::deploy_implementations(self.host.as_ref(), input)
                .await
                .map_err(|source| BootstrapError::Script {
                    context: "error deploying implementations",
                    source,
                })
        })
        .await?;
        self.broadcast().await?;
        Ok(out)
    }

    async fn broadcast(&self) -> Result<(), BootstrapError> {
        let results = self
            .broadcaster
            .broadcast(&self.cancel)
            .await
            .map_err(|e| match e {
                BroadcasterError::Cancelled => BootstrapError::Cancelled,
                e => BootstrapError::Broadcast(e),
            })?;
        info!(count = results.len(), "Bootstrap transactions confirmed");
        Ok(())
    }
}

async fn or_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, BootstrapError>>,
) -> Result<T, BootstrapError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BootstrapError::Cancelled),
        result = fut => result,
    }
}

async fn connect(
    cfg: &BootstrapConfig,
    cancel: CancellationToken,
) -> Result<Bootstrapper, BootstrapError> {
    let signer = LocalSigner::from_hex(&cfg.private_key).map_err(BootstrapError::PrivateKey)?;
    let host_factory = ProcessScriptHostFactory::new(&cfg.script_engine)
        .with_args(cfg.script_engine_args.clone());
    Bootstrapper::connect(BootstrapOpts {
        l1: L1Connection::new(cfg.l1_rpc_url.clone()),
        signer: Arc::new(signer),
        artifacts_locator: cfg.artifacts_locator.clone(),
        cache_dir: cfg.cache_dir.clone(),
        host_factory: Arc::new(host_factory),
        progressor: Some(artifacts::log_progressor()),
        receipt_poll_interval: None,
        cancel,
    })
    .await
}

fn emit<T: serde::Serialize>(outfile: Option<&Path>, out: &T) -> Result<(), BootstrapError> {
    match outfile {
        Some(path) => {
            state::write_json(path, out).map_err(BootstrapError::WriteOutput)?;
            info!(path = %path.display(), "Wrote bootstrap output");
        }
        None => {
            let text = serde_json::to_string_pretty(out).map_err(|e| {
                BootstrapError::WriteOutput(StateError::Encode {
                    what: "output",
                    cause: e.to_string(),
                })
            })?;
            println!("{text}");
        }
    }
    Ok(())
}

/// Deploys the superchain contracts and emits their addresses.
pub async fn superchain(
    cfg: BootstrapConfig,
    input: DeploySuperchainInput,
    cancel: CancellationToken,
) -> Result<DeploySuperchainOutput, BootstrapError> {
    let bootstrapper = connect(&cfg, cancel).await?;
    let out = bootstrapper.deploy_superchain(&input).await?;
    emit(cfg.outfile.as_deref(), &out)?;
    Ok(out)
}

/// Deploys a release's implementation contracts and emits their addresses.
pub async fn implementations(
    cfg: BootstrapConfig,
    input: DeployImplementationsInput,
    cancel: CancellationToken,
) -> Result<DeployImplementationsOutput, BootstrapError> {
    let bootstrapper = connect(&cfg, cancel).await?;
    let out = bootstrapper.deploy_implementations(&input).await?;
    emit(cfg.outfile.as_deref(), &out)?;
    Ok(out)
}

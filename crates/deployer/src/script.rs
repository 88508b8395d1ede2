//! Seam to the external scripting engine that executes contract deployment
//! scripts.
//!
//! The engine runs against a resolved artifacts tree and reports every ledger
//! call it would make to the [`Broadcaster`] it was constructed with.
//! [`ProcessScriptHost`] drives an engine binary over a line-delimited JSON
//! protocol on its stdin/stdout.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use async_trait::async_trait;
use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    sync::Mutex,
};
use tracing::{debug, info};
use url::Url;

use crate::{
    artifacts::ArtifactsFs,
    broadcaster::{Broadcast, Broadcaster},
    state::Allocs,
};

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to start script engine {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("script engine I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("script engine exited unexpectedly")]
    EngineExited,
    #[error("script engine was interrupted mid-request and can no longer be used")]
    Interrupted,
    #[error("malformed script engine message: {0}")]
    Protocol(String),
    #[error("script {script} failed: {message}")]
    Failed { script: String, message: String },
    #[error("failed to decode output of {script}: {cause}")]
    Output { script: String, cause: String },
    #[error("failed to encode input of {script}: {cause}")]
    Input { script: String, cause: String },
}

/// Remote L1 state a host forks from instead of starting empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkConfig {
    pub rpc_url: Url,
    pub block_number: u64,
}

/// Everything a host is constructed with.
#[derive(Clone)]
pub struct HostConfig {
    pub artifacts: ArtifactsFs,
    pub deployer: Address,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub fork: Option<ForkConfig>,
}

#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Runs `script` with a JSON input and returns its JSON output.
    async fn run(&self, script: &str, input: Value) -> Result<Value, ScriptError>;

    /// Overwrites the balance of `address` in the host's state.
    async fn set_balance(&self, address: Address, amount: U256) -> Result<(), ScriptError>;

    /// Removes `address` and its storage from the host's state.
    async fn wipe(&self, address: Address) -> Result<(), ScriptError>;

    /// Dumps every account in the host's state.
    async fn state_dump(&self) -> Result<Allocs, ScriptError>;
}

#[async_trait]
pub trait ScriptHostFactory: Send + Sync {
    async fn create(&self, config: HostConfig) -> Result<Arc<dyn ScriptHost>, ScriptError>;
}

#[derive(Debug, Serialize)]
struct EngineRequest<'a> {
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct EngineResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    broadcasts: Vec<Broadcast>,
    #[serde(default)]
    error: Option<String>,
}

struct EngineIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    /// Set while a request awaits its reply. Still set on entry means the
    /// previous request was dropped and its reply may be pending.
    in_flight: bool,
}

/// Script host backed by a long-lived engine process.
///
/// Each request is one JSON line on the engine's stdin; the engine answers
/// with one JSON line carrying the result, the broadcasts the call recorded
/// and an optional error message. A request abandoned before its reply
/// arrives leaves the host unusable, since the late reply would otherwise
/// answer the next request.
pub struct ProcessScriptHost {
    io: Mutex<EngineIo>,
    broadcaster: Arc<dyn Broadcaster>,
    _child: Child,
}

impl ProcessScriptHost {
    pub fn spawn(
        program: &Path,
        extra_args: &[String],
        config: HostConfig,
    ) -> Result<Self, ScriptError> {
        let mut cmd = Command::new(program);
        cmd.args(extra_args)
            .arg("--artifacts")
            .arg(config.artifacts.root())
            .arg("--deployer")
            .arg(format!("{:#x}", config.deployer));
        if let Some(fork) = &config.fork {
            cmd.arg("--fork-url")
                .arg(fork.rpc_url.as_str())
                .arg("--fork-block")
                .arg(fork.block_number.to_string());
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ScriptError::Spawn {
            program: program.display().to_string(),
            source,
        })?;
        let stdin = child.stdin.take().ok_or(ScriptError::EngineExited)?;
        let stdout = child.stdout.take().ok_or(ScriptError::EngineExited)?;

        info!(
            program = %program.display(),
            artifacts = %config.artifacts.root().display(),
            forked = config.fork.is_some(),
            "Started script engine"
        );

        Ok(Self {
            io: Mutex::new(EngineIo {
                stdin,
                stdout: BufReader::new(stdout),
                in_flight: false,
            }),
            broadcaster: config.broadcaster,
            _child: child,
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ScriptError> {
        let mut line = serde_json::to_string(&EngineRequest { method, params })
            .map_err(|e| ScriptError::Protocol(e.to_string()))?;
        line.push('\n');

        let mut io = self.io.lock().await;
        if io.in_flight {
            return Err(ScriptError::Interrupted);
        }
        io.in_flight = true;
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        let mut reply = String::new();
        if io.stdout.read_line(&mut reply).await? == 0 {
            return Err(ScriptError::EngineExited);
        }
        io.in_flight = false;
        drop(io);

        let response: EngineResponse = serde_json::from_str(reply.trim_end())
            .map_err(|e| ScriptError::Protocol(e.to_string()))?;
        debug!(
            method,
            broadcasts = response.broadcasts.len(),
            "Script engine replied"
        );
        for broadcast in response.broadcasts {
            self.broadcaster.hook(broadcast);
        }
        match response.error {
            Some(message) => Err(ScriptError::Failed {
                script: method.to_string(),
                message,
            }),
            None => Ok(response.result),
        }
    }
}

#[async_trait]
impl ScriptHost for ProcessScriptHost {
    async fn run(&self, script: &str, input: Value) -> Result<Value, ScriptError> {
        self.request("run", json!({ "script": script, "input": input }))
            .await
            .map_err(|err| match err {
                ScriptError::Failed { message, .. } => ScriptError::Failed {
                    script: script.to_string(),
                    message,
                },
                other => other,
            })
    }

    async fn set_balance(&self, address: Address, amount: U256) -> Result<(), ScriptError> {
        self.request("setBalance", json!({ "address": address, "amount": amount }))
            .await
            .map(|_| ())
    }

    async fn wipe(&self, address: Address) -> Result<(), ScriptError> {
        self.request("wipe", json!({ "address": address }))
            .await
            .map(|_| ())
    }

    async fn state_dump(&self) -> Result<Allocs, ScriptError> {
        let dump = self.request("stateDump", Value::Null).await?;
        serde_json::from_value(dump).map_err(|e| ScriptError::Output {
            script: "stateDump".into(),
            cause: e.to_string(),
        })
    }
}

/// Starts one engine process per host.
#[derive(Debug, Clone)]
pub struct ProcessScriptHostFactory {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl ProcessScriptHostFactory {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args.extend(args);
        self
    }
}

#[async_trait]
impl ScriptHostFactory for ProcessScriptHostFactory {
    async fn create(&self, config: HostConfig) -> Result<Arc<dyn ScriptHost>, ScriptError> {
        let host = ProcessScriptHost::spawn(&self.program, &self.extra_args, config)?;
        Ok(Arc::new(host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::CalldataBroadcaster;

    #[test]
    fn engine_response_defaults_missing_fields() {
        let response: EngineResponse = serde_json::from_str(r#"{"result":{"a":1}}"#).unwrap();
        assert_eq!(response.result, json!({"a": 1}));
        assert!(response.broadcasts.is_empty());
        assert!(response.error.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_host_hooks_reported_broadcasts() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("engine.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nwhile read line; do echo '{\"result\":{\"ok\":true},\"broadcasts\":[{\"to\":null,\"input\":\"0xdead\",\"value\":\"0x0\"}]}'; done\n",
        )
        .unwrap();

        let calldata = Arc::new(CalldataBroadcaster::new());
        let factory = ProcessScriptHostFactory::new("/bin/sh").with_args([script
            .display()
            .to_string()]);
        let host = factory
            .create(HostConfig {
                artifacts: ArtifactsFs::from_dir(dir.path()),
                deployer: Address::repeat_byte(1),
                broadcaster: calldata.clone(),
                fork: None,
            })
            .await
            .unwrap();

        let out = host.run("Deploy", json!({})).await.unwrap();
        assert_eq!(out, json!({"ok": true}));
        let dump = calldata.dump();
        assert_eq!(dump.len(), 1);
        assert_eq!(dump[0].data.as_ref(), &[0xde, 0xad]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn abandoned_request_leaves_host_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("engine.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nwhile read line; do sleep 2; echo '{\"result\":null}'; done\n",
        )
        .unwrap();

        let host = ProcessScriptHostFactory::new("/bin/sh")
            .with_args([script.display().to_string()])
            .create(HostConfig {
                artifacts: ArtifactsFs::from_dir(dir.path()),
                deployer: Address::zero(),
                broadcaster: Arc::new(crate::broadcaster::NoopBroadcaster),
                fork: None,
            })
            .await
            .unwrap();

        let first = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            host.run("DeploySuperchain", json!({})),
        )
        .await;
        assert!(first.is_err());

        let err = host.run("DeployImplementations", json!({})).await.unwrap_err();
        assert!(matches!(err, ScriptError::Interrupted));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_host_surfaces_engine_errors() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("engine.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nwhile read line; do echo '{\"error\":\"revert: boom\"}'; done\n",
        )
        .unwrap();

        let host = ProcessScriptHostFactory::new("/bin/sh")
            .with_args([script.display().to_string()])
            .create(HostConfig {
                artifacts: ArtifactsFs::from_dir(dir.path()),
                deployer: Address::zero(),
                broadcaster: Arc::new(crate::broadcaster::NoopBroadcaster),
                fork: None,
            })
            .await
            .unwrap();

        let err = host.run("DeploySuperchain", json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            ScriptError::Failed { ref script, ref message }
                if script == "DeploySuperchain" && message == "revert: boom"
        ));
    }
}

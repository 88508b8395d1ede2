use std::{fmt::Display, path::PathBuf, str::FromStr};

use clap::{Parser as ClapParser, Subcommand as ClapSubcommand};
use ethereum_types::{Address, H256};
use eyre::WrapErr;
use op_deployer_core::{
    apply::{self, ApplyConfig, DeploymentTarget},
    artifacts::Locator,
    bootstrap::{self, BootstrapConfig},
    clean,
    init::{self, InitConfig},
    inspect,
    opcm::{DeployImplementationsInput, DeploySuperchainInput, OP_STACK_SUPPORT},
    standard,
    state::{self, IntentType},
};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use url::Url;

use crate::initializers::init_tracing;

#[allow(clippy::upper_case_acronyms)]
#[derive(ClapParser)]
#[command(
    name = "op-deployer",
    version,
    about = "Deploys and upgrades OP Stack chains"
)]
pub struct CLI {
    #[command(flatten)]
    pub opts: Options,
    #[command(subcommand)]
    pub command: Subcommand,
}

#[derive(ClapParser, Debug, Clone)]
pub struct Options {
    #[arg(
        long = "cache-dir",
        value_name = "CACHE_DIRECTORY",
        default_value = default_cache_dir().into_os_string(),
        help = "Directory downloaded contract artifacts are cached in.",
        global = true,
        env = "DEPLOYER_CACHE_DIR"
    )]
    pub cache_dir: PathBuf,
    #[arg(
        long = "log.level",
        default_value_t = Level::INFO,
        value_name = "LOG_LEVEL",
        env = "DEPLOYER_LOG_LEVEL",
        help = "The verbosity level used for logs.",
        long_help = "Possible values: info, debug, trace, warn, error",
        global = true
    )]
    pub log_level: Level,
    #[arg(
        long = "log.color",
        default_value_t = LogColor::Auto,
        help = "Output logs with ANSI color codes.",
        long_help = "Possible values: auto, always, never",
        global = true,
        env = "DEPLOYER_LOG_COLOR"
    )]
    pub log_color: LogColor,
}

#[derive(ClapSubcommand)]
pub enum Subcommand {
    #[command(name = "init", about = "Bootstrap an intent and state file in a workdir")]
    Init {
        #[arg(long = "l1-chain-id", value_name = "CHAIN_ID", env = "DEPLOYER_L1_CHAIN_ID")]
        l1_chain_id: u64,
        #[arg(
            long = "l2-chain-ids",
            value_name = "CHAIN_ID_LIST",
            value_delimiter = ',',
            num_args = 1..,
            value_parser = parse_l2_chain_id,
            help = "Comma separated list of L2 chain IDs to deploy.",
            env = "DEPLOYER_L2_CHAIN_IDS"
        )]
        l2_chain_ids: Vec<H256>,
        #[arg(
            long = "workdir",
            value_name = "WORKDIR",
            default_value = ".deployer",
            env = "DEPLOYER_WORKDIR"
        )]
        workdir: PathBuf,
        #[arg(
            long = "intent-type",
            value_name = "INTENT_TYPE",
            default_value = "standard",
            value_parser = parse_intent_type,
            long_help = "Possible values: standard, custom, standard-overrides",
            env = "DEPLOYER_INTENT_TYPE"
        )]
        intent_type: IntentType,
    },
    #[command(name = "apply", about = "Apply a deployment intent to a target")]
    Apply {
        #[arg(
            long = "workdir",
            value_name = "WORKDIR",
            default_value = ".deployer",
            env = "DEPLOYER_WORKDIR"
        )]
        workdir: PathBuf,
        #[arg(long = "l1-rpc-url", value_name = "URL", env = "L1_RPC_URL")]
        l1_rpc_url: Option<Url>,
        #[arg(
            long = "private-key",
            value_name = "HEX_KEY",
            env = "DEPLOYER_PRIVATE_KEY",
            hide_env_values = true
        )]
        private_key: Option<String>,
        #[arg(
            long = "deployment-target",
            value_name = "TARGET",
            default_value = "live",
            value_parser = parse_deployment_target,
            long_help = "Possible values: live, genesis, calldata, noop",
            env = "DEPLOYER_DEPLOYMENT_TARGET"
        )]
        deployment_target: DeploymentTarget,
        #[arg(
            long = "script-engine",
            value_name = "PROGRAM",
            default_value = "op-script-engine",
            help = "Scripting engine binary that executes deployment scripts.",
            env = "DEPLOYER_SCRIPT_ENGINE"
        )]
        script_engine: PathBuf,
        #[arg(
            long = "script-engine.arg",
            value_name = "ARG",
            allow_hyphen_values = true,
            help = "Extra argument passed to the scripting engine. May be repeated."
        )]
        script_engine_args: Vec<String>,
    },
    #[command(name = "clean", about = "Remove cached data")]
    Clean {
        #[command(subcommand)]
        command: CleanCommand,
    },
    #[command(name = "inspect", about = "Inspect a deployment's state")]
    Inspect {
        #[command(subcommand)]
        command: InspectCommand,
    },
    #[command(name = "bootstrap", about = "Deploy shared L1 contracts outside a pipeline run")]
    Bootstrap {
        #[command(subcommand)]
        command: BootstrapCommand,
    },
}

#[derive(ClapSubcommand)]
pub enum CleanCommand {
    #[command(name = "cache", about = "Delete and recreate the artifacts cache")]
    Cache,
}

#[derive(ClapSubcommand)]
pub enum InspectCommand {
    #[command(name = "calldata", about = "Print the calldata recorded by a calldata deployment")]
    Calldata {
        #[arg(
            long = "workdir",
            value_name = "WORKDIR",
            default_value = ".deployer",
            env = "DEPLOYER_WORKDIR"
        )]
        workdir: PathBuf,
    },
    #[command(name = "l1", about = "Print the L1 contract addresses of a chain")]
    L1 {
        #[arg(value_name = "L2_CHAIN_ID", value_parser = parse_l2_chain_id)]
        l2_chain_id: H256,
        #[arg(
            long = "workdir",
            value_name = "WORKDIR",
            default_value = ".deployer",
            env = "DEPLOYER_WORKDIR"
        )]
        workdir: PathBuf,
    },
    #[command(name = "deploy-config", about = "Print the deploy config of a chain")]
    DeployConfig {
        #[arg(value_name = "L2_CHAIN_ID", value_parser = parse_l2_chain_id)]
        l2_chain_id: H256,
        #[arg(
            long = "workdir",
            value_name = "WORKDIR",
            default_value = ".deployer",
            env = "DEPLOYER_WORKDIR"
        )]
        workdir: PathBuf,
    },
}

#[derive(ClapParser, Debug, Clone)]
pub struct BootstrapArgs {
    #[arg(long = "l1-rpc-url", value_name = "URL", env = "L1_RPC_URL")]
    pub l1_rpc_url: Url,
    #[arg(
        long = "private-key",
        value_name = "HEX_KEY",
        env = "DEPLOYER_PRIVATE_KEY",
        hide_env_values = true
    )]
    pub private_key: String,
    #[arg(
        long = "artifacts-locator",
        value_name = "LOCATOR",
        help = "Tag, file:// or http(s):// location of the L1 contract artifacts.",
        env = "DEPLOYER_ARTIFACTS_LOCATOR"
    )]
    pub artifacts_locator: Locator,
    #[arg(
        long = "outfile",
        value_name = "FILE",
        help = "Write the deployed addresses here instead of stdout."
    )]
    pub outfile: Option<PathBuf>,
    #[arg(
        long = "script-engine",
        value_name = "PROGRAM",
        default_value = "op-script-engine",
        env = "DEPLOYER_SCRIPT_ENGINE"
    )]
    pub script_engine: PathBuf,
    #[arg(long = "script-engine.arg", value_name = "ARG", allow_hyphen_values = true)]
    pub script_engine_args: Vec<String>,
}

impl BootstrapArgs {
    fn into_config(self, cache_dir: PathBuf) -> BootstrapConfig {
        BootstrapConfig {
            l1_rpc_url: self.l1_rpc_url,
            private_key: self.private_key,
            artifacts_locator: self.artifacts_locator,
            cache_dir,
            script_engine: self.script_engine,
            script_engine_args: self.script_engine_args,
            outfile: self.outfile,
        }
    }
}

#[derive(ClapSubcommand)]
pub enum BootstrapCommand {
    #[command(name = "superchain", about = "Deploy the superchain contracts")]
    Superchain {
        #[command(flatten)]
        args: BootstrapArgs,
        #[arg(long = "superchain-proxy-admin-owner", value_name = "ADDRESS", value_parser = parse_address)]
        superchain_proxy_admin_owner: Address,
        #[arg(long = "protocol-versions-owner", value_name = "ADDRESS", value_parser = parse_address)]
        protocol_versions_owner: Address,
        #[arg(long = "guardian", value_name = "ADDRESS", value_parser = parse_address)]
        guardian: Address,
        #[arg(long = "paused")]
        paused: bool,
        #[arg(long = "required-protocol-version", value_name = "BYTES32", value_parser = parse_h256)]
        required_protocol_version: Option<H256>,
        #[arg(long = "recommended-protocol-version", value_name = "BYTES32", value_parser = parse_h256)]
        recommended_protocol_version: Option<H256>,
    },
    #[command(name = "implementations", about = "Deploy the implementation contracts of a release")]
    Implementations {
        #[command(flatten)]
        args: BootstrapArgs,
        #[arg(long = "superchain-config-proxy", value_name = "ADDRESS", value_parser = parse_address)]
        superchain_config_proxy: Address,
        #[arg(long = "protocol-versions-proxy", value_name = "ADDRESS", value_parser = parse_address)]
        protocol_versions_proxy: Address,
        #[arg(long = "superchain-proxy-admin", value_name = "ADDRESS", value_parser = parse_address)]
        superchain_proxy_admin: Address,
        #[arg(long = "upgrade-controller", value_name = "ADDRESS", value_parser = parse_address)]
        upgrade_controller: Address,
        #[arg(
            long = "l1-contracts-release",
            value_name = "RELEASE",
            help = "Release name recorded on chain. Defaults to the artifacts tag, or dev."
        )]
        l1_contracts_release: Option<String>,
        #[arg(long = "withdrawal-delay-seconds", default_value_t = standard::WITHDRAWAL_DELAY_SECONDS)]
        withdrawal_delay_seconds: u64,
        #[arg(long = "min-proposal-size-bytes", default_value_t = standard::MIN_PROPOSAL_SIZE_BYTES)]
        min_proposal_size_bytes: u64,
        #[arg(long = "challenge-period-seconds", default_value_t = standard::CHALLENGE_PERIOD_SECONDS)]
        challenge_period_seconds: u64,
        #[arg(long = "proof-maturity-delay-seconds", default_value_t = standard::PROOF_MATURITY_DELAY_SECONDS)]
        proof_maturity_delay_seconds: u64,
        #[arg(
            long = "dispute-game-finality-delay-seconds",
            default_value_t = standard::DISPUTE_GAME_FINALITY_DELAY_SECONDS
        )]
        dispute_game_finality_delay_seconds: u64,
        #[arg(long = "mips-version", default_value_t = standard::MIPS_VERSION)]
        mips_version: u64,
        #[arg(long = "use-interop")]
        use_interop: bool,
    },
}

impl Subcommand {
    pub async fn run(self, opts: &Options, cancel: CancellationToken) -> eyre::Result<()> {
        init_tracing(opts);

        match self {
            Subcommand::Init {
                l1_chain_id,
                l2_chain_ids,
                workdir,
                intent_type,
            } => {
                init::init(&InitConfig {
                    intent_type,
                    l1_chain_id,
                    workdir,
                    l2_chain_ids,
                })?;
            }
            Subcommand::Apply {
                workdir,
                l1_rpc_url,
                private_key,
                deployment_target,
                script_engine,
                script_engine_args,
            } => {
                apply::apply(
                    ApplyConfig {
                        l1_rpc_url,
                        workdir,
                        private_key,
                        target: deployment_target,
                        cache_dir: opts.cache_dir.clone(),
                        script_engine,
                        script_engine_args,
                        prestate_builder: None,
                    },
                    cancel,
                )
                .await?;
            }
            Subcommand::Clean {
                command: CleanCommand::Cache,
            } => {
                clean::clean_cache(&opts.cache_dir)?;
                info!(cache_dir = %opts.cache_dir.display(), "Artifacts cache cleaned");
            }
            Subcommand::Inspect {
                command: InspectCommand::Calldata { workdir },
            } => {
                let st = state::read_state(&workdir)?;
                let out = serde_json::to_string_pretty(&st.deployment_calldata)
                    .wrap_err("failed to encode calldata")?;
                println!("{out}");
            }
            Subcommand::Inspect {
                command: InspectCommand::L1 { l2_chain_id, workdir },
            } => {
                let st = state::read_state(&workdir)?;
                let contracts = inspect::l1_contracts(&st, l2_chain_id)?;
                let out = serde_json::to_string_pretty(&contracts)
                    .wrap_err("failed to encode L1 contracts")?;
                println!("{out}");
            }
            Subcommand::Inspect {
                command: InspectCommand::DeployConfig { l2_chain_id, workdir },
            } => {
                let st = state::read_state(&workdir)?;
                let config = inspect::deploy_config(&st, l2_chain_id)?;
                let out = serde_json::to_string_pretty(&config)
                    .wrap_err("failed to encode deploy config")?;
                println!("{out}");
            }
            Subcommand::Bootstrap {
                command:
                    BootstrapCommand::Superchain {
                        args,
                        superchain_proxy_admin_owner,
                        protocol_versions_owner,
                        guardian,
                        paused,
                        required_protocol_version,
                        recommended_protocol_version,
                    },
            } => {
                let input = DeploySuperchainInput {
                    superchain_proxy_admin_owner,
                    protocol_versions_owner,
                    guardian,
                    paused,
                    required_protocol_version: required_protocol_version
                        .unwrap_or(OP_STACK_SUPPORT),
                    recommended_protocol_version: recommended_protocol_version
                        .unwrap_or(OP_STACK_SUPPORT),
                };
                bootstrap::superchain(args.into_config(opts.cache_dir.clone()), input, cancel)
                    .await?;
            }
            Subcommand::Bootstrap {
                command:
                    BootstrapCommand::Implementations {
                        args,
                        superchain_config_proxy,
                        protocol_versions_proxy,
                        superchain_proxy_admin,
                        upgrade_controller,
                        l1_contracts_release,
                        withdrawal_delay_seconds,
                        min_proposal_size_bytes,
                        challenge_period_seconds,
                        proof_maturity_delay_seconds,
                        dispute_game_finality_delay_seconds,
                        mips_version,
                        use_interop,
                    },
            } => {
                let release = l1_contracts_release.unwrap_or_else(|| {
                    args.artifacts_locator.tag().unwrap_or("dev").to_string()
                });
                let input = DeployImplementationsInput {
                    withdrawal_delay_seconds,
                    min_proposal_size_bytes,
                    challenge_period_seconds,
                    proof_maturity_delay_seconds,
                    dispute_game_finality_delay_seconds,
                    mips_version,
                    l1_contracts_release: release,
                    superchain_config_proxy,
                    protocol_versions_proxy,
                    superchain_proxy_admin,
                    upgrade_controller,
                    use_interop,
                };
                bootstrap::implementations(
                    args.into_config(opts.cache_dir.clone()),
                    input,
                    cancel,
                )
                .await?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum LogColor {
    #[default]
    Auto,
    Always,
    Never,
}

impl Display for LogColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogColor::Auto => write!(f, "auto"),
            LogColor::Always => write!(f, "always"),
            LogColor::Never => write!(f, "never"),
        }
    }
}

impl FromStr for LogColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(LogColor::Auto),
            "always" => Ok(LogColor::Always),
            "never" => Ok(LogColor::Never),
            _ => Err(format!(
                "Invalid log color '{}'. Expected: auto, always, or never",
                s
            )),
        }
    }
}

pub fn default_cache_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".op-deployer").join("cache"))
        .unwrap_or_else(|| PathBuf::from(".op-deployer").join("cache"))
}

fn parse_l2_chain_id(s: &str) -> Result<H256, String> {
    let s = s.trim();
    let id = match s.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    }
    .map_err(|e| format!("invalid L2 chain ID '{s}': {e}"))?;
    Ok(H256::from_low_u64_be(id))
}

fn parse_address(s: &str) -> Result<Address, String> {
    let bytes = hex::decode(s.trim().trim_start_matches("0x"))
        .map_err(|e| format!("invalid address '{s}': {e}"))?;
    if bytes.len() != Address::len_bytes() {
        return Err(format!("invalid address '{s}': expected 20 bytes"));
    }
    Ok(Address::from_slice(&bytes))
}

fn parse_h256(s: &str) -> Result<H256, String> {
    let bytes = hex::decode(s.trim().trim_start_matches("0x"))
        .map_err(|e| format!("invalid bytes32 '{s}': {e}"))?;
    if bytes.len() != H256::len_bytes() {
        return Err(format!("invalid bytes32 '{s}': expected 32 bytes"));
    }
    Ok(H256::from_slice(&bytes))
}

fn parse_intent_type(s: &str) -> Result<IntentType, String> {
    s.parse().map_err(|e: state::IntentError| e.to_string())
}

fn parse_deployment_target(s: &str) -> Result<DeploymentTarget, String> {
    s.parse()
        .map_err(|e: op_deployer_core::pipeline::PipelineError| e.to_string())
}

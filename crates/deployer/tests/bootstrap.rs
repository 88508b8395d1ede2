mod common;

use std::{sync::Arc, time::Duration};

use common::{FakeHostFactory, FakeL1Client, L1_CHAIN_ID, addr};
use op_deployer_core::{
    apply::L1Connection,
    artifacts::Locator,
    bootstrap::{BootstrapError, BootstrapOpts, Bootstrapper},
    broadcaster::BroadcasterError,
    opcm::{DeployImplementationsInput, DeploySuperchainInput, OP_STACK_SUPPORT},
    signer::{LocalSigner, TxSigner},
    standard,
};
use tokio_util::sync::CancellationToken;
use url::Url;

const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const SUPERCHAIN: &str = "DeploySuperchain.s.sol:DeploySuperchain";
const IMPLEMENTATIONS: &str = "DeployImplementations.s.sol:DeployImplementations";

struct Harness {
    artifacts: tempfile::TempDir,
    cache: tempfile::TempDir,
    factory: Arc<FakeHostFactory>,
    client: Arc<FakeL1Client>,
    signer: Arc<dyn TxSigner>,
}

impl Harness {
    fn new(client: FakeL1Client) -> Self {
        Self {
            artifacts: tempfile::tempdir().unwrap(),
            cache: tempfile::tempdir().unwrap(),
            factory: Arc::new(FakeHostFactory::default()),
            client: Arc::new(client),
            signer: Arc::new(LocalSigner::from_hex(DEV_KEY).unwrap()),
        }
    }

    fn opts(&self, cancel: CancellationToken) -> BootstrapOpts {
        BootstrapOpts {
            l1: L1Connection {
                client: self.client.clone(),
                rpc_url: Url::parse("http://127.0.0.1:8545").unwrap(),
            },
            signer: self.signer.clone(),
            artifacts_locator: Locator::file(self.artifacts.path()).unwrap(),
            cache_dir: self.cache.path().to_path_buf(),
            host_factory: self.factory.clone(),
            progressor: None,
            receipt_poll_interval: Some(Duration::from_millis(1)),
            cancel,
        }
    }
}

fn superchain_input() -> DeploySuperchainInput {
    DeploySuperchainInput {
        superchain_proxy_admin_owner: addr(0x11),
        protocol_versions_owner: addr(0x12),
        guardian: addr(0x13),
        paused: false,
        required_protocol_version: OP_STACK_SUPPORT,
        recommended_protocol_version: OP_STACK_SUPPORT,
    }
}

fn implementations_input() -> DeployImplementationsInput {
    DeployImplementationsInput {
        withdrawal_delay_seconds: standard::WITHDRAWAL_DELAY_SECONDS,
        min_proposal_size_bytes: standard::MIN_PROPOSAL_SIZE_BYTES,
        challenge_period_seconds: standard::CHALLENGE_PERIOD_SECONDS,
        proof_maturity_delay_seconds: standard::PROOF_MATURITY_DELAY_SECONDS,
        dispute_game_finality_delay_seconds: standard::DISPUTE_GAME_FINALITY_DELAY_SECONDS,
        mips_version: standard::MIPS_VERSION,
        l1_contracts_release: "dev".into(),
        superchain_config_proxy: addr(0x21),
        protocol_versions_proxy: addr(0x22),
        superchain_proxy_admin: addr(0x23),
        upgrade_controller: addr(0x11),
        use_interop: false,
    }
}

#[tokio::test]
async fn superchain_is_deployed_from_a_fork_of_l1_head() {
    let h = Harness::new(FakeL1Client::new(L1_CHAIN_ID));
    let bootstrapper = Bootstrapper::connect(h.opts(CancellationToken::new()))
        .await
        .unwrap();

    let out = bootstrapper
        .deploy_superchain(&superchain_input())
        .await
        .unwrap();

    assert_ne!(out.superchain_config_proxy, out.protocol_versions_proxy);
    let host = h.factory.host(0);
    assert_eq!(host.calls(), vec![SUPERCHAIN]);
    assert_eq!(host.deployer, h.signer.address());
    let fork = host.fork.as_ref().unwrap();
    assert_eq!(fork.block_number, h.client.head.number);
    assert_eq!(h.client.sent().len(), 1);
}

#[tokio::test]
async fn implementations_are_broadcast_once_deployed() {
    let h = Harness::new(FakeL1Client::new(L1_CHAIN_ID));
    let bootstrapper = Bootstrapper::connect(h.opts(CancellationToken::new()))
        .await
        .unwrap();

    let out = bootstrapper
        .deploy_implementations(&implementations_input())
        .await
        .unwrap();

    assert!(!out.opcm.is_zero());
    assert_eq!(h.factory.host(0).calls(), vec![IMPLEMENTATIONS]);
    assert_eq!(h.client.sent().len(), 1);

    let json = serde_json::to_value(&out).unwrap();
    assert!(json.get("opcm").is_some());
    assert!(json.get("delayedWETHImpl").is_some());
}

#[tokio::test]
async fn rejected_submission_fails_the_bootstrap() {
    let mut client = FakeL1Client::new(L1_CHAIN_ID);
    client.reject_sends = true;
    let h = Harness::new(client);
    let bootstrapper = Bootstrapper::connect(h.opts(CancellationToken::new()))
        .await
        .unwrap();

    let err = bootstrapper
        .deploy_superchain(&superchain_input())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BootstrapError::Broadcast(BroadcasterError::Send { index: 0, .. })
    ));
}

#[tokio::test]
async fn cancelled_bootstrap_creates_no_host() {
    let h = Harness::new(FakeL1Client::new(L1_CHAIN_ID));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = Bootstrapper::connect(h.opts(cancel)).await;

    assert!(matches!(result, Err(BootstrapError::Cancelled)));
    assert_eq!(h.factory.count(), 0);
    assert!(h.client.sent().is_empty());
}

#[tokio::test]
async fn stalled_broadcast_is_cancelled() {
    let mut client = FakeL1Client::new(L1_CHAIN_ID);
    client.stall_nonce = true;
    let h = Harness::new(client);
    let cancel = CancellationToken::new();
    let bootstrapper = Bootstrapper::connect(h.opts(cancel.clone()))
        .await
        .unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(3),
        bootstrapper.deploy_superchain(&superchain_input()),
    )
    .await
    .expect("bootstrap ignored cancellation")
    .unwrap_err();

    assert!(matches!(err, BootstrapError::Cancelled));
    assert!(h.client.sent().is_empty());
}


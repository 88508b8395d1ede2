#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use op_deployer_core::{
    artifacts::Locator,
    broadcaster::{Broadcast, Broadcaster},
    opcm::DeployOpChainOutput,
    pipeline::{PreStateBuilder, PreStateError, PrestateRequest},
    rpc::{BlockHeader, L1Client, RpcError, TxReceipt},
    script::{ForkConfig, HostConfig, ScriptError, ScriptHost, ScriptHostFactory},
    signer::keccak,
    standard,
    state::{
        Allocs, ChainRoles, GenesisAccount, Intent, IntentType, L1DevGenesisBlockParams,
        L1DevGenesisParams, L2DevGenesisParams, State, StateError, StateWriter, SuperchainRoles,
    },
};
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

pub const L1_CHAIN_ID: u64 = 900;
pub const L2_PREDEPLOY: Address = ethereum_types::H160([0x42; 20]);
pub const L1_PREINSTALL: Address = ethereum_types::H160([0x4e; 20]);

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn l2_chain_id() -> H256 {
    H256::from_low_u64_be(901)
}

/// A custom intent that passes validation, with dev genesis params for both
/// layers and artifacts read from `artifacts_dir`.
pub fn dev_intent(artifacts_dir: &Path) -> Intent {
    let mut intent = Intent::new(IntentType::Custom, L1_CHAIN_ID, &[l2_chain_id()]).unwrap();
    let locator = Locator::file(artifacts_dir).unwrap();
    intent.l1_contracts_locator = Some(locator.clone());
    intent.l2_contracts_locator = Some(locator);
    intent.superchain_roles = Some(SuperchainRoles {
        superchain_proxy_admin_owner: addr(0x11),
        protocol_versions_owner: addr(0x12),
        superchain_guardian: addr(0x13),
    });
    intent.l1_dev_genesis_params = Some(L1DevGenesisParams {
        block_params: L1DevGenesisBlockParams {
            timestamp: 1_700_000_000,
            ..Default::default()
        },
        prague_time_offset: Some(0),
        prefund: BTreeMap::from([(addr(0xcafe), U256::from(5_000u64))]),
    });

    let chain = &mut intent.chains[0];
    chain.base_fee_vault_recipient = addr(0x21);
    chain.l1_fee_vault_recipient = addr(0x22);
    chain.sequencer_fee_vault_recipient = addr(0x23);
    chain.eip1559_denominator_canyon = standard::EIP1559_DENOMINATOR_CANYON;
    chain.eip1559_denominator = standard::EIP1559_DENOMINATOR;
    chain.eip1559_elasticity = standard::EIP1559_ELASTICITY;
    chain.roles = ChainRoles {
        l1_proxy_admin_owner: addr(0x31),
        l2_proxy_admin_owner: addr(0x32),
        system_config_owner: addr(0x33),
        unsafe_block_signer: addr(0x34),
        batcher: addr(0x35),
        proposer: addr(0x36),
        challenger: addr(0x37),
    };
    chain.l2_dev_genesis_params = Some(L2DevGenesisParams {
        prefund: BTreeMap::from([(addr(0xbeef), U256::from(1_000u64))]),
    });
    intent
}

fn addresses(keys: &[&str]) -> Value {
    let fields: Map<String, Value> = keys
        .iter()
        .zip(0x1000u64..)
        .map(|(key, n)| (key.to_string(), json!(addr(n))))
        .collect();
    Value::Object(fields)
}

fn script_output(script: &str) -> Value {
    match script.split('.').next().unwrap_or_default() {
        "DeploySuperchain" => addresses(&[
            "superchainProxyAdmin",
            "superchainConfigImpl",
            "superchainConfigProxy",
            "protocolVersionsImpl",
            "protocolVersionsProxy",
        ]),
        "DeployImplementations" => addresses(&[
            "opcm",
            "opcmGameTypeAdder",
            "opcmDeployer",
            "opcmUpgrader",
            "opcmInteropMigrator",
            "delayedWETHImpl",
            "optimismPortalImpl",
            "ethLockboxImpl",
            "preimageOracleSingleton",
            "mipsSingleton",
            "systemConfigImpl",
            "l1CrossDomainMessengerImpl",
            "l1ERC721BridgeImpl",
            "l1StandardBridgeImpl",
            "optimismMintableERC20FactoryImpl",
            "disputeGameFactoryImpl",
            "anchorStateRegistryImpl",
        ]),
        "DeployOPChain" => serde_json::to_value(DeployOpChainOutput {
            op_chain_proxy_admin: addr(0x2001),
            system_config_proxy: addr(0x2002),
            l1_cross_domain_messenger_proxy: addr(0x2003),
            l1_standard_bridge_proxy: addr(0x2004),
            l1_erc721_bridge_proxy: addr(0x2005),
            ..Default::default()
        })
        .unwrap(),
        "ReadImplementationAddresses" => addresses(&[
            "delayedWETH",
            "optimismPortal",
            "ethLockbox",
            "systemConfig",
            "l1CrossDomainMessenger",
            "l1ERC721Bridge",
            "l1StandardBridge",
            "optimismMintableERC20Factory",
            "disputeGameFactory",
            "mipsSingleton",
            "preimageOracleSingleton",
        ]),
        _ => Value::Null,
    }
}

/// In-memory stand-in for the scripting engine.
///
/// Every `Deploy*` script records one broadcast and leaves the deployer
/// account behind in the host's state.
pub struct FakeHost {
    pub fork: Option<ForkConfig>,
    pub deployer: Address,
    pub calls: Mutex<Vec<String>>,
    broadcaster: Arc<dyn Broadcaster>,
    accounts: Mutex<Allocs>,
    stall_on: Option<String>,
}

impl FakeHost {
    pub fn new(config: HostConfig) -> Self {
        Self {
            fork: config.fork,
            deployer: config.deployer,
            calls: Mutex::new(Vec::new()),
            broadcaster: config.broadcaster,
            accounts: Mutex::new(Allocs::new()),
            stall_on: None,
        }
    }

    /// A host that never answers `script`.
    pub fn stalling_on(config: HostConfig, script: &str) -> Self {
        Self {
            stall_on: Some(script.to_string()),
            ..Self::new(config)
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn insert(&self, address: Address, account: GenesisAccount) {
        self.accounts.lock().unwrap().insert(address, account);
    }
}

#[async_trait]
impl ScriptHost for FakeHost {
    async fn run(&self, script: &str, _input: Value) -> Result<Value, ScriptError> {
        self.calls.lock().unwrap().push(script.to_string());
        if self.stall_on.as_deref() == Some(script) {
            std::future::pending::<()>().await;
        }

        if script.starts_with("Deploy") {
            self.broadcaster.hook(Broadcast {
                to: None,
                input: Bytes::copy_from_slice(script.as_bytes()),
                value: U256::zero(),
            });
            self.insert(
                self.deployer,
                GenesisAccount {
                    nonce: 1,
                    ..Default::default()
                },
            );
        }
        match script {
            "L2Genesis.s.sol:L2Genesis" => self.insert(
                L2_PREDEPLOY,
                GenesisAccount {
                    code: Bytes::from_static(&[0x60, 0x80]),
                    ..Default::default()
                },
            ),
            "SetPreinstalls.s.sol:SetPreinstalls" => self.insert(
                L1_PREINSTALL,
                GenesisAccount {
                    code: Bytes::from_static(&[0x60, 0x01]),
                    ..Default::default()
                },
            ),
            _ => {}
        }
        Ok(script_output(script))
    }

    async fn set_balance(&self, address: Address, amount: U256) -> Result<(), ScriptError> {
        self.accounts
            .lock()
            .unwrap()
            .entry(address)
            .or_default()
            .balance = amount;
        Ok(())
    }

    async fn wipe(&self, address: Address) -> Result<(), ScriptError> {
        self.accounts.lock().unwrap().remove(&address);
        Ok(())
    }

    async fn state_dump(&self) -> Result<Allocs, ScriptError> {
        Ok(self.accounts.lock().unwrap().clone())
    }
}

/// Hands out [`FakeHost`]s and keeps them for inspection, in creation order.
#[derive(Default)]
pub struct FakeHostFactory {
    pub hosts: Mutex<Vec<Arc<FakeHost>>>,
}

impl FakeHostFactory {
    pub fn host(&self, index: usize) -> Arc<FakeHost> {
        self.hosts.lock().unwrap()[index].clone()
    }

    pub fn count(&self) -> usize {
        self.hosts.lock().unwrap().len()
    }
}

#[async_trait]
impl ScriptHostFactory for FakeHostFactory {
    async fn create(&self, config: HostConfig) -> Result<Arc<dyn ScriptHost>, ScriptError> {
        let host = Arc::new(FakeHost::new(config));
        self.hosts.lock().unwrap().push(host.clone());
        Ok(host)
    }
}

/// Keeps a copy of every checkpoint, optionally failing once `fail_after`
/// checkpoints have been kept.
#[derive(Default)]
pub struct RecordingStateWriter {
    pub writes: Mutex<Vec<State>>,
    pub fail_after: Option<usize>,
}

impl RecordingStateWriter {
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Default::default()
        }
    }

    pub fn writes(&self) -> Vec<State> {
        self.writes.lock().unwrap().clone()
    }
}

impl StateWriter for RecordingStateWriter {
    fn write_state(&self, state: &State) -> Result<(), StateError> {
        let mut writes = self.writes.lock().unwrap();
        if self.fail_after == Some(writes.len()) {
            return Err(StateError::Write {
                path: "state.json".into(),
                source: std::io::Error::other("disk full"),
            });
        }
        writes.push(state.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPreStateBuilder {
    pub requests: Mutex<Vec<PrestateRequest>>,
}

#[async_trait]
impl PreStateBuilder for RecordingPreStateBuilder {
    async fn build_prestate(
        &self,
        request: PrestateRequest,
        _cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, String>, PreStateError> {
        self.requests.lock().unwrap().push(request);
        Ok(BTreeMap::from([(
            "prestate-mt64".to_string(),
            "0x03ab".to_string(),
        )]))
    }
}

/// L1 endpoint with a fixed head. Sent transactions are kept and confirmed
/// on the second receipt poll with `receipt_status`.
pub struct FakeL1Client {
    pub chain_id: u64,
    pub head: BlockHeader,
    pub nonce: u64,
    pub receipt_status: u64,
    /// Nonce lookups never complete.
    pub stall_nonce: bool,
    /// Submissions fail with a JSON-RPC error.
    pub reject_sends: bool,
    pub sent: Mutex<Vec<Vec<u8>>>,
    receipt_polls: AtomicUsize,
}

impl FakeL1Client {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            head: BlockHeader {
                hash: H256::repeat_byte(0xaa),
                parent_hash: H256::repeat_byte(0xa9),
                number: 123,
                timestamp: 1_700_000_123,
                base_fee_per_gas: Some(U256::from(10_000_000_000u64)),
            },
            nonce: 5,
            receipt_status: 1,
            stall_nonce: false,
            reject_sends: false,
            sent: Mutex::new(Vec::new()),
            receipt_polls: AtomicUsize::new(0),
        }
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl L1Client for FakeL1Client {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        Ok(self.chain_id)
    }

    async fn latest_header(&self) -> Result<BlockHeader, RpcError> {
        Ok(self.head.clone())
    }

    async fn header_by_hash(&self, hash: H256) -> Result<BlockHeader, RpcError> {
        Ok(BlockHeader {
            hash,
            number: 77,
            ..self.head.clone()
        })
    }

    async fn suggest_gas_tip_cap(&self) -> Result<U256, RpcError> {
        Ok(U256::from(1_000_000_000u64))
    }

    async fn code_at(&self, _address: Address) -> Result<Bytes, RpcError> {
        Ok(Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]))
    }

    async fn pending_nonce_at(&self, _address: Address) -> Result<u64, RpcError> {
        if self.stall_nonce {
            std::future::pending::<()>().await;
        }
        Ok(self.nonce)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, RpcError> {
        if self.reject_sends {
            return Err(RpcError::JsonRpcError {
                method: "eth_sendRawTransaction".into(),
                code: -32000,
                message: "insufficient funds for gas * price + value".into(),
            });
        }
        self.sent.lock().unwrap().push(raw.to_vec());
        Ok(keccak(raw))
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TxReceipt>, RpcError> {
        if self.receipt_polls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(None);
        }
        Ok(Some(TxReceipt {
            transaction_hash: hash,
            block_number: self.head.number + 1,
            status: self.receipt_status,
            gas_used: 21_000,
            contract_address: None,
        }))
    }
}

use std::sync::Arc;

use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Env, StageError};
use crate::{
    broadcaster::NoopBroadcaster,
    opcm::{self, L2GenesisInput},
    script::HostConfig,
    standard::{self, HardforkSchedule},
    state::{ChainIntent, Intent, State, merge_overrides},
};

/// Destination of fee vault withdrawals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WithdrawalNetwork {
    Remote,
    Local,
}

impl WithdrawalNetwork {
    fn to_u8(self) -> u8 {
        match self {
            WithdrawalNetwork::Remote => 0,
            WithdrawalNetwork::Local => 1,
        }
    }
}

/// L2 genesis settings that deploy overrides may replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct L2GenesisOverrides {
    fund_dev_accounts: bool,
    base_fee_vault_minimum_withdrawal_amount: U256,
    l1_fee_vault_minimum_withdrawal_amount: U256,
    sequencer_fee_vault_minimum_withdrawal_amount: U256,
    base_fee_vault_withdrawal_network: WithdrawalNetwork,
    l1_fee_vault_withdrawal_network: WithdrawalNetwork,
    sequencer_fee_vault_withdrawal_network: WithdrawalNetwork,
    enable_governance: bool,
    governance_token_owner: Address,
}

impl Default for L2GenesisOverrides {
    fn default() -> Self {
        Self {
            fund_dev_accounts: false,
            base_fee_vault_minimum_withdrawal_amount: standard::vault_min_withdrawal_amount(),
            l1_fee_vault_minimum_withdrawal_amount: standard::vault_min_withdrawal_amount(),
            sequencer_fee_vault_minimum_withdrawal_amount: standard::vault_min_withdrawal_amount(),
            base_fee_vault_withdrawal_network: WithdrawalNetwork::Local,
            l1_fee_vault_withdrawal_network: WithdrawalNetwork::Local,
            sequencer_fee_vault_withdrawal_network: WithdrawalNetwork::Local,
            enable_governance: false,
            governance_token_owner: standard::GOVERNANCE_TOKEN_OWNER,
        }
    }
}

pub(super) async fn generate_l2_genesis(
    env: &Env,
    st: &mut State,
    id: H256,
) -> Result<(), StageError> {
    let intent = &env.intent;
    let chain = intent.chain(id)?;
    let chain_state = st.chain_mut(id)?;

    if chain_state.allocs.is_some() {
        info!(stage = "generate-l2-genesis", "L2 genesis generation not needed");
        return Ok(());
    }
    info!(stage = "generate-l2-genesis", id = %format!("{id:#x}"), "Generating L2 genesis");

    let (overrides, schedule) = l2_genesis_overrides(intent, chain)?;

    let host = env
        .host_factory
        .create(HostConfig {
            artifacts: env.l2_artifacts.clone(),
            deployer: env.deployer,
            broadcaster: Arc::new(NoopBroadcaster),
            fork: None,
        })
        .await
        .map_err(StageError::script("failed to create L2 script host"))?;

    let contracts = &chain_state.contracts;
    opcm::l2_genesis(
        host.as_ref(),
        &L2GenesisInput {
            l1_chain_id: intent.l1_chain_id,
            l2_chain_id: opcm::chain_id_to_u256(id),
            l1_cross_domain_messenger_proxy: contracts.l1_cross_domain_messenger_proxy,
            l1_standard_bridge_proxy: contracts.l1_standard_bridge_proxy,
            l1_erc721_bridge_proxy: contracts.l1_erc721_bridge_proxy,
            op_chain_proxy_admin_owner: chain.roles.l2_proxy_admin_owner,
            sequencer_fee_vault_recipient: chain.sequencer_fee_vault_recipient,
            sequencer_fee_vault_minimum_withdrawal_amount: overrides
                .sequencer_fee_vault_minimum_withdrawal_amount,
            sequencer_fee_vault_withdrawal_network: overrides
                .sequencer_fee_vault_withdrawal_network
                .to_u8(),
            base_fee_vault_recipient: chain.base_fee_vault_recipient,
            base_fee_vault_minimum_withdrawal_amount: overrides
                .base_fee_vault_minimum_withdrawal_amount,
            base_fee_vault_withdrawal_network: overrides.base_fee_vault_withdrawal_network.to_u8(),
            l1_fee_vault_recipient: chain.l1_fee_vault_recipient,
            l1_fee_vault_minimum_withdrawal_amount: overrides.l1_fee_vault_minimum_withdrawal_amount,
            l1_fee_vault_withdrawal_network: overrides.l1_fee_vault_withdrawal_network.to_u8(),
            governance_token_owner: overrides.governance_token_owner,
            fork: schedule.solidity_fork_number(1),
            use_interop: intent.use_interop,
            enable_governance: overrides.enable_governance,
            fund_dev_accounts: overrides.fund_dev_accounts,
        },
    )
    .await
    .map_err(StageError::script("failed to call L2Genesis script"))?;

    host.wipe(env.deployer)
        .await
        .map_err(StageError::script("failed to wipe deployer from L2 state"))?;
    let dump = host
        .state_dump()
        .await
        .map_err(StageError::script("failed to dump state"))?;
    chain_state.allocs = Some(dump);
    Ok(())
}

fn l2_genesis_overrides(
    intent: &Intent,
    chain: &ChainIntent,
) -> Result<(L2GenesisOverrides, HardforkSchedule), StageError> {
    let tag = intent.l1_locator()?.tag().unwrap_or_default();
    let mut schedule = standard::default_hardfork_schedule_for_tag(tag);
    if intent.use_interop {
        if schedule.l2_genesis_isthmus_time_offset.is_none() {
            return Err(StageError::InteropRequiresIsthmus);
        }
        schedule.l2_genesis_interop_time_offset = Some(0);
        schedule.use_interop = true;
    }

    let overrides = L2GenesisOverrides {
        fund_dev_accounts: intent.fund_dev_accounts,
        ..Default::default()
    };

    let layers = [&intent.global_deploy_overrides, &chain.deploy_overrides];
    let schedule = merge_overrides(schedule, &layers).map_err(StageError::Overrides)?;
    let overrides = merge_overrides(overrides, &layers).map_err(StageError::Overrides)?;
    Ok((overrides, schedule))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{artifacts::Locator, state::IntentType};

    fn intent_for(tag: &str, use_interop: bool) -> Intent {
        let mut intent =
            Intent::new(IntentType::Custom, 900, &[H256::from_low_u64_be(901)]).unwrap();
        intent.l1_contracts_locator = Some(Locator::from_tag(tag).unwrap());
        intent.l2_contracts_locator = intent.l1_contracts_locator.clone();
        intent.use_interop = use_interop;
        intent
    }

    #[test]
    fn chain_overrides_win_over_global_ones() {
        let mut intent = intent_for(standard::CONTRACTS_V300_TAG, false);
        intent.fund_dev_accounts = true;
        intent.global_deploy_overrides = json!({
            "enableGovernance": true,
            "l1FeeVaultWithdrawalNetwork": "remote",
        })
        .as_object()
        .cloned()
        .unwrap();
        intent.chains[0].deploy_overrides = json!({ "enableGovernance": false })
            .as_object()
            .cloned()
            .unwrap();

        let (overrides, schedule) = l2_genesis_overrides(&intent, &intent.chains[0]).unwrap();
        assert!(overrides.fund_dev_accounts);
        assert!(!overrides.enable_governance);
        assert_eq!(overrides.l1_fee_vault_withdrawal_network.to_u8(), 0);
        assert_eq!(overrides.base_fee_vault_withdrawal_network.to_u8(), 1);
        assert_eq!(schedule.solidity_fork_number(1), 5);
    }

    #[test]
    fn interop_needs_isthmus() {
        let intent = intent_for(standard::CONTRACTS_V300_TAG, true);
        let err = l2_genesis_overrides(&intent, &intent.chains[0]).unwrap_err();
        assert!(matches!(err, StageError::InteropRequiresIsthmus));
    }

    #[test]
    fn overrides_can_schedule_isthmus_for_interop() {
        let mut intent = intent_for(standard::CONTRACTS_V300_TAG, false);
        intent.global_deploy_overrides = json!({ "l2GenesisIsthmusTimeOffset": 0 })
            .as_object()
            .cloned()
            .unwrap();
        let (_, schedule) = l2_genesis_overrides(&intent, &intent.chains[0]).unwrap();
        assert_eq!(schedule.solidity_fork_number(1), 6);
    }
}

use ethereum_types::{Address, H256};
use tracing::info;

use super::{Env, StageError};
use crate::{
    opcm::{
        self, DeployAlphabetVmInput, DeployDisputeGameInput, DeployMipsInput,
        DeployPreimageOracleInput, SetDisputeGameImplInput,
    },
    state::{AdditionalDisputeGame, AdditionalDisputeGameState, ChainIntent, ChainState, State, VmType},
};

pub(super) async fn deploy_additional_dispute_games(
    env: &Env,
    st: &mut State,
    id: H256,
) -> Result<(), StageError> {
    let chain = env.intent.chain(id)?;
    let default_oracle = st
        .implementations_deployment
        .as_ref()
        .map(|impls| impls.preimage_oracle_impl)
        .unwrap_or_default();
    let chain_state = st.chain_mut(id)?;

    if chain.additional_dispute_games.is_empty() || !chain_state.additional_dispute_games.is_empty()
    {
        info!(
            stage = "deploy-additional-dispute-games",
            "Additional dispute games deployment not needed"
        );
        return Ok(());
    }

    if chain.roles.l1_proxy_admin_owner != env.deployer {
        return Err(StageError::DeployerNotL1ProxyAdminOwner);
    }

    for game in &chain.additional_dispute_games {
        let deployed = deploy_dispute_game(env, chain, chain_state, game, default_oracle).await?;
        chain_state.additional_dispute_games.push(deployed);
    }
    Ok(())
}

async fn deploy_dispute_game(
    env: &Env,
    chain: &ChainIntent,
    chain_state: &ChainState,
    game: &AdditionalDisputeGame,
    default_oracle: Address,
) -> Result<AdditionalDisputeGameState, StageError> {
    let host = env.l1_host.as_ref();
    let params = &game.proof_params;
    let game_type = params.dispute_game_type;

    let oracle_address = if game.use_custom_oracle {
        info!(game_type, "Deploying custom preimage oracle");
        let out = opcm::deploy_preimage_oracle(
            host,
            &DeployPreimageOracleInput {
                min_proposal_size: game.oracle_min_proposal_size,
                challenge_period: game.oracle_challenge_period_seconds,
            },
        )
        .await
        .map_err(StageError::script("failed to deploy preimage oracle"))?;
        out.preimage_oracle
    } else {
        info!(game_type, "Using existing preimage oracle");
        default_oracle
    };

    info!(game_type, vm_type = ?game.vm_type, "Deploying VM");
    let vm_address = match game.vm_type {
        VmType::Alphabet => {
            opcm::deploy_alphabet_vm(
                host,
                &DeployAlphabetVmInput {
                    absolute_prestate: params.dispute_absolute_prestate,
                    preimage_oracle: oracle_address,
                },
            )
            .await
            .map_err(StageError::script("failed to deploy Alphabet VM"))?
            .alphabet_vm
        }
        VmType::Cannon | VmType::CannonNext => {
            opcm::deploy_mips(
                host,
                &DeployMipsInput {
                    mips_version: game.vm_type.mips_version(),
                    preimage_oracle: oracle_address,
                },
            )
            .await
            .map_err(StageError::script("failed to deploy MIPS VM"))?
            .mips_singleton
        }
    };

    let out = opcm::deploy_dispute_game(
        host,
        &DeployDisputeGameInput {
            release: "dev".into(),
            vm_address,
            game_kind: "FaultDisputeGame".into(),
            game_type,
            absolute_prestate: params.dispute_absolute_prestate,
            max_game_depth: params.dispute_max_game_depth,
            split_depth: params.dispute_split_depth,
            clock_extension: params.dispute_clock_extension,
            max_clock_duration: params.dispute_max_clock_duration,
            delayed_weth_proxy: chain_state.contracts.delayed_weth_permissioned_game_proxy,
            anchor_state_registry_proxy: chain_state.contracts.anchor_state_registry_proxy,
            l2_chain_id: chain.id,
            proposer: chain.roles.proposer,
            challenger: chain.roles.challenger,
        },
    )
    .await
    .map_err(StageError::script("failed to deploy dispute game"))?;
    info!(game_type, impl_address = ?out.dispute_game_impl, "Dispute game deployed");

    let anchor_state_registry = if game.make_respected {
        chain_state.contracts.anchor_state_registry_proxy
    } else {
        Address::zero()
    };
    opcm::set_dispute_game_impl(
        host,
        &SetDisputeGameImplInput {
            factory: chain_state.contracts.dispute_game_factory_proxy,
            impl_address: out.dispute_game_impl,
            game_type,
            anchor_state_registry,
        },
    )
    .await
    .map_err(StageError::script("failed to set dispute game impl"))?;

    Ok(AdditionalDisputeGameState {
        game_type,
        vm_type: game.vm_type,
        game_address: out.dispute_game_impl,
        oracle_address,
        vm_address,
    })
}

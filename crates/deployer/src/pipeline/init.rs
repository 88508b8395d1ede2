use ethereum_types::H256;
use rand::RngCore;
use tracing::info;

use super::{Env, StageError};
use crate::{
    opcm::{self, ReadSuperchainDeploymentInput},
    rpc::DETERMINISTIC_DEPLOYER_ADDRESS,
    standard,
    state::{ImplementationsContracts, STATE_VERSION, State, SuperchainContracts, SuperchainRoles},
};

pub(super) async fn init(env: &Env, st: &mut State) -> Result<(), StageError> {
    if env.target.is_genesis() {
        init_genesis(env, st)
    } else {
        init_live(env, st).await
    }
}

fn init_common_checks(st: &mut State) -> Result<(), StageError> {
    if st.version != STATE_VERSION {
        return Err(StageError::UnsupportedStateVersion(st.version));
    }
    if st.create2_salt.is_zero() {
        let mut salt = H256::zero();
        rand::thread_rng().fill_bytes(salt.as_bytes_mut());
        st.create2_salt = salt;
    }
    Ok(())
}

fn init_genesis(env: &Env, st: &mut State) -> Result<(), StageError> {
    info!(stage = "init", strategy = "genesis", "Initializing pipeline");
    init_common_checks(st)?;
    if env.intent.superchain_roles.is_none() {
        return Err(StageError::MissingSuperchainRoles);
    }
    Ok(())
}

async fn init_live(env: &Env, st: &mut State) -> Result<(), StageError> {
    info!(stage = "init", strategy = "live", "Initializing pipeline");
    init_common_checks(st)?;

    let intent = &env.intent;
    if let Some(tag) = intent.l1_locator()?.tag() {
        if !standard::is_supported_l1_version(tag) {
            return Err(StageError::UnsupportedL1Version(tag.to_string()));
        }
    }
    if let Some(tag) = intent.l2_locator()?.tag() {
        if !standard::is_supported_l2_version(tag) {
            return Err(StageError::UnsupportedL2Version(tag.to_string()));
        }
    }

    if let Some(opcm_address) = intent.opcm_address {
        if intent.superchain_config_proxy.is_some() {
            return Err(StageError::PredeployedOpcm("superchain config proxy"));
        }
        if intent.superchain_roles.is_some() {
            return Err(StageError::PredeployedOpcm("superchain roles"));
        }

        let out = opcm::read_superchain_deployment(
            env.l1_host.as_ref(),
            &ReadSuperchainDeploymentInput { opcm_address },
        )
        .await
        .map_err(StageError::script("error reading superchain deployment"))?;

        st.superchain_deployment = Some(SuperchainContracts {
            superchain_proxy_admin_impl: out.superchain_proxy_admin,
            superchain_config_proxy: out.superchain_config_proxy,
            superchain_config_impl: out.superchain_config_impl,
            protocol_versions_proxy: out.protocol_versions_proxy,
            protocol_versions_impl: out.protocol_versions_impl,
        });
        st.superchain_roles = Some(SuperchainRoles {
            superchain_proxy_admin_owner: out.superchain_proxy_admin_owner,
            protocol_versions_owner: out.protocol_versions_owner,
            superchain_guardian: out.guardian,
        });
        st.implementations_deployment = Some(ImplementationsContracts {
            opcm_impl: opcm_address,
            ..Default::default()
        });
    }

    let client = env.require_l1_client("live")?;
    let l1_chain_id = env
        .cancellable(async {
            client
                .chain_id()
                .await
                .map_err(StageError::rpc("failed to get L1 chain ID"))
        })
        .await?;
    if l1_chain_id != intent.l1_chain_id {
        return Err(StageError::L1ChainIdMismatch {
            got: l1_chain_id,
            expected: intent.l1_chain_id,
        });
    }

    let deployer_code = env
        .cancellable(async {
            client
                .code_at(DETERMINISTIC_DEPLOYER_ADDRESS)
                .await
                .map_err(StageError::rpc("failed to get deployer code"))
        })
        .await?;
    if deployer_code.is_empty() {
        return Err(StageError::MissingDeterministicDeployer);
    }

    let Some(applied) = &st.applied_intent else {
        return Ok(());
    };
    if applied.l1_chain_id != intent.l1_chain_id {
        return Err(StageError::Immutable {
            field: "L1ChainID",
            was: applied.l1_chain_id.to_string(),
            is: intent.l1_chain_id.to_string(),
        });
    }
    if applied.fund_dev_accounts != intent.fund_dev_accounts {
        return Err(StageError::Immutable {
            field: "fundDevAccounts",
            was: applied.fund_dev_accounts.to_string(),
            is: intent.fund_dev_accounts.to_string(),
        });
    }
    Ok(())
}

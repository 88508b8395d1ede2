use std::collections::BTreeMap;

use tracing::{info, warn};

use super::{Env, StageError};
use crate::{
    opcm::chain_id_to_u256,
    state::{InteropDepSet, InteropDependency, State},
};

pub(super) async fn generate_interop_depset(env: &Env, st: &mut State) -> Result<(), StageError> {
    let intent = &env.intent;
    if !intent.use_interop {
        warn!(
            stage = "generate-interop-depset",
            "Interop not enabled - skipping interop depset generation"
        );
        return Ok(());
    }
    info!(stage = "generate-interop-depset", "Creating interop dependency set");

    let dependencies: BTreeMap<_, _> = intent
        .chains
        .iter()
        .zip(0u32..)
        .map(|(chain, chain_index)| {
            (
                chain_id_to_u256(chain.id).to_string(),
                InteropDependency { chain_index },
            )
        })
        .collect();
    st.interop_dep_set = Some(InteropDepSet { dependencies });
    Ok(())
}

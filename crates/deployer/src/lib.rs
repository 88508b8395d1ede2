//! Staged, resumable deployment of OP Stack L1 contracts.
//!
//! The crate resolves contract artifacts, drives an external scripting
//! engine through a fixed sequence of pipeline stages and checkpoints the
//! resulting [`state::State`] after every stage so an interrupted run can be
//! picked up again.

pub mod apply;
pub mod artifacts;
pub mod bootstrap;
pub mod broadcaster;
pub mod clean;
pub mod init;
pub mod inspect;
pub mod opcm;
pub mod pipeline;
pub mod rpc;
pub mod script;
pub mod serde_utils;
pub mod signer;
pub mod standard;
pub mod state;

pub use ethereum_types::{Address, H256, U256};

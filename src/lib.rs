//! # TCG Rules Core
//!
//! A rules engine for a two-player elemental card battler.
//!
//! ## Overview
//!
//! Each player brings a team of characters and a deck of action cards. A
//! match moves through hand and active-character selection, then rounds of
//! dice rolling, alternating actions and end-phase bookkeeping until one side
//! has no characters left or the round limit is reached.
//!
//! ## Architecture
//!
//! The [`state::GameState`] snapshot is immutable; every change is a
//! [`state::mutation::Mutation`] applied by a pure function, and the
//! [`mutator::StateMutator`] owns the current snapshot. Card, character and
//! entity behaviour lives in the [`data::GameData`] catalogue as pure
//! skills that return new state plus follow-up events, which the
//! [`executor::SkillExecutor`] resolves breadth-first. Player decisions go
//! through the [`io::PlayerIo`] trait; the engine never assumes a transport.

#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod damage;
pub mod data;
pub mod detail_log;
pub mod dice;
pub mod error;
pub mod executor;
pub mod game;
pub mod io;
pub mod mutation_log;
pub mod mutator;
pub mod preview;
pub mod skill;
pub mod state;

pub use crate::config::{GameConfig, PartialGameConfig, PlayerConfig};
pub use crate::data::GameData;
pub use crate::error::{EngineError, EngineResult};
pub use crate::game::{Deck, Game, GameHandle};
pub use crate::io::{Notification, PlayerIo, RpcRequest, RpcResponse, TimeoutIo};
pub use crate::state::{GameState, Phase, Who};

/// Install the `env_logger` backend for the `log` facade. Safe to call more
/// than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::try_init();
}

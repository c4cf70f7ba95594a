//! The boundary between a match and its two players.
//!
//! A [`PlayerIo`] receives flushed notifications and answers the five
//! decision kinds. The engine never assumes a transport; [`TimeoutIo`] adds
//! the per-decision deadline the surrounding transport is expected to
//! enforce, answering late decisions with a fixed fallback.

pub mod expose;

use crate::error::EngineError;
use crate::state::entity::{DefinitionId, EntityId};
use crate::state::types::DiceType;
use expose::{ExposedAction, ExposedActionKind, ExposedCard, ExposedMutation, ExposedState};
use rocket::futures::future::BoxFuture;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum RpcMethod {
    ChooseActive,
    Reroll,
    SwitchHands,
    SelectCard,
    Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde", tag = "method")]
pub enum RpcRequest {
    ChooseActive {
        candidates: Vec<EntityId>,
    },
    Reroll {
        dice: Vec<DiceType>,
    },
    SwitchHands {
        hands: Vec<ExposedCard>,
    },
    SelectCard {
        candidates: Vec<DefinitionId>,
    },
    Action {
        actions: Vec<ExposedAction>,
        state: ExposedState,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde", tag = "method")]
pub enum RpcResponse {
    ChooseActive {
        active: EntityId,
    },
    Reroll {
        reroll: Vec<DiceType>,
    },
    SwitchHands {
        remove: Vec<EntityId>,
    },
    SelectCard {
        selected: DefinitionId,
    },
    Action {
        chosen_action_index: usize,
        used_dice: Vec<DiceType>,
    },
}

impl RpcRequest {
    pub fn method(&self) -> RpcMethod {
        match self {
            RpcRequest::ChooseActive { .. } => RpcMethod::ChooseActive,
            RpcRequest::Reroll { .. } => RpcMethod::Reroll,
            RpcRequest::SwitchHands { .. } => RpcMethod::SwitchHands,
            RpcRequest::SelectCard { .. } => RpcMethod::SelectCard,
            RpcRequest::Action { .. } => RpcMethod::Action,
        }
    }

    /// Answer used when the player does not decide in time: the first
    /// candidate, nothing rerolled or returned, or declaring end.
    pub fn fallback(&self) -> RpcResponse {
        match self {
            RpcRequest::ChooseActive { candidates } => RpcResponse::ChooseActive {
                active: candidates.first().copied().unwrap_or_default(),
            },
            RpcRequest::Reroll { .. } => RpcResponse::Reroll { reroll: vec![] },
            RpcRequest::SwitchHands { .. } => RpcResponse::SwitchHands { remove: vec![] },
            RpcRequest::SelectCard { candidates } => RpcResponse::SelectCard {
                selected: candidates.first().copied().unwrap_or_default(),
            },
            RpcRequest::Action { actions, .. } => RpcResponse::Action {
                chosen_action_index: actions
                    .iter()
                    .position(|a| a.kind == ExposedActionKind::DeclareEnd)
                    .unwrap_or(0),
                used_dice: vec![],
            },
        }
    }
}

impl RpcResponse {
    pub fn method(&self) -> RpcMethod {
        match self {
            RpcResponse::ChooseActive { .. } => RpcMethod::ChooseActive,
            RpcResponse::Reroll { .. } => RpcMethod::Reroll,
            RpcResponse::SwitchHands { .. } => RpcMethod::SwitchHands,
            RpcResponse::SelectCard { .. } => RpcMethod::SelectCard,
            RpcResponse::Action { .. } => RpcMethod::Action,
        }
    }
}

/// What a player receives on every flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct Notification {
    pub state: ExposedState,
    pub mutations: Vec<ExposedMutation>,
}

pub trait PlayerIo: Send + Sync {
    fn notify(&self, notification: Notification);

    /// Ask for a decision. An `Err` is a broken channel and forfeits the match.
    fn rpc(&self, request: RpcRequest) -> BoxFuture<'static, Result<RpcResponse, String>>;

    fn on_io_error(&self, _error: &EngineError) {}
}

/// Bounds every decision of the wrapped player by a deadline.
pub struct TimeoutIo {
    inner: Arc<dyn PlayerIo>,
    timeout: Duration,
}

impl TimeoutIo {
    pub fn new(inner: Arc<dyn PlayerIo>, timeout: Duration) -> Self {
        TimeoutIo { inner, timeout }
    }
}

impl PlayerIo for TimeoutIo {
    fn notify(&self, notification: Notification) {
        self.inner.notify(notification)
    }

    fn rpc(&self, request: RpcRequest) -> BoxFuture<'static, Result<RpcResponse, String>> {
        let fallback = request.fallback();
        let method = request.method();
        let pending = self.inner.rpc(request);
        let timeout = self.timeout;
        Box::pin(async move {
            match rocket::tokio::time::timeout(timeout, pending).await {
                Ok(answer) => answer,
                Err(_) => {
                    log::warn!("{:?} decision timed out after {:?}, using fallback", method, timeout);
                    Ok(fallback)
                }
            }
        })
    }

    fn on_io_error(&self, error: &EngineError) {
        self.inner.on_io_error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    impl PlayerIo for Silent {
        fn notify(&self, _notification: Notification) {}

        fn rpc(&self, _request: RpcRequest) -> BoxFuture<'static, Result<RpcResponse, String>> {
            Box::pin(rocket::futures::future::pending())
        }
    }

    struct Broken;

    impl PlayerIo for Broken {
        fn notify(&self, _notification: Notification) {}

        fn rpc(&self, _request: RpcRequest) -> BoxFuture<'static, Result<RpcResponse, String>> {
            Box::pin(async { Err("socket closed".to_string()) })
        }
    }

    #[tokio::test]
    async fn late_decisions_get_the_fallback() {
        let io = TimeoutIo::new(Arc::new(Silent), Duration::from_millis(10));
        let answer = io
            .rpc(RpcRequest::ChooseActive {
                candidates: vec![-3, -4],
            })
            .await;
        assert_eq!(answer, Ok(RpcResponse::ChooseActive { active: -3 }));
        let answer = io.rpc(RpcRequest::Reroll { dice: vec![DiceType::Geo] }).await;
        assert_eq!(answer, Ok(RpcResponse::Reroll { reroll: vec![] }));
    }

    #[tokio::test]
    async fn channel_errors_pass_through() {
        let io = TimeoutIo::new(Arc::new(Broken), Duration::from_secs(5));
        let answer = io.rpc(RpcRequest::SelectCard { candidates: vec![7] }).await;
        assert_eq!(answer, Err("socket closed".to_string()));
    }

    #[test]
    fn action_fallback_declares_end() {
        let state = ExposedState {
            phase: crate::state::Phase::Action,
            current_turn: crate::state::Who::First,
            round_number: 1,
            winner: None,
            players: vec![],
        };
        let action = |kind| ExposedAction {
            kind,
            cost: vec![],
            fast: false,
            auto_selected_dice: vec![],
            preview: None,
        };
        let request = RpcRequest::Action {
            actions: vec![
                action(ExposedActionKind::SwitchActive { from: None, to: -2 }),
                action(ExposedActionKind::DeclareEnd),
            ],
            state,
        };
        assert_eq!(
            request.fallback(),
            RpcResponse::Action {
                chosen_action_index: 1,
                used_dice: vec![]
            }
        );
    }
}

//! The match: phase state machine, player decisions and termination.
//!
//! [`Game::start`] drives the match until it ends. Each loop step re-reads
//! the phase and runs one handler; the action phase runs one turn per step.
//! A broken or invalid player answer forfeits that player's match.

pub mod actions;

use crate::config::{GameConfig, PlayerConfig};
use crate::data::GameData;
use crate::detail_log::{DetailLogKind, DetailLogger};
use crate::dice::{check_dice, contains_all, sort_dice};
use crate::error::{EngineError, EngineResult};
use crate::executor::SkillExecutor;
use crate::io::expose::{expose_action, expose_action_kind, expose_pending, expose_state, ExposedCard, ExposedMutation};
use crate::io::{Notification, PlayerIo, RpcRequest, RpcResponse};
use crate::mutation_log::MutationLog;
use crate::mutator::{MutationSink, MutatorHooks, PendingItem, StateMutator};
use crate::preview::ActionPreviewer;
use crate::skill::modifier::{ReplaceActionModifier, RollModifier};
use crate::skill::{Event, EventAndRequest, EventArg, EventName};
use crate::state::entity::{CardArea, DefinitionId, EntityId};
use crate::state::mutation::Mutation;
use crate::state::types::DiceType;
use crate::state::{GameState, Phase, PlayerFlag, Who};
use actions::{active_element, available_actions, perform_action, run_action_modifiers, tunable, ActionInfo, ActionKind};
use either::Either;
use rocket::futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Characters and cards a player brings to the match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deck {
    pub characters: Vec<DefinitionId>,
    pub cards: Vec<DefinitionId>,
}

/// Spectator checkpoint invoked at every pause.
pub type PauseHandler = Arc<dyn Fn(&GameState) -> BoxFuture<'static, ()> + Send + Sync>;

struct GameHooks {
    players: [Arc<dyn PlayerIo>; 2],
    configs: [PlayerConfig; 2],
    pause: Option<PauseHandler>,
}

impl GameHooks {
    fn call(&self, who: Who, request: RpcRequest) -> BoxFuture<'static, EngineResult<RpcResponse>> {
        let expected = request.method();
        let pending = self.players[who.index()].rpc(request);
        Box::pin(async move {
            let response = pending.await.map_err(|e| EngineError::io(who, e))?;
            if response.method() != expected {
                return Err(EngineError::io(
                    who,
                    format!("expected a {:?} answer, got {:?}", expected, response.method()),
                ));
            }
            Ok(response)
        })
    }
}

fn unexpected(who: Who) -> EngineError {
    EngineError::io(who, "unexpected rpc response")
}

impl MutatorHooks for GameHooks {
    fn on_notify(&self, state: &GameState, pending: &[PendingItem]) {
        for who in Who::both() {
            self.players[who.index()].notify(Notification {
                state: expose_state(state, Some(who)),
                mutations: expose_pending(state, pending, Some(who)),
            });
        }
    }

    fn on_pause(&self, state: &GameState) -> BoxFuture<'static, ()> {
        match &self.pause {
            Some(pause) => pause(state),
            None => Box::pin(async {}),
        }
    }

    fn player_config(&self, who: Who) -> PlayerConfig {
        self.configs[who.index()]
    }

    fn choose_active(&self, who: Who, _state: &GameState, candidates: Vec<EntityId>) -> BoxFuture<'static, EngineResult<EntityId>> {
        let call = self.call(who, RpcRequest::ChooseActive { candidates });
        Box::pin(async move {
            match call.await? {
                RpcResponse::ChooseActive { active } => Ok(active),
                _ => Err(unexpected(who)),
            }
        })
    }

    fn reroll(&self, who: Who, state: &GameState) -> BoxFuture<'static, EngineResult<Vec<DiceType>>> {
        let dice = state.player(who).dice.clone();
        let call = self.call(who, RpcRequest::Reroll { dice });
        Box::pin(async move {
            match call.await? {
                RpcResponse::Reroll { reroll } => Ok(reroll),
                _ => Err(unexpected(who)),
            }
        })
    }

    fn switch_hands(&self, who: Who, state: &GameState) -> BoxFuture<'static, EngineResult<Vec<EntityId>>> {
        let hands = state
            .player(who)
            .hands
            .iter()
            .map(|c| ExposedCard {
                id: c.id,
                definition_id: c.definition,
            })
            .collect();
        let call = self.call(who, RpcRequest::SwitchHands { hands });
        Box::pin(async move {
            match call.await? {
                RpcResponse::SwitchHands { remove } => Ok(remove),
                _ => Err(unexpected(who)),
            }
        })
    }

    fn select_card(&self, who: Who, _state: &GameState, candidates: Vec<DefinitionId>) -> BoxFuture<'static, EngineResult<DefinitionId>> {
        let call = self.call(who, RpcRequest::SelectCard { candidates });
        Box::pin(async move {
            match call.await? {
                RpcResponse::SelectCard { selected } => Ok(selected),
                _ => Err(unexpected(who)),
            }
        })
    }
}

const NO_SURRENDER: u8 = 0;

/// Shared control over a running match. Cloneable and usable from any task.
#[derive(Clone)]
pub struct GameHandle {
    halted: Arc<AtomicBool>,
    surrender: Arc<AtomicU8>,
}

impl GameHandle {
    /// Stop the match. Calling it again has no further effect.
    pub fn terminate(&self) {
        if !self.halted.swap(true, Ordering::SeqCst) {
            log::info!("match terminated");
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// `who` concedes; applied at the next step of the match.
    pub fn give_up(&self, who: Who) {
        let code = who.index() as u8 + 1;
        let _ = self
            .surrender
            .compare_exchange(NO_SURRENDER, code, Ordering::SeqCst, Ordering::SeqCst);
    }

    fn take_surrender(&self) -> Option<Who> {
        match self.surrender.swap(NO_SURRENDER, Ordering::SeqCst) {
            1 => Some(Who::First),
            2 => Some(Who::Second),
            _ => None,
        }
    }
}

pub struct Game {
    mutator: StateMutator,
    hooks: Arc<GameHooks>,
    decks: [Deck; 2],
    handle: GameHandle,
    with_preview: bool,
    started: bool,
}

impl Game {
    pub fn new(
        data: Arc<GameData>,
        config: GameConfig,
        decks: [Deck; 2],
        players: [Arc<dyn PlayerIo>; 2],
        configs: [PlayerConfig; 2],
    ) -> Self {
        let handle = GameHandle {
            halted: Arc::new(AtomicBool::new(false)),
            surrender: Arc::new(AtomicU8::new(NO_SURRENDER)),
        };
        let hooks = Arc::new(GameHooks {
            players,
            configs,
            pause: None,
        });
        let state = GameState::new(data, config);
        let mutator = StateMutator::new(state, hooks.clone(), Arc::clone(&handle.halted));
        Game {
            mutator,
            hooks,
            decks,
            handle,
            with_preview: true,
            started: false,
        }
    }

    /// Attach forecasts to offered actions (on by default).
    pub fn with_previews(mut self, enabled: bool) -> Self {
        self.with_preview = enabled;
        self
    }

    pub fn with_pause_handler(mut self, pause: PauseHandler) -> Self {
        let hooks = Arc::new(GameHooks {
            players: self.hooks.players.clone(),
            configs: self.hooks.configs,
            pause: Some(pause),
        });
        let state = self.mutator.state().clone();
        let detail = self.mutator.detail().clone();
        self.mutator = StateMutator::new(state, hooks.clone(), Arc::clone(&self.handle.halted)).with_detail(detail);
        self.hooks = hooks;
        self
    }

    pub fn handle(&self) -> GameHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> &GameState {
        self.mutator.state()
    }

    pub fn mutation_log(&self) -> &MutationLog {
        self.mutator.log()
    }

    pub fn detail_log(&self) -> &DetailLogger {
        self.mutator.detail()
    }

    pub fn terminate(&self) {
        self.handle.terminate()
    }

    /// Concede immediately on behalf of `who`.
    pub fn give_up(&mut self, who: Who) -> EngineResult<()> {
        self.finish(Some(who.opposite()))
    }

    fn finish(&mut self, winner: Option<Who>) -> EngineResult<()> {
        if self.mutator.frozen() {
            return Ok(());
        }
        self.mutator.mutate(Mutation::SetWinner { winner })?;
        self.mutator.mutate(Mutation::ChangePhase {
            new_phase: Phase::GameEnd,
        })?;
        self.mutator.notify();
        Ok(())
    }

    /// Run the match to its end and return the winner (`None` for a draw or
    /// a terminated match).
    pub async fn start(&mut self) -> EngineResult<Option<Who>> {
        if self.handle.is_terminated() {
            return Err(EngineError::internal("cannot start a terminated match"));
        }
        if self.started {
            return Err(EngineError::internal("match already started"));
        }
        self.started = true;
        log::info!("match starting with seed {}", self.state().config.random_seed);
        self.create_board()?;

        loop {
            if self.handle.is_terminated() || self.state().phase == Phase::GameEnd {
                break;
            }
            if let Some(who) = self.handle.take_surrender() {
                self.give_up(who)?;
                break;
            }
            let phase = self.state().phase;
            let _scope = self
                .mutator
                .detail()
                .begin_scope(DetailLogKind::Phase, format!("{:?}", phase));
            let step = match phase {
                Phase::InitHands => self.init_hands().await,
                Phase::InitActives => self.init_actives().await,
                Phase::Roll => self.roll().await,
                Phase::Action => self.action().await,
                Phase::End => self.end().await,
                Phase::GameEnd => Ok(()),
            };
            match step {
                Ok(()) => self.mutator.pause().await,
                Err(error @ EngineError::Io { .. }) => self.forfeit(error)?,
                Err(error) => {
                    log::error!("match aborted: {}", error);
                    return Err(error);
                }
            }
        }
        self.mutator.notify();
        let winner = self.state().winner;
        log::info!("match over, winner {:?}", winner);
        Ok(winner)
    }

    fn forfeit(&mut self, error: EngineError) -> EngineResult<()> {
        log::warn!("{}", error);
        self.mutator
            .detail()
            .log(DetailLogKind::Io, error.to_string());
        for player in &self.hooks.players {
            player.on_io_error(&error);
        }
        match &error {
            EngineError::Io { who, .. } => self.finish(Some(who.opposite())),
            _ => Err(error),
        }
    }

    fn create_board(&mut self) -> EngineResult<()> {
        for who in Who::both() {
            let deck = self.decks[who.index()].clone();
            for character in &deck.characters {
                self.mutator.create_character(who, *character)?;
            }
            for card in &deck.cards {
                self.mutator.create_card(who, *card, CardArea::Pile, None)?;
            }
        }
        self.mutator.notify();
        Ok(())
    }

    async fn events(&mut self, events: Vec<EventAndRequest>) -> EngineResult<()> {
        SkillExecutor::handle_events(&mut self.mutator, events).await
    }

    async fn emit(&mut self, name: EventName, arg: EventArg) -> EngineResult<()> {
        self.events(vec![Either::Left(Event::new(name, arg))]).await
    }

    fn turn_order(&self) -> [Who; 2] {
        let current = self.state().current_turn;
        [current, current.opposite()]
    }

    async fn init_hands(&mut self) -> EngineResult<()> {
        let count = self.state().config.initial_hands_count;
        for who in Who::both() {
            self.mutator.shuffle_pile(who)?;
            for _ in 0..count {
                self.mutator.draw_card(who)?;
            }
        }
        self.mutator.switch_hands_both(Who::both().to_vec()).await?;
        self.mutator.mutate(Mutation::ChangePhase {
            new_phase: Phase::InitActives,
        })
    }

    async fn init_actives(&mut self) -> EngineResult<()> {
        let mut requests = vec![];
        for who in Who::both() {
            let candidates: Vec<EntityId> = self.state().player(who).alive_characters().map(|c| c.id).collect();
            if candidates.is_empty() {
                return Err(EngineError::data(format!("{:?} has no characters", who)));
            }
            requests.push((who, candidates));
        }
        for (who, to) in self.mutator.choose_active_both(requests).await? {
            self.mutator.mutate(Mutation::SwitchActive { who, to })?;
        }
        self.emit(EventName::OnBattleBegin, EventArg::None).await?;
        self.mutator.mutate(Mutation::ChangePhase { new_phase: Phase::Roll })?;
        self.mutator.mutate(Mutation::StepRound)
    }

    async fn roll(&mut self) -> EngineResult<()> {
        let mut rerolls = vec![];
        for who in self.turn_order() {
            let mut arg = EventArg::ModifyRoll(RollModifier::new(who));
            SkillExecutor::broadcast_inline(&mut self.mutator, EventName::ModifyRoll, &mut arg).await?;
            let modifier = match arg {
                EventArg::ModifyRoll(m) => m,
                _ => return Err(EngineError::internal("roll modifier replaced by another payload")),
            };
            let always_omni = self.mutator.player_config(who).always_omni;
            let count = self
                .state()
                .config
                .initial_dice_count
                .saturating_sub(modifier.fixed_dice.len());
            let mut dice = modifier.fixed_dice.clone();
            dice.extend(self.mutator.random_dice(count, always_omni)?);
            let dice = sort_dice(&dice, active_element(self.state(), who)?);
            self.mutator.mutate(Mutation::ResetDice { who, dice })?;
            rerolls.push((who, 1 + modifier.extra_reroll));
        }
        self.mutator.reroll_both(rerolls).await?;
        self.mutator.mutate(Mutation::ChangePhase { new_phase: Phase::Action })?;
        self.emit(EventName::OnActionPhase, EventArg::None).await
    }

    fn set_flag(&mut self, who: Who, flag: PlayerFlag, value: bool) -> EngineResult<()> {
        if self.state().player(who).flags.get(flag) == value {
            return Ok(());
        }
        self.mutator.mutate(Mutation::SetPlayerFlag { who, flag, value })
    }

    /// One turn of the acting side.
    async fn action(&mut self) -> EngineResult<()> {
        let who = self.state().current_turn;
        let declared = |s: &GameState, w: Who| s.player(w).flags.declared_end;
        if declared(self.state(), who) && declared(self.state(), who.opposite()) {
            return self.mutator.mutate(Mutation::ChangePhase { new_phase: Phase::End });
        }
        if declared(self.state(), who) {
            return self.mutator.mutate(Mutation::SwitchTurn);
        }
        let even = self.state().player(who).dice.len() % 2 == 0;
        self.set_flag(who, PlayerFlag::CanCharged, even)?;
        if self.state().player(who).flags.skip_next_turn {
            self.set_flag(who, PlayerFlag::SkipNextTurn, false)?;
            return self.mutator.mutate(Mutation::SwitchTurn);
        }

        self.emit(EventName::OnBeforeAction, EventArg::Player { who }).await?;
        if self.mutator.frozen() {
            return Ok(());
        }
        let mut arg = EventArg::ReplaceAction(ReplaceActionModifier::new(who));
        SkillExecutor::broadcast_inline(&mut self.mutator, EventName::ReplaceAction, &mut arg).await?;
        if matches!(&arg, EventArg::ReplaceAction(r) if r.replaced) {
            self.mutator
                .detail()
                .log(DetailLogKind::Other, format!("{:?} turn replaced", who));
            return self.end_turn(false);
        }

        let offered = self.offered_actions(who).await?;
        self.mutator.expose(ExposedMutation::OppAction { who });
        self.mutator.notify();
        let request = RpcRequest::Action {
            actions: offered.iter().map(|(_, shown)| expose_action(shown)).collect(),
            state: expose_state(self.state(), Some(who)),
        };
        let (index, used_dice) = match self.hooks.call(who, request).await? {
            RpcResponse::Action {
                chosen_action_index,
                used_dice,
            } => (chosen_action_index, used_dice),
            _ => return Err(unexpected(who)),
        };
        let (base, _) = offered
            .into_iter()
            .nth(index)
            .ok_or_else(|| EngineError::io(who, format!("action index {} out of range", index)))?;

        // modifiers run again on the real state so their usages are consumed
        let modified = run_action_modifiers(&mut self.mutator, base).await?;
        if !modified.completed {
            return Err(EngineError::internal("offered action was cancelled on commit"));
        }
        let action = modified.action;
        self.check_payment(who, &action, &used_dice)?;
        perform_action(&mut self.mutator, &action, &used_dice).await?;
        self.mutator.expose(ExposedMutation::PlayerAction {
            who,
            action: expose_action_kind(&action.kind),
        });
        self.end_turn(action.fast)
    }

    fn end_turn(&mut self, fast: bool) -> EngineResult<()> {
        if fast || self.mutator.frozen() {
            return Ok(());
        }
        self.mutator.mutate(Mutation::SwitchTurn)
    }

    /// Actions offered to `who`, each paired with the unmodified action it
    /// came from. The offered copy is cost-modified, has dice picked and
    /// optionally carries a preview.
    async fn offered_actions(&self, who: Who) -> EngineResult<Vec<(ActionInfo, ActionInfo)>> {
        let previewer = ActionPreviewer::new(self.state(), who);
        let mut out = vec![];
        for base in available_actions(self.state(), who, self.hooks.configs[who.index()])? {
            if let Some(shown) = previewer.modify_and_preview(base.clone(), self.with_preview).await? {
                out.push((base, shown));
            }
        }
        Ok(out)
    }

    /// What `who` would be offered on the current snapshot.
    pub async fn available_actions(&self, who: Who) -> EngineResult<Vec<ActionInfo>> {
        Ok(self
            .offered_actions(who)
            .await?
            .into_iter()
            .map(|(_, shown)| shown)
            .collect())
    }

    fn check_payment(&self, who: Who, action: &ActionInfo, used: &[DiceType]) -> EngineResult<()> {
        let held = &self.state().player(who).dice;
        if !contains_all(held, used) {
            return Err(EngineError::io(who, "used dice are not held"));
        }
        let paid = match &action.kind {
            ActionKind::ElementalTuning { result, .. } => {
                used.len() == 1 && tunable(used[0], Some(*result), self.hooks.configs[who.index()])
            }
            _ => check_dice(&action.cost, used),
        };
        if paid {
            Ok(())
        } else {
            Err(EngineError::io(who, format!("dice {:?} do not pay {:?}", used, action.cost)))
        }
    }

    async fn end(&mut self) -> EngineResult<()> {
        let current = self.state().current_turn;
        self.emit(EventName::OnEndPhase, EventArg::Player { who: current }).await?;
        let mut drawn = vec![];
        for who in self.turn_order() {
            for _ in 0..2 {
                if let Some(card) = self.mutator.draw_card(who)? {
                    drawn.push(Either::Left(Event::new(EventName::OnHandCard, EventArg::HandCard { who, card })));
                }
            }
        }
        self.events(drawn).await?;
        self.emit(EventName::OnRoundEnd, EventArg::None).await?;
        if self.mutator.frozen() {
            return Ok(());
        }
        for who in Who::both() {
            for flag in PlayerFlag::per_round() {
                self.set_flag(who, flag, false)?;
            }
            if !self.state().player(who).round_skill_log.is_empty() {
                self.mutator.mutate(Mutation::ClearRoundSkillLog { who })?;
            }
        }
        if self.state().round_number >= self.state().config.max_rounds_count {
            log::info!("round limit reached");
            return self.finish(None);
        }
        self.mutator.mutate(Mutation::StepRound)?;
        self.mutator.mutate(Mutation::ChangePhase { new_phase: Phase::Roll })
    }
}

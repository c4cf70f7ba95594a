//! Owner of the current snapshot.
//!
//! [`StateMutator`] applies primitive mutations one at a time, buffers them
//! until the next [`StateMutator::notify`], and performs the suspension
//! points where the match waits for a player's decision. Two independent
//! decisions (one per side) are requested together and awaited as a pair.

use crate::config::PlayerConfig;
use crate::data::definition::EntityKind;
use crate::detail_log::{DetailLogKind, DetailLogger};
use crate::dice::sort_dice;
use crate::error::{EngineError, EngineResult};
use crate::io::expose::ExposedMutation;
use crate::mutation_log::MutationLog;
use crate::skill::context::SkillOutcome;
use crate::skill::EventAndRequest;
use crate::state::entity::{
    CardArea, CardState, CharacterState, DefinitionId, EntityArea, EntityId, EntityState,
};
use crate::state::mutation::{apply_mutation, Mutation, RemoveCardReason};
use crate::state::types::DiceType;
use crate::state::{GameState, Phase, Who};
use either::Either;
use rocket::futures::future::{join_all, BoxFuture};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A buffered notification item: a primitive edit or a semantic summary.
pub type PendingItem = Either<Mutation, ExposedMutation>;

/// Anything that can accept primitive mutations. The provided methods build
/// the common multi-step edits on top of [`MutationSink::mutate`], and every
/// random draw goes through [`MutationSink::step_random`].
pub trait MutationSink {
    fn state(&self) -> &GameState;
    fn mutate(&mut self, mutation: Mutation) -> EngineResult<()>;

    fn step_random(&mut self) -> EngineResult<u64> {
        let value = self.state().iterators.peek_random();
        self.mutate(Mutation::StepRandom)?;
        Ok(value)
    }

    fn random_dice(&mut self, count: usize, always_omni: bool) -> EngineResult<Vec<DiceType>> {
        let faces = DiceType::rollable();
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            if always_omni {
                out.push(DiceType::Omni);
            } else {
                let roll = self.step_random()?;
                out.push(faces[(roll % faces.len() as u64) as usize]);
            }
        }
        Ok(out)
    }

    /// Move the top pile card to hand. A card drawn into a full hand is
    /// discarded as overflow and `None` is returned.
    fn draw_card(&mut self, who: Who) -> EngineResult<Option<CardState>> {
        let (card, hand_full) = {
            let state = self.state();
            let player = state.player(who);
            match player.piles.first() {
                Some(card) => (*card, player.hands.len() >= state.config.max_hands_count),
                None => return Ok(None),
            }
        };
        if hand_full {
            self.mutate(Mutation::RemoveCard {
                who,
                area: CardArea::Pile,
                card: card.id,
                reason: RemoveCardReason::Overflow,
            })?;
            return Ok(None);
        }
        self.mutate(Mutation::TransferCard {
            who,
            from: CardArea::Pile,
            to: CardArea::Hands,
            card: card.id,
            target_index: None,
        })?;
        Ok(Some(card))
    }

    fn create_card(
        &mut self,
        who: Who,
        definition: DefinitionId,
        area: CardArea,
        target_index: Option<usize>,
    ) -> EngineResult<Option<CardState>> {
        let state = self.state();
        if area == CardArea::Hands && state.player(who).hands.len() >= state.config.max_hands_count
        {
            return Ok(None);
        }
        let card = CardState {
            id: state.iterators.next_id,
            definition,
        };
        self.mutate(Mutation::CreateCard {
            who,
            card,
            area,
            target_index,
        })?;
        Ok(Some(card))
    }

    fn create_character(&mut self, who: Who, definition: DefinitionId) -> EngineResult<EntityId> {
        let state = self.state();
        let def = state.data.character(definition)?;
        let character = CharacterState {
            id: state.iterators.next_id,
            definition,
            variables: def.initial_variables(),
            entities: vec![],
        };
        let id = character.id;
        self.mutate(Mutation::CreateCharacter { who, character })?;
        Ok(id)
    }

    /// Create an entity, or refresh the variables of an existing entity with
    /// the same definition in the same area. `None` when the zone is full.
    fn create_entity(&mut self, area: EntityArea, definition: DefinitionId) -> EngineResult<Option<EntityId>> {
        let state = self.state();
        let def = Arc::clone(state.data.entity(definition)?);
        let zone = state
            .player(area.who())
            .entities_in(&area)
            .ok_or_else(|| EngineError::internal(format!("entity area {:?} does not exist", area)))?;
        if let Some(existing) = zone.iter().find(|e| e.definition == definition) {
            let id = existing.id;
            let refreshed = def.recreated_variables(&existing.variables);
            let changes: Vec<_> = refreshed
                .iter()
                .filter(|(name, value)| existing.variables.get(name) != Some(**value))
                .map(|(name, value)| (name.clone(), *value))
                .collect();
            for (var, value) in changes {
                self.mutate(Mutation::ModifyEntityVar {
                    entity: id,
                    var,
                    value,
                })?;
            }
            return Ok(Some(id));
        }
        let cap = match (area, def.kind) {
            (EntityArea::Summons { .. }, _) | (_, EntityKind::Summon) => {
                Some(state.config.max_summons_count)
            }
            (EntityArea::Supports { .. }, _) => Some(state.config.max_supports_count),
            _ => None,
        };
        if cap.map_or(false, |cap| zone.len() >= cap) {
            return Ok(None);
        }
        let entity = EntityState {
            id: state.iterators.next_id,
            definition,
            variables: def.initial_variables(),
        };
        let id = entity.id;
        self.mutate(Mutation::CreateEntity { area, entity })?;
        Ok(Some(id))
    }

    /// Uniform shuffle built from pile-to-pile transfers.
    fn shuffle_pile(&mut self, who: Who) -> EngineResult<()> {
        let len = self.state().player(who).piles.len();
        for i in 0..len {
            let pick = i + (self.step_random()? % (len - i) as u64) as usize;
            if pick == i {
                continue;
            }
            let card = self.state().player(who).piles[pick].id;
            self.mutate(Mutation::TransferCard {
                who,
                from: CardArea::Pile,
                to: CardArea::Pile,
                card,
                target_index: Some(i),
            })?;
        }
        Ok(())
    }
}

/// Where the mutator sends notifications and obtains decisions.
pub trait MutatorHooks: Send + Sync {
    fn on_notify(&self, state: &GameState, pending: &[PendingItem]);

    /// Spectator checkpoint; resolves when the match may continue.
    fn on_pause(&self, _state: &GameState) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }

    fn player_config(&self, _who: Who) -> PlayerConfig {
        PlayerConfig::default()
    }

    fn choose_active(
        &self,
        who: Who,
        state: &GameState,
        candidates: Vec<EntityId>,
    ) -> BoxFuture<'static, EngineResult<EntityId>>;

    /// Dice the player wants rerolled; empty to stop.
    fn reroll(&self, who: Who, state: &GameState) -> BoxFuture<'static, EngineResult<Vec<DiceType>>>;

    /// Hand cards the player wants to return.
    fn switch_hands(&self, who: Who, state: &GameState) -> BoxFuture<'static, EngineResult<Vec<EntityId>>>;

    fn select_card(
        &self,
        who: Who,
        state: &GameState,
        candidates: Vec<DefinitionId>,
    ) -> BoxFuture<'static, EngineResult<DefinitionId>>;
}

/// Hooks for throwaway branches: nothing is sent and every decision takes
/// the first or empty answer immediately.
pub struct PreviewHooks;

impl MutatorHooks for PreviewHooks {
    fn on_notify(&self, _state: &GameState, _pending: &[PendingItem]) {}

    fn choose_active(
        &self,
        who: Who,
        _state: &GameState,
        candidates: Vec<EntityId>,
    ) -> BoxFuture<'static, EngineResult<EntityId>> {
        let first = candidates
            .first()
            .copied()
            .ok_or_else(|| EngineError::io(who, "no active candidates"));
        Box::pin(async move { first })
    }

    fn reroll(&self, _who: Who, _state: &GameState) -> BoxFuture<'static, EngineResult<Vec<DiceType>>> {
        Box::pin(async { Ok(vec![]) })
    }

    fn switch_hands(&self, _who: Who, _state: &GameState) -> BoxFuture<'static, EngineResult<Vec<EntityId>>> {
        Box::pin(async { Ok(vec![]) })
    }

    fn select_card(
        &self,
        who: Who,
        _state: &GameState,
        candidates: Vec<DefinitionId>,
    ) -> BoxFuture<'static, EngineResult<DefinitionId>> {
        let first = candidates
            .first()
            .copied()
            .ok_or_else(|| EngineError::io(who, "no card candidates"));
        Box::pin(async move { first })
    }
}

pub struct StateMutator {
    state: GameState,
    hooks: Arc<dyn MutatorHooks>,
    pending: Vec<PendingItem>,
    log: MutationLog,
    detail: DetailLogger,
    preview: bool,
    halted: Arc<AtomicBool>,
}

impl MutationSink for StateMutator {
    fn state(&self) -> &GameState {
        &self.state
    }

    /// Mutations are ignored once the match has ended or been terminated.
    fn mutate(&mut self, mutation: Mutation) -> EngineResult<()> {
        if self.frozen() {
            log::debug!("ignoring {:?} on a frozen match", mutation);
            return Ok(());
        }
        self.state = apply_mutation(&self.state, &mutation)?;
        self.record(mutation);
        Ok(())
    }
}

impl StateMutator {
    pub fn new(state: GameState, hooks: Arc<dyn MutatorHooks>, halted: Arc<AtomicBool>) -> Self {
        StateMutator {
            state,
            hooks,
            pending: vec![],
            log: MutationLog::new(),
            detail: DetailLogger::new(),
            preview: false,
            halted,
        }
    }

    /// A mutator over a throwaway copy of `state`.
    pub fn for_preview(state: &GameState) -> Self {
        StateMutator {
            state: state.clone(),
            hooks: Arc::new(PreviewHooks),
            pending: vec![],
            log: MutationLog::new(),
            detail: DetailLogger::disabled(),
            preview: true,
            halted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_preview(&self) -> bool {
        self.preview
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    pub fn log(&self) -> &MutationLog {
        &self.log
    }

    pub fn detail(&self) -> &DetailLogger {
        &self.detail
    }

    pub fn with_detail(mut self, detail: DetailLogger) -> Self {
        self.detail = detail;
        self
    }

    /// Items buffered since the last notify.
    pub fn pending(&self) -> &[PendingItem] {
        &self.pending
    }

    pub fn frozen(&self) -> bool {
        self.state.phase == Phase::GameEnd || self.halted.load(Ordering::SeqCst)
    }

    pub fn halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    fn record(&mut self, mutation: Mutation) {
        self.detail
            .log(DetailLogKind::Mutation, format!("{:?}", mutation));
        self.log.append(mutation.clone());
        self.pending.push(Either::Left(mutation));
    }

    pub fn expose(&mut self, exposed: ExposedMutation) {
        if self.halted() {
            return;
        }
        self.pending.push(Either::Right(exposed));
    }

    /// Fold a skill outcome into the real snapshot and hand back its
    /// follow-up events.
    pub fn absorb(&mut self, outcome: SkillOutcome) -> Vec<EventAndRequest> {
        if self.frozen() {
            return vec![];
        }
        self.state = outcome.state;
        for mutation in outcome.mutations {
            self.record(mutation);
        }
        for exposed in outcome.exposed {
            self.pending.push(Either::Right(exposed));
        }
        outcome.events
    }

    /// Flush buffered mutations to the observers.
    pub fn notify(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if self.preview {
            return;
        }
        self.hooks.on_notify(&self.state, &pending);
    }

    /// Flush, then wait at a spectator checkpoint.
    pub async fn pause(&mut self) {
        self.notify();
        if self.preview {
            return;
        }
        self.hooks.on_pause(&self.state).await;
    }

    pub fn player_config(&self, who: Who) -> PlayerConfig {
        self.hooks.player_config(who)
    }

    pub async fn choose_active(&mut self, who: Who, candidates: Vec<EntityId>) -> EngineResult<EntityId> {
        let mut chosen = self.choose_active_both(vec![(who, candidates)]).await?;
        chosen
            .pop()
            .map(|(_, id)| id)
            .ok_or_else(|| EngineError::internal("active choice produced no answer"))
    }

    /// Ask every listed side for a new active character at the same time.
    /// A side with a single candidate is answered without asking.
    pub async fn choose_active_both(
        &mut self,
        requests: Vec<(Who, Vec<EntityId>)>,
    ) -> EngineResult<Vec<(Who, EntityId)>> {
        self.notify();
        let futures: Vec<_> = requests
            .iter()
            .map(|(who, candidates)| -> BoxFuture<'static, EngineResult<EntityId>> {
                if candidates.len() == 1 {
                    let only = candidates[0];
                    Box::pin(async move { Ok(only) })
                } else {
                    self.hooks.choose_active(*who, &self.state, candidates.clone())
                }
            })
            .collect();
        let answers = join_all(futures).await;
        let mut out = Vec::with_capacity(requests.len());
        for ((who, candidates), answer) in requests.into_iter().zip(answers) {
            let id = answer?;
            if !candidates.contains(&id) {
                return Err(EngineError::io(who, format!("{} is not a valid active character", id)));
            }
            self.detail
                .log(DetailLogKind::Request, format!("{:?} chose active {}", who, id));
            out.push((who, id));
        }
        Ok(out)
    }

    pub async fn reroll(&mut self, who: Who, times: u32) -> EngineResult<()> {
        self.reroll_both(vec![(who, times)]).await
    }

    /// Reroll rounds run in lockstep: each round asks every side that still
    /// has rounds left at once, then applies the answers in side order.
    pub async fn reroll_both(&mut self, requests: Vec<(Who, u32)>) -> EngineResult<()> {
        let mut remaining = requests;
        while !remaining.is_empty() {
            self.notify();
            let futures: Vec<_> = remaining
                .iter()
                .map(|(who, _)| self.hooks.reroll(*who, &self.state))
                .collect();
            let answers = join_all(futures).await;
            let mut next = vec![];
            for ((who, times), answer) in remaining.into_iter().zip(answers) {
                let selected = answer?;
                if selected.is_empty() {
                    continue;
                }
                self.apply_reroll(who, &selected)?;
                if times > 1 {
                    next.push((who, times - 1));
                }
            }
            remaining = next;
        }
        Ok(())
    }

    fn apply_reroll(&mut self, who: Who, selected: &[DiceType]) -> EngineResult<()> {
        let mut kept = self.state.player(who).dice.clone();
        for dice in selected {
            let index = kept
                .iter()
                .position(|d| d == dice)
                .ok_or_else(|| EngineError::io(who, format!("cannot reroll {:?}: not held", dice)))?;
            kept.remove(index);
        }
        let always_omni = self.player_config(who).always_omni;
        kept.extend(self.random_dice(selected.len(), always_omni)?);
        let dice = sort_dice(&kept, self.active_element(who)?);
        self.mutate(Mutation::ResetDice { who, dice })?;
        self.expose(ExposedMutation::RerollDone {
            who,
            count: selected.len(),
        });
        Ok(())
    }

    pub fn active_element(&self, who: Who) -> EngineResult<Option<DiceType>> {
        match self.state.active_character(who) {
            Some(c) => Ok(Some(self.state.data.character(c.definition)?.element)),
            None => Ok(None),
        }
    }

    /// Both sides pick hand cards to return at once; the returned cards go
    /// back into the pile at random positions and the same number is drawn.
    pub async fn switch_hands_both(&mut self, sides: Vec<Who>) -> EngineResult<()> {
        self.notify();
        let futures: Vec<_> = sides
            .iter()
            .map(|who| self.hooks.switch_hands(*who, &self.state))
            .collect();
        let answers = join_all(futures).await;
        for (who, answer) in sides.into_iter().zip(answers) {
            let removed = answer?;
            self.apply_switch_hands(who, &removed)?;
        }
        Ok(())
    }

    fn apply_switch_hands(&mut self, who: Who, removed: &[EntityId]) -> EngineResult<()> {
        let mut definitions = vec![];
        for (i, id) in removed.iter().enumerate() {
            if removed[..i].contains(id) {
                return Err(EngineError::io(who, format!("card {} returned twice", id)));
            }
            let card = self
                .state
                .player(who)
                .hands
                .iter()
                .find(|c| c.id == *id)
                .copied()
                .ok_or_else(|| EngineError::io(who, format!("card {} is not in hand", id)))?;
            definitions.push(card.definition);
        }
        for id in removed {
            let pile_len = self.state.player(who).piles.len();
            let index = (self.step_random()? % (pile_len as u64 + 1)) as usize;
            self.mutate(Mutation::TransferCard {
                who,
                from: CardArea::Hands,
                to: CardArea::Pile,
                card: *id,
                target_index: Some(index),
            })?;
        }
        for _ in 0..removed.len() {
            let piles = &self.state.player(who).piles;
            let pick = piles
                .iter()
                .find(|c| !definitions.contains(&c.definition))
                .or_else(|| piles.first())
                .map(|c| c.id);
            if let Some(card) = pick {
                self.mutate(Mutation::TransferCard {
                    who,
                    from: CardArea::Pile,
                    to: CardArea::Hands,
                    card,
                    target_index: None,
                })?;
            }
        }
        self.expose(ExposedMutation::SwitchHandsDone {
            who,
            count: removed.len(),
        });
        Ok(())
    }

    /// Offer card definitions and put the chosen one into hand.
    pub async fn select_card(&mut self, who: Who, candidates: Vec<DefinitionId>) -> EngineResult<Option<CardState>> {
        self.notify();
        let selected = self
            .hooks
            .select_card(who, &self.state, candidates.clone())
            .await?;
        if !candidates.contains(&selected) {
            return Err(EngineError::io(who, format!("{} was not offered", selected)));
        }
        let card = self.create_card(who, selected, CardArea::Hands, None)?;
        self.expose(ExposedMutation::SelectCardDone {
            who,
            definition_id: selected,
        });
        Ok(card)
    }
}

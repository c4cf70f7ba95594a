//! Execution context handed to skill bodies.
//!
//! A context owns a private copy of the snapshot. Every edit goes through
//! [`apply_mutation`] and is recorded, so when the skill returns the caller
//! gets the new state, the exact mutations that produced it and the follow-up
//! events, and can fold them into the real match in one step.

use super::modifier::{DamageModifier, HealModifier};
use super::{
    broadcast_inline, DamageInfo, Event, EventAndRequest, EventArg, EventName, ReactionInfo,
    Request, SkillInfo, SwitchActiveArg,
};
use crate::damage::{reaction_bonus, reaction_effect, reaction_of, settle_health, ReactionEffect};
use crate::error::{EngineError, EngineResult};
use crate::io::expose::ExposedMutation;
use crate::mutator::MutationSink;
use crate::state::entity::{
    CardArea, CardState, Caller, CharacterState, DefinitionId, EntityArea, EntityId, VarName,
};
use crate::state::mutation::{apply_mutation, Mutation};
use crate::state::types::{Aura, DamageType, DiceType, Reaction};
use crate::state::{GameState, Who};
use either::Either;

/// Result of running one skill body.
#[derive(Debug, Clone)]
pub struct SkillOutcome {
    pub state: GameState,
    pub mutations: Vec<Mutation>,
    pub exposed: Vec<ExposedMutation>,
    pub events: Vec<EventAndRequest>,
}

impl SkillOutcome {
    pub fn unchanged(state: GameState) -> Self {
        SkillOutcome {
            state,
            mutations: vec![],
            exposed: vec![],
            events: vec![],
        }
    }

    /// Fold a later outcome into this one.
    pub fn absorb(&mut self, next: SkillOutcome) {
        self.state = next.state;
        self.mutations.extend(next.mutations);
        self.exposed.extend(next.exposed);
        self.events.extend(next.events);
    }
}

/// Characters a skill can aim at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Id(EntityId),
    MyActive,
    OppActive,
    MyStandby,
    OppStandby,
    MyAll,
    OppAll,
    /// The character that owns the caller, or the active one for board-wide callers.
    SelfCharacter,
}

pub struct SkillContext {
    state: GameState,
    info: SkillInfo,
    mutations: Vec<Mutation>,
    exposed: Vec<ExposedMutation>,
    events: Vec<EventAndRequest>,
}

impl MutationSink for SkillContext {
    fn state(&self) -> &GameState {
        &self.state
    }

    fn mutate(&mut self, mutation: Mutation) -> EngineResult<()> {
        self.state = apply_mutation(&self.state, &mutation)?;
        self.mutations.push(mutation);
        Ok(())
    }
}

impl SkillContext {
    pub fn new(state: GameState, info: SkillInfo) -> Self {
        SkillContext {
            state,
            info,
            mutations: vec![],
            exposed: vec![],
            events: vec![],
        }
    }

    pub fn finish(self) -> SkillOutcome {
        SkillOutcome {
            state: self.state,
            mutations: self.mutations,
            exposed: self.exposed,
            events: self.events,
        }
    }

    pub fn info(&self) -> &SkillInfo {
        &self.info
    }

    pub fn who(&self) -> Who {
        self.info.who
    }

    pub fn caller_id(&self) -> EntityId {
        self.info.caller_id()
    }

    pub fn emit(&mut self, name: EventName, arg: EventArg) {
        self.events.push(Either::Left(Event::new(name, arg)));
    }

    pub fn request(&mut self, request: Request) {
        self.events.push(Either::Right(request));
    }

    pub fn expose(&mut self, exposed: ExposedMutation) {
        self.exposed.push(exposed);
    }

    fn absorb(&mut self, outcome: SkillOutcome) {
        self.state = outcome.state;
        self.mutations.extend(outcome.mutations);
        self.exposed.extend(outcome.exposed);
        self.events.extend(outcome.events);
    }

    fn broadcast(&mut self, name: EventName, arg: &mut EventArg) -> EngineResult<()> {
        let outcome = broadcast_inline(&self.state, name, arg, self.info.is_preview)?;
        self.absorb(outcome);
        Ok(())
    }

    /// The character the caller belongs to.
    pub fn self_character(&self) -> Option<&CharacterState> {
        match &self.info.caller {
            Caller::Character(c) => self.state.character(c.id).map(|(_, ch)| ch),
            Caller::Entity(e) => match self.state.find_entity(e.id) {
                Some((EntityArea::Character { character_id, .. }, _)) => {
                    self.state.character(character_id).map(|(_, ch)| ch)
                }
                _ => self.state.active_character(self.info.who),
            },
            Caller::Card(_) => self.state.active_character(self.info.who),
        }
    }

    pub fn variable(&self, entity: EntityId, var: &VarName) -> Option<i64> {
        if let Some((_, ch)) = self.state.character(entity) {
            return ch.variables.get(var);
        }
        self.state
            .find_entity(entity)
            .and_then(|(_, e)| e.variables.get(var))
    }

    pub fn caller_variable(&self, var: &VarName) -> i64 {
        self.variable(self.caller_id(), var).unwrap_or(0)
    }

    pub fn set_variable(&mut self, entity: EntityId, var: VarName, value: i64) -> EngineResult<()> {
        self.mutate(Mutation::ModifyEntityVar { entity, var, value })
    }

    pub fn add_variable(&mut self, entity: EntityId, var: VarName, delta: i64) -> EngineResult<()> {
        let current = self.variable(entity, &var).unwrap_or(0);
        self.set_variable(entity, var, current + delta)
    }

    /// Alive characters matching `target`.
    pub fn resolve_target(&self, target: Target) -> Vec<(Who, EntityId)> {
        let me = self.info.who;
        let opp = me.opposite();
        let active_of = |who: Who| -> Vec<(Who, EntityId)> {
            self.state
                .active_character(who)
                .filter(|c| c.alive())
                .map(|c| vec![(who, c.id)])
                .unwrap_or_default()
        };
        let standby_of = |who: Who| -> Vec<(Who, EntityId)> {
            let player = self.state.player(who);
            player
                .characters_from_active()
                .into_iter()
                .filter(|c| c.alive() && Some(c.id) != player.active_character_id)
                .map(|c| (who, c.id))
                .collect()
        };
        let all_of = |who: Who| -> Vec<(Who, EntityId)> {
            self.state
                .player(who)
                .characters_from_active()
                .into_iter()
                .filter(|c| c.alive())
                .map(|c| (who, c.id))
                .collect()
        };
        match target {
            Target::Id(id) => self
                .state
                .character(id)
                .filter(|(_, c)| c.alive())
                .map(|(who, c)| vec![(who, c.id)])
                .unwrap_or_default(),
            Target::MyActive => active_of(me),
            Target::OppActive => active_of(opp),
            Target::MyStandby => standby_of(me),
            Target::OppStandby => standby_of(opp),
            Target::MyAll => all_of(me),
            Target::OppAll => all_of(opp),
            Target::SelfCharacter => self
                .self_character()
                .filter(|c| c.alive())
                .map(|c| vec![(me, c.id)])
                .unwrap_or_default(),
        }
    }

    /// Deal damage to every character matched by `target`.
    pub fn damage(&mut self, damage_type: DamageType, value: i64, target: Target) -> EngineResult<()> {
        for (_, id) in self.resolve_target(target) {
            self.deal_damage(damage_type, value, id, None)?;
        }
        Ok(())
    }

    fn deal_damage(
        &mut self,
        damage_type: DamageType,
        value: i64,
        target: EntityId,
        from_reaction: Option<Reaction>,
    ) -> EngineResult<()> {
        let (target_who, ch) = self
            .state
            .character(target)
            .map(|(who, c)| (who, c.clone()))
            .ok_or_else(|| EngineError::internal(format!("damage target {} does not exist", target)))?;
        if !ch.alive() {
            return Ok(());
        }
        let base = DamageInfo {
            source: self.caller_id(),
            source_who: self.info.who,
            target,
            target_who,
            damage_type,
            value,
            old_health: ch.health(),
            new_health: ch.health(),
            old_aura: ch.aura(),
            new_aura: ch.aura(),
            reaction: None,
            cause_defeat: false,
            from_reaction,
            via_skill: self.info.skill,
        };
        let mut modifier = DamageModifier::new(base);
        if !matches!(damage_type, DamageType::Physical | DamageType::Piercing) {
            modifier = self.run_damage_stage(EventName::ModifyDamage0, modifier)?;
            let (new_aura, reaction) = reaction_of(ch.aura(), modifier.damage_type());
            modifier.damage.new_aura = new_aura;
            modifier.damage.reaction = reaction;
            if let Some(r) = reaction {
                modifier.increase_damage(reaction_bonus(r));
            }
            for stage in [
                EventName::ModifyDamage1,
                EventName::ModifyDamage2,
                EventName::ModifyDamage3,
            ] {
                modifier = self.run_damage_stage(stage, modifier)?;
            }
        }

        // modifier listeners may have edited the target meanwhile
        let (health, max_health) = match self.state.character(target) {
            Some((_, c)) if c.alive() => (c.health(), c.max_health()),
            Some(_) => return Ok(()),
            None => return Err(EngineError::internal(format!("damage target {} vanished", target))),
        };
        let final_value = modifier.final_value();
        let mut info = modifier.damage;
        info.value = final_value;
        info.old_health = health;
        info.new_health = settle_health(health, max_health, final_value);
        info.cause_defeat = info.new_health == 0;

        self.mutate(Mutation::ModifyEntityVar {
            entity: target,
            var: VarName::Health,
            value: info.new_health,
        })?;
        if info.damage_type.is_elemental() && info.new_aura != info.old_aura {
            self.mutate(Mutation::ModifyEntityVar {
                entity: target,
                var: VarName::Aura,
                value: info.new_aura.to_var(),
            })?;
        }
        self.expose(ExposedMutation::from_damage(&info));
        let reaction = info.reaction;
        self.emit(EventName::OnDamageOrHeal, EventArg::Damage(info.clone()));
        if let Some(r) = reaction {
            self.expose(ExposedMutation::ElementalReaction {
                target,
                reaction: r,
            });
            self.emit(
                EventName::OnReaction,
                EventArg::Reaction(ReactionInfo {
                    target_who,
                    target,
                    reaction: r,
                    damage: Some(info.clone()),
                }),
            );
            self.apply_reaction_effect(r, target_who, target)?;
        }
        Ok(())
    }

    fn run_damage_stage(&mut self, stage: EventName, modifier: DamageModifier) -> EngineResult<DamageModifier> {
        let mut arg = EventArg::ModifyDamage(modifier);
        self.broadcast(stage, &mut arg)?;
        match arg {
            EventArg::ModifyDamage(m) => Ok(m),
            _ => Err(EngineError::internal("damage modifier replaced by another payload")),
        }
    }

    fn apply_reaction_effect(&mut self, reaction: Reaction, target_who: Who, target: EntityId) -> EngineResult<()> {
        let others: Vec<EntityId> = self
            .state
            .player(target_who)
            .characters
            .iter()
            .filter(|c| c.alive() && c.id != target)
            .map(|c| c.id)
            .collect();
        match reaction_effect(reaction) {
            ReactionEffect::None => {}
            ReactionEffect::ForceSwitchNext => {
                if self.state.player(target_who).active_character_id == Some(target) {
                    self.switch_relative(target_who, true)?;
                }
            }
            ReactionEffect::PierceOthers => {
                for id in others {
                    self.deal_damage(DamageType::Piercing, 1, id, Some(reaction))?;
                }
            }
            ReactionEffect::SpreadOthers(damage_type) => {
                for id in others {
                    self.deal_damage(damage_type, 1, id, Some(reaction))?;
                }
            }
            ReactionEffect::TargetStatus(kind) => {
                if let Some(def) = self.state.data.reaction_entity(kind) {
                    let area = EntityArea::Character {
                        who: target_who,
                        character_id: target,
                    };
                    self.create(area, def)?;
                }
            }
            ReactionEffect::AttackerCombatStatus(kind) => {
                if let Some(def) = self.state.data.reaction_entity(kind) {
                    self.create(EntityArea::CombatStatuses { who: self.info.who }, def)?;
                }
            }
            ReactionEffect::AttackerSummon(kind) => {
                if let Some(def) = self.state.data.reaction_entity(kind) {
                    self.create(EntityArea::Summons { who: self.info.who }, def)?;
                }
            }
        }
        Ok(())
    }

    /// Apply an element without dealing damage.
    pub fn apply(&mut self, element: DamageType, target: Target) -> EngineResult<()> {
        for (target_who, id) in self.resolve_target(target) {
            let aura = match self.state.character(id) {
                Some((_, c)) => c.aura(),
                None => continue,
            };
            let (new_aura, reaction) = reaction_of(aura, element);
            if new_aura != aura {
                self.set_variable(id, VarName::Aura, new_aura.to_var())?;
            }
            if let Some(r) = reaction {
                self.expose(ExposedMutation::ElementalReaction { target: id, reaction: r });
                self.emit(
                    EventName::OnReaction,
                    EventArg::Reaction(ReactionInfo {
                        target_who,
                        target: id,
                        reaction: r,
                        damage: None,
                    }),
                );
                self.apply_reaction_effect(r, target_who, id)?;
            }
        }
        Ok(())
    }

    pub fn heal(&mut self, value: i64, target: Target) -> EngineResult<()> {
        for (_, id) in self.resolve_target(target) {
            self.do_heal(value, id, false)?;
        }
        Ok(())
    }

    /// Heal a defeated character back to life. This is the only path that
    /// sets `alive` back to true.
    pub fn revive(&mut self, value: i64, character: EntityId) -> EngineResult<()> {
        self.do_heal(value, character, true)
    }

    fn do_heal(&mut self, value: i64, target: EntityId, revive: bool) -> EngineResult<()> {
        let (target_who, ch) = self
            .state
            .character(target)
            .map(|(who, c)| (who, c.clone()))
            .ok_or_else(|| EngineError::internal(format!("heal target {} does not exist", target)))?;
        if ch.alive() == revive {
            return Ok(());
        }
        let base = DamageInfo {
            source: self.caller_id(),
            source_who: self.info.who,
            target,
            target_who,
            damage_type: DamageType::Heal,
            value,
            old_health: ch.health(),
            new_health: ch.health(),
            old_aura: ch.aura(),
            new_aura: ch.aura(),
            reaction: None,
            cause_defeat: false,
            from_reaction: None,
            via_skill: self.info.skill,
        };
        let mut arg = EventArg::ModifyHeal(HealModifier::new(base));
        self.broadcast(EventName::ModifyHeal0, &mut arg)?;
        self.broadcast(EventName::ModifyHeal1, &mut arg)?;
        let modifier = match arg {
            EventArg::ModifyHeal(m) => m,
            _ => return Err(EngineError::internal("heal modifier replaced by another payload")),
        };
        if revive {
            self.set_variable(target, VarName::Alive, 1)?;
            self.emit(
                EventName::OnRevive,
                EventArg::Revive {
                    who: target_who,
                    character: target,
                },
            );
        }
        let healed = modifier.final_value().min(ch.max_health() - ch.health());
        let mut info = modifier.heal;
        info.value = healed;
        info.new_health = ch.health() + healed;
        self.set_variable(target, VarName::Health, info.new_health)?;
        self.expose(ExposedMutation::from_damage(&info));
        self.emit(EventName::OnDamageOrHeal, EventArg::Damage(info));
        Ok(())
    }

    pub fn gain_energy(&mut self, value: i64, target: Target) -> EngineResult<()> {
        for (_, id) in self.resolve_target(target) {
            self.add_variable(id, VarName::Energy, value)?;
        }
        Ok(())
    }

    /// Create (or refresh) an entity and announce it.
    pub fn create(&mut self, area: EntityArea, definition: DefinitionId) -> EngineResult<Option<EntityId>> {
        let created = self.create_entity(area, definition)?;
        if let Some(id) = created {
            self.emit(
                EventName::OnEnter,
                EventArg::Enter {
                    area,
                    entity: id,
                    definition,
                },
            );
        }
        Ok(created)
    }

    /// Attach a character status to each matched character.
    pub fn add_status(&mut self, definition: DefinitionId, target: Target) -> EngineResult<()> {
        for (who, id) in self.resolve_target(target) {
            let area = EntityArea::Character {
                who,
                character_id: id,
            };
            self.create(area, definition)?;
        }
        Ok(())
    }

    pub fn combat_status(&mut self, definition: DefinitionId, who: Who) -> EngineResult<Option<EntityId>> {
        self.create(EntityArea::CombatStatuses { who }, definition)
    }

    pub fn summon(&mut self, definition: DefinitionId) -> EngineResult<Option<EntityId>> {
        self.create(EntityArea::Summons { who: self.info.who }, definition)
    }

    pub fn create_support(&mut self, definition: DefinitionId) -> EngineResult<Option<EntityId>> {
        self.create(EntityArea::Supports { who: self.info.who }, definition)
    }

    /// Remove an entity from the board; it still hears its own disposal.
    pub fn dispose(&mut self, entity: EntityId) -> EngineResult<()> {
        let (area, state) = match self.state.find_entity(entity) {
            Some((area, e)) => (area, e.clone()),
            None => return Ok(()),
        };
        self.mutate(Mutation::RemoveEntity { entity })?;
        self.emit(EventName::OnDispose, EventArg::Dispose { area, entity: state });
        Ok(())
    }

    /// Spend usage on the caller, disposing it when its definition says so.
    pub fn consume_usage(&mut self, count: i64) -> EngineResult<()> {
        let id = self.caller_id();
        let (definition, usage) = match self.state.find_entity(id) {
            Some((_, e)) => (e.definition, e.usage()),
            None => return Ok(()),
        };
        let left = usage - count;
        self.set_variable(id, VarName::Usage, left)?;
        if left <= 0 && self.state.data.entity(definition)?.dispose_when_used_up {
            self.dispose(id)?;
        }
        Ok(())
    }

    pub fn switch_active(&mut self, who: Who, to: EntityId) -> EngineResult<()> {
        let from = self.state.player(who).active_character_id;
        if from == Some(to) {
            return Ok(());
        }
        self.mutate(Mutation::SwitchActive { who, to })?;
        self.emit(
            EventName::OnSwitchActive,
            EventArg::SwitchActive(SwitchActiveArg {
                who,
                from,
                to,
                from_action: false,
            }),
        );
        Ok(())
    }

    /// Switch to the next (or previous) alive character, if there is one.
    pub fn switch_relative(&mut self, who: Who, forward: bool) -> EngineResult<()> {
        let player = self.state.player(who);
        let len = player.characters.len();
        let start = match player.active_index() {
            Some(i) => i,
            None => return Ok(()),
        };
        let next = (1..len)
            .map(|step| {
                if forward {
                    (start + step) % len
                } else {
                    (start + len - step) % len
                }
            })
            .map(|i| &player.characters[i])
            .find(|c| c.alive())
            .map(|c| c.id);
        match next {
            Some(to) => self.switch_active(who, to),
            None => Ok(()),
        }
    }

    pub fn draw_cards(&mut self, who: Who, count: usize) -> EngineResult<()> {
        for _ in 0..count {
            if let Some(card) = self.draw_card(who)? {
                self.emit(EventName::OnHandCard, EventArg::HandCard { who, card });
            }
        }
        Ok(())
    }

    pub fn create_hand_card(&mut self, who: Who, definition: DefinitionId) -> EngineResult<Option<CardState>> {
        let card = self.create_card(who, definition, CardArea::Hands, None)?;
        if let Some(card) = card {
            self.emit(EventName::OnHandCard, EventArg::HandCard { who, card });
        }
        Ok(card)
    }

    pub fn generate_dice(&mut self, who: Who, dice: DiceType, count: usize) -> EngineResult<()> {
        let mut current = self.state.player(who).dice.clone();
        let room = self.state.config.max_dice_count.saturating_sub(current.len());
        current.extend(std::iter::repeat(dice).take(count.min(room)));
        let active = self.state.active_character(who).map(|c| c.definition);
        let element = match active {
            Some(def) => Some(self.state.data.character(def)?.element),
            None => None,
        };
        let dice = crate::dice::sort_dice(&current, element);
        self.mutate(Mutation::ResetDice { who, dice })
    }

    /// Change an entity's definition while keeping its identity.
    pub fn transform_definition(&mut self, entity: EntityId, new_definition: DefinitionId) -> EngineResult<()> {
        let old_definition = match self.state.character(entity) {
            Some((_, c)) => c.definition,
            None => match self.state.find_entity(entity) {
                Some((_, e)) => e.definition,
                None => {
                    return Err(EngineError::internal(format!(
                        "transform target {} does not exist",
                        entity
                    )))
                }
            },
        };
        self.mutate(Mutation::ReplaceDefinition {
            entity,
            new_definition,
        })?;
        self.emit(
            EventName::OnTransformDefinition,
            EventArg::TransformDefinition {
                entity,
                old_definition,
                new_definition,
            },
        );
        Ok(())
    }

    pub fn aura_of(&self, character: EntityId) -> Aura {
        self.state
            .character(character)
            .map(|(_, c)| c.aura())
            .unwrap_or_default()
    }
}

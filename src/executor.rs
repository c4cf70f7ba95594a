//! Resolution of skills and the cascades they start.
//!
//! Follow-ups are resolved through an explicit breadth-first work queue.
//! After each skill run its follow-ups are coalesced (one damage event per
//! target) and queued in three groups: plain events and requests, then
//! non-lethal damage, then lethal damage. The lethal group is settled as a
//! whole: every hit gets its immunity check and defeat first, the winner is
//! decided once, and only then are the hits broadcast. A single
//! defeated-active switch is queued behind the group.

use crate::data::TAG_DISABLE_SKILL;
use crate::detail_log::DetailLogKind;
use crate::error::{EngineError, EngineResult};
use crate::io::expose::ExposedMutation;
use crate::mutator::{MutationSink, StateMutator};
use crate::skill::modifier::ZeroHealthModifier;
use crate::skill::{
    broadcast_inline, collect_listeners, refresh_caller, DamageInfo, Event, EventAndRequest,
    EventArg, EventName, Request, SkillInfo, SkillUseArg, SwitchActiveArg,
};
use crate::state::entity::{Caller, EntityId, SkillId, VarName};
use crate::state::mutation::Mutation;
use crate::state::types::DamageType;
use crate::state::{GameState, Phase, PlayerFlag, Who};
use either::Either;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug)]
enum Task {
    Handle(EventAndRequest),
    Lethal(Vec<Event>),
    SwitchDefeated,
}

pub struct SkillExecutor<'m> {
    mutator: &'m mut StateMutator,
    queue: VecDeque<Task>,
}

/// Merge damage events aimed at the same target into one. Values add up,
/// the defeat and reaction markers are combined and the merged event keeps
/// the position of the first part. Heals and other events pass through.
/// Already-merged input comes back unchanged.
pub fn coalesce_damage_events(events: Vec<EventAndRequest>) -> Vec<EventAndRequest> {
    let mut out: Vec<EventAndRequest> = Vec::with_capacity(events.len());
    let mut by_target: HashMap<EntityId, usize> = HashMap::new();
    for item in events {
        let damage = match &item {
            Either::Left(event) if event.is_damage() => event.arg.damage().cloned(),
            _ => None,
        };
        let damage = match damage {
            Some(d) => d,
            None => {
                out.push(item);
                continue;
            }
        };
        match by_target.get(&damage.target) {
            Some(&index) => {
                if let Either::Left(Event {
                    arg: EventArg::Damage(merged),
                    ..
                }) = &mut out[index]
                {
                    merge_damage(merged, &damage);
                }
            }
            None => {
                by_target.insert(damage.target, out.len());
                out.push(item);
            }
        }
    }
    out
}

fn merge_damage(into: &mut DamageInfo, part: &DamageInfo) {
    into.value += part.value;
    into.new_health = part.new_health;
    into.new_aura = part.new_aura;
    into.cause_defeat = into.cause_defeat || part.cause_defeat;
    into.from_reaction = into.from_reaction.or(part.from_reaction);
    into.reaction = into.reaction.or(part.reaction);
}

impl<'m> SkillExecutor<'m> {
    pub fn new(mutator: &'m mut StateMutator) -> Self {
        SkillExecutor {
            mutator,
            queue: VecDeque::new(),
        }
    }

    /// Run one skill and everything it sets off. `then` is raised after the
    /// skill itself, before its follow-ups.
    pub async fn execute_skill(
        mutator: &mut StateMutator,
        info: SkillInfo,
        arg: EventArg,
        then: Option<Event>,
    ) -> EngineResult<()> {
        let mut executor = SkillExecutor::new(mutator);
        executor.run_skill(info, arg, then)?;
        executor.drain().await
    }

    /// Resolve a batch of follow-ups until nothing is left.
    pub async fn handle_events(mutator: &mut StateMutator, events: Vec<EventAndRequest>) -> EngineResult<()> {
        let mut executor = SkillExecutor::new(mutator);
        executor.enqueue(events);
        executor.drain().await
    }

    /// Broadcast an inline event against the current snapshot, letting its
    /// listeners adjust `arg`, then resolve whatever they emitted.
    pub async fn broadcast_inline(mutator: &mut StateMutator, name: EventName, arg: &mut EventArg) -> EngineResult<()> {
        let mut executor = SkillExecutor::new(mutator);
        executor.inline(name, arg)?;
        executor.drain().await
    }

    fn is_preview(&self) -> bool {
        self.mutator.is_preview()
    }

    fn inline(&mut self, name: EventName, arg: &mut EventArg) -> EngineResult<()> {
        let outcome = broadcast_inline(self.mutator.state(), name, arg, self.is_preview())?;
        let events = self.mutator.absorb(outcome);
        self.enqueue(events);
        Ok(())
    }

    fn enqueue(&mut self, events: Vec<EventAndRequest>) {
        let mut plain = vec![];
        let mut safe = vec![];
        let mut lethal = vec![];
        for item in coalesce_damage_events(events) {
            match item {
                Either::Left(event) if event.is_lethal() => lethal.push(event),
                Either::Left(event) if event.is_damage() => safe.push(Either::Left(event)),
                other => plain.push(other),
            }
        }
        self.queue.extend(plain.into_iter().map(Task::Handle));
        self.queue.extend(safe.into_iter().map(Task::Handle));
        if !lethal.is_empty() {
            self.queue.push_back(Task::Lethal(lethal));
            self.queue.push_back(Task::SwitchDefeated);
        }
    }

    async fn drain(&mut self) -> EngineResult<()> {
        while let Some(task) = self.queue.pop_front() {
            if self.mutator.frozen() {
                self.queue.clear();
                break;
            }
            match task {
                Task::Handle(Either::Left(event)) => self.handle_event(event)?,
                Task::Handle(Either::Right(request)) => self.handle_request(request).await?,
                Task::Lethal(events) => self.settle_lethal(events)?,
                Task::SwitchDefeated => self.switch_defeated().await?,
            }
        }
        Ok(())
    }

    /// Run a skill against the current snapshot and fold in its result.
    fn run_skill(&mut self, info: SkillInfo, mut arg: EventArg, then: Option<Event>) -> EngineResult<()> {
        let state = self.mutator.state().clone();
        let skill = Arc::clone(state.data.skill(info.skill)?);
        let _scope = self.mutator.detail().begin_scope(
            DetailLogKind::Skill,
            format!("{:?} {} runs skill {}", info.who, info.caller_id(), info.skill),
        );
        let outcome = skill.run(&state, &info, &mut arg)?;
        let mut events = self.mutator.absorb(outcome);

        if let (Some(initiative), Caller::Character(_)) = (&skill.initiative, &info.caller) {
            // the round log stays keyed by the definition the caller had when
            // the skill began, even if the skill transformed it
            self.mutator.mutate(Mutation::PushRoundSkillLog {
                who: info.who,
                caller_definition: info.original_definition(),
                skill: info.skill,
            })?;
            if initiative.gain_energy {
                self.gain_skill_energy(info.caller_id())?;
            }
        }
        if let Some(then) = then {
            events.insert(0, Either::Left(then));
        }
        self.enqueue(events);
        self.mutator.notify();
        Ok(())
    }

    fn gain_skill_energy(&mut self, character: EntityId) -> EngineResult<()> {
        let energy = match self.mutator.state().character(character) {
            Some((_, c)) if c.alive() && c.energy() < c.max_energy() => c.energy(),
            _ => return Ok(()),
        };
        self.mutator.mutate(Mutation::ModifyEntityVar {
            entity: character,
            var: VarName::Energy,
            value: energy + 1,
        })
    }

    fn handle_event(&mut self, event: Event) -> EngineResult<()> {
        let listeners = collect_listeners(self.mutator.state(), event.name, &event.arg)?;
        if listeners.is_empty() {
            return Ok(());
        }
        let _scope = self
            .mutator
            .detail()
            .begin_scope(DetailLogKind::Event, format!("{:?}", event.name));
        let disposed = match &event.arg {
            EventArg::Dispose { entity, .. } => Some(entity.id),
            _ => None,
        };
        for listener in listeners {
            let caller = match refresh_caller(self.mutator.state(), &listener.caller) {
                Some(caller) => caller,
                None if disposed == Some(listener.caller.id()) => listener.caller.clone(),
                None => continue,
            };
            let info = SkillInfo::new(listener.who, caller, listener.skill.id).preview(self.is_preview());
            if !listener.skill.passes(self.mutator.state(), &info, &event.arg) {
                continue;
            }
            self.mutator.expose(ExposedMutation::TriggeredSkill {
                who: info.who,
                caller: info.caller_id(),
                skill: info.skill,
            });
            self.run_skill(info, event.arg.clone(), None)?;
            if self.mutator.frozen() {
                break;
            }
        }
        Ok(())
    }

    async fn handle_request(&mut self, request: Request) -> EngineResult<()> {
        if self.is_preview() {
            log::trace!("preview skips request {:?}", request);
            return Ok(());
        }
        self.mutator
            .detail()
            .log(DetailLogKind::Request, format!("{:?}", request));
        match request {
            Request::Reroll { who, times } => self.mutator.reroll(who, times).await,
            Request::SwitchHands { who } => self.mutator.switch_hands_both(vec![who]).await,
            Request::SelectCard { who, candidates } => {
                if let Some(card) = self.mutator.select_card(who, candidates).await? {
                    self.queue.push_back(Task::Handle(Either::Left(Event::new(
                        EventName::OnHandCard,
                        EventArg::HandCard { who, card },
                    ))));
                }
                Ok(())
            }
            Request::UseSkill {
                who,
                skill,
                requested_by,
            } => self.use_requested_skill(who, skill, requested_by),
            Request::TriggerEndPhaseSkill { who, entity } => self.trigger_end_phase_skill(who, entity),
        }
    }

    fn use_requested_skill(&mut self, who: Who, skill: SkillId, requested_by: Box<SkillInfo>) -> EngineResult<()> {
        let state = self.mutator.state();
        let active = match state.active_character(who) {
            Some(c) if c.alive() => c.clone(),
            _ => return Ok(()),
        };
        if skill_disabled(state, active.id)? {
            log::debug!("{:?} cannot use requested skill {}: skills disabled", who, skill);
            return Ok(());
        }
        let kind = state.data.skill(skill)?.initiative.as_ref().map(|i| i.kind);
        let flags = state.player(who).flags;
        let mut info = SkillInfo::new(who, Caller::Character(active.clone()), skill);
        info.request_by = Some(requested_by);
        info.charged = flags.can_charged;
        info.plunging = flags.can_plunging;
        let then = Event::new(
            EventName::OnSkill,
            EventArg::Skill(SkillUseArg {
                who,
                caller: active.id,
                skill,
                kind,
            }),
        );
        self.run_skill(info, EventArg::None, Some(then))
    }

    fn trigger_end_phase_skill(&mut self, who: Who, entity: EntityId) -> EngineResult<()> {
        let state = self.mutator.state();
        let entity = match state.find_entity(entity) {
            Some((_, e)) => e.clone(),
            None => return Ok(()),
        };
        let skills: Vec<_> = state
            .data
            .skills_of_entity(entity.definition)?
            .into_iter()
            .filter_map(|id| state.data.skill(id).ok())
            .filter(|s| s.trigger_on == Some(EventName::OnEndPhase))
            .map(|s| s.id)
            .collect();
        for skill in skills {
            let info = SkillInfo::new(who, Caller::Entity(entity.clone()), skill);
            self.run_skill(info, EventArg::Player { who }, None)?;
        }
        Ok(())
    }

    /// Settle a group of killing blows: zero-health modifiers may save each
    /// character, the rest are defeated, and the match result is decided once
    /// all of them are down. The damage is broadcast afterwards.
    fn settle_lethal(&mut self, events: Vec<Event>) -> EngineResult<()> {
        let mut settled = Vec::with_capacity(events.len());
        for mut event in events {
            let damage = match &event.arg {
                EventArg::Damage(d) => d.clone(),
                _ => return Err(EngineError::internal("lethal task without damage payload")),
            };
            let still_lethal = matches!(
                self.mutator.state().character(damage.target),
                Some((_, c)) if c.alive() && c.health() == 0
            );
            if still_lethal {
                let mut arg = EventArg::ZeroHealth(ZeroHealthModifier::new(damage.clone()));
                self.inline(EventName::ModifyZeroHealth, &mut arg)?;
                let immune = match &arg {
                    EventArg::ZeroHealth(z) => z.immune_health,
                    _ => None,
                };
                match immune {
                    Some(health) => {
                        self.save_from_defeat(&damage, health)?;
                        if let EventArg::Damage(d) = &mut event.arg {
                            d.cause_defeat = false;
                        }
                    }
                    None => self.defeat(damage.target_who, damage.target)?,
                }
            }
            settled.push(event);
        }
        if self.check_side_failure()? {
            return Ok(());
        }
        for event in settled {
            if self.mutator.frozen() {
                break;
            }
            self.handle_event(event)?;
        }
        Ok(())
    }

    fn save_from_defeat(&mut self, damage: &DamageInfo, health: i64) -> EngineResult<()> {
        self.mutator.mutate(Mutation::ModifyEntityVar {
            entity: damage.target,
            var: VarName::Health,
            value: health,
        })?;
        let new_health = self
            .mutator
            .state()
            .character(damage.target)
            .map(|(_, c)| c.health())
            .unwrap_or(health);
        let heal = DamageInfo {
            source: damage.target,
            source_who: damage.target_who,
            damage_type: DamageType::Heal,
            value: new_health,
            old_health: 0,
            new_health,
            reaction: None,
            cause_defeat: false,
            from_reaction: None,
            old_aura: damage.new_aura,
            ..damage.clone()
        };
        self.mutator.expose(ExposedMutation::from_damage(&heal));
        self.queue.push_back(Task::Handle(Either::Left(Event::new(
            EventName::OnDamageOrHeal,
            EventArg::Damage(heal),
        ))));
        Ok(())
    }

    fn defeat(&mut self, who: Who, character: EntityId) -> EngineResult<()> {
        self.mutator
            .detail()
            .log(DetailLogKind::Other, format!("{:?} character {} defeated", who, character));
        self.mutator.mutate(Mutation::ModifyEntityVar {
            entity: character,
            var: VarName::Alive,
            value: 0,
        })?;
        self.mutator.mutate(Mutation::SetPlayerFlag {
            who,
            flag: PlayerFlag::HasDefeated,
            value: true,
        })
    }

    /// End the match when a side has no character left standing. Both sides
    /// out at once is a draw.
    fn check_side_failure(&mut self) -> EngineResult<bool> {
        let (first_out, second_out) = {
            let state = self.mutator.state();
            let out = |w: Who| state.player(w).alive_characters().next().is_none();
            (out(Who::First), out(Who::Second))
        };
        let winner = match (first_out, second_out) {
            (false, false) => return Ok(false),
            (true, true) => None,
            (true, false) => Some(Who::Second),
            (false, true) => Some(Who::First),
        };
        log::info!("side failure, winner {:?}", winner);
        self.mutator.mutate(Mutation::SetWinner { winner })?;
        self.mutator.mutate(Mutation::ChangePhase {
            new_phase: Phase::GameEnd,
        })?;
        self.queue.clear();
        Ok(true)
    }

    /// Sides whose active character fell choose a replacement, acting side
    /// first; both are asked at once.
    async fn switch_defeated(&mut self) -> EngineResult<()> {
        if self.is_preview() {
            return Ok(());
        }
        let state = self.mutator.state();
        let order = [state.current_turn, state.current_turn.opposite()];
        let mut requests = vec![];
        for who in order {
            let player = state.player(who);
            if player.active_character().map_or(true, |c| c.alive()) {
                continue;
            }
            let candidates: Vec<EntityId> = player.alive_characters().map(|c| c.id).collect();
            if !candidates.is_empty() {
                requests.push((who, candidates));
            }
        }
        if requests.is_empty() {
            return Ok(());
        }
        for (who, _) in &requests {
            self.mutator
                .expose(ExposedMutation::OppChoosingActive { who: *who });
        }
        let chosen = self.mutator.choose_active_both(requests).await?;
        for (who, to) in chosen {
            let from = self.mutator.state().player(who).active_character_id;
            self.mutator.mutate(Mutation::SwitchActive { who, to })?;
            self.queue.push_back(Task::Handle(Either::Left(Event::new(
                EventName::OnSwitchActive,
                EventArg::SwitchActive(SwitchActiveArg {
                    who,
                    from,
                    to,
                    from_action: false,
                }),
            ))));
        }
        self.mutator.notify();
        Ok(())
    }
}

/// Whether a character carries a status that blocks skill use.
pub fn skill_disabled(state: &GameState, character: EntityId) -> EngineResult<bool> {
    let character = match state.character(character) {
        Some((_, c)) => c,
        None => return Ok(false),
    };
    for status in &character.entities {
        if state.data.entity(status.definition)?.has_tag(TAG_DISABLE_SKILL) {
            return Ok(true);
        }
    }
    Ok(false)
}

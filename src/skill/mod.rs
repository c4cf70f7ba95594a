//! Events, requests and the descriptors threaded through skill execution.
//!
//! Events describe something that happened and are broadcast to every
//! listening entity on the board. Requests ask for something to be done
//! (a reroll, a nested skill) and are performed by the executor.

pub mod context;
pub mod modifier;

use crate::data::definition::{SkillDefinition, SkillKind};
use crate::error::EngineResult;
use crate::game::actions::ActionInfo;
use crate::state::entity::{
    CardState, Caller, DefinitionId, EntityArea, EntityId, EntityState, SkillId,
};
use crate::state::types::{Aura, DamageType, Reaction};
use crate::state::{GameState, Who};
use context::SkillOutcome;
use either::Either;
use modifier::{
    ActionModifier, DamageModifier, HealModifier, ReplaceActionModifier, RollModifier,
    ZeroHealthModifier,
};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum EventName {
    OnBattleBegin,
    OnActionPhase,
    OnEndPhase,
    OnRoundEnd,
    OnBeforeAction,
    OnAction,
    OnSkill,
    OnPlayCard,
    OnSwitchActive,
    OnDamageOrHeal,
    OnReaction,
    OnEnter,
    OnDispose,
    OnRevive,
    OnHandCard,
    OnTransformDefinition,
    ModifyRoll,
    ReplaceAction,
    ModifyAction0,
    ModifyAction1,
    ModifyAction2,
    ModifyAction3,
    ModifyDamage0,
    ModifyDamage1,
    ModifyDamage2,
    ModifyDamage3,
    ModifyHeal0,
    ModifyHeal1,
    ModifyZeroHealth,
}

impl EventName {
    /// Inline events are resolved synchronously inside the operation that
    /// raised them; their listeners adjust the argument in place.
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            EventName::ModifyRoll
                | EventName::ReplaceAction
                | EventName::ModifyAction0
                | EventName::ModifyAction1
                | EventName::ModifyAction2
                | EventName::ModifyAction3
                | EventName::ModifyDamage0
                | EventName::ModifyDamage1
                | EventName::ModifyDamage2
                | EventName::ModifyDamage3
                | EventName::ModifyHeal0
                | EventName::ModifyHeal1
                | EventName::ModifyZeroHealth
        )
    }
}

/// One settled damage or heal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageInfo {
    pub source: EntityId,
    pub source_who: Who,
    pub target: EntityId,
    pub target_who: Who,
    pub damage_type: DamageType,
    pub value: i64,
    pub old_health: i64,
    pub new_health: i64,
    pub old_aura: Aura,
    pub new_aura: Aura,
    pub reaction: Option<Reaction>,
    pub cause_defeat: bool,
    /// Set when this damage is itself the after-effect of a reaction.
    pub from_reaction: Option<Reaction>,
    pub via_skill: SkillId,
}

impl DamageInfo {
    pub fn is_heal(&self) -> bool {
        self.damage_type == DamageType::Heal
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillUseArg {
    pub who: Who,
    pub caller: EntityId,
    pub skill: SkillId,
    pub kind: Option<SkillKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchActiveArg {
    pub who: Who,
    pub from: Option<EntityId>,
    pub to: EntityId,
    pub from_action: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionInfo {
    pub target_who: Who,
    pub target: EntityId,
    pub reaction: Reaction,
    pub damage: Option<DamageInfo>,
}

#[derive(Debug, Clone)]
pub enum EventArg {
    None,
    Player { who: Who },
    Action { who: Who, action: Box<ActionInfo> },
    Skill(SkillUseArg),
    PlayCard {
        who: Who,
        card: CardState,
        targets: Vec<EntityId>,
    },
    SwitchActive(SwitchActiveArg),
    Damage(DamageInfo),
    Reaction(ReactionInfo),
    Enter {
        area: EntityArea,
        entity: EntityId,
        definition: DefinitionId,
    },
    Dispose {
        area: EntityArea,
        entity: EntityState,
    },
    Revive { who: Who, character: EntityId },
    HandCard { who: Who, card: CardState },
    TransformDefinition {
        entity: EntityId,
        old_definition: DefinitionId,
        new_definition: DefinitionId,
    },
    ModifyRoll(RollModifier),
    ReplaceAction(ReplaceActionModifier),
    ModifyAction(Box<ActionModifier>),
    ModifyDamage(DamageModifier),
    ModifyHeal(HealModifier),
    ZeroHealth(ZeroHealthModifier),
}

impl EventArg {
    pub fn damage(&self) -> Option<&DamageInfo> {
        match self {
            EventArg::Damage(d) => Some(d),
            EventArg::ModifyDamage(m) => Some(&m.damage),
            EventArg::ZeroHealth(z) => Some(&z.damage),
            EventArg::ModifyHeal(h) => Some(&h.heal),
            _ => None,
        }
    }

    /// The side an event concerns, when it concerns one.
    pub fn who(&self) -> Option<Who> {
        match self {
            EventArg::Player { who }
            | EventArg::Action { who, .. }
            | EventArg::PlayCard { who, .. }
            | EventArg::Revive { who, .. }
            | EventArg::HandCard { who, .. } => Some(*who),
            EventArg::Skill(s) => Some(s.who),
            EventArg::SwitchActive(s) => Some(s.who),
            EventArg::Damage(d) => Some(d.target_who),
            EventArg::Reaction(r) => Some(r.target_who),
            EventArg::Enter { area, .. } | EventArg::Dispose { area, .. } => Some(area.who()),
            EventArg::ModifyRoll(r) => Some(r.who),
            EventArg::ReplaceAction(r) => Some(r.who),
            EventArg::ModifyAction(a) => Some(a.action.who),
            EventArg::ModifyDamage(m) => Some(m.damage.target_who),
            EventArg::ModifyHeal(h) => Some(h.heal.target_who),
            EventArg::ZeroHealth(z) => Some(z.damage.target_who),
            EventArg::None | EventArg::TransformDefinition { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub name: EventName,
    pub arg: EventArg,
}

impl Event {
    pub fn new(name: EventName, arg: EventArg) -> Self {
        Event { name, arg }
    }

    pub fn is_damage(&self) -> bool {
        self.name == EventName::OnDamageOrHeal
            && matches!(&self.arg, EventArg::Damage(d) if !d.is_heal())
    }

    pub fn is_lethal(&self) -> bool {
        matches!(&self.arg, EventArg::Damage(d) if !d.is_heal() && d.cause_defeat)
    }
}

#[derive(Debug, Clone)]
pub enum Request {
    Reroll {
        who: Who,
        times: u32,
    },
    SwitchHands {
        who: Who,
    },
    SelectCard {
        who: Who,
        candidates: Vec<DefinitionId>,
    },
    UseSkill {
        who: Who,
        skill: SkillId,
        requested_by: Box<SkillInfo>,
    },
    TriggerEndPhaseSkill {
        who: Who,
        entity: EntityId,
    },
}

pub type EventAndRequest = Either<Event, Request>;

/// Descriptor of one skill invocation. Never stored in the game state.
#[derive(Debug, Clone)]
pub struct SkillInfo {
    pub who: Who,
    /// The caller as it was when the invocation started.
    pub caller: Caller,
    pub skill: SkillId,
    pub from_card: Option<CardState>,
    pub request_by: Option<Box<SkillInfo>>,
    pub charged: bool,
    pub plunging: bool,
    pub is_preview: bool,
}

impl SkillInfo {
    pub fn new(who: Who, caller: Caller, skill: SkillId) -> Self {
        let from_card = match &caller {
            Caller::Card(card) => Some(*card),
            _ => None,
        };
        SkillInfo {
            who,
            caller,
            skill,
            from_card,
            request_by: None,
            charged: false,
            plunging: false,
            is_preview: false,
        }
    }

    pub fn preview(mut self, is_preview: bool) -> Self {
        self.is_preview = is_preview;
        self
    }

    /// Definition the caller had when the skill started. Transformations
    /// performed by the skill itself do not change it.
    pub fn original_definition(&self) -> DefinitionId {
        self.caller.definition()
    }

    pub fn caller_id(&self) -> EntityId {
        self.caller.id()
    }
}

/// A triggered skill ready to run.
#[derive(Debug, Clone)]
pub struct Listener {
    pub who: Who,
    pub caller: Caller,
    pub skill: Arc<SkillDefinition>,
}

fn listening_skills(
    state: &GameState,
    caller: &Caller,
    name: EventName,
) -> EngineResult<Vec<Arc<SkillDefinition>>> {
    let ids = match caller {
        Caller::Character(c) => state.data.skills_of_character(c.definition)?,
        Caller::Entity(e) => state.data.skills_of_entity(e.definition)?,
        Caller::Card(_) => vec![],
    };
    let mut out = Vec::new();
    for id in ids {
        let skill = state.data.skill(id)?;
        if skill.trigger_on == Some(name) {
            out.push(Arc::clone(skill));
        }
    }
    Ok(out)
}

/// Every skill on the board that listens for `name`, in board order. A
/// disposal event also reaches the disposed entity itself.
pub fn collect_listeners(
    state: &GameState,
    name: EventName,
    arg: &EventArg,
) -> EngineResult<Vec<Listener>> {
    let mut callers = state.board_order();
    if let EventArg::Dispose { area, entity } = arg {
        if !state.contains(entity.id) {
            callers.push((area.who(), Caller::Entity(entity.clone())));
        }
    }
    let mut out = Vec::new();
    for (who, caller) in callers {
        for skill in listening_skills(state, &caller, name)? {
            out.push(Listener {
                who,
                caller: caller.clone(),
                skill,
            });
        }
    }
    Ok(out)
}

/// Re-read a caller from the current snapshot. `None` when it has left the board.
pub fn refresh_caller(state: &GameState, caller: &Caller) -> Option<Caller> {
    match caller {
        Caller::Character(c) => state
            .character(c.id)
            .map(|(_, ch)| Caller::Character(ch.clone())),
        Caller::Entity(e) => state
            .find_entity(e.id)
            .map(|(_, ent)| Caller::Entity(ent.clone())),
        Caller::Card(c) => Some(Caller::Card(*c)),
    }
}

/// Resolve an inline event: run every matching listener in board order
/// against the evolving snapshot, letting each one adjust `arg`.
pub fn broadcast_inline(
    state: &GameState,
    name: EventName,
    arg: &mut EventArg,
    is_preview: bool,
) -> EngineResult<SkillOutcome> {
    let listeners = collect_listeners(state, name, arg)?;
    let mut outcome = SkillOutcome::unchanged(state.clone());
    for listener in listeners {
        let caller = match refresh_caller(&outcome.state, &listener.caller) {
            Some(c) => c,
            None => continue,
        };
        let info = SkillInfo::new(listener.who, caller, listener.skill.id).preview(is_preview);
        if !listener.skill.passes(&outcome.state, &info, arg) {
            continue;
        }
        let next = listener.skill.run(&outcome.state, &info, arg)?;
        outcome.absorb(next);
    }
    Ok(outcome)
}

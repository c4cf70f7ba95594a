//! Player actions: enumeration, cost modification and execution.

use crate::config::PlayerConfig;
use crate::data::definition::{CardKind, CardTarget};
use crate::data::{TAG_LEGEND, TAG_NO_TUNING};
use crate::dice::{energy_cost, sort_dice, subtract};
use crate::error::{EngineError, EngineResult};
use crate::executor::{skill_disabled, SkillExecutor};
use crate::mutator::{MutationSink, StateMutator};
use crate::skill::modifier::ActionModifier;
use crate::skill::{Event, EventArg, EventName, SkillInfo, SkillUseArg, SwitchActiveArg};
use crate::state::entity::{CardArea, CardState, Caller, EntityArea, EntityId, SkillId, VarName};
use crate::state::mutation::{Mutation, RemoveCardReason};
use crate::state::types::DiceType;
use crate::state::{GameState, PlayerFlag, Who};
use either::Either;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    UseSkill { skill: SkillId, caller: EntityId },
    /// For a support card played onto a full zone, the last target is the
    /// support it replaces.
    PlayCard { card: CardState, targets: Vec<EntityId> },
    SwitchActive { from: Option<EntityId>, to: EntityId },
    ElementalTuning { card: EntityId, result: DiceType },
    DeclareEnd,
}

#[derive(Debug, Clone)]
pub struct ActionInfo {
    pub who: Who,
    pub kind: ActionKind,
    pub cost: Vec<DiceType>,
    pub fast: bool,
    pub auto_selected_dice: Vec<DiceType>,
    /// Redacted forecast of the state after this action.
    pub preview: Option<Box<GameState>>,
}

impl ActionInfo {
    pub fn new(who: Who, kind: ActionKind, cost: Vec<DiceType>, fast: bool) -> Self {
        ActionInfo {
            who,
            kind,
            cost,
            fast,
            auto_selected_dice: vec![],
            preview: None,
        }
    }

    /// Tuning and declaring end are never adjusted by modifiers.
    pub fn modifiable(&self) -> bool {
        !matches!(
            self.kind,
            ActionKind::ElementalTuning { .. } | ActionKind::DeclareEnd
        )
    }
}

/// Active character's element, when there is an active character.
pub fn active_element(state: &GameState, who: Who) -> EngineResult<Option<DiceType>> {
    match state.active_character(who) {
        Some(c) => Ok(Some(state.data.character(c.definition)?.element)),
        None => Ok(None),
    }
}

/// Whether a die may be turned into the active element.
pub fn tunable(dice: DiceType, active: Option<DiceType>, config: PlayerConfig) -> bool {
    config.allow_tuning_any_dice || (dice != DiceType::Omni && Some(dice) != active)
}

/// Every action `who` may take before cost modifiers run.
pub fn available_actions(state: &GameState, who: Who, config: PlayerConfig) -> EngineResult<Vec<ActionInfo>> {
    let player = state.player(who);
    let mut out = vec![];
    let active = state.active_character(who).filter(|c| c.alive());

    if let Some(active) = active {
        if !skill_disabled(state, active.id)? {
            let def = state.data.character(active.definition)?;
            for skill_id in &def.initiative_skills {
                let skill = state.data.skill(*skill_id)?;
                let cost = match &skill.initiative {
                    Some(init) => init.cost.clone(),
                    None => continue,
                };
                if energy_cost(&cost) > active.energy() {
                    continue;
                }
                out.push(ActionInfo::new(
                    who,
                    ActionKind::UseSkill {
                        skill: *skill_id,
                        caller: active.id,
                    },
                    cost,
                    false,
                ));
            }
        }
    }

    for card in &player.hands {
        let def = state.data.card(card.definition)?;
        if def.has_tag(TAG_LEGEND) && player.flags.legend_used {
            continue;
        }
        let energy = active.map_or(0, |c| c.energy());
        if energy_cost(&def.cost) > energy {
            continue;
        }
        for targets in card_targets(state, who, def.target) {
            if !def.playable(state, who, &targets) {
                continue;
            }
            let supports_full = player.supports.len() >= state.config.max_supports_count;
            if def.kind == CardKind::Support && supports_full {
                for support in &player.supports {
                    let mut with_replaced = targets.clone();
                    with_replaced.push(support.id);
                    out.push(ActionInfo::new(
                        who,
                        ActionKind::PlayCard {
                            card: *card,
                            targets: with_replaced,
                        },
                        def.cost.clone(),
                        true,
                    ));
                }
            } else {
                out.push(ActionInfo::new(
                    who,
                    ActionKind::PlayCard {
                        card: *card,
                        targets,
                    },
                    def.cost.clone(),
                    true,
                ));
            }
        }
    }

    let active_id = player.active_character_id;
    for ch in player.alive_characters() {
        if Some(ch.id) == active_id {
            continue;
        }
        out.push(ActionInfo::new(
            who,
            ActionKind::SwitchActive {
                from: active_id,
                to: ch.id,
            },
            vec![DiceType::Void],
            false,
        ));
    }

    if let Some(element) = active_element(state, who)? {
        let tuning_die = player
            .dice
            .iter()
            .rev()
            .find(|d| tunable(**d, Some(element), config))
            .copied();
        if let Some(die) = tuning_die {
            for card in &player.hands {
                if state.data.card(card.definition)?.has_tag(TAG_NO_TUNING) {
                    continue;
                }
                let mut action = ActionInfo::new(
                    who,
                    ActionKind::ElementalTuning {
                        card: card.id,
                        result: element,
                    },
                    vec![DiceType::Void],
                    true,
                );
                action.auto_selected_dice = vec![die];
                out.push(action);
            }
        }
    }

    out.push(ActionInfo::new(who, ActionKind::DeclareEnd, vec![], false));
    Ok(out)
}

fn card_targets(state: &GameState, who: Who, target: CardTarget) -> Vec<Vec<EntityId>> {
    let alive = |w: Who| -> Vec<Vec<EntityId>> {
        state
            .player(w)
            .characters_from_active()
            .into_iter()
            .filter(|c| c.alive())
            .map(|c| vec![c.id])
            .collect()
    };
    match target {
        CardTarget::None => vec![vec![]],
        CardTarget::MyCharacter => alive(who),
        CardTarget::OppCharacter => alive(who.opposite()),
        CardTarget::MySummon => state
            .player(who)
            .summons
            .iter()
            .map(|s| vec![s.id])
            .collect(),
    }
}

/// Pass an action through the `modifyAction` stages. Stops early once a
/// modifier cancels it.
pub async fn run_action_modifiers(mutator: &mut StateMutator, action: ActionInfo) -> EngineResult<ActionModifier> {
    let mut arg = EventArg::ModifyAction(Box::new(ActionModifier::new(action)));
    let modifiable = match &arg {
        EventArg::ModifyAction(m) => m.action.modifiable(),
        _ => false,
    };
    if modifiable {
        for stage in [
            EventName::ModifyAction0,
            EventName::ModifyAction1,
            EventName::ModifyAction2,
            EventName::ModifyAction3,
        ] {
            SkillExecutor::broadcast_inline(mutator, stage, &mut arg).await?;
            if let EventArg::ModifyAction(m) = &arg {
                if !m.completed {
                    break;
                }
            }
        }
    }
    match arg {
        EventArg::ModifyAction(m) => Ok(*m),
        _ => Err(EngineError::internal("action modifier replaced by another payload")),
    }
}

/// Pay for and carry out an action, then raise `onAction`. Turn switching
/// is left to the phase loop.
pub async fn perform_action(mutator: &mut StateMutator, action: &ActionInfo, used_dice: &[DiceType]) -> EngineResult<()> {
    let who = action.who;
    if !used_dice.is_empty() {
        let dice = subtract(&mutator.state().player(who).dice, used_dice);
        mutator.mutate(Mutation::ResetDice { who, dice })?;
    }
    let energy = energy_cost(&action.cost);
    if energy > 0 {
        let (id, current) = mutator
            .state()
            .active_character(who)
            .map(|c| (c.id, c.energy()))
            .ok_or_else(|| EngineError::internal("energy cost without an active character"))?;
        mutator.mutate(Mutation::ModifyEntityVar {
            entity: id,
            var: VarName::Energy,
            value: current - energy,
        })?;
    }

    match &action.kind {
        ActionKind::UseSkill { skill, caller } => use_skill(mutator, who, *skill, *caller).await?,
        ActionKind::PlayCard { card, targets } => play_card(mutator, who, *card, targets).await?,
        ActionKind::SwitchActive { from, to } => {
            mutator.mutate(Mutation::SwitchActive { who, to: *to })?;
            let event = Event::new(
                EventName::OnSwitchActive,
                EventArg::SwitchActive(SwitchActiveArg {
                    who,
                    from: *from,
                    to: *to,
                    from_action: true,
                }),
            );
            SkillExecutor::handle_events(mutator, vec![Either::Left(event)]).await?;
        }
        ActionKind::ElementalTuning { card, result } => {
            mutator.mutate(Mutation::RemoveCard {
                who,
                area: CardArea::Hands,
                card: *card,
                reason: RemoveCardReason::ElementalTuning,
            })?;
            let mut dice = mutator.state().player(who).dice.clone();
            dice.push(*result);
            let dice = sort_dice(&dice, Some(*result));
            mutator.mutate(Mutation::ResetDice { who, dice })?;
        }
        ActionKind::DeclareEnd => {
            mutator.mutate(Mutation::SetPlayerFlag {
                who,
                flag: PlayerFlag::DeclaredEnd,
                value: true,
            })?;
        }
    }

    let plunging = matches!(action.kind, ActionKind::SwitchActive { .. });
    if mutator.state().player(who).flags.can_plunging != plunging {
        mutator.mutate(Mutation::SetPlayerFlag {
            who,
            flag: PlayerFlag::CanPlunging,
            value: plunging,
        })?;
    }
    let event = Event::new(
        EventName::OnAction,
        EventArg::Action {
            who,
            action: Box::new(action.clone()),
        },
    );
    SkillExecutor::handle_events(mutator, vec![Either::Left(event)]).await
}

async fn use_skill(mutator: &mut StateMutator, who: Who, skill: SkillId, caller: EntityId) -> EngineResult<()> {
    let state = mutator.state();
    let character = state
        .character(caller)
        .map(|(_, c)| c.clone())
        .ok_or_else(|| EngineError::internal(format!("skill caller {} does not exist", caller)))?;
    let kind = state.data.skill(skill)?.initiative.as_ref().map(|i| i.kind);
    let flags = state.player(who).flags;
    let mut info = SkillInfo::new(who, Caller::Character(character), skill).preview(mutator.is_preview());
    info.charged = flags.can_charged;
    info.plunging = flags.can_plunging;
    let then = Event::new(
        EventName::OnSkill,
        EventArg::Skill(SkillUseArg {
            who,
            caller,
            skill,
            kind,
        }),
    );
    SkillExecutor::execute_skill(mutator, info, EventArg::None, Some(then)).await
}

async fn play_card(mutator: &mut StateMutator, who: Who, card: CardState, targets: &[EntityId]) -> EngineResult<()> {
    let def = Arc::clone(mutator.state().data.card(card.definition)?);
    mutator.mutate(Mutation::RemoveCard {
        who,
        area: CardArea::Hands,
        card: card.id,
        reason: RemoveCardReason::Play,
    })?;
    if def.has_tag(TAG_LEGEND) {
        mutator.mutate(Mutation::SetPlayerFlag {
            who,
            flag: PlayerFlag::LegendUsed,
            value: true,
        })?;
    }
    let mut targets = targets.to_vec();
    let state = mutator.state();
    if def.kind == CardKind::Support && state.player(who).supports.len() >= state.config.max_supports_count {
        let replaced = targets
            .pop()
            .ok_or_else(|| EngineError::io(who, "a full support zone needs a support to replace"))?;
        let (area, entity) = match state.find_entity(replaced) {
            Some((area @ EntityArea::Supports { .. }, e)) if area.who() == who => (area, e.clone()),
            _ => return Err(EngineError::io(who, format!("{} is not a support to replace", replaced))),
        };
        mutator.mutate(Mutation::RemoveEntity { entity: replaced })?;
        let event = Event::new(EventName::OnDispose, EventArg::Dispose { area, entity });
        SkillExecutor::handle_events(mutator, vec![Either::Left(event)]).await?;
    }
    let arg = EventArg::PlayCard {
        who,
        card,
        targets: targets.clone(),
    };
    let info = SkillInfo::new(who, Caller::Card(card), def.skill).preview(mutator.is_preview());
    let then = Event::new(EventName::OnPlayCard, arg.clone());
    SkillExecutor::execute_skill(mutator, info, arg, Some(then)).await
}

//! Per-viewer views of the state and of the mutation feed.
//!
//! Everything here is what leaves the engine: a viewer sees its own hand,
//! never the other side's hand or dice, and nobody sees pile contents or
//! order. Hidden cards keep a placeholder definition.

use crate::data::HIDDEN_CARD;
use crate::game::actions::{ActionInfo, ActionKind};
use crate::mutator::PendingItem;
use crate::skill::DamageInfo;
use crate::state::entity::{
    CardArea, CardState, CharacterState, DefinitionId, EntityArea, EntityId, EntityState, SkillId,
};
use crate::state::mutation::{Mutation, RemoveCardReason};
use crate::state::types::{DamageType, DiceType, Reaction};
use crate::state::{GameState, Phase, PlayerState, Who};
use either::Either;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ExposedCard {
    pub id: EntityId,
    pub definition_id: DefinitionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ExposedEntity {
    pub id: EntityId,
    pub definition_id: DefinitionId,
    pub variables: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ExposedCharacter {
    pub id: EntityId,
    pub definition_id: DefinitionId,
    pub variables: BTreeMap<String, i64>,
    pub entities: Vec<ExposedEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ExposedPlayer {
    pub active_character_id: Option<EntityId>,
    pub characters: Vec<ExposedCharacter>,
    pub pile: Vec<ExposedCard>,
    pub hands: Vec<ExposedCard>,
    pub dice: Vec<DiceType>,
    pub combat_statuses: Vec<ExposedEntity>,
    pub summons: Vec<ExposedEntity>,
    pub supports: Vec<ExposedEntity>,
    pub declared_end: bool,
    pub legend_used: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ExposedState {
    pub phase: Phase,
    pub current_turn: Who,
    pub round_number: u32,
    pub winner: Option<Who>,
    pub players: Vec<ExposedPlayer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde", tag = "type")]
pub enum ExposedActionKind {
    UseSkill { skill: SkillId, caller: EntityId },
    PlayCard { card: ExposedCard, targets: Vec<EntityId> },
    SwitchActive { from: Option<EntityId>, to: EntityId },
    ElementalTuning { card: EntityId, result: DiceType },
    DeclareEnd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ExposedAction {
    pub kind: ExposedActionKind,
    pub cost: Vec<DiceType>,
    pub fast: bool,
    pub auto_selected_dice: Vec<DiceType>,
    pub preview: Option<ExposedState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde", tag = "type")]
pub enum ExposedMutation {
    ChangePhase {
        new_phase: Phase,
    },
    StepRound,
    SwitchTurn,
    SetWinner {
        winner: Option<Who>,
    },
    TransferCard {
        who: Who,
        from: CardArea,
        to: CardArea,
        card: ExposedCard,
    },
    SwitchActive {
        who: Who,
        to: EntityId,
    },
    RemoveCard {
        who: Who,
        area: CardArea,
        card: ExposedCard,
        reason: RemoveCardReason,
    },
    CreateCard {
        who: Who,
        area: CardArea,
        card: ExposedCard,
    },
    CreateCharacter {
        who: Who,
        id: EntityId,
        definition_id: DefinitionId,
    },
    CreateEntity {
        area: EntityArea,
        id: EntityId,
        definition_id: DefinitionId,
    },
    RemoveEntity {
        id: EntityId,
    },
    ModifyEntityVar {
        id: EntityId,
        var: String,
        value: i64,
    },
    ReplaceDefinition {
        id: EntityId,
        new_definition_id: DefinitionId,
    },
    ResetDice {
        who: Who,
        dice: Vec<DiceType>,
    },
    Damage {
        source: EntityId,
        target: EntityId,
        damage_type: DamageType,
        value: i64,
        old_health: i64,
        new_health: i64,
        reaction: Option<Reaction>,
    },
    ElementalReaction {
        target: EntityId,
        reaction: Reaction,
    },
    TriggeredSkill {
        who: Who,
        caller: EntityId,
        skill: SkillId,
    },
    PlayerAction {
        who: Who,
        action: ExposedActionKind,
    },
    OppAction {
        who: Who,
    },
    OppChoosingActive {
        who: Who,
    },
    RerollDone {
        who: Who,
        count: usize,
    },
    SwitchHandsDone {
        who: Who,
        count: usize,
    },
    SelectCardDone {
        who: Who,
        definition_id: DefinitionId,
    },
}

impl ExposedMutation {
    pub fn from_damage(info: &DamageInfo) -> Self {
        ExposedMutation::Damage {
            source: info.source,
            target: info.target,
            damage_type: info.damage_type,
            value: info.value,
            old_health: info.old_health,
            new_health: info.new_health,
            reaction: info.reaction,
        }
    }
}

fn card_view(card: &CardState, visible: bool) -> ExposedCard {
    ExposedCard {
        id: card.id,
        definition_id: if visible { card.definition } else { HIDDEN_CARD },
    }
}

fn variables_view(bag: &crate::state::entity::VariableBag) -> BTreeMap<String, i64> {
    bag.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn entity_view(e: &EntityState) -> ExposedEntity {
    ExposedEntity {
        id: e.id,
        definition_id: e.definition,
        variables: variables_view(&e.variables),
    }
}

fn character_view(c: &CharacterState) -> ExposedCharacter {
    ExposedCharacter {
        id: c.id,
        definition_id: c.definition,
        variables: variables_view(&c.variables),
        entities: c.entities.iter().map(entity_view).collect(),
    }
}

fn player_view(player: &PlayerState, own: bool) -> ExposedPlayer {
    ExposedPlayer {
        active_character_id: player.active_character_id,
        characters: player.characters.iter().map(character_view).collect(),
        pile: player
            .piles
            .iter()
            .map(|_| ExposedCard {
                id: 0,
                definition_id: HIDDEN_CARD,
            })
            .collect(),
        hands: player.hands.iter().map(|c| card_view(c, own)).collect(),
        dice: if own {
            player.dice.clone()
        } else {
            vec![DiceType::Void; player.dice.len()]
        },
        combat_statuses: player.combat_statuses.iter().map(entity_view).collect(),
        summons: player.summons.iter().map(entity_view).collect(),
        supports: player.supports.iter().map(entity_view).collect(),
        declared_end: player.flags.declared_end,
        legend_used: player.flags.legend_used,
    }
}

/// The state as `viewer` may see it; `None` views as a spectator.
pub fn expose_state(state: &GameState, viewer: Option<Who>) -> ExposedState {
    ExposedState {
        phase: state.phase,
        current_turn: state.current_turn,
        round_number: state.round_number,
        winner: state.winner,
        players: Who::both()
            .iter()
            .map(|who| player_view(state.player(*who), viewer == Some(*who)))
            .collect(),
    }
}

/// Translate one primitive mutation for `viewer`. Bookkeeping mutations
/// without observable meaning yield `None`.
pub fn expose_mutation(mutation: &Mutation, viewer: Option<Who>) -> Option<ExposedMutation> {
    let own = |who: &Who| viewer == Some(*who);
    let exposed = match mutation {
        Mutation::StepRandom
        | Mutation::SetPlayerFlag { .. }
        | Mutation::PushRoundSkillLog { .. }
        | Mutation::ClearRoundSkillLog { .. } => return None,
        Mutation::ChangePhase { new_phase } => ExposedMutation::ChangePhase {
            new_phase: *new_phase,
        },
        Mutation::StepRound => ExposedMutation::StepRound,
        Mutation::SwitchTurn => ExposedMutation::SwitchTurn,
        Mutation::SetWinner { winner } => ExposedMutation::SetWinner { winner: *winner },
        Mutation::TransferCard {
            who, from, to, card, ..
        } => ExposedMutation::TransferCard {
            who: *who,
            from: *from,
            to: *to,
            card: ExposedCard {
                id: *card,
                definition_id: HIDDEN_CARD,
            },
        },
        Mutation::SwitchActive { who, to } => ExposedMutation::SwitchActive { who: *who, to: *to },
        Mutation::RemoveCard {
            who,
            area,
            card,
            reason,
        } => ExposedMutation::RemoveCard {
            who: *who,
            area: *area,
            card: ExposedCard {
                id: *card,
                definition_id: HIDDEN_CARD,
            },
            reason: *reason,
        },
        Mutation::CreateCard { who, card, area, .. } => ExposedMutation::CreateCard {
            who: *who,
            area: *area,
            card: card_view(card, own(who) && *area == CardArea::Hands),
        },
        Mutation::CreateCharacter { who, character } => ExposedMutation::CreateCharacter {
            who: *who,
            id: character.id,
            definition_id: character.definition,
        },
        Mutation::CreateEntity { area, entity } => ExposedMutation::CreateEntity {
            area: *area,
            id: entity.id,
            definition_id: entity.definition,
        },
        Mutation::RemoveEntity { entity } => ExposedMutation::RemoveEntity { id: *entity },
        Mutation::ModifyEntityVar { entity, var, value } => ExposedMutation::ModifyEntityVar {
            id: *entity,
            var: var.to_string(),
            value: *value,
        },
        Mutation::ReplaceDefinition {
            entity,
            new_definition,
        } => ExposedMutation::ReplaceDefinition {
            id: *entity,
            new_definition_id: *new_definition,
        },
        Mutation::ResetDice { who, dice } => ExposedMutation::ResetDice {
            who: *who,
            dice: if own(who) {
                dice.clone()
            } else {
                vec![DiceType::Void; dice.len()]
            },
        },
    };
    Some(exposed)
}

/// Translate a flushed buffer for `viewer`, filling in card identities the
/// viewer is entitled to from the snapshot taken after the flush.
pub fn expose_pending(state: &GameState, pending: &[PendingItem], viewer: Option<Who>) -> Vec<ExposedMutation> {
    pending
        .iter()
        .filter_map(|item| match item {
            Either::Left(mutation) => {
                let mut exposed = expose_mutation(mutation, viewer)?;
                reveal_known_card(state, mutation, viewer, &mut exposed);
                Some(exposed)
            }
            Either::Right(semantic) => Some(redact_semantic(semantic, viewer)),
        })
        .collect()
}

/// A card that ended up in the viewer's own hand shows its definition. Played
/// cards are revealed through the action feed instead.
fn reveal_known_card(state: &GameState, mutation: &Mutation, viewer: Option<Who>, exposed: &mut ExposedMutation) {
    let (who, card_id) = match mutation {
        Mutation::TransferCard {
            who,
            to: CardArea::Hands,
            card,
            ..
        } if viewer == Some(*who) => (*who, *card),
        _ => return,
    };
    let definition = state
        .player(who)
        .hands
        .iter()
        .find(|c| c.id == card_id)
        .map(|c| c.definition);
    if let (Some(definition), ExposedMutation::TransferCard { card, .. }) = (definition, exposed) {
        card.definition_id = definition;
    }
}

fn redact_semantic(semantic: &ExposedMutation, viewer: Option<Who>) -> ExposedMutation {
    match semantic {
        ExposedMutation::SelectCardDone { who, .. } if viewer != Some(*who) => {
            ExposedMutation::SelectCardDone {
                who: *who,
                definition_id: HIDDEN_CARD,
            }
        }
        other => other.clone(),
    }
}

pub fn expose_action_kind(kind: &ActionKind) -> ExposedActionKind {
    match kind {
        ActionKind::UseSkill { skill, caller } => ExposedActionKind::UseSkill {
            skill: *skill,
            caller: *caller,
        },
        ActionKind::PlayCard { card, targets } => ExposedActionKind::PlayCard {
            card: card_view(card, true),
            targets: targets.clone(),
        },
        ActionKind::SwitchActive { from, to } => ExposedActionKind::SwitchActive {
            from: *from,
            to: *to,
        },
        ActionKind::ElementalTuning { card, result } => ExposedActionKind::ElementalTuning {
            card: *card,
            result: *result,
        },
        ActionKind::DeclareEnd => ExposedActionKind::DeclareEnd,
    }
}

pub fn expose_action(action: &ActionInfo) -> ExposedAction {
    ExposedAction {
        kind: expose_action_kind(&action.kind),
        cost: action.cost.clone(),
        fast: action.fast,
        auto_selected_dice: action.auto_selected_dice.clone(),
        preview: action
            .preview
            .as_ref()
            .map(|state| expose_state(state, Some(action.who))),
    }
}

/// JSON schema of the per-viewer state.
pub fn state_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(ExposedState)
}

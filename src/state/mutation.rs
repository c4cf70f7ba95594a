//! Closed vocabulary of primitive state edits.
//!
//! [`apply_mutation`] is the only way a new [`GameState`] is derived from an
//! old one. It clones first and edits the clone, so a failing call leaves the
//! input untouched.

use super::entity::{
    CardArea, CardState, CharacterState, DefinitionId, EntityArea, EntityId, EntityState,
    SkillId, VarName,
};
use super::types::{Aura, DiceType};
use super::{GameState, Phase, PlayerFlag, Who};
use crate::error::{EngineError, EngineResult};
use rand::RngCore;
use rocket::serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum RemoveCardReason {
    Play,
    ElementalTuning,
    Overflow,
    Disposed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde", tag = "type")]
pub enum Mutation {
    StepRandom,
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
        card: EntityId,
        target_index: Option<usize>,
    },
    SwitchActive {
        who: Who,
        to: EntityId,
    },
    RemoveCard {
        who: Who,
        area: CardArea,
        card: EntityId,
        reason: RemoveCardReason,
    },
    CreateCard {
        who: Who,
        card: CardState,
        area: CardArea,
        target_index: Option<usize>,
    },
    CreateCharacter {
        who: Who,
        character: CharacterState,
    },
    CreateEntity {
        area: EntityArea,
        entity: EntityState,
    },
    RemoveEntity {
        entity: EntityId,
    },
    ModifyEntityVar {
        entity: EntityId,
        var: VarName,
        value: i64,
    },
    ReplaceDefinition {
        entity: EntityId,
        new_definition: DefinitionId,
    },
    ResetDice {
        who: Who,
        dice: Vec<DiceType>,
    },
    SetPlayerFlag {
        who: Who,
        flag: PlayerFlag,
        value: bool,
    },
    PushRoundSkillLog {
        who: Who,
        caller_definition: DefinitionId,
        skill: SkillId,
    },
    ClearRoundSkillLog {
        who: Who,
    },
}

fn missing(what: &str, id: EntityId) -> EngineError {
    EngineError::internal(format!("{} {} does not exist", what, id))
}

fn claim_id(state: &mut GameState, id: EntityId) -> EngineResult<()> {
    if id != state.iterators.next_id {
        return Err(EngineError::internal(format!(
            "created id {} does not match the id cursor {}",
            id, state.iterators.next_id
        )));
    }
    state.iterators.next_id -= 1;
    Ok(())
}

fn insert_at<T>(list: &mut Vec<T>, item: T, index: Option<usize>) {
    match index {
        Some(i) => list.insert(i.min(list.len()), item),
        None => list.push(item),
    }
}

fn cards_mut(state: &mut GameState, who: Who, area: CardArea) -> &mut Vec<CardState> {
    let player = state.player_mut(who);
    match area {
        CardArea::Hands => &mut player.hands,
        CardArea::Pile => &mut player.piles,
    }
}

fn entity_list_mut<'a>(
    state: &'a mut GameState,
    area: &EntityArea,
) -> EngineResult<&'a mut Vec<EntityState>> {
    let player = state.player_mut(area.who());
    match area {
        EntityArea::Character { character_id, .. } => player
            .characters
            .iter_mut()
            .find(|c| c.id == *character_id)
            .map(|c| &mut c.entities)
            .ok_or_else(|| missing("character", *character_id)),
        EntityArea::CombatStatuses { .. } => Ok(&mut player.combat_statuses),
        EntityArea::Summons { .. } => Ok(&mut player.summons),
        EntityArea::Supports { .. } => Ok(&mut player.supports),
    }
}

fn character_mut(state: &mut GameState, id: EntityId) -> Option<&mut CharacterState> {
    state
        .players
        .iter_mut()
        .flat_map(|p| p.characters.iter_mut())
        .find(|c| c.id == id)
}

fn entity_mut(state: &mut GameState, id: EntityId) -> Option<&mut EntityState> {
    for player in state.players.iter_mut() {
        for ch in player.characters.iter_mut() {
            if let Some(e) = ch.entities.iter_mut().find(|e| e.id == id) {
                return Some(e);
            }
        }
        for list in [
            &mut player.combat_statuses,
            &mut player.summons,
            &mut player.supports,
        ] {
            if let Some(e) = list.iter_mut().find(|e| e.id == id) {
                return Some(e);
            }
        }
    }
    None
}

/// Character variables carry the board invariants: health and energy stay in
/// range, and a defeated character holds no energy and no aura.
fn set_character_var(ch: &mut CharacterState, var: &VarName, value: i64) {
    let value = match var {
        VarName::Health if ch.variables.has(&VarName::MaxHealth) => value.clamp(0, ch.max_health()),
        VarName::Health => value.max(0),
        VarName::Energy if !ch.alive() => 0,
        VarName::Energy => value.clamp(0, ch.max_energy()),
        VarName::Aura if !ch.alive() => Aura::None.to_var(),
        _ => value,
    };
    ch.variables.set(var.clone(), value);
    if *var == VarName::Alive && value == 0 {
        ch.variables.set(VarName::Energy, 0);
        ch.variables.set(VarName::Aura, Aura::None.to_var());
    }
}

/// Produce the snapshot that follows `mutation`.
pub fn apply_mutation(state: &GameState, mutation: &Mutation) -> EngineResult<GameState> {
    let mut next = state.clone();
    match mutation {
        Mutation::StepRandom => {
            next.iterators.random.next_u64();
            next.iterators.random_steps += 1;
        }
        Mutation::ChangePhase { new_phase } => {
            next.phase = *new_phase;
        }
        Mutation::StepRound => {
            next.round_number += 1;
        }
        Mutation::SwitchTurn => {
            next.current_turn = next.current_turn.opposite();
        }
        Mutation::SetWinner { winner } => {
            next.winner = *winner;
        }
        Mutation::TransferCard {
            who,
            from,
            to,
            card,
            target_index,
        } => {
            let source = cards_mut(&mut next, *who, *from);
            let index = source
                .iter()
                .position(|c| c.id == *card)
                .ok_or_else(|| missing("card", *card))?;
            let moved = source.remove(index);
            insert_at(cards_mut(&mut next, *who, *to), moved, *target_index);
        }
        Mutation::SwitchActive { who, to } => {
            let player = next.player_mut(*who);
            if !player.characters.iter().any(|c| c.id == *to) {
                return Err(missing("character", *to));
            }
            player.active_character_id = Some(*to);
        }
        Mutation::RemoveCard {
            who, area, card, ..
        } => {
            let list = cards_mut(&mut next, *who, *area);
            let index = list
                .iter()
                .position(|c| c.id == *card)
                .ok_or_else(|| missing("card", *card))?;
            list.remove(index);
        }
        Mutation::CreateCard {
            who,
            card,
            area,
            target_index,
        } => {
            next.data.card(card.definition)?;
            claim_id(&mut next, card.id)?;
            insert_at(cards_mut(&mut next, *who, *area), *card, *target_index);
        }
        Mutation::CreateCharacter { who, character } => {
            next.data.character(character.definition)?;
            claim_id(&mut next, character.id)?;
            next.player_mut(*who).characters.push(character.clone());
        }
        Mutation::CreateEntity { area, entity } => {
            next.data.entity(entity.definition)?;
            claim_id(&mut next, entity.id)?;
            entity_list_mut(&mut next, area)?.push(entity.clone());
        }
        Mutation::RemoveEntity { entity } => {
            let (area, _) = next
                .find_entity(*entity)
                .ok_or_else(|| missing("entity", *entity))?;
            let list = entity_list_mut(&mut next, &area)?;
            list.retain(|e| e.id != *entity);
        }
        Mutation::ModifyEntityVar { entity, var, value } => {
            if let Some(ch) = character_mut(&mut next, *entity) {
                set_character_var(ch, var, *value);
            } else if let Some(e) = entity_mut(&mut next, *entity) {
                e.variables.set(var.clone(), *value);
            } else {
                return Err(missing("entity", *entity));
            }
        }
        Mutation::ReplaceDefinition {
            entity,
            new_definition,
        } => {
            if next.character(*entity).is_some() {
                next.data.character(*new_definition)?;
                if let Some(ch) = character_mut(&mut next, *entity) {
                    ch.definition = *new_definition;
                }
            } else {
                next.data.entity(*new_definition)?;
                let e = entity_mut(&mut next, *entity).ok_or_else(|| missing("entity", *entity))?;
                e.definition = *new_definition;
            }
        }
        Mutation::ResetDice { who, dice } => {
            next.player_mut(*who).dice = dice.clone();
        }
        Mutation::SetPlayerFlag { who, flag, value } => {
            next.player_mut(*who).flags.set(*flag, *value);
        }
        Mutation::PushRoundSkillLog {
            who,
            caller_definition,
            skill,
        } => {
            next.player_mut(*who)
                .round_skill_log
                .entry(*caller_definition)
                .or_default()
                .push(*skill);
        }
        Mutation::ClearRoundSkillLog { who } => {
            next.player_mut(*who).round_skill_log.clear();
        }
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::data::definition::CharacterDefinition;
    use crate::data::GameData;
    use crate::state::entity::VariableBag;
    use std::sync::Arc;

    fn data() -> Arc<GameData> {
        let mut data = GameData::new();
        data.register_character(CharacterDefinition::new(1, "Dummy", DiceType::Pyro, 10, 3));
        Arc::new(data)
    }

    fn with_character() -> (GameState, EntityId) {
        let state = GameState::new(data(), GameConfig::with_seed(7));
        let id = state.iterators.next_id;
        let character = CharacterState {
            id,
            definition: 1,
            variables: VariableBag::new()
                .with(VarName::Health, 10)
                .with(VarName::MaxHealth, 10)
                .with(VarName::Energy, 0)
                .with(VarName::MaxEnergy, 3)
                .with(VarName::Alive, 1),
            entities: vec![],
        };
        let state = apply_mutation(
            &state,
            &Mutation::CreateCharacter {
                who: Who::First,
                character,
            },
        )
        .expect("create character");
        (state, id)
    }

    #[test]
    fn health_is_clamped_to_bounds() {
        let (state, id) = with_character();
        let high = apply_mutation(
            &state,
            &Mutation::ModifyEntityVar {
                entity: id,
                var: VarName::Health,
                value: 25,
            },
        )
        .expect("modify");
        assert_eq!(high.character(id).map(|(_, c)| c.health()), Some(10));
        let low = apply_mutation(
            &state,
            &Mutation::ModifyEntityVar {
                entity: id,
                var: VarName::Health,
                value: -4,
            },
        )
        .expect("modify");
        assert_eq!(low.character(id).map(|(_, c)| c.health()), Some(0));
    }

    #[test]
    fn defeat_zeroes_energy_and_aura() {
        let (state, id) = with_character();
        let charged = apply_mutation(
            &state,
            &Mutation::ModifyEntityVar {
                entity: id,
                var: VarName::Energy,
                value: 2,
            },
        )
        .expect("energy");
        let aura = apply_mutation(
            &charged,
            &Mutation::ModifyEntityVar {
                entity: id,
                var: VarName::Aura,
                value: Aura::Hydro.to_var(),
            },
        )
        .expect("aura");
        let dead = apply_mutation(
            &aura,
            &Mutation::ModifyEntityVar {
                entity: id,
                var: VarName::Alive,
                value: 0,
            },
        )
        .expect("defeat");
        let (_, ch) = dead.character(id).expect("character");
        assert!(!ch.alive());
        assert_eq!(ch.energy(), 0);
        assert_eq!(ch.aura(), Aura::None);

        let still_dead = apply_mutation(
            &dead,
            &Mutation::ModifyEntityVar {
                entity: id,
                var: VarName::Energy,
                value: 3,
            },
        )
        .expect("energy after defeat");
        assert_eq!(still_dead.character(id).map(|(_, c)| c.energy()), Some(0));
    }

    #[test]
    fn missing_entity_is_internal_error_and_input_untouched() {
        let (state, id) = with_character();
        let err = apply_mutation(&state, &Mutation::RemoveEntity { entity: 12345 }).unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));
        assert!(state.character(id).is_some());
    }

    #[test]
    fn unknown_definition_is_data_error() {
        let state = GameState::new(data(), GameConfig::with_seed(1));
        let card = CardState {
            id: state.iterators.next_id,
            definition: 999,
        };
        let err = apply_mutation(
            &state,
            &Mutation::CreateCard {
                who: Who::Second,
                card,
                area: CardArea::Hands,
                target_index: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Data(_)));
    }

    #[test]
    fn step_random_advances_cursor_only_through_mutation() {
        let state = GameState::new(data(), GameConfig::with_seed(3));
        let expected = state.iterators.peek_random();
        let next = apply_mutation(&state, &Mutation::StepRandom).expect("step");
        assert_eq!(next.iterators.random_steps, 1);
        assert_eq!(state.iterators.random_steps, 0);
        assert_ne!(next.iterators.peek_random(), expected);
    }
}

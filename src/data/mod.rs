//! Read-only rule catalogue shared by every match that loads it.

pub mod definition;
pub mod effect;

use crate::error::{EngineError, EngineResult};
use crate::state::entity::{DefinitionId, SkillId};
use definition::{CardDefinition, CharacterDefinition, EntityDefinition, SkillDefinition};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Definition id shown in place of a card the viewer may not see.
pub const HIDDEN_CARD: DefinitionId = 0;

/// Board entities created as the after-effect of an elemental reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactionEntity {
    Frozen,
    CrystallizeShield,
    BurningFlame,
    DendroCore,
    CatalyzingField,
}

/// Tag on a character status that stops the character from using skills.
pub const TAG_DISABLE_SKILL: &str = "disableSkill";
/// Tag on a card that cannot be used for elemental tuning.
pub const TAG_NO_TUNING: &str = "noTuning";
/// Tag on a card that may be played once per round.
pub const TAG_LEGEND: &str = "legend";

#[derive(Default)]
pub struct GameData {
    characters: HashMap<DefinitionId, Arc<CharacterDefinition>>,
    entities: HashMap<DefinitionId, Arc<EntityDefinition>>,
    cards: HashMap<DefinitionId, Arc<CardDefinition>>,
    skills: HashMap<SkillId, Arc<SkillDefinition>>,
    reaction_entities: HashMap<ReactionEntity, DefinitionId>,
}

impl fmt::Debug for GameData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameData")
            .field("characters", &self.characters.len())
            .field("entities", &self.entities.len())
            .field("cards", &self.cards.len())
            .field("skills", &self.skills.len())
            .finish()
    }
}

impl GameData {
    pub fn new() -> Self {
        GameData::default()
    }

    pub fn register_character(&mut self, def: CharacterDefinition) {
        self.characters.insert(def.id, Arc::new(def));
    }

    pub fn register_entity(&mut self, def: EntityDefinition) {
        self.entities.insert(def.id, Arc::new(def));
    }

    pub fn register_card(&mut self, def: CardDefinition) {
        self.cards.insert(def.id, Arc::new(def));
    }

    pub fn register_skill(&mut self, def: SkillDefinition) {
        self.skills.insert(def.id, Arc::new(def));
    }

    /// Map a reaction after-effect to the entity definition that implements it.
    pub fn register_reaction_entity(&mut self, kind: ReactionEntity, definition: DefinitionId) {
        self.reaction_entities.insert(kind, definition);
    }

    pub fn character(&self, id: DefinitionId) -> EngineResult<&Arc<CharacterDefinition>> {
        self.characters
            .get(&id)
            .ok_or_else(|| EngineError::data(format!("unknown character definition {}", id)))
    }

    pub fn entity(&self, id: DefinitionId) -> EngineResult<&Arc<EntityDefinition>> {
        self.entities
            .get(&id)
            .ok_or_else(|| EngineError::data(format!("unknown entity definition {}", id)))
    }

    pub fn card(&self, id: DefinitionId) -> EngineResult<&Arc<CardDefinition>> {
        self.cards
            .get(&id)
            .ok_or_else(|| EngineError::data(format!("unknown card definition {}", id)))
    }

    pub fn skill(&self, id: SkillId) -> EngineResult<&Arc<SkillDefinition>> {
        self.skills
            .get(&id)
            .ok_or_else(|| EngineError::data(format!("unknown skill {}", id)))
    }

    pub fn reaction_entity(&self, kind: ReactionEntity) -> Option<DefinitionId> {
        self.reaction_entities.get(&kind).copied()
    }

    /// Skill ids owned by a character or entity definition.
    pub fn skills_of_character(&self, id: DefinitionId) -> EngineResult<Vec<SkillId>> {
        Ok(self.character(id)?.all_skills().copied().collect())
    }

    pub fn skills_of_entity(&self, id: DefinitionId) -> EngineResult<Vec<SkillId>> {
        Ok(self.entity(id)?.skills.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::types::DiceType;

    #[test]
    fn unknown_ids_are_data_errors() {
        let data = GameData::new();
        assert!(matches!(data.character(5), Err(EngineError::Data(_))));
        assert!(matches!(data.card(5), Err(EngineError::Data(_))));
        assert!(matches!(data.skill(5), Err(EngineError::Data(_))));
    }

    #[test]
    fn registered_character_is_found() {
        let mut data = GameData::new();
        data.register_character(CharacterDefinition::new(3, "C", DiceType::Cryo, 10, 2).with_skill(9));
        assert_eq!(data.skills_of_character(3).expect("skills"), vec![9]);
    }
}

use crate::error::EngineResult;
use crate::skill::context::{SkillContext, SkillOutcome};
use crate::skill::{EventArg, EventName, SkillInfo};
use crate::state::entity::{DefinitionId, EntityId, SkillId, VarName, VariableBag};
use crate::state::types::DiceType;
use crate::state::{GameState, Who};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::fmt;
use std::sync::Arc;

/// Skill body. Receives a context over a private copy of the state and the
/// (possibly modifiable) event argument.
pub type SkillAction =
    Arc<dyn Fn(&mut SkillContext, &mut EventArg) -> EngineResult<()> + Send + Sync>;

/// Guard evaluated against the current snapshot before a triggered skill runs.
pub type SkillFilter = Arc<dyn Fn(&GameState, &SkillInfo, &EventArg) -> bool + Send + Sync>;

/// Guard deciding whether a hand card may be played on a target list.
pub type CardFilter = Arc<dyn Fn(&GameState, Who, &[EntityId]) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum SkillKind {
    Normal,
    Elemental,
    Burst,
    Technique,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiativeConfig {
    pub kind: SkillKind,
    pub cost: Vec<DiceType>,
    pub gain_energy: bool,
}

#[derive(Clone)]
pub struct SkillDefinition {
    pub id: SkillId,
    /// `None` for initiative skills and card bodies, which only run when invoked.
    pub trigger_on: Option<EventName>,
    pub initiative: Option<InitiativeConfig>,
    pub filter: Option<SkillFilter>,
    pub action: SkillAction,
}

impl fmt::Debug for SkillDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillDefinition")
            .field("id", &self.id)
            .field("trigger_on", &self.trigger_on)
            .field("initiative", &self.initiative)
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

impl SkillDefinition {
    pub fn triggered(id: SkillId, trigger_on: EventName, action: SkillAction) -> Self {
        SkillDefinition {
            id,
            trigger_on: Some(trigger_on),
            initiative: None,
            filter: None,
            action,
        }
    }

    pub fn initiative(id: SkillId, kind: SkillKind, cost: Vec<DiceType>, action: SkillAction) -> Self {
        SkillDefinition {
            id,
            trigger_on: None,
            initiative: Some(InitiativeConfig {
                kind,
                cost,
                gain_energy: kind != SkillKind::Burst,
            }),
            filter: None,
            action,
        }
    }

    /// Card bodies and request-only skills.
    pub fn plain(id: SkillId, action: SkillAction) -> Self {
        SkillDefinition {
            id,
            trigger_on: None,
            initiative: None,
            filter: None,
            action,
        }
    }

    pub fn with_filter(mut self, filter: SkillFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn passes(&self, state: &GameState, info: &SkillInfo, arg: &EventArg) -> bool {
        match &self.filter {
            Some(filter) => filter(state, info, arg),
            None => true,
        }
    }

    /// Run the skill as a pure function of the snapshot: the input state is
    /// untouched and the new state comes back inside the outcome together
    /// with the mutations that produced it and the follow-up events.
    pub fn run(&self, state: &GameState, info: &SkillInfo, arg: &mut EventArg) -> EngineResult<SkillOutcome> {
        let mut ctx = SkillContext::new(state.clone(), info.clone());
        (self.action)(&mut ctx, arg)?;
        Ok(ctx.finish())
    }
}

#[derive(Clone)]
pub struct CharacterDefinition {
    pub id: DefinitionId,
    pub name: String,
    pub tags: Vec<String>,
    pub element: DiceType,
    pub max_health: i64,
    pub max_energy: i64,
    /// Skills the player can choose as an action.
    pub initiative_skills: Vec<SkillId>,
    /// Passive skills listening for events.
    pub skills: Vec<SkillId>,
}

impl fmt::Debug for CharacterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharacterDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl CharacterDefinition {
    pub fn new(id: DefinitionId, name: &str, element: DiceType, max_health: i64, max_energy: i64) -> Self {
        CharacterDefinition {
            id,
            name: name.to_string(),
            tags: vec![],
            element,
            max_health,
            max_energy,
            initiative_skills: vec![],
            skills: vec![],
        }
    }

    pub fn with_initiative_skill(mut self, skill: SkillId) -> Self {
        self.initiative_skills.push(skill);
        self
    }

    pub fn with_skill(mut self, skill: SkillId) -> Self {
        self.skills.push(skill);
        self
    }

    pub fn all_skills(&self) -> impl Iterator<Item = &SkillId> {
        self.initiative_skills.iter().chain(self.skills.iter())
    }

    /// Starting variable bag for a fresh character.
    pub fn initial_variables(&self) -> VariableBag {
        VariableBag::new()
            .with(VarName::Health, self.max_health)
            .with(VarName::MaxHealth, self.max_health)
            .with(VarName::Energy, 0)
            .with(VarName::MaxEnergy, self.max_energy)
            .with(VarName::Alive, 1)
            .with(VarName::Aura, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum EntityKind {
    Status,
    CombatStatus,
    Summon,
    Support,
    Equipment,
}

/// What happens to a variable when an entity with the same definition is
/// created again in the same area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recreate {
    Overwrite,
    /// Add the new initial value to the current one, capped at the limit.
    Append { limit: i64 },
    /// Take the larger of the current value and the initial value.
    Max,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarConfig {
    pub name: VarName,
    pub initial: i64,
    pub recreate: Recreate,
}

#[derive(Debug, Clone)]
pub struct EntityDefinition {
    pub id: DefinitionId,
    pub kind: EntityKind,
    pub tags: Vec<String>,
    pub skills: Vec<SkillId>,
    pub variables: Vec<VarConfig>,
    /// Remove the entity once its usage reaches zero.
    pub dispose_when_used_up: bool,
}

impl EntityDefinition {
    pub fn new(id: DefinitionId, kind: EntityKind) -> Self {
        EntityDefinition {
            id,
            kind,
            tags: vec![],
            skills: vec![],
            variables: vec![],
            dispose_when_used_up: false,
        }
    }

    pub fn with_skill(mut self, skill: SkillId) -> Self {
        self.skills.push(skill);
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn with_var(mut self, name: VarName, initial: i64, recreate: Recreate) -> Self {
        self.variables.push(VarConfig {
            name,
            initial,
            recreate,
        });
        self
    }

    pub fn with_usage(mut self, usage: i64) -> Self {
        self.dispose_when_used_up = true;
        self.with_var(VarName::Usage, usage, Recreate::Overwrite)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn initial_variables(&self) -> VariableBag {
        self.variables
            .iter()
            .fold(VariableBag::new(), |bag, v| bag.with(v.name.clone(), v.initial))
    }

    /// Variables after recreating over an existing instance.
    pub fn recreated_variables(&self, existing: &VariableBag) -> VariableBag {
        let mut bag = existing.clone();
        for v in &self.variables {
            let current = existing.value(&v.name);
            let value = match v.recreate {
                Recreate::Overwrite => v.initial,
                Recreate::Append { limit } => (current + v.initial).min(limit),
                Recreate::Max => current.max(v.initial),
            };
            bag.set(v.name.clone(), value);
        }
        bag
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum CardKind {
    Event,
    Equipment,
    Support,
}

/// Which targets a card asks for when played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum CardTarget {
    None,
    MyCharacter,
    OppCharacter,
    MySummon,
}

#[derive(Clone)]
pub struct CardDefinition {
    pub id: DefinitionId,
    pub name: String,
    pub kind: CardKind,
    pub tags: Vec<String>,
    pub cost: Vec<DiceType>,
    pub target: CardTarget,
    pub filter: Option<CardFilter>,
    pub skill: SkillId,
}

impl fmt::Debug for CardDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("cost", &self.cost)
            .finish()
    }
}

impl CardDefinition {
    pub fn new(id: DefinitionId, name: &str, kind: CardKind, cost: Vec<DiceType>, skill: SkillId) -> Self {
        CardDefinition {
            id,
            name: name.to_string(),
            kind,
            tags: vec![],
            cost,
            target: CardTarget::None,
            filter: None,
            skill,
        }
    }

    pub fn with_target(mut self, target: CardTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn with_filter(mut self, filter: CardFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn playable(&self, state: &GameState, who: Who, targets: &[EntityId]) -> bool {
        match &self.filter {
            Some(filter) => filter(state, who, targets),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recreate_rules() {
        let def = EntityDefinition::new(10, EntityKind::CombatStatus)
            .with_var(VarName::Usage, 2, Recreate::Append { limit: 3 })
            .with_var(VarName::Shield, 1, Recreate::Max)
            .with_var(VarName::Duration, 2, Recreate::Overwrite);
        let existing = VariableBag::new()
            .with(VarName::Usage, 2)
            .with(VarName::Shield, 4)
            .with(VarName::Duration, 1);
        let bag = def.recreated_variables(&existing);
        assert_eq!(bag.value(&VarName::Usage), 3);
        assert_eq!(bag.value(&VarName::Shield), 4);
        assert_eq!(bag.value(&VarName::Duration), 2);
    }

    #[test]
    fn burst_does_not_gain_energy() {
        let noop: SkillAction = Arc::new(|_, _| Ok(()));
        let burst = SkillDefinition::initiative(1, SkillKind::Burst, vec![DiceType::Energy], noop.clone());
        let normal = SkillDefinition::initiative(2, SkillKind::Normal, vec![DiceType::Void], noop);
        assert_eq!(burst.initiative.map(|c| c.gain_energy), Some(false));
        assert_eq!(normal.initiative.map(|c| c.gain_energy), Some(true));
    }
}

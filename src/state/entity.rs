use super::types::Aura;
use super::Who;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::collections::BTreeMap;
use std::fmt;

/// Runtime identity of a character, entity or card. Engine-allocated ids are negative.
pub type EntityId = i64;
/// Key into the rule catalogue.
pub type DefinitionId = u32;
pub type SkillId = u32;

/// Well-known variable names; anything else a definition needs goes in `Named`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum VarName {
    Health,
    MaxHealth,
    Energy,
    MaxEnergy,
    Alive,
    Aura,
    Usage,
    UsagePerRound,
    Shield,
    Duration,
    Named(String),
}

impl fmt::Display for VarName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarName::Health => write!(f, "health"),
            VarName::MaxHealth => write!(f, "maxHealth"),
            VarName::Energy => write!(f, "energy"),
            VarName::MaxEnergy => write!(f, "maxEnergy"),
            VarName::Alive => write!(f, "alive"),
            VarName::Aura => write!(f, "aura"),
            VarName::Usage => write!(f, "usage"),
            VarName::UsagePerRound => write!(f, "usagePerRound"),
            VarName::Shield => write!(f, "shield"),
            VarName::Duration => write!(f, "duration"),
            VarName::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Sparse set of integer variables. Which keys exist depends on the entity's
/// definition, so callers ask with [`VariableBag::has`] instead of assuming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    crate = "rocket::serde",
    from = "Vec<(VarName, i64)>",
    into = "Vec<(VarName, i64)>"
)]
pub struct VariableBag(BTreeMap<VarName, i64>);

impl VariableBag {
    pub fn new() -> Self {
        VariableBag(BTreeMap::new())
    }

    pub fn has(&self, name: &VarName) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &VarName) -> Option<i64> {
        self.0.get(name).copied()
    }

    /// Missing variables read as zero.
    pub fn value(&self, name: &VarName) -> i64 {
        self.get(name).unwrap_or(0)
    }

    pub fn set(&mut self, name: VarName, value: i64) {
        self.0.insert(name, value);
    }

    pub fn with(mut self, name: VarName, value: i64) -> Self {
        self.set(name, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VarName, &i64)> {
        self.0.iter()
    }
}

impl From<Vec<(VarName, i64)>> for VariableBag {
    fn from(pairs: Vec<(VarName, i64)>) -> Self {
        VariableBag(pairs.into_iter().collect())
    }
}

impl From<VariableBag> for Vec<(VarName, i64)> {
    fn from(bag: VariableBag) -> Self {
        bag.0.into_iter().collect()
    }
}

/// Status, combat status, summon, support or equipment on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct EntityState {
    pub id: EntityId,
    pub definition: DefinitionId,
    pub variables: VariableBag,
}

impl EntityState {
    pub fn usage(&self) -> i64 {
        self.variables.value(&VarName::Usage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct CharacterState {
    pub id: EntityId,
    pub definition: DefinitionId,
    pub variables: VariableBag,
    /// Character statuses and equipment attached to this character.
    pub entities: Vec<EntityState>,
}

impl CharacterState {
    pub fn alive(&self) -> bool {
        self.variables.value(&VarName::Alive) != 0
    }

    pub fn health(&self) -> i64 {
        self.variables.value(&VarName::Health)
    }

    pub fn max_health(&self) -> i64 {
        self.variables.value(&VarName::MaxHealth)
    }

    pub fn energy(&self) -> i64 {
        self.variables.value(&VarName::Energy)
    }

    pub fn max_energy(&self) -> i64 {
        self.variables.value(&VarName::MaxEnergy)
    }

    pub fn aura(&self) -> Aura {
        Aura::from_var(self.variables.value(&VarName::Aura))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct CardState {
    pub id: EntityId,
    pub definition: DefinitionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum CardArea {
    Hands,
    Pile,
}

/// Where a non-character entity lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum EntityArea {
    Character { who: Who, character_id: EntityId },
    CombatStatuses { who: Who },
    Summons { who: Who },
    Supports { who: Who },
}

impl EntityArea {
    pub fn who(&self) -> Who {
        match self {
            EntityArea::Character { who, .. }
            | EntityArea::CombatStatuses { who }
            | EntityArea::Summons { who }
            | EntityArea::Supports { who } => *who,
        }
    }
}

/// Snapshot of whatever owns a running skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Character(CharacterState),
    Entity(EntityState),
    Card(CardState),
}

impl Caller {
    pub fn id(&self) -> EntityId {
        match self {
            Caller::Character(c) => c.id,
            Caller::Entity(e) => e.id,
            Caller::Card(c) => c.id,
        }
    }

    pub fn definition(&self) -> DefinitionId {
        match self {
            Caller::Character(c) => c.definition,
            Caller::Entity(e) => e.definition,
            Caller::Card(c) => c.definition,
        }
    }

    pub fn is_character(&self) -> bool {
        matches!(self, Caller::Character(_))
    }
}

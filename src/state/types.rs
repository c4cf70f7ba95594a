use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;

/// Dice faces, plus the cost-only markers `Void` (any die), `Aligned`
/// (all of one kind) and `Energy` (character energy rather than a die).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(crate = "rocket::serde")]
pub enum DiceType {
    Void,
    Cryo,
    Hydro,
    Pyro,
    Electro,
    Anemo,
    Geo,
    Dendro,
    Omni,
    Aligned,
    Energy,
}

impl DiceType {
    /// Faces a rolled die can show.
    pub fn rollable() -> [DiceType; 8] {
        [
            DiceType::Cryo,
            DiceType::Hydro,
            DiceType::Pyro,
            DiceType::Electro,
            DiceType::Anemo,
            DiceType::Geo,
            DiceType::Dendro,
            DiceType::Omni,
        ]
    }

    pub fn is_element(self) -> bool {
        matches!(
            self,
            DiceType::Cryo
                | DiceType::Hydro
                | DiceType::Pyro
                | DiceType::Electro
                | DiceType::Anemo
                | DiceType::Geo
                | DiceType::Dendro
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum DamageType {
    Physical,
    Cryo,
    Hydro,
    Pyro,
    Electro,
    Anemo,
    Geo,
    Dendro,
    Piercing,
    Heal,
}

impl DamageType {
    /// Elemental types run reactions against the target's aura.
    pub fn is_elemental(self) -> bool {
        !matches!(
            self,
            DamageType::Physical | DamageType::Piercing | DamageType::Heal
        )
    }

    pub fn from_dice(dice: DiceType) -> Option<DamageType> {
        match dice {
            DiceType::Cryo => Some(DamageType::Cryo),
            DiceType::Hydro => Some(DamageType::Hydro),
            DiceType::Pyro => Some(DamageType::Pyro),
            DiceType::Electro => Some(DamageType::Electro),
            DiceType::Anemo => Some(DamageType::Anemo),
            DiceType::Geo => Some(DamageType::Geo),
            DiceType::Dendro => Some(DamageType::Dendro),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum Aura {
    #[default]
    None,
    Cryo,
    Hydro,
    Pyro,
    Electro,
    Dendro,
    CryoDendro,
}

impl Aura {
    /// Auras live in an entity's integer variable bag.
    pub fn to_var(self) -> i64 {
        match self {
            Aura::None => 0,
            Aura::Cryo => 1,
            Aura::Hydro => 2,
            Aura::Pyro => 3,
            Aura::Electro => 4,
            Aura::Dendro => 7,
            Aura::CryoDendro => 17,
        }
    }

    pub fn from_var(value: i64) -> Aura {
        match value {
            1 => Aura::Cryo,
            2 => Aura::Hydro,
            3 => Aura::Pyro,
            4 => Aura::Electro,
            7 => Aura::Dendro,
            17 => Aura::CryoDendro,
            _ => Aura::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum Reaction {
    Melt,
    Vaporize,
    Overloaded,
    Superconduct,
    ElectroCharged,
    Frozen,
    SwirlCryo,
    SwirlHydro,
    SwirlPyro,
    SwirlElectro,
    CrystallizeCryo,
    CrystallizeHydro,
    CrystallizePyro,
    CrystallizeElectro,
    Burning,
    Bloom,
    Quicken,
}

//! Elemental reaction table and damage arithmetic.
//!
//! These are pure lookups. The pipeline that broadcasts the modifier stages
//! and writes the result into the state lives in
//! [`SkillContext::damage`](crate::skill::context::SkillContext::damage).

use crate::data::ReactionEntity;
use crate::state::types::{Aura, DamageType, Reaction};

/// `(existing aura, incoming type) -> (new aura, reaction)`.
pub fn reaction_of(aura: Aura, incoming: DamageType) -> (Aura, Option<Reaction>) {
    use Aura as A;
    use DamageType as D;
    use Reaction as R;
    match (aura, incoming) {
        (_, D::Physical) | (_, D::Piercing) | (_, D::Heal) => (aura, None),

        (A::None, D::Cryo) => (A::Cryo, None),
        (A::None, D::Hydro) => (A::Hydro, None),
        (A::None, D::Pyro) => (A::Pyro, None),
        (A::None, D::Electro) => (A::Electro, None),
        (A::None, D::Dendro) => (A::Dendro, None),
        (A::None, D::Anemo) | (A::None, D::Geo) => (A::None, None),

        (A::Cryo, D::Cryo) => (A::Cryo, None),
        (A::Cryo, D::Hydro) => (A::None, Some(R::Frozen)),
        (A::Cryo, D::Pyro) => (A::None, Some(R::Melt)),
        (A::Cryo, D::Electro) => (A::None, Some(R::Superconduct)),
        (A::Cryo, D::Anemo) => (A::None, Some(R::SwirlCryo)),
        (A::Cryo, D::Geo) => (A::None, Some(R::CrystallizeCryo)),
        (A::Cryo, D::Dendro) => (A::CryoDendro, None),

        (A::Hydro, D::Hydro) => (A::Hydro, None),
        (A::Hydro, D::Cryo) => (A::None, Some(R::Frozen)),
        (A::Hydro, D::Pyro) => (A::None, Some(R::Vaporize)),
        (A::Hydro, D::Electro) => (A::None, Some(R::ElectroCharged)),
        (A::Hydro, D::Anemo) => (A::None, Some(R::SwirlHydro)),
        (A::Hydro, D::Geo) => (A::None, Some(R::CrystallizeHydro)),
        (A::Hydro, D::Dendro) => (A::None, Some(R::Bloom)),

        (A::Pyro, D::Pyro) => (A::Pyro, None),
        (A::Pyro, D::Cryo) => (A::None, Some(R::Melt)),
        (A::Pyro, D::Hydro) => (A::None, Some(R::Vaporize)),
        (A::Pyro, D::Electro) => (A::None, Some(R::Overloaded)),
        (A::Pyro, D::Anemo) => (A::None, Some(R::SwirlPyro)),
        (A::Pyro, D::Geo) => (A::None, Some(R::CrystallizePyro)),
        (A::Pyro, D::Dendro) => (A::None, Some(R::Burning)),

        (A::Electro, D::Electro) => (A::Electro, None),
        (A::Electro, D::Cryo) => (A::None, Some(R::Superconduct)),
        (A::Electro, D::Hydro) => (A::None, Some(R::ElectroCharged)),
        (A::Electro, D::Pyro) => (A::None, Some(R::Overloaded)),
        (A::Electro, D::Anemo) => (A::None, Some(R::SwirlElectro)),
        (A::Electro, D::Geo) => (A::None, Some(R::CrystallizeElectro)),
        (A::Electro, D::Dendro) => (A::None, Some(R::Quicken)),

        (A::Dendro, D::Dendro) => (A::Dendro, None),
        (A::Dendro, D::Cryo) => (A::CryoDendro, None),
        (A::Dendro, D::Hydro) => (A::None, Some(R::Bloom)),
        (A::Dendro, D::Pyro) => (A::None, Some(R::Burning)),
        (A::Dendro, D::Electro) => (A::None, Some(R::Quicken)),
        (A::Dendro, D::Anemo) | (A::Dendro, D::Geo) => (A::Dendro, None),

        // The cryo half reacts first; dendro stays behind.
        (A::CryoDendro, D::Cryo) | (A::CryoDendro, D::Dendro) => (A::CryoDendro, None),
        (A::CryoDendro, D::Hydro) => (A::Dendro, Some(R::Frozen)),
        (A::CryoDendro, D::Pyro) => (A::Dendro, Some(R::Melt)),
        (A::CryoDendro, D::Electro) => (A::Dendro, Some(R::Superconduct)),
        (A::CryoDendro, D::Anemo) => (A::Dendro, Some(R::SwirlCryo)),
        (A::CryoDendro, D::Geo) => (A::Dendro, Some(R::CrystallizeCryo)),
    }
}

/// Flat bonus a reaction adds before the multiplier stage.
pub fn reaction_bonus(reaction: Reaction) -> i64 {
    match reaction {
        Reaction::Melt | Reaction::Vaporize | Reaction::Overloaded => 2,
        Reaction::SwirlCryo
        | Reaction::SwirlHydro
        | Reaction::SwirlPyro
        | Reaction::SwirlElectro => 0,
        _ => 1,
    }
}

/// Health after taking `value`, clamped to `[0, max_health]`.
pub fn settle_health(health: i64, max_health: i64, value: i64) -> i64 {
    (health - value).clamp(0, max_health.max(0))
}

/// What a reaction does once its damage has landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionEffect {
    None,
    /// The target's side switches to its next character.
    ForceSwitchNext,
    /// One piercing damage to every other character on the target's side.
    PierceOthers,
    /// One damage of this type to every other character on the target's side.
    SpreadOthers(DamageType),
    /// Attach a status to the target character.
    TargetStatus(ReactionEntity),
    /// Add a combat status on the attacker's side.
    AttackerCombatStatus(ReactionEntity),
    /// Summon on the attacker's side.
    AttackerSummon(ReactionEntity),
}

pub fn reaction_effect(reaction: Reaction) -> ReactionEffect {
    match reaction {
        Reaction::Melt | Reaction::Vaporize => ReactionEffect::None,
        Reaction::Overloaded => ReactionEffect::ForceSwitchNext,
        Reaction::Superconduct | Reaction::ElectroCharged => ReactionEffect::PierceOthers,
        Reaction::Frozen => ReactionEffect::TargetStatus(ReactionEntity::Frozen),
        Reaction::SwirlCryo => ReactionEffect::SpreadOthers(DamageType::Cryo),
        Reaction::SwirlHydro => ReactionEffect::SpreadOthers(DamageType::Hydro),
        Reaction::SwirlPyro => ReactionEffect::SpreadOthers(DamageType::Pyro),
        Reaction::SwirlElectro => ReactionEffect::SpreadOthers(DamageType::Electro),
        Reaction::CrystallizeCryo
        | Reaction::CrystallizeHydro
        | Reaction::CrystallizePyro
        | Reaction::CrystallizeElectro => {
            ReactionEffect::AttackerCombatStatus(ReactionEntity::CrystallizeShield)
        }
        Reaction::Burning => ReactionEffect::AttackerSummon(ReactionEntity::BurningFlame),
        Reaction::Bloom => ReactionEffect::AttackerCombatStatus(ReactionEntity::DendroCore),
        Reaction::Quicken => ReactionEffect::AttackerCombatStatus(ReactionEntity::CatalyzingField),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hydro_aura_with_pyro_vaporizes() {
        assert_eq!(
            reaction_of(Aura::Hydro, DamageType::Pyro),
            (Aura::None, Some(Reaction::Vaporize))
        );
        assert_eq!(reaction_bonus(Reaction::Vaporize), 2);
    }

    #[test]
    fn physical_and_piercing_never_touch_aura() {
        for aura in [Aura::None, Aura::Pyro, Aura::CryoDendro] {
            assert_eq!(reaction_of(aura, DamageType::Physical), (aura, None));
            assert_eq!(reaction_of(aura, DamageType::Piercing), (aura, None));
        }
    }

    #[test]
    fn cryo_and_dendro_coexist() {
        assert_eq!(reaction_of(Aura::Cryo, DamageType::Dendro), (Aura::CryoDendro, None));
        assert_eq!(
            reaction_of(Aura::CryoDendro, DamageType::Pyro),
            (Aura::Dendro, Some(Reaction::Melt))
        );
    }

    #[test]
    fn anemo_and_geo_do_not_stick() {
        assert_eq!(reaction_of(Aura::None, DamageType::Anemo), (Aura::None, None));
        assert_eq!(reaction_of(Aura::None, DamageType::Geo), (Aura::None, None));
        assert_eq!(reaction_bonus(Reaction::SwirlPyro), 0);
    }

    #[test]
    fn health_settles_in_range() {
        assert_eq!(settle_health(4, 10, 5), 0);
        assert_eq!(settle_health(10, 10, 6), 4);
        assert_eq!(settle_health(8, 10, -5), 10);
    }
}

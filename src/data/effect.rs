//! Building blocks for skill bodies and filters.
//!
//! Catalogues are written by composing these instead of hand-writing a
//! closure for every card. Each helper returns a ready [`SkillAction`] or
//! [`SkillFilter`].

use super::definition::{SkillAction, SkillFilter};
use crate::error::EngineError;
use crate::skill::context::Target;
use crate::skill::{EventArg, Request};
use crate::state::entity::{Caller, DefinitionId, EntityArea, SkillId, VarName};
use crate::state::types::DamageType;
use crate::state::GameState;
use std::sync::Arc;

pub fn deal_damage(damage_type: DamageType, value: i64, target: Target) -> SkillAction {
    Arc::new(move |ctx, _| ctx.damage(damage_type, value, target))
}

pub fn heal(value: i64, target: Target) -> SkillAction {
    Arc::new(move |ctx, _| ctx.heal(value, target))
}

pub fn gain_energy(value: i64, target: Target) -> SkillAction {
    Arc::new(move |ctx, _| ctx.gain_energy(value, target))
}

pub fn add_status(definition: DefinitionId, target: Target) -> SkillAction {
    Arc::new(move |ctx, _| ctx.add_status(definition, target))
}

/// Combat status on the caller's side.
pub fn combat_status(definition: DefinitionId) -> SkillAction {
    Arc::new(move |ctx, _| {
        let who = ctx.who();
        ctx.combat_status(definition, who).map(|_| ())
    })
}

pub fn summon(definition: DefinitionId) -> SkillAction {
    Arc::new(move |ctx, _| ctx.summon(definition).map(|_| ()))
}

/// Run several bodies one after another on the same context.
pub fn sequence(actions: Vec<SkillAction>) -> SkillAction {
    Arc::new(move |ctx, arg| {
        for action in &actions {
            action(ctx, arg)?;
        }
        Ok(())
    })
}

pub fn increase_damage(value: i64) -> SkillAction {
    Arc::new(move |_, arg| match arg {
        EventArg::ModifyDamage(m) => {
            m.increase_damage(value);
            Ok(())
        }
        _ => Err(EngineError::internal("increase_damage used outside a damage modifier")),
    })
}

pub fn multiply_damage(num: i64, den: i64) -> SkillAction {
    Arc::new(move |_, arg| match arg {
        EventArg::ModifyDamage(m) => {
            m.multiply_damage(num, den);
            Ok(())
        }
        _ => Err(EngineError::internal("multiply_damage used outside a damage modifier")),
    })
}

/// Shield behaviour: absorb up to the caller's usage, spending what was used.
pub fn absorb_damage_with_usage() -> SkillAction {
    Arc::new(move |ctx, arg| {
        let absorbed = match arg {
            EventArg::ModifyDamage(m) => {
                let usage = ctx.caller_variable(&VarName::Usage);
                let absorbed = usage.min(m.final_value()).max(0);
                m.decrease_damage(absorbed);
                absorbed
            }
            _ => return Err(EngineError::internal("shield used outside a damage modifier")),
        };
        if absorbed > 0 {
            ctx.consume_usage(absorbed)?;
        }
        Ok(())
    })
}

/// Reduce incoming damage by a flat amount and spend one usage.
pub fn decrease_damage_and_consume(value: i64) -> SkillAction {
    Arc::new(move |ctx, arg| {
        match arg {
            EventArg::ModifyDamage(m) => m.decrease_damage(value),
            _ => return Err(EngineError::internal("decrease_damage used outside a damage modifier")),
        }
        ctx.consume_usage(1)
    })
}

pub fn consume_usage(count: i64) -> SkillAction {
    Arc::new(move |ctx, _| ctx.consume_usage(count))
}

pub fn dispose_self() -> SkillAction {
    Arc::new(|ctx, _| {
        let id = ctx.caller_id();
        ctx.dispose(id)
    })
}

/// Keep a character from being defeated, leaving it at `health`.
pub fn immune_to_defeat(health: i64) -> SkillAction {
    Arc::new(move |_, arg| match arg {
        EventArg::ZeroHealth(z) => {
            z.immune(health);
            Ok(())
        }
        _ => Err(EngineError::internal("immune_to_defeat used outside a zero health check")),
    })
}

/// Ask the executor to run another skill on behalf of the caller.
pub fn request_use_skill(skill: SkillId) -> SkillAction {
    Arc::new(move |ctx, _| {
        let who = ctx.who();
        let requested_by = Box::new(ctx.info().clone());
        ctx.request(Request::UseSkill {
            who,
            skill,
            requested_by,
        });
        Ok(())
    })
}

pub fn always() -> SkillFilter {
    Arc::new(|_, _, _| true)
}

/// The event concerns the caller's side.
pub fn on_my_side() -> SkillFilter {
    Arc::new(|_, info, arg| arg.who() == Some(info.who))
}

pub fn is_my_turn() -> SkillFilter {
    Arc::new(|state, info, _| state.current_turn == info.who)
}

/// Damage (not heal) aimed at the character the caller is attached to, or
/// at the caller itself when the caller is a character.
pub fn damage_to_own_character() -> SkillFilter {
    Arc::new(|state, info, arg| {
        let damage = match arg.damage() {
            Some(d) if !d.is_heal() => d,
            _ => return false,
        };
        owner_character(state, &info.caller) == Some(damage.target)
    })
}

/// Damage aimed at the caller's side, any character.
pub fn damage_to_my_side() -> SkillFilter {
    Arc::new(|_, info, arg| match arg.damage() {
        Some(d) => !d.is_heal() && d.target_who == info.who,
        None => false,
    })
}

/// Damage dealt by the caller itself or by the character it is attached to.
pub fn damage_from_self() -> SkillFilter {
    Arc::new(|state, info, arg| match arg.damage() {
        Some(d) => {
            d.source == info.caller_id() || owner_character(state, &info.caller) == Some(d.source)
        }
        None => false,
    })
}

fn owner_character(state: &GameState, caller: &Caller) -> Option<crate::state::entity::EntityId> {
    match caller {
        Caller::Character(c) => Some(c.id),
        Caller::Entity(e) => match state.find_entity(e.id) {
            Some((EntityArea::Character { character_id, .. }, _)) => Some(character_id),
            _ => None,
        },
        Caller::Card(_) => None,
    }
}

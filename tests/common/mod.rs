// Shared fixtures: a small catalogue and scripted players.
#![allow(dead_code)]

use rocket::futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use tcg_rules_core::data::definition::{
    CardDefinition, CardKind, CharacterDefinition, EntityDefinition, EntityKind, SkillAction,
    SkillDefinition, SkillKind,
};
use tcg_rules_core::data::{effect, TAG_DISABLE_SKILL};
use tcg_rules_core::io::expose::ExposedActionKind;
use tcg_rules_core::io::RpcMethod;
use tcg_rules_core::skill::context::{SkillContext, Target};
use tcg_rules_core::mutator::MutationSink;
use tcg_rules_core::skill::{EventArg, EventName, Request};
use tcg_rules_core::state::entity::VarName;
use tcg_rules_core::state::types::{DamageType, DiceType};
use tcg_rules_core::{Deck, GameData, Notification, PlayerIo, RpcRequest, RpcResponse};

pub const PYRO_FIGHTER: u32 = 1;
pub const HYDRO_FIGHTER: u32 = 2;
pub const STRIKE: u32 = 11;
pub const FLAME: u32 = 12;
pub const SHAPESHIFT: u32 = 13;
pub const SPLASH: u32 = 22;
pub const MENDING: u32 = 31;
pub const SCOUTING: u32 = 32;
pub const SHIELD_UP: u32 = 41;
pub const DOUBLE_UP: u32 = 42;
pub const LAST_STAND: u32 = 43;
pub const BRACE: u32 = 44;
pub const HAND_WATCH: u32 = 45;
pub const END_TICK: u32 = 46;
pub const DAMAGE_MIX: u32 = 51;
pub const DOUBLE_KNOCKOUT: u32 = 52;
pub const ECHO_STRIKE: u32 = 53;
pub const PICK_CARD: u32 = 54;
pub const ASK_DICE_AND_HAND: u32 = 55;
pub const RING_TICKER: u32 = 56;
pub const MENDING_CARD: u32 = 101;
pub const SCOUT_CARD: u32 = 102;
pub const SHIELD_STATUS: u32 = 201;
pub const DOUBLING_STATUS: u32 = 202;
pub const LAST_STAND_STATUS: u32 = 203;
pub const BRACE_STATUS: u32 = 204;
pub const SEALED_STATUS: u32 = 205;
pub const WATCH_STATUS: u32 = 206;
pub const TICKER_STATUS: u32 = 207;

pub fn catalogue() -> Arc<GameData> {
    let mut data = GameData::new();
    data.register_skill(SkillDefinition::initiative(
        STRIKE,
        SkillKind::Normal,
        vec![DiceType::Void],
        effect::deal_damage(DamageType::Physical, 3, Target::OppActive),
    ));
    data.register_skill(SkillDefinition::initiative(
        FLAME,
        SkillKind::Elemental,
        vec![DiceType::Pyro, DiceType::Pyro, DiceType::Pyro],
        effect::deal_damage(DamageType::Pyro, 3, Target::OppActive),
    ));
    data.register_skill(SkillDefinition::initiative(
        SPLASH,
        SkillKind::Elemental,
        vec![DiceType::Hydro, DiceType::Hydro, DiceType::Hydro],
        effect::deal_damage(DamageType::Hydro, 2, Target::OppActive),
    ));
    data.register_skill(SkillDefinition::plain(MENDING, effect::heal(1, Target::MyActive)));
    let scouting: SkillAction = Arc::new(|ctx: &mut SkillContext, _: &mut EventArg| {
        let who = ctx.who();
        ctx.draw_cards(who, 1)
    });
    data.register_skill(SkillDefinition::plain(SCOUTING, scouting));
    data.register_skill(SkillDefinition::plain(
        DAMAGE_MIX,
        effect::sequence(vec![
            effect::deal_damage(DamageType::Physical, 6, Target::OppActive),
            effect::deal_damage(DamageType::Pyro, 5, Target::OppActive),
        ]),
    ));
    let shapeshift: SkillAction = Arc::new(|ctx: &mut SkillContext, _: &mut EventArg| {
        let me = ctx.caller_id();
        ctx.transform_definition(me, HYDRO_FIGHTER)
    });
    data.register_skill(SkillDefinition::initiative(SHAPESHIFT, SkillKind::Normal, vec![], shapeshift));
    data.register_skill(SkillDefinition::plain(
        DOUBLE_KNOCKOUT,
        effect::sequence(vec![
            effect::deal_damage(DamageType::Piercing, 20, Target::OppActive),
            effect::deal_damage(DamageType::Piercing, 20, Target::MyActive),
        ]),
    ));
    data.register_skill(SkillDefinition::plain(ECHO_STRIKE, effect::request_use_skill(STRIKE)));
    let pick: SkillAction = Arc::new(|ctx: &mut SkillContext, _: &mut EventArg| {
        let who = ctx.who();
        ctx.request(Request::SelectCard {
            who,
            candidates: vec![MENDING_CARD, SCOUT_CARD],
        });
        Ok(())
    });
    data.register_skill(SkillDefinition::plain(PICK_CARD, pick));
    let ask: SkillAction = Arc::new(|ctx: &mut SkillContext, _: &mut EventArg| {
        let who = ctx.who();
        ctx.request(Request::Reroll { who, times: 1 });
        ctx.request(Request::SwitchHands { who });
        Ok(())
    });
    data.register_skill(SkillDefinition::plain(ASK_DICE_AND_HAND, ask));
    let ring: SkillAction = Arc::new(|ctx: &mut SkillContext, _: &mut EventArg| {
        let who = ctx.who();
        let ticker = ctx
            .state()
            .player(who)
            .combat_statuses
            .iter()
            .find(|e| e.definition == TICKER_STATUS)
            .map(|e| e.id);
        if let Some(entity) = ticker {
            ctx.request(Request::TriggerEndPhaseSkill { who, entity });
        }
        Ok(())
    });
    data.register_skill(SkillDefinition::plain(RING_TICKER, ring));
    // a listener that wounds its own bearer while the damage is being modified
    let brace: SkillAction = Arc::new(|ctx: &mut SkillContext, arg: &mut EventArg| {
        match arg.damage().map(|d| d.target) {
            Some(target) => ctx.add_variable(target, VarName::Health, -2),
            None => Ok(()),
        }
    });
    data.register_skill(
        SkillDefinition::triggered(BRACE, EventName::ModifyDamage1, brace).with_filter(effect::damage_to_own_character()),
    );
    data.register_skill(
        SkillDefinition::triggered(HAND_WATCH, EventName::OnHandCard, effect::gain_energy(1, Target::MyActive))
            .with_filter(effect::on_my_side()),
    );
    data.register_skill(SkillDefinition::triggered(
        END_TICK,
        EventName::OnEndPhase,
        effect::gain_energy(1, Target::MyActive),
    ));
    data.register_skill(
        SkillDefinition::triggered(SHIELD_UP, EventName::ModifyDamage3, effect::absorb_damage_with_usage())
            .with_filter(effect::damage_to_my_side()),
    );
    data.register_skill(
        SkillDefinition::triggered(DOUBLE_UP, EventName::ModifyDamage2, effect::multiply_damage(2, 1))
            .with_filter(effect::damage_from_self()),
    );
    data.register_skill(
        SkillDefinition::triggered(LAST_STAND, EventName::ModifyZeroHealth, effect::sequence(vec![
            effect::immune_to_defeat(1),
            effect::dispose_self(),
        ]))
        .with_filter(effect::damage_to_own_character()),
    );

    data.register_character(
        CharacterDefinition::new(PYRO_FIGHTER, "Pyro Fighter", DiceType::Pyro, 10, 2)
            .with_initiative_skill(STRIKE)
            .with_initiative_skill(FLAME),
    );
    data.register_character(
        CharacterDefinition::new(HYDRO_FIGHTER, "Hydro Fighter", DiceType::Hydro, 10, 2)
            .with_initiative_skill(STRIKE)
            .with_initiative_skill(SPLASH),
    );
    data.register_card(CardDefinition::new(MENDING_CARD, "Mending", CardKind::Event, vec![], MENDING));
    data.register_card(CardDefinition::new(SCOUT_CARD, "Scout", CardKind::Event, vec![DiceType::Void], SCOUTING));
    data.register_entity(EntityDefinition::new(SHIELD_STATUS, EntityKind::CombatStatus).with_skill(SHIELD_UP).with_usage(2));
    data.register_entity(EntityDefinition::new(DOUBLING_STATUS, EntityKind::Status).with_skill(DOUBLE_UP));
    data.register_entity(EntityDefinition::new(LAST_STAND_STATUS, EntityKind::Status).with_skill(LAST_STAND));
    data.register_entity(EntityDefinition::new(BRACE_STATUS, EntityKind::Status).with_skill(BRACE));
    data.register_entity(EntityDefinition::new(SEALED_STATUS, EntityKind::Status).with_tag(TAG_DISABLE_SKILL));
    data.register_entity(EntityDefinition::new(WATCH_STATUS, EntityKind::CombatStatus).with_skill(HAND_WATCH));
    data.register_entity(EntityDefinition::new(TICKER_STATUS, EntityKind::CombatStatus).with_skill(END_TICK));
    Arc::new(data)
}

pub fn deck() -> Deck {
    Deck {
        characters: vec![PYRO_FIGHTER, HYDRO_FIGHTER, PYRO_FIGHTER],
        cards: vec![MENDING_CARD; 10],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Use the first offered skill, otherwise declare end.
    Attack,
    DeclareEnd,
    /// The channel breaks when asked for an action.
    BreakOnAction,
    /// Answers an action request with an index that was never offered.
    BadIndex,
}

pub struct ScriptedBot {
    strategy: Strategy,
    pub notifications: Mutex<Vec<Notification>>,
    pub calls: Mutex<Vec<RpcMethod>>,
    pub io_errors: Mutex<usize>,
}

impl ScriptedBot {
    pub fn new(strategy: Strategy) -> Arc<Self> {
        Arc::new(ScriptedBot {
            strategy,
            notifications: Mutex::new(vec![]),
            calls: Mutex::new(vec![]),
            io_errors: Mutex::new(0),
        })
    }

    fn answer(&self, request: &RpcRequest) -> Result<RpcResponse, String> {
        let actions = match request {
            RpcRequest::Action { actions, .. } => actions,
            other => return Ok(other.fallback()),
        };
        let declare_end = actions
            .iter()
            .position(|a| a.kind == ExposedActionKind::DeclareEnd)
            .ok_or("no declare end offered")?;
        match self.strategy {
            Strategy::BreakOnAction => Err("connection reset".to_string()),
            Strategy::BadIndex => Ok(RpcResponse::Action {
                chosen_action_index: actions.len() + 3,
                used_dice: vec![],
            }),
            Strategy::DeclareEnd => Ok(RpcResponse::Action {
                chosen_action_index: declare_end,
                used_dice: vec![],
            }),
            Strategy::Attack => {
                let chosen = actions
                    .iter()
                    .position(|a| matches!(a.kind, ExposedActionKind::UseSkill { .. }))
                    .unwrap_or(declare_end);
                Ok(RpcResponse::Action {
                    chosen_action_index: chosen,
                    used_dice: actions[chosen].auto_selected_dice.clone(),
                })
            }
        }
    }
}

impl PlayerIo for ScriptedBot {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().expect("notifications").push(notification);
    }

    fn rpc(&self, request: RpcRequest) -> BoxFuture<'static, Result<RpcResponse, String>> {
        self.calls.lock().expect("calls").push(request.method());
        let answer = self.answer(&request);
        Box::pin(async move { answer })
    }

    fn on_io_error(&self, _error: &tcg_rules_core::EngineError) {
        *self.io_errors.lock().expect("io errors") += 1;
    }
}

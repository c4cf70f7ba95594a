// Property tests for dice payment and damage settlement.
use proptest::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tcg_rules_core::data::definition::{CharacterDefinition, SkillDefinition, SkillKind};
use tcg_rules_core::data::effect;
use tcg_rules_core::dice::{check_dice, contains_all, select_dice_for_cost};
use tcg_rules_core::executor::SkillExecutor;
use tcg_rules_core::mutator::{MutationSink, PreviewHooks, StateMutator};
use tcg_rules_core::skill::context::Target;
use tcg_rules_core::skill::{EventArg, SkillInfo};
use tcg_rules_core::state::entity::{Caller, VarName};
use tcg_rules_core::state::mutation::Mutation;
use tcg_rules_core::state::types::{DamageType, DiceType};
use tcg_rules_core::{GameConfig, GameData, GameState, Phase, Who};

fn face() -> impl Strategy<Value = DiceType> {
    prop::sample::select(DiceType::rollable().to_vec())
}

fn cost_entry() -> impl Strategy<Value = DiceType> {
    prop::sample::select(vec![DiceType::Void, DiceType::Pyro, DiceType::Aligned, DiceType::Omni])
}

/// Health left on the target after one physical hit of `value`.
fn hit(health: i64, value: i64) -> (i64, bool, GameState) {
    let mut data = GameData::new();
    data.register_skill(SkillDefinition::initiative(
        1,
        SkillKind::Normal,
        vec![],
        effect::deal_damage(DamageType::Physical, value, Target::OppActive),
    ));
    data.register_character(CharacterDefinition::new(1, "Fighter", DiceType::Geo, 10, 2).with_initiative_skill(1));
    let state = GameState::new(Arc::new(data), GameConfig::with_seed(2));
    let mut m = StateMutator::new(state, Arc::new(PreviewHooks), Arc::new(AtomicBool::new(false)));
    let attacker = m.create_character(Who::First, 1).expect("attacker");
    let target = m.create_character(Who::Second, 1).expect("target");
    m.create_character(Who::Second, 1).expect("reserve");
    for (who, to) in [(Who::First, attacker), (Who::Second, target)] {
        m.mutate(Mutation::SwitchActive { who, to }).expect("switch");
    }
    m.mutate(Mutation::ChangePhase { new_phase: Phase::Action }).expect("phase");
    m.mutate(Mutation::ModifyEntityVar {
        entity: target,
        var: VarName::Health,
        value: health,
    })
    .expect("health");

    let caller = Caller::Character(m.state().character(attacker).expect("attacker").1.clone());
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime");
    runtime
        .block_on(SkillExecutor::execute_skill(
            &mut m,
            SkillInfo::new(Who::First, caller, 1),
            EventArg::None,
            None,
        ))
        .expect("skill");
    let state = m.into_state();
    let (_, c) = state.character(target).expect("target");
    let (left, alive) = (c.health(), c.alive());
    (left, alive, state)
}

proptest! {
    #[test]
    fn selected_dice_always_pay(
        cost in prop::collection::vec(cost_entry(), 0..5),
        dice in prop::collection::vec(face(), 0..10),
    ) {
        if let Some(used) = select_dice_for_cost(&cost, &dice, Some(DiceType::Pyro)) {
            prop_assert!(contains_all(&dice, &used));
            prop_assert!(check_dice(&cost, &used));
        }
    }

    #[test]
    fn damage_never_leaves_health_out_of_range(health in 1i64..=10, value in 0i64..15) {
        let (left, alive, state) = hit(health, value);
        prop_assert_eq!(left, (health - value).max(0));
        prop_assert_eq!(alive, value < health);
        prop_assert_eq!(state.player(Who::Second).flags.has_defeated, value >= health);
    }
}

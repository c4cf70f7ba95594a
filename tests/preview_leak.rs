// Action previews forecast outcomes without leaking hidden cards.
mod common;

use common::*;
use tcg_rules_core::data::HIDDEN_CARD;
use tcg_rules_core::game::actions::{available_actions, ActionInfo, ActionKind};
use tcg_rules_core::mutator::{MutationSink, StateMutator};
use tcg_rules_core::preview::ActionPreviewer;
use tcg_rules_core::state::entity::{CardArea, EntityId};
use tcg_rules_core::state::mutation::Mutation;
use tcg_rules_core::state::types::DiceType;
use tcg_rules_core::{GameConfig, GameState, Phase, PlayerConfig, Who};

fn board() -> (GameState, EntityId) {
    let state = GameState::new(catalogue(), GameConfig::with_seed(17));
    let mut m = StateMutator::for_preview(&state);
    let mine = m.create_character(Who::First, PYRO_FIGHTER).expect("character");
    let theirs = m.create_character(Who::Second, HYDRO_FIGHTER).expect("character");
    m.create_card(Who::First, SCOUT_CARD, CardArea::Hands, None).expect("hand");
    for def in [MENDING_CARD, SCOUT_CARD] {
        m.create_card(Who::First, def, CardArea::Pile, None).expect("pile");
    }
    m.create_card(Who::Second, MENDING_CARD, CardArea::Hands, None).expect("hand");
    m.create_card(Who::Second, MENDING_CARD, CardArea::Pile, None).expect("pile");
    m.mutate(Mutation::SwitchActive { who: Who::First, to: mine }).expect("switch");
    m.mutate(Mutation::SwitchActive { who: Who::Second, to: theirs }).expect("switch");
    m.mutate(Mutation::ChangePhase { new_phase: Phase::Action }).expect("phase");
    m.mutate(Mutation::ResetDice {
        who: Who::First,
        dice: vec![DiceType::Omni, DiceType::Pyro, DiceType::Geo],
    })
    .expect("dice");
    (m.into_state(), theirs)
}

fn offered(state: &GameState, pred: impl Fn(&ActionKind) -> bool) -> ActionInfo {
    available_actions(state, Who::First, PlayerConfig::default())
        .expect("actions")
        .into_iter()
        .find(|a| pred(&a.kind))
        .expect("action offered")
}

#[tokio::test]
async fn drawn_cards_stay_hidden_in_the_forecast() {
    let (state, _) = board();
    let scout = offered(&state, |k| matches!(k, ActionKind::PlayCard { .. }));
    let shown = ActionPreviewer::new(&state, Who::First)
        .modify_and_preview(scout, true)
        .await
        .expect("preview")
        .expect("affordable");
    assert_eq!(shown.auto_selected_dice, vec![DiceType::Geo]);

    let forecast = shown.preview.expect("forecast attached");
    let mine = forecast.player(Who::First);
    assert_eq!(mine.hands.len(), 1);
    assert!(mine.hands.iter().all(|c| c.definition == HIDDEN_CARD));
    assert_eq!(mine.piles.len(), 1);
    assert!(mine.piles.iter().all(|c| c.definition == HIDDEN_CARD));
    assert_eq!(mine.dice, vec![DiceType::Omni, DiceType::Pyro]);
    assert!(forecast
        .player(Who::Second)
        .hands
        .iter()
        .all(|c| c.definition == HIDDEN_CARD));
}

#[tokio::test]
async fn previews_leave_the_real_snapshot_alone() {
    let (state, theirs) = board();
    let before_steps = state.iterators.random_steps;
    let strike = offered(&state, |k| matches!(k, ActionKind::UseSkill { skill, .. } if *skill == STRIKE));
    let shown = ActionPreviewer::new(&state, Who::First)
        .modify_and_preview(strike, true)
        .await
        .expect("preview")
        .expect("affordable");

    let forecast = shown.preview.expect("forecast attached");
    let (_, target) = forecast.character(theirs).expect("target");
    assert_eq!(target.health(), 7);

    let (_, untouched) = state.character(theirs).expect("target");
    assert_eq!(untouched.health(), 10);
    assert_eq!(state.iterators.random_steps, before_steps);
    assert_eq!(state.player(Who::First).hands[0].definition, SCOUT_CARD);
}

#[tokio::test]
async fn unaffordable_actions_are_dropped() {
    let (state, _) = board();
    let flame = offered(&state, |k| matches!(k, ActionKind::UseSkill { skill, .. } if *skill == FLAME));
    let shown = ActionPreviewer::new(&state, Who::First)
        .modify_and_preview(flame, false)
        .await
        .expect("preview");
    // three pyro cannot be paid from omni, pyro and geo
    assert!(shown.is_none());
}

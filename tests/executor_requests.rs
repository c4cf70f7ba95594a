// Requests raised by skills and the player decisions they lead to.
mod common;

use common::*;
use rocket::futures::future::BoxFuture;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tcg_rules_core::executor::SkillExecutor;
use tcg_rules_core::mutator::{MutationSink, MutatorHooks, PendingItem, StateMutator};
use tcg_rules_core::skill::{EventArg, SkillInfo};
use tcg_rules_core::state::entity::{Caller, DefinitionId, EntityArea, EntityId};
use tcg_rules_core::state::mutation::Mutation;
use tcg_rules_core::state::types::DiceType;
use tcg_rules_core::{EngineResult, GameConfig, GameState, Phase, Who};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    ChooseActive(Who),
    Reroll(Who),
    SwitchHands(Who),
    SelectCard(Who),
}

/// Answers every decision with the last candidate (or nothing) and records
/// who was asked what, in order.
#[derive(Default)]
struct RecordingHooks {
    calls: Mutex<Vec<Call>>,
}

impl RecordingHooks {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls").clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls").push(call);
    }
}

impl MutatorHooks for RecordingHooks {
    fn on_notify(&self, _state: &GameState, _pending: &[PendingItem]) {}

    fn choose_active(
        &self,
        who: Who,
        _state: &GameState,
        candidates: Vec<EntityId>,
    ) -> BoxFuture<'static, EngineResult<EntityId>> {
        self.record(Call::ChooseActive(who));
        let last = candidates.last().copied().unwrap_or_default();
        Box::pin(async move { Ok(last) })
    }

    fn reroll(&self, who: Who, _state: &GameState) -> BoxFuture<'static, EngineResult<Vec<DiceType>>> {
        self.record(Call::Reroll(who));
        Box::pin(async { Ok(vec![]) })
    }

    fn switch_hands(&self, who: Who, _state: &GameState) -> BoxFuture<'static, EngineResult<Vec<EntityId>>> {
        self.record(Call::SwitchHands(who));
        Box::pin(async { Ok(vec![]) })
    }

    fn select_card(
        &self,
        who: Who,
        _state: &GameState,
        candidates: Vec<DefinitionId>,
    ) -> BoxFuture<'static, EngineResult<DefinitionId>> {
        self.record(Call::SelectCard(who));
        let last = candidates.last().copied().unwrap_or_default();
        Box::pin(async move { Ok(last) })
    }
}

struct Table {
    m: StateMutator,
    hooks: Arc<RecordingHooks>,
    first: Vec<EntityId>,
    second: Vec<EntityId>,
}

fn table(per_side: usize) -> Table {
    let hooks = Arc::new(RecordingHooks::default());
    let state = GameState::new(catalogue(), GameConfig::with_seed(31));
    let mut m = StateMutator::new(state, hooks.clone(), Arc::new(AtomicBool::new(false)));
    let first: Vec<EntityId> = (0..per_side)
        .map(|_| m.create_character(Who::First, PYRO_FIGHTER).expect("character"))
        .collect();
    let second: Vec<EntityId> = (0..per_side)
        .map(|_| m.create_character(Who::Second, HYDRO_FIGHTER).expect("character"))
        .collect();
    m.mutate(Mutation::SwitchActive { who: Who::First, to: first[0] }).expect("switch");
    m.mutate(Mutation::SwitchActive { who: Who::Second, to: second[0] }).expect("switch");
    m.mutate(Mutation::ChangePhase { new_phase: Phase::Action }).expect("phase");
    Table { m, hooks, first, second }
}

fn caster(state: &GameState, id: EntityId) -> Caller {
    Caller::Character(state.character(id).expect("caster").1.clone())
}

async fn cast(m: &mut StateMutator, caster_id: EntityId, skill: u32) {
    let info = SkillInfo::new(Who::First, caster(m.state(), caster_id), skill);
    SkillExecutor::execute_skill(m, info, EventArg::None, None)
        .await
        .expect("skill");
}

fn health(state: &GameState, id: EntityId) -> i64 {
    state.character(id).expect("character").1.health()
}

#[tokio::test]
async fn requested_skill_runs_for_the_active_character() {
    let mut t = table(1);
    cast(&mut t.m, t.first[0], ECHO_STRIKE).await;
    assert_eq!(health(t.m.state(), t.second[0]), 7);
    let log = &t.m.state().player(Who::First).round_skill_log;
    assert_eq!(log.get(&PYRO_FIGHTER), Some(&vec![STRIKE]));
}

#[tokio::test]
async fn requested_skill_is_skipped_while_skills_are_disabled() {
    let mut t = table(1);
    let area = EntityArea::Character {
        who: Who::First,
        character_id: t.first[0],
    };
    t.m.create_entity(area, SEALED_STATUS).expect("create").expect("room");
    cast(&mut t.m, t.first[0], ECHO_STRIKE).await;
    assert_eq!(health(t.m.state(), t.second[0]), 10);
    assert!(t.m.state().player(Who::First).round_skill_log.is_empty());
}

#[tokio::test]
async fn previews_ignore_requests() {
    let t = table(1);
    let mut preview = StateMutator::for_preview(t.m.state());
    let info = SkillInfo::new(Who::First, caster(preview.state(), t.first[0]), ECHO_STRIKE).preview(true);
    SkillExecutor::execute_skill(&mut preview, info, EventArg::None, None)
        .await
        .expect("skill");
    assert_eq!(health(preview.state(), t.second[0]), 10);

    let mut preview = StateMutator::for_preview(t.m.state());
    let info = SkillInfo::new(Who::First, caster(preview.state(), t.first[0]), PICK_CARD).preview(true);
    SkillExecutor::execute_skill(&mut preview, info, EventArg::None, None)
        .await
        .expect("skill");
    assert!(preview.state().player(Who::First).hands.is_empty());
    assert!(t.hooks.calls().is_empty());
}

#[tokio::test]
async fn selected_card_lands_in_hand_and_is_announced() {
    let mut t = table(1);
    t.m.create_entity(EntityArea::CombatStatuses { who: Who::First }, WATCH_STATUS)
        .expect("create")
        .expect("room");
    cast(&mut t.m, t.first[0], PICK_CARD).await;

    let me = t.m.state().player(Who::First);
    assert_eq!(me.hands.len(), 1);
    assert_eq!(me.hands[0].definition, SCOUT_CARD);
    // the hand-card watcher charged the active character
    assert_eq!(t.m.state().character(t.first[0]).expect("active").1.energy(), 1);
    assert_eq!(t.hooks.calls(), vec![Call::SelectCard(Who::First)]);
}

#[tokio::test]
async fn dice_and_hand_requests_reach_the_player() {
    let mut t = table(1);
    cast(&mut t.m, t.first[0], ASK_DICE_AND_HAND).await;
    assert_eq!(
        t.hooks.calls(),
        vec![Call::Reroll(Who::First), Call::SwitchHands(Who::First)]
    );
}

#[tokio::test]
async fn end_phase_skill_can_be_triggered_on_request() {
    let mut t = table(1);
    t.m.create_entity(EntityArea::CombatStatuses { who: Who::First }, TICKER_STATUS)
        .expect("create")
        .expect("room");
    cast(&mut t.m, t.first[0], RING_TICKER).await;
    assert_eq!(t.m.state().character(t.first[0]).expect("active").1.energy(), 1);
}

#[tokio::test]
async fn both_sides_replace_fallen_actives_acting_side_first() {
    let mut t = table(3);
    cast(&mut t.m, t.first[0], DOUBLE_KNOCKOUT).await;

    let state = t.m.state();
    assert_eq!(state.phase, Phase::Action);
    assert_eq!(
        t.hooks.calls(),
        vec![Call::ChooseActive(Who::First), Call::ChooseActive(Who::Second)]
    );
    assert_eq!(state.player(Who::First).active_character_id, Some(t.first[2]));
    assert_eq!(state.player(Who::Second).active_character_id, Some(t.second[2]));
}

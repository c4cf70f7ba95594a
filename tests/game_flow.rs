// Whole matches driven by scripted players.
mod common;

use common::{catalogue, deck, ScriptedBot, Strategy};
use rocket::futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tcg_rules_core::data::HIDDEN_CARD;
use tcg_rules_core::game::PauseHandler;
use tcg_rules_core::state::types::DiceType;
use tcg_rules_core::{EngineError, Game, GameConfig, GameState, Phase, PlayerConfig, PlayerIo, Who};

fn game(config: GameConfig, first: Arc<ScriptedBot>, second: Arc<ScriptedBot>) -> Game {
    let players: [Arc<dyn PlayerIo>; 2] = [first, second];
    Game::new(catalogue(), config, [deck(), deck()], players, [PlayerConfig::default(); 2])
}

#[tokio::test]
async fn attacking_match_ends_with_the_first_player_winning() {
    let mut g = game(GameConfig::with_seed(7), ScriptedBot::new(Strategy::Attack), ScriptedBot::new(Strategy::Attack));
    let winner = g.start().await.expect("match");
    assert_eq!(winner, Some(Who::First));
    assert_eq!(g.state().phase, Phase::GameEnd);
    assert!(g.state().player(Who::Second).characters.iter().all(|c| !c.alive()));
    assert!(g.state().player(Who::First).characters.iter().any(|c| c.alive()));
}

#[tokio::test]
async fn same_seed_same_mutations() {
    let mut a = game(GameConfig::with_seed(99), ScriptedBot::new(Strategy::Attack), ScriptedBot::new(Strategy::Attack));
    let mut b = game(GameConfig::with_seed(99), ScriptedBot::new(Strategy::Attack), ScriptedBot::new(Strategy::Attack));
    a.start().await.expect("first run");
    b.start().await.expect("second run");
    let log_a = a.mutation_log().to_json_lines().expect("serialize");
    let log_b = b.mutation_log().to_json_lines().expect("serialize");
    assert!(!log_a.is_empty());
    assert_eq!(log_a, log_b);
}

#[tokio::test]
async fn replaying_the_log_rebuilds_the_final_board() {
    let config = GameConfig::with_seed(3);
    let mut g = game(config.clone(), ScriptedBot::new(Strategy::Attack), ScriptedBot::new(Strategy::Attack));
    g.start().await.expect("match");
    let replayed = g
        .mutation_log()
        .replay(&GameState::new(catalogue(), config))
        .expect("replay");
    assert_eq!(replayed.players, g.state().players);
    assert_eq!(replayed.winner, g.state().winner);
    assert_eq!(replayed.iterators, g.state().iterators);
}

#[tokio::test]
async fn passive_players_hit_the_round_limit() {
    let mut config = GameConfig::with_seed(11);
    config.max_rounds_count = 3;
    let mut g = game(config, ScriptedBot::new(Strategy::DeclareEnd), ScriptedBot::new(Strategy::DeclareEnd));
    let winner = g.start().await.expect("match");
    assert_eq!(winner, None);
    assert_eq!(g.state().round_number, 3);
    assert_eq!(g.state().phase, Phase::GameEnd);
}

#[tokio::test]
async fn broken_channel_forfeits_the_match() {
    let first = ScriptedBot::new(Strategy::BreakOnAction);
    let second = ScriptedBot::new(Strategy::Attack);
    let mut g = game(GameConfig::with_seed(5), first.clone(), second.clone());
    let winner = g.start().await.expect("a forfeit is not an engine failure");
    assert_eq!(winner, Some(Who::Second));
    assert_eq!(*first.io_errors.lock().expect("lock"), 1);
    assert_eq!(*second.io_errors.lock().expect("lock"), 1);
}

#[tokio::test]
async fn out_of_range_answer_forfeits_the_match() {
    let mut g = game(GameConfig::with_seed(5), ScriptedBot::new(Strategy::Attack), ScriptedBot::new(Strategy::BadIndex));
    assert_eq!(g.start().await.expect("match"), Some(Who::First));
}

#[tokio::test]
async fn a_match_starts_once() {
    let mut g = game(GameConfig::with_seed(8), ScriptedBot::new(Strategy::DeclareEnd), ScriptedBot::new(Strategy::Attack));
    g.start().await.expect("match");
    assert!(matches!(g.start().await, Err(EngineError::Internal(_))));
}

#[tokio::test]
async fn terminate_stops_at_the_next_checkpoint() {
    let mut g = game(GameConfig::with_seed(21), ScriptedBot::new(Strategy::Attack), ScriptedBot::new(Strategy::Attack));
    let handle = g.handle();
    let pauses = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pauses);
    let stopper = handle.clone();
    let pause: PauseHandler = Arc::new(move |_: &GameState| -> BoxFuture<'static, ()> {
        if counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
            stopper.terminate();
        }
        Box::pin(async {})
    });
    g = g.with_pause_handler(pause);

    let winner = g.start().await.expect("match");
    assert_eq!(winner, None);
    assert!(handle.is_terminated());
    assert_ne!(g.state().phase, Phase::GameEnd);
    assert_eq!(pauses.load(Ordering::SeqCst), 3);

    let frozen = g.mutation_log().len();
    handle.terminate();
    assert_eq!(g.mutation_log().len(), frozen);
    assert!(matches!(g.start().await, Err(EngineError::Internal(_))));
}

#[tokio::test]
async fn surrender_hands_the_win_to_the_other_side() {
    let mut g = game(GameConfig::with_seed(4), ScriptedBot::new(Strategy::Attack), ScriptedBot::new(Strategy::Attack));
    g.handle().give_up(Who::Second);
    assert_eq!(g.start().await.expect("match"), Some(Who::First));
}

#[tokio::test]
async fn notifications_keep_the_opponent_hidden() {
    let first = ScriptedBot::new(Strategy::Attack);
    let mut g = game(GameConfig::with_seed(12), first.clone(), ScriptedBot::new(Strategy::Attack));
    g.start().await.expect("match");

    let seen = first.notifications.lock().expect("lock");
    assert!(!seen.is_empty());
    for notification in seen.iter() {
        let opponent = &notification.state.players[Who::Second.index()];
        assert!(opponent.hands.iter().all(|c| c.definition_id == HIDDEN_CARD));
        assert!(opponent.dice.iter().all(|d| *d == DiceType::Void));
        for side in &notification.state.players {
            assert!(side.pile.iter().all(|c| c.definition_id == HIDDEN_CARD));
        }
    }
    let own_cards_shown = seen
        .iter()
        .any(|n| n.state.players[Who::First.index()].hands.iter().any(|c| c.definition_id != HIDDEN_CARD));
    assert!(own_cards_shown);
}

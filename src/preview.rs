//! Speculative execution of offered actions.
//!
//! A preview runs the real modifier and executor machinery against a
//! throwaway mutator: requests are skipped, nobody is notified and the real
//! snapshot and random cursor are untouched. The resulting state is then
//! redacted for the player who asked.

use crate::data::HIDDEN_CARD;
use crate::dice::select_dice_for_cost;
use crate::error::EngineResult;
use crate::game::actions::{active_element, perform_action, run_action_modifiers, ActionInfo, ActionKind};
use crate::mutator::StateMutator;
use crate::state::entity::EntityId;
use crate::state::{GameState, Who};
use std::collections::HashSet;

pub struct ActionPreviewer {
    state: GameState,
    who: Who,
}

impl ActionPreviewer {
    pub fn new(state: &GameState, who: Who) -> Self {
        ActionPreviewer {
            state: state.clone(),
            who,
        }
    }

    /// Apply cost modifiers to `action` and pick dice for it; with
    /// `with_preview`, also forecast its outcome. `None` when a modifier
    /// cancels the action or the player's dice cannot pay for it.
    pub async fn modify_and_preview(&self, action: ActionInfo, with_preview: bool) -> EngineResult<Option<ActionInfo>> {
        let mut mutator = StateMutator::for_preview(&self.state);
        let modified = run_action_modifiers(&mut mutator, action).await?;
        if !modified.completed {
            return Ok(None);
        }
        let mut action = modified.action;
        if !matches!(action.kind, ActionKind::ElementalTuning { .. }) {
            let dice = &self.state.player(self.who).dice;
            let element = active_element(&self.state, self.who)?;
            action.auto_selected_dice = match select_dice_for_cost(&action.cost, dice, element) {
                Some(chosen) => chosen,
                None => return Ok(None),
            };
        }
        if with_preview {
            perform_action(&mut mutator, &action, &action.auto_selected_dice).await?;
            let after = mutator.into_state();
            action.preview = Some(Box::new(redact_preview(&self.state, &after, self.who)));
        }
        Ok(Some(action))
    }
}

/// Hide what `who` may not learn from a forecast: every pile card, the
/// opponent's hand, and any own hand card that came out of the pile or
/// only appeared because the preview consumed randomness.
pub fn redact_preview(before: &GameState, after: &GameState, who: Who) -> GameState {
    let mut next = after.clone();
    let own_before = before.player(who);
    let was_in_pile: HashSet<EntityId> = own_before.piles.iter().map(|c| c.id).collect();
    let was_in_hand: HashSet<EntityId> = own_before.hands.iter().map(|c| c.id).collect();
    let random_moved = before.iterators.random_steps != after.iterators.random_steps;

    for side in Who::both() {
        let player = &mut next.players[side.index()];
        for card in player.piles.iter_mut() {
            card.definition = HIDDEN_CARD;
        }
        for card in player.hands.iter_mut() {
            let hidden = if side != who {
                true
            } else {
                was_in_pile.contains(&card.id) || (random_moved && !was_in_hand.contains(&card.id))
            };
            if hidden {
                card.definition = HIDDEN_CARD;
            }
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::data::GameData;
    use crate::state::entity::{CardArea, CardState};
    use crate::state::mutation::{apply_mutation, Mutation};
    use std::sync::Arc;

    fn card(id: EntityId, definition: u32) -> CardState {
        CardState { id, definition }
    }

    #[test]
    fn drawn_and_opponent_cards_are_hidden() {
        let mut before = GameState::new(Arc::new(GameData::new()), GameConfig::with_seed(5));
        before.players[0].hands = vec![card(1, 11)];
        before.players[0].piles = vec![card(2, 12), card(3, 13)];
        before.players[1].hands = vec![card(4, 14)];
        before.players[1].piles = vec![card(5, 15)];

        let after = apply_mutation(
            &before,
            &Mutation::TransferCard {
                who: Who::First,
                from: CardArea::Pile,
                to: CardArea::Hands,
                card: 2,
                target_index: None,
            },
        )
        .expect("draw");
        let redacted = redact_preview(&before, &after, Who::First);

        let own = &redacted.players[0];
        assert_eq!(own.hands.iter().find(|c| c.id == 1).map(|c| c.definition), Some(11));
        assert_eq!(own.hands.iter().find(|c| c.id == 2).map(|c| c.definition), Some(HIDDEN_CARD));
        assert!(own.piles.iter().all(|c| c.definition == HIDDEN_CARD));
        assert!(redacted.players[1].hands.iter().all(|c| c.definition == HIDDEN_CARD));
        assert!(redacted.players[1].piles.iter().all(|c| c.definition == HIDDEN_CARD));
        // the input snapshots are untouched
        assert_eq!(after.players[0].hands[1].definition, 12);
    }

    #[test]
    fn cards_generated_with_randomness_are_hidden() {
        let before = GameState::new(Arc::new(GameData::new()), GameConfig::with_seed(5));
        let mut after = apply_mutation(&before, &Mutation::StepRandom).expect("step");
        after.players[0].hands = vec![card(-9, 20)];
        let redacted = redact_preview(&before, &after, Who::First);
        assert_eq!(redacted.players[0].hands[0].definition, HIDDEN_CARD);

        let mut quiet = before.clone();
        quiet.players[0].hands = vec![card(-9, 20)];
        let shown = redact_preview(&before, &quiet, Who::First);
        assert_eq!(shown.players[0].hands[0].definition, 20);
    }
}

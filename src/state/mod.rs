//! Immutable match snapshot.
//!
//! A [`GameState`] is never edited in place once published: every change goes
//! through [`mutation::apply_mutation`], which returns a new value. Old
//! snapshots stay valid for diffing and for preview rollback.

pub mod entity;
pub mod mutation;
pub mod types;

use crate::config::GameConfig;
use crate::data::GameData;
use entity::{
    CardArea, CardState, Caller, CharacterState, DefinitionId, EntityArea, EntityId, EntityState,
    SkillId,
};
use rand::RngCore;
use rand::SeedableRng;
use rand_pcg::Lcg64Xsh32;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::collections::BTreeMap;
use std::sync::Arc;
use types::DiceType;

/// First id handed out by the engine; ids count down from here.
pub const INITIAL_ID: EntityId = -500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum Who {
    First,
    Second,
}

impl Who {
    pub fn index(self) -> usize {
        match self {
            Who::First => 0,
            Who::Second => 1,
        }
    }

    pub fn opposite(self) -> Who {
        match self {
            Who::First => Who::Second,
            Who::Second => Who::First,
        }
    }

    pub fn both() -> [Who; 2] {
        [Who::First, Who::Second]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum Phase {
    InitHands,
    InitActives,
    Roll,
    Action,
    End,
    GameEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum PlayerFlag {
    DeclaredEnd,
    HasDefeated,
    CanCharged,
    CanPlunging,
    LegendUsed,
    SkipNextTurn,
}

impl PlayerFlag {
    /// Flags reset at the end of every round.
    pub fn per_round() -> [PlayerFlag; 3] {
        [
            PlayerFlag::DeclaredEnd,
            PlayerFlag::HasDefeated,
            PlayerFlag::CanPlunging,
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerFlags {
    pub declared_end: bool,
    pub has_defeated: bool,
    pub can_charged: bool,
    pub can_plunging: bool,
    pub legend_used: bool,
    pub skip_next_turn: bool,
}

impl PlayerFlags {
    pub fn get(&self, flag: PlayerFlag) -> bool {
        match flag {
            PlayerFlag::DeclaredEnd => self.declared_end,
            PlayerFlag::HasDefeated => self.has_defeated,
            PlayerFlag::CanCharged => self.can_charged,
            PlayerFlag::CanPlunging => self.can_plunging,
            PlayerFlag::LegendUsed => self.legend_used,
            PlayerFlag::SkipNextTurn => self.skip_next_turn,
        }
    }

    pub fn set(&mut self, flag: PlayerFlag, value: bool) {
        let slot = match flag {
            PlayerFlag::DeclaredEnd => &mut self.declared_end,
            PlayerFlag::HasDefeated => &mut self.has_defeated,
            PlayerFlag::CanCharged => &mut self.can_charged,
            PlayerFlag::CanPlunging => &mut self.can_plunging,
            PlayerFlag::LegendUsed => &mut self.legend_used,
            PlayerFlag::SkipNextTurn => &mut self.skip_next_turn,
        };
        *slot = value;
    }
}

/// Shared cursors. The random generator only moves through the step-random
/// mutation, which keeps replays bit-identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iterators {
    pub random: Lcg64Xsh32,
    pub random_steps: u64,
    pub next_id: EntityId,
}

impl Iterators {
    pub fn new(seed: u64) -> Self {
        let seed_bytes: [u8; 16] = {
            let s = seed.to_le_bytes();
            let mut bytes = [0u8; 16];
            bytes[0..8].copy_from_slice(&s);
            bytes[8..16].copy_from_slice(&s);
            bytes
        };
        Iterators {
            random: Lcg64Xsh32::from_seed(seed_bytes),
            random_steps: 0,
            next_id: INITIAL_ID,
        }
    }

    /// The value the next step-random mutation will produce.
    pub fn peek_random(&self) -> u64 {
        self.random.clone().next_u64()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerState {
    pub active_character_id: Option<EntityId>,
    pub characters: Vec<CharacterState>,
    pub piles: Vec<CardState>,
    pub hands: Vec<CardState>,
    pub dice: Vec<DiceType>,
    pub combat_statuses: Vec<EntityState>,
    pub summons: Vec<EntityState>,
    pub supports: Vec<EntityState>,
    pub flags: PlayerFlags,
    /// Initiative skills used this round, keyed by the character definition
    /// the caller had when the skill started.
    pub round_skill_log: BTreeMap<DefinitionId, Vec<SkillId>>,
}

impl PlayerState {
    pub fn active_index(&self) -> Option<usize> {
        let id = self.active_character_id?;
        self.characters.iter().position(|c| c.id == id)
    }

    pub fn active_character(&self) -> Option<&CharacterState> {
        self.active_index().map(|i| &self.characters[i])
    }

    /// Characters in board order: the active one first, then the rest cyclically.
    pub fn characters_from_active(&self) -> Vec<&CharacterState> {
        let len = self.characters.len();
        let start = self.active_index().unwrap_or(0);
        (0..len)
            .map(|offset| &self.characters[(start + offset) % len])
            .collect()
    }

    pub fn alive_characters(&self) -> impl Iterator<Item = &CharacterState> {
        self.characters.iter().filter(|c| c.alive())
    }

    pub fn entities_in(&self, area: &EntityArea) -> Option<&Vec<EntityState>> {
        match area {
            EntityArea::Character { character_id, .. } => self
                .characters
                .iter()
                .find(|c| c.id == *character_id)
                .map(|c| &c.entities),
            EntityArea::CombatStatuses { .. } => Some(&self.combat_statuses),
            EntityArea::Summons { .. } => Some(&self.summons),
            EntityArea::Supports { .. } => Some(&self.supports),
        }
    }

    pub fn cards(&self, area: CardArea) -> &Vec<CardState> {
        match area {
            CardArea::Hands => &self.hands,
            CardArea::Pile => &self.piles,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub data: Arc<GameData>,
    pub config: GameConfig,
    pub iterators: Iterators,
    pub phase: Phase,
    pub current_turn: Who,
    pub round_number: u32,
    pub winner: Option<Who>,
    pub players: [PlayerState; 2],
}

impl GameState {
    /// Empty board; characters and decks are created by mutations so that a
    /// replay from this value reproduces the whole match.
    pub fn new(data: Arc<GameData>, config: GameConfig) -> Self {
        let iterators = Iterators::new(config.random_seed);
        GameState {
            data,
            config,
            iterators,
            phase: Phase::InitHands,
            current_turn: Who::First,
            round_number: 0,
            winner: None,
            players: [PlayerState::default(), PlayerState::default()],
        }
    }

    pub fn player(&self, who: Who) -> &PlayerState {
        &self.players[who.index()]
    }

    pub(crate) fn player_mut(&mut self, who: Who) -> &mut PlayerState {
        &mut self.players[who.index()]
    }

    pub fn active_character(&self, who: Who) -> Option<&CharacterState> {
        self.player(who).active_character()
    }

    pub fn character(&self, id: EntityId) -> Option<(Who, &CharacterState)> {
        Who::both().into_iter().find_map(|who| {
            self.player(who)
                .characters
                .iter()
                .find(|c| c.id == id)
                .map(|c| (who, c))
        })
    }

    pub fn find_entity(&self, id: EntityId) -> Option<(EntityArea, &EntityState)> {
        for who in Who::both() {
            let player = self.player(who);
            for ch in &player.characters {
                if let Some(e) = ch.entities.iter().find(|e| e.id == id) {
                    let area = EntityArea::Character {
                        who,
                        character_id: ch.id,
                    };
                    return Some((area, e));
                }
            }
            let zones = [
                (EntityArea::CombatStatuses { who }, &player.combat_statuses),
                (EntityArea::Summons { who }, &player.summons),
                (EntityArea::Supports { who }, &player.supports),
            ];
            for (area, list) in zones {
                if let Some(e) = list.iter().find(|e| e.id == id) {
                    return Some((area, e));
                }
            }
        }
        None
    }

    pub fn find_card(&self, id: EntityId) -> Option<(Who, CardArea, &CardState)> {
        for who in Who::both() {
            for area in [CardArea::Hands, CardArea::Pile] {
                if let Some(card) = self.player(who).cards(area).iter().find(|c| c.id == id) {
                    return Some((who, area, card));
                }
            }
        }
        None
    }

    /// Whether a character or entity with this id is on the board.
    pub fn contains(&self, id: EntityId) -> bool {
        self.character(id).is_some() || self.find_entity(id).is_some()
    }

    /// Everything that may own a triggered skill, in resolution order: the
    /// side whose turn it is first, and within a side the alive characters
    /// from the active one (each followed by its attached entities), then
    /// combat statuses, summons and supports.
    pub fn board_order(&self) -> Vec<(Who, Caller)> {
        let mut out = Vec::new();
        for who in [self.current_turn, self.current_turn.opposite()] {
            let player = self.player(who);
            for ch in player.characters_from_active() {
                if !ch.alive() {
                    continue;
                }
                out.push((who, Caller::Character(ch.clone())));
                for e in &ch.entities {
                    out.push((who, Caller::Entity(e.clone())));
                }
            }
            for list in [&player.combat_statuses, &player.summons, &player.supports] {
                for e in list {
                    out.push((who, Caller::Entity(e.clone())));
                }
            }
        }
        out
    }
}

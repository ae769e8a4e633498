#![deny(warnings)]

//! Core domain models and invariants for Board Tycoon.
//!
//! This crate defines the serializable game aggregate shared across the
//! workspace with validation helpers to guarantee basic invariants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Cash every standard player starts with.
pub const STARTING_CASH: i64 = 5_000;

/// Bonus credited when a move wraps past the START square.
pub const PASS_START_BONUS: i64 = 1_000;

/// A game never shrinks below this roster size.
pub const MIN_PLAYERS: usize = 2;

/// Round cap recorded on a fresh game. Stored, not enforced by the engine.
pub const STANDARD_MAX_ROUNDS: u32 = 30;

/// Unique identifier for a player, e.g. "player1".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a board square; properties share the id of their square.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SquareId(pub u32);

impl std::fmt::Display for SquareId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Session role. Admins bypass turn ownership and hold no turn slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Standard,
}

/// The identity the session collaborator attaches to every guarded call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: PlayerId,
    pub role: Role,
}

impl Actor {
    /// An admin actor outside the turn rotation.
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: PlayerId::new(id),
            role: Role::Admin,
        }
    }

    /// A standard player actor.
    pub fn standard(id: impl Into<String>) -> Self {
        Self {
            id: PlayerId::new(id),
            role: Role::Standard,
        }
    }
}

/// A participant in the game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Stable identity, referenced by property ownership.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Session role; standard players occupy turn slots.
    pub role: Role,
    /// Cash balance. Negative means the player is in debt.
    pub cash: i64,
    /// Index into the board sequence, always within `[0, board.len())`.
    pub position: usize,
    /// Owned properties, by square id. Mirrors `Property::owner`.
    pub assets: Vec<SquareId>,
    /// Display color tag.
    pub color: String,
    /// Outstanding loan counter. Stored, unused by any operation.
    pub loans: u32,
}

impl Player {
    /// A standard player at START with the standard bankroll.
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: PlayerId::new(id),
            name: name.into(),
            role: Role::Standard,
            cash: STARTING_CASH,
            position: 0,
            assets: Vec::new(),
            color: color.into(),
            loans: 0,
        }
    }
}

/// A purchasable property. Identity matches its board square.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: SquareId,
    pub name: String,
    /// Purchase price.
    pub price: i64,
    /// Rent charged per landing.
    pub rent: i64,
    /// Owning player, if any. Mirrors the owner's `assets` list.
    pub owner: Option<PlayerId>,
    /// Upgrade level. Fixed at 1, unused.
    pub level: u8,
    /// Cost of the next upgrade. Stored, unused.
    pub upgrade_cost: i64,
}

/// What a board square does when landed on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SquareKind {
    /// A purchasable square with economic attributes.
    Property {
        price: i64,
        rent: i64,
        color: String,
        upgrade_cost: i64,
    },
    /// Flavor-only square. The START pass-bonus is handled by the turn
    /// engine independently of square semantics.
    Special { description: String },
}

/// One square of the static board layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSquare {
    pub id: SquareId,
    pub name: String,
    pub kind: SquareKind,
}

impl BoardSquare {
    pub fn is_property(&self) -> bool {
        matches!(self.kind, SquareKind::Property { .. })
    }
}

/// The immutable ordered board layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    squares: Vec<BoardSquare>,
}

fn prop(id: u32, name: &str, price: i64, rent: i64, color: &str, upgrade_cost: i64) -> BoardSquare {
    BoardSquare {
        id: SquareId(id),
        name: name.to_string(),
        kind: SquareKind::Property {
            price,
            rent,
            color: color.to_string(),
            upgrade_cost,
        },
    }
}

fn special(id: u32, name: &str, description: &str) -> BoardSquare {
    BoardSquare {
        id: SquareId(id),
        name: name.to_string(),
        kind: SquareKind::Special {
            description: description.to_string(),
        },
    }
}

impl Board {
    /// The standard 24-square layout.
    pub fn standard() -> Self {
        let squares = vec![
            // Side 1 (top)
            special(0, "START", "Collect $1,000 as you pass"),
            prop(1, "Google", 2_000, 200, "blue", 1_000),
            prop(2, "Sony", 2_500, 250, "blue", 1_100),
            prop(3, "Microsoft", 2_200, 220, "blue", 1_100),
            special(4, "Chance", "Draw a chance card"),
            prop(5, "Apple", 2_400, 240, "green", 1_200),
            special(6, "Jail", "Just visiting"),
            // Side 2 (right)
            prop(7, "Amazon", 2_600, 260, "green", 1_300),
            prop(8, "Oracle", 2_700, 270, "green", 1_350),
            prop(9, "Meta", 2_800, 280, "orange", 1_400),
            special(10, "Chance", "Collect bonus money!"),
            prop(11, "Netflix", 3_000, 300, "orange", 1_500),
            special(12, "Auction", "Trade your properties"),
            // Side 3 (bottom)
            prop(13, "Tesla", 3_200, 320, "red", 1_600),
            special(14, "Chance", "Draw a chance card"),
            prop(15, "SpaceX", 3_400, 340, "red", 1_700),
            prop(16, "Boeing", 3_500, 350, "red", 1_750),
            prop(17, "Uber", 3_600, 360, "purple", 1_800),
            prop(18, "Lyft", 3_700, 370, "purple", 1_850),
            // Side 4 (left)
            prop(19, "Intel", 3_800, 380, "yellow", 1_900),
            special(20, "Tax Office", "Pay 10% of your money"),
            prop(21, "AMD", 3_900, 390, "yellow", 1_950),
            special(22, "Chance", "Draw a chance card"),
            prop(23, "NVIDIA", 4_000, 400, "yellow", 2_000),
        ];
        Self { squares }
    }

    /// Build a board from an explicit square sequence.
    pub fn from_squares(squares: Vec<BoardSquare>) -> Self {
        Self { squares }
    }

    pub fn len(&self) -> usize {
        self.squares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.squares.is_empty()
    }

    pub fn squares(&self) -> &[BoardSquare] {
        &self.squares
    }

    /// Square at a board position. Positions are validated to be in range.
    pub fn square_at(&self, position: usize) -> &BoardSquare {
        &self.squares[position]
    }

    /// Square by id, if present.
    pub fn square(&self, id: SquareId) -> Option<&BoardSquare> {
        self.squares.iter().find(|s| s.id == id)
    }

    /// The unowned property collection a fresh game starts with.
    pub fn initial_properties(&self) -> Vec<Property> {
        self.squares
            .iter()
            .filter_map(|square| match &square.kind {
                SquareKind::Property {
                    price,
                    rent,
                    upgrade_cost,
                    ..
                } => Some(Property {
                    id: square.id,
                    name: square.name.clone(),
                    price: *price,
                    rent: *rent,
                    owner: None,
                    level: 1,
                    upgrade_cost: *upgrade_cost,
                }),
                SquareKind::Special { .. } => None,
            })
            .collect()
    }
}

/// Aggregate root: roster, turn slot, properties, dice and round counters.
///
/// The undo history and the dice audit log are deliberately *not* part of
/// this aggregate; they live with the engine and are never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Ordered roster; the index is the turn slot.
    pub players: Vec<Player>,
    /// Index of the slot entitled to act.
    pub current_player: usize,
    /// Full property collection, owned and unowned.
    pub properties: Vec<Property>,
    /// Value of the most recent dice roll.
    pub last_dice_roll: Option<u8>,
    /// Round counter, starting at 1.
    pub round: u32,
    /// Round cap. Stored, not enforced.
    pub max_rounds: u32,
}

impl GameState {
    /// Fresh game over `board` with the given roster.
    pub fn new(players: Vec<Player>, board: &Board) -> Self {
        Self {
            players,
            current_player: 0,
            properties: board.initial_properties(),
            last_dice_roll: None,
            round: 1,
            max_rounds: STANDARD_MAX_ROUNDS,
        }
    }

    /// The standard six-player demo roster.
    pub fn standard(board: &Board) -> Self {
        let colors = ["rose", "emerald", "amber", "indigo", "cyan", "fuchsia"];
        let players = colors
            .iter()
            .enumerate()
            .map(|(i, color)| {
                Player::new(format!("player{}", i + 1), format!("Player {}", i + 1), *color)
            })
            .collect();
        Self::new(players, board)
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    pub fn property(&self, id: SquareId) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == id)
    }

    pub fn property_mut(&mut self, id: SquareId) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.id == id)
    }

    /// Player occupying the current turn slot.
    pub fn active_player(&self) -> Option<&Player> {
        self.players.get(self.current_player)
    }
}

/// Engine configuration.
///
/// The pacing delays are cosmetic presentation gaps between the committed
/// roll steps; zero is valid and changes nothing about ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Seed for the deterministic dice RNG.
    pub rng_seed: u64,
    /// Gap before landing resolution, in milliseconds.
    pub landing_delay_ms: u64,
    /// Gap before turn advancement, in milliseconds.
    pub turn_delay_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rng_seed: 42,
            landing_delay_ms: 100,
            turn_delay_ms: 1_000,
        }
    }
}

/// Validation errors for aggregate invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Roster shrank below the supported minimum.
    #[error("at least 2 players are required, found {0}")]
    TooFewPlayers(usize),
    /// Two roster entries share an id.
    #[error("duplicate player id: {0}")]
    DuplicatePlayerId(PlayerId),
    /// The turn slot points past the roster.
    #[error("turn slot {slot} is out of range for {players} players")]
    TurnSlotOutOfRange { slot: usize, players: usize },
    /// A player sits outside the board.
    #[error("player {player} is at position {position} on a {board_len}-square board")]
    PositionOutOfRange {
        player: PlayerId,
        position: usize,
        board_len: usize,
    },
    /// A property record has no matching property square.
    #[error("property {0} does not match a property square on the board")]
    PropertyNotOnBoard(SquareId),
    /// A property is owned by an id missing from the roster.
    #[error("property {0} is owned by unknown player {1}")]
    UnknownOwner(SquareId, PlayerId),
    /// Owner field set, but the owner's asset list disagrees.
    #[error("property {0} is owned by {1} but missing from their assets")]
    AssetMissing(SquareId, PlayerId),
    /// Asset list entry without the matching owner field.
    #[error("player {1} lists property {0} without owning it")]
    AssetNotOwned(SquareId, PlayerId),
}

/// Validate the aggregate against `board`, including the two-way
/// ownership invariant between `Property::owner` and `Player::assets`.
pub fn validate_state(state: &GameState, board: &Board) -> Result<(), ValidationError> {
    if state.players.len() < MIN_PLAYERS {
        return Err(ValidationError::TooFewPlayers(state.players.len()));
    }
    let mut ids: BTreeSet<&PlayerId> = BTreeSet::new();
    for p in &state.players {
        if !ids.insert(&p.id) {
            return Err(ValidationError::DuplicatePlayerId(p.id.clone()));
        }
        if p.position >= board.len() {
            return Err(ValidationError::PositionOutOfRange {
                player: p.id.clone(),
                position: p.position,
                board_len: board.len(),
            });
        }
    }
    if state.current_player >= state.players.len() {
        return Err(ValidationError::TurnSlotOutOfRange {
            slot: state.current_player,
            players: state.players.len(),
        });
    }
    for property in &state.properties {
        match board.square(property.id) {
            Some(square) if square.is_property() => {}
            _ => return Err(ValidationError::PropertyNotOnBoard(property.id)),
        }
        if let Some(owner) = &property.owner {
            let Some(player) = state.player(owner) else {
                return Err(ValidationError::UnknownOwner(property.id, owner.clone()));
            };
            if !player.assets.contains(&property.id) {
                return Err(ValidationError::AssetMissing(property.id, owner.clone()));
            }
        }
    }
    for player in &state.players {
        for asset in &player.assets {
            let owned = state
                .property(*asset)
                .is_some_and(|p| p.owner.as_ref() == Some(&player.id));
            if !owned {
                return Err(ValidationError::AssetNotOwned(*asset, player.id.clone()));
            }
        }
    }
    Ok(())
}

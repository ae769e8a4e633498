#![deny(warnings)]

//! Turn engine for Board Tycoon.
//!
//! `GameEngine` owns the aggregate and drives the turn state machine
//! `Idle -> Rolling -> landing resolution -> Idle`. A roll is three
//! ordered, individually committed steps: the position update
//! ([`GameEngine::roll_dice`]), the landing resolution
//! ([`GameEngine::resolve_landing`]) and the turn advancement
//! ([`GameEngine::finish_turn`]). Interactive drivers put their cosmetic
//! pacing pauses between the steps; [`GameEngine::play_turn`] runs all
//! three back to back for the admin custom-roll path and headless use.
//!
//! The pending-turn slot is the sole mutual-exclusion primitive: it is
//! set before any inter-step gap begins and cleared only after turn
//! advancement commits. A second roll arriving in between is a silent
//! no-op.
//!
//! Collaborators stay behind traits: snapshots go to a
//! [`persistence::SaveStore`], yes/no prompts come from a [`Decider`],
//! human-readable events go to a [`NotificationSink`] and committed
//! states are offered to optional [`SyncObserver`]s. None of them is
//! load-bearing for correctness.

use chrono::{DateTime, Utc};
use game_core::{
    validate_state, Actor, Board, GameConfig, GameState, Player, PlayerId, Property, Role,
    SquareId, MIN_PLAYERS, PASS_START_BONUS,
};
use game_econ::SaleReceipt;
use persistence::SaveStore;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Confirmation collaborator: synchronous yes/no decisions gathered
/// before the engine commits a purchase, sale or reset. Declining must
/// leave state untouched, so the engine asks first and mutates after.
pub trait Decider {
    fn confirm_purchase(&mut self, player: &Player, property: &Property) -> bool;
    fn confirm_sale(&mut self, player: &Player, property: &Property, proceeds: i64) -> bool;
    fn confirm_reset(&mut self) -> bool;
}

/// Fire-and-forget sink for human-readable event strings. The engine
/// never depends on display timing.
pub trait NotificationSink {
    fn notify(&mut self, message: &str);
}

/// Optional post-commit hook, e.g. a cross-view broadcast. The engine
/// only ever writes through this seam; it never reads state back.
pub trait SyncObserver {
    fn state_committed(&mut self, state: &GameState);
}

/// Errors surfaced by engine operations. All are locally recoverable;
/// none corrupts state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Turn-guarded operation attempted out of turn.
    #[error("it's not your turn")]
    NotYourTurn,
    /// Admin-only operation attempted by a standard actor.
    #[error("admin privileges are required")]
    AdminRequired,
    /// Roll override outside the dice domain, rejected before any
    /// mutation.
    #[error("invalid roll value {0}: must be between 1 and 6")]
    InvalidRollValue(u8),
    /// Undo requested with an empty history stack.
    #[error("no moves to undo for {0}")]
    NoHistory(PlayerId),
    /// Removal would shrink the roster below the supported minimum.
    #[error("cannot remove player: at least 2 players are required")]
    MinimumPlayers,
    #[error("player not found: {0}")]
    MissingPlayer(PlayerId),
    #[error("property not found: {0}")]
    MissingProperty(SquareId),
}

/// The single authorization predicate for turn-guarded operations:
/// admins may always act, standard actors only for themselves.
pub fn can_act(actor: &Actor, active_player: &PlayerId) -> bool {
    actor.role == Role::Admin || &actor.id == active_player
}

/// One audit entry per dice roll. Kept outside the persisted aggregate.
#[derive(Clone, Debug, Serialize)]
pub struct DiceRecord {
    pub player: PlayerId,
    pub roll: u8,
    pub at: DateTime<Utc>,
}

/// Committed effects of the movement step of a roll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollReport {
    pub player: PlayerId,
    pub roll: u8,
    pub from: usize,
    pub to: usize,
    pub passed_start: bool,
    pub interest_charged: i64,
}

/// What landing resolution decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LandingOutcome {
    /// Special square, or a property record that could not be resolved.
    NoEffect,
    /// Unowned property bought by the lander.
    Purchased { property: SquareId, price: i64 },
    /// Unowned property, purchase declined.
    Declined { property: SquareId },
    /// Rent settled with the owner.
    RentPaid {
        property: SquareId,
        amount: i64,
        owner: PlayerId,
    },
    /// The lander already owns the square.
    OwnAsset { property: SquareId },
}

/// Committed turn advancement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReport {
    pub next_player: PlayerId,
    pub round: u32,
}

/// Result of a full roll -> landing -> advance sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnSummary {
    pub roll: RollReport,
    pub landing: LandingOutcome,
    pub turn: TurnReport,
}

/// Result of an admin relocation or undo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveReport {
    pub player: PlayerId,
    pub from: usize,
    pub to: usize,
    pub interest_charged: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PendingPhase {
    AwaitingLanding,
    AwaitingAdvance,
}

#[derive(Clone, Debug)]
struct PendingTurn {
    player: PlayerId,
    landed: usize,
    phase: PendingPhase,
}

/// The single owner of the game aggregate.
pub struct GameEngine<S, D, N> {
    board: Board,
    state: GameState,
    initial: GameState,
    rng: ChaCha8Rng,
    pending: Option<PendingTurn>,
    move_history: BTreeMap<PlayerId, Vec<usize>>,
    dice_log: Vec<DiceRecord>,
    store: S,
    decider: D,
    notifier: N,
    observers: Vec<Box<dyn SyncObserver>>,
}

impl<S: SaveStore, D: Decider, N: NotificationSink> GameEngine<S, D, N> {
    pub fn new(
        board: Board,
        state: GameState,
        config: GameConfig,
        store: S,
        decider: D,
        notifier: N,
    ) -> Self {
        Self {
            initial: state.clone(),
            state,
            board,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            pending: None,
            move_history: BTreeMap::new(),
            dice_log: Vec::new(),
            store,
            decider,
            notifier,
            observers: Vec::new(),
        }
    }

    /// Resume from the most recent snapshot, or start the standard game.
    ///
    /// A snapshot that fails to load or violates the aggregate
    /// invariants is reported and discarded; it never poisons the
    /// engine.
    pub fn resume_or_new(board: Board, config: GameConfig, mut store: S, decider: D, notifier: N) -> Self {
        let fresh = GameState::standard(&board);
        let state = match store.load() {
            Ok(Some(saved)) => match validate_state(&saved, &board) {
                Ok(()) => {
                    info!(round = saved.round, "resuming saved game");
                    saved
                }
                Err(e) => {
                    warn!(error = %e, "saved snapshot violates invariants, starting fresh");
                    fresh.clone()
                }
            },
            Ok(None) => fresh.clone(),
            Err(e) => {
                warn!(error = %e, "failed to load snapshot, starting fresh");
                fresh.clone()
            }
        };
        let mut engine = Self::new(board, state, config, store, decider, notifier);
        // Resetting a resumed game goes back to a fresh table, not to
        // the snapshot it resumed from.
        engine.initial = fresh;
        engine
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// True while a roll is between its first and last committed step.
    pub fn is_rolling(&self) -> bool {
        self.pending.is_some()
    }

    pub fn dice_log(&self) -> &[DiceRecord] {
        &self.dice_log
    }

    pub fn add_observer(&mut self, observer: Box<dyn SyncObserver>) {
        self.observers.push(observer);
    }

    /// Save the aggregate and offer it to observers. Store failures are
    /// reported and swallowed; the in-memory aggregate stays authoritative.
    fn commit(&mut self) {
        debug_assert!(validate_state(&self.state, &self.board).is_ok());
        if let Err(e) = self.store.save(&self.state) {
            warn!(error = %e, "failed to save game state");
            self.notifier.notify("Failed to save the game state");
        }
        for observer in &mut self.observers {
            observer.state_committed(&self.state);
        }
    }

    fn require_admin(&self, actor: &Actor) -> Result<(), EngineError> {
        if actor.role == Role::Admin {
            Ok(())
        } else {
            Err(EngineError::AdminRequired)
        }
    }

    /// First roll step: draw (or take the admin override), credit the
    /// pass-start bonus, charge move interest and commit the new
    /// position. Returns `Ok(None)` without touching state when a roll
    /// is already in flight.
    pub fn roll_dice(
        &mut self,
        actor: &Actor,
        override_value: Option<u8>,
    ) -> Result<Option<RollReport>, EngineError> {
        if self.pending.is_some() {
            debug!("roll requested while one is in flight, ignoring");
            return Ok(None);
        }
        let Some(active) = self.state.active_player() else {
            warn!(slot = self.state.current_player, "turn slot out of range");
            return Ok(None);
        };
        let active_id = active.id.clone();
        let active_name = active.name.clone();
        if !can_act(actor, &active_id) {
            self.notifier.notify("It's not your turn!");
            return Err(EngineError::NotYourTurn);
        }
        if let Some(value) = override_value {
            if actor.role != Role::Admin {
                return Err(EngineError::AdminRequired);
            }
            if !(1..=6).contains(&value) {
                self.notifier.notify("Invalid roll number. Must be between 1 and 6.");
                return Err(EngineError::InvalidRollValue(value));
            }
        }

        let roll = override_value.unwrap_or_else(|| self.rng.gen_range(1..=6));
        self.dice_log.push(DiceRecord {
            player: active_id.clone(),
            roll,
            at: Utc::now(),
        });
        self.notifier.notify(&format!("{} rolled a {}", active_name, roll));

        let board_len = self.board.len();
        let slot = self.state.current_player;
        let from = self.state.players[slot].position;
        let to = (from + roll as usize) % board_len;
        // General single-lap wrap check: the move passes START exactly
        // when it runs off the end of the board.
        let passed_start = from + roll as usize >= board_len;

        let interest_charged = {
            let player = &mut self.state.players[slot];
            if passed_start {
                player.cash += PASS_START_BONUS;
            }
            let charged = game_econ::charge_move_interest(player);
            player.position = to;
            charged
        };
        self.state.last_dice_roll = Some(roll);
        if passed_start {
            self.notifier
                .notify(&format!("{} passed START! Collect $1,000", active_name));
        }
        if interest_charged > 0 {
            self.notifier.notify(&format!(
                "{} paid ${} in interest due to negative balance",
                active_name, interest_charged
            ));
        }
        self.pending = Some(PendingTurn {
            player: active_id.clone(),
            landed: to,
            phase: PendingPhase::AwaitingLanding,
        });
        info!(player = %active_id, roll, from, to, passed_start, "roll committed");
        self.commit();
        Ok(Some(RollReport {
            player: active_id,
            roll,
            from,
            to,
            passed_start,
            interest_charged,
        }))
    }

    /// Second roll step. No-op unless a roll is awaiting its landing.
    ///
    /// The purchase decision is only ever reachable by the actor who
    /// passed the roll guard (the active player or an admin), so the
    /// decider speaks for them.
    pub fn resolve_landing(&mut self) -> Option<LandingOutcome> {
        let pending = self.pending.as_ref()?;
        if pending.phase != PendingPhase::AwaitingLanding {
            return None;
        }
        let player_id = pending.player.clone();
        let landed = pending.landed;
        let outcome = self.resolve_square(landed, &player_id);
        if let Some(pending) = self.pending.as_mut() {
            pending.phase = PendingPhase::AwaitingAdvance;
        }
        self.commit();
        Some(outcome)
    }

    fn resolve_square(&mut self, position: usize, player_id: &PlayerId) -> LandingOutcome {
        let square = self.board.square_at(position);
        if !square.is_property() {
            return LandingOutcome::NoEffect;
        }
        let square_id = square.id;
        let Some(property) = self.state.property(square_id) else {
            warn!(square = %square_id, "no property record for landed square");
            return LandingOutcome::NoEffect;
        };
        match property.owner.clone() {
            None => {
                let property = property.clone();
                let Some(player) = self.state.player(player_id) else {
                    warn!(player = %player_id, "landing player missing from roster");
                    return LandingOutcome::NoEffect;
                };
                let player_name = player.name.clone();
                if !self.decider.confirm_purchase(player, &property) {
                    debug!(player = %player_id, property = %square_id, "purchase declined");
                    return LandingOutcome::Declined {
                        property: square_id,
                    };
                }
                match game_econ::purchase(&mut self.state, square_id, player_id) {
                    Ok(receipt) => {
                        self.notifier.notify(&format!(
                            "{} purchased {} for ${}",
                            player_name, property.name, receipt.price
                        ));
                        if receipt.balance_after < 0 {
                            self.notifier.notify(&format!(
                                "{} is in debt! Interest will be charged on moves.",
                                player_name
                            ));
                        }
                        LandingOutcome::Purchased {
                            property: square_id,
                            price: receipt.price,
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "purchase degraded to a no-op");
                        LandingOutcome::NoEffect
                    }
                }
            }
            Some(owner) if &owner == player_id => LandingOutcome::OwnAsset {
                property: square_id,
            },
            Some(_) => {
                let property_name = property.name.clone();
                match game_econ::pay_rent(&mut self.state, square_id, player_id) {
                    Ok(receipt) => {
                        let tenant_name = self
                            .state
                            .player(player_id)
                            .map(|p| p.name.clone())
                            .unwrap_or_default();
                        let owner_name = self
                            .state
                            .player(&receipt.owner)
                            .map(|p| p.name.clone())
                            .unwrap_or_default();
                        self.notifier.notify(&format!(
                            "{} paid ${} rent to {} for {}",
                            tenant_name, receipt.amount, owner_name, property_name
                        ));
                        if receipt.tenant_balance < 0 {
                            self.notifier.notify(&format!(
                                "{} is now in debt! Interest will be charged on moves.",
                                tenant_name
                            ));
                        }
                        LandingOutcome::RentPaid {
                            property: square_id,
                            amount: receipt.amount,
                            owner: receipt.owner,
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "rent settlement degraded to a no-op");
                        LandingOutcome::NoEffect
                    }
                }
            }
        }
    }

    /// Third roll step: advance the turn slot and clear the rolling
    /// flag. Resolves a skipped landing first, so the position ->
    /// landing -> advance ordering is never violated.
    pub fn finish_turn(&mut self) -> Option<TurnReport> {
        let phase = self.pending.as_ref().map(|p| p.phase)?;
        if phase == PendingPhase::AwaitingLanding {
            let _ = self.resolve_landing();
        }
        self.pending = None;
        let report = self.advance_turn();
        self.commit();
        Some(report)
    }

    /// Full roll -> landing -> advance sequence, committed in order.
    pub fn play_turn(
        &mut self,
        actor: &Actor,
        override_value: Option<u8>,
    ) -> Result<Option<TurnSummary>, EngineError> {
        let Some(roll) = self.roll_dice(actor, override_value)? else {
            return Ok(None);
        };
        let landing = self.resolve_landing().unwrap_or(LandingOutcome::NoEffect);
        let Some(turn) = self.finish_turn() else {
            return Ok(None);
        };
        Ok(Some(TurnSummary { roll, landing, turn }))
    }

    /// Advance past the current player without moving them or charging
    /// interest. Same turn-ownership guard as a roll; a silent no-op
    /// while a roll is in flight.
    pub fn skip_turn(&mut self, actor: &Actor) -> Result<Option<TurnReport>, EngineError> {
        if self.pending.is_some() {
            return Ok(None);
        }
        let Some(active) = self.state.active_player() else {
            return Ok(None);
        };
        let active_id = active.id.clone();
        let active_name = active.name.clone();
        if !can_act(actor, &active_id) {
            self.notifier.notify("It's not your turn!");
            return Err(EngineError::NotYourTurn);
        }
        self.notifier
            .notify(&format!("{} skipped their turn", active_name));
        let report = self.advance_turn();
        self.commit();
        Ok(Some(report))
    }

    fn advance_turn(&mut self) -> TurnReport {
        let len = self.state.players.len();
        let mut next = self.state.current_player;
        let mut wrapped = false;
        // Admins hold no turn slot in normal rotation.
        for _ in 0..len {
            next = (next + 1) % len;
            if next == 0 {
                wrapped = true;
            }
            if self.state.players[next].role != Role::Admin {
                break;
            }
        }
        self.state.current_player = next;
        if wrapped {
            self.state.round += 1;
        }
        debug!(next, round = self.state.round, "turn advanced");
        TurnReport {
            next_player: self.state.players[next].id.clone(),
            round: self.state.round,
        }
    }

    /// Admin relocation tool. Records undo history and charges move
    /// interest, but deliberately triggers no landing effects.
    pub fn move_player(
        &mut self,
        actor: &Actor,
        player_id: &PlayerId,
        target: usize,
    ) -> Result<MoveReport, EngineError> {
        self.require_admin(actor)?;
        self.apply_move(player_id, target, true)
    }

    /// Pop the last recorded position and re-apply the move without a
    /// history push, so undoing never feeds its own stack.
    pub fn undo_move(
        &mut self,
        actor: &Actor,
        player_id: &PlayerId,
    ) -> Result<MoveReport, EngineError> {
        self.require_admin(actor)?;
        let Some(previous) = self.move_history.get_mut(player_id).and_then(|h| h.pop()) else {
            self.notifier.notify("No moves to undo for this player");
            return Err(EngineError::NoHistory(player_id.clone()));
        };
        let report = self.apply_move(player_id, previous, false)?;
        self.notifier.notify("Move undone");
        Ok(report)
    }

    fn apply_move(
        &mut self,
        player_id: &PlayerId,
        target: usize,
        push_history: bool,
    ) -> Result<MoveReport, EngineError> {
        let board_len = self.board.len();
        let Some(player) = self.state.player_mut(player_id) else {
            return Err(EngineError::MissingPlayer(player_id.clone()));
        };
        let from = player.position;
        let to = target % board_len;
        let interest_charged = game_econ::charge_move_interest(player);
        player.position = to;
        let name = player.name.clone();
        if push_history {
            self.move_history
                .entry(player_id.clone())
                .or_default()
                .push(from);
        }
        if interest_charged > 0 {
            self.notifier.notify(&format!(
                "{} paid ${} in interest due to negative balance",
                name, interest_charged
            ));
        }
        self.notifier
            .notify(&format!("{} moved to position {}", name, to));
        self.commit();
        Ok(MoveReport {
            player: player_id.clone(),
            from,
            to,
            interest_charged,
        })
    }

    /// Admin grant or deduction; negative amounts deduct.
    pub fn adjust_cash(
        &mut self,
        actor: &Actor,
        player_id: &PlayerId,
        amount: i64,
    ) -> Result<i64, EngineError> {
        self.require_admin(actor)?;
        let Some(player) = self.state.player_mut(player_id) else {
            return Err(EngineError::MissingPlayer(player_id.clone()));
        };
        player.cash += amount;
        let balance = player.cash;
        let name = player.name.clone();
        let verb = if amount >= 0 { "Added" } else { "Removed" };
        let direction = if amount >= 0 { "to" } else { "from" };
        self.notifier.notify(&format!(
            "{} ${} {} {}",
            verb,
            amount.abs(),
            direction,
            name
        ));
        self.commit();
        Ok(balance)
    }

    /// Remove a player from the roster, releasing their properties to
    /// unowned. Refused below the minimum roster size.
    pub fn remove_player(&mut self, actor: &Actor, player_id: &PlayerId) -> Result<(), EngineError> {
        self.require_admin(actor)?;
        if self.state.players.len() <= MIN_PLAYERS {
            self.notifier
                .notify("Cannot remove player. Minimum 2 players required.");
            return Err(EngineError::MinimumPlayers);
        }
        let Some(index) = self.state.players.iter().position(|p| &p.id == player_id) else {
            return Err(EngineError::MissingPlayer(player_id.clone()));
        };
        let removed = self.state.players.remove(index);
        for property in &mut self.state.properties {
            if property.owner.as_ref() == Some(player_id) {
                property.owner = None;
            }
        }
        // Keep the active player stable when it survives the removal.
        if index < self.state.current_player {
            self.state.current_player -= 1;
        }
        if self.state.current_player >= self.state.players.len() {
            self.state.current_player = 0;
        }
        self.move_history.remove(player_id);
        self.notifier
            .notify(&format!("{} has been removed from the game", removed.name));
        self.commit();
        Ok(())
    }

    /// Restore the initial state after a confirmation. Undo history is
    /// cleared; the dice audit log is retained.
    pub fn reset(&mut self, actor: &Actor) -> Result<bool, EngineError> {
        self.require_admin(actor)?;
        if !self.decider.confirm_reset() {
            return Ok(false);
        }
        self.state = self.initial.clone();
        self.pending = None;
        self.move_history.clear();
        self.notifier.notify("Game has been reset!");
        self.commit();
        Ok(true)
    }

    /// Sell a property back to the bank for 80% of its price.
    ///
    /// Authorization is the caller's concern. A missing property, a
    /// missing player or a mismatched owner degrades to a no-op with no
    /// partial mutation; declining the confirmation leaves state
    /// untouched.
    pub fn sell_property(
        &mut self,
        property_id: SquareId,
        owner_id: &PlayerId,
    ) -> Result<Option<SaleReceipt>, EngineError> {
        let Some(property) = self.state.property(property_id) else {
            debug!(property = %property_id, "sale requested for unknown property");
            return Ok(None);
        };
        let Some(owner) = self.state.player(owner_id) else {
            debug!(player = %owner_id, "sale requested for unknown player");
            return Ok(None);
        };
        let property_name = property.name.clone();
        let owner_name = owner.name.clone();
        let proceeds = game_econ::sale_price(property.price);
        if !self.decider.confirm_sale(owner, property, proceeds) {
            return Ok(None);
        }
        match game_econ::sell(&mut self.state, property_id, owner_id) {
            Ok(receipt) => {
                self.notifier.notify(&format!(
                    "{} sold {} back to the bank for ${}",
                    owner_name, property_name, receipt.proceeds
                ));
                self.commit();
                Ok(Some(receipt))
            }
            Err(e) => {
                debug!(error = %e, "sale degraded to a no-op");
                Ok(None)
            }
        }
    }

    /// Admin repricing; takes effect for all future rent and sales.
    pub fn update_pricing(
        &mut self,
        actor: &Actor,
        property_id: SquareId,
        new_price: i64,
        new_rent: i64,
    ) -> Result<(), EngineError> {
        self.require_admin(actor)?;
        match game_econ::reprice(&mut self.state, property_id, new_price, new_rent) {
            Ok(()) => {
                self.notifier.notify(&format!(
                    "Updated price and rent for property {}",
                    property_id
                ));
                self.commit();
                Ok(())
            }
            Err(_) => Err(EngineError::MissingProperty(property_id)),
        }
    }
}

#![deny(warnings)]

//! Headless CLI: auto-plays a game end to end and prints the standings.
//!
//! Scenarios configure the roster; `--save` mirrors every committed
//! mutation into a JSON snapshot the next run resumes from; `--export`
//! writes the admin history document after the run.

use anyhow::{Context, Result};
use chrono::Utc;
use game_core::{
    Actor, Board, GameConfig, GameState, Player, MIN_PLAYERS, STANDARD_MAX_ROUNDS, STARTING_CASH,
};
use game_engine::{Decider, DiceRecord, GameEngine, NotificationSink};
use persistence::{JsonFileStore, MemoryStore, SaveStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    scenario: Option<String>,
    rounds: Option<u32>,
    seed: Option<u64>,
    save: Option<String>,
    export: Option<String>,
    paced: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next(),
            "--rounds" => args.rounds = it.next().and_then(|s| s.parse().ok()),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--save" => args.save = it.next(),
            "--export" => args.export = it.next(),
            "--paced" => args.paced = true,
            _ => {}
        }
    }
    args
}

/// Roster and table stakes for a non-standard game.
#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default = "default_cash")]
    starting_cash: i64,
    #[serde(default = "default_rounds")]
    max_rounds: u32,
    players: Vec<ScenarioPlayer>,
}

#[derive(Debug, Deserialize)]
struct ScenarioPlayer {
    id: String,
    name: String,
    color: String,
}

fn default_cash() -> i64 {
    STARTING_CASH
}

fn default_rounds() -> u32 {
    STANDARD_MAX_ROUNDS
}

fn scenario_state(text: &str, board: &Board) -> Result<GameState> {
    let scenario: Scenario = serde_yaml::from_str(text).context("parsing scenario")?;
    anyhow::ensure!(
        scenario.players.len() >= MIN_PLAYERS,
        "scenario needs at least {} players",
        MIN_PLAYERS
    );
    let players = scenario
        .players
        .iter()
        .map(|p| {
            let mut player = Player::new(p.id.clone(), p.name.clone(), p.color.clone());
            player.cash = scenario.starting_cash;
            player
        })
        .collect();
    let mut state = GameState::new(players, board);
    state.max_rounds = scenario.max_rounds;
    Ok(state)
}

/// Buys whenever the price leaves the balance non-negative.
struct AutoBuy;

impl Decider for AutoBuy {
    fn confirm_purchase(&mut self, player: &Player, property: &game_core::Property) -> bool {
        player.cash >= property.price
    }

    fn confirm_sale(
        &mut self,
        _player: &Player,
        _property: &game_core::Property,
        _proceeds: i64,
    ) -> bool {
        true
    }

    fn confirm_reset(&mut self) -> bool {
        false
    }
}

struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&mut self, message: &str) {
        println!("{}", message);
    }
}

fn pause(ms: u64) {
    if ms > 0 {
        std::thread::sleep(std::time::Duration::from_millis(ms));
    }
}

#[derive(Serialize)]
struct PlayerHistory {
    name: String,
    money: i64,
    position: usize,
    assets: Vec<String>,
    loans: u32,
}

#[derive(Serialize)]
struct PropertyHistory {
    name: String,
    owner: String,
    price: i64,
    rent: i64,
}

#[derive(Serialize)]
struct GameHistory<'a> {
    timestamp: String,
    players: Vec<PlayerHistory>,
    properties: Vec<PropertyHistory>,
    recent_rolls: &'a [DiceRecord],
}

fn export_history(path: &str, state: &GameState, dice_log: &[DiceRecord]) -> Result<()> {
    let players = state
        .players
        .iter()
        .map(|player| PlayerHistory {
            name: player.name.clone(),
            money: player.cash,
            position: player.position,
            assets: player
                .assets
                .iter()
                .filter_map(|id| state.property(*id).map(|p| p.name.clone()))
                .collect(),
            loans: player.loans,
        })
        .collect();
    let properties = state
        .properties
        .iter()
        .map(|property| PropertyHistory {
            name: property.name.clone(),
            owner: property
                .owner
                .as_ref()
                .and_then(|id| state.player(id))
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "Bank".to_string()),
            price: property.price,
            rent: property.rent,
        })
        .collect();
    let history = GameHistory {
        timestamp: Utc::now().to_rfc3339(),
        players,
        properties,
        recent_rolls: dice_log,
    };
    let doc = serde_json::to_string_pretty(&history)?;
    std::fs::write(path, doc).with_context(|| format!("writing history to {}", path))?;
    Ok(())
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(
        git_sha = env!("GIT_SHA"),
        scenario = ?args.scenario,
        rounds = ?args.rounds,
        seed = ?args.seed,
        "starting CLI"
    );

    let pacing = GameConfig::default();
    let config = GameConfig {
        rng_seed: args.seed.unwrap_or(pacing.rng_seed),
        landing_delay_ms: if args.paced { pacing.landing_delay_ms } else { 0 },
        turn_delay_ms: if args.paced { pacing.turn_delay_ms } else { 0 },
    };
    let store: Box<dyn SaveStore> = match &args.save {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::new()),
    };

    let board = Board::standard();
    let mut engine = match &args.scenario {
        Some(path) => {
            // An explicit scenario starts over; it never resumes a snapshot.
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading scenario {}", path))?;
            let state = scenario_state(&text, &board)?;
            GameEngine::new(board, state, config, store, AutoBuy, ConsoleSink)
        }
        None => GameEngine::resume_or_new(board, config, store, AutoBuy, ConsoleSink),
    };

    let rounds_cap = args.rounds.unwrap_or(engine.state().max_rounds);
    let mut turns_played = 0u32;
    while engine.state().round <= rounds_cap {
        let Some(active) = engine.state().active_player() else {
            break;
        };
        let actor = Actor {
            id: active.id.clone(),
            role: active.role,
        };
        match engine.roll_dice(&actor, None) {
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "roll refused");
                break;
            }
        }
        pause(config.landing_delay_ms);
        let _ = engine.resolve_landing();
        pause(config.turn_delay_ms);
        let _ = engine.finish_turn();
        turns_played += 1;
    }

    println!(
        "Game over | rounds: {} | turns: {} | players: {}",
        engine.state().round,
        turns_played,
        engine.state().players.len()
    );
    for player in &engine.state().players {
        println!(
            "{:<12} | cash: ${:<8} | position: {:>2} | assets: {}",
            player.name,
            player.cash,
            player.position,
            player.assets.len()
        );
    }
    println!("Recent rolls:");
    for record in engine.dice_log().iter().rev().take(5) {
        println!("  {} rolled a {}", record.player, record.roll);
    }

    if let Some(path) = &args.export {
        export_history(path, engine.state(), engine.dice_log())?;
        info!(path = %path, "game history exported");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_overrides_roster_and_stakes() {
        let board = Board::standard();
        let text = "\
starting_cash: 2500
max_rounds: 10
players:
  - id: alice
    name: Alice
    color: rose
  - id: bob
    name: Bob
    color: emerald
";
        let state = scenario_state(text, &board).unwrap();
        assert_eq!(state.players.len(), 2);
        assert_eq!(state.players[0].name, "Alice");
        assert!(state.players.iter().all(|p| p.cash == 2_500));
        assert_eq!(state.max_rounds, 10);
        game_core::validate_state(&state, &board).unwrap();
    }

    #[test]
    fn scenario_defaults_apply() {
        let board = Board::standard();
        let text = "\
players:
  - id: alice
    name: Alice
    color: rose
  - id: bob
    name: Bob
    color: emerald
";
        let state = scenario_state(text, &board).unwrap();
        assert!(state.players.iter().all(|p| p.cash == STARTING_CASH));
        assert_eq!(state.max_rounds, STANDARD_MAX_ROUNDS);
    }

    #[test]
    fn undersized_scenarios_are_refused() {
        let board = Board::standard();
        let text = "\
players:
  - id: solo
    name: Solo
    color: rose
";
        assert!(scenario_state(text, &board).is_err());
    }
}

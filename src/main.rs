//! Pineapple headless runner
//!
//! Plays a level with a simple autopilot and logs what happens. Rendering and
//! input polling live outside this crate.
//!
//! Usage: `pineapple [LEVEL] [TUNING]` (`RUST_LOG=debug` for more)

#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;

#[cfg(not(target_arch = "wasm32"))]
use clap::Parser;
#[cfg(not(target_arch = "wasm32"))]
use pineapple::Tuning;
#[cfg(not(target_arch = "wasm32"))]
use pineapple::sim::{
    Game, GameEvent, GamePhase, KinematicWorld, Level, LevelSpec, NullScene, ObstacleId,
    SoundEffect, TickInput,
};

#[cfg(not(target_arch = "wasm32"))]
#[derive(Parser, Debug)]
#[command(about = "Play a Pineapple level headless and log the outcome", version)]
struct Args {
    /// Tile-map level file (defaults to the built-in level)
    level: Option<PathBuf>,
    /// Tuning overrides as JSON
    tuning: Option<PathBuf>,
    /// Seed for the companions' jump timing
    #[arg(long, default_value_t = 0x5EED)]
    seed: u64,
}

/// How far ahead of the avatar an obstacle makes the autopilot jump
#[cfg(not(target_arch = "wasm32"))]
const LOOKAHEAD: f32 = 1.0;
/// Two minutes of play
#[cfg(not(target_arch = "wasm32"))]
const MAX_TICKS: u32 = 60 * 120;

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    env_logger::init();
    match run(Args::parse()) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The simulation is a library on the web; the host page drives it
}

#[cfg(not(target_arch = "wasm32"))]
fn run(args: Args) -> anyhow::Result<()> {
    let spec = match &args.level {
        Some(path) => LevelSpec::load(path)?,
        None => {
            log::info!("No level given, playing the built-in level");
            LevelSpec::builtin()
        }
    };
    let tuning = match &args.tuning {
        Some(path) => Tuning::load(path)?,
        None => Tuning::default(),
    };

    let seed = args.seed;
    let mut game = Game::new(spec, tuning, KinematicWorld::default(), NullScene, seed);
    log::info!("Pineapple (headless) playing {} with seed {seed:#x}", game.level().name);

    for tick in 0..MAX_TICKS {
        let input = autopilot(game.level());
        game.tick(&input);

        for event in game.drain_events() {
            match event {
                GameEvent::Died { id, class } => log::info!("tick {tick}: {class:?} {id} died"),
                GameEvent::GoalReached(id) => log::info!("tick {tick}: {id} reached the goal"),
                GameEvent::Sound(SoundEffect::Victory | SoundEffect::Failure) => {}
                other => log::debug!("tick {tick}: {other:?}"),
            }
        }

        match game.phase() {
            GamePhase::Won => {
                log::info!("Level {} won after {} ticks", game.level().name, tick + 1);
                return Ok(());
            }
            GamePhase::Lost => {
                log::info!(
                    "Level {} lost after {} ticks ({} companions left)",
                    game.level().name,
                    tick + 1,
                    game.level().num_kids_remaining()
                );
                return Ok(());
            }
            GamePhase::Playing | GamePhase::Paused => {}
        }
    }

    log::info!(
        "Stopped after {MAX_TICKS} ticks, camera at x={:.1}",
        game.camera_x()
    );
    Ok(())
}

/// Run right and jump whenever something climbable or deadly is just ahead.
/// Doors are waited out; the switch before them opens them.
#[cfg(not(target_arch = "wasm32"))]
fn autopilot(level: &Level) -> TickInput {
    let mut input = TickInput {
        horizontal: 1.0,
        ..Default::default()
    };
    let Some(avatar) = level.avatar().and_then(|id| level.live(id)) else {
        return input;
    };
    let me = avatar.body.aabb();

    let in_the_way = |id: &ObstacleId| {
        level.live(*id).is_some_and(|obstacle| {
            let other = obstacle.body.aabb();
            let gap = other.min.x - me.max.x;
            (-0.05..=LOOKAHEAD).contains(&gap)
                && other.max.y > me.min.y + 0.05
                && other.min.y < me.max.y
        })
    };
    input.jump = level
        .spikes()
        .iter()
        .chain(level.jellos())
        .chain(level.cups())
        .chain(level.walls())
        .any(in_the_way);
    input
}

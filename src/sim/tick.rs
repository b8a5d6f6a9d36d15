//! Fixed timestep simulation tick
//!
//! One [`Game::tick`] is one frame of the main loop: input, pre-physics entity
//! updates, the physics step (contact callbacks fire inside it), deferred
//! removal, then camera and win/lose bookkeeping.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::body::{FixtureKind, ObstacleId};
use super::collision::CollisionController;
use super::level::{GameEvent, Level, SoundEffect};
use super::loader::LevelSpec;
use super::models::{AvatarSize, Obstacle, ObstacleKind};
use super::scene::SceneGraph;
use super::world::PhysicsWorld;
use crate::consts::*;
use crate::tuning::Tuning;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Horizontal movement in [-1, 1]
    pub horizontal: f32,
    pub jump: bool,
    /// Grow (or return to normal when small)
    pub grow: bool,
    /// Shrink (or return to normal when large)
    pub shrink: bool,
    /// Pause toggle
    pub pause: bool,
    /// Restart the level now
    pub reset: bool,
}

impl TickInput {
    /// Same input with the one-shot commands cleared
    fn held(&self) -> Self {
        Self {
            horizontal: self.horizontal,
            ..Default::default()
        }
    }
}

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Playing,
    Paused,
    /// Victory screen, counting down to a reset
    Won,
    /// Failure screen, counting down to a reset
    Lost,
}

/// The avatar and every companion still in the level are at the goal, and at
/// least one companion survived
pub fn check_victory(level: &Level) -> bool {
    let avatar_home = level.avatar_model().is_some_and(|avatar| avatar.reached_goal);
    let kids_home = level.kids().all(|id| {
        level
            .live(id)
            .and_then(Obstacle::as_kid)
            .is_some_and(|kid| kid.reached_goal)
    });
    avatar_home && kids_home && level.num_kids_remaining() > 0
}

/// Camera left edge following `focus_x`, kept inside the level
pub fn camera_x_for(focus_x: f32, length: f32, view_width: f32) -> f32 {
    let max = (length - view_width).max(0.0);
    (focus_x - view_width * 0.5).clamp(0.0, max)
}

fn roll_jump_delay(rng: &mut Pcg32, tuning: &Tuning) -> u32 {
    let low = tuning.kid_jump_delay_min.min(tuning.kid_jump_delay_max);
    let high = tuning.kid_jump_delay_min.max(tuning.kid_jump_delay_max);
    rng.random_range(low..=high)
}

/// A running level and everything needed to rebuild it
pub struct Game<W, S> {
    spec: LevelSpec,
    tuning: Tuning,
    level: Level,
    world: W,
    scene: S,
    collisions: CollisionController,
    phase: GamePhase,
    /// Frames left on the win/lose screen
    countdown: u32,
    camera_x: f32,
    time_ticks: u64,
    seed: u64,
    rng: Pcg32,
    accumulator: f32,
    events: Vec<GameEvent>,
}

impl<W: PhysicsWorld, S: SceneGraph> Game<W, S> {
    pub fn new(spec: LevelSpec, tuning: Tuning, mut world: W, mut scene: S, seed: u64) -> Self {
        let level = spec.build(&tuning, &mut world, &mut scene);
        let collisions = CollisionController::new(&tuning);
        let mut game = Self {
            spec,
            tuning,
            level,
            world,
            scene,
            collisions,
            phase: GamePhase::Playing,
            countdown: 0,
            camera_x: 0.0,
            time_ticks: 0,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            accumulator: 0.0,
            events: Vec::new(),
        };
        game.start_level();
        game
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn level_mut(&mut self) -> &mut Level {
        &mut self.level
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn spec(&self) -> &LevelSpec {
        &self.spec
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn camera_x(&self) -> f32 {
        self.camera_x
    }

    /// Ticks spent playing the current level
    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    /// Events produced since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Run as many fixed ticks as `dt` of wall time covers. One-shot commands
    /// only apply to the first tick. Returns the number of ticks run.
    pub fn frame(&mut self, dt: f32, input: &TickInput) -> u32 {
        self.accumulator += dt.min(0.1);

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            if substeps == 0 {
                self.tick(input);
            } else {
                self.tick(&input.held());
            }
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        substeps
    }

    /// Advance the game by one fixed timestep
    pub fn tick(&mut self, input: &TickInput) {
        if input.reset {
            log::info!("Level {} reset requested", self.level.name);
            self.reset();
            return;
        }

        if input.pause {
            match self.phase {
                GamePhase::Playing => {
                    self.phase = GamePhase::Paused;
                    return;
                }
                GamePhase::Paused => self.phase = GamePhase::Playing,
                GamePhase::Won | GamePhase::Lost => {}
            }
        }

        match self.phase {
            GamePhase::Paused => return,
            GamePhase::Won | GamePhase::Lost => {
                self.countdown = self.countdown.saturating_sub(1);
                if self.countdown == 0 {
                    self.reset();
                }
                return;
            }
            GamePhase::Playing => {}
        }

        self.time_ticks += 1;

        self.update_avatar(input);
        self.update_kids();
        self.update_blended();
        self.update_props();
        self.update_movers();

        self.world
            .step(&mut self.level, &mut self.scene, &mut self.collisions, SIM_DT);
        self.level.garbage_collect(&mut self.world);
        self.level.settle_cups();

        self.update_camera();
        self.update_outcome();
        self.events.extend(self.level.drain_events());
    }

    /// Tear the level down and build it again from its `LevelSpec`
    fn reset(&mut self) {
        self.events.extend(self.level.drain_events());
        self.level.dispose(&mut self.world, &mut self.scene);
        self.world.clear();
        self.level = self.spec.build(&self.tuning, &mut self.world, &mut self.scene);
        self.phase = GamePhase::Playing;
        self.countdown = 0;
        self.accumulator = 0.0;
        self.time_ticks = 0;
        self.start_level();
    }

    fn start_level(&mut self) {
        self.rng = Pcg32::seed_from_u64(self.seed);
        for id in self.level.kids().collect::<Vec<_>>() {
            if let Some(kid) = self.level.live_mut(id).and_then(Obstacle::as_kid_mut) {
                kid.jump_delay = roll_jump_delay(&mut self.rng, &self.tuning);
            }
        }
        self.update_camera();
    }

    fn update_avatar(&mut self, input: &TickInput) {
        let tuning = &self.tuning;
        let Some(id) = self.level.avatar() else {
            return;
        };
        let Some(Obstacle {
            body,
            kind: ObstacleKind::Avatar(avatar),
            ..
        }) = self.level.live_mut(id)
        else {
            return;
        };

        avatar.size_changed_this_frame = false;
        avatar.jump_cooldown = avatar.jump_cooldown.saturating_sub(1);
        if avatar.blended {
            return;
        }

        let mut sounds = Vec::new();
        let resized = if input.grow {
            avatar.request_size(AvatarSize::Large, tuning.size_duration_ticks)
        } else if input.shrink {
            avatar.request_size(AvatarSize::Small, tuning.size_duration_ticks)
        } else {
            avatar.tick_size()
        };
        if let Some(previous) = resized {
            let factor = avatar.size.scale(tuning) / previous.scale(tuning);
            body.rescale_standing(factor);
            log::debug!("Avatar resized {previous:?} -> {:?}", avatar.size);
            sounds.push(if factor > 1.0 {
                SoundEffect::Grow
            } else {
                SoundEffect::Shrink
            });
        }

        let horizontal = input.horizontal.clamp(-1.0, 1.0);
        body.vel.x = horizontal * tuning.avatar_speed * avatar.size.speed_factor(tuning);

        if input.jump && avatar.can_jump() {
            body.vel.y = tuning.jump_speed;
            avatar.jump_cooldown = tuning.jump_cooldown_ticks;
            sounds.push(SoundEffect::Jump);
        }

        for sound in sounds {
            self.level.play(sound);
        }
    }

    /// Companions trail the avatar and hop now and then. Once the avatar is
    /// home they head straight for the goal.
    fn update_kids(&mut self) {
        let tuning = &self.tuning;
        let avatar = self.level.avatar().and_then(|id| self.level.live(id)).and_then(|obstacle| {
            obstacle
                .as_avatar()
                .map(|avatar| (obstacle.body.pos.x, avatar.reached_goal))
        });
        let goal_x = self
            .level
            .goal()
            .and_then(|id| self.level.live(id))
            .map(|goal| goal.body.pos.x);

        for id in self.level.kids().collect::<Vec<_>>() {
            let Some(Obstacle {
                body,
                kind: ObstacleKind::Kid(kid),
                ..
            }) = self.level.live_mut(id)
            else {
                continue;
            };
            if kid.impaled {
                body.vel = Vec2::ZERO;
                continue;
            }
            if kid.blended {
                continue;
            }
            if kid.reached_goal {
                body.vel.x = 0.0;
                continue;
            }

            let target = match avatar {
                Some((_, true)) => goal_x.map(|x| (x, 0.1)),
                Some((x, false)) => Some((x, tuning.kid_follow_gap * (kid.index + 1) as f32)),
                None => None,
            };
            body.vel.x = match target {
                Some((x, gap)) if (x - body.pos.x).abs() > gap => {
                    kid.facing = (x - body.pos.x).signum();
                    kid.facing * tuning.kid_speed
                }
                _ => 0.0,
            };

            if kid.grounded {
                kid.jump_delay = kid.jump_delay.saturating_sub(1);
                if kid.jump_delay == 0 {
                    body.vel.y = tuning.kid_jump_speed;
                    kid.jump_delay = roll_jump_delay(&mut self.rng, tuning);
                }
            }
        }
    }

    /// Blended characters spiral into the blade and die when the spiral runs out
    fn update_blended(&mut self) {
        let tuning = &self.tuning;
        let blade = self
            .level
            .blender()
            .and_then(|id| self.level.live(id))
            .and_then(|blender| blender.body.fixture_aabb(FixtureKind::Blade))
            .map(|blade| blade.center());

        let characters: Vec<ObstacleId> = self.level.avatar().into_iter().chain(self.level.kids()).collect();
        let mut expired = Vec::new();
        for id in characters {
            let Some(obstacle) = self.level.live_mut(id) else {
                continue;
            };
            let blend_ticks = match &mut obstacle.kind {
                ObstacleKind::Avatar(avatar) if avatar.blended => {
                    avatar.blend_ticks += 1;
                    avatar.blend_ticks
                }
                ObstacleKind::Kid(kid) if kid.blended => {
                    kid.blend_ticks += 1;
                    kid.blend_ticks
                }
                _ => continue,
            };

            obstacle.body.vel = match blade {
                Some(blade) => {
                    let inward = blade - obstacle.body.pos;
                    (inward + inward.perp() * 0.5) * tuning.blend_pull
                }
                None => Vec2::ZERO,
            };
            if blend_ticks >= tuning.blend_duration_ticks {
                expired.push(id);
            }
        }

        for id in expired {
            self.level.blend_and_kill(id, &mut self.scene);
        }
    }

    /// Squished jello and smashed cups play out their animation, then leave
    fn update_props(&mut self) {
        let tuning = &self.tuning;

        let mut squished = Vec::new();
        for id in self.level.jellos().to_vec() {
            let Some(Obstacle {
                kind: ObstacleKind::Jello(jello),
                ..
            }) = self.level.live_mut(id)
            else {
                continue;
            };
            if jello.smushing {
                jello.anim_frame += 1;
                if jello.anim_frame >= tuning.jello_smush_frames {
                    squished.push(id);
                }
            }
        }
        for id in squished {
            self.level.kill(id, &mut self.scene);
        }

        let mut smashed = Vec::new();
        for id in self.level.cups().to_vec() {
            let Some(Obstacle {
                kind: ObstacleKind::Cup(cup),
                ..
            }) = self.level.live_mut(id)
            else {
                continue;
            };
            if cup.smashing && !cup.smashed {
                cup.anim_frame += 1;
                if cup.anim_frame >= tuning.cup_smash_frames {
                    cup.smashed = true;
                    smashed.push((id, cup.clone()));
                }
            }
        }
        for (id, cup) in smashed {
            self.level.kill(id, &mut self.scene);
            self.level.drop_cups_above(&cup);
        }
    }

    /// Platforms follow their state machine; the blender keeps advancing
    /// until it leaves the level
    fn update_movers(&mut self) {
        let tuning = &self.tuning;
        for id in self.level.platforms().to_vec() {
            if let Some(Obstacle {
                body,
                kind: ObstacleKind::Platform(platform),
                ..
            }) = self.level.live_mut(id)
            {
                body.vel = platform.update(
                    body.pos,
                    tuning.platform_speed,
                    tuning.platform_epsilon,
                    SIM_DT,
                );
            }
        }

        let length = self.level.length;
        if let Some(Obstacle {
            body,
            kind: ObstacleKind::Blender(blender),
            ..
        }) = self.level.blender().and_then(|id| self.level.live_mut(id))
        {
            if blender.running && body.aabb().min.x > length {
                log::debug!("Blender left the level");
                blender.running = false;
            }
            body.vel.x = if blender.running {
                tuning.blender_speed
            } else {
                0.0
            };
        }
    }

    fn update_camera(&mut self) {
        if let Some(avatar) = self.level.avatar().and_then(|id| self.level.live(id)) {
            self.camera_x = camera_x_for(avatar.body.pos.x, self.level.length, self.tuning.view_width);
        }
    }

    fn update_outcome(&mut self) {
        let phase = if self.level.have_failed() {
            GamePhase::Lost
        } else if check_victory(&self.level) {
            GamePhase::Won
        } else {
            return;
        };

        self.phase = phase;
        self.countdown = self.tuning.countdown_ticks.max(1);
        if phase == GamePhase::Won {
            log::info!("Level {} complete in {} ticks", self.level.name, self.time_ticks);
            self.level.play(SoundEffect::Victory);
        } else {
            log::info!(
                "Level {} lost with {} companions remaining",
                self.level.name,
                self.level.num_kids_remaining()
            );
            self.level.play(SoundEffect::Failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::body::BodyType;
    use crate::sim::loader::{BridgeSpec, Rect, SwitchSpec};
    use crate::sim::models::PlatformState;
    use crate::sim::scene::SceneLog;
    use crate::sim::world::KinematicWorld;

    fn game(spec: LevelSpec, tuning: Tuning) -> Game<KinematicWorld, SceneLog> {
        Game::new(spec, tuning, KinematicWorld::default(), SceneLog::new(), 12345)
    }

    fn run(game: &mut Game<KinematicWorld, SceneLog>, ticks: u32) {
        for _ in 0..ticks {
            game.tick(&TickInput::default());
        }
    }

    fn sounds(events: &[GameEvent]) -> Vec<SoundEffect> {
        events
            .iter()
            .filter_map(|event| match event {
                GameEvent::Sound(sound) => Some(*sound),
                _ => None,
            })
            .collect()
    }

    /// Avatar and all companions spawn inside the goal
    fn home_spec() -> LevelSpec {
        let mut spec = LevelSpec::empty("home", 10.0);
        spec.will = Vec2::new(9.0, 0.5);
        spec.kids = vec![
            Vec2::new(8.4, 0.35),
            Vec2::new(8.8, 0.35),
            Vec2::new(9.2, 0.35),
            Vec2::new(9.6, 0.35),
        ];
        spec
    }

    #[test]
    fn test_check_victory_needs_everyone_home() {
        let mut world = KinematicWorld::default();
        let mut level = home_spec().build(&Tuning::default(), &mut world, &mut SceneLog::new());
        assert!(!check_victory(&level));

        let avatar = level.avatar().unwrap();
        level.live_mut(avatar).and_then(Obstacle::as_avatar_mut).unwrap().reached_goal = true;
        let kids: Vec<_> = level.kids().collect();
        for id in &kids[..3] {
            level.live_mut(*id).and_then(Obstacle::as_kid_mut).unwrap().reached_goal = true;
        }
        assert!(!check_victory(&level));

        level.live_mut(kids[3]).and_then(Obstacle::as_kid_mut).unwrap().reached_goal = true;
        assert!(check_victory(&level));

        // A companion lost on the way does not block the others
        level.kill(kids[0], &mut SceneLog::new());
        assert!(check_victory(&level));
    }

    #[test]
    fn test_victory_without_companions_is_impossible() {
        let mut world = KinematicWorld::default();
        let mut level = LevelSpec::empty("alone", 10.0).build(&Tuning::default(), &mut world, &mut SceneLog::new());
        let avatar = level.avatar().unwrap();
        level.live_mut(avatar).and_then(Obstacle::as_avatar_mut).unwrap().reached_goal = true;
        assert!(!check_victory(&level));
    }

    #[test]
    fn test_everyone_at_goal_wins_then_resets() {
        let tuning = Tuning {
            countdown_ticks: 3,
            ..Default::default()
        };
        let mut game = game(home_spec(), tuning);

        game.tick(&TickInput::default());
        assert_eq!(game.phase(), GamePhase::Won);
        let events = game.drain_events();
        assert!(sounds(&events).contains(&SoundEffect::Victory));
        let arrivals = events
            .iter()
            .filter(|event| matches!(event, GameEvent::GoalReached(_)))
            .count();
        assert_eq!(arrivals, KID_COUNT + 1);

        run(&mut game, 2);
        assert_eq!(game.phase(), GamePhase::Won);
        run(&mut game, 1);
        assert_eq!(game.phase(), GamePhase::Playing);

        // Fresh level, nothing reached yet, scene and world rebuilt cleanly
        assert!(!game.level().avatar_model().unwrap().reached_goal);
        assert_eq!(game.level().num_kids_remaining(), KID_COUNT);
        assert_eq!(game.scene().duplicate_inserts, 0);
        assert_eq!(game.scene().stray_removals, 0);
        assert_eq!(game.world().body_count(), game.level().obstacles().count());
    }

    #[test]
    fn test_spikes_fail_level_then_reset() {
        let mut spec = LevelSpec::empty("spiked", 10.0);
        spec.kids = vec![Vec2::new(5.0, 0.35)];
        spec.spikes = vec![Rect::from_corner(0.5, 0.0, 1.0, 0.5)];
        let tuning = Tuning {
            countdown_ticks: 2,
            ..Default::default()
        };
        let mut game = game(spec, tuning);

        game.tick(&TickInput::default());
        assert_eq!(game.phase(), GamePhase::Lost);
        assert!(game.level().have_failed());
        assert_eq!(game.level().avatar(), None);
        assert_eq!(game.level().num_kids_remaining(), 1);
        let events = game.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::Died { .. })));
        assert!(sounds(&events).contains(&SoundEffect::Failure));

        run(&mut game, 2);
        assert_eq!(game.phase(), GamePhase::Playing);
        assert!(game.level().avatar().is_some());
        assert!(!game.level().have_failed());
    }

    #[test]
    fn test_blender_body_spirals_avatar_to_death() {
        let mut spec = LevelSpec::empty("blender", 20.0);
        spec.will = Vec2::new(1.5, 0.5);
        spec.blender = Some(Rect::new(Vec2::new(3.0, 2.0), Vec2::new(1.5, 2.0)));
        let tuning = Tuning::default();
        let limit = tuning.blend_duration_ticks + 5;
        let mut game = game(spec, tuning);

        game.tick(&TickInput::default());
        let avatar = game.level().avatar().unwrap();
        assert!(game.level().avatar_model().unwrap().blended);
        assert_eq!(game.phase(), GamePhase::Playing);

        for _ in 0..limit {
            if game.phase() == GamePhase::Lost {
                break;
            }
            game.tick(&TickInput::default());
        }
        assert_eq!(game.phase(), GamePhase::Lost);
        let events = game.drain_events();
        assert!(events.contains(&GameEvent::Blended(avatar)));
        assert!(sounds(&events).contains(&SoundEffect::Splat));
    }

    #[test]
    fn test_grow_scales_avatar_and_reverts() {
        let tuning = Tuning {
            size_duration_ticks: 3,
            ..Default::default()
        };
        let large_scale = tuning.large_scale;
        let mut game = game(LevelSpec::empty("grow", 10.0), tuning);
        let half = |game: &Game<KinematicWorld, SceneLog>| {
            let id = game.level().avatar().unwrap();
            game.level().live(id).unwrap().body.half_extents()
        };
        let normal = half(&game);

        game.tick(&TickInput {
            grow: true,
            ..Default::default()
        });
        let avatar = game.level().avatar_model().unwrap();
        assert_eq!(avatar.size, AvatarSize::Large);
        assert!(avatar.size_changed_this_frame);
        assert!((half(&game).y - normal.y * large_scale).abs() < 1e-4);

        run(&mut game, 3);
        assert_eq!(game.level().avatar_model().unwrap().size, AvatarSize::Normal);
        assert!((half(&game).y - normal.y).abs() < 1e-4);

        let heard = sounds(&game.drain_events());
        assert!(heard.contains(&SoundEffect::Grow));
        assert!(heard.contains(&SoundEffect::Shrink));
    }

    #[test]
    fn test_jump_needs_ground_and_cooldown() {
        let mut game = game(LevelSpec::empty("jump", 10.0), Tuning::default());
        let jump = TickInput {
            jump: true,
            ..Default::default()
        };

        // Not grounded before the first contact
        game.tick(&jump);
        assert!(game.level().avatar_model().unwrap().grounded);
        let id = game.level().avatar().unwrap();
        assert!(game.level().live(id).unwrap().body.vel.y <= 0.0);

        game.tick(&jump);
        assert!(game.level().live(id).unwrap().body.vel.y > 0.0);
        game.tick(&jump);

        let jumps = sounds(&game.drain_events())
            .into_iter()
            .filter(|sound| *sound == SoundEffect::Jump)
            .count();
        assert_eq!(jumps, 1);
    }

    #[test]
    fn test_switch_opens_linked_bridge() {
        let mut spec = LevelSpec::empty("door", 12.0);
        spec.switches.push(SwitchSpec {
            rect: Rect::from_corner(0.5, 0.0, 1.0, 0.5),
            is_switch: true,
            color: "red".to_string(),
        });
        spec.bridges.push(BridgeSpec {
            rect: Rect::from_corner(5.0, 0.0, 0.5, 2.0),
            color: "red".to_string(),
            length: 2.0,
            is_open: false,
            is_vertical: true,
        });
        let mut game = game(spec, Tuning::default());
        let bridge = game.level().platforms()[0];
        let anchor = game.level().live(bridge).unwrap().body.pos;

        game.tick(&TickInput::default());
        let state = |game: &Game<KinematicWorld, SceneLog>| {
            game.level().live(bridge).and_then(Obstacle::as_platform).unwrap().state
        };
        assert_eq!(state(&game), PlatformState::Opening);

        run(&mut game, 90);
        assert_eq!(state(&game), PlatformState::Open);
        let pos = game.level().live(bridge).unwrap().body.pos;
        assert!((pos.y - (anchor.y + 2.0)).abs() < 0.06, "bridge at {pos}");
        assert!((pos.x - anchor.x).abs() < 1e-6);
    }

    #[test]
    fn test_smashed_cup_drops_the_stack() {
        let mut spec = LevelSpec::empty("cups", 10.0);
        spec.cups = vec![
            Rect::from_corner(4.0, 0.0, 1.0, 1.0),
            Rect::from_corner(4.0, 1.0, 1.0, 1.0),
        ];
        let tuning = Tuning::default();
        let frames = tuning.cup_smash_frames;
        let mut game = game(spec, tuning);
        let (bottom, top) = (game.level().cups()[0], game.level().cups()[1]);

        if let Some(ObstacleKind::Cup(cup)) = game.level_mut().live_mut(bottom).map(|o| &mut o.kind) {
            cup.smashing = true;
        }
        run(&mut game, frames - 1);
        assert!(game.level().live(bottom).is_some());

        run(&mut game, 1);
        assert!(game.level().live(bottom).is_none());
        assert_eq!(game.level().cups(), &[top]);
        assert_eq!(game.level().live(top).unwrap().body.body_type, BodyType::Dynamic);
    }

    #[test]
    fn test_fallen_cup_lands_and_blocks_the_avatar() {
        let mut spec = LevelSpec::empty("cups", 20.0);
        spec.cups = vec![
            Rect::from_corner(6.0, 0.0, 1.0, 1.0),
            Rect::from_corner(6.0, 1.0, 1.0, 1.0),
        ];
        let tuning = Tuning::default();
        let frames = tuning.cup_smash_frames;
        let mut game = game(spec, tuning);
        let (bottom, top) = (game.level().cups()[0], game.level().cups()[1]);

        if let Some(ObstacleKind::Cup(cup)) = game.level_mut().live_mut(bottom).map(|o| &mut o.kind) {
            cup.smashing = true;
        }
        run(&mut game, frames + 60);

        let cup = game.level().live(top).unwrap();
        assert_eq!(cup.body.body_type, BodyType::Static);
        assert!((cup.body.pos.y - 0.5).abs() < 1e-4, "cup at {}", cup.body.pos);
        assert_eq!(cup.as_cup().map(|cup| (cup.tile, cup.falling)), Some(((6, 0), false)));

        let walk = TickInput {
            horizontal: 1.0,
            ..Default::default()
        };
        for _ in 0..120 {
            game.tick(&walk);
        }
        let avatar = game.level().avatar().unwrap();
        let right = game.level().live(avatar).unwrap().body.aabb().max.x;
        assert!(right <= 6.0 + CONTACT_SLOP, "avatar walked through the cup to {right}");
    }

    #[test]
    fn test_squished_jello_is_removed() {
        let mut spec = LevelSpec::empty("jello", 10.0);
        spec.jellos = vec![Rect::from_corner(4.0, 0.0, 2.0, 1.0)];
        let tuning = Tuning::default();
        let frames = tuning.jello_smush_frames;
        let mut game = game(spec, tuning);
        let jello = game.level().jellos()[0];

        if let Some(ObstacleKind::Jello(model)) = game.level_mut().live_mut(jello).map(|o| &mut o.kind) {
            model.smushing = true;
        }
        run(&mut game, frames);
        assert!(game.level().live(jello).is_none());
        assert!(game.level().jellos().is_empty());
        // Collected after the step, so the world no longer holds the body
        assert!(!game.world().contains(jello));
    }

    #[test]
    fn test_pause_freezes_time() {
        let mut game = game(LevelSpec::empty("pause", 10.0), Tuning::default());
        let pause = TickInput {
            pause: true,
            ..Default::default()
        };
        game.tick(&TickInput::default());
        game.tick(&pause);
        assert_eq!(game.phase(), GamePhase::Paused);
        run(&mut game, 5);
        assert_eq!(game.time_ticks(), 1);

        game.tick(&pause);
        assert_eq!(game.phase(), GamePhase::Playing);
        assert_eq!(game.time_ticks(), 2);
    }

    #[test]
    fn test_frame_caps_substeps() {
        let mut game = game(LevelSpec::empty("frame", 10.0), Tuning::default());
        assert_eq!(game.frame(0.5, &TickInput::default()), MAX_SUBSTEPS);
        assert_eq!(game.time_ticks(), MAX_SUBSTEPS as u64);
    }

    #[test]
    fn test_camera_is_clamped_to_level() {
        assert_eq!(camera_x_for(30.0, 44.0, 16.0), 22.0);
        assert_eq!(camera_x_for(43.0, 44.0, 16.0), 28.0);
        assert_eq!(camera_x_for(1.0, 44.0, 16.0), 0.0);
        // Level narrower than the view
        assert_eq!(camera_x_for(5.0, 10.0, 16.0), 0.0);

        let game = game(LevelSpec::builtin(), Tuning::default());
        assert_eq!(game.camera_x(), 0.0);
    }

    #[test]
    fn test_determinism() {
        // Two games with the same seed and inputs end up in the same place
        let mut game1 = game(LevelSpec::builtin(), Tuning::default());
        let mut game2 = game(LevelSpec::builtin(), Tuning::default());

        for i in 0..240 {
            let input = TickInput {
                horizontal: 1.0,
                jump: i % 40 == 0,
                grow: i == 100,
                ..Default::default()
            };
            game1.tick(&input);
            game2.tick(&input);
        }

        let positions = |game: &Game<KinematicWorld, SceneLog>| -> Vec<(ObstacleId, Vec2)> {
            game.level()
                .obstacles()
                .map(|obstacle| (obstacle.id, obstacle.body.pos))
                .collect()
        };
        assert_eq!(game1.time_ticks(), game2.time_ticks());
        assert_eq!(game1.phase(), game2.phase());
        assert_eq!(positions(&game1), positions(&game2));
        assert_eq!(game1.drain_events(), game2.drain_events());
    }
}

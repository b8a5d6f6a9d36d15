//! Contact classification
//!
//! Turns raw begin/end contact events between fixtures into game semantics:
//! grounding, jello bounces and squishes, cup crushing, switch presses, goal
//! arrival, blender and spike deaths.
//!
//! Character fates are intentionally asymmetric:
//! - blender body: the character is blended (slow spiral, stops touching solids)
//! - blender blade: immediate death for avatar and companions alike
//! - spikes: immediate death for the avatar, companions are only impaled

use std::mem;

use glam::Vec2;

use super::body::{FixtureKind, FixtureRef, ObstacleId};
use super::class::CollisionClass;
use super::level::{GameEvent, Level, SoundEffect};
use super::models::{Obstacle, ObstacleKind};
use super::scene::SceneGraph;
use super::world::{Contact, ContactListener};
use crate::tuning::Tuning;

/// What a foot landing does to the thing underneath
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FootReaction {
    Squish,
    Crush,
}

/// Classifies contacts and applies their gameplay reactions
#[derive(Debug, Clone)]
pub struct CollisionController {
    max_velocity_to_crush: f32,
    crush_push: f32,
    avatar_bounce: f32,
    kid_bounce: Vec2,
}

impl CollisionController {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            max_velocity_to_crush: tuning.max_velocity_to_crush,
            crush_push: tuning.crush_push,
            avatar_bounce: tuning.avatar_bounce,
            kid_bounce: tuning.kid_bounce,
        }
    }

    fn avatar_begin(
        &self,
        level: &mut Level,
        scene: &mut dyn SceneGraph,
        me: FixtureRef,
        other: FixtureRef,
        other_class: CollisionClass,
    ) {
        match me.fixture {
            FixtureKind::Foot => self.foot_begin(level, me.obstacle, other, other_class),
            FixtureKind::BodySensor => {
                if other_class != CollisionClass::ButtonSwitch {
                    return;
                }
                let Some(avatar) = level.live_mut(me.obstacle).and_then(Obstacle::as_avatar_mut)
                else {
                    return;
                };
                if avatar.size_changed_this_frame {
                    log::debug!("Ignoring switch touch on the frame the avatar resized");
                    return;
                }
                avatar.colliding_with_switch = true;
                level.switch_start_contact(other.obstacle, me);
            }
            FixtureKind::Main | FixtureKind::Blade => {
                self.avatar_body_begin(level, scene, me.obstacle, other, other_class)
            }
        }
    }

    fn foot_begin(
        &self,
        level: &mut Level,
        avatar_id: ObstacleId,
        other: FixtureRef,
        other_class: CollisionClass,
    ) {
        let Some(Obstacle {
            body,
            kind: ObstacleKind::Avatar(avatar),
            ..
        }) = level.live_mut(avatar_id)
        else {
            return;
        };

        let falling_fast = body.vel.y < self.max_velocity_to_crush;
        let reaction = match other_class {
            CollisionClass::Jello if !avatar.is_small() && falling_fast => Some(FootReaction::Squish),
            CollisionClass::Cup if avatar.is_large() && falling_fast => Some(FootReaction::Crush),
            CollisionClass::Unassigned
            | CollisionClass::Wall
            | CollisionClass::Pineapple
            | CollisionClass::Kid
            | CollisionClass::Jello
            | CollisionClass::Spikes
            | CollisionClass::Cup
            | CollisionClass::Blender
            | CollisionClass::ButtonSwitch
            | CollisionClass::Goal => None,
        };

        match reaction {
            Some(FootReaction::Squish) => body.vel.y = 0.0,
            Some(FootReaction::Crush) => body.vel.y = self.crush_push,
            None => {}
        }

        if other_class.is_ground_like() {
            avatar.begin_ground(other);
        }

        let Some(target) = level.live_mut(other.obstacle) else {
            return;
        };
        let sound = match (reaction, &mut target.kind) {
            (Some(FootReaction::Squish), ObstacleKind::Jello(jello)) => {
                jello.smushing = true;
                Some(SoundEffect::Squish)
            }
            (Some(FootReaction::Crush), ObstacleKind::Cup(cup)) => {
                cup.smashing = true;
                Some(SoundEffect::Crush)
            }
            _ => None,
        };
        if let Some(sound) = sound {
            log::debug!("{} hit by a heavy landing ({sound:?})", target.name);
            level.play(sound);
        }
    }

    fn avatar_body_begin(
        &self,
        level: &mut Level,
        scene: &mut dyn SceneGraph,
        avatar_id: ObstacleId,
        other: FixtureRef,
        other_class: CollisionClass,
    ) {
        match other_class {
            CollisionClass::Jello => self.bounce_avatar(level, avatar_id),
            CollisionClass::Goal => {
                if level.goal() != Some(other.obstacle) {
                    return;
                }
                let Some(avatar) = level.live_mut(avatar_id).and_then(Obstacle::as_avatar_mut)
                else {
                    return;
                };
                if !mem::replace(&mut avatar.reached_goal, true) {
                    log::info!("Avatar reached the goal");
                    level.push_event(GameEvent::GoalReached(avatar_id));
                }
            }
            CollisionClass::Blender => {
                if other.fixture == FixtureKind::Blade {
                    level.blend_and_kill(avatar_id, scene);
                } else {
                    level.blend(avatar_id);
                }
            }
            CollisionClass::Spikes => {
                level.spike_and_kill(avatar_id, scene);
            }
            CollisionClass::Unassigned
            | CollisionClass::Wall
            | CollisionClass::Pineapple
            | CollisionClass::Kid
            | CollisionClass::Cup
            | CollisionClass::ButtonSwitch => {}
        }
    }

    /// Small avatars bounce off jello once per touch; heavier ones are
    /// handled by the foot sensor
    fn bounce_avatar(&self, level: &mut Level, avatar_id: ObstacleId) {
        let Some(Obstacle {
            body,
            kind: ObstacleKind::Avatar(avatar),
            ..
        }) = level.live_mut(avatar_id)
        else {
            return;
        };
        let already_touching = mem::replace(&mut avatar.colliding_with_jello, true);
        if avatar.is_small() && !already_touching {
            body.vel.y = self.avatar_bounce;
            level.play(SoundEffect::Bounce);
        }
    }

    fn kid_begin(
        &self,
        level: &mut Level,
        scene: &mut dyn SceneGraph,
        me: FixtureRef,
        other: FixtureRef,
        other_class: CollisionClass,
    ) {
        let kid_id = me.obstacle;
        let at_goal = level.goal() == Some(other.obstacle);
        let Some(Obstacle {
            body,
            kind: ObstacleKind::Kid(kid),
            name,
            ..
        }) = level.live_mut(kid_id)
        else {
            return;
        };

        if other_class.is_ground_like() {
            kid.begin_ground(other);
        }

        let mut sound = None;
        let mut event = None;
        match other_class {
            CollisionClass::Jello => {
                if !mem::replace(&mut kid.colliding_with_jello, true) {
                    body.vel = Vec2::new(kid.facing * self.kid_bounce.x, self.kid_bounce.y);
                    sound = Some(SoundEffect::Bounce);
                }
                kid.grounded = false;
            }
            CollisionClass::Goal => {
                if at_goal && !mem::replace(&mut kid.reached_goal, true) {
                    log::info!("{name} reached the goal");
                    body.vel.x = 0.0;
                    event = Some(GameEvent::GoalReached(kid_id));
                }
            }
            CollisionClass::Spikes => {
                if !mem::replace(&mut kid.impaled, true) {
                    log::info!("{name} impaled");
                    body.vel = Vec2::ZERO;
                    body.gravity_scale = 0.0;
                    sound = Some(SoundEffect::Impale);
                }
            }
            CollisionClass::Blender => {
                if other.fixture == FixtureKind::Blade {
                    level.blend_and_kill(kid_id, scene);
                } else {
                    level.blend(kid_id);
                }
            }
            CollisionClass::Unassigned
            | CollisionClass::Wall
            | CollisionClass::Pineapple
            | CollisionClass::Kid
            | CollisionClass::Cup
            | CollisionClass::ButtonSwitch => {}
        }

        if let Some(sound) = sound {
            level.play(sound);
        }
        if let Some(event) = event {
            level.push_event(event);
        }
    }

    fn avatar_end(level: &mut Level, me: FixtureRef, other: FixtureRef, other_class: CollisionClass) {
        match me.fixture {
            FixtureKind::Foot => {
                if let Some(avatar) = level.live_mut(me.obstacle).and_then(Obstacle::as_avatar_mut) {
                    avatar.end_ground(other);
                }
            }
            FixtureKind::BodySensor => {
                if other_class != CollisionClass::ButtonSwitch {
                    return;
                }
                if let Some(avatar) = level.live_mut(me.obstacle).and_then(Obstacle::as_avatar_mut) {
                    avatar.colliding_with_switch = false;
                }
                // Release even if the avatar just died so a button does not stay held
                level.switch_end_contact(other.obstacle, me);
            }
            FixtureKind::Main | FixtureKind::Blade => {
                if other_class != CollisionClass::Jello {
                    return;
                }
                if let Some(avatar) = level.live_mut(me.obstacle).and_then(Obstacle::as_avatar_mut) {
                    avatar.colliding_with_jello = false;
                }
            }
        }
    }

    fn kid_end(level: &mut Level, me: FixtureRef, other: FixtureRef, other_class: CollisionClass) {
        let Some(kid) = level.live_mut(me.obstacle).and_then(Obstacle::as_kid_mut) else {
            return;
        };
        kid.end_ground(other);
        if other_class == CollisionClass::Jello {
            kid.colliding_with_jello = false;
        }
    }
}

impl ContactListener for CollisionController {
    /// Handle the start of a contact
    fn begin_contact(&mut self, level: &mut Level, scene: &mut dyn SceneGraph, contact: &Contact) {
        let (Some(class_a), Some(class_b)) = (
            level.class_of(contact.a.obstacle),
            level.class_of(contact.b.obstacle),
        ) else {
            log::debug!("Dropping begin contact with a removed obstacle: {contact:?}");
            return;
        };
        log::trace!(
            "begin {:?}/{:?} <-> {:?}/{:?}",
            class_a,
            contact.a.fixture,
            class_b,
            contact.b.fixture
        );

        if class_a == CollisionClass::Pineapple {
            self.avatar_begin(level, scene, contact.a, contact.b, class_b);
        } else if class_b == CollisionClass::Pineapple {
            self.avatar_begin(level, scene, contact.b, contact.a, class_a);
        }

        if class_a == CollisionClass::Kid {
            self.kid_begin(level, scene, contact.a, contact.b, class_b);
        }
        if class_b == CollisionClass::Kid {
            self.kid_begin(level, scene, contact.b, contact.a, class_a);
        }
    }

    /// Handle the end of a contact. Either side may already be gone.
    fn end_contact(&mut self, level: &mut Level, _scene: &mut dyn SceneGraph, contact: &Contact) {
        let class_a = level.get(contact.a.obstacle).map(Obstacle::class);
        let class_b = level.get(contact.b.obstacle).map(Obstacle::class);
        let other_class = |class: Option<CollisionClass>| class.unwrap_or(CollisionClass::Unassigned);

        if class_a == Some(CollisionClass::Pineapple) {
            Self::avatar_end(level, contact.a, contact.b, other_class(class_b));
        } else if class_b == Some(CollisionClass::Pineapple) {
            Self::avatar_end(level, contact.b, contact.a, other_class(class_a));
        }

        if class_a == Some(CollisionClass::Kid) {
            Self::kid_end(level, contact.a, contact.b, other_class(class_b));
        }
        if class_b == Some(CollisionClass::Kid) {
            Self::kid_end(level, contact.b, contact.a, other_class(class_a));
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::consts::*;
    use crate::sim::body::{Body, BodyType, Fixture};
    use crate::sim::class::Filter;
    use crate::sim::models::{
        Avatar, AvatarSize, ButtonSwitch, Cup, Jello, Kid, MoveablePlatform, PlatformState,
    };
    use crate::sim::scene::{Layer, SceneLog};
    use crate::sim::world::KinematicWorld;

    /// A level with one of everything, wired by hand
    struct Rig {
        level: Level,
        world: KinematicWorld,
        scene: SceneLog,
        controller: CollisionController,
        tuning: Tuning,
        will: ObstacleId,
        kids: Vec<ObstacleId>,
        walls: Vec<ObstacleId>,
        blender: ObstacleId,
        spikes: ObstacleId,
        jello: ObstacleId,
        cup: ObstacleId,
        goal: ObstacleId,
        switch: ObstacleId,
        button: ObstacleId,
        platform: ObstacleId,
    }

    impl Rig {
        fn new() -> Self {
            let tuning = Tuning::default();
            let mut level = Level::new("rig", 40.0);
            let mut world = KinematicWorld::default();
            let mut scene = SceneLog::new();

            let mut add = |level: &mut Level, name: &str, body: Body, kind: ObstacleKind, z: i32| {
                level.add_obstacle(
                    Obstacle::new(name, body, kind).with_texture(name),
                    z,
                    &mut world,
                    &mut scene,
                )
            };
            let block = |x: f32| Body::new(BodyType::Static, Vec2::new(x, 0.0), Vec2::splat(0.5));

            let will_body = Body::new(BodyType::Dynamic, Vec2::ZERO, Vec2::new(0.4, 0.5))
                .with_filter(Filter::AVATAR)
                .with_fixture(Fixture::sensor(
                    FixtureKind::Foot,
                    Vec2::new(0.0, -0.5),
                    Vec2::new(0.3, 0.05),
                ))
                .with_fixture(Fixture::sensor(
                    FixtureKind::BodySensor,
                    Vec2::ZERO,
                    Vec2::new(0.45, 0.25),
                ));
            let will = add(
                &mut level,
                "will",
                will_body,
                ObstacleKind::Avatar(Avatar::default()),
                Z_CHARACTERS,
            );
            let kids: Vec<ObstacleId> = (0..KID_COUNT)
                .map(|i| {
                    let body = Body::new(BodyType::Dynamic, Vec2::ZERO, Vec2::splat(0.3))
                        .with_filter(Filter::KID);
                    add(&mut level, "kid", body, ObstacleKind::Kid(Kid::new(i)), Z_CHARACTERS)
                })
                .collect();
            let walls: Vec<ObstacleId> = (0..2)
                .map(|i| add(&mut level, "wall", block(i as f32), ObstacleKind::Wall, Z_WALLS))
                .collect();
            let blender_body = block(-5.0)
                .with_filter(Filter::HAZARD)
                .as_sensor()
                .with_fixture(Fixture::sensor(FixtureKind::Blade, Vec2::ZERO, Vec2::splat(0.2)));
            let blender = add(
                &mut level,
                "blender",
                blender_body,
                ObstacleKind::Blender(Default::default()),
                Z_CHARACTERS,
            );
            let spikes = add(
                &mut level,
                "spikes",
                block(3.0).with_filter(Filter::HAZARD).as_sensor(),
                ObstacleKind::Spikes,
                Z_OBSTACLES,
            );
            let jello = add(
                &mut level,
                "jello",
                block(4.0),
                ObstacleKind::Jello(Jello::default()),
                Z_OBSTACLES,
            );
            let cup = add(
                &mut level,
                "cup",
                block(5.0),
                ObstacleKind::Cup(Cup::new((5, 0))),
                Z_OBSTACLES,
            );
            let goal = add(&mut level, "goal", block(9.0).as_sensor(), ObstacleKind::Goal, Z_OBSTACLES);
            let switch = add(
                &mut level,
                "switch",
                block(6.0).as_sensor(),
                ObstacleKind::ButtonSwitch(ButtonSwitch::new(true, "red")),
                Z_OBSTACLES,
            );
            let button = add(
                &mut level,
                "button",
                block(7.0).as_sensor(),
                ObstacleKind::ButtonSwitch(ButtonSwitch::new(false, "blue")),
                Z_OBSTACLES,
            );
            let platform = add(
                &mut level,
                "bridge",
                Body::new(BodyType::Kinematic, Vec2::new(8.0, 0.0), Vec2::new(1.0, 0.25)),
                ObstacleKind::Platform(MoveablePlatform::new("red", Vec2::new(8.0, 0.0), 2.0, true)),
                Z_WALLS,
            );
            level.link_switches();

            Self {
                level,
                world,
                scene,
                controller: CollisionController::new(&tuning),
                tuning,
                will,
                kids,
                walls,
                blender,
                spikes,
                jello,
                cup,
                goal,
                switch,
                button,
                platform,
            }
        }

        fn begin(&mut self, a: FixtureRef, b: FixtureRef) {
            let contact = Contact::new(a, b);
            self.controller.begin_contact(&mut self.level, &mut self.scene, &contact);
        }

        fn end(&mut self, a: FixtureRef, b: FixtureRef) {
            let contact = Contact::new(a, b);
            self.controller.end_contact(&mut self.level, &mut self.scene, &contact);
        }

        fn foot(&self) -> FixtureRef {
            FixtureRef::new(self.will, FixtureKind::Foot)
        }

        fn torso(&self) -> FixtureRef {
            FixtureRef::new(self.will, FixtureKind::BodySensor)
        }

        fn avatar(&self) -> &Avatar {
            self.level.get(self.will).and_then(Obstacle::as_avatar).unwrap()
        }

        fn avatar_obstacle_mut(&mut self) -> &mut Obstacle {
            self.level.live_mut(self.will).unwrap()
        }

        fn kid(&self, index: usize) -> &Kid {
            self.level.get(self.kids[index]).and_then(Obstacle::as_kid).unwrap()
        }

        fn set_size(&mut self, size: AvatarSize) {
            let avatar = self.avatar_obstacle_mut().as_avatar_mut().unwrap();
            avatar.size = size;
            avatar.size_changed_this_frame = false;
        }

        fn platform_state(&self) -> PlatformState {
            self.level
                .live(self.platform)
                .and_then(Obstacle::as_platform)
                .unwrap()
                .state
        }

        fn sounds(&mut self) -> Vec<SoundEffect> {
            self.level
                .drain_events()
                .into_iter()
                .filter_map(|e| match e {
                    GameEvent::Sound(sound) => Some(sound),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_foot_on_wall_grounds_and_ungrounds() {
        let mut rig = Rig::new();
        let wall = FixtureRef::main(rig.walls[0]);
        rig.begin(rig.foot(), wall);
        assert!(rig.avatar().grounded);
        rig.end(rig.foot(), wall);
        assert!(!rig.avatar().grounded);
    }

    #[test]
    fn test_leaving_one_of_two_platforms_stays_grounded() {
        let mut rig = Rig::new();
        let (a, b) = (FixtureRef::main(rig.walls[0]), FixtureRef::main(rig.walls[1]));
        rig.begin(rig.foot(), a);
        rig.begin(rig.foot(), b);
        rig.end(rig.foot(), a);
        assert!(rig.avatar().grounded);
        rig.end(rig.foot(), b);
        assert!(!rig.avatar().grounded);
    }

    #[test]
    fn test_only_the_foot_grounds_the_avatar() {
        let mut rig = Rig::new();
        rig.begin(FixtureRef::main(rig.will), FixtureRef::main(rig.walls[0]));
        rig.begin(rig.torso(), FixtureRef::main(rig.walls[1]));
        assert!(!rig.avatar().grounded);

        // Non-ground classes under the foot do not ground either
        rig.begin(rig.foot(), FixtureRef::main(rig.goal));
        assert!(!rig.avatar().grounded);
    }

    #[test]
    fn test_avatar_blender_body_blends_without_removal() {
        let mut rig = Rig::new();
        rig.begin(FixtureRef::main(rig.will), FixtureRef::main(rig.blender));

        let obstacle = rig.level.live(rig.will).unwrap();
        assert!(obstacle.as_avatar().unwrap().blended);
        assert!(!obstacle.removed);
        assert!(!obstacle.body.filter.should_collide(Filter::DEFAULT));
        assert!(obstacle.body.filter.should_collide(Filter::HAZARD));
        assert!(!rig.level.have_failed());
        assert!(rig.sounds().contains(&SoundEffect::Blend));
    }

    #[test]
    fn test_avatar_blade_kills_and_fails_level() {
        let mut rig = Rig::new();
        rig.begin(
            FixtureRef::main(rig.will),
            FixtureRef::new(rig.blender, FixtureKind::Blade),
        );

        assert!(rig.level.get(rig.will).unwrap().removed);
        assert_eq!(rig.level.avatar(), None);
        assert!(rig.level.have_failed());
        assert_eq!(rig.level.num_kids_remaining(), KID_COUNT);
        assert!(!rig.scene.contains(rig.will, Layer::World));
        assert!(rig.sounds().contains(&SoundEffect::Splat));
    }

    #[test]
    fn test_kid_blade_removes_exactly_one() {
        let mut rig = Rig::new();
        let blade = FixtureRef::new(rig.blender, FixtureKind::Blade);
        rig.begin(FixtureRef::main(rig.kids[1]), blade);
        assert!(rig.level.get(rig.kids[1]).unwrap().removed);
        assert_eq!(rig.level.num_kids_remaining(), KID_COUNT - 1);

        // A duplicate callback in the same step finds the kid already removed
        rig.begin(FixtureRef::main(rig.kids[1]), blade);
        assert_eq!(rig.level.num_kids_remaining(), KID_COUNT - 1);
        assert!(!rig.level.have_failed());
    }

    #[test]
    fn test_spikes_impale_kids_but_kill_avatar() {
        let mut rig = Rig::new();
        let spikes = FixtureRef::main(rig.spikes);

        rig.begin(FixtureRef::main(rig.kids[0]), spikes);
        assert!(rig.kid(0).impaled);
        assert!(!rig.level.get(rig.kids[0]).unwrap().removed);
        assert_eq!(rig.level.num_kids_remaining(), KID_COUNT);

        rig.begin(FixtureRef::main(rig.will), spikes);
        assert!(rig.level.get(rig.will).unwrap().removed);
        assert!(rig.level.have_failed());
    }

    #[test]
    fn test_grounded_avatar_then_blade() {
        let mut rig = Rig::new();
        assert!(!rig.avatar().grounded);
        assert_eq!(rig.level.num_kids_remaining(), 4);

        rig.begin(rig.foot(), FixtureRef::main(rig.walls[0]));
        assert!(rig.avatar().grounded);

        rig.begin(
            FixtureRef::main(rig.will),
            FixtureRef::new(rig.blender, FixtureKind::Blade),
        );
        assert!(rig.level.get(rig.will).unwrap().removed);
        assert!(rig.level.have_failed());
        assert_eq!(rig.level.num_kids_remaining(), 4);
    }

    #[test]
    fn test_impaled_kid_later_blended_by_blade() {
        let mut rig = Rig::new();
        rig.begin(FixtureRef::main(rig.kids[2]), FixtureRef::main(rig.spikes));
        assert!(rig.kid(2).impaled);
        assert_eq!(rig.level.kid(2), Some(rig.kids[2]));
        assert_eq!(rig.level.num_kids_remaining(), 4);

        rig.begin(
            FixtureRef::main(rig.kids[2]),
            FixtureRef::new(rig.blender, FixtureKind::Blade),
        );
        assert!(rig.level.get(rig.kids[2]).unwrap().removed);
        assert_eq!(rig.level.num_kids_remaining(), 3);
        assert!(!rig.level.have_failed());
    }

    #[test]
    fn test_kid_blender_body_blends() {
        let mut rig = Rig::new();
        rig.begin(FixtureRef::main(rig.kids[3]), FixtureRef::main(rig.blender));
        assert!(rig.kid(3).blended);
        assert!(!rig.level.get(rig.kids[3]).unwrap().removed);
        assert_eq!(rig.level.num_kids_remaining(), 4);
    }

    #[test]
    fn test_switch_toggles_once_per_touch() {
        let mut rig = Rig::new();
        let switch = FixtureRef::main(rig.switch);

        rig.begin(rig.torso(), switch);
        assert_eq!(rig.platform_state(), PlatformState::Opening);
        assert!(rig.avatar().colliding_with_switch);

        // Spurious duplicate begin is ignored
        rig.begin(rig.torso(), switch);
        assert_eq!(rig.platform_state(), PlatformState::Opening);

        // Leaving a switch does nothing, touching again toggles back
        rig.end(rig.torso(), switch);
        assert_eq!(rig.platform_state(), PlatformState::Opening);
        assert!(!rig.avatar().colliding_with_switch);
        rig.begin(rig.torso(), switch);
        assert_eq!(rig.platform_state(), PlatformState::Closing);
    }

    #[test]
    fn test_unlinked_button_press_and_release() {
        let mut rig = Rig::new();
        let button = FixtureRef::main(rig.button);
        rig.begin(rig.torso(), button);
        assert!(rig.sounds().contains(&SoundEffect::Click));
        rig.end(rig.torso(), button);
        assert!(rig.sounds().contains(&SoundEffect::Click));
        assert_eq!(rig.platform_state(), PlatformState::Closed);
    }

    #[test]
    fn test_button_is_momentary_for_linked_platform() {
        let mut rig = Rig::new();
        let button = rig.button;
        rig.level
            .live_mut(button)
            .and_then(Obstacle::as_switch_mut)
            .unwrap()
            .linked = vec![rig.platform];

        rig.begin(rig.torso(), FixtureRef::main(button));
        assert_eq!(rig.platform_state(), PlatformState::Opening);
        rig.end(rig.torso(), FixtureRef::main(button));
        assert_eq!(rig.platform_state(), PlatformState::Closing);
    }

    #[test]
    fn test_switch_ignored_on_resize_frame() {
        let mut rig = Rig::new();
        rig.avatar_obstacle_mut()
            .as_avatar_mut()
            .unwrap()
            .size_changed_this_frame = true;
        rig.begin(rig.torso(), FixtureRef::main(rig.switch));
        assert_eq!(rig.platform_state(), PlatformState::Closed);
        assert!(!rig.avatar().colliding_with_switch);
    }

    #[test]
    fn test_heavy_landing_squishes_jello() {
        let mut rig = Rig::new();
        rig.avatar_obstacle_mut().body.vel.y = rig.tuning.max_velocity_to_crush - 1.0;
        rig.begin(rig.foot(), FixtureRef::main(rig.jello));

        assert_eq!(rig.level.live(rig.will).unwrap().body.vel.y, 0.0);
        let jello = rig.level.live(rig.jello).unwrap();
        assert!(matches!(&jello.kind, ObstacleKind::Jello(j) if j.smushing));
        assert!(rig.avatar().grounded);
        assert_eq!(rig.sounds(), vec![SoundEffect::Squish]);
    }

    #[test]
    fn test_small_avatar_never_squishes() {
        let mut rig = Rig::new();
        rig.set_size(AvatarSize::Small);
        rig.avatar_obstacle_mut().body.vel.y = rig.tuning.max_velocity_to_crush - 1.0;
        rig.begin(rig.foot(), FixtureRef::main(rig.jello));
        let jello = rig.level.live(rig.jello).unwrap();
        assert!(matches!(&jello.kind, ObstacleKind::Jello(j) if !j.smushing));
    }

    #[test]
    fn test_small_avatar_bounces_once_per_touch() {
        let mut rig = Rig::new();
        rig.set_size(AvatarSize::Small);
        let body = FixtureRef::main(rig.will);
        let jello = FixtureRef::main(rig.jello);

        rig.begin(body, jello);
        assert_eq!(rig.level.live(rig.will).unwrap().body.vel.y, rig.tuning.avatar_bounce);
        assert!(rig.avatar().colliding_with_jello);

        rig.avatar_obstacle_mut().body.vel.y = 0.0;
        rig.begin(body, jello);
        assert_eq!(rig.level.live(rig.will).unwrap().body.vel.y, 0.0);

        rig.end(body, jello);
        assert!(!rig.avatar().colliding_with_jello);
    }

    #[test]
    fn test_normal_avatar_does_not_bounce() {
        let mut rig = Rig::new();
        rig.begin(FixtureRef::main(rig.will), FixtureRef::main(rig.jello));
        assert_eq!(rig.level.live(rig.will).unwrap().body.vel.y, 0.0);
    }

    #[test]
    fn test_large_falling_avatar_crushes_cup() {
        let mut rig = Rig::new();
        rig.set_size(AvatarSize::Large);
        rig.avatar_obstacle_mut().body.vel.y = rig.tuning.max_velocity_to_crush - 1.0;
        rig.begin(rig.foot(), FixtureRef::main(rig.cup));

        assert_eq!(rig.level.live(rig.will).unwrap().body.vel.y, rig.tuning.crush_push);
        let cup = rig.level.live(rig.cup).and_then(Obstacle::as_cup).unwrap();
        assert!(cup.smashing);
    }

    #[test]
    fn test_normal_avatar_stands_on_cup() {
        let mut rig = Rig::new();
        rig.avatar_obstacle_mut().body.vel.y = rig.tuning.max_velocity_to_crush - 1.0;
        rig.begin(rig.foot(), FixtureRef::main(rig.cup));
        let cup = rig.level.live(rig.cup).and_then(Obstacle::as_cup).unwrap();
        assert!(!cup.smashing);
        assert!(rig.avatar().grounded);
    }

    #[test]
    fn test_kid_jello_bounce_clears_grounded() {
        let mut rig = Rig::new();
        let kid = FixtureRef::main(rig.kids[0]);
        rig.begin(kid, FixtureRef::main(rig.walls[0]));
        assert!(rig.kid(0).grounded);

        rig.begin(kid, FixtureRef::main(rig.jello));
        let body = &rig.level.live(rig.kids[0]).unwrap().body;
        assert_eq!(body.vel, rig.tuning.kid_bounce);
        assert!(!rig.kid(0).grounded);
        assert!(rig.kid(0).colliding_with_jello);

        rig.end(kid, FixtureRef::main(rig.jello));
        assert!(!rig.kid(0).colliding_with_jello);
    }

    #[test]
    fn test_goal_reached_flags() {
        let mut rig = Rig::new();
        let goal = FixtureRef::main(rig.goal);
        rig.begin(FixtureRef::main(rig.will), goal);
        assert!(rig.avatar().reached_goal);
        for index in 0..KID_COUNT {
            rig.begin(FixtureRef::main(rig.kids[index]), goal);
            assert!(rig.kid(index).reached_goal);
        }
        let arrivals = rig
            .level
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::GoalReached(_)))
            .count();
        assert_eq!(arrivals, KID_COUNT + 1);
    }

    #[test]
    fn test_end_contact_after_cup_collected_ungrounds() {
        let mut rig = Rig::new();
        let cup = FixtureRef::main(rig.cup);
        rig.begin(rig.foot(), cup);
        assert!(rig.avatar().grounded);

        rig.level.kill(rig.cup, &mut rig.scene);
        rig.level.garbage_collect(&mut rig.world);
        rig.end(rig.foot(), cup);
        assert!(!rig.avatar().grounded);
    }

    #[test]
    fn test_begin_with_removed_obstacle_is_ignored() {
        let mut rig = Rig::new();
        rig.level.kill(rig.kids[0], &mut rig.scene);
        rig.begin(FixtureRef::main(rig.kids[0]), FixtureRef::main(rig.spikes));
        assert!(!rig.kid(0).impaled);
    }

    #[derive(Debug, Clone, Copy)]
    enum FootEvent {
        Begin(usize),
        End(usize),
    }

    fn foot_event() -> impl Strategy<Value = FootEvent> {
        prop_oneof![
            (0usize..2).prop_map(FootEvent::Begin),
            (0usize..2).prop_map(FootEvent::End),
        ]
    }

    proptest! {
        #[test]
        fn grounded_tracks_ground_fixture_set(events in prop::collection::vec(foot_event(), 1..40)) {
            let mut rig = Rig::new();
            let mut touching = [false; 2];

            for event in events {
                match event {
                    FootEvent::Begin(i) if !touching[i] => {
                        touching[i] = true;
                        rig.begin(rig.foot(), FixtureRef::main(rig.walls[i]));
                    }
                    FootEvent::End(i) if touching[i] => {
                        touching[i] = false;
                        rig.end(rig.foot(), FixtureRef::main(rig.walls[i]));
                    }
                    // The engine never repeats a begin or ends an unknown pair
                    FootEvent::Begin(_) | FootEvent::End(_) => continue,
                }
                prop_assert_eq!(rig.avatar().grounded, touching.iter().any(|t| *t));
            }
        }
    }
}

//! Player entity and its state machine

use serde::{Deserialize, Serialize};

use super::ability::{Ability, Ammo, PICKUP_AMMO};
use super::enemy::{EnemyId, EnemyKind};
use super::input::InputFrame;
use super::physics::{apply_gravity, clamp_to_level, resolve, Body};
use super::tuning::Tuning;
use super::world::{Cell, World};

/// Player slot: 0 on the authority, 1 on the mirror
pub type PlayerId = u8;

pub const PLAYER_SIZE: f32 = 24.0;
pub const START_HP: u8 = 3;
pub const MAX_HP: u8 = 6;
pub const START_LIVES: u8 = 3;
pub const INVULN_TICKS: u32 = 90;
/// Ticks the USING pose is held after firing an ability
pub const USING_TICKS: u32 = 12;

const STOMP_BOUNCE: f32 = -7.0;
const DEATH_IMPULSE: f32 = -8.0;
const ROCK_SLAM_VY: f32 = 8.0;
const FRICTION: f32 = 0.75;
const SWALLOW_SCORE: u32 = 200;
const SPIT_SCORE: u32 = 50;
const STAR_SCORE: u32 = 10;
const FALL_OUT_MARGIN: f32 = 64.0;

/// Behavioral state, derived each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    #[default]
    Idle,
    Walk,
    Jump,
    Fall,
    Float,
    Inhaling,
    Holding,
    Using,
    Rock,
    Dead,
}

/// Captured enemy, referenced by id only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldEnemy {
    pub id: EnemyId,
    pub kind: EnemyKind,
}

/// Side effect for the simulation loop to carry out this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    Spit(HeldEnemy),
    Fire(Ability),
}

/// Result of a damaging contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HurtOutcome {
    /// Invulnerable or already dead
    Ignored,
    /// Ability knocked loose; no health lost
    LostAbility(Ability),
    Damaged,
    Died,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub body: Body,
    pub facing_right: bool,
    pub on_ground: bool,
    pub state: PlayerState,
    pub hp: u8,
    pub lives: u8,
    pub score: u32,
    pub stars: u32,
    pub ability: Option<Ability>,
    pub ammo: Ammo,
    pub inhaling: bool,
    pub floating: bool,
    pub float_flaps: u8,
    pub held: Option<HeldEnemy>,
    pub invuln: u32,
    /// Head hit a ceiling during the last update
    pub bumped_head: bool,
    jump_ticks: u32,
    using_ticks: u32,
    rock: bool,
    prev_up: bool,
    prev_down: bool,
    pending: Option<PlayerAction>,
}

impl Player {
    pub fn new(id: PlayerId, spawn: Cell, tuning: &Tuning) -> Self {
        let (x, y) = spawn.origin();
        Self {
            id,
            body: Body::new(x, y, PLAYER_SIZE, PLAYER_SIZE),
            facing_right: true,
            on_ground: false,
            state: PlayerState::Idle,
            hp: START_HP,
            lives: START_LIVES,
            score: 0,
            stars: 0,
            ability: None,
            ammo: Ammo::Limited(0),
            inhaling: false,
            floating: false,
            float_flaps: tuning.max_float_flaps,
            held: None,
            invuln: 0,
            bumped_head: false,
            jump_ticks: 0,
            using_ticks: 0,
            rock: false,
            prev_up: false,
            prev_down: false,
            pending: None,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.state == PlayerState::Dead
    }

    /// Put the player back at a spawn point, alive, keeping score
    pub fn respawn(&mut self, spawn: Cell, tuning: &Tuning) {
        let (score, stars) = (self.score, self.stars);
        *self = Self::new(self.id, spawn, tuning);
        self.score = score;
        self.stars = stars;
    }

    /// Advance one tick
    pub fn update(&mut self, input: &InputFrame, world: &dyn World, tuning: &Tuning) {
        self.invuln = self.invuln.saturating_sub(1);

        if self.is_dead() {
            self.body.vy = apply_gravity(self.body.vy, tuning.gravity_fall, tuning.max_fall);
            self.body.y += self.body.vy;
            return;
        }

        self.pending = None;
        let was_on_ground = self.on_ground;

        // Horizontal
        if input.left {
            self.body.vx = -tuning.walk_speed;
            self.facing_right = false;
        } else if input.right {
            self.body.vx = tuning.walk_speed;
            self.facing_right = true;
        } else {
            self.body.vx *= FRICTION;
            if self.body.vx.abs() < 0.05 {
                self.body.vx = 0.0;
            }
        }

        // Held enemy, ability, or inhale
        let down_just = input.down && !self.prev_down;
        self.prev_down = input.down;
        if self.held.is_some() {
            self.inhaling = false;
            if down_just {
                self.swallow();
            } else if input.action_just {
                self.spit();
            }
        } else if self.ability.is_some() {
            self.inhaling = false;
            if input.action_just {
                self.use_ability();
            }
        } else {
            self.inhaling = input.action;
        }

        // Jump / float
        let jump_just = input.jump_just || (input.up && !self.prev_up);
        self.prev_up = input.up;
        if jump_just {
            if self.on_ground {
                self.body.vy = tuning.jump_vel;
                self.on_ground = false;
                self.floating = false;
                self.float_flaps = tuning.max_float_flaps;
            } else if self.float_flaps > 0 {
                self.floating = true;
                self.body.vy = tuning.float_flap_vel;
                self.float_flaps -= 1;
            }
        }
        if input.down && self.floating {
            self.floating = false;
        }

        // Variable jump height
        if input.up && self.body.vy < 0.0 {
            self.jump_ticks += 1;
            if self.jump_ticks <= tuning.jump_hold_ticks {
                self.body.vy += tuning.jump_vel * tuning.jump_hold_boost;
            }
        } else {
            self.jump_ticks = 0;
        }

        // Gravity
        let (gravity, max_fall) = if self.floating {
            (tuning.float_gravity, tuning.float_max_fall)
        } else if self.body.vy < 0.0 {
            (tuning.gravity_rise, tuning.max_fall)
        } else {
            (tuning.gravity_fall, tuning.max_fall)
        };
        // a rock slam falls faster than the normal terminal speed
        let max_fall = if self.rock { max_fall.max(ROCK_SLAM_VY) } else { max_fall };
        self.body.vy = apply_gravity(self.body.vy, gravity, max_fall);

        let contacts = resolve(&mut self.body, world);
        clamp_to_level(&mut self.body, world);
        self.on_ground = contacts.on_ground;
        self.bumped_head = contacts.hit_ceiling;

        if self.on_ground {
            if !was_on_ground {
                self.floating = false;
                self.float_flaps = tuning.max_float_flaps;
            }
            self.rock = false;
        }

        if self.body.y > world.height_px() + FALL_OUT_MARGIN {
            self.die();
            return;
        }

        self.using_ticks = self.using_ticks.saturating_sub(1);
        self.state = self.derive_state();
    }

    fn derive_state(&self) -> PlayerState {
        if self.held.is_some() {
            PlayerState::Holding
        } else if self.inhaling {
            PlayerState::Inhaling
        } else if self.rock {
            PlayerState::Rock
        } else if self.using_ticks > 0 {
            PlayerState::Using
        } else if self.floating {
            PlayerState::Float
        } else if !self.on_ground {
            if self.body.vy < 0.0 {
                PlayerState::Jump
            } else {
                PlayerState::Fall
            }
        } else if self.body.vx != 0.0 {
            PlayerState::Walk
        } else {
            PlayerState::Idle
        }
    }

    fn swallow(&mut self) {
        let Some(held) = self.held.take() else {
            return;
        };
        let ability = held.kind.profile().ability;
        self.ability = Some(ability);
        self.ammo = ability.starting_ammo();
        self.score += SWALLOW_SCORE;
    }

    fn spit(&mut self) {
        let Some(held) = self.held.take() else {
            return;
        };
        self.score += SPIT_SCORE;
        self.pending = Some(PlayerAction::Spit(held));
    }

    fn use_ability(&mut self) {
        let Some(ability) = self.ability else {
            return;
        };
        if self.ammo.is_empty() {
            self.ability = None;
            return;
        }
        if self.ammo.consume() {
            self.ability = None;
        }
        self.pending = Some(PlayerAction::Fire(ability));
        self.using_ticks = USING_TICKS;
        if ability == Ability::Rock {
            self.body.vy = ROCK_SLAM_VY;
            self.rock = true;
        }
    }

    /// Action produced by the last update, consumed once
    pub fn take_action(&mut self) -> Option<PlayerAction> {
        self.pending.take()
    }

    /// Capture an enemy pulled into the mouth
    pub fn capture(&mut self, id: EnemyId, kind: EnemyKind) {
        self.held = Some(HeldEnemy { id, kind });
        self.inhaling = false;
        self.state = PlayerState::Holding;
    }

    pub fn hurt(&mut self) -> HurtOutcome {
        if self.invuln > 0 || self.is_dead() {
            return HurtOutcome::Ignored;
        }
        self.invuln = INVULN_TICKS;
        if let Some(ability) = self.ability.take() {
            self.ammo = Ammo::Limited(0);
            return HurtOutcome::LostAbility(ability);
        }
        self.hp = self.hp.saturating_sub(1);
        if self.hp == 0 {
            self.die();
            return HurtOutcome::Died;
        }
        HurtOutcome::Damaged
    }

    /// Enter DEAD. Also spends one life, so callers must not decrement `lives` again.
    fn die(&mut self) {
        self.hp = 0;
        self.lives = self.lives.saturating_sub(1);
        self.state = PlayerState::Dead;
        self.body.vy = DEATH_IMPULSE;
        self.held = None;
        self.inhaling = false;
        self.floating = false;
        self.rock = false;
        self.pending = None;
    }

    pub fn stomp_bounce(&mut self) {
        self.body.vy = STOMP_BOUNCE;
    }

    pub fn add_star(&mut self) {
        self.stars += 1;
        self.score += STAR_SCORE;
    }

    pub fn add_health(&mut self) {
        self.hp = (self.hp + 2).min(MAX_HP);
    }

    /// Take a dropped ability. Only an empty-handed player can.
    pub fn grant_pickup(&mut self, ability: Ability) -> bool {
        if self.ability.is_some() || self.held.is_some() {
            return false;
        }
        self.ability = Some(ability);
        self.ammo = Ammo::Limited(PICKUP_AMMO);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::level::TileMap;

    const FLAT: &str = "
...................G
....................
....................
.1.2................
####################
";

    fn setup() -> (TileMap, Tuning, Player) {
        let world = TileMap::parse("flat", FLAT).unwrap();
        let tuning = Tuning::default();
        let player = Player::new(0, world.p1_spawn(), &tuning);
        (world, tuning, player)
    }

    fn settle(player: &mut Player, world: &TileMap, tuning: &Tuning) {
        for _ in 0..30 {
            player.update(&InputFrame::default(), world, tuning);
        }
        assert!(player.on_ground);
    }

    fn press(f: impl FnOnce(&mut InputFrame)) -> InputFrame {
        let mut input = InputFrame::default();
        f(&mut input);
        input
    }

    #[test]
    fn grounded_jump_then_flaps_spend_budget() {
        let (world, tuning, mut p) = setup();
        settle(&mut p, &world, &tuning);
        p.update(&press(|i| i.jump_just = true), &world, &tuning);
        assert_eq!(p.state, PlayerState::Jump);
        assert_eq!(p.float_flaps, tuning.max_float_flaps);

        p.update(&InputFrame::default(), &world, &tuning);
        p.update(&press(|i| i.jump_just = true), &world, &tuning);
        assert_eq!(p.state, PlayerState::Float);
        assert_eq!(p.float_flaps, tuning.max_float_flaps - 1);

        p.update(&press(|i| i.down = true), &world, &tuning);
        assert!(!p.floating);
    }

    #[test]
    fn landing_restores_float_budget() {
        let (world, tuning, mut p) = setup();
        settle(&mut p, &world, &tuning);
        p.update(&press(|i| i.jump_just = true), &world, &tuning);
        p.update(&press(|i| i.jump_just = true), &world, &tuning);
        assert!(p.float_flaps < tuning.max_float_flaps);
        p.update(&press(|i| i.down = true), &world, &tuning);
        for _ in 0..120 {
            p.update(&InputFrame::default(), &world, &tuning);
        }
        assert!(p.on_ground);
        assert_eq!(p.float_flaps, tuning.max_float_flaps);
        assert_eq!(p.state, PlayerState::Idle);
    }

    #[test]
    fn holding_action_inhales_without_ability() {
        let (world, tuning, mut p) = setup();
        settle(&mut p, &world, &tuning);
        p.update(&press(|i| i.action = true), &world, &tuning);
        assert!(p.inhaling);
        assert_eq!(p.state, PlayerState::Inhaling);
    }

    #[test]
    fn swallow_grants_ability_and_score() {
        let (world, tuning, mut p) = setup();
        p.capture(7, EnemyKind::HotHead);
        p.update(&press(|i| i.down = true), &world, &tuning);
        assert_eq!(p.held, None);
        assert_eq!(p.ability, Some(Ability::Fire));
        assert_eq!(p.ammo, Ammo::Limited(6));
        assert_eq!(p.score, 200);
        assert_eq!(p.take_action(), None);
    }

    #[test]
    fn spit_enqueues_one_action() {
        let (world, tuning, mut p) = setup();
        p.capture(7, EnemyKind::Rocky);
        p.update(
            &press(|i| {
                i.action = true;
                i.action_just = true;
            }),
            &world,
            &tuning,
        );
        assert_eq!(
            p.take_action(),
            Some(PlayerAction::Spit(HeldEnemy {
                id: 7,
                kind: EnemyKind::Rocky
            }))
        );
        assert_eq!(p.take_action(), None);
        assert_eq!(p.score, 50);
        assert_eq!(p.ability, None);
    }

    #[test]
    fn swallow_wins_over_spit_in_same_tick() {
        let (world, tuning, mut p) = setup();
        p.capture(3, EnemyKind::Chilly);
        p.update(
            &press(|i| {
                i.down = true;
                i.action_just = true;
            }),
            &world,
            &tuning,
        );
        assert_eq!(p.ability, Some(Ability::Ice));
        assert_eq!(p.take_action(), None);
    }

    #[test]
    fn last_shot_clears_ability() {
        let (world, tuning, mut p) = setup();
        p.ability = Some(Ability::Fire);
        p.ammo = Ammo::Limited(1);
        p.update(&press(|i| i.action_just = true), &world, &tuning);
        assert_eq!(p.take_action(), Some(PlayerAction::Fire(Ability::Fire)));
        assert_eq!(p.ammo, Ammo::Limited(0));
        assert_eq!(p.ability, None);
        assert_eq!(p.state, PlayerState::Using);
    }

    #[test]
    fn hurt_with_ability_keeps_health() {
        let (_, _, mut p) = setup();
        p.ability = Some(Ability::Sword);
        p.ammo = Ammo::Unlimited;
        assert_eq!(p.hurt(), HurtOutcome::LostAbility(Ability::Sword));
        assert_eq!(p.hp, START_HP);
        assert_eq!(p.invuln, INVULN_TICKS);
        assert_eq!(p.hurt(), HurtOutcome::Ignored);
    }

    #[test]
    fn third_hit_kills() {
        let (world, tuning, mut p) = setup();
        assert_eq!(p.hurt(), HurtOutcome::Damaged);
        p.invuln = 0;
        assert_eq!(p.hurt(), HurtOutcome::Damaged);
        p.invuln = 0;
        assert_eq!(p.hurt(), HurtOutcome::Died);
        assert!(p.is_dead());
        assert_eq!(p.lives, START_LIVES - 1);
        assert_eq!(p.body.vy, -8.0);
        let y = p.body.y;
        p.update(&press(|i| i.right = true), &world, &tuning);
        assert_eq!(p.body.vx, 0.0);
        assert!(p.body.y < y);
    }

    #[test]
    fn falling_out_spends_one_life() {
        let (world, tuning, mut p) = setup();
        p.body.y = world.height_px() + FALL_OUT_MARGIN + 1.0;
        p.update(&InputFrame::default(), &world, &tuning);
        assert!(p.is_dead());
        assert_eq!(p.lives, START_LIVES - 1);

        p.invuln = 0;
        assert_eq!(p.hurt(), HurtOutcome::Ignored);
        for _ in 0..10 {
            p.update(&InputFrame::default(), &world, &tuning);
        }
        assert_eq!(p.lives, START_LIVES - 1);
    }

    #[test]
    fn health_caps_at_six() {
        let (_, _, mut p) = setup();
        p.add_health();
        p.add_health();
        assert_eq!(p.hp, MAX_HP);
    }

    #[test]
    fn pickup_requires_empty_hands() {
        let (_, _, mut p) = setup();
        assert!(p.grant_pickup(Ability::Leaf));
        assert_eq!(p.ammo, Ammo::Limited(PICKUP_AMMO));
        assert!(!p.grant_pickup(Ability::Ice));
    }
}

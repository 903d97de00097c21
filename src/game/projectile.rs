//! Ability shots, spat stars and enemy sub-projectiles

use serde::{Deserialize, Serialize};

use super::ability::Ability;
use super::enemy::EnemyKind;
use super::physics::{Aabb, Body};
use super::world::{solid_at, World, GRAVITY};

/// Projectiles leave the world this far below the level floor
const FALL_OUT_MARGIN: f32 = 64.0;

/// Ability projectile flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotKind {
    Fire,
    Ice,
    Water,
    Ninja,
    Lightning,
    Sumo,
    Leaf,
}

/// Per-kind launch parameters
#[derive(Debug, Clone, Copy)]
struct ShotStats {
    vx: f32,
    vy: f32,
    w: f32,
    h: f32,
    life: u32,
    gravity: f32,
}

impl ShotKind {
    fn stats(self) -> ShotStats {
        let s = |vx, vy, w, h, life, gravity| ShotStats {
            vx,
            vy,
            w,
            h,
            life,
            gravity,
        };
        match self {
            ShotKind::Fire => s(6.0, 0.0, 20.0, 20.0, 40, 0.08),
            ShotKind::Ice => s(5.0, 0.0, 18.0, 18.0, 45, 0.0),
            ShotKind::Water => s(7.0, -1.0, 14.0, 14.0, 60, 0.12),
            ShotKind::Ninja => s(9.0, 0.0, 12.0, 12.0, 55, 0.0),
            ShotKind::Leaf => s(4.0, 0.0, 24.0, 32.0, 50, 0.0),
            ShotKind::Lightning => s(0.0, 0.0, 8.0, 0.0, 20, 0.0),
            ShotKind::Sumo => s(0.0, 0.0, 96.0, 20.0, 25, 0.0),
        }
    }

    /// Stationary zones that keep hitting after the first enemy
    pub fn pierces(self) -> bool {
        matches!(self, ShotKind::Lightning | ShotKind::Sumo)
    }
}

/// Projectile spawned by a copy ability
#[derive(Debug, Clone)]
pub struct AbilityShot {
    pub kind: ShotKind,
    pub body: Body,
    /// Player credited with kills
    pub owner: u8,
    pub dead: bool,
    life: u32,
    max_life: u32,
    gravity: f32,
}

impl AbilityShot {
    /// Launch the projectile for an ability. Sword and rock act directly on
    /// the user and have no projectile.
    pub fn launch(ability: Ability, user: &Body, facing_right: bool, owner: u8) -> Option<Self> {
        let kind = match ability {
            Ability::Fire => ShotKind::Fire,
            Ability::Ice => ShotKind::Ice,
            Ability::Water => ShotKind::Water,
            Ability::Ninja => ShotKind::Ninja,
            Ability::Lightning => ShotKind::Lightning,
            Ability::Sumo => ShotKind::Sumo,
            Ability::Leaf => ShotKind::Leaf,
            Ability::Sword | Ability::Rock => return None,
        };
        let stats = kind.stats();
        let dir = if facing_right { 1.0 } else { -1.0 };

        let body = match kind {
            ShotKind::Lightning => {
                let top = user.y - 80.0;
                let bottom = user.bottom() + 48.0;
                Body::new(user.center_x() - stats.w / 2.0, top, stats.w, bottom - top)
            }
            ShotKind::Sumo => Body::new(
                user.center_x() - stats.w / 2.0,
                user.bottom() - stats.h,
                stats.w,
                stats.h,
            ),
            _ => {
                let mouth_x = user.x + if facing_right { user.w + 4.0 } else { -12.0 };
                let mut body = Body::new(
                    mouth_x - stats.w / 2.0,
                    user.center_y() - stats.h / 2.0,
                    stats.w,
                    stats.h,
                );
                body.vx = dir * stats.vx;
                body.vy = stats.vy;
                body
            }
        };

        Some(Self {
            kind,
            body,
            owner,
            dead: false,
            life: stats.life,
            max_life: stats.life,
            gravity: stats.gravity,
        })
    }

    pub fn update(&mut self, world: &dyn World) {
        if self.dead {
            return;
        }
        self.life = self.life.saturating_sub(1);
        if self.life == 0 {
            self.dead = true;
            return;
        }
        if self.kind.pierces() {
            return;
        }
        self.body.x += self.body.vx;
        self.body.y += self.body.vy;
        self.body.vy += self.gravity;

        let out = self.body.x + self.body.w < 0.0
            || self.body.x > world.width_px()
            || self.body.y > world.height_px() + FALL_OUT_MARGIN;
        if out || solid_at(world, self.body.center_x(), self.body.center_y()) {
            self.dead = true;
        }
    }

    /// Fade factor for rendering
    pub fn alpha(&self) -> f32 {
        self.life as f32 / self.max_life as f32
    }
}

/// Star spat out of a held enemy
#[derive(Debug, Clone)]
pub struct InhaleStar {
    pub body: Body,
    /// Enemy it was made from, for rendering
    pub source: EnemyKind,
    pub owner: u8,
    pub dead: bool,
    life: u32,
}

impl InhaleStar {
    pub const SIZE: f32 = 14.0;
    const LIFE: u32 = 90;
    const SPEED: f32 = 6.0;

    pub fn spit(from: &Body, facing_right: bool, source: EnemyKind, owner: u8) -> Self {
        let dir = if facing_right { 1.0 } else { -1.0 };
        let half = Self::SIZE / 2.0;
        let mut body = Body::new(
            from.center_x() - half,
            from.center_y() - half,
            Self::SIZE,
            Self::SIZE,
        );
        body.vx = dir * Self::SPEED;
        body.vy = -2.0;
        Self {
            body,
            source,
            owner,
            dead: false,
            life: Self::LIFE,
        }
    }

    pub fn update(&mut self, world: &dyn World) {
        if self.dead {
            return;
        }
        self.life = self.life.saturating_sub(1);
        if self.life == 0 {
            self.dead = true;
            return;
        }
        self.body.x += self.body.vx;
        self.body.y += self.body.vy;
        self.body.vy += GRAVITY * 0.3;
        if solid_at(world, self.body.center_x(), self.body.center_y())
            || self.body.y > world.height_px() + FALL_OUT_MARGIN
        {
            self.dead = true;
        }
    }

    pub fn alpha(&self) -> f32 {
        self.life as f32 / Self::LIFE as f32
    }
}

/// Ballistic point projectile emitted by an enemy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyShot {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    gravity: f32,
    pub life: u32,
}

impl EnemyShot {
    const HALF: f32 = 5.0;

    pub fn fire_bolt(x: f32, y: f32, dir: f32) -> Self {
        Self {
            x,
            y,
            vx: dir * 3.5,
            vy: -1.5,
            gravity: 0.15,
            life: 70,
        }
    }

    pub fn thrown_star(x: f32, y: f32, dir: f32) -> Self {
        Self {
            x,
            y,
            vx: dir * 5.0,
            vy: 0.0,
            gravity: 0.05,
            life: 60,
        }
    }

    pub fn update(&mut self) {
        self.x += self.vx;
        self.y += self.vy;
        self.vy += self.gravity;
        self.life = self.life.saturating_sub(1);
    }

    pub fn hitbox(&self) -> Aabb {
        Aabb::new(
            self.x - Self::HALF,
            self.y - Self::HALF,
            Self::HALF * 2.0,
            Self::HALF * 2.0,
        )
    }

    pub fn is_spent(&self) -> bool {
        self.life == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::level::TileMap;

    const OPEN: &str = "
........................G
.1.2.....................
.........................
.........................
#########################
";

    fn user() -> Body {
        Body::new(100.0, 80.0, 24.0, 24.0)
    }

    #[test]
    fn sword_and_rock_have_no_projectile() {
        assert!(AbilityShot::launch(Ability::Sword, &user(), true, 0).is_none());
        assert!(AbilityShot::launch(Ability::Rock, &user(), true, 0).is_none());
    }

    #[test]
    fn directional_shot_follows_facing() {
        let right = AbilityShot::launch(Ability::Ninja, &user(), true, 0).unwrap();
        let left = AbilityShot::launch(Ability::Ninja, &user(), false, 1).unwrap();
        assert_eq!(right.body.vx, 9.0);
        assert_eq!(left.body.vx, -9.0);
        assert!(right.body.x > left.body.x);
        assert_eq!(left.owner, 1);
    }

    #[test]
    fn lightning_spans_above_and_below_user() {
        let bolt = AbilityShot::launch(Ability::Lightning, &user(), true, 0).unwrap();
        assert_eq!(bolt.body.y, 0.0);
        assert_eq!(bolt.body.bottom(), 104.0 + 48.0);
        assert!(bolt.kind.pierces());
    }

    #[test]
    fn fire_expires_after_its_life() {
        let world = TileMap::parse("open", OPEN).unwrap();
        let mut fire = AbilityShot::launch(Ability::Fire, &Body::new(40.0, 40.0, 24.0, 24.0), true, 0)
            .unwrap();
        for _ in 0..39 {
            fire.update(&world);
        }
        assert!(!fire.dead);
        fire.update(&world);
        assert!(fire.dead);
    }

    #[test]
    fn inhale_star_dies_in_solid_tile() {
        let world = TileMap::parse("open", OPEN).unwrap();
        let mut star = InhaleStar::spit(&Body::new(100.0, 100.0, 24.0, 24.0), true, EnemyKind::Droppy, 0);
        star.body.vy = 10.0;
        for _ in 0..10 {
            star.update(&world);
        }
        assert!(star.dead);
    }

    #[test]
    fn enemy_shot_burns_out() {
        let mut shot = EnemyShot::fire_bolt(0.0, 0.0, 1.0);
        for _ in 0..70 {
            shot.update();
        }
        assert!(shot.is_spent());
        assert_eq!(shot.hitbox().w, 10.0);
    }
}

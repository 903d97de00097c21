//! Pickups and cosmetic particles

use super::ability::Ability;
use super::physics::{apply_gravity, resolve, Body};
use super::world::{World, GRAVITY, MAX_FALL, TILE};

/// Stable id for synchronized items
pub type ItemId = u32;

const FALL_OUT_MARGIN: f32 = 64.0;

/// Collectible star
#[derive(Debug, Clone)]
pub struct Star {
    pub id: ItemId,
    pub body: Body,
    pub dead: bool,
    float_ticks: u32,
}

impl Star {
    pub const SIZE: f32 = 16.0;
    /// Upward launch speed of a star knocked out of a block
    pub const EJECT_VY: f32 = -10.0;
    /// Ticks an ejected star stays visible before vanishing
    pub const EJECT_TICKS: u32 = 40;

    /// Star resting in the level
    pub fn placed(id: ItemId, x: f32, y: f32) -> Self {
        Self {
            id,
            body: Body::new(x, y, Self::SIZE, Self::SIZE),
            dead: false,
            float_ticks: 0,
        }
    }

    /// Star popping out of a block at a grid cell
    pub fn ejected(id: ItemId, col: i32, row: i32) -> Self {
        let mut star = Self::placed(id, col as f32 * TILE + 8.0, row as f32 * TILE);
        star.body.vy = Self::EJECT_VY;
        star.float_ticks = Self::EJECT_TICKS;
        star
    }

    pub fn is_ejected(&self) -> bool {
        self.float_ticks > 0
    }

    pub fn update(&mut self) {
        if self.dead || self.float_ticks == 0 {
            return;
        }
        self.body.vy = apply_gravity(self.body.vy, GRAVITY, MAX_FALL);
        self.body.y += self.body.vy;
        self.float_ticks -= 1;
        if self.float_ticks == 0 {
            self.dead = true;
        }
    }
}

/// Health restoring pickup; falls until it rests
#[derive(Debug, Clone)]
pub struct HealthItem {
    pub id: ItemId,
    pub body: Body,
    pub dead: bool,
    resting: bool,
}

impl HealthItem {
    pub const SIZE: f32 = 28.0;

    pub fn new(id: ItemId, col: i32, row: i32) -> Self {
        Self {
            id,
            body: Body::new(
                col as f32 * TILE + 4.0,
                row as f32 * TILE,
                Self::SIZE,
                Self::SIZE,
            ),
            dead: false,
            resting: false,
        }
    }

    pub fn update(&mut self, world: &dyn World) {
        if self.dead {
            return;
        }
        if !self.resting {
            self.body.vy = apply_gravity(self.body.vy, GRAVITY, MAX_FALL);
            self.resting = resolve(&mut self.body, world).on_ground;
        }
        if self.body.y > world.height_px() + FALL_OUT_MARGIN {
            self.dead = true;
        }
    }
}

/// Ability dropped by a hurt player, collectible for a limited time
#[derive(Debug, Clone)]
pub struct AbilityStar {
    pub id: ItemId,
    pub body: Body,
    pub ability: Ability,
    pub dead: bool,
    life: u32,
    resting: bool,
}

impl AbilityStar {
    pub const SIZE: f32 = 26.0;
    pub const LIFE: u32 = 300;

    pub fn drop_at(id: ItemId, x: f32, y: f32, ability: Ability, vx: f32) -> Self {
        let mut body = Body::new(x, y, Self::SIZE, Self::SIZE);
        body.vx = vx;
        body.vy = -5.0;
        Self {
            id,
            body,
            ability,
            dead: false,
            life: Self::LIFE,
            resting: false,
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
        if !self.resting {
            self.body.vy = apply_gravity(self.body.vy, GRAVITY, MAX_FALL);
            if resolve(&mut self.body, world).on_ground {
                self.resting = true;
                self.body.vx *= 0.4;
            }
        }
        if self.body.y > world.height_px() + FALL_OUT_MARGIN {
            self.dead = true;
        }
    }

    /// Fades out over the last 40 ticks
    pub fn alpha(&self) -> f32 {
        (self.life as f32 / 40.0).min(1.0)
    }
}

/// Debris particle
#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub life: u32,
}

impl Particle {
    const LIFE: u32 = 50;

    pub fn update(&mut self) {
        self.vy += GRAVITY * 0.5;
        self.x += self.vx;
        self.y += self.vy;
        self.life = self.life.saturating_sub(1);
    }

    pub fn is_dead(&self) -> bool {
        self.life == 0
    }

    pub fn alpha(&self) -> f32 {
        self.life as f32 / Self::LIFE as f32
    }
}

/// Four fragments flying out of a shattered brick
pub fn brick_burst(col: i32, row: i32) -> [Particle; 4] {
    let cx = col as f32 * TILE + TILE / 2.0;
    let cy = row as f32 * TILE + TILE / 2.0;
    [(-2.5, -6.0), (2.5, -6.0), (-1.5, -8.0), (1.5, -8.0)].map(|(vx, vy)| Particle {
        x: cx,
        y: cy,
        vx,
        vy,
        life: Particle::LIFE,
    })
}

/// Floating score text
#[derive(Debug, Clone)]
pub struct ScorePop {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub life: u32,
}

impl ScorePop {
    const LIFE: u32 = 50;

    pub fn new(x: f32, y: f32, text: impl Into<String>) -> Self {
        Self {
            x,
            y,
            text: text.into(),
            life: Self::LIFE,
        }
    }

    pub fn update(&mut self) {
        self.y -= 0.7;
        self.life = self.life.saturating_sub(1);
    }

    pub fn is_dead(&self) -> bool {
        self.life == 0
    }

    pub fn alpha(&self) -> f32 {
        self.life as f32 / Self::LIFE as f32
    }
}

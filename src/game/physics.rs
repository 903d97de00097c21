//! Tile collision resolver and contact tests
//!
//! Bodies move one axis at a time: horizontal first, then vertical. Each
//! axis sweeps the leading edge across every cell it would enter and snaps
//! to the boundary of the first solid one.

use super::world::{cell_of, World, TILE};

/// Keeps edges that sit exactly on a tile boundary out of the next cell
const EDGE_EPS: f32 = 0.001;
/// Sensing distance for resting contacts
const CONTACT_REACH: f32 = 0.5;

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Aabb {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.w / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.h / 2.0
    }

    /// Strict intersection: touching edges do not overlap
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Moving box: position, velocity, dimensions
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Body {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub w: f32,
    pub h: f32,
}

impl Body {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            w,
            h,
        }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.x, self.y, self.w, self.h)
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.w / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.h / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn overlaps(&self, other: &Body) -> bool {
        self.aabb().overlaps(&other.aabb())
    }
}

/// Contact flags produced by one resolution step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Contacts {
    pub on_ground: bool,
    pub hit_wall: bool,
    pub hit_ceiling: bool,
}

/// Add gravity and clamp to a terminal fall speed
pub fn apply_gravity(vy: f32, gravity: f32, max_fall: f32) -> f32 {
    (vy + gravity).min(max_fall)
}

fn span(lo: f32, len: f32) -> (i32, i32) {
    (cell_of(lo), cell_of(lo + len - EDGE_EPS))
}

fn any_solid_in_col(world: &dyn World, col: i32, rows: (i32, i32)) -> bool {
    (rows.0..=rows.1).any(|row| world.is_solid(col, row))
}

fn any_solid_in_row(world: &dyn World, row: i32, cols: (i32, i32)) -> bool {
    (cols.0..=cols.1).any(|col| world.is_solid(col, row))
}

fn resolve_horizontal(body: &mut Body, world: &dyn World, contacts: &mut Contacts) {
    let rows = span(body.y, body.h);
    let target = body.x + body.vx;

    if body.vx > 0.0 {
        let first = cell_of(body.x + body.w - EDGE_EPS);
        let last = cell_of(target + body.w - EDGE_EPS);
        for col in first..=last {
            if any_solid_in_col(world, col, rows) {
                body.x = col as f32 * TILE - body.w;
                body.vx = 0.0;
                contacts.hit_wall = true;
                return;
            }
        }
        body.x = target;
        contacts.hit_wall = any_solid_in_col(world, cell_of(body.x + body.w + CONTACT_REACH), rows);
    } else if body.vx < 0.0 {
        let first = cell_of(body.x);
        let last = cell_of(target);
        for col in (last..=first).rev() {
            if any_solid_in_col(world, col, rows) {
                body.x = (col + 1) as f32 * TILE;
                body.vx = 0.0;
                contacts.hit_wall = true;
                return;
            }
        }
        body.x = target;
        contacts.hit_wall = any_solid_in_col(world, cell_of(body.x - CONTACT_REACH), rows);
    }
}

fn resolve_vertical(body: &mut Body, world: &dyn World, contacts: &mut Contacts) {
    let cols = span(body.x, body.w);
    let target = body.y + body.vy;

    if body.vy > 0.0 {
        let first = cell_of(body.y + body.h - EDGE_EPS);
        let last = cell_of(target + body.h - EDGE_EPS);
        for row in first..=last {
            if any_solid_in_row(world, row, cols) {
                body.y = row as f32 * TILE - body.h;
                body.vy = 0.0;
                contacts.on_ground = true;
                return;
            }
        }
        body.y = target;
    } else if body.vy < 0.0 {
        let first = cell_of(body.y);
        let last = cell_of(target);
        for row in (last..=first).rev() {
            if any_solid_in_row(world, row, cols) {
                body.y = (row + 1) as f32 * TILE;
                body.vy = 0.0;
                contacts.hit_ceiling = true;
                return;
            }
        }
        body.y = target;
        return;
    }

    // Resting or falling without impact: sense just under the feet
    contacts.on_ground = any_solid_in_row(world, cell_of(body.y + body.h + CONTACT_REACH), cols);
}

/// Move a body by its velocity against the tile grid
pub fn resolve(body: &mut Body, world: &dyn World) -> Contacts {
    let mut contacts = Contacts::default();
    resolve_horizontal(body, world, &mut contacts);
    resolve_vertical(body, world, &mut contacts);
    contacts
}

/// Clamp a body to the horizontal extent of the level
pub fn clamp_to_level(body: &mut Body, world: &dyn World) {
    let max_x = (world.width_px() - body.w).max(0.0);
    if body.x < 0.0 {
        body.x = 0.0;
        body.vx = body.vx.max(0.0);
    } else if body.x > max_x {
        body.x = max_x;
        body.vx = body.vx.min(0.0);
    }
}

/// Outcome of a player touching an enemy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    Stomp,
    Hurt,
}

/// Minimum height of the player's center above the enemy's, as a fraction of enemy height
const STOMP_CENTER_MARGIN: f32 = 0.2;
/// Deepest foot penetration still counted as a stomp, as a fraction of enemy height
const STOMP_MAX_PENETRATION: f32 = 0.5;

/// Classify an overlapping player/enemy pair. Pure in its inputs, so both
/// peers reach the same verdict for the same positions.
pub fn classify_contact(player: &Body, enemy: &Body) -> ContactOutcome {
    let falling = player.vy >= 0.0;
    let above = enemy.center_y() - player.center_y() >= STOMP_CENTER_MARGIN * enemy.h;
    let shallow = player.bottom() - enemy.y <= STOMP_MAX_PENETRATION * enemy.h;
    if falling && above && shallow {
        ContactOutcome::Stomp
    } else {
        ContactOutcome::Hurt
    }
}

//! Read-only per-tick picture handed to a renderer

use serde::Serialize;

use super::ability::Ability;
use super::camera::Camera;
use super::chat::ChatLine;
use super::collectible::{AbilityStar, HealthItem, Particle, ScorePop, Star};
use super::enemy::{Enemy, EnemyId};
use super::platform::Platform;
use super::player::{Player, PlayerId, PlayerState};
use super::projectile::{AbilityShot, EnemyShot, InhaleStar};
use super::sim::SimPhase;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameView {
    pub tick: u64,
    pub level: usize,
    pub phase: SimPhase,
    pub camera: Camera,
    pub players: Vec<PlayerView>,
    pub enemies: Vec<EnemyView>,
    pub items: Vec<ItemView>,
    pub chat: Vec<ChatLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub facing_right: bool,
    pub state: PlayerState,
    pub hp: u8,
    pub lives: u8,
    pub score: u32,
    pub stars: u32,
    pub ability: Option<Ability>,
    /// Blinks while invulnerable
    pub invulnerable: bool,
}

impl From<&Player> for PlayerView {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            x: p.body.x,
            y: p.body.y,
            w: p.body.w,
            h: p.body.h,
            facing_right: p.facing_right,
            state: p.state,
            hp: p.hp,
            lives: p.lives,
            score: p.score,
            stars: p.stars,
            ability: p.ability,
            invulnerable: p.invuln > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnemyView {
    pub id: EnemyId,
    pub kind: &'static str,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub dead: bool,
    pub being_inhaled: bool,
}

impl From<&Enemy> for EnemyView {
    fn from(e: &Enemy) -> Self {
        Self {
            id: e.id,
            kind: e.kind.tag(),
            x: e.body.x,
            y: e.body.y,
            w: e.body.w,
            h: e.body.h,
            dead: e.dead,
            being_inhaled: e.being_inhaled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Star,
    Health,
    AbilityStar,
    AbilityShot,
    InhaleStar,
    EnemyShot,
    Platform,
    Particle,
    ScorePop,
}

/// Anything drawn as a sprite or label with an opacity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView {
    pub kind: ItemKind,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub alpha: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ItemView {
    fn sprite(kind: ItemKind, x: f32, y: f32, w: f32, h: f32, alpha: f32) -> Self {
        Self {
            kind,
            x,
            y,
            w,
            h,
            alpha,
            label: None,
        }
    }
}

/// Borrowed item lists gathered by the simulation for one frame
pub struct ItemSources<'a> {
    pub stars: &'a [Star],
    pub health: &'a [HealthItem],
    pub ability_stars: &'a [AbilityStar],
    pub shots: &'a [AbilityShot],
    pub inhale_stars: &'a [InhaleStar],
    pub enemy_shots: Vec<&'a EnemyShot>,
    pub platforms: &'a [Platform],
    pub particles: &'a [Particle],
    pub pops: &'a [ScorePop],
}

impl ItemSources<'_> {
    /// Flatten into draw order: platforms first, labels last
    pub fn collect(&self) -> Vec<ItemView> {
        let mut items = Vec::new();
        for p in self.platforms {
            items.push(ItemView::sprite(ItemKind::Platform, p.x, p.y, p.w, p.h, 1.0));
        }
        for s in self.stars.iter().filter(|s| !s.dead) {
            let b = &s.body;
            items.push(ItemView::sprite(ItemKind::Star, b.x, b.y, b.w, b.h, 1.0));
        }
        for h in self.health.iter().filter(|h| !h.dead) {
            let b = &h.body;
            items.push(ItemView::sprite(ItemKind::Health, b.x, b.y, b.w, b.h, 1.0));
        }
        for a in self.ability_stars.iter().filter(|a| !a.dead) {
            let b = &a.body;
            items.push(ItemView::sprite(ItemKind::AbilityStar, b.x, b.y, b.w, b.h, a.alpha()));
        }
        for s in self.shots.iter().filter(|s| !s.dead) {
            let b = &s.body;
            items.push(ItemView::sprite(ItemKind::AbilityShot, b.x, b.y, b.w, b.h, s.alpha()));
        }
        for s in self.inhale_stars.iter().filter(|s| !s.dead) {
            let b = &s.body;
            items.push(ItemView::sprite(ItemKind::InhaleStar, b.x, b.y, b.w, b.h, s.alpha()));
        }
        for s in &self.enemy_shots {
            let hb = s.hitbox();
            items.push(ItemView::sprite(ItemKind::EnemyShot, hb.x, hb.y, hb.w, hb.h, 1.0));
        }
        for p in self.particles.iter().filter(|p| !p.is_dead()) {
            items.push(ItemView::sprite(ItemKind::Particle, p.x, p.y, 6.0, 6.0, p.alpha()));
        }
        for pop in self.pops.iter().filter(|p| !p.is_dead()) {
            let mut view = ItemView::sprite(ItemKind::ScorePop, pop.x, pop.y, 0.0, 0.0, pop.alpha());
            view.label = Some(pop.text.clone());
            items.push(view);
        }
        items
    }
}

//! Enemy kinds, per-kind data and the id-keyed arena

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ability::Ability;
use super::physics::{apply_gravity, resolve, Body};
use super::projectile::EnemyShot;
use super::world::{cell_of, World, GRAVITY, MAX_FALL, TILE};

/// Stable enemy id, shared by both peers
pub type EnemyId = u32;

/// Ticks a defeated enemy lingers before removal
pub const DEATH_TICKS: u32 = 55;
/// Reward for landing on an enemy
pub const STOMP_REWARD: u32 = 100;
/// Reward for defeating an enemy with an ability or projectile
pub const KILL_REWARD: u32 = 200;

const KILL_IMPULSE: f32 = -5.0;
const FALL_OUT_MARGIN: f32 = 64.0;

/// Closed set of enemy kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyKind {
    SwordKnight,
    HotHead,
    Chilly,
    Droppy,
    Rocky,
    Sparky,
    BioSpark,
    SumoKnight,
    LeafWaddle,
}

/// Capability flags looked up per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub inhalable: bool,
    pub freezes: bool,
    pub shocks: bool,
    pub emits_projectiles: bool,
}

/// Timed per-kind action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    FireBolt,
    ThrowStar,
    Hop,
}

/// Randomized action timer: `first` before the first action, `repeat` after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub action: Action,
    pub first: (u32, u32),
    pub repeat: (u32, u32),
}

impl Cadence {
    fn roll(range: (u32, u32), rng: &mut impl Rng) -> u32 {
        range.0 + rng.gen_range(0..range.1)
    }
}

/// Static data for one kind
#[derive(Debug, Clone, Copy)]
pub struct KindProfile {
    pub w: f32,
    pub h: f32,
    pub speed: f32,
    pub ability: Ability,
    pub caps: Capabilities,
    pub cadence: Option<Cadence>,
}

const PLAIN: Capabilities = Capabilities {
    inhalable: true,
    freezes: false,
    shocks: false,
    emits_projectiles: false,
};

impl EnemyKind {
    pub const ALL: [EnemyKind; 9] = [
        EnemyKind::SwordKnight,
        EnemyKind::HotHead,
        EnemyKind::Chilly,
        EnemyKind::Droppy,
        EnemyKind::Rocky,
        EnemyKind::Sparky,
        EnemyKind::BioSpark,
        EnemyKind::SumoKnight,
        EnemyKind::LeafWaddle,
    ];

    pub fn profile(self) -> KindProfile {
        let p = |w, h, speed, ability, caps, cadence| KindProfile {
            w,
            h,
            speed,
            ability,
            caps,
            cadence,
        };
        match self {
            EnemyKind::SwordKnight => p(28.0, 28.0, 1.2, Ability::Sword, PLAIN, None),
            EnemyKind::HotHead => p(
                28.0,
                28.0,
                1.4,
                Ability::Fire,
                Capabilities {
                    emits_projectiles: true,
                    ..PLAIN
                },
                Some(Cadence {
                    action: Action::FireBolt,
                    first: (80, 60),
                    repeat: (90, 60),
                }),
            ),
            EnemyKind::Chilly => p(
                26.0,
                30.0,
                0.8,
                Ability::Ice,
                Capabilities {
                    freezes: true,
                    ..PLAIN
                },
                None,
            ),
            EnemyKind::Droppy => p(26.0, 28.0, 1.0, Ability::Water, PLAIN, None),
            EnemyKind::Rocky => p(30.0, 28.0, 0.5, Ability::Rock, PLAIN, None),
            EnemyKind::Sparky => p(
                26.0,
                26.0,
                1.4,
                Ability::Lightning,
                Capabilities {
                    shocks: true,
                    ..PLAIN
                },
                Some(Cadence {
                    action: Action::Hop,
                    first: (50, 40),
                    repeat: (50, 40),
                }),
            ),
            EnemyKind::BioSpark => p(
                26.0,
                28.0,
                2.0,
                Ability::Ninja,
                Capabilities {
                    emits_projectiles: true,
                    ..PLAIN
                },
                Some(Cadence {
                    action: Action::ThrowStar,
                    first: (100, 60),
                    repeat: (100, 60),
                }),
            ),
            EnemyKind::SumoKnight => p(34.0, 34.0, 0.7, Ability::Sumo, PLAIN, None),
            EnemyKind::LeafWaddle => p(24.0, 26.0, 1.0, Ability::Leaf, PLAIN, None),
        }
    }

    /// Wire tag
    pub fn tag(self) -> &'static str {
        match self {
            EnemyKind::SwordKnight => "SwordKnight",
            EnemyKind::HotHead => "HotHead",
            EnemyKind::Chilly => "Chilly",
            EnemyKind::Droppy => "Droppy",
            EnemyKind::Rocky => "Rocky",
            EnemyKind::Sparky => "Sparky",
            EnemyKind::BioSpark => "BioSpark",
            EnemyKind::SumoKnight => "SumoKnight",
            EnemyKind::LeafWaddle => "LeafWaddle",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    /// Level map character
    pub fn from_spawn_char(ch: char) -> Option<Self> {
        let kind = match ch {
            'w' => EnemyKind::SwordKnight,
            'f' => EnemyKind::HotHead,
            'i' => EnemyKind::Chilly,
            'a' => EnemyKind::Droppy,
            'r' => EnemyKind::Rocky,
            'l' => EnemyKind::Sparky,
            'n' => EnemyKind::BioSpark,
            'u' => EnemyKind::SumoKnight,
            'e' => EnemyKind::LeafWaddle,
            _ => return None,
        };
        Some(kind)
    }
}

/// Live enemy
#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: EnemyId,
    pub kind: EnemyKind,
    pub body: Body,
    pub dead: bool,
    pub remove: bool,
    pub being_inhaled: bool,
    pub on_ground: bool,
    pub shots: Vec<EnemyShot>,
    speed: f32,
    pull: (f32, f32),
    knocked: bool,
    death_ticks: u32,
    action_timer: u32,
}

impl Enemy {
    pub fn new(id: EnemyId, kind: EnemyKind, x: f32, y: f32, rng: &mut impl Rng) -> Self {
        let profile = kind.profile();
        let mut body = Body::new(x, y, profile.w, profile.h);
        body.vx = -profile.speed;
        let action_timer = profile
            .cadence
            .map(|c| Cadence::roll(c.first, rng))
            .unwrap_or(0);
        Self {
            id,
            kind,
            body,
            dead: false,
            remove: false,
            being_inhaled: false,
            on_ground: false,
            shots: Vec::new(),
            speed: profile.speed,
            pull: (0.0, 0.0),
            knocked: false,
            death_ticks: 0,
            action_timer,
        }
    }

    /// Place an enemy from a spawn-table cell
    pub fn at_cell(id: EnemyId, kind: EnemyKind, col: i32, row: i32, rng: &mut impl Rng) -> Self {
        Self::new(
            id,
            kind,
            col as f32 * TILE + 2.0,
            (row - 1) as f32 * TILE,
            rng,
        )
    }

    pub fn caps(&self) -> Capabilities {
        self.kind.profile().caps
    }

    /// Can currently be pulled in or hit
    pub fn is_active(&self) -> bool {
        !self.dead && !self.remove
    }

    pub fn update(&mut self, world: &dyn World, rng: &mut impl Rng) {
        for shot in &mut self.shots {
            shot.update();
        }
        self.shots.retain(|s| !s.is_spent());

        if self.dead {
            self.death_ticks += 1;
            if self.knocked {
                self.body.vy = apply_gravity(self.body.vy, GRAVITY, MAX_FALL);
                self.body.y += self.body.vy;
            }
            if self.death_ticks > DEATH_TICKS {
                self.remove = true;
            }
            return;
        }
        if self.being_inhaled {
            self.body.x += self.pull.0;
            self.body.y += self.pull.1;
            return;
        }

        self.patrol(world);
        self.run_cadence(rng);
    }

    fn patrol(&mut self, world: &dyn World) {
        let dir = if self.body.vx > 0.0 { 1.0 } else { -1.0 };
        self.body.vx = dir * self.speed;
        self.body.vy = apply_gravity(self.body.vy, GRAVITY, MAX_FALL);

        let contacts = resolve(&mut self.body, world);
        self.on_ground = contacts.on_ground;
        if contacts.hit_wall {
            self.body.vx = -dir * self.speed;
        }

        // Turn around at ledges
        if self.on_ground && self.body.vx != 0.0 {
            let ahead_x = if self.body.vx > 0.0 {
                self.body.x + self.body.w + 1.0
            } else {
                self.body.x - 1.0
            };
            let below = cell_of(self.body.bottom() + 1.0);
            if !world.is_solid(cell_of(ahead_x), below) {
                self.body.vx = -self.body.vx;
            }
        }

        if self.body.y > world.height_px() + FALL_OUT_MARGIN {
            self.remove = true;
        }
    }

    fn run_cadence(&mut self, rng: &mut impl Rng) {
        let Some(cadence) = self.kind.profile().cadence else {
            return;
        };
        self.action_timer = self.action_timer.saturating_sub(1);
        if self.action_timer > 0 {
            return;
        }
        let dir = if self.body.vx < 0.0 { -1.0 } else { 1.0 };
        match cadence.action {
            Action::FireBolt => {
                self.shots.push(EnemyShot::fire_bolt(
                    self.body.center_x(),
                    self.body.y + 8.0,
                    dir,
                ));
            }
            Action::ThrowStar => {
                self.shots.push(EnemyShot::thrown_star(
                    self.body.center_x(),
                    self.body.center_y(),
                    dir,
                ));
            }
            Action::Hop => {
                // waits on the ground with the timer expired
                if !self.on_ground {
                    return;
                }
                self.body.vy = -5.0;
            }
        }
        self.action_timer = Cadence::roll(cadence.repeat, rng);
    }

    /// Defeat by landing on top. Returns the reward, 0 if already dead.
    pub fn stomp(&mut self) -> u32 {
        if self.dead {
            return 0;
        }
        self.dead = true;
        self.body.vx = 0.0;
        self.body.vy = 0.0;
        STOMP_REWARD
    }

    /// Defeat by ability or projectile. Returns the reward, 0 if already dead.
    pub fn kill(&mut self) -> u32 {
        if self.dead {
            return 0;
        }
        self.dead = true;
        self.knocked = true;
        self.body.vy = KILL_IMPULSE;
        KILL_REWARD
    }

    /// Pull toward a point at a fixed speed
    pub fn start_inhale(&mut self, target_x: f32, target_y: f32, speed: f32) {
        self.being_inhaled = true;
        let dx = target_x - self.body.center_x();
        let dy = target_y - self.body.center_y();
        let dist = (dx * dx + dy * dy).sqrt();
        let dist = if dist > 0.0 { dist } else { 1.0 };
        self.pull = (dx / dist * speed, dy / dist * speed);
    }
}

/// Enemies keyed by id; iteration order is id order on both peers
#[derive(Debug, Clone, Default)]
pub struct EnemyArena {
    enemies: BTreeMap<EnemyId, Enemy>,
}

impl EnemyArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by id
    pub fn insert(&mut self, enemy: Enemy) {
        self.enemies.insert(enemy.id, enemy);
    }

    pub fn get(&self, id: EnemyId) -> Option<&Enemy> {
        self.enemies.get(&id)
    }

    pub fn get_mut(&mut self, id: EnemyId) -> Option<&mut Enemy> {
        self.enemies.get_mut(&id)
    }

    pub fn contains(&self, id: EnemyId) -> bool {
        self.enemies.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Enemy> {
        self.enemies.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Enemy> {
        self.enemies.values_mut()
    }

    pub fn len(&self) -> usize {
        self.enemies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enemies.is_empty()
    }

    pub fn clear(&mut self) {
        self.enemies.clear();
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Enemy) -> bool) {
        self.enemies.retain(|_, e| keep(e));
    }

    /// Drop enemies flagged for removal
    pub fn prune(&mut self) -> usize {
        let before = self.enemies.len();
        self.enemies.retain(|_, e| !e.remove);
        before - self.enemies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::level::TileMap;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const LEDGE: &str = "
.............G
.1.2..........
..............
..........#...
#######.......
";

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn tags_round_trip_for_every_kind() {
        for kind in EnemyKind::ALL {
            assert_eq!(EnemyKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(EnemyKind::from_tag("Waddle Doo"), None);
    }

    #[test]
    fn stomp_rewards_100_and_freezes() {
        let mut e = Enemy::new(1, EnemyKind::SwordKnight, 0.0, 0.0, &mut rng());
        e.body.vy = 3.0;
        assert_eq!(e.stomp(), 100);
        assert!(e.dead);
        assert_eq!((e.body.vx, e.body.vy), (0.0, 0.0));
        assert_eq!(e.stomp(), 0);
        assert_eq!(e.kill(), 0);
    }

    #[test]
    fn kill_rewards_200_with_upward_impulse() {
        let mut e = Enemy::new(1, EnemyKind::HotHead, 0.0, 0.0, &mut rng());
        assert_eq!(e.kill(), 200);
        assert_eq!(e.body.vy, -5.0);
        assert_eq!(e.kill(), 0);
    }

    #[test]
    fn dead_enemy_is_removed_after_death_window() {
        let world = TileMap::parse("ledge", LEDGE).unwrap();
        let mut e = Enemy::new(1, EnemyKind::Droppy, 40.0, 100.0, &mut rng());
        e.stomp();
        for _ in 0..DEATH_TICKS {
            e.update(&world, &mut rng());
        }
        assert!(!e.remove);
        e.update(&world, &mut rng());
        assert!(e.remove);
    }

    #[test]
    fn patrol_turns_at_ledge() {
        let world = TileMap::parse("ledge", LEDGE).unwrap();
        // standing on the floor near its right edge, walking right
        let mut e = Enemy::new(1, EnemyKind::Droppy, 180.0, 100.0, &mut rng());
        e.body.vx = 1.0;
        let mut turned = false;
        for _ in 0..120 {
            e.update(&world, &mut rng());
            if e.body.vx < 0.0 {
                turned = true;
                break;
            }
        }
        assert!(turned);
        assert!(e.body.x + e.body.w <= 224.0 + 1.0);
    }

    #[test]
    fn hot_head_fires_within_first_window() {
        let world = TileMap::parse("ledge", LEDGE).unwrap();
        let mut r = rng();
        let mut e = Enemy::new(1, EnemyKind::HotHead, 40.0, 100.0, &mut r);
        for _ in 0..140 {
            e.update(&world, &mut r);
        }
        assert!(!e.shots.is_empty());
    }

    #[test]
    fn arena_prunes_removed_and_iterates_in_id_order() {
        let mut arena = EnemyArena::new();
        let mut r = rng();
        for id in [5, 2, 9] {
            arena.insert(Enemy::new(id, EnemyKind::Rocky, 0.0, 0.0, &mut r));
        }
        let ids: Vec<_> = arena.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
        if let Some(e) = arena.get_mut(5) {
            e.remove = true;
        }
        assert_eq!(arena.prune(), 1);
        assert!(!arena.contains(5));
    }
}

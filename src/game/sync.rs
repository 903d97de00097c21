//! Host authority, inbound buffering and snapshot reconciliation

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::ws::protocol::{EnemySnapshot, GameEvent, NetMsg, PlayerSnapshot, StarSnapshot};

use super::collectible::Star;
use super::enemy::{Enemy, EnemyArena, EnemyId, EnemyKind};
use super::input::InputFrame;
use super::player::{Player, PlayerId};
use super::snapshot::{apply_enemy, apply_player};

/// Which side of the session this peer plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Canonical simulator of enemies, items, platforms and tiles
    Authority,
    /// Follows the authority through snapshots
    Mirror,
}

impl Role {
    pub fn is_authority(self) -> bool {
        self == Role::Authority
    }

    /// Player slot driven by this peer's own input
    pub fn local_id(self) -> PlayerId {
        match self {
            Role::Authority => 0,
            Role::Mirror => 1,
        }
    }

    /// Player slot driven by the other peer
    pub fn remote_id(self) -> PlayerId {
        1 - self.local_id()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Authority => f.write_str("host"),
            Role::Mirror => f.write_str("guest"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown peer role: {0} (expected host or guest)")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" | "authority" => Ok(Role::Authority),
            "guest" | "mirror" => Ok(Role::Mirror),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Payload of a STATE message
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub tick: u64,
    pub players: Vec<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
    pub stars: Vec<StarSnapshot>,
}

/// Messages collected between two ticks, applied together at the next one
#[derive(Debug, Default)]
pub struct Inbound {
    pub restart: Option<usize>,
    pub input: Option<(u64, InputFrame)>,
    pub state: Option<StateSnapshot>,
    pub events: Vec<GameEvent>,
}

/// Buffers network messages until the next tick boundary.
/// INPUT and STATE keep only the newest by tick; events queue in arrival order.
#[derive(Debug, Default)]
pub struct Inbox {
    pending: Inbound,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: NetMsg) {
        match msg {
            NetMsg::Input { tick, input } => {
                let newer = self.pending.input.map_or(true, |(t, _)| tick >= t);
                if newer {
                    self.pending.input = Some((tick, input));
                }
            }
            NetMsg::State {
                tick,
                players,
                enemies,
                stars,
            } => {
                let newer = self.pending.state.as_ref().map_or(true, |s| tick >= s.tick);
                if newer {
                    self.pending.state = Some(StateSnapshot {
                        tick,
                        players,
                        enemies,
                        stars,
                    });
                }
            }
            NetMsg::Event(event) => self.pending.events.push(event),
            NetMsg::Restart { level } => {
                // anything buffered belongs to the level being torn down
                self.pending.restart = Some(level);
                self.pending.state = None;
                self.pending.events.clear();
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.restart.is_none()
            && self.pending.input.is_none()
            && self.pending.state.is_none()
            && self.pending.events.is_empty()
    }

    /// Take everything buffered since the last drain
    pub fn drain(&mut self) -> Inbound {
        std::mem::take(&mut self.pending)
    }
}

/// What a reconciliation pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub evicted: usize,
    pub skipped: usize,
}

/// Snap-correct the mirror to an authoritative snapshot.
///
/// Players and enemies are overwritten field by field. Enemies missing
/// locally are built from their kind tag and adopt the snapshot id; local
/// enemies the snapshot does not list are evicted. Stars only take the dead
/// flag and are never recreated. An entry with an unknown kind tag is
/// skipped, leaving any existing local entry untouched.
pub fn reconcile(
    snapshot: &StateSnapshot,
    players: &mut [Player],
    enemies: &mut EnemyArena,
    stars: &mut [Star],
    rng: &mut impl Rng,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for snap in &snapshot.players {
        if let Some(player) = players.iter_mut().find(|p| p.id == snap.id) {
            apply_player(player, snap);
        }
    }

    let mut listed: BTreeSet<EnemyId> = BTreeSet::new();
    for snap in &snapshot.enemies {
        listed.insert(snap.id);
        let Some(kind) = EnemyKind::from_tag(&snap.kind) else {
            warn!(enemy_id = snap.id, tag = %snap.kind, "Unknown enemy type in snapshot");
            report.skipped += 1;
            continue;
        };
        match enemies.get_mut(snap.id) {
            Some(enemy) if enemy.kind == kind => apply_enemy(enemy, snap),
            _ => {
                let mut enemy = Enemy::new(snap.id, kind, snap.x, snap.y, rng);
                apply_enemy(&mut enemy, snap);
                enemies.insert(enemy);
                report.created += 1;
                debug!(enemy_id = snap.id, kind = kind.tag(), "Mirrored enemy created");
            }
        }
    }

    let before = enemies.len();
    enemies.retain(|e| listed.contains(&e.id));
    report.evicted = before - enemies.len();

    for snap in &snapshot.stars {
        if let Some(star) = stars.iter_mut().find(|s| s.id == snap.id) {
            star.dead = snap.dead;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::snapshot::SnapshotBuilder;
    use crate::game::tuning::Tuning;
    use crate::game::world::Cell;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn enemy_snap(id: EnemyId, tag: &str, x: f32) -> EnemySnapshot {
        EnemySnapshot {
            id,
            kind: tag.to_string(),
            x,
            y: 96.0,
            vx: -1.0,
            dead: false,
            remove: false,
            being_inhaled: false,
        }
    }

    fn snapshot(tick: u64, enemies: Vec<EnemySnapshot>) -> StateSnapshot {
        StateSnapshot {
            tick,
            players: Vec::new(),
            enemies,
            stars: Vec::new(),
        }
    }

    fn mirror() -> (Vec<Player>, EnemyArena, Vec<Star>, ChaCha8Rng) {
        let tuning = Tuning::default();
        let players = vec![
            Player::new(0, Cell::new(1, 2), &tuning),
            Player::new(1, Cell::new(3, 2), &tuning),
        ];
        (
            players,
            EnemyArena::new(),
            vec![Star::placed(1000, 64.0, 64.0)],
            ChaCha8Rng::seed_from_u64(1),
        )
    }

    #[test]
    fn role_parses_from_env_words() {
        assert_eq!("host".parse::<Role>().unwrap(), Role::Authority);
        assert_eq!(" Guest ".parse::<Role>().unwrap(), Role::Mirror);
        assert!("spectator".parse::<Role>().is_err());
        assert_eq!(Role::Mirror.local_id(), 1);
        assert_eq!(Role::Mirror.remote_id(), 0);
    }

    #[test]
    fn inbox_keeps_newest_input_and_state() {
        let mut inbox = Inbox::new();
        let mut right = InputFrame::default();
        right.right = true;
        inbox.push(NetMsg::Input {
            tick: 5,
            input: right,
        });
        inbox.push(NetMsg::Input {
            tick: 4,
            input: InputFrame::default(),
        });
        inbox.push(NetMsg::State {
            tick: 9,
            players: vec![],
            enemies: vec![],
            stars: vec![],
        });
        inbox.push(NetMsg::State {
            tick: 6,
            players: vec![],
            enemies: vec![enemy_snap(1, "Droppy", 0.0)],
            stars: vec![],
        });
        let drained = inbox.drain();
        assert_eq!(drained.input, Some((5, right)));
        assert_eq!(drained.state.map(|s| s.tick), Some(9));
        assert!(inbox.is_empty());
    }

    #[test]
    fn restart_discards_buffered_state_and_events() {
        let mut inbox = Inbox::new();
        inbox.push(NetMsg::Event(GameEvent::BrickBreak { col: 1, row: 1 }));
        inbox.push(NetMsg::State {
            tick: 3,
            players: vec![],
            enemies: vec![],
            stars: vec![],
        });
        inbox.push(NetMsg::Restart { level: 1 });
        inbox.push(NetMsg::Event(GameEvent::Win));
        let drained = inbox.drain();
        assert_eq!(drained.restart, Some(1));
        assert!(drained.state.is_none());
        assert_eq!(drained.events, vec![GameEvent::Win]);
    }

    #[test]
    fn unknown_enemy_adopts_snapshot_id_and_kind() {
        let (mut players, mut enemies, mut stars, mut rng) = mirror();
        let snap = snapshot(3, vec![enemy_snap(42, "SparkyBot", 10.0), enemy_snap(7, "HotHead", 320.0)]);
        let report = reconcile(&snap, &mut players, &mut enemies, &mut stars, &mut rng);

        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 1);
        let e = enemies.get(7).unwrap();
        assert_eq!(e.kind, EnemyKind::HotHead);
        assert_eq!(e.body.x, 320.0);
        assert!(!enemies.contains(42));
    }

    #[test]
    fn unlisted_enemies_are_evicted() {
        let (mut players, mut enemies, mut stars, mut rng) = mirror();
        for id in 1..=3 {
            enemies.insert(Enemy::new(id, EnemyKind::Droppy, 0.0, 0.0, &mut rng));
        }
        let snap = snapshot(3, vec![enemy_snap(2, "Droppy", 50.0)]);
        let report = reconcile(&snap, &mut players, &mut enemies, &mut stars, &mut rng);
        assert_eq!(report.evicted, 2);
        assert_eq!(enemies.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn unknown_tag_leaves_existing_entry_stale() {
        let (mut players, mut enemies, mut stars, mut rng) = mirror();
        enemies.insert(Enemy::new(4, EnemyKind::Rocky, 12.0, 0.0, &mut rng));
        let snap = snapshot(3, vec![enemy_snap(4, "Mystery", 99.0)]);
        reconcile(&snap, &mut players, &mut enemies, &mut stars, &mut rng);
        assert_eq!(enemies.get(4).map(|e| e.body.x), Some(12.0));
    }

    #[test]
    fn duplicate_ids_last_write_wins() {
        let (mut players, mut enemies, mut stars, mut rng) = mirror();
        let snap = snapshot(
            3,
            vec![enemy_snap(5, "Chilly", 10.0), enemy_snap(5, "Chilly", 20.0)],
        );
        reconcile(&snap, &mut players, &mut enemies, &mut stars, &mut rng);
        assert_eq!(enemies.len(), 1);
        assert_eq!(enemies.get(5).map(|e| e.body.x), Some(20.0));
    }

    #[test]
    fn stars_take_dead_flag_and_are_never_recreated() {
        let (mut players, mut enemies, mut stars, mut rng) = mirror();
        let mut snap = snapshot(3, vec![]);
        snap.stars = vec![
            StarSnapshot { id: 1000, dead: true },
            StarSnapshot { id: 1001, dead: false },
        ];
        reconcile(&snap, &mut players, &mut enemies, &mut stars, &mut rng);
        assert_eq!(stars.len(), 1);
        assert!(stars[0].dead);
    }

    #[test]
    fn players_are_snap_corrected() {
        let (mut players, mut enemies, mut stars, mut rng) = mirror();
        let mut source = players[1].clone();
        source.body.x = 500.0;
        source.hp = 1;
        let mut snap = snapshot(3, vec![]);
        snap.players = vec![PlayerSnapshot::from(&source)];
        reconcile(&snap, &mut players, &mut enemies, &mut stars, &mut rng);
        assert_eq!(players[1].body.x, 500.0);
        assert_eq!(players[1].hp, 1);
        assert_eq!(players[0].body.x, 32.0);
    }

    fn arb_enemy() -> impl Strategy<Value = EnemySnapshot> {
        let tags: Vec<&'static str> = EnemyKind::ALL.iter().map(|k| k.tag()).chain(["Bogus"]).collect();
        (
            1u32..12,
            prop::sample::select(tags),
            0.0f32..600.0,
            0.0f32..400.0,
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(id, tag, x, y, dead, remove)| EnemySnapshot {
                id,
                kind: tag.to_string(),
                x: x.round(),
                y: y.round(),
                vx: 1.0,
                dead,
                remove,
                being_inhaled: false,
            })
    }

    proptest! {
        #[test]
        fn applying_a_snapshot_twice_equals_once(
            entries in prop::collection::vec(arb_enemy(), 0..10),
            local in prop::collection::btree_set(1u32..12, 0..6),
        ) {
            let (mut players, mut enemies, mut stars, mut rng) = mirror();
            for id in local {
                enemies.insert(Enemy::new(id, EnemyKind::Droppy, 0.0, 0.0, &mut rng));
            }
            let snap = snapshot(10, entries);

            reconcile(&snap, &mut players, &mut enemies, &mut stars, &mut rng);
            let once = SnapshotBuilder::build(0, &players, &enemies, &stars);
            reconcile(&snap, &mut players, &mut enemies, &mut stars, &mut rng);
            let twice = SnapshotBuilder::build(0, &players, &enemies, &stars);
            prop_assert_eq!(once, twice);

            let listed: BTreeSet<EnemyId> = snap.enemies.iter().map(|e| e.id).collect();
            prop_assert!(enemies.iter().all(|e| listed.contains(&e.id)));
        }
    }
}

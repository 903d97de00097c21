//! Snapshot building and cadence

use crate::ws::protocol::{EnemySnapshot, NetMsg, PlayerSnapshot, StarSnapshot};

use super::collectible::Star;
use super::enemy::{Enemy, EnemyArena};
use super::player::Player;

/// Decides when the authority sends a STATE and builds it
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (peer join, level load)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a full STATE message
    pub fn build(tick: u64, players: &[Player], enemies: &EnemyArena, stars: &[Star]) -> NetMsg {
        NetMsg::State {
            tick,
            players: players.iter().map(PlayerSnapshot::from).collect(),
            enemies: enemies.iter().map(EnemySnapshot::from).collect(),
            stars: stars
                .iter()
                .map(|s| StarSnapshot {
                    id: s.id,
                    dead: s.dead,
                })
                .collect(),
        }
    }
}

impl From<&Player> for PlayerSnapshot {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            x: p.body.x.round(),
            y: p.body.y.round(),
            vx: p.body.vx,
            vy: p.body.vy,
            facing_right: p.facing_right,
            state: p.state,
            hp: p.hp,
            lives: p.lives,
            score: p.score,
            stars: p.stars,
            ability: p.ability,
            ammo: p.ammo,
            inhaling: p.inhaling,
            floating: p.floating,
            float_flaps: p.float_flaps,
            held: p.held,
        }
    }
}

impl From<&Enemy> for EnemySnapshot {
    fn from(e: &Enemy) -> Self {
        Self {
            id: e.id,
            kind: e.kind.tag().to_string(),
            x: e.body.x.round(),
            y: e.body.y.round(),
            vx: e.body.vx,
            dead: e.dead,
            remove: e.remove,
            being_inhaled: e.being_inhaled,
        }
    }
}

/// Snap-correct a mirrored player
pub fn apply_player(player: &mut Player, snap: &PlayerSnapshot) {
    player.body.x = snap.x;
    player.body.y = snap.y;
    player.body.vx = snap.vx;
    player.body.vy = snap.vy;
    player.facing_right = snap.facing_right;
    player.state = snap.state;
    player.hp = snap.hp;
    player.lives = snap.lives;
    player.score = snap.score;
    player.stars = snap.stars;
    player.ability = snap.ability;
    player.ammo = snap.ammo;
    player.inhaling = snap.inhaling;
    player.floating = snap.floating;
    player.float_flaps = snap.float_flaps;
    player.held = snap.held;
}

/// Snap-correct a mirrored enemy
pub fn apply_enemy(enemy: &mut Enemy, snap: &EnemySnapshot) {
    enemy.body.x = snap.x;
    enemy.body.y = snap.y;
    enemy.body.vx = snap.vx;
    enemy.dead = snap.dead;
    enemy.remove = snap.remove;
    enemy.being_inhaled = snap.being_inhaled;
}

/// Snapshot traffic counters for debugging
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_enemies_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, enemy_count: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_enemies_per_snapshot =
            self.avg_enemies_per_snapshot * ((n - 1.0) / n) + (enemy_count as f32 / n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sends_every_interval_ticks() {
        let mut builder = SnapshotBuilder::new(3);
        let sent: Vec<bool> = (0..6).map(|_| builder.should_send()).collect();
        assert_eq!(sent, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn force_next_sends_immediately() {
        let mut builder = SnapshotBuilder::new(3);
        builder.should_send();
        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn stats_track_running_average() {
        let mut stats = SnapshotStats::default();
        stats.record(2, 100);
        stats.record(4, 300);
        assert_eq!(stats.total_snapshots, 2);
        assert_eq!(stats.total_bytes, 400);
        assert!((stats.avg_enemies_per_snapshot - 3.0).abs() < 1e-5);
    }
}

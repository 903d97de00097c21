//! Fixed-step simulation shared by both peers

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::util::time::secs_to_ticks;
use crate::ws::protocol::{ContactEffect, GameEvent, NetMsg};

use super::ability::Ability;
use super::camera::Camera;
use super::chat::{sanitize, ChatLog};
use super::collectible::{brick_burst, AbilityStar, HealthItem, ItemId, Particle, ScorePop, Star};
use super::enemy::{Enemy, EnemyArena, EnemyId, STOMP_REWARD};
use super::input::InputFrame;
use super::level::LevelSource;
use super::physics::{classify_contact, Aabb, ContactOutcome};
use super::platform::Platform;
use super::player::{HurtOutcome, Player, PlayerAction, PlayerId, PlayerState};
use super::projectile::{AbilityShot, InhaleStar};
use super::snapshot::SnapshotBuilder;
use super::sync::{reconcile, Inbox, Role, StateSnapshot};
use super::tuning::Tuning;
use super::view::{EnemyView, FrameView, ItemSources, PlayerView};
use super::world::{cell_of, BlockItem, SpawnKind, World, TILE};

/// Pause after a level clear or game over before the next level loads
pub const PHASE_TICKS: u32 = secs_to_ticks(3);
/// Extra wait on the mirror before it reloads without a RESTART
pub const RESTART_GRACE_TICKS: u32 = secs_to_ticks(2);
/// Consecutive ticks a player must spend past the goal column
pub const GOAL_HOLD_TICKS: u32 = 90;
/// Ids of level items start here so they never meet enemy ids
pub const FIRST_ITEM_ID: ItemId = 1000;
pub const DEFAULT_SNAPSHOT_INTERVAL: u32 = 3;

const SWORD_RANGE: f32 = 48.0;
/// Reach below the feet for hazard tiles
const HAZARD_REACH: f32 = 2.0;
/// Vertical offset of a dropped ability above the player
const DROP_LIFT: f32 = 8.0;

/// Session phase; pauses count down in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SimPhase {
    Playing,
    LevelClear { countdown: u32 },
    GameOver { countdown: u32 },
}

impl SimPhase {
    pub fn is_playing(self) -> bool {
        self == SimPhase::Playing
    }
}

/// Construction parameters
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    pub role: Role,
    pub start_level: usize,
    /// Ticks between STATE messages on the authority
    pub snapshot_interval: u32,
    pub seed: u64,
    pub tuning: Tuning,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            role: Role::Authority,
            start_level: 0,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            seed: 0,
            tuning: Tuning::default(),
        }
    }
}

/// One peer's copy of the game world.
///
/// Network messages go through [`Simulation::receive`] and are buffered;
/// nothing changes until the next [`Simulation::tick`], which applies them
/// and then runs one fixed step.
pub struct Simulation {
    role: Role,
    levels: Arc<dyn LevelSource + Send + Sync>,
    level_index: usize,
    world: Box<dyn World + Send>,
    tuning: Tuning,
    tick: u64,
    phase: SimPhase,
    players: [Player; 2],
    peer_connected: bool,

    // Remote input as last received, edges cleared after first use
    remote_input: InputFrame,
    last_input_tick: u64,
    last_state_tick: u64,

    enemies: EnemyArena,
    stars: Vec<Star>,
    health_items: Vec<HealthItem>,
    ability_stars: Vec<AbilityStar>,
    platforms: Vec<Platform>,
    shots: Vec<AbilityShot>,
    inhale_stars: Vec<InhaleStar>,
    particles: Vec<Particle>,
    pops: Vec<ScorePop>,
    chat: ChatLog,
    camera: Camera,

    inbox: Inbox,
    outbox: Vec<NetMsg>,
    snapshots: SnapshotBuilder,
    next_enemy_id: EnemyId,
    next_item_id: ItemId,
    goal_ticks: u32,
    rng: ChaCha8Rng,
}

impl Simulation {
    pub fn new(config: SimConfig, levels: Arc<dyn LevelSource + Send + Sync>) -> Self {
        let world = levels.load(config.start_level);
        let players = [
            Player::new(0, world.p1_spawn(), &config.tuning),
            Player::new(1, world.p2_spawn(), &config.tuning),
        ];
        let camera = Camera::new(world.width_px(), world.height_px());
        let mut sim = Self {
            role: config.role,
            levels,
            level_index: config.start_level,
            world,
            tuning: config.tuning,
            tick: 0,
            phase: SimPhase::Playing,
            players,
            peer_connected: false,
            remote_input: InputFrame::default(),
            last_input_tick: 0,
            last_state_tick: 0,
            enemies: EnemyArena::new(),
            stars: Vec::new(),
            health_items: Vec::new(),
            ability_stars: Vec::new(),
            platforms: Vec::new(),
            shots: Vec::new(),
            inhale_stars: Vec::new(),
            particles: Vec::new(),
            pops: Vec::new(),
            chat: ChatLog::new(),
            camera,
            inbox: Inbox::new(),
            outbox: Vec::new(),
            snapshots: SnapshotBuilder::new(config.snapshot_interval),
            next_enemy_id: 1,
            next_item_id: FIRST_ITEM_ID,
            goal_ticks: 0,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
        };
        sim.load_level(config.start_level, false);
        sim
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    pub fn level_index(&self) -> usize {
        self.level_index
    }

    pub fn players(&self) -> &[Player; 2] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(usize::from(id))
    }

    pub fn enemies(&self) -> &EnemyArena {
        &self.enemies
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    pub fn health_items(&self) -> &[HealthItem] {
        &self.health_items
    }

    pub fn ability_stars(&self) -> &[AbilityStar] {
        &self.ability_stars
    }

    pub fn world(&self) -> &dyn World {
        &*self.world
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn peer_connected(&self) -> bool {
        self.peer_connected
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    // ========================================================================
    // Session surface
    // ========================================================================

    /// Buffer a message from the peer until the next tick
    pub fn receive(&mut self, msg: NetMsg) {
        debug!(kind = msg.kind(), "Message buffered");
        self.inbox.push(msg);
    }

    /// Replace the gameplay tunables; takes effect on the next tick
    pub fn set_tuning(&mut self, tuning: Tuning) {
        self.tuning = tuning;
    }

    /// The peer connected. The authority puts the guest player back at its
    /// spawn and sends a full snapshot right away.
    pub fn peer_joined(&mut self) {
        self.peer_connected = true;
        if self.role.is_authority() {
            let spawn = self.world.p2_spawn();
            let remote = usize::from(self.role.remote_id());
            self.players[remote].respawn(spawn, &self.tuning);
            self.remote_input = InputFrame::default();
            self.last_input_tick = 0;
            self.snapshots.force_next();
        }
        info!(role = ?self.role, tick = self.tick, "Peer joined");
    }

    /// The peer went away; its player freezes where it last was
    pub fn peer_left(&mut self) {
        if self.peer_connected {
            info!(role = ?self.role, tick = self.tick, "Peer left, continuing alone");
        }
        self.peer_connected = false;
        self.remote_input = InputFrame::default();
    }

    /// Post a chat line from the local player
    pub fn say(&mut self, text: &str) {
        let Some(text) = sanitize(text) else {
            return;
        };
        let player_id = self.role.local_id();
        self.chat.push(player_id, text.clone());
        self.outbox
            .push(NetMsg::Event(GameEvent::Chat { player_id, text }));
    }

    /// Run one tick with the local player's input. Returns the messages to
    /// send to the peer.
    pub fn tick(&mut self, local_input: InputFrame) -> Vec<NetMsg> {
        self.apply_inbound();
        self.tick += 1;

        let mut out = vec![NetMsg::Input {
            tick: self.tick,
            input: local_input,
        }];

        match self.phase {
            SimPhase::Playing => self.step(local_input),
            SimPhase::LevelClear { .. } | SimPhase::GameOver { .. } => self.count_down(),
        }
        self.chat.tick();

        out.append(&mut self.outbox);
        if self.role.is_authority() && self.snapshots.should_send() {
            out.push(SnapshotBuilder::build(
                self.tick,
                &self.players,
                &self.enemies,
                &self.stars,
            ));
        }
        out
    }

    /// Read-only picture of the current tick for rendering
    pub fn view(&self) -> FrameView {
        let sources = ItemSources {
            stars: &self.stars,
            health: &self.health_items,
            ability_stars: &self.ability_stars,
            shots: &self.shots,
            inhale_stars: &self.inhale_stars,
            enemy_shots: self.enemies.iter().flat_map(|e| e.shots.iter()).collect(),
            platforms: &self.platforms,
            particles: &self.particles,
            pops: &self.pops,
        };
        FrameView {
            tick: self.tick,
            level: self.level_index,
            phase: self.phase,
            camera: self.camera,
            players: self
                .players
                .iter()
                .filter(|p| self.is_active(p.id))
                .map(PlayerView::from)
                .collect(),
            enemies: self.enemies.iter().map(EnemyView::from).collect(),
            items: sources.collect(),
            chat: self.chat.lines().to_vec(),
        }
    }

    // ========================================================================
    // Level lifecycle
    // ========================================================================

    fn load_level(&mut self, index: usize, keep_score: bool) {
        let count = self.levels.count().max(1);
        self.level_index = index % count;
        self.world = self.levels.load(self.level_index);

        let spawns = [self.world.p1_spawn(), self.world.p2_spawn()];
        for (player, spawn) in self.players.iter_mut().zip(spawns) {
            if keep_score {
                player.respawn(spawn, &self.tuning);
            } else {
                *player = Player::new(player.id, spawn, &self.tuning);
            }
        }

        self.enemies.clear();
        self.stars.clear();
        self.health_items.clear();
        self.ability_stars.clear();
        self.platforms.clear();
        self.shots.clear();
        self.inhale_stars.clear();
        self.particles.clear();
        self.pops.clear();
        self.next_enemy_id = 1;
        self.next_item_id = FIRST_ITEM_ID;

        let width = self.world.width_px();
        for spawn in self.world.spawns().to_vec() {
            match spawn.kind {
                SpawnKind::Enemy(kind) => {
                    // the mirror builds its enemies from snapshots
                    if self.role.is_authority() {
                        let id = self.next_enemy_id;
                        self.next_enemy_id += 1;
                        self.enemies.insert(Enemy::at_cell(
                            id,
                            kind,
                            spawn.col,
                            spawn.row,
                            &mut self.rng,
                        ));
                    }
                }
                SpawnKind::Star => {
                    let id = self.alloc_item_id();
                    self.stars.push(Star::placed(
                        id,
                        spawn.col as f32 * TILE + 8.0,
                        spawn.row as f32 * TILE + 8.0,
                    ));
                }
                SpawnKind::Health => {
                    let id = self.alloc_item_id();
                    self.health_items.push(HealthItem::new(id, spawn.col, spawn.row));
                }
                SpawnKind::Platform => {
                    self.platforms
                        .push(Platform::at_cell(spawn.col, spawn.row, width));
                }
            }
        }

        self.phase = SimPhase::Playing;
        self.goal_ticks = 0;
        self.last_state_tick = 0;
        self.remote_input = InputFrame::default();
        self.camera = Camera::new(width, self.world.height_px());
        self.snapshots.force_next();

        info!(
            role = ?self.role,
            level = self.level_index,
            enemies = self.enemies.len(),
            stars = self.stars.len(),
            "Level loaded"
        );
    }

    fn alloc_item_id(&mut self) -> ItemId {
        let id = self.next_item_id;
        self.next_item_id += 1;
        id
    }

    /// Level to load once the current pause ends
    fn next_level(&self) -> usize {
        match self.phase {
            SimPhase::GameOver { .. } => 0,
            _ => (self.level_index + 1) % self.levels.count().max(1),
        }
    }

    fn count_down(&mut self) {
        let (countdown, keep_score) = match &mut self.phase {
            SimPhase::Playing => return,
            SimPhase::LevelClear { countdown } => (countdown, true),
            SimPhase::GameOver { countdown } => (countdown, false),
        };
        *countdown = countdown.saturating_sub(1);
        if *countdown > 0 {
            return;
        }

        let next = self.next_level();
        if self.role.is_authority() {
            info!(level = next, "Restarting");
            self.load_level(next, keep_score);
            self.outbox.push(NetMsg::Restart { level: next });
        } else {
            warn!(level = next, "No restart from the authority, reloading locally");
            self.load_level(next, keep_score);
        }
    }

    fn enter_phase(&mut self, phase: SimPhase) {
        if self.phase.is_playing() {
            self.phase = phase;
        }
    }

    /// Pause length; the mirror waits longer for the authority's RESTART
    fn pause_ticks(&self) -> u32 {
        if self.role.is_authority() {
            PHASE_TICKS
        } else {
            PHASE_TICKS + RESTART_GRACE_TICKS
        }
    }

    // ========================================================================
    // Inbound messages
    // ========================================================================

    fn apply_inbound(&mut self) {
        let inbound = self.inbox.drain();

        if let Some(level) = inbound.restart {
            if self.role.is_authority() {
                warn!(level, "Ignoring restart from mirror");
            } else {
                info!(level, "Restart received");
                let keep_score = !matches!(self.phase, SimPhase::GameOver { .. });
                self.load_level(level, keep_score);
            }
        }

        if let Some((tick, input)) = inbound.input {
            if tick >= self.last_input_tick {
                self.last_input_tick = tick;
                self.remote_input = input;
            }
        }

        if let Some(state) = inbound.state {
            self.apply_state(&state);
        }

        for event in inbound.events {
            self.apply_event(event);
        }
    }

    fn apply_state(&mut self, state: &StateSnapshot) {
        if self.role.is_authority() {
            warn!(tick = state.tick, "Ignoring state from mirror");
            return;
        }
        if state.tick < self.last_state_tick {
            debug!(tick = state.tick, last = self.last_state_tick, "Stale state dropped");
            return;
        }
        self.last_state_tick = state.tick;
        let report = reconcile(
            state,
            &mut self.players,
            &mut self.enemies,
            &mut self.stars,
            &mut self.rng,
        );
        if report.created > 0 || report.evicted > 0 {
            debug!(
                tick = state.tick,
                created = report.created,
                evicted = report.evicted,
                skipped = report.skipped,
                "State reconciled"
            );
        }
    }

    fn apply_event(&mut self, event: GameEvent) {
        if let GameEvent::Chat { text, .. } = &event {
            if let Some(text) = sanitize(text) {
                self.chat.push(self.role.remote_id(), text);
            }
            return;
        }
        if self.role.is_authority() {
            warn!(?event, "Ignoring event from mirror");
            return;
        }

        match event {
            GameEvent::Stomp { enemy_id, .. } => {
                if let Some(enemy) = self.enemies.get_mut(enemy_id) {
                    enemy.stomp();
                    self.pops.push(ScorePop::new(
                        enemy.body.x,
                        enemy.body.y,
                        STOMP_REWARD.to_string(),
                    ));
                }
            }
            GameEvent::Hurt { player_id, effect } => {
                debug!(player_id, ?effect, "Peer reported hurt");
            }
            GameEvent::BrickBreak { col, row } => {
                if self.world.hit_block(col, row) == Some(BlockItem::Brick) {
                    self.particles.extend(brick_burst(col, row));
                }
            }
            GameEvent::BlockHit { col, row, star_id, .. } => {
                // the local grid decides what the block produced
                let produced = self.world.hit_block(col, row);
                match (produced, star_id) {
                    (Some(BlockItem::Star), Some(id)) => {
                        self.stars.push(Star::ejected(id, col, row.saturating_sub(1)));
                    }
                    (produced, _) => {
                        debug!(col, row, ?produced, "Block hit produced no star locally");
                    }
                }
            }
            GameEvent::Win => {
                info!(level = self.level_index, "Level cleared");
                let countdown = self.pause_ticks();
                self.enter_phase(SimPhase::LevelClear { countdown });
            }
            GameEvent::GameOver => {
                info!(level = self.level_index, "Game over");
                let countdown = self.pause_ticks();
                self.enter_phase(SimPhase::GameOver { countdown });
            }
            GameEvent::Chat { .. } => {}
        }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Player present in this session
    fn is_active(&self, id: PlayerId) -> bool {
        id == self.role.local_id() || self.peer_connected
    }

    /// Player whose physics this peer runs
    fn simulates(&self, id: PlayerId) -> bool {
        if self.role.is_authority() {
            self.is_active(id)
        } else {
            id == self.role.local_id()
        }
    }

    fn step(&mut self, local_input: InputFrame) {
        let tuning = self.tuning;

        // Players
        let local = usize::from(self.role.local_id());
        self.players[local].update(&local_input, &*self.world, &tuning);
        let remote = self.role.remote_id();
        if self.role.is_authority() && self.peer_connected {
            let input = self.remote_input;
            self.remote_input.action_just = false;
            self.remote_input.jump_just = false;
            self.players[usize::from(remote)].update(&input, &*self.world, &tuning);
        }

        // Enemies
        if self.role.is_authority() {
            self.inhale_pass();
        }
        for enemy in self.enemies.iter_mut() {
            enemy.update(&*self.world, &mut self.rng);
        }

        // Platforms
        for plat in &mut self.platforms {
            plat.advance();
        }
        for id in [0, 1] {
            if !self.simulates(id) {
                continue;
            }
            let player = &mut self.players[usize::from(id)];
            if player.is_dead() {
                continue;
            }
            for plat in &self.platforms {
                if plat.carry(&mut player.body) {
                    player.on_ground = true;
                    break;
                }
            }
        }

        // Collisions
        self.collect_pickups();
        if self.role.is_authority() {
            self.enemy_contacts();
            self.hazard_contacts();
            self.enemy_shot_contacts();
            self.block_hits();
        }

        // Ability side effects
        for id in [0, 1] {
            if self.simulates(id) {
                self.run_action(id);
            }
        }

        // Items and projectiles
        for star in &mut self.stars {
            star.update();
        }
        for item in &mut self.health_items {
            item.update(&*self.world);
        }
        for item in &mut self.ability_stars {
            item.update(&*self.world);
        }
        for shot in &mut self.shots {
            shot.update(&*self.world);
        }
        for star in &mut self.inhale_stars {
            star.update(&*self.world);
        }
        for p in &mut self.particles {
            p.update();
        }
        for pop in &mut self.pops {
            pop.update();
        }
        self.projectile_hits();

        if self.role.is_authority() {
            self.check_goal();
            self.check_game_over();
        }

        // Prune; stars stay so snapshots keep carrying their dead flag
        let pruned = self.enemies.prune();
        if pruned > 0 {
            debug!(pruned, "Enemies removed");
        }
        self.health_items.retain(|h| !h.dead);
        self.ability_stars.retain(|a| !a.dead);
        self.shots.retain(|s| !s.dead);
        self.inhale_stars.retain(|s| !s.dead);
        self.particles.retain(|p| !p.is_dead());
        self.pops.retain(|p| !p.is_dead());

        self.world.advance();
        let active: Vec<_> = self
            .players
            .iter()
            .filter(|p| self.is_active(p.id))
            .map(|p| p.body)
            .collect();
        self.camera.follow(active.iter());
    }

    /// Pull enemies inside a player's inhale zone; the first player to get
    /// one within capture range keeps it.
    fn inhale_pass(&mut self) {
        for enemy in self.enemies.iter_mut() {
            enemy.being_inhaled = false;
        }
        let tuning = self.tuning;

        for id in [0, 1] {
            if !self.is_active(id) {
                continue;
            }
            let player = &self.players[usize::from(id)];
            if !player.inhaling || player.is_dead() || player.held.is_some() {
                continue;
            }
            let body = player.body;
            let zone_x = if player.facing_right {
                body.x + body.w
            } else {
                body.x - tuning.inhale_range
            };
            let zone = Aabb::new(
                zone_x,
                body.center_y() - tuning.inhale_height / 2.0,
                tuning.inhale_range,
                tuning.inhale_height,
            );

            let mut captured = None;
            for enemy in self.enemies.iter_mut() {
                if !enemy.is_active() || !enemy.caps().inhalable {
                    continue;
                }
                if !zone.overlaps(&enemy.body.aabb()) {
                    continue;
                }
                let dx = body.center_x() - enemy.body.center_x();
                let dy = body.center_y() - enemy.body.center_y();
                if (dx * dx + dy * dy).sqrt() < tuning.capture_radius {
                    enemy.remove = true;
                    enemy.being_inhaled = false;
                    captured = Some((enemy.id, enemy.kind));
                    break;
                }
                enemy.start_inhale(body.center_x(), body.center_y(), tuning.inhale_pull_speed);
            }

            if let Some((enemy_id, kind)) = captured {
                debug!(player_id = id, enemy_id, kind = kind.tag(), "Enemy captured");
                self.players[usize::from(id)].capture(enemy_id, kind);
            }
        }
    }

    fn collect_pickups(&mut self) {
        for player in self.players.iter_mut() {
            let active = player.id == self.role.local_id() || self.peer_connected;
            if !active || player.is_dead() {
                continue;
            }
            let body = player.body;

            // Ejected stars are already credited to whoever hit the block
            for star in self.stars.iter_mut() {
                if !star.dead && !star.is_ejected() && body.overlaps(&star.body) {
                    star.dead = true;
                    player.add_star();
                }
            }
            for item in self.health_items.iter_mut() {
                if !item.dead && body.overlaps(&item.body) {
                    item.dead = true;
                    player.add_health();
                }
            }
            for item in self.ability_stars.iter_mut() {
                if !item.dead && body.overlaps(&item.body) && player.grant_pickup(item.ability) {
                    item.dead = true;
                }
            }
        }
    }

    fn enemy_contacts(&mut self) {
        for id in [0, 1] {
            if !self.simulates(id) {
                continue;
            }
            let mut hurt_by = None;
            {
                let player = &mut self.players[usize::from(id)];
                if player.is_dead() {
                    continue;
                }
                for enemy in self.enemies.iter_mut() {
                    if !enemy.is_active() || enemy.being_inhaled {
                        continue;
                    }
                    if !player.body.overlaps(&enemy.body) {
                        continue;
                    }
                    if player.state == PlayerState::Rock {
                        player.score += enemy.kill();
                        continue;
                    }
                    match classify_contact(&player.body, &enemy.body) {
                        ContactOutcome::Stomp => {
                            player.score += enemy.stomp();
                            player.stomp_bounce();
                            self.pops.push(ScorePop::new(
                                enemy.body.x,
                                enemy.body.y,
                                STOMP_REWARD.to_string(),
                            ));
                            self.outbox.push(NetMsg::Event(GameEvent::Stomp {
                                enemy_id: enemy.id,
                                player_id: id,
                            }));
                        }
                        ContactOutcome::Hurt => {
                            let caps = enemy.caps();
                            let effect = if caps.freezes {
                                Some(ContactEffect::Freeze)
                            } else if caps.shocks {
                                Some(ContactEffect::Shock)
                            } else {
                                None
                            };
                            hurt_by = Some(effect);
                            break;
                        }
                    }
                }
            }
            if let Some(effect) = hurt_by {
                self.hurt_player(id, effect);
            }
        }
    }

    fn hazard_contacts(&mut self) {
        for id in [0, 1] {
            if !self.simulates(id) {
                continue;
            }
            let player = &self.players[usize::from(id)];
            if player.is_dead() {
                continue;
            }
            let col = cell_of(player.body.center_x());
            let row = cell_of(player.body.bottom() + HAZARD_REACH);
            if self.world.get(col, row).is_hazard() {
                self.hurt_player(id, None);
            }
        }
    }

    fn enemy_shot_contacts(&mut self) {
        for id in [0, 1] {
            let player = &self.players[usize::from(id)];
            // shots pass through a blinking player without being spent
            if !self.simulates(id) || player.is_dead() || player.invuln > 0 {
                continue;
            }
            let target = self.players[usize::from(id)].body.aabb();
            let mut hit = false;
            for enemy in self.enemies.iter_mut() {
                for shot in enemy.shots.iter_mut() {
                    if !shot.is_spent() && shot.hitbox().overlaps(&target) {
                        shot.life = 0;
                        hit = true;
                    }
                }
            }
            if hit {
                self.hurt_player(id, None);
            }
        }
    }

    fn block_hits(&mut self) {
        for id in [0, 1] {
            if !self.simulates(id) {
                continue;
            }
            let body = {
                let player = &self.players[usize::from(id)];
                if !player.bumped_head || player.is_dead() {
                    continue;
                }
                player.body
            };
            let row = cell_of(body.y - 1.0);
            let left = cell_of(body.x);
            let right = cell_of(body.x + body.w - 1.0);
            for col in left..=right {
                let Some(item) = self.world.hit_block(col, row) else {
                    continue;
                };
                match item {
                    BlockItem::Brick => {
                        self.particles.extend(brick_burst(col, row));
                        self.outbox
                            .push(NetMsg::Event(GameEvent::BrickBreak { col, row }));
                    }
                    BlockItem::Star => {
                        let star_id = self.alloc_item_id();
                        self.stars.push(Star::ejected(star_id, col, row.saturating_sub(1)));
                        self.players[usize::from(id)].add_star();
                        self.outbox.push(NetMsg::Event(GameEvent::BlockHit {
                            col,
                            row,
                            item,
                            star_id: Some(star_id),
                        }));
                    }
                }
            }
        }
    }

    fn hurt_player(&mut self, id: PlayerId, effect: Option<ContactEffect>) {
        let player = &mut self.players[usize::from(id)];
        match player.hurt() {
            HurtOutcome::Ignored => return,
            HurtOutcome::LostAbility(ability) => {
                let (x, y) = (player.body.x, player.body.y - DROP_LIFT);
                let vx = self.rng.gen_range(-2.0..2.0);
                let item_id = self.alloc_item_id();
                self.ability_stars
                    .push(AbilityStar::drop_at(item_id, x, y, ability, vx));
                debug!(player_id = id, ?ability, "Ability knocked loose");
            }
            HurtOutcome::Damaged => {}
            HurtOutcome::Died => {
                info!(player_id = id, lives = player.lives, "Player died");
            }
        }
        self.outbox
            .push(NetMsg::Event(GameEvent::Hurt { player_id: id, effect }));
    }

    fn run_action(&mut self, id: PlayerId) {
        let player = &mut self.players[usize::from(id)];
        let Some(action) = player.take_action() else {
            return;
        };
        match action {
            PlayerAction::Spit(held) => {
                self.inhale_stars
                    .push(InhaleStar::spit(&player.body, player.facing_right, held.kind, id));
            }
            PlayerAction::Fire(Ability::Sword) => self.sword_slash(id),
            PlayerAction::Fire(ability) => {
                if let Some(shot) = AbilityShot::launch(ability, &player.body, player.facing_right, id)
                {
                    self.shots.push(shot);
                }
            }
        }
    }

    fn sword_slash(&mut self, id: PlayerId) {
        let player = &mut self.players[usize::from(id)];
        let dir = if player.facing_right { 1.0 } else { -1.0 };
        for enemy in self.enemies.iter_mut() {
            if !enemy.is_active() {
                continue;
            }
            let dx = enemy.body.center_x() - player.body.center_x();
            let dy = enemy.body.center_y() - player.body.center_y();
            if dx * dir >= 0.0 && dx.abs() <= SWORD_RANGE && dy.abs() < player.body.h {
                let reward = enemy.kill();
                player.score += reward;
                self.pops
                    .push(ScorePop::new(enemy.body.x, enemy.body.y, reward.to_string()));
            }
        }
    }

    /// Ability shots and spat stars against enemies; kills go to the shooter
    fn projectile_hits(&mut self) {
        for shot in self.shots.iter_mut().filter(|s| !s.dead) {
            for enemy in self.enemies.iter_mut() {
                if !enemy.is_active() || !shot.body.overlaps(&enemy.body) {
                    continue;
                }
                let reward = enemy.kill();
                self.players[usize::from(shot.owner.min(1))].score += reward;
                self.pops
                    .push(ScorePop::new(enemy.body.x, enemy.body.y, reward.to_string()));
                if !shot.kind.pierces() {
                    shot.dead = true;
                    break;
                }
            }
        }
        for star in self.inhale_stars.iter_mut().filter(|s| !s.dead) {
            let hit = self
                .enemies
                .iter_mut()
                .find(|e| e.is_active() && star.body.overlaps(&e.body));
            if let Some(enemy) = hit {
                let reward = enemy.kill();
                self.players[usize::from(star.owner.min(1))].score += reward;
                self.pops
                    .push(ScorePop::new(enemy.body.x, enemy.body.y, reward.to_string()));
                star.dead = true;
            }
        }
    }

    fn check_goal(&mut self) {
        let goal = self.world.goal_col();
        if goal <= 0 {
            return;
        }
        let past_goal = self
            .players
            .iter()
            .any(|p| self.is_active(p.id) && !p.is_dead() && cell_of(p.body.x) > goal);
        if !past_goal {
            self.goal_ticks = 0;
            return;
        }
        self.goal_ticks += 1;
        if self.goal_ticks > GOAL_HOLD_TICKS {
            info!(level = self.level_index, tick = self.tick, "Level cleared");
            self.phase = SimPhase::LevelClear {
                countdown: PHASE_TICKS,
            };
            self.outbox.push(NetMsg::Event(GameEvent::Win));
        }
    }

    fn check_game_over(&mut self) {
        if !self.phase.is_playing() {
            return;
        }
        let all_down = self
            .players
            .iter()
            .filter(|p| self.is_active(p.id))
            .all(|p| p.is_dead());
        if all_down {
            info!(level = self.level_index, tick = self.tick, "Game over");
            self.phase = SimPhase::GameOver {
                countdown: PHASE_TICKS,
            };
            self.outbox.push(NetMsg::Event(GameEvent::GameOver));
        }
    }
}

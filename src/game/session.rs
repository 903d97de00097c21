//! Tick loop that owns a simulation and pumps its peer link

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::util::time::tick_duration;
use crate::ws::protocol::{encode, NetMsg};

use super::input::InputScript;
use super::sim::{SimPhase, Simulation};
use super::snapshot::SnapshotStats;
use super::sync::Role;
use super::tuning::TuningHandle;
use super::view::FrameView;

/// Default capacity of each direction of a peer link
pub const LINK_CAPACITY: usize = 256;

/// Session side of a connection to the other peer
pub struct PeerLink {
    pub inbound: mpsc::Receiver<NetMsg>,
    pub outbound: mpsc::Sender<NetMsg>,
}

/// Transport side of a connection to the other peer
pub struct LinkEnds {
    /// Decoded messages from the peer go here
    pub to_session: mpsc::Sender<NetMsg>,
    /// Messages the session wants delivered to the peer
    pub from_session: mpsc::Receiver<NetMsg>,
}

impl PeerLink {
    pub fn channel(capacity: usize) -> (PeerLink, LinkEnds) {
        let (to_session, inbound) = mpsc::channel(capacity);
        let (outbound, from_session) = mpsc::channel(capacity);
        (
            PeerLink { inbound, outbound },
            LinkEnds {
                to_session,
                from_session,
            },
        )
    }
}

/// Published after every tick for the HTTP surface
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub role: Role,
    pub tick: u64,
    pub level: usize,
    pub phase: SimPhase,
    pub peer_connected: bool,
    pub snapshots_sent: u64,
    pub snapshot_bytes: u64,
    pub avg_enemies_per_snapshot: f32,
}

#[derive(Debug, thiserror::Error)]
#[error("session is no longer running")]
pub struct SessionClosed;

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    join_tx: mpsc::Sender<PeerLink>,
    chat_tx: mpsc::Sender<String>,
    status: Arc<RwLock<SessionStatus>>,
    frame: Arc<RwLock<Option<FrameView>>>,
    tuning: TuningHandle,
}

impl SessionHandle {
    /// Hand a freshly connected peer to the session
    pub async fn attach(&self, link: PeerLink) -> Result<(), SessionClosed> {
        self.join_tx.send(link).await.map_err(|_| SessionClosed)
    }

    /// Queue a chat line from the local player
    pub fn say(&self, text: String) -> Result<(), SessionClosed> {
        match self.chat_tx.try_send(text) {
            Ok(()) | Err(TrySendError::Full(_)) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(SessionClosed),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    /// Most recent frame, if a tick has run
    pub fn frame(&self) -> Option<FrameView> {
        self.frame.read().clone()
    }

    pub fn tuning(&self) -> &TuningHandle {
        &self.tuning
    }
}

/// Owns the simulation and drives it at the fixed tick rate.
/// Inbound messages are drained only between ticks.
pub struct PeerSession {
    sim: Simulation,
    link: Option<PeerLink>,
    join_rx: mpsc::Receiver<PeerLink>,
    chat_rx: mpsc::Receiver<String>,
    input: InputScript,
    tuning: TuningHandle,
    status: Arc<RwLock<SessionStatus>>,
    frame: Arc<RwLock<Option<FrameView>>>,
    stats: SnapshotStats,
}

impl PeerSession {
    pub fn new(sim: Simulation, input: InputScript, tuning: TuningHandle) -> (Self, SessionHandle) {
        let (join_tx, join_rx) = mpsc::channel(4);
        let (chat_tx, chat_rx) = mpsc::channel(16);
        let status = Arc::new(RwLock::new(SessionStatus {
            role: sim.role(),
            tick: sim.tick_count(),
            level: sim.level_index(),
            phase: sim.phase(),
            peer_connected: false,
            snapshots_sent: 0,
            snapshot_bytes: 0,
            avg_enemies_per_snapshot: 0.0,
        }));
        let frame = Arc::new(RwLock::new(None));

        let handle = SessionHandle {
            join_tx,
            chat_tx,
            status: status.clone(),
            frame: frame.clone(),
            tuning: tuning.clone(),
        };
        let session = Self {
            sim,
            link: None,
            join_rx,
            chat_rx,
            input,
            tuning,
            status,
            frame,
            stats: SnapshotStats::default(),
        };
        (session, handle)
    }

    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    /// Run the fixed-rate tick loop until every handle is gone
    pub async fn run(mut self) {
        info!(role = ?self.sim.role(), level = self.sim.level_index(), "Session started");

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            if !self.step() {
                break;
            }
        }

        info!(tick = self.sim.tick_count(), "Session stopped");
    }

    /// One tick boundary: take joins and messages, tick, send, publish.
    /// Returns false once the session has nothing left to serve.
    pub fn step(&mut self) -> bool {
        let handles_open = self.accept_joins();
        self.drain_link();
        while let Ok(text) = self.chat_rx.try_recv() {
            self.sim.say(&text);
        }

        self.sim.set_tuning(self.tuning.get());
        let input = self.input.next_frame();
        let out = self.sim.tick(input);
        self.send(out);
        self.publish();

        handles_open || self.link.is_some()
    }

    fn accept_joins(&mut self) -> bool {
        loop {
            match self.join_rx.try_recv() {
                Ok(link) => {
                    if self.link.is_some() {
                        warn!("Replacing existing peer link");
                    }
                    self.link = Some(link);
                    self.sim.peer_joined();
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn drain_link(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        let mut closed = false;
        loop {
            match link.inbound.try_recv() {
                Ok(msg) => self.sim.receive(msg),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }
        if closed {
            self.disconnect();
        }
    }

    fn send(&mut self, out: Vec<NetMsg>) {
        let Some(link) = self.link.as_ref() else {
            return;
        };
        let mut closed = false;
        for msg in out {
            if let NetMsg::State { enemies, .. } = &msg {
                let bytes = encode(&msg).map(|s| s.len()).unwrap_or(0);
                self.stats.record(enemies.len(), bytes);
            }
            match link.outbound.try_send(msg) {
                Ok(()) => {}
                Err(TrySendError::Full(msg)) => {
                    debug!(kind = msg.kind(), "Outbound queue full, message dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    closed = true;
                    break;
                }
            }
        }
        if closed {
            self.disconnect();
        }
    }

    fn disconnect(&mut self) {
        self.link = None;
        self.sim.peer_left();
    }

    fn publish(&self) {
        {
            let mut status = self.status.write();
            status.tick = self.sim.tick_count();
            status.level = self.sim.level_index();
            status.phase = self.sim.phase();
            status.peer_connected = self.sim.peer_connected();
            status.snapshots_sent = self.stats.total_snapshots;
            status.snapshot_bytes = self.stats.total_bytes;
            status.avg_enemies_per_snapshot = self.stats.avg_enemies_per_snapshot;
        }
        *self.frame.write() = Some(self.sim.view());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::InputFrame;
    use crate::game::level::MapLevels;
    use crate::game::sim::SimConfig;
    use crate::game::sync::Role;
    use crate::game::tuning::TuningPatch;
    use tokio_test::{assert_pending, assert_ready, task};

    fn session(role: Role) -> (PeerSession, SessionHandle) {
        let levels = Arc::new(MapLevels::builtin().unwrap());
        let sim = Simulation::new(
            SimConfig {
                role,
                ..SimConfig::default()
            },
            levels,
        );
        PeerSession::new(sim, InputScript::default(), TuningHandle::default())
    }

    #[test]
    fn step_relays_input_and_state_to_the_peer() {
        let (mut session, handle) = session(Role::Authority);
        let (link, mut ends) = PeerLink::channel(LINK_CAPACITY);
        handle.join_tx.try_send(link).unwrap();

        let mut recv = task::spawn(ends.from_session.recv());
        assert_pending!(recv.poll());

        assert!(session.step());
        assert!(recv.is_woken());
        let first = assert_ready!(recv.poll());
        assert!(matches!(first, Some(NetMsg::Input { tick: 1, .. })));
        drop(recv);

        let mut kinds = Vec::new();
        while let Ok(msg) = ends.from_session.try_recv() {
            kinds.push(msg.kind());
        }
        assert!(kinds.contains(&"state"));

        let status = handle.status();
        assert!(status.peer_connected);
        assert_eq!(status.tick, 1);
        assert_eq!(status.snapshots_sent, 1);
        assert!(handle.frame().is_some());
    }

    #[test]
    fn inbound_messages_wait_for_the_tick_boundary() {
        let (mut session, handle) = session(Role::Authority);
        let (link, ends) = PeerLink::channel(LINK_CAPACITY);
        handle.join_tx.try_send(link).unwrap();
        session.step();

        let left = InputFrame {
            left: true,
            ..InputFrame::default()
        };
        ends.to_session
            .try_send(NetMsg::Input {
                tick: 2,
                input: left,
            })
            .unwrap();
        assert_eq!(session.sim().player(1).map(|p| p.body.vx), Some(0.0));
        session.step();
        let guest = session.sim().player(1).unwrap();
        assert!(guest.body.vx < 0.0);
        assert!(!guest.facing_right);
        assert_eq!(session.sim().tick_count(), 2);
    }

    #[test]
    fn closed_link_falls_back_to_shadow_mode() {
        let (mut session, handle) = session(Role::Mirror);
        let (link, ends) = PeerLink::channel(LINK_CAPACITY);
        handle.join_tx.try_send(link).unwrap();
        session.step();
        assert!(session.sim().peer_connected());

        drop(ends);
        assert!(session.step());
        assert!(!session.sim().peer_connected());
        assert!(!handle.status().peer_connected);
    }

    #[test]
    fn session_ends_when_handles_and_link_are_gone() {
        let (mut session, handle) = session(Role::Authority);
        drop(handle);
        assert!(!session.step());
    }

    #[test]
    fn tuning_changes_reach_the_simulation_at_the_next_tick() {
        let (mut session, handle) = session(Role::Authority);
        let patch = TuningPatch {
            walk_speed: Some(3.5),
            ..TuningPatch::default()
        };
        handle.tuning().apply(&patch).unwrap();
        assert_ne!(session.sim().tuning().walk_speed, 3.5);
        session.step();
        assert_eq!(session.sim().tuning().walk_speed, 3.5);
    }

    #[test]
    fn chat_from_the_handle_goes_out_as_an_event() {
        let (mut session, handle) = session(Role::Mirror);
        let (link, mut ends) = PeerLink::channel(LINK_CAPACITY);
        handle.join_tx.try_send(link).unwrap();
        handle.say("hello there".to_string()).unwrap();
        session.step();

        let mut chats = Vec::new();
        while let Ok(msg) = ends.from_session.try_recv() {
            if let NetMsg::Event(event) = msg {
                chats.push(event);
            }
        }
        assert_eq!(chats.len(), 1);
        assert_eq!(session.sim().chat().lines().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_keeps_ticking() {
        let (session, handle) = session(Role::Authority);
        let task = tokio::spawn(session.run());
        tokio::time::sleep(tick_duration() * 10).await;
        assert!(handle.status().tick >= 9);
        task.abort();
    }
}

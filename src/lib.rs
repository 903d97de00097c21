//! Two-peer co-op platformer
//!
//! A deterministic fixed-tick simulation with a host-authoritative sync
//! protocol. The host simulates both players and every enemy and streams
//! snapshots; the guest predicts its own player and applies them.
//!
//! - `game`: tile collision, entity state machines, the simulation and its session loop
//! - `ws`: wire protocol plus the host handler and guest client
//! - `http`: axum routes for health, websocket upgrade and live tuning

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;

//! Time utilities for the fixed-step simulation

use std::time::{Duration, Instant};

/// Peer start time for uptime tracking
static PEER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize peer start time (call once at startup)
pub fn init_peer_time() {
    PEER_START.get_or_init(Instant::now);
}

/// Get peer uptime in seconds
pub fn uptime_secs() -> u64 {
    PEER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 60; // one physics step per tick
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Wall-clock duration of one tick
pub fn tick_duration() -> Duration {
    Duration::from_micros(TICK_DURATION_MICROS)
}

/// Convert whole seconds to a tick count
pub const fn secs_to_ticks(secs: u32) -> u32 {
    secs * SIMULATION_TPS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_seconds_is_180_ticks() {
        assert_eq!(secs_to_ticks(3), 180);
    }

    #[test]
    fn tick_duration_matches_rate() {
        assert_eq!(tick_duration().as_micros() as u64, TICK_DURATION_MICROS);
    }
}

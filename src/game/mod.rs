//! Game simulation modules

pub mod ability;
pub mod camera;
pub mod chat;
pub mod collectible;
pub mod enemy;
pub mod input;
pub mod level;
pub mod physics;
pub mod platform;
pub mod player;
pub mod projectile;
pub mod session;
pub mod sim;
pub mod snapshot;
pub mod sync;
pub mod tuning;
pub mod view;
pub mod world;

pub use level::{LevelSource, MapLevels, TileMap};
pub use session::{LinkEnds, PeerLink, PeerSession, SessionHandle, SessionStatus};
pub use sim::{SimConfig, SimPhase, Simulation};
pub use sync::Role;
pub use tuning::{Tuning, TuningHandle, TuningPatch};

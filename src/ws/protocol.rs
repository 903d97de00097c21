//! Peer-to-peer wire message definitions
//! One JSON text frame carries one `NetMsg`

use serde::{Deserialize, Serialize};

use crate::game::ability::{Ability, Ammo};
use crate::game::collectible::ItemId;
use crate::game::enemy::EnemyId;
use crate::game::input::InputFrame;
use crate::game::player::{HeldEnemy, PlayerId, PlayerState};
use crate::game::world::BlockItem;

/// Messages exchanged between the two peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetMsg {
    /// Sender's local input for a tick (both peers, every tick)
    Input { tick: u64, input: InputFrame },

    /// Full authoritative snapshot (authority, every few ticks)
    State {
        tick: u64,
        players: Vec<PlayerSnapshot>,
        enemies: Vec<EnemySnapshot>,
        stars: Vec<StarSnapshot>,
    },

    /// One-off discrete event
    Event(GameEvent),

    /// Reload both peers at a level (authority)
    Restart { level: usize },
}

impl NetMsg {
    /// Known values of the `type` tag
    pub const KINDS: [&'static str; 4] = ["input", "state", "event", "restart"];

    pub fn kind(&self) -> &'static str {
        match self {
            NetMsg::Input { .. } => "input",
            NetMsg::State { .. } => "state",
            NetMsg::Event(_) => "event",
            NetMsg::Restart { .. } => "restart",
        }
    }
}

/// Player state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    /// Position, rounded to whole pixels
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub facing_right: bool,
    pub state: PlayerState,
    pub hp: u8,
    pub lives: u8,
    pub score: u32,
    pub stars: u32,
    pub ability: Option<Ability>,
    pub ammo: Ammo,
    pub inhaling: bool,
    pub floating: bool,
    pub float_flaps: u8,
    pub held: Option<HeldEnemy>,
}

/// Enemy state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySnapshot {
    pub id: EnemyId,
    /// Kind tag; unknown tags are skipped by the receiver
    #[serde(rename = "type")]
    pub kind: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub dead: bool,
    pub remove: bool,
    pub being_inhaled: bool,
}

/// Star liveness in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarSnapshot {
    pub id: ItemId,
    pub dead: bool,
}

/// Contact side effect carried by a hurt event, for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactEffect {
    Freeze,
    Shock,
}

/// Discrete game events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// Player landed on an enemy
    Stomp { enemy_id: EnemyId, player_id: PlayerId },

    /// Player took a damaging contact
    Hurt {
        player_id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        effect: Option<ContactEffect>,
    },

    /// Brick shattered; the tile becomes air
    BrickBreak { col: i32, row: i32 },

    /// Block hit from below produced an item
    BlockHit {
        col: i32,
        row: i32,
        item: BlockItem,
        /// Id assigned to the ejected star, if one popped out
        #[serde(default, skip_serializing_if = "Option::is_none")]
        star_id: Option<ItemId>,
    },

    /// Level goal reached
    Win,

    /// Every active player is down
    GameOver,

    /// Chat line
    Chat { player_id: PlayerId, text: String },
}

/// Wire decoding errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("message has no type tag")]
    MissingType,

    #[error("unknown message type: {0}")]
    UnknownType(String),
}

/// Parse one text frame
pub fn decode(text: &str) -> Result<NetMsg, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(ProtocolError::MissingType)?;
    if !NetMsg::KINDS.contains(&kind) {
        return Err(ProtocolError::UnknownType(kind.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

/// Serialize one message to a text frame
pub fn encode(msg: &NetMsg) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

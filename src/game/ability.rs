//! Copy abilities and ammo accounting

use serde::{Deserialize, Serialize};

/// Power granted by swallowing an enemy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Sword,
    Fire,
    Ice,
    Water,
    Rock,
    Lightning,
    Ninja,
    Sumo,
    Leaf,
}

/// Uses granted by a dropped ability pickup
pub const PICKUP_AMMO: u8 = 3;

impl Ability {
    /// Ammo granted on swallow
    pub fn starting_ammo(self) -> Ammo {
        match self {
            Ability::Sword | Ability::Rock | Ability::Sumo => Ammo::Unlimited,
            Ability::Fire | Ability::Ice | Ability::Leaf => Ammo::Limited(6),
            Ability::Water | Ability::Ninja => Ammo::Limited(8),
            Ability::Lightning => Ammo::Limited(4),
        }
    }
}

/// Remaining uses of the held ability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ammo {
    Limited(u8),
    Unlimited,
}

impl Ammo {
    pub fn is_empty(self) -> bool {
        self == Ammo::Limited(0)
    }

    /// Spend one use. Returns true once a limited supply runs out.
    pub fn consume(&mut self) -> bool {
        match self {
            Ammo::Unlimited => false,
            Ammo::Limited(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
        }
    }
}

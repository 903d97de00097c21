//! World query surface
//!
//! The simulation reads and mutates the tile grid only through the `World`
//! trait. Solidity is a pure function of the tile id, and the one table of
//! hittable-from-below tiles lives on `TileId::hit_from_below`.

use serde::{Deserialize, Serialize};

use super::enemy::EnemyKind;

/// Tile edge length in pixels
pub const TILE: f32 = 32.0;
/// Base gravity for enemies and items (px/tick²)
pub const GRAVITY: f32 = 0.55;
/// Base terminal fall speed for enemies and items (px/tick)
pub const MAX_FALL: f32 = 14.0;

/// Tile type id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TileId(pub u8);

impl TileId {
    pub const AIR: TileId = TileId(0);
    pub const GROUND: TileId = TileId(1);
    pub const BRICK: TileId = TileId(2);
    pub const STAR_BLOCK: TileId = TileId(3);
    pub const USED_BLOCK: TileId = TileId(4);
    pub const PIPE_TL: TileId = TileId(5);
    pub const PIPE_TR: TileId = TileId(6);
    pub const PIPE_BL: TileId = TileId(7);
    pub const PIPE_BR: TileId = TileId(8);
    pub const CLOUD_L: TileId = TileId(9);
    pub const CLOUD_M: TileId = TileId(10);
    pub const CLOUD_R: TileId = TileId(11);
    pub const SKY: TileId = TileId(12);
    pub const SOLID_INVISIBLE: TileId = TileId(13);
    pub const DRAWN: TileId = TileId(14);
    pub const LAVA: TileId = TileId(15);
    pub const ICE: TileId = TileId(16);
    pub const PLATFORM: TileId = TileId(17);
    pub const SNOW: TileId = TileId(18);
    pub const DARK_BRICK: TileId = TileId(19);
    pub const STAR_TILE: TileId = TileId(20);

    pub fn is_solid(self) -> bool {
        matches!(self.0, 1..=8 | 13 | 14 | 16 | 18 | 19)
    }

    /// Tiles that hurt a player standing on them
    pub fn is_hazard(self) -> bool {
        self == Self::LAVA
    }

    /// What a head-butt from below turns this tile into, and what it yields
    pub fn hit_from_below(self) -> Option<(TileId, BlockItem)> {
        match self {
            Self::STAR_BLOCK => Some((Self::USED_BLOCK, BlockItem::Star)),
            Self::BRICK => Some((Self::AIR, BlockItem::Brick)),
            _ => None,
        }
    }
}

/// Result of hitting a block from below
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockItem {
    /// Star block spent; a star pops out
    Star,
    /// Brick shattered into air
    Brick,
}

/// Grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub col: i32,
    pub row: i32,
}

impl Cell {
    pub fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// Top-left pixel of the cell
    pub fn origin(self) -> (f32, f32) {
        (self.col as f32 * TILE, self.row as f32 * TILE)
    }
}

/// Spawn table entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnKind {
    Enemy(EnemyKind),
    Star,
    Health,
    Platform,
}

/// Spawn table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spawn {
    pub kind: SpawnKind,
    pub col: i32,
    pub row: i32,
}

/// Tile grid and level metadata consumed by the simulation
pub trait World {
    /// Tile at a grid cell. Cells outside the grid are `TileId::AIR`.
    fn get(&self, col: i32, row: i32) -> TileId;

    fn is_solid(&self, col: i32, row: i32) -> bool {
        self.get(col, row).is_solid()
    }

    /// Mutate a hittable tile and report what it produced
    fn hit_block(&mut self, col: i32, row: i32) -> Option<BlockItem>;

    fn width_px(&self) -> f32;
    fn height_px(&self) -> f32;
    fn goal_col(&self) -> i32;
    fn spawns(&self) -> &[Spawn];
    fn p1_spawn(&self) -> Cell;
    fn p2_spawn(&self) -> Cell;

    /// Advance level-local animations by one tick
    fn advance(&mut self) {}
}

/// Grid index containing a pixel coordinate
pub fn cell_of(px: f32) -> i32 {
    (px / TILE).floor() as i32
}

/// Solidity of the tile containing a pixel point
pub fn solid_at(world: &dyn World, x: f32, y: f32) -> bool {
    world.is_solid(cell_of(x), cell_of(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_set_matches_tile_table() {
        let solid: Vec<u8> = (0..=20).filter(|id| TileId(*id).is_solid()).collect();
        assert_eq!(solid, vec![1, 2, 3, 4, 5, 6, 7, 8, 13, 14, 16, 18, 19]);
    }

    #[test]
    fn only_star_block_and_brick_are_hittable() {
        let hittable: Vec<u8> = (0..=20)
            .filter(|id| TileId(*id).hit_from_below().is_some())
            .collect();
        assert_eq!(hittable, vec![2, 3]);
        assert_eq!(
            TileId::STAR_BLOCK.hit_from_below(),
            Some((TileId::USED_BLOCK, BlockItem::Star))
        );
    }

    #[test]
    fn cell_of_floors_negative_coordinates() {
        assert_eq!(cell_of(-0.5), -1);
        assert_eq!(cell_of(31.9), 0);
        assert_eq!(cell_of(32.0), 1);
    }
}

//! ASCII tile maps and the built-in level set

use tracing::debug;

use super::enemy::EnemyKind;
use super::world::{BlockItem, Cell, Spawn, SpawnKind, TileId, World, TILE};

/// Level parsing errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LevelError {
    #[error("level map is empty")]
    Empty,

    #[error("unknown tile '{ch}' at col {col}, row {row}")]
    UnknownTile { ch: char, col: usize, row: usize },

    #[error("level has no {0} marker")]
    MissingMarker(&'static str),

    #[error("level set is empty")]
    NoLevels,
}

/// Tile grid parsed from an ASCII map
#[derive(Debug, Clone)]
pub struct TileMap {
    name: String,
    cols: usize,
    rows: usize,
    tiles: Vec<TileId>,
    goal_col: i32,
    spawns: Vec<Spawn>,
    p1_spawn: Cell,
    p2_spawn: Cell,
    anim_ticks: u32,
}

fn tile_for(ch: char) -> Option<TileId> {
    let tile = match ch {
        '.' | ' ' => TileId::AIR,
        '#' => TileId::GROUND,
        'B' => TileId::BRICK,
        '?' => TileId::STAR_BLOCK,
        'U' => TileId::USED_BLOCK,
        '[' => TileId::PIPE_TL,
        ']' => TileId::PIPE_TR,
        '{' => TileId::PIPE_BL,
        '}' => TileId::PIPE_BR,
        '(' => TileId::CLOUD_L,
        '-' => TileId::CLOUD_M,
        ')' => TileId::CLOUD_R,
        ':' => TileId::SKY,
        'X' => TileId::SOLID_INVISIBLE,
        'Z' => TileId::DRAWN,
        '~' => TileId::LAVA,
        '=' => TileId::ICE,
        '_' => TileId::PLATFORM,
        '*' => TileId::SNOW,
        'K' => TileId::DARK_BRICK,
        's' => TileId::STAR_TILE,
        _ => return None,
    };
    Some(tile)
}

fn spawn_for(ch: char) -> Option<SpawnKind> {
    let kind = match ch {
        'c' => SpawnKind::Star,
        'h' => SpawnKind::Health,
        'P' => SpawnKind::Platform,
        other => SpawnKind::Enemy(EnemyKind::from_spawn_char(other)?),
    };
    Some(kind)
}

impl TileMap {
    /// Parse a map. Rows shorter than the widest row are padded with air.
    ///
    /// Markers: `1`/`2` player spawns, `G` goal column. Spawn characters
    /// leave air behind in the grid.
    pub fn parse(name: &str, ascii: &str) -> Result<Self, LevelError> {
        let lines: Vec<&str> = ascii
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return Err(LevelError::Empty);
        }
        let rows = lines.len();
        let cols = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);

        let mut tiles = vec![TileId::AIR; rows * cols];
        let mut spawns = Vec::new();
        let mut p1 = None;
        let mut p2 = None;
        let mut goal = None;

        for (row, line) in lines.iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                let at = Cell::new(col as i32, row as i32);
                match ch {
                    '1' => p1 = Some(at),
                    '2' => p2 = Some(at),
                    'G' => goal = Some(col as i32),
                    _ => {
                        if let Some(tile) = tile_for(ch) {
                            tiles[row * cols + col] = tile;
                        } else if let Some(kind) = spawn_for(ch) {
                            spawns.push(Spawn {
                                kind,
                                col: col as i32,
                                row: row as i32,
                            });
                        } else {
                            return Err(LevelError::UnknownTile { ch, col, row });
                        }
                    }
                }
            }
        }

        let p1_spawn = p1.ok_or(LevelError::MissingMarker("player 1 spawn"))?;
        let p2_spawn = p2.ok_or(LevelError::MissingMarker("player 2 spawn"))?;
        let goal_col = goal.ok_or(LevelError::MissingMarker("goal"))?;

        Ok(Self {
            name: name.to_string(),
            cols,
            rows,
            tiles,
            goal_col,
            spawns,
            p1_spawn,
            p2_spawn,
            anim_ticks: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Animation frame for shimmering tiles (lava, star tiles)
    pub fn anim_frame(&self) -> u32 {
        (self.anim_ticks / 8) % 4
    }

    fn index(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || row < 0 || col as usize >= self.cols || row as usize >= self.rows {
            return None;
        }
        Some(row as usize * self.cols + col as usize)
    }
}

impl World for TileMap {
    fn get(&self, col: i32, row: i32) -> TileId {
        self.index(col, row)
            .map(|i| self.tiles[i])
            .unwrap_or(TileId::AIR)
    }

    fn hit_block(&mut self, col: i32, row: i32) -> Option<BlockItem> {
        let i = self.index(col, row)?;
        let (replacement, item) = self.tiles[i].hit_from_below()?;
        self.tiles[i] = replacement;
        debug!(col, row, ?item, "Block hit");
        Some(item)
    }

    fn width_px(&self) -> f32 {
        self.cols as f32 * TILE
    }

    fn height_px(&self) -> f32 {
        self.rows as f32 * TILE
    }

    fn goal_col(&self) -> i32 {
        self.goal_col
    }

    fn spawns(&self) -> &[Spawn] {
        &self.spawns
    }

    fn p1_spawn(&self) -> Cell {
        self.p1_spawn
    }

    fn p2_spawn(&self) -> Cell {
        self.p2_spawn
    }

    fn advance(&mut self) {
        self.anim_ticks = self.anim_ticks.wrapping_add(1);
    }
}

/// Indexed set of levels the simulation loads from
pub trait LevelSource {
    /// Number of levels; always at least one
    fn count(&self) -> usize;

    /// Fresh copy of a level. Indices wrap around the set.
    fn load(&self, index: usize) -> Box<dyn World + Send>;
}

/// Level set backed by parsed tile maps
#[derive(Debug, Clone)]
pub struct MapLevels {
    maps: Vec<TileMap>,
}

impl MapLevels {
    pub fn new(maps: Vec<TileMap>) -> Result<Self, LevelError> {
        if maps.is_empty() {
            return Err(LevelError::NoLevels);
        }
        Ok(Self { maps })
    }

    /// The two levels shipped with the binary
    pub fn builtin() -> Result<Self, LevelError> {
        Self::new(vec![
            TileMap::parse("green greens", GREEN_GREENS)?,
            TileMap::parse("ice cavern", ICE_CAVERN)?,
        ])
    }
}

impl LevelSource for MapLevels {
    fn count(&self) -> usize {
        self.maps.len()
    }

    fn load(&self, index: usize) -> Box<dyn World + Send> {
        Box::new(self.maps[index % self.maps.len()].clone())
    }
}

const GREEN_GREENS: &str = "
..............................................................................................
..............................................................................................
......(-)...........................(--)..............................(-).....................
..............................................................................................
..............................................................................................
..........................c.c.c...............................................................
.........................BBBBBBB...........?B?B...............................................
..............................................................................................
...........?.....................................................c...c......................
..................................w.............f..........P..................................
.....................[]...........................................######......e.......G.......
..1.2......e.........{}..........................................#######.............u........
.........................................h......................########......................
#########################...#############################.....###########################~~###
#########################...#############################.....###########################~~###
";

const ICE_CAVERN: &str = "
KKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKKK
K............................................................................................K
K............................................................................................K
K..............c.c.c.......................s.........................s.......................K
K.............?BB?BB?...............................................................h........K
K............................................................................................K
K...............................i...............=====.........l.............................K
K..........................................................n.....................c.c.c.....K
K.........................=======....................P.............................G.......K
K.....................a..........................................................r...........K
K...........==..................................***.................****.....................K
K.1.2......====.......................u.......******...............******.........e..........K
K..........====................r.............********.............********...................K
=================...===========================================....==============~~~~=========
=================...===========================================....==============~~~~=========
";

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "
........G
.1.2.w.c.
?B.......
#########
";

    #[test]
    fn builtin_levels_parse() {
        let levels = MapLevels::builtin().unwrap();
        assert_eq!(levels.count(), 2);
        for i in 0..levels.count() {
            let world = levels.load(i);
            assert!(world.goal_col() > 0);
            assert!(world.width_px() > 0.0);
            assert!(!world.spawns().is_empty());
        }
    }

    #[test]
    fn markers_and_spawns_leave_air() {
        let map = TileMap::parse("small", SMALL).unwrap();
        assert_eq!(map.p1_spawn(), Cell::new(1, 1));
        assert_eq!(map.p2_spawn(), Cell::new(3, 1));
        assert_eq!(map.goal_col(), 8);
        assert_eq!(map.get(5, 1), TileId::AIR);
        assert_eq!(
            map.spawns(),
            &[
                Spawn {
                    kind: SpawnKind::Enemy(EnemyKind::SwordKnight),
                    col: 5,
                    row: 1
                },
                Spawn {
                    kind: SpawnKind::Star,
                    col: 7,
                    row: 1
                },
            ]
        );
    }

    #[test]
    fn out_of_grid_is_air() {
        let map = TileMap::parse("small", SMALL).unwrap();
        assert_eq!(map.get(-1, 3), TileId::AIR);
        assert_eq!(map.get(0, 99), TileId::AIR);
        assert!(!map.is_solid(100, 3));
    }

    #[test]
    fn hit_block_mutates_once() {
        let mut map = TileMap::parse("small", SMALL).unwrap();
        assert_eq!(map.hit_block(0, 2), Some(BlockItem::Star));
        assert_eq!(map.get(0, 2), TileId::USED_BLOCK);
        assert_eq!(map.hit_block(0, 2), None);
        assert_eq!(map.hit_block(1, 2), Some(BlockItem::Brick));
        assert_eq!(map.get(1, 2), TileId::AIR);
        assert_eq!(map.hit_block(-3, -3), None);
    }

    #[test]
    fn unknown_character_is_rejected() {
        let err = TileMap::parse("bad", "1.2.G\n#$###").unwrap_err();
        assert_eq!(
            err,
            LevelError::UnknownTile {
                ch: '$',
                col: 1,
                row: 1
            }
        );
    }

    #[test]
    fn shimmer_frame_cycles_with_advance() {
        let mut map = TileMap::parse("small", SMALL).unwrap();
        assert_eq!(map.anim_frame(), 0);
        for _ in 0..8 {
            map.advance();
        }
        assert_eq!(map.anim_frame(), 1);
        for _ in 0..24 {
            map.advance();
        }
        assert_eq!(map.anim_frame(), 0);
    }

    #[test]
    fn missing_goal_is_rejected() {
        let err = TileMap::parse("bad", "1.2\n###").unwrap_err();
        assert_eq!(err, LevelError::MissingMarker("goal"));
    }
}

//! Camera framing over the active players

use serde::Serialize;

use super::physics::Body;

pub const VIEW_W: f32 = 832.0;
pub const VIEW_H: f32 = 480.0;
const FOLLOW: f32 = 0.12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    level_w: f32,
    level_h: f32,
}

impl Camera {
    pub fn new(level_w: f32, level_h: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            level_w,
            level_h,
        }
    }

    fn clamped(&self, x: f32, y: f32) -> (f32, f32) {
        let max_x = (self.level_w - VIEW_W).max(0.0);
        let max_y = (self.level_h - VIEW_H).max(0.0);
        (x.clamp(0.0, max_x), y.clamp(0.0, max_y))
    }

    /// Ease toward the midpoint of the given bodies
    pub fn follow<'a>(&mut self, bodies: impl IntoIterator<Item = &'a Body>) {
        let (mut sx, mut sy, mut n) = (0.0, 0.0, 0.0);
        for b in bodies {
            sx += b.center_x();
            sy += b.center_y();
            n += 1.0;
        }
        if n == 0.0 {
            return;
        }
        let (tx, ty) = self.clamped(sx / n - VIEW_W / 2.0, sy / n - VIEW_H / 2.0);
        let (x, y) = self.clamped(
            self.x + (tx - self.x) * FOLLOW,
            self.y + (ty - self.y) * FOLLOW,
        );
        self.x = x;
        self.y = y;
    }
}

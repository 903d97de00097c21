//! Moving platforms

use super::physics::Body;
use super::world::TILE;

const WIDTH: f32 = 72.0;
const HEIGHT: f32 = 14.0;
const TRAVEL: f32 = 96.0;
const SPEED: f32 = 1.4;
/// Foot window around the platform top that counts as standing on it
const CARRY_ABOVE: f32 = 4.0;
const CARRY_BELOW: f32 = 8.0;

/// Platform shuttling horizontally between two bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Platform {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    start_x: f32,
    end_x: f32,
    dir: f32,
}

impl Platform {
    /// Platform for a spawn cell, travelling ±96 px inside the level
    pub fn at_cell(col: i32, row: i32, level_width: f32) -> Self {
        let x = col as f32 * TILE;
        let y = (row - 1) as f32 * TILE;
        Self {
            x,
            y,
            w: WIDTH,
            h: HEIGHT,
            start_x: (x - TRAVEL).max(0.0),
            end_x: (level_width - WIDTH).min(x + TRAVEL),
            dir: 1.0,
        }
    }

    /// Horizontal displacement applied this tick
    pub fn step(&self) -> f32 {
        SPEED * self.dir
    }

    pub fn advance(&mut self) {
        self.x += self.step();
        if self.x >= self.end_x || self.x <= self.start_x {
            self.dir = -self.dir;
        }
    }

    /// Land a body standing on the platform and move it along.
    /// Returns true if the body was carried.
    pub fn carry(&self, body: &mut Body) -> bool {
        let feet = body.bottom();
        let within_x = body.x + body.w > self.x && body.x < self.x + self.w;
        let within_y = feet >= self.y - CARRY_ABOVE && feet <= self.y + CARRY_BELOW;
        if !(within_x && within_y && body.vy >= 0.0) {
            return false;
        }
        body.y = self.y - body.h;
        body.vy = 0.0;
        body.x += self.step();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_reverses_at_travel_bounds() {
        let mut plat = Platform::at_cell(10, 5, 2000.0);
        let start = plat.x;
        let mut max_x = start;
        for _ in 0..300 {
            plat.advance();
            max_x = max_x.max(plat.x);
        }
        assert!(max_x <= start + TRAVEL + SPEED);
        assert!(plat.x >= start - TRAVEL - SPEED);
    }

    #[test]
    fn travel_is_clamped_to_level() {
        let plat = Platform::at_cell(1, 5, 200.0);
        assert_eq!(plat.start_x, 0.0);
        assert_eq!(plat.end_x, 200.0 - WIDTH);
    }

    #[test]
    fn falling_body_is_carried() {
        let plat = Platform::at_cell(10, 5, 2000.0);
        let mut body = Body::new(plat.x + 10.0, plat.y - 22.0, 24.0, 24.0);
        body.vy = 1.0;
        assert!(plat.carry(&mut body));
        assert_eq!(body.bottom(), plat.y);
        assert_eq!(body.vy, 0.0);

        let mut rising = Body::new(plat.x + 10.0, plat.y - 22.0, 24.0, 24.0);
        rising.vy = -3.0;
        assert!(!plat.carry(&mut rising));
    }
}

//! The play field geometry shared by hazards, projectiles and ships.

/// Width of the play field in world units.
pub const ARENA_WIDTH: f32 = 1920.0;
/// Height of the play field in world units.
pub const ARENA_HEIGHT: f32 = 1080.0;

/// A heading of 0 points up, positive angles turn clockwise.
pub fn step(x: f32, y: f32, angle: f32, distance: f32) -> (f32, f32) {
    (x + distance * angle.sin(), y - distance * angle.cos())
}

/// Objects leaving on one side come back on the opposite one.
pub fn wrap(x: f32, y: f32) -> (f32, f32) {
    let x = if x > ARENA_WIDTH {
        0.0
    } else if x < 0.0 {
        ARENA_WIDTH
    } else {
        x
    };
    let y = if y > ARENA_HEIGHT {
        0.0
    } else if y < 0.0 {
        ARENA_HEIGHT
    } else {
        y
    };
    (x, y)
}

pub fn distance(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    (bx - ax).hypot(by - ay)
}

pub fn centre() -> (f32, f32) {
    (ARENA_WIDTH / 2.0, ARENA_HEIGHT / 2.0)
}

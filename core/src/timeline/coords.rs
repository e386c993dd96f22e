//! Game units to renderer space

use std::f64::consts::FRAC_PI_2;

/// Game-unit x of the map origin
pub const MAP_CENTER_X: f64 = 5235.0;
/// Game-unit y of the map origin
pub const MAP_CENTER_Y: f64 = 5410.0;
/// Game units per world unit
pub const WORLD_SCALE: f64 = 1000.0;
/// Raw facing units per radian
pub const FACING_SCALE: f64 = 100.0;

/// Game `(x, y)` to world `[x, 0, z]`, centred on the map origin.
pub fn to_world(x: f64, y: f64) -> [f64; 3] {
    [
        (x - MAP_CENTER_X) / WORLD_SCALE,
        0.0,
        (y - MAP_CENTER_Y) / WORLD_SCALE,
    ]
}

/// Raw facing to radians in the game frame
pub fn facing_radians(raw: f64) -> f64 {
    raw / FACING_SCALE
}

/// Game-frame radians to the renderer's frame (rotated a quarter turn)
pub fn to_render_facing(radians: f64) -> f64 {
    radians + FRAC_PI_2
}

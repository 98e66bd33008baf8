use types::Float;
pub extern crate nalgebra as na;

pub mod camera;
pub mod config;
pub mod control;
pub mod engine;
pub mod export;
pub mod plot;
pub mod setup;
pub mod types;
pub mod util;

pub const GRAVITY: Float = 9.8;

pub const PI: Float = std::f32::consts::PI;
pub const TWO_PI: Float = 2.0 * PI;

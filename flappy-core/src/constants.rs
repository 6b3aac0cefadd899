//! Reference tuning for the simulation. Every value here is the default of the
//! matching [`SimConfig`](crate::config::SimConfig) field.

// Visible area
pub const SCREEN_WIDTH: i32 = 500;
pub const SCREEN_HEIGHT: i32 = 800;
pub const GROUND_Y: f64 = 730.0;
pub const CEILING_Y: f64 = -50.0;

pub const TICK_RATE_HZ: u32 = 30;

// Bird
pub const BIRD_SPAWN_X: f64 = 230.0;
pub const BIRD_SPAWN_Y: f64 = 350.0;
pub const BIRD_WIDTH: u32 = 68;
pub const BIRD_HEIGHT: u32 = 48;
pub const JUMP_VELOCITY: f64 = -10.5;
pub const GRAVITY_COEFF: f64 = 1.5;
pub const TERMINAL_DISPLACEMENT: f64 = 16.0;
pub const ASCENT_BOOST: f64 = 2.0;
pub const MAX_TILT: f64 = 25.0;
pub const MIN_TILT: f64 = -90.0;
pub const TILT_RATE: f64 = 20.0;
pub const TILT_HOLD_DISTANCE: f64 = 50.0;
pub const ANIMATION_TICKS: u32 = 5;
pub const NOSEDIVE_TILT: f64 = -80.0;

// Pipes
pub const PIPE_WIDTH: u32 = 104;
pub const PIPE_HEIGHT: u32 = 640;
pub const PIPE_CAP_HEIGHT: u32 = 48;
pub const PIPE_BODY_INSET: u32 = 4;
pub const GAP_SIZE: f64 = 200.0;
pub const GAP_TOP_MIN: i32 = 50;
pub const GAP_TOP_MAX: i32 = 450; // exclusive
pub const FIRST_PIPE_X: f64 = 700.0;
pub const PIPE_SPAWN_X: f64 = 600.0;

// World scroll (pipes and ground share it)
pub const SCROLL_VELOCITY: f64 = 5.0;
pub const GROUND_WIDTH: f64 = 672.0;

// Fitness shaping
pub const SURVIVAL_REWARD: f64 = 0.1;
pub const COLLISION_PENALTY: f64 = 1.0;
pub const PASS_REWARD: f64 = 5.0;
pub const JUMP_THRESHOLD: f64 = 0.5;

// Replay tapes
pub const TAPE_MAGIC: u32 = 0x3150_4C46; // "FLP1" little-endian
pub const TAPE_VERSION: u8 = 1;
pub const RULES_TAG: u8 = 1;
pub const TAPE_HEADER_SIZE: usize = 16;
pub const TAPE_FOOTER_SIZE: usize = 12;
pub const MAX_TICKS_DEFAULT: u32 = 108_000; // one hour at 30 Hz

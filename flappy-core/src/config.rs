use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;

/// Tuning supplied when a world is built. Missing fields in a serialized
/// config fall back to the reference values in [`crate::constants`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub screen_width: i32,
    pub screen_height: i32,
    pub ground_y: f64,
    pub ceiling_y: f64,
    pub tick_rate_hz: u32,

    pub bird_spawn_x: f64,
    pub bird_spawn_y: f64,
    pub bird_width: u32,
    pub bird_height: u32,
    pub jump_velocity: f64,
    pub gravity_coeff: f64,
    pub terminal_displacement: f64,
    pub ascent_boost: f64,
    pub max_tilt: f64,
    pub min_tilt: f64,
    pub tilt_rate: f64,
    pub tilt_hold_distance: f64,
    pub animation_ticks: u32,
    pub nosedive_tilt: f64,

    pub pipe_width: u32,
    pub pipe_height: u32,
    pub pipe_cap_height: u32,
    pub pipe_body_inset: u32,
    pub gap_size: f64,
    pub gap_top_min: i32,
    pub gap_top_max: i32,
    pub first_pipe_x: f64,
    pub pipe_spawn_x: f64,

    pub scroll_velocity: f64,
    pub ground_width: f64,

    pub survival_reward: f64,
    pub collision_penalty: f64,
    pub pass_reward: f64,
    pub jump_threshold: f64,

    /// End the generation once the shared score reaches this value.
    pub max_score: Option<u32>,
    /// End the generation after this many ticks.
    pub max_ticks: Option<u32>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            screen_width: SCREEN_WIDTH,
            screen_height: SCREEN_HEIGHT,
            ground_y: GROUND_Y,
            ceiling_y: CEILING_Y,
            tick_rate_hz: TICK_RATE_HZ,
            bird_spawn_x: BIRD_SPAWN_X,
            bird_spawn_y: BIRD_SPAWN_Y,
            bird_width: BIRD_WIDTH,
            bird_height: BIRD_HEIGHT,
            jump_velocity: JUMP_VELOCITY,
            gravity_coeff: GRAVITY_COEFF,
            terminal_displacement: TERMINAL_DISPLACEMENT,
            ascent_boost: ASCENT_BOOST,
            max_tilt: MAX_TILT,
            min_tilt: MIN_TILT,
            tilt_rate: TILT_RATE,
            tilt_hold_distance: TILT_HOLD_DISTANCE,
            animation_ticks: ANIMATION_TICKS,
            nosedive_tilt: NOSEDIVE_TILT,
            pipe_width: PIPE_WIDTH,
            pipe_height: PIPE_HEIGHT,
            pipe_cap_height: PIPE_CAP_HEIGHT,
            pipe_body_inset: PIPE_BODY_INSET,
            gap_size: GAP_SIZE,
            gap_top_min: GAP_TOP_MIN,
            gap_top_max: GAP_TOP_MAX,
            first_pipe_x: FIRST_PIPE_X,
            pipe_spawn_x: PIPE_SPAWN_X,
            scroll_velocity: SCROLL_VELOCITY,
            ground_width: GROUND_WIDTH,
            survival_reward: SURVIVAL_REWARD,
            collision_penalty: COLLISION_PENALTY,
            pass_reward: PASS_REWARD,
            jump_threshold: JUMP_THRESHOLD,
            max_score: None,
            max_ticks: None,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("screen_width", self.screen_width as f64),
            ("screen_height", self.screen_height as f64),
            ("tick_rate_hz", self.tick_rate_hz as f64),
            ("bird_width", self.bird_width as f64),
            ("bird_height", self.bird_height as f64),
            ("terminal_displacement", self.terminal_displacement),
            ("tilt_rate", self.tilt_rate),
            ("animation_ticks", self.animation_ticks as f64),
            ("pipe_width", self.pipe_width as f64),
            ("pipe_height", self.pipe_height as f64),
            ("gap_size", self.gap_size),
            ("scroll_velocity", self.scroll_velocity),
            ("ground_width", self.ground_width),
        ];
        for (field, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }

        if self.gap_top_min >= self.gap_top_max {
            return Err(ConfigError::EmptyGapRange {
                min: self.gap_top_min,
                max: self.gap_top_max,
            });
        }
        let lowest_gap_bottom = (self.gap_top_max - 1) as f64 + self.gap_size;
        if lowest_gap_bottom >= self.ground_y {
            return Err(ConfigError::GapBelowGround {
                gap_bottom: lowest_gap_bottom,
                ground_y: self.ground_y,
            });
        }
        if self.min_tilt > self.max_tilt {
            return Err(ConfigError::TiltBounds {
                min: self.min_tilt,
                max: self.max_tilt,
            });
        }

        for (field, x) in [
            ("first_pipe_x", self.first_pipe_x),
            ("pipe_spawn_x", self.pipe_spawn_x),
        ] {
            if x < self.screen_width as f64 {
                return Err(ConfigError::SpawnNotOffscreen {
                    field,
                    x,
                    screen_width: self.screen_width,
                });
            }
        }

        Ok(())
    }

    /// Seconds of simulated time covered by `ticks`.
    pub fn ticks_to_seconds(&self, ticks: u32) -> f64 {
        ticks as f64 / self.tick_rate_hz as f64
    }
}

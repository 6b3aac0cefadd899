use crate::config::SimConfig;
use crate::sprite::{Silhouette, SpriteAtlas, WingFrame};

/// Kinematic and visual state of one flying agent. The world scrolls past the
/// bird, so `x` never changes after spawn.
#[derive(Clone, Debug, PartialEq)]
pub struct Bird {
    x: f64,
    y: f64,
    velocity: f64,
    ticks_since_jump: u32,
    launch_height: f64,
    tilt: f64,
    frame: WingFrame,
    frame_ticks: u32,
    last_displacement: f64,
}

impl Bird {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            velocity: 0.0,
            ticks_since_jump: 0,
            launch_height: y,
            tilt: 0.0,
            frame: WingFrame::Up,
            frame_ticks: 0,
            last_displacement: 0.0,
        }
    }

    pub fn spawn(config: &SimConfig) -> Self {
        Self::new(config.bird_spawn_x, config.bird_spawn_y)
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }

    #[inline]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    #[inline]
    pub fn ticks_since_jump(&self) -> u32 {
        self.ticks_since_jump
    }

    #[inline]
    pub fn launch_height(&self) -> f64 {
        self.launch_height
    }

    #[inline]
    pub fn tilt(&self) -> f64 {
        self.tilt
    }

    #[inline]
    pub fn frame(&self) -> WingFrame {
        self.frame
    }

    /// Vertical displacement applied by the most recent `advance()`.
    #[inline]
    pub fn last_displacement(&self) -> f64 {
        self.last_displacement
    }

    /// One tick of fall/ascent along `d = v·t + g·t²`, followed by the tilt
    /// and wing animation updates.
    pub fn advance(&mut self, config: &SimConfig) {
        self.ticks_since_jump += 1;
        let t = self.ticks_since_jump as f64;

        let mut displacement = self.velocity * t + config.gravity_coeff * t * t;
        if displacement >= config.terminal_displacement {
            displacement = config.terminal_displacement;
        }
        if displacement < 0.0 {
            displacement -= config.ascent_boost;
        }

        self.y += displacement;
        self.last_displacement = displacement;

        if displacement < 0.0 || self.y < self.launch_height + config.tilt_hold_distance {
            if self.tilt < config.max_tilt {
                self.tilt = config.max_tilt;
            }
        } else if self.tilt > config.min_tilt {
            self.tilt = (self.tilt - config.tilt_rate).max(config.min_tilt);
        }

        self.animate(config);
    }

    pub fn jump(&mut self, config: &SimConfig) {
        self.velocity = config.jump_velocity;
        self.ticks_since_jump = 0;
        self.launch_height = self.y;
    }

    /// Collision silhouette for the current wing frame and tilt.
    pub fn silhouette<'a>(&self, atlas: &'a mut SpriteAtlas) -> &'a Silhouette {
        atlas.bird_silhouette(self.frame, self.tilt)
    }

    /// Wing cycle Up, Mid, Down, Mid, Up with `animation_ticks` per step.
    /// A steep dive freezes the wings on Mid.
    fn animate(&mut self, config: &SimConfig) {
        let step = config.animation_ticks;
        self.frame_ticks += 1;

        if self.frame_ticks < step {
            self.frame = WingFrame::Up;
        } else if self.frame_ticks < step * 2 {
            self.frame = WingFrame::Mid;
        } else if self.frame_ticks < step * 3 {
            self.frame = WingFrame::Down;
        } else if self.frame_ticks < step * 4 {
            self.frame = WingFrame::Mid;
        } else if self.frame_ticks > step * 4 {
            self.frame = WingFrame::Up;
            self.frame_ticks = 0;
        }

        if self.tilt <= config.nosedive_tilt {
            self.frame = WingFrame::Mid;
            self.frame_ticks = step * 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimConfig {
        SimConfig::default()
    }

    #[test]
    fn free_fall_follows_the_quadratic_until_terminal_speed() {
        let config = config();
        let mut bird = Bird::new(230.0, 350.0);

        let expected = [1.5, 6.0, 13.5, 16.0, 16.0, 16.0];
        let mut y = 350.0;
        for step in expected {
            bird.advance(&config);
            y += step;
            assert_eq!(bird.y(), y);
            assert_eq!(bird.last_displacement(), step);
        }
        assert_eq!(bird.ticks_since_jump(), 6);
    }

    #[test]
    fn jump_arc_rises_with_boost_then_falls() {
        let config = config();
        let mut bird = Bird::new(230.0, 350.0);
        bird.jump(&config);
        assert_eq!(bird.velocity(), -10.5);
        assert_eq!(bird.ticks_since_jump(), 0);
        assert_eq!(bird.launch_height(), 350.0);

        bird.advance(&config);
        // -10.5 + 1.5 = -9, then the ascent boost.
        assert_eq!(bird.y(), 350.0 - 11.0);
        assert_eq!(bird.tilt(), 25.0);

        let mut apex = bird.y();
        for _ in 0..20 {
            bird.advance(&config);
            apex = apex.min(bird.y());
        }
        assert!(apex < 350.0);
        assert!(bird.y() > apex);
    }

    #[test]
    fn displacement_never_exceeds_terminal_from_any_state() {
        let config = config();
        for jump_every in [0u32, 3, 7, 11, 19] {
            let mut bird = Bird::new(230.0, 350.0);
            for tick in 1..=400u32 {
                let before = bird.y();
                bird.advance(&config);
                assert!(bird.y() - before <= config.terminal_displacement);
                if jump_every > 0 && tick % jump_every == 0 {
                    bird.jump(&config);
                }
            }
        }
    }

    #[test]
    fn tilt_stays_in_bounds_for_mixed_inputs() {
        let config = config();
        let mut bird = Bird::new(230.0, 350.0);
        let pattern = [false, false, true, false, false, false, false, false, false, false];
        for tick in 0..2_000usize {
            if pattern[(tick * 7 + tick / 13) % pattern.len()] {
                bird.jump(&config);
            }
            bird.advance(&config);
            assert!(
                (config.min_tilt..=config.max_tilt).contains(&bird.tilt()),
                "tilt {} out of range at tick {tick}",
                bird.tilt()
            );
        }
    }

    #[test]
    fn tilt_decays_to_min_without_overshoot() {
        let config = config();
        let mut bird = Bird::new(230.0, 100.0);
        // Drop well past the hold distance, then keep falling.
        for _ in 0..30 {
            bird.advance(&config);
        }
        assert_eq!(bird.tilt(), -90.0);
        assert_eq!(bird.frame(), WingFrame::Mid);
    }

    #[test]
    fn tilt_holds_while_near_launch_height() {
        let config = config();
        let mut bird = Bird::new(230.0, 350.0);
        bird.advance(&config);
        bird.advance(&config);
        // Fell 7.5 px: still inside the hold band.
        assert_eq!(bird.tilt(), 25.0);
    }

    #[test]
    fn silhouette_tracks_frame_and_tilt() {
        let config = config();
        let mut atlas = SpriteAtlas::new(&config);
        let mut bird = Bird::new(230.0, 100.0);
        let level = bird.silhouette(&mut atlas).clone();
        assert_eq!(&level.mask, atlas.bird_frame(WingFrame::Up));

        for _ in 0..30 {
            bird.advance(&config);
        }
        let diving = bird.silhouette(&mut atlas);
        assert_eq!(diving.mask.width(), config.bird_height);
        assert_eq!(diving.mask.height(), config.bird_width);
    }

    #[test]
    fn wing_cycle_matches_animation_schedule() {
        let config = config();
        let mut bird = Bird::new(230.0, 350.0);
        let mut frames = Vec::new();
        for _ in 0..22 {
            // Keep the nose up so the dive freeze never kicks in.
            bird.jump(&config);
            bird.advance(&config);
            frames.push(bird.frame());
        }

        use WingFrame::{Down, Mid, Up};
        let expected = [
            Up, Up, Up, Up, // 1..=4
            Mid, Mid, Mid, Mid, Mid, // 5..=9
            Down, Down, Down, Down, Down, // 10..=14
            Mid, Mid, Mid, Mid, Mid, // 15..=19
            Mid, // 20 keeps the previous frame
            Up,  // 21 wraps
            Up,  // counter restarted at 1
        ];
        assert_eq!(frames, expected);
    }
}

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;

/// Two ground tiles laid end to end. Whichever tile leaves the screen on the
/// left is moved behind the other one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ground {
    x1: f64,
    x2: f64,
    width: f64,
}

impl Ground {
    pub fn new(width: f64) -> Self {
        Self {
            x1: 0.0,
            x2: width,
            width,
        }
    }

    pub fn x1(&self) -> f64 {
        self.x1
    }

    pub fn x2(&self) -> f64 {
        self.x2
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn advance(&mut self, config: &SimConfig) {
        self.x1 -= config.scroll_velocity;
        self.x2 -= config.scroll_velocity;

        if self.x1 + self.width < 0.0 {
            self.x1 = self.x2 + self.width;
        }
        if self.x2 + self.width < 0.0 {
            self.x2 = self.x1 + self.width;
        }
    }
}

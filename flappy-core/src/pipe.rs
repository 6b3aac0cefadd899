use crate::bird::Bird;
use crate::config::SimConfig;
use crate::rng::SeededRng;
use crate::sprite::SpriteAtlas;

/// An upper/lower barrier pair scrolling leftwards with a fixed-size gap.
#[derive(Clone, Debug, PartialEq)]
pub struct Pipe {
    x: f64,
    gap_top: f64,
    gap_size: f64,
    width: f64,
    height: f64,
    passed: bool,
}

impl Pipe {
    /// New pipe at `x` with the gap top drawn uniformly from the configured
    /// range, which keeps the gap away from the screen edges.
    pub fn spawn(x: f64, config: &SimConfig, rng: &mut SeededRng) -> Self {
        let gap_top = rng.next_range(config.gap_top_min, config.gap_top_max) as f64;
        Self::with_gap(x, gap_top, config)
    }

    pub fn with_gap(x: f64, gap_top: f64, config: &SimConfig) -> Self {
        Self {
            x,
            gap_top,
            gap_size: config.gap_size,
            width: config.pipe_width as f64,
            height: config.pipe_height as f64,
            passed: false,
        }
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn right_edge(&self) -> f64 {
        self.x + self.width
    }

    /// Lowest y of the upper barrier.
    #[inline]
    pub fn gap_top(&self) -> f64 {
        self.gap_top
    }

    /// Highest y of the lower barrier.
    #[inline]
    pub fn gap_bottom(&self) -> f64 {
        self.gap_top + self.gap_size
    }

    /// Top edge of the upper barrier sprite (usually above the screen).
    #[inline]
    pub fn top_barrier_y(&self) -> f64 {
        self.gap_top - self.height
    }

    #[inline]
    pub fn passed(&self) -> bool {
        self.passed
    }

    pub(crate) fn mark_passed(&mut self) {
        self.passed = true;
    }

    pub fn advance(&mut self, config: &SimConfig) {
        self.x -= config.scroll_velocity;
    }

    pub fn is_off_screen(&self) -> bool {
        self.right_edge() < 0.0
    }

    /// Pixel-exact test of the bird's current silhouette against both
    /// barriers.
    pub fn overlaps(&self, bird: &Bird, atlas: &mut SpriteAtlas) -> bool {
        let (silhouette, top_mask, bottom_mask) =
            atlas.collision_shapes(bird.frame(), bird.tilt());
        let bird_x = bird.x().round() as i32 + silhouette.offset_x;
        let bird_y = bird.y().round() as i32 + silhouette.offset_y;

        let dx = self.x.round() as i32 - bird_x;
        let top_dy = self.top_barrier_y().round() as i32 - bird_y;
        let bottom_dy = self.gap_bottom().round() as i32 - bird_y;

        silhouette.mask.overlaps(top_mask, dx, top_dy)
            || silhouette.mask.overlaps(bottom_mask, dx, bottom_dy)
    }
}

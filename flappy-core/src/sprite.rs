//! Procedural silhouettes for the bird frames and pipe barriers.
//!
//! Collision only needs the opaque shape of each sprite, so the shapes are
//! generated from a few ellipses and rectangles scaled to the configured
//! sprite size instead of being read from image files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::mask::Mask;

/// Wing position of the bird sprite. The cycle is Up, Mid, Down, Mid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WingFrame {
    Up,
    Mid,
    Down,
}

impl WingFrame {
    #[inline]
    fn index(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Mid => 1,
            Self::Down => 2,
        }
    }

    fn wing_center_y(self) -> f64 {
        match self {
            Self::Up => 0.30,
            Self::Mid => 0.52,
            Self::Down => 0.74,
        }
    }
}

/// A mask plus where its top-left corner sits relative to the owner's
/// position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Silhouette {
    pub mask: Mask,
    pub offset_x: i32,
    pub offset_y: i32,
}

#[inline]
fn in_ellipse(fx: f64, fy: f64, cx: f64, cy: f64, rx: f64, ry: f64) -> bool {
    let nx = (fx - cx) / rx;
    let ny = (fy - cy) / ry;
    nx * nx + ny * ny <= 1.0
}

pub fn bird_frame_mask(frame: WingFrame, width: u32, height: u32) -> Mask {
    let (w, h) = (width as f64, height as f64);
    let wing_y = frame.wing_center_y();
    Mask::from_fn(width, height, |x, y| {
        let fx = (x as f64 + 0.5) / w;
        let fy = (y as f64 + 0.5) / h;
        let body = in_ellipse(fx, fy, 0.47, 0.54, 0.38, 0.42);
        let head = in_ellipse(fx, fy, 0.66, 0.32, 0.16, 0.22);
        let beak = (0.75..0.97).contains(&fx) && (0.50..0.72).contains(&fy);
        let wing = in_ellipse(fx, fy, 0.24, wing_y, 0.20, 0.15);
        body || head || beak || wing
    })
}

/// A barrier whose wide cap faces the gap: at the bottom edge for the upper
/// barrier, at the top edge for the lower one.
pub fn pipe_barrier_mask(
    width: u32,
    height: u32,
    cap_height: u32,
    body_inset: u32,
    cap_at_bottom: bool,
) -> Mask {
    let cap_height = cap_height.min(height);
    let body_inset = body_inset.min(width / 2);
    Mask::from_fn(width, height, |x, y| {
        let in_cap = if cap_at_bottom {
            y >= height - cap_height
        } else {
            y < cap_height
        };
        in_cap || (x >= body_inset && x < width - body_inset)
    })
}

fn rotate_about_center(base: &Mask, degrees: i32) -> Silhouette {
    let mask = base.rotated(degrees as f64);
    let offset_x = base.width() as i32 / 2 - mask.width() as i32 / 2;
    let offset_y = base.height() as i32 / 2 - mask.height() as i32 / 2;
    Silhouette {
        mask,
        offset_x,
        offset_y,
    }
}

/// Owns every silhouette a world needs. Rotated bird silhouettes are built on
/// first use and cached per frame and whole-degree tilt.
#[derive(Clone, Debug)]
pub struct SpriteAtlas {
    bird_frames: [Mask; 3],
    top_pipe: Mask,
    bottom_pipe: Mask,
    rotated: HashMap<(WingFrame, i32), Silhouette>,
}

impl SpriteAtlas {
    pub fn new(config: &SimConfig) -> Self {
        let frame = |wing| bird_frame_mask(wing, config.bird_width, config.bird_height);
        Self {
            bird_frames: [WingFrame::Up, WingFrame::Mid, WingFrame::Down].map(frame),
            top_pipe: pipe_barrier_mask(
                config.pipe_width,
                config.pipe_height,
                config.pipe_cap_height,
                config.pipe_body_inset,
                true,
            ),
            bottom_pipe: pipe_barrier_mask(
                config.pipe_width,
                config.pipe_height,
                config.pipe_cap_height,
                config.pipe_body_inset,
                false,
            ),
            rotated: HashMap::new(),
        }
    }

    pub fn bird_frame(&self, frame: WingFrame) -> &Mask {
        &self.bird_frames[frame.index()]
    }

    /// Silhouette of `frame` rotated by `tilt`, centered on the unrotated
    /// sprite.
    pub fn bird_silhouette(&mut self, frame: WingFrame, tilt: f64) -> &Silhouette {
        self.collision_shapes(frame, tilt).0
    }

    /// The bird silhouette together with the upper and lower barrier masks,
    /// borrowed at once for a collision test.
    pub fn collision_shapes(
        &mut self,
        frame: WingFrame,
        tilt: f64,
    ) -> (&Silhouette, &Mask, &Mask) {
        let base = &self.bird_frames[frame.index()];
        let degrees = tilt.round() as i32;
        let silhouette = self
            .rotated
            .entry((frame, degrees))
            .or_insert_with(|| rotate_about_center(base, degrees));
        (silhouette, &self.top_pipe, &self.bottom_pipe)
    }

    pub fn top_pipe(&self) -> &Mask {
        &self.top_pipe
    }

    pub fn bottom_pipe(&self) -> &Mask {
        &self.bottom_pipe
    }

    pub fn cached_rotations(&self) -> usize {
        self.rotated.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bird_frames_differ_only_by_wing() {
        let up = bird_frame_mask(WingFrame::Up, 68, 48);
        let mid = bird_frame_mask(WingFrame::Mid, 68, 48);
        let down = bird_frame_mask(WingFrame::Down, 68, 48);
        assert_ne!(up, mid);
        assert_ne!(mid, down);
        assert_ne!(up, down);
        // Beak pixel is opaque in every frame.
        for mask in [&up, &mid, &down] {
            assert!(mask.get(60, 29));
            assert!(!mask.get(0, 0));
        }
    }

    #[test]
    fn pipe_caps_face_the_gap() {
        let top = pipe_barrier_mask(104, 640, 48, 4, true);
        let bottom = pipe_barrier_mask(104, 640, 48, 4, false);
        // Cap spans the full width next to the gap; the body is inset.
        assert!(top.get(0, 639));
        assert!(!top.get(0, 0));
        assert!(top.get(4, 0));
        assert!(bottom.get(0, 0));
        assert!(!bottom.get(0, 639));
        assert!(bottom.get(99, 639));
        assert!(!bottom.get(100, 639));
    }

    #[test]
    fn rotated_silhouettes_are_cached_and_centered() {
        let config = SimConfig::default();
        let mut atlas = SpriteAtlas::new(&config);

        let level = atlas.bird_silhouette(WingFrame::Mid, 0.0).clone();
        assert_eq!((level.offset_x, level.offset_y), (0, 0));
        assert_eq!(&level.mask, atlas.bird_frame(WingFrame::Mid));

        let dive = atlas.bird_silhouette(WingFrame::Mid, -90.0).clone();
        assert_eq!((dive.mask.width(), dive.mask.height()), (48, 68));
        assert_eq!((dive.offset_x, dive.offset_y), (34 - 24, 24 - 34));

        atlas.bird_silhouette(WingFrame::Mid, -89.8);
        assert_eq!(atlas.cached_rotations(), 2);
    }

    #[test]
    fn frame_lookup_and_collision_shapes_share_one_cache() {
        let config = SimConfig::default();
        let mut atlas = SpriteAtlas::new(&config);
        for frame in [WingFrame::Up, WingFrame::Mid, WingFrame::Down] {
            assert_eq!(
                atlas.bird_frame(frame),
                &bird_frame_mask(frame, config.bird_width, config.bird_height)
            );
        }

        let (from_shapes, top, bottom) = atlas.collision_shapes(WingFrame::Down, 25.0);
        let from_shapes = from_shapes.clone();
        assert_eq!((top.height(), bottom.height()), (640, 640));
        assert_eq!(atlas.bird_silhouette(WingFrame::Down, 24.6), &from_shapes);
        assert_eq!(atlas.cached_rotations(), 1);
    }
}

//! Bit-packed opacity masks and the exact overlap test used for collisions.
//!
//! Each row is stored as `u64` words, pixel `x` living in bit `x % 64` of word
//! `x / 64`. Bits past `width` in the last word of a row are always zero,
//! which lets the overlap test AND whole words without re-masking.

const WORD_BITS: i64 = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    words_per_row: usize,
    bits: Vec<u64>,
}

impl Mask {
    /// A fully transparent mask.
    pub fn new(width: u32, height: u32) -> Self {
        let words_per_row = (width as usize).div_ceil(WORD_BITS as usize);
        Self {
            width,
            height,
            words_per_row,
            bits: vec![0; words_per_row * height as usize],
        }
    }

    pub fn filled(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| true)
    }

    pub fn from_fn(width: u32, height: u32, mut opaque: impl FnMut(u32, u32) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if opaque(x, y) {
                    mask.set(x, y, true);
                }
            }
        }
        mask
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Out-of-bounds coordinates read as transparent.
    pub fn get(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return false;
        }
        let word = self.bits[self.word_index(x as u32, y as u32)];
        (word >> (x as u32 % 64)) & 1 == 1
    }

    pub fn set(&mut self, x: u32, y: u32, opaque: bool) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} mask",
            self.width,
            self.height
        );
        let index = self.word_index(x, y);
        let bit = 1u64 << (x % 64);
        if opaque {
            self.bits[index] |= bit;
        } else {
            self.bits[index] &= !bit;
        }
    }

    /// Number of opaque pixels.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|word| *word == 0)
    }

    /// Tests whether any opaque pixel of `self` coincides with an opaque pixel
    /// of `other` when `other`'s top-left corner sits at `(dx, dy)` in
    /// `self`'s coordinates.
    ///
    /// Returns the first shared pixel in row-major order, in `self`'s
    /// coordinates.
    pub fn overlap(&self, other: &Mask, dx: i32, dy: i32) -> Option<(i32, i32)> {
        let (dx, dy) = (dx as i64, dy as i64);
        let x_start = dx.max(0);
        let x_end = (dx + other.width as i64).min(self.width as i64);
        let y_start = dy.max(0);
        let y_end = (dy + other.height as i64).min(self.height as i64);
        if x_start >= x_end || y_start >= y_end {
            return None;
        }

        let first_word = x_start / WORD_BITS;
        let last_word = (x_end - 1) / WORD_BITS;

        for y in y_start..y_end {
            let own_row = self.row(y as usize);
            let other_y = (y - dy) as usize;
            for word in first_word..=last_word {
                let shared =
                    own_row[word as usize] & other.row_window(other_y, word * WORD_BITS - dx);
                if shared != 0 {
                    let x = word * WORD_BITS + shared.trailing_zeros() as i64;
                    return Some((x as i32, y as i32));
                }
            }
        }

        None
    }

    #[inline]
    pub fn overlaps(&self, other: &Mask, dx: i32, dy: i32) -> bool {
        self.overlap(other, dx, dy).is_some()
    }

    /// Rotates counter-clockwise (as seen on screen, y pointing down) by
    /// `degrees` around the mask center, nearest-neighbour sampled. The result
    /// grows to the bounding box of the rotated rectangle.
    pub fn rotated(&self, degrees: f64) -> Mask {
        if degrees == 0.0 {
            return self.clone();
        }

        let (sin, cos) = degrees.to_radians().sin_cos();
        let (w, h) = (self.width as f64, self.height as f64);
        let out_w = snap_ceil(w * cos.abs() + h * sin.abs());
        let out_h = snap_ceil(w * sin.abs() + h * cos.abs());
        let (half_out_w, half_out_h) = (out_w as f64 / 2.0, out_h as f64 / 2.0);

        Mask::from_fn(out_w, out_h, |px, py| {
            let u = px as f64 + 0.5 - half_out_w;
            let v = py as f64 + 0.5 - half_out_h;
            let src_x = (u * cos - v * sin + w / 2.0).floor();
            let src_y = (u * sin + v * cos + h / 2.0).floor();
            self.get(src_x as i32, src_y as i32)
        })
    }

    #[inline]
    fn word_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.words_per_row + (x / 64) as usize
    }

    #[inline]
    fn row(&self, y: usize) -> &[u64] {
        let start = y * self.words_per_row;
        &self.bits[start..start + self.words_per_row]
    }

    /// The 64 pixels of row `y` starting at column `start` (may be negative or
    /// past the edge; missing pixels read as zero).
    fn row_window(&self, y: usize, start: i64) -> u64 {
        let row = self.row(y);
        let word_at = |index: i64| -> u64 {
            if index < 0 || index >= row.len() as i64 {
                0
            } else {
                row[index as usize]
            }
        };

        let word = start.div_euclid(WORD_BITS);
        let shift = start.rem_euclid(WORD_BITS) as u32;
        let low = word_at(word) >> shift;
        if shift == 0 {
            low
        } else {
            low | (word_at(word + 1) << (64 - shift))
        }
    }
}

// Trig on multiples of 90 degrees leaves ~1e-16 residue that would otherwise
// add a phantom pixel column.
fn snap_ceil(value: f64) -> u32 {
    (value - 1e-9).ceil().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededRng;

    fn random_mask(rng: &mut SeededRng, width: u32, height: u32, density_pct: u32) -> Mask {
        Mask::from_fn(width, height, |_, _| rng.next_int(100) < density_pct)
    }

    fn brute_force_overlap(a: &Mask, b: &Mask, dx: i32, dy: i32) -> Option<(i32, i32)> {
        for y in 0..a.height() as i32 {
            for x in 0..a.width() as i32 {
                if a.get(x, y) && b.get(x - dx, y - dy) {
                    return Some((x, y));
                }
            }
        }
        None
    }

    #[test]
    fn get_and_set_roundtrip_across_word_boundary() {
        let mut mask = Mask::new(130, 2);
        mask.set(63, 0, true);
        mask.set(64, 0, true);
        mask.set(129, 1, true);
        assert!(mask.get(63, 0));
        assert!(mask.get(64, 0));
        assert!(mask.get(129, 1));
        assert!(!mask.get(65, 0));
        assert!(!mask.get(-1, 0));
        assert!(!mask.get(130, 1));
        assert_eq!(mask.count(), 3);

        mask.set(64, 0, false);
        assert!(!mask.get(64, 0));
        assert_eq!(mask.count(), 2);
    }

    #[test]
    fn disjoint_placements_never_overlap() {
        let a = Mask::filled(10, 10);
        let b = Mask::filled(10, 10);
        assert_eq!(a.overlap(&b, 10, 0), None);
        assert_eq!(a.overlap(&b, -10, 0), None);
        assert_eq!(a.overlap(&b, 0, 10), None);
        assert_eq!(a.overlap(&b, 0, -10), None);
        assert_eq!(a.overlap(&b, 9, 9), Some((9, 9)));
    }

    #[test]
    fn overlap_ignores_transparent_bounding_box_contact() {
        // Two hollow squares nested inside each other share a bounding box but
        // no pixels.
        let outer = Mask::from_fn(20, 20, |x, y| x == 0 || y == 0 || x == 19 || y == 19);
        let inner = Mask::filled(10, 10);
        assert_eq!(outer.overlap(&inner, 5, 5), None);
        assert_eq!(outer.overlap(&inner, 12, 5), Some((19, 5)));
    }

    #[test]
    fn overlap_matches_brute_force() {
        let mut rng = SeededRng::new(0xC0FF_EE00);
        for _ in 0..40 {
            let (aw, ah) = (1 + rng.next_int(150), 1 + rng.next_int(40));
            let a = random_mask(&mut rng, aw, ah, 8);
            let (bw, bh) = (1 + rng.next_int(150), 1 + rng.next_int(40));
            let b = random_mask(&mut rng, bw, bh, 8);
            for _ in 0..25 {
                let dx = rng.next_range(-160, 160);
                let dy = rng.next_range(-45, 45);
                assert_eq!(
                    a.overlap(&b, dx, dy),
                    brute_force_overlap(&a, &b, dx, dy),
                    "dx={dx} dy={dy}"
                );
            }
        }
    }

    #[test]
    fn overlap_is_symmetric_under_negated_offset() {
        let mut rng = SeededRng::new(0x5EED_0001);
        for _ in 0..40 {
            let (aw, ah) = (1 + rng.next_int(100), 1 + rng.next_int(60));
            let a = random_mask(&mut rng, aw, ah, 5);
            let (bw, bh) = (1 + rng.next_int(100), 1 + rng.next_int(60));
            let b = random_mask(&mut rng, bw, bh, 5);
            for dy in -20..20 {
                let dx = rng.next_range(-110, 110);
                assert_eq!(a.overlaps(&b, dx, dy), b.overlaps(&a, -dx, -dy));
            }
        }
    }

    #[test]
    fn zero_rotation_is_identity() {
        let mut rng = SeededRng::new(3);
        let mask = random_mask(&mut rng, 68, 48, 50);
        assert_eq!(mask.rotated(0.0), mask);
    }

    #[test]
    fn quarter_turn_swaps_dimensions_and_keeps_area() {
        let mask = Mask::from_fn(68, 48, |x, _| x < 10);
        let turned = mask.rotated(90.0);
        assert_eq!((turned.width(), turned.height()), (48, 68));
        assert_eq!(turned.count(), mask.count());
        // Counter-clockwise: the left strip ends up along the bottom edge.
        assert!(turned.get(20, 67));
        assert!(!turned.get(20, 0));
    }

    #[test]
    fn diagonal_rotation_expands_bounds() {
        let turned = Mask::filled(68, 48).rotated(-45.0);
        assert!(turned.width() > 68);
        assert!(turned.height() > 48);
        // The corners of the expanded box stay transparent.
        assert!(!turned.get(0, 0));
        assert!(!turned.get(turned.width() as i32 - 1, turned.height() as i32 - 1));
    }
}

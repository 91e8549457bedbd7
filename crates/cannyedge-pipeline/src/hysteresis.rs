//! Hysteresis edge tracking.
//!
//! Every strong pixel is an edge. A weak pixel becomes an edge when an
//! 8-connected path of weak pixels links it to a strong one. Only
//! interior weak pixels are promoted; weak pixels on the one-pixel
//! border neither become edges nor carry connectivity.
//!
//! The fill uses an explicit stack, so memory grows with the number of
//! promoted pixels rather than call depth.

use image::{GrayImage, Luma};

use crate::threshold::{ClassMap, PixelClass, STRONG};

const NEIGHBORS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Trace edges through `classes`, returning a binary image (0 or 255).
#[must_use = "returns the final edge image"]
pub fn track(classes: &ClassMap) -> GrayImage {
    let (w, h) = (classes.width(), classes.height());
    let mut out = GrayImage::new(w, h);
    let mut stack: Vec<(u32, u32)> = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if classes.get(x, y) == Some(PixelClass::Strong) {
                out.put_pixel(x, y, Luma([STRONG]));
                stack.push((x, y));
            }
        }
    }

    let interior = |x: u32, y: u32| x > 0 && y > 0 && x + 1 < w && y + 1 < h;

    while let Some((x, y)) = stack.pop() {
        for (dx, dy) in NEIGHBORS {
            let (Some(nx), Some(ny)) = (x.checked_add_signed(dx), y.checked_add_signed(dy)) else {
                continue;
            };
            if !interior(nx, ny) || out.get_pixel(nx, ny).0[0] == STRONG {
                continue;
            }
            if classes.get(nx, ny) == Some(PixelClass::Weak) {
                out.put_pixel(nx, ny, Luma([STRONG]));
                stack.push((nx, ny));
            }
        }
    }

    out
}

/// Count pixels set in an edge image.
#[must_use]
pub fn edge_pixel_count(edges: &GrayImage) -> u64 {
    edges.pixels().map(|p| u64::from(p.0[0] == STRONG)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Repeated full-grid passes until nothing changes.
    fn fixpoint(classes: &ClassMap) -> GrayImage {
        let (w, h) = (classes.width(), classes.height());
        let mut out = GrayImage::from_fn(w, h, |x, y| {
            Luma([if classes.get(x, y) == Some(PixelClass::Strong) {
                255
            } else {
                0
            }])
        });
        if w < 3 || h < 3 {
            return out;
        }
        loop {
            let mut changed = false;
            for y in 1..h - 1 {
                for x in 1..w - 1 {
                    if classes.get(x, y) != Some(PixelClass::Weak) || out.get_pixel(x, y).0[0] != 0 {
                        continue;
                    }
                    let linked = NEIGHBORS.iter().any(|&(dx, dy)| {
                        let nx = x.saturating_add_signed(dx);
                        let ny = y.saturating_add_signed(dy);
                        out.get_pixel(nx, ny).0[0] == 255
                    });
                    if linked {
                        out.put_pixel(x, y, Luma([255]));
                        changed = true;
                    }
                }
            }
            if !changed {
                return out;
            }
        }
    }

    fn map_from(rows: &[&str]) -> ClassMap {
        let height = u32::try_from(rows.len()).unwrap_or(0);
        let width = u32::try_from(rows.first().map_or(0, |r| r.len())).unwrap_or(0);
        let mut map = ClassMap::new(width, height);
        for (y, row) in (0u32..).zip(rows) {
            for (x, c) in (0u32..).zip(row.chars()) {
                let class = match c {
                    'S' => PixelClass::Strong,
                    'w' => PixelClass::Weak,
                    _ => PixelClass::Suppressed,
                };
                map.set(x, y, class);
            }
        }
        map
    }

    #[test]
    fn weak_chain_ten_cells_long_is_promoted() {
        let map = map_from(&[
            "..............",
            ".Swwwwwwwwww..",
            "..............",
        ]);
        let out = track(&map);
        for x in 1..=11 {
            assert_eq!(out.get_pixel(x, 1).0[0], 255, "column {x}");
        }
        assert_eq!(edge_pixel_count(&out), 11);
    }

    #[test]
    fn diagonal_links_count() {
        let map = map_from(&[
            "......",
            ".S....",
            "..w...",
            "...w..",
            "......",
        ]);
        let out = track(&map);
        assert_eq!(out.get_pixel(2, 2).0[0], 255);
        assert_eq!(out.get_pixel(3, 3).0[0], 255);
    }

    #[test]
    fn isolated_weak_pixel_is_dropped() {
        let map = map_from(&[
            ".......",
            ".S.....",
            ".......",
            "....w..",
            ".......",
        ]);
        let out = track(&map);
        assert_eq!(out.get_pixel(4, 3).0[0], 0);
        assert_eq!(edge_pixel_count(&out), 1);
    }

    #[test]
    fn border_weak_pixels_stay_off() {
        let map = map_from(&["wwww", "wSww", "wwww"]);
        let out = track(&map);
        assert_eq!(out.get_pixel(1, 1).0[0], 255);
        assert_eq!(out.get_pixel(2, 1).0[0], 255);
        for x in 0..4 {
            assert_eq!(out.get_pixel(x, 0).0[0], 0);
            assert_eq!(out.get_pixel(x, 2).0[0], 0);
        }
        assert_eq!(out.get_pixel(0, 1).0[0], 0);
        assert_eq!(out.get_pixel(3, 1).0[0], 0);
    }

    #[test]
    fn strong_border_pixel_seeds_interior() {
        let map = map_from(&["S...", ".w..", "...."]);
        let out = track(&map);
        assert_eq!(out.get_pixel(0, 0).0[0], 255);
        assert_eq!(out.get_pixel(1, 1).0[0], 255);
    }

    #[test]
    fn matches_multi_pass_fixpoint() {
        // Deterministic pseudo-random class maps.
        let mut state: u32 = 0x9E37_79B9;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };
        for (w, h) in [(1, 1), (3, 3), (7, 5), (16, 16), (33, 20)] {
            for _ in 0..8 {
                let mut map = ClassMap::new(w, h);
                for y in 0..h {
                    for x in 0..w {
                        let class = match next() % 10 {
                            0 => PixelClass::Strong,
                            1..=5 => PixelClass::Weak,
                            _ => PixelClass::Suppressed,
                        };
                        map.set(x, y, class);
                    }
                }
                assert_eq!(track(&map), fixpoint(&map), "{w}x{h}");
            }
        }
    }

    #[test]
    fn large_weak_field_does_not_overflow() {
        let (w, h) = (512, 512);
        let mut map = ClassMap::new(w, h);
        for y in 0..h {
            for x in 0..w {
                map.set(x, y, PixelClass::Weak);
            }
        }
        map.set(256, 256, PixelClass::Strong);
        let out = track(&map);
        assert_eq!(edge_pixel_count(&out), u64::from((w - 2) * (h - 2)));
    }
}

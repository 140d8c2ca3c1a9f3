//! Visible-tile selection.
//!
//! A rotation-invariant bounding circle covers the viewport's farthest corner
//! under any rotation, so the tile sweep never depends on the camera's
//! orientation. Big-decimal arithmetic happens exactly once per call (the
//! camera-to-tile-units conversion); the sweep itself is native integers.

use camera::Camera;
use foundation::{BigDec, TileCoord};
use num_bigint::BigInt;
use num_traits::One;
use tracing::warn;

/// Sanity bound on the sweep radius. The per-frame callers stay well under
/// ten; anything larger means a degenerate level/viewport combination.
const MAX_SEARCH_RADIUS: i64 = 128;

/// Ring buffer of slack beyond the circle radius so tiles whose corner (not
/// center) pokes into the viewport still qualify.
const CORNER_COVERAGE: f64 = 0.75;

/// A tile intersecting the view circle, with its top-left offset from the
/// camera in target-level tile units.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleTile {
    pub coord: TileCoord,
    pub rel_x: f64,
    pub rel_y: f64,
}

/// Selection result for one level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VisibleSet {
    pub tiles: Vec<VisibleTile>,
    /// Inclusive index range actually covered; `None` when no tile qualified.
    pub x_range: Option<(BigInt, BigInt)>,
    pub y_range: Option<(BigInt, BigInt)>,
}

impl VisibleSet {
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }
}

/// Tiles at `target_level` intersecting the viewport's bounding circle.
///
/// Negative target levels yield an empty set. Indices that would fall outside
/// `[0, 2^level)` are dropped; the world does not wrap.
pub fn visible_tiles(
    camera: &Camera,
    target_level: i32,
    view_w: f64,
    view_h: f64,
    tile_size: u32,
) -> VisibleSet {
    if target_level < 0 {
        return VisibleSet::default();
    }
    let level = target_level as u32;

    let view_radius_px = ((view_w * 0.5).powi(2) + (view_h * 0.5).powi(2)).sqrt();
    let level_diff = camera.global_level - level as f64;
    // Saturating exponent keeps a degenerate level gap finite; the radius cap
    // below bounds the damage either way.
    let display_scale = level_diff.clamp(-1020.0, 1020.0).exp2();
    let tile_px = tile_size.max(1) as f64 * display_scale;
    let radius_tiles = view_radius_px / tile_px;

    let search_radius = radius_tiles.ceil();
    if !search_radius.is_finite() || search_radius as i64 > MAX_SEARCH_RADIUS {
        warn!(
            target_level,
            camera_level = camera.global_level,
            "tile sweep radius out of range, returning empty set"
        );
        return VisibleSet::default();
    }
    let r = search_radius as i64;

    // The single big-decimal step: camera position in target-level tile units,
    // split into an exact integer part and a native fraction.
    let scale = BigDec::pow2_int(level as i64);
    let (cx_int, cx_frac) = (&camera.pos.x * &scale).split_int_frac();
    let (cy_int, cy_frac) = (&camera.pos.y * &scale).split_int_frac();

    let side = BigInt::one() << level as usize;
    let accept_r2 = (radius_tiles + CORNER_COVERAGE).powi(2);

    let mut set = VisibleSet::default();
    for dx in -r..=r {
        let ox = dx as f64 + 0.5 - cx_frac;
        for dy in -r..=r {
            let oy = dy as f64 + 0.5 - cy_frac;
            if ox * ox + oy * oy >= accept_r2 {
                continue;
            }
            let ix = &cx_int + BigInt::from(dx);
            let iy = &cy_int + BigInt::from(dy);
            if ix.sign() == num_bigint::Sign::Minus || iy.sign() == num_bigint::Sign::Minus {
                continue;
            }
            if ix >= side || iy >= side {
                continue;
            }

            expand_range(&mut set.x_range, &ix);
            expand_range(&mut set.y_range, &iy);

            let (Some(ux), Some(uy)) = (ix.to_biguint(), iy.to_biguint()) else {
                continue;
            };
            set.tiles.push(VisibleTile {
                coord: TileCoord::new(level, ux, uy),
                rel_x: dx as f64 - cx_frac,
                rel_y: dy as f64 - cy_frac,
            });
        }
    }
    set
}

fn expand_range(range: &mut Option<(BigInt, BigInt)>, v: &BigInt) {
    match range {
        None => *range = Some((v.clone(), v.clone())),
        Some((lo, hi)) => {
            if v < lo {
                *lo = v.clone();
            }
            if v > hi {
                *hi = v.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::visible_tiles;
    use camera::Camera;
    use foundation::{BigDec, GlobalPos};
    use num_bigint::{BigInt, BigUint};
    use std::collections::BTreeSet;

    fn cam(level: f64, x: &str, y: &str) -> Camera {
        Camera {
            global_level: level,
            pos: GlobalPos::new(BigDec::parse(x).unwrap(), BigDec::parse(y).unwrap()),
            rotation: 0.0,
        }
    }

    #[test]
    fn world_view_is_a_single_tile() {
        let set = visible_tiles(&Camera::home(), 0, 1024.0, 1024.0, 512);
        assert_eq!(set.len(), 1);
        let t = &set.tiles[0];
        assert_eq!(t.coord.level, 0);
        assert_eq!(t.coord.x, BigUint::from(0u8));
        assert_eq!(t.coord.y, BigUint::from(0u8));
        // Tile top-left sits half a tile up-left of the centered camera.
        assert_eq!((t.rel_x, t.rel_y), (-0.5, -0.5));
    }

    #[test]
    fn negative_level_is_empty() {
        let set = visible_tiles(&Camera::home(), -1, 800.0, 600.0, 512);
        assert!(set.is_empty());
    }

    #[test]
    fn mid_zoom_circle_crops_the_square() {
        let set = visible_tiles(&cam(10.0, "0.5", "0.5"), 10, 800.0, 600.0, 100);
        // Circle interior of an 11x11 sweep.
        assert!(set.len() <= 121, "got {}", set.len());
        assert!(set.len() >= 80, "got {}", set.len());
    }

    #[test]
    fn parent_level_covers_all_four_tiles() {
        let set = visible_tiles(&cam(2.0, "0.5", "0.5"), 1, 512.0, 512.0, 256);
        let keys: BTreeSet<String> = set.tiles.iter().map(|t| t.coord.key()).collect();
        let want: BTreeSet<String> = ["1/0/0", "1/0/1", "1/1/0", "1/1/1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(keys, want);
    }

    #[test]
    fn corner_camera_clips_to_world() {
        let set = visible_tiles(&cam(5.0, "0", "0"), 5, 256.0, 256.0, 256);
        let keys: Vec<String> = set.tiles.iter().map(|t| t.coord.key()).collect();
        assert_eq!(keys, vec!["5/0/0".to_string()]);
    }

    #[test]
    fn deep_zoom_indices_are_exact() {
        let x = "0.50000000000000000000000000000000000000000000000001"; // 0.5 + 1e-50
        let set = visible_tiles(&cam(200.0, x, "0.5"), 200, 1920.0, 1080.0, 512);
        assert!(!set.is_empty());

        let threshold = BigUint::from(1u8) << 199usize;
        for t in &set.tiles {
            let digits = t.coord.x.to_string();
            assert!(digits.chars().all(|c| c.is_ascii_digit()));
            assert!(t.coord.x > threshold);
        }

        // The camera's tile-space position lies inside the covered range.
        let (lo, hi) = set.x_range.clone().unwrap();
        let center = (&BigDec::parse(x).unwrap() * &BigDec::pow2_int(200)).floor_int();
        assert!(center >= lo);
        assert!(center <= hi + BigInt::from(1));
    }

    #[test]
    fn sub_precision_nudge_barely_moves_the_set() {
        let base = "0.5";
        // 0.5 + 1e-61: about a sixth of a tile at level 200.
        let nudged = "0.5000000000000000000000000000000000000000000000000000000000001";
        let a = visible_tiles(&cam(200.0, base, "0.5"), 200, 1920.0, 1080.0, 512);
        let b = visible_tiles(&cam(200.0, nudged, "0.5"), 200, 1920.0, 1080.0, 512);

        let ka: BTreeSet<String> = a.tiles.iter().map(|t| t.coord.key()).collect();
        let kb: BTreeSet<String> = b.tiles.iter().map(|t| t.coord.key()).collect();
        let union = ka.union(&kb).count();
        let inter = ka.intersection(&kb).count();
        let symdiff = union - inter;
        // The sets agree except along a tile boundary at the disc's rim.
        assert!(inter * 2 >= union, "sets diverged: {inter}/{union}");
        assert!(symdiff <= 8, "boundary churn too large: {symdiff}");
    }

    #[test]
    fn big_decimal_fraction_positions_tiles() {
        // Camera a quarter into tile 2 at level 2.
        let set = visible_tiles(&cam(2.0, "0.5625", "0.5"), 2, 256.0, 256.0, 256);
        let center = set
            .tiles
            .iter()
            .find(|t| t.coord.x == BigUint::from(2u8) && t.coord.y == BigUint::from(2u8))
            .expect("center tile present");
        assert!((center.rel_x + 0.25).abs() < 1e-12);
        assert!((center.rel_y + 0.0).abs() < 1e-12);
    }
}

//! Global coordinates and tile identities.

use std::fmt;

use num_bigint::BigUint;
use num_traits::One;

use crate::num::BigDec;

/// Normalized global position in [0, 1]², independent of zoom level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalPos {
    pub x: BigDec,
    pub y: BigDec,
}

impl GlobalPos {
    pub fn new(x: BigDec, y: BigDec) -> Self {
        Self { x, y }
    }

    pub fn center() -> Self {
        Self {
            x: BigDec::from_lossy(0.5),
            y: BigDec::from_lossy(0.5),
        }
    }

    /// Clamp both axes into the unit square. Out-of-range coordinates are
    /// corrected silently; this is the world edge, not an error.
    pub fn clamp_unit(&mut self) {
        let zero = BigDec::zero();
        let one = BigDec::one();
        if self.x < zero {
            self.x = zero.clone();
        } else if self.x > one {
            self.x = one.clone();
        }
        if self.y < zero {
            self.y = zero;
        } else if self.y > one {
            self.y = one;
        }
    }

    pub fn to_f64(&self) -> (f64, f64) {
        (self.x.to_f64(), self.y.to_f64())
    }
}

/// Integer tile identity at a quadtree level.
///
/// Indices are unbounded; at level `L` the valid range is `0 ≤ x, y < 2^L`.
/// The derived ordering `(level, x, y)` keeps scheduler and orchestrator maps
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileCoord {
    pub level: u32,
    pub x: BigUint,
    pub y: BigUint,
}

impl TileCoord {
    pub fn new(level: u32, x: BigUint, y: BigUint) -> Self {
        Self { level, x, y }
    }

    /// Tiles per axis at this coordinate's level.
    pub fn side_count(level: u32) -> BigUint {
        BigUint::one() << level as usize
    }

    pub fn in_bounds(&self) -> bool {
        let side = Self::side_count(self.level);
        self.x < side && self.y < side
    }

    /// Canonical manifest key, `"level/x/y"`.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.level, self.x, self.y)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::{GlobalPos, TileCoord};
    use crate::num::BigDec;
    use num_bigint::BigUint;
    use num_traits::One;

    #[test]
    fn clamp_corrects_overshoot() {
        let mut p = GlobalPos::new(
            BigDec::parse("-0.25").unwrap(),
            BigDec::parse("1.5").unwrap(),
        );
        p.clamp_unit();
        assert_eq!(p.to_f64(), (0.0, 1.0));
    }

    #[test]
    fn key_formats_wide_indices() {
        let x = BigUint::one() << 199usize;
        let t = TileCoord::new(200, x.clone(), BigUint::from(3u8));
        let key = t.key();
        assert!(key.starts_with("200/"));
        assert!(key.ends_with("/3"));
        assert!(key.contains(&x.to_string()));
        assert!(t.in_bounds());
    }

    #[test]
    fn bounds_check_uses_level() {
        let t = TileCoord::new(1, BigUint::from(2u8), BigUint::from(0u8));
        assert!(!t.in_bounds());
        let t = TileCoord::new(1, BigUint::from(1u8), BigUint::from(1u8));
        assert!(t.in_bounds());
    }
}

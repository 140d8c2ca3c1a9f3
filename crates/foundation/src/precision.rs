//! Precision policies.
//!
//! This module is intentionally small and conservative. It provides the
//! decimal precision context threaded through every big-decimal operation
//! that can reach a tile-coordinate conversion.

/// Decimal working precision, derived from the deepest zoom level a dataset
/// is expected to reach.
///
/// At `global_level = L` the world-per-pixel scale is `2^-L`, so a position
/// needs roughly `L · log10(2) ≈ 0.301·L` significant decimal digits. The
/// policy keeps a margin on top of that and never drops below 50 digits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrecisionContext {
    digits: u64,
}

impl PrecisionContext {
    pub const MIN_DIGITS: u64 = 50;

    pub fn new() -> Self {
        Self {
            digits: Self::MIN_DIGITS,
        }
    }

    /// Precision required to represent positions at `max_level`.
    pub fn for_max_level(max_level: f64) -> Self {
        let mut ctx = Self::new();
        ctx.raise_for_level(max_level);
        ctx
    }

    pub fn digits(&self) -> u64 {
        self.digits
    }

    /// Grow the context for a new deepest level. Monotonic: the context
    /// never loses digits once raised.
    pub fn raise_for_level(&mut self, max_level: f64) {
        if !max_level.is_finite() || max_level <= 0.0 {
            return;
        }
        let needed = (max_level * 0.35 + 20.0).ceil() as u64;
        self.digits = self.digits.max(needed.max(Self::MIN_DIGITS));
    }
}

impl Default for PrecisionContext {
    fn default() -> Self {
        Self::new()
    }
}

//! The canonical navigation camera.

use std::fmt;

use foundation::{BigDec, GlobalPos, PrecisionContext};

#[derive(Debug, Clone, PartialEq)]
pub enum CameraError {
    BadCameraUpdate(String),
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::BadCameraUpdate(msg) => write!(f, "rejected camera update: {msg}"),
        }
    }
}

impl std::error::Error for CameraError {}

/// Canonical camera state.
///
/// `global_level` is the continuous zoom: its integer part selects the base
/// level of detail, the fraction drives the child-layer cross-fade. The
/// position stays in big-decimal so arbitrarily deep zooms keep their anchor.
/// Rotation is clockwise screen rotation in radians, unwrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub global_level: f64,
    pub pos: GlobalPos,
    pub rotation: f64,
}

impl Camera {
    /// Whole world in view: level 0, centered, unrotated.
    pub fn home() -> Self {
        Self {
            global_level: 0.0,
            pos: GlobalPos::center(),
            rotation: 0.0,
        }
    }

    pub fn new(global_level: f64, pos: GlobalPos, rotation: f64) -> Result<Self, CameraError> {
        if !global_level.is_finite() {
            return Err(CameraError::BadCameraUpdate(format!(
                "non-finite global level {global_level}"
            )));
        }
        if !rotation.is_finite() {
            return Err(CameraError::BadCameraUpdate(format!(
                "non-finite rotation {rotation}"
            )));
        }
        let mut pos = pos;
        pos.clamp_unit();
        Ok(Self {
            global_level: global_level.max(0.0),
            pos,
            rotation,
        })
    }

    /// Integer base level of detail.
    pub fn base_level(&self) -> u32 {
        self.global_level.floor().max(0.0).min(u32::MAX as f64) as u32
    }

    /// Fractional zoom part, the child-layer opacity.
    pub fn level_frac(&self) -> f64 {
        self.global_level - self.global_level.floor()
    }

    /// Drag the world with the cursor.
    ///
    /// The screen delta rotates by `+rotation` into the camera's local frame
    /// (the layer stack is displayed rotated by `-rotation`), scales by
    /// world-per-pixel, and subtracts from the position. The result clamps to
    /// the unit square.
    pub fn pan(
        &mut self,
        dx_px: f64,
        dy_px: f64,
        tile_size: u32,
        ctx: &PrecisionContext,
    ) -> Result<(), CameraError> {
        if !dx_px.is_finite() || !dy_px.is_finite() {
            return Err(CameraError::BadCameraUpdate(format!(
                "non-finite pan delta ({dx_px}, {dy_px})"
            )));
        }
        let (sin, cos) = self.rotation.sin_cos();
        let rx = dx_px * cos - dy_px * sin;
        let ry = dx_px * sin + dy_px * cos;

        let tile = tile_size.max(1) as f64;
        match BigDec::pow2_f64(-self.global_level) {
            Some(w) => {
                let wpp = w / tile;
                self.pos.x = &self.pos.x - &BigDec::from_lossy(rx * wpp);
                self.pos.y = &self.pos.y - &BigDec::from_lossy(ry * wpp);
            }
            None => {
                // Past the double range the pixel scale itself needs big
                // decimals; the per-axis pixel counts stay native.
                let w = BigDec::pow2(-self.global_level, ctx);
                self.pos.x = &self.pos.x - &w.scaled(rx / tile);
                self.pos.y = &self.pos.y - &w.scaled(ry / tile);
            }
        }
        self.pos.clamp_unit();
        Ok(())
    }

    /// Relative zoom; the level floors at 0 and position and rotation hold.
    pub fn zoom(&mut self, delta: f64) -> Result<(), CameraError> {
        let next = self.global_level + delta;
        if !next.is_finite() {
            return Err(CameraError::BadCameraUpdate(format!(
                "non-finite zoom target {next}"
            )));
        }
        self.global_level = next.max(0.0);
        Ok(())
    }

    pub fn set_rotation(&mut self, radians: f64) -> Result<(), CameraError> {
        if !radians.is_finite() {
            return Err(CameraError::BadCameraUpdate(format!(
                "non-finite rotation {radians}"
            )));
        }
        self.rotation = radians;
        Ok(())
    }
}

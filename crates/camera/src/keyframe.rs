//! Resolution of authored keyframes to canonical cameras.

use std::fmt;

use formats::{CameraSpec, NumOrText};
use foundation::{BigDec, GlobalPos, NumError, PrecisionContext};

use crate::camera::{Camera, CameraError};

/// The fractal-plane macro rectangle: centered on -0.75 + 0i, 3.0 units wide
/// and tall, with the imaginary axis pointing up (screen y points down).
const MB_CENTER_RE: f64 = -0.75;
const MB_CENTER_IM: f64 = 0.0;
const MB_SPAN: f64 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub enum KeyframeError {
    BadCoordinate(NumError),
    BadCamera(CameraError),
    UnknownMacro(String),
}

impl fmt::Display for KeyframeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyframeError::BadCoordinate(e) => write!(f, "keyframe coordinate: {e}"),
            KeyframeError::BadCamera(e) => write!(f, "keyframe camera: {e}"),
            KeyframeError::UnknownMacro(name) => write!(f, "unknown keyframe macro {name:?}"),
        }
    }
}

impl std::error::Error for KeyframeError {}

impl From<NumError> for KeyframeError {
    fn from(e: NumError) -> Self {
        KeyframeError::BadCoordinate(e)
    }
}

impl From<CameraError> for KeyframeError {
    fn from(e: CameraError) -> Self {
        KeyframeError::BadCamera(e)
    }
}

fn parse_scalar(v: &NumOrText) -> Result<BigDec, NumError> {
    match v {
        NumOrText::Num(n) => BigDec::from_f64(*n),
        NumOrText::Text(s) => BigDec::parse(s),
    }
}

fn parse_opt(v: &Option<NumOrText>) -> Result<Option<BigDec>, NumError> {
    v.as_ref().map(parse_scalar).transpose()
}

/// Resolve an authored keyframe camera to canonical form.
///
/// Level comes from `globalLevel`, falling back to `level + zoomOffset`.
/// Position resolution order: `x`/`y`, then `globalX`/`globalY`, then the
/// world center. The `mandelbrot`/`mb` macro instead maps `re`/`im` through
/// the fractal rectangle; `global` forces the `globalX`/`globalY` fields.
pub fn resolve_keyframe(spec: &CameraSpec, ctx: &PrecisionContext) -> Result<Camera, KeyframeError> {
    let global_level = match spec.global_level {
        Some(gl) => gl,
        None => spec.level.unwrap_or(0.0) + spec.zoom_offset.unwrap_or(0.0),
    };
    let rotation = spec.rotation.unwrap_or(0.0);

    let pos = match spec.macro_kind.as_deref() {
        None => resolve_plain(spec)?,
        Some("global") => resolve_global(spec)?,
        Some("mandelbrot") | Some("mb") => resolve_mandelbrot(spec, ctx)?,
        Some(other) => return Err(KeyframeError::UnknownMacro(other.to_string())),
    };

    Camera::new(global_level, pos, rotation).map_err(Into::into)
}

fn resolve_plain(spec: &CameraSpec) -> Result<GlobalPos, KeyframeError> {
    if let (Some(x), Some(y)) = (parse_opt(&spec.x)?, parse_opt(&spec.y)?) {
        return Ok(GlobalPos::new(x, y));
    }
    resolve_global(spec)
}

fn resolve_global(spec: &CameraSpec) -> Result<GlobalPos, KeyframeError> {
    if let (Some(x), Some(y)) = (parse_opt(&spec.global_x)?, parse_opt(&spec.global_y)?) {
        return Ok(GlobalPos::new(x, y));
    }
    Ok(GlobalPos::center())
}

fn resolve_mandelbrot(spec: &CameraSpec, ctx: &PrecisionContext) -> Result<GlobalPos, KeyframeError> {
    let (Some(re), Some(im)) = (parse_opt(&spec.re)?, parse_opt(&spec.im)?) else {
        return Ok(GlobalPos::center());
    };
    let span = BigDec::from_lossy(MB_SPAN);
    let left = BigDec::from_lossy(MB_CENTER_RE - MB_SPAN * 0.5);
    let top = BigDec::from_lossy(MB_CENTER_IM + MB_SPAN * 0.5);
    // x grows with re, y grows downward as im falls.
    let x = (&re - &left).div(&span, ctx)?;
    let y = (&top - &im).div(&span, ctx)?;
    Ok(GlobalPos::new(x, y))
}

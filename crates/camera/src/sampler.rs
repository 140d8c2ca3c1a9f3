//! Constant-visual-speed camera paths.
//!
//! A keyframe list becomes a sequence of filleted line primitives joined by
//! quadratic Bézier corners, then an arc-length table over the *visual*
//! distance metric. Sampling by progress walks the table, so playback speed
//! is constant on screen regardless of how zoom and pan mix along the path.

use foundation::{BigDec, GlobalPos, PrecisionContext};
use tracing::debug;

use crate::camera::Camera;

/// Arc-length table resolution per primitive.
pub const SAMPLES_PER_PRIMITIVE: usize = 2000;

/// Fillet radius cap in visual units. Uncapped radii at deep levels produce
/// wide orbiting detours around interior keyframes.
const FILLET_MAX_VISUAL: f64 = 4.0;

/// Level span below which a segment counts as pan-only and the swoop
/// reparameterization degenerates to plain lerp.
const LEVEL_EQ_EPS: f64 = 1e-9;

/// Perceptual distance between two cameras.
///
/// Lateral distance is measured at the *coarser* endpoint's scale
/// (`min` level, not average): during a deep-zoom segment the shallow end
/// dominates what the viewer sees, and an average would overestimate lateral
/// motion astronomically.
pub fn visual_distance(a: &Camera, b: &Camera, ctx: &PrecisionContext) -> f64 {
    let l_ref = a.global_level.min(b.global_level);
    let scale = BigDec::pow2(l_ref, ctx);
    let dx = (&(&b.pos.x - &a.pos.x) * &scale).to_f64();
    let dy = (&(&b.pos.y - &a.pos.y) * &scale).to_f64();
    let dl = b.global_level - a.global_level;
    let dr = b.rotation - a.rotation;
    (dx * dx + dy * dy + dl * dl + dr * dr).sqrt()
}

/// Swoop position parameter for a level-changing segment.
///
/// With `w = 2^-L` the position blend is `s = (w_t - w1) / (w2 - w1)`: affine
/// in the world-per-screen width, so the lateral motion stays proportional to
/// screen space throughout a descent and the target keeps its framing.
/// Rearranged into exponent-difference form to stay finite at any depth; a
/// level-equal segment falls back to `s = t` (the pan-only short-circuit —
/// the raw quotient would be 0/0).
fn swoop_s(l1: f64, l2: f64, t: f64) -> f64 {
    let d = l1 - l2;
    if d.abs() < LEVEL_EQ_EPS {
        return t;
    }
    if d < 0.0 {
        // Zooming in: exponents are negative, both terms stay in (0, 1].
        ((d * t).exp2() - 1.0) / (d.exp2() - 1.0)
    } else {
        // Zooming out: factored so every exponent is non-positive.
        let a = d * t;
        (a - d).exp2() * (1.0 - (-a).exp2()) / (1.0 - (-d).exp2())
    }
}

fn line_eval(a: &Camera, b: &Camera, t: f64) -> Camera {
    let s = swoop_s(a.global_level, b.global_level, t);
    let x = &a.pos.x + &(&b.pos.x - &a.pos.x).scaled(s);
    let y = &a.pos.y + &(&b.pos.y - &a.pos.y).scaled(s);
    Camera {
        global_level: a.global_level + (b.global_level - a.global_level) * t,
        pos: GlobalPos::new(x, y),
        rotation: a.rotation + (b.rotation - a.rotation) * t,
    }
}

fn corner_eval(q_in: &Camera, apex: &Camera, q_out: &Camera, t: f64) -> Camera {
    let u = 1.0 - t;
    let w0 = u * u;
    let w1 = 2.0 * u * t;
    let w2 = t * t;
    let x = &(&q_in.pos.x.scaled(w0) + &apex.pos.x.scaled(w1)) + &q_out.pos.x.scaled(w2);
    let y = &(&q_in.pos.y.scaled(w0) + &apex.pos.y.scaled(w1)) + &q_out.pos.y.scaled(w2);
    Camera {
        global_level: q_in.global_level * w0 + apex.global_level * w1 + q_out.global_level * w2,
        pos: GlobalPos::new(x, y),
        rotation: q_in.rotation * w0 + apex.rotation * w1 + q_out.rotation * w2,
    }
}

/// Path geometry primitive. Evaluation dispatches on the variant.
#[derive(Debug, Clone)]
pub enum Primitive {
    Line { a: Camera, b: Camera },
    Corner { q_in: Camera, apex: Camera, q_out: Camera },
}

impl Primitive {
    pub fn eval(&self, t: f64) -> Camera {
        match self {
            Primitive::Line { a, b } => line_eval(a, b, t),
            Primitive::Corner { q_in, apex, q_out } => corner_eval(q_in, apex, q_out, t),
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct LutEntry {
    global_t: f64,
    dist: f64,
}

#[derive(Debug)]
enum SamplerKind {
    Empty,
    Constant(Camera),
    Curve {
        primitives: Vec<Primitive>,
        lut: Vec<LutEntry>,
        total_length: f64,
    },
}

/// Immutable sampler derived from a keyframe list. Rebuilt whenever the path
/// changes.
#[derive(Debug)]
pub struct PathSampler {
    kind: SamplerKind,
    stops: Vec<f64>,
    ctx: PrecisionContext,
}

impl PathSampler {
    pub fn build(keyframes: &[Camera], ctx: PrecisionContext) -> Self {
        match keyframes {
            [] => Self {
                kind: SamplerKind::Empty,
                stops: Vec::new(),
                ctx,
            },
            [only] => Self {
                kind: SamplerKind::Constant(only.clone()),
                stops: vec![0.0],
                ctx,
            },
            _ => Self::build_curve(keyframes, ctx),
        }
    }

    fn build_curve(keyframes: &[Camera], ctx: PrecisionContext) -> Self {
        let n = keyframes.len();
        let seg_len: Vec<f64> = keyframes
            .windows(2)
            .map(|w| visual_distance(&w[0], &w[1], &ctx))
            .collect();

        // Fillet radius per interior keyframe: half the shorter adjacent
        // segment, capped.
        let mut radius = vec![0.0; n];
        for i in 1..n - 1 {
            let prev = seg_len[i - 1];
            let next = seg_len[i];
            if prev > 0.0 && next > 0.0 {
                radius[i] = (prev.min(next) * 0.5).min(FILLET_MAX_VISUAL);
            }
        }

        let mut primitives: Vec<Primitive> = Vec::with_capacity(2 * n);
        let mut stop_params = vec![0.0; n];

        for i in 0..n - 1 {
            let a = &keyframes[i];
            let b = &keyframes[i + 1];
            let len = seg_len[i];
            let t_start = if len > 0.0 { radius[i] / len } else { 0.0 };
            let t_end = if len > 0.0 { 1.0 - radius[i + 1] / len } else { 1.0 };
            let start = line_eval(a, b, t_start);
            let end = line_eval(a, b, t_end);
            primitives.push(Primitive::Line { a: start, b: end.clone() });

            if i + 1 < n - 1 {
                if radius[i + 1] > 0.0 {
                    let q_out = line_eval(b, &keyframes[i + 2], radius[i + 1] / seg_len[i + 1]);
                    // The keyframe itself sits at the corner apex.
                    stop_params[i + 1] = primitives.len() as f64 + 0.5;
                    primitives.push(Primitive::Corner {
                        q_in: end,
                        apex: b.clone(),
                        q_out,
                    });
                } else {
                    stop_params[i + 1] = primitives.len() as f64;
                }
            }
        }
        stop_params[n - 1] = primitives.len() as f64;

        // Arc-length table over the visual metric.
        let mut lut = Vec::with_capacity(primitives.len() * SAMPLES_PER_PRIMITIVE + 1);
        lut.push(LutEntry {
            global_t: 0.0,
            dist: 0.0,
        });
        let mut cum = 0.0;
        let mut prev = primitives[0].eval(0.0);
        for (pi, prim) in primitives.iter().enumerate() {
            for j in 1..=SAMPLES_PER_PRIMITIVE {
                let t = j as f64 / SAMPLES_PER_PRIMITIVE as f64;
                let cur = prim.eval(t);
                cum += visual_distance(&prev, &cur, &ctx);
                lut.push(LutEntry {
                    global_t: pi as f64 + t,
                    dist: cum,
                });
                prev = cur;
            }
        }

        let stops: Vec<f64> = stop_params
            .iter()
            .map(|&gt| dist_at_global_t(&lut, gt))
            .collect();

        debug!(
            keyframes = n,
            primitives = primitives.len(),
            total_length = cum,
            "path sampler rebuilt"
        );

        Self {
            kind: SamplerKind::Curve {
                primitives,
                lut,
                total_length: cum,
            },
            stops,
            ctx,
        }
    }

    /// Total arc length in visual units; zero for degenerate paths.
    pub fn total_length(&self) -> f64 {
        match &self.kind {
            SamplerKind::Curve { total_length, .. } => *total_length,
            _ => 0.0,
        }
    }

    /// Arc distance at which each keyframe occurs. Canonical source for
    /// timeline segment durations (first differences).
    pub fn stops(&self) -> &[f64] {
        &self.stops
    }

    pub fn is_playable(&self) -> bool {
        matches!(&self.kind, SamplerKind::Curve { .. })
    }

    pub fn precision(&self) -> &PrecisionContext {
        &self.ctx
    }

    /// Camera at normalized progress. `None` only for an empty path.
    pub fn camera_at_progress(&self, p: f64) -> Option<Camera> {
        match &self.kind {
            SamplerKind::Empty => None,
            SamplerKind::Constant(c) => Some(c.clone()),
            SamplerKind::Curve {
                primitives,
                lut,
                total_length,
            } => {
                let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
                let d = p * total_length;
                let gt = global_t_at_dist(lut, d);
                let pi = (gt.floor().max(0.0) as usize).min(primitives.len() - 1);
                let t = (gt - pi as f64).clamp(0.0, 1.0);
                Some(primitives[pi].eval(t))
            }
        }
    }
}

fn global_t_at_dist(lut: &[LutEntry], d: f64) -> f64 {
    let i = lut.partition_point(|e| e.dist < d);
    if i == 0 {
        return lut[0].global_t;
    }
    if i >= lut.len() {
        return lut[lut.len() - 1].global_t;
    }
    let lo = lut[i - 1];
    let hi = lut[i];
    let span = hi.dist - lo.dist;
    if span <= 0.0 {
        hi.global_t
    } else {
        lo.global_t + (hi.global_t - lo.global_t) * (d - lo.dist) / span
    }
}

fn dist_at_global_t(lut: &[LutEntry], gt: f64) -> f64 {
    let i = lut.partition_point(|e| e.global_t < gt);
    if i == 0 {
        return lut[0].dist;
    }
    if i >= lut.len() {
        return lut[lut.len() - 1].dist;
    }
    let lo = lut[i - 1];
    let hi = lut[i];
    let span = hi.global_t - lo.global_t;
    if span <= 0.0 {
        hi.dist
    } else {
        lo.dist + (hi.dist - lo.dist) * (gt - lo.global_t) / span
    }
}

//! In-memory mutation of the active camera path.
//!
//! Keyframes are stored in their authored form (`CameraSpec`) so decimal
//! strings keep every digit across an edit session; the sampler is rebuilt
//! after each mutation.

use formats::{CameraSpec, KeyframeSpec, NumOrText, PathFile, PathSpec};
use foundation::PrecisionContext;

use crate::camera::Camera;
use crate::keyframe::{KeyframeError, resolve_keyframe};
use crate::sampler::PathSampler;

#[derive(Debug, Default)]
pub struct PathEditor {
    keyframes: Vec<CameraSpec>,
    active_index: usize,
}

impl PathEditor {
    pub fn new(spec: PathSpec) -> Self {
        Self {
            keyframes: spec.keyframes.into_iter().map(|k| k.camera).collect(),
            active_index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    /// Playback needs at least two keyframes.
    pub fn is_playable(&self) -> bool {
        self.keyframes.len() >= 2
    }

    /// Resolve keyframe `index` and make it active. The returned camera is the
    /// exact keyframe, bypassing the sampler.
    pub fn jump_to(
        &mut self,
        index: usize,
        ctx: &PrecisionContext,
    ) -> Result<Option<Camera>, KeyframeError> {
        let Some(spec) = self.keyframes.get(index) else {
            return Ok(None);
        };
        let cam = resolve_keyframe(spec, ctx)?;
        self.active_index = index;
        Ok(Some(cam))
    }

    /// Snapshot `camera` right after the active keyframe and advance the
    /// active index onto it. Positions serialize as decimal strings so the
    /// insertion is precision-lossless.
    pub fn insert_after_active(&mut self, camera: &Camera) {
        let spec = camera_to_spec(camera);
        if self.keyframes.is_empty() {
            self.keyframes.push(spec);
            self.active_index = 0;
            return;
        }
        let at = (self.active_index + 1).min(self.keyframes.len());
        self.keyframes.insert(at, spec);
        self.active_index = at;
    }

    /// Remove keyframe `index`; returns false when out of range.
    pub fn delete(&mut self, index: usize) -> bool {
        if index >= self.keyframes.len() {
            return false;
        }
        self.keyframes.remove(index);
        if self.keyframes.is_empty() {
            self.active_index = 0;
        } else {
            if index < self.active_index {
                self.active_index -= 1;
            }
            self.active_index = self.active_index.min(self.keyframes.len() - 1);
        }
        true
    }

    /// Resolve every keyframe and build a fresh sampler. Call after any
    /// mutation; the previous sampler is stale from that point on.
    pub fn rebuild(&self, ctx: &PrecisionContext) -> Result<PathSampler, KeyframeError> {
        let cameras = self
            .keyframes
            .iter()
            .map(|spec| resolve_keyframe(spec, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PathSampler::build(&cameras, *ctx))
    }

    /// The current path as a `paths.json`-shaped document.
    pub fn to_json(&self) -> String {
        let file = PathFile {
            path: self.spec(),
        };
        serde_json::to_string_pretty(&file).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn spec(&self) -> PathSpec {
        PathSpec {
            keyframes: self
                .keyframes
                .iter()
                .cloned()
                .map(|camera| KeyframeSpec { camera })
                .collect(),
        }
    }
}

fn camera_to_spec(camera: &Camera) -> CameraSpec {
    CameraSpec {
        global_level: Some(camera.global_level),
        x: Some(NumOrText::Text(camera.pos.x.to_plain_string())),
        y: Some(NumOrText::Text(camera.pos.y.to_plain_string())),
        rotation: Some(camera.rotation),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::PathEditor;
    use crate::camera::Camera;
    use formats::{CameraSpec, KeyframeSpec, NumOrText, PathFile, PathSpec};
    use foundation::{BigDec, GlobalPos, PrecisionContext};

    fn spec_with(levels: &[f64]) -> PathSpec {
        PathSpec {
            keyframes: levels
                .iter()
                .map(|&gl| KeyframeSpec {
                    camera: CameraSpec {
                        global_level: Some(gl),
                        x: Some(NumOrText::Num(0.5)),
                        y: Some(NumOrText::Num(0.5 + gl / 100.0)),
                        ..Default::default()
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn jump_resolves_exact_keyframe() {
        let mut ed = PathEditor::new(spec_with(&[0.0, 10.0, 20.0]));
        let ctx = PrecisionContext::new();
        let cam = ed.jump_to(1, &ctx).unwrap().unwrap();
        assert_eq!(cam.global_level, 10.0);
        assert_eq!(ed.active_index(), 1);
        assert!(ed.jump_to(99, &ctx).unwrap().is_none());
        assert_eq!(ed.active_index(), 1);
    }

    #[test]
    fn insert_preserves_deep_position_digits() {
        let mut ed = PathEditor::new(spec_with(&[0.0]));
        let deep = "0.500000000000000000000000000000000000000000000123";
        let cam = Camera {
            global_level: 155.0,
            pos: GlobalPos::new(BigDec::parse(deep).unwrap(), BigDec::parse("0.5").unwrap()),
            rotation: 0.0,
        };
        ed.insert_after_active(&cam);
        assert_eq!(ed.len(), 2);
        assert_eq!(ed.active_index(), 1);
        let json = ed.to_json();
        assert!(json.contains(deep));

        // The inserted keyframe round-trips through serde intact.
        let reparsed: PathFile = serde_json::from_str(&json).unwrap();
        let x = reparsed.path.keyframes[1].camera.x.as_ref().unwrap();
        assert_eq!(x.as_decimal_string(), deep);
    }

    #[test]
    fn delete_adjusts_active_index() {
        let mut ed = PathEditor::new(spec_with(&[0.0, 1.0, 2.0, 3.0]));
        let ctx = PrecisionContext::new();
        ed.jump_to(2, &ctx).unwrap();

        // Deleting before the active keyframe shifts it left.
        assert!(ed.delete(0));
        assert_eq!(ed.active_index(), 1);

        // Deleting the tail clamps the index.
        assert!(ed.delete(2));
        assert!(ed.delete(1));
        assert_eq!(ed.active_index(), 0);
        assert_eq!(ed.len(), 1);

        assert!(ed.delete(0));
        assert!(!ed.delete(0));
        assert_eq!(ed.len(), 0);
        assert_eq!(ed.active_index(), 0);
    }

    #[test]
    fn playability_tracks_keyframe_count() {
        let mut ed = PathEditor::new(spec_with(&[0.0, 5.0]));
        assert!(ed.is_playable());
        ed.delete(1);
        assert!(!ed.is_playable());

        let ctx = PrecisionContext::new();
        let sampler = ed.rebuild(&ctx).unwrap();
        assert!(!sampler.is_playable());
    }

    #[test]
    fn rebuild_produces_working_sampler() {
        let ed = PathEditor::new(spec_with(&[0.0, 8.0, 16.0]));
        let ctx = PrecisionContext::new();
        let sampler = ed.rebuild(&ctx).unwrap();
        assert!(sampler.is_playable());
        assert!(sampler.total_length() > 0.0);
        assert_eq!(sampler.stops().len(), 3);
        assert!(sampler.camera_at_progress(0.5).is_some());
    }
}

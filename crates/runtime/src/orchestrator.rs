//! Per-frame render orchestration.
//!
//! Each frame: refresh the viewport, prune and re-badge the request queue,
//! run the telemetry hook, advance playback, rotate the stack, compute the
//! three-layer target tile set, reconcile it against the live views, and
//! dispatch queued fetches. The loop never fails; every error becomes a state
//! transition on a tile view.

use std::collections::{BTreeMap, BTreeSet};

use camera::{Camera, PathSampler};
use foundation::TileCoord;
use scene::visible_tiles;
use streaming::{
    Dispatch, Lane, Outcome, RequestUrls, Scheduler, ScreenPlacement, ViewState,
};
use tracing::debug;

use crate::frame::Frame;
use crate::host::{ImageHandle, TileHost};
use crate::playback::Playback;
use crate::tile_view::{TileStyle, TileView};

/// Child layers below this opacity are skipped outright.
const CHILD_OPACITY_EPS: f64 = 0.001;

/// Slight overscale that closes sub-pixel seams between neighboring tiles.
const SEAM_OVERSCALE: f64 = 1.001;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub dataset_id: String,
    pub tile_size: u32,
    /// Base URL of the static tile store.
    pub tile_base_url: String,
    /// Base URL of the live-render backend.
    pub live_base_url: String,
    pub live_enabled: bool,
}

/// Snapshot handed to the external loop hook every frame.
#[derive(Debug, Clone)]
pub struct FrameState {
    pub frame: Frame,
    pub camera: Camera,
    pub active_tiles: usize,
    pub loaded_tiles: usize,
    pub queued: usize,
    pub playing: bool,
}

pub type LoopHook = Box<dyn FnMut(&FrameState, f64)>;

/// Result of a background fetch/decode, fed back into the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum TileFetchResult {
    Decoded(ImageHandle),
    DecodeFailed,
    Busy,
    Failed { status: Option<u16> },
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    pub camera: Camera,
    scheduler: Scheduler,
    sampler: Option<PathSampler>,
    playback: Playback,
    active: BTreeMap<TileCoord, TileView>,
    hook: Option<LoopHook>,
    frame: Option<Frame>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, scheduler: Scheduler) -> Self {
        Self {
            config,
            camera: Camera::home(),
            scheduler,
            sampler: None,
            playback: Playback::new(),
            active: BTreeMap::new(),
            hook: None,
            frame: None,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut Playback {
        &mut self.playback
    }

    pub fn set_sampler(&mut self, sampler: Option<PathSampler>) {
        self.sampler = sampler;
    }

    pub fn sampler(&self) -> Option<&PathSampler> {
        self.sampler.as_ref()
    }

    pub fn set_loop_hook(&mut self, hook: Option<LoopHook>) {
        self.hook = hook;
    }

    /// Begin playback as soon as every visible tile has loaded.
    pub fn request_autoplay(&mut self) {
        self.playback.autoplay_pending = true;
    }

    pub fn active_tile_count(&self) -> usize {
        self.active.len()
    }

    /// Read-only view of the live tile elements, for external scripting.
    pub fn active_elements(&self) -> impl Iterator<Item = (&TileCoord, crate::host::TileElem)> {
        self.active.iter().map(|(coord, view)| (coord, view.elem))
    }

    pub fn all_tiles_loaded(&self) -> bool {
        self.active.values().all(|v| v.loaded)
    }

    /// Jump to an exact keyframe camera and sync the timeline to its stop.
    pub fn jump_to_stop(&mut self, camera: Camera, keyframe_index: usize) {
        self.playback.pause();
        if let Some(sampler) = &self.sampler
            && let Some(&distance) = sampler.stops().get(keyframe_index)
        {
            self.playback.seek_to_distance(distance);
        }
        self.camera = camera;
    }

    /// Run one display frame. Returns the fetches to hand to the I/O layer.
    pub fn frame(&mut self, now_s: f64, host: &mut dyn TileHost) -> Vec<Dispatch> {
        let frame = match self.frame {
            Some(prev) => prev.next(now_s),
            None => Frame::first(now_s),
        };
        self.frame = Some(frame);
        let now_ms = now_s * 1000.0;

        // 1. Viewport.
        let (vw, vh) = host.viewport();

        // 2. Prune what scrolled away, then refresh queue badges.
        let evicted = self
            .scheduler
            .prune(&self.camera, vw, vh, self.config.tile_size);
        for coord in &evicted {
            if let Some(view) = self.active.get(coord) {
                host.set_badge(view.elem, None);
            }
        }
        for (coord, label) in self.scheduler.badges() {
            if let Some(view) = self.active.get(&coord) {
                host.set_badge(view.elem, Some(&label));
            }
        }

        // 3. External telemetry hook.
        if self.hook.is_some() {
            let state = FrameState {
                frame,
                camera: self.camera.clone(),
                active_tiles: self.active.len(),
                loaded_tiles: self.active.values().filter(|v| v.loaded).count(),
                queued: self.scheduler.queue_len(),
                playing: self.playback.playing,
            };
            if let Some(hook) = self.hook.as_mut() {
                hook(&state, now_s);
            }
        }

        // 4. Autoplay gate and playback advance.
        let playable = self.sampler.as_ref().is_some_and(|s| s.is_playable());
        if self.playback.autoplay_pending
            && playable
            && !self.active.is_empty()
            && self.all_tiles_loaded()
        {
            debug!("all tiles ready, starting autoplay");
            self.playback.start();
        }
        if self.playback.playing
            && let Some(sampler) = &self.sampler
        {
            let p = self.playback.advance(frame.dt_s, sampler.total_length());
            if let Some(cam) = sampler.camera_at_progress(p) {
                self.camera = cam;
            }
        }

        // 5. The stack container counter-rotates the camera.
        host.set_stack_rotation(-self.camera.rotation);

        // 6. Target tiles across the parent/base/child layer stack.
        let base = self.camera.base_level();
        let frac = self.camera.level_frac();
        let mut layers: Vec<(u32, f64)> = Vec::new();
        if base > 0 {
            layers.push((base - 1, 1.0));
        }
        layers.push((base, 1.0));
        if frac > CHILD_OPACITY_EPS {
            layers.push((base + 1, frac));
        }

        let tile_size = self.config.tile_size;
        let mut targets: Vec<(TileCoord, ScreenPlacement, TileStyle)> = Vec::new();
        for (level, opacity) in layers {
            let set = visible_tiles(&self.camera, level as i32, vw, vh, tile_size);
            let ds = (self.camera.global_level - level as f64)
                .clamp(-1020.0, 1020.0)
                .exp2();
            let tile_px = tile_size.max(1) as f64 * ds;
            for t in set.tiles {
                // Static-lane manifest gate: unroutable tiles are skipped
                // entirely rather than requested into nowhere.
                if self.scheduler.route(&t.coord).is_none() {
                    continue;
                }
                targets.push((
                    t.coord,
                    ScreenPlacement {
                        rel_x: t.rel_x,
                        rel_y: t.rel_y,
                    },
                    TileStyle {
                        tx: vw * 0.5 + t.rel_x * tile_px,
                        ty: vh * 0.5 + t.rel_y * tile_px,
                        scale: ds * SEAM_OVERSCALE,
                        opacity,
                        z: level as i32,
                    },
                ));
            }
        }

        // 7. Reconcile.
        let target_keys: BTreeSet<TileCoord> =
            targets.iter().map(|(c, _, _)| c.clone()).collect();
        let stale: Vec<TileCoord> = self
            .active
            .keys()
            .filter(|c| !target_keys.contains(*c))
            .cloned()
            .collect();
        for coord in stale {
            if let Some(view) = self.active.remove(&coord) {
                host.remove_tile(view.elem);
            }
        }

        self.scheduler.record_view(ViewState {
            camera_level: self.camera.global_level,
            view_w: vw,
            view_h: vh,
            tile_size,
        });

        let mut fresh: Vec<crate::host::TileElem> = Vec::new();
        for (coord, placement, style) in targets {
            if !self.active.contains_key(&coord) {
                let elem = host.create_tile(&coord);
                fresh.push(elem);
                let urls = urls_for(&self.config, &coord);
                self.scheduler.request(coord.clone(), placement, &urls);
                self.active
                    .insert(coord.clone(), TileView::new(coord.clone(), elem));
            }
            let Some(view) = self.active.get_mut(&coord) else {
                continue;
            };
            view.apply_style(host, style);
        }

        // 8. One host append for everything new this frame.
        host.append_batch(&fresh);

        // 9. Dispatch within lane limits; live fetches mark their tiles.
        let dispatches = self.scheduler.process(now_ms);
        for d in &dispatches {
            if d.lane == Lane::Live
                && let Some(view) = self.active.get(&d.coord)
            {
                host.set_rendering(view.elem, true);
            }
        }
        dispatches
    }

    /// Ingest a background fetch result. Results for tiles that are no longer
    /// active are dropped; this is the cancellation path for in-flight work.
    pub fn apply_completion(
        &mut self,
        coord: &TileCoord,
        result: TileFetchResult,
        now_s: f64,
        host: &mut dyn TileHost,
    ) {
        let outcome = match &result {
            TileFetchResult::Decoded(_) => Outcome::Loaded,
            TileFetchResult::DecodeFailed => Outcome::DecodeFailed,
            TileFetchResult::Busy => Outcome::Busy,
            TileFetchResult::Failed { status } => Outcome::Failed { status: *status },
        };
        self.scheduler.complete(coord, outcome, now_s * 1000.0);

        let Some(view) = self.active.get_mut(coord) else {
            debug!(key = %coord, "dropping completion for inactive tile");
            return;
        };
        match result {
            TileFetchResult::Decoded(image) => {
                view.image = Some(image);
                view.loaded = true;
                host.attach_image(view.elem, image);
                host.set_rendering(view.elem, false);
                host.set_badge(view.elem, None);
            }
            TileFetchResult::DecodeFailed | TileFetchResult::Failed { .. } => {
                // Loaded-as-blank: the tile counts as processed so readiness
                // checks cannot stall on it.
                view.loaded = true;
                host.set_rendering(view.elem, false);
                host.set_badge(view.elem, None);
            }
            TileFetchResult::Busy => {
                // Retry is queued; the element stays visible as-is.
                host.set_rendering(view.elem, false);
            }
        }
    }
}

fn urls_for(config: &OrchestratorConfig, coord: &TileCoord) -> RequestUrls {
    RequestUrls {
        static_url: format!(
            "{}/datasets/{}/{}/{}/{}.webp",
            config.tile_base_url, config.dataset_id, coord.level, coord.x, coord.y
        ),
        live_url: format!(
            "{}/live/{}/{}/{}/{}.webp",
            config.live_base_url, config.dataset_id, coord.level, coord.x, coord.y
        ),
    }
}

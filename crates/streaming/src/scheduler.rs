//! Two-lane prioritized tile request scheduler.
//!
//! The scheduler is a synchronous state machine: `request` enqueues, `prune`
//! drops what scrolled away, `process` emits dispatch commands up to each
//! lane's concurrency limit, and the I/O layer reports back through
//! `complete`. Ordering is deterministic: every sort ends in a total
//! tie-break on the tile coordinate.

use std::collections::BTreeMap;

use camera::Camera;
use formats::TileManifest;
use foundation::{Aabb2, TileCoord};
use scene::visible_tiles;
use tracing::debug;

use crate::request::{
    Dispatch, Lane, LaneOptions, Outcome, RequestStatus, RequestUrls, ScreenPlacement, TileRequest,
};

pub const STATIC_LANE_LIMIT: usize = 6;
pub const LIVE_LANE_LIMIT: usize = 1;
pub const DEFAULT_RETRY_DELAY_MS: f64 = 200.0;

/// Queued levels farther than this from the camera's base level are evicted
/// wholesale during a prune.
const PRUNE_LEVEL_BAND: i32 = 2;

/// Queue positions beyond this badge as "#10+".
const BADGE_CAP: usize = 10;

/// Camera/viewport snapshot the priority sort measures against.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewState {
    pub camera_level: f64,
    pub view_w: f64,
    pub view_h: f64,
    pub tile_size: u32,
}

/// What `complete` did with the slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Done,
    Retrying { ready_at_ms: f64 },
}

#[derive(Debug)]
pub struct Scheduler {
    queue: Vec<TileRequest>,
    active: BTreeMap<TileCoord, TileRequest>,
    manifest: TileManifest,
    live_enabled: bool,
    view: Option<ViewState>,
    active_static: usize,
    active_live: usize,
    retry_delay_ms: f64,
}

impl Scheduler {
    pub fn new(manifest: TileManifest, live_enabled: bool) -> Self {
        Self {
            queue: Vec::new(),
            active: BTreeMap::new(),
            manifest,
            live_enabled,
            view: None,
            active_static: 0,
            active_live: 0,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }

    pub fn manifest(&self) -> &TileManifest {
        &self.manifest
    }

    pub fn live_enabled(&self) -> bool {
        self.live_enabled
    }

    pub fn set_live_enabled(&mut self, enabled: bool) {
        self.live_enabled = enabled;
    }

    pub fn set_retry_delay_ms(&mut self, ms: f64) {
        self.retry_delay_ms = ms.max(0.0);
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn active_count(&self, lane: Lane) -> usize {
        match lane {
            Lane::Static => self.active_static,
            Lane::Live => self.active_live,
        }
    }

    pub fn is_pending(&self, coord: &TileCoord) -> bool {
        self.active.contains_key(coord) || self.queue.iter().any(|r| &r.coord == coord)
    }

    /// Lane a fresh request for `coord` would take; `None` when the tile is
    /// not in the manifest and live rendering is off.
    pub fn route(&self, coord: &TileCoord) -> Option<Lane> {
        if self.manifest.contains(&coord.key()) {
            Some(Lane::Static)
        } else if self.live_enabled {
            Some(Lane::Live)
        } else {
            None
        }
    }

    /// Record the camera/viewport the next priority sort measures against.
    pub fn record_view(&mut self, view: ViewState) {
        self.view = Some(view);
        self.sort_queue();
    }

    /// Enqueue a tile, or merge into an existing entry for the same tile.
    /// Returns the lane taken, `None` if the request was not routable.
    pub fn request(
        &mut self,
        coord: TileCoord,
        placement: ScreenPlacement,
        urls: &RequestUrls,
    ) -> Option<Lane> {
        let lane = self.route(&coord)?;
        let options = match lane {
            Lane::Static => LaneOptions::Static {
                url: urls.static_url.clone(),
            },
            Lane::Live => LaneOptions::Live {
                url: urls.live_url.clone(),
                retry_delay_ms: self.retry_delay_ms,
            },
        };

        if let Some(entry) = self.active.get_mut(&coord) {
            // Already in flight: rebind the options if the lane matches and
            // let the pending completion land.
            if entry.options.lane() == lane {
                entry.options = options;
                entry.placement = placement;
            }
            return Some(entry.options.lane());
        }

        if let Some(entry) = self.queue.iter_mut().find(|r| r.coord == coord) {
            entry.options = options;
            entry.placement = placement;
            return Some(lane);
        }

        self.queue.push(TileRequest {
            coord,
            options,
            placement,
            status: RequestStatus::Queued,
            boosted: false,
            ready_at_ms: 0.0,
            attempts: 0,
        });
        self.sort_queue();
        Some(lane)
    }

    /// Evict queued tiles no longer visible for the given camera/viewport.
    /// Returns the evicted coordinates so the host can clear their badges.
    pub fn prune(
        &mut self,
        camera: &Camera,
        view_w: f64,
        view_h: f64,
        tile_size: u32,
    ) -> Vec<TileCoord> {
        if self.queue.is_empty() {
            return Vec::new();
        }
        let base = camera.base_level() as i32;

        let mut levels: Vec<u32> = self.queue.iter().map(|r| r.coord.level).collect();
        levels.sort_unstable();
        levels.dedup();

        // One selector pass per level still queued and in band.
        let mut valid: BTreeMap<u32, Vec<TileCoord>> = BTreeMap::new();
        for level in levels {
            if (level as i32 - base).abs() <= PRUNE_LEVEL_BAND {
                let set = visible_tiles(camera, level as i32, view_w, view_h, tile_size);
                valid.insert(level, set.tiles.into_iter().map(|t| t.coord).collect());
            }
        }

        let mut evicted = Vec::new();
        self.queue.retain(|r| {
            let keep = valid
                .get(&r.coord.level)
                .map(|coords| coords.contains(&r.coord))
                .unwrap_or(false);
            if !keep {
                evicted.push(r.coord.clone());
            }
            keep
        });
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "pruned off-screen tile requests");
        }
        evicted
    }

    /// Dispatch queued work up to each lane's free slots. Entries inside a
    /// retry holdoff stay queued without blocking others in their lane.
    pub fn process(&mut self, now_ms: f64) -> Vec<Dispatch> {
        self.sort_queue();

        let mut static_free = STATIC_LANE_LIMIT.saturating_sub(self.active_static);
        let mut live_free = LIVE_LANE_LIMIT.saturating_sub(self.active_live);

        let mut dispatches = Vec::new();
        let mut picked: Vec<usize> = Vec::new();
        for (i, entry) in self.queue.iter().enumerate() {
            if entry.ready_at_ms > now_ms {
                continue;
            }
            match entry.options.lane() {
                Lane::Static if static_free > 0 => {
                    static_free -= 1;
                    picked.push(i);
                }
                Lane::Live if live_free > 0 => {
                    live_free -= 1;
                    picked.push(i);
                }
                _ => {}
            }
        }

        for i in picked.into_iter().rev() {
            let mut entry = self.queue.remove(i);
            entry.status = RequestStatus::Dispatched;
            entry.attempts += 1;
            match entry.options.lane() {
                Lane::Static => self.active_static += 1,
                Lane::Live => self.active_live += 1,
            }
            dispatches.push(Dispatch {
                coord: entry.coord.clone(),
                lane: entry.options.lane(),
                url: entry.options.url().to_string(),
            });
            self.active.insert(entry.coord.clone(), entry);
        }
        // The reverse removal inverted priority order; restore it.
        dispatches.reverse();

        debug_assert!(self.active_static <= STATIC_LANE_LIMIT);
        debug_assert!(self.active_live <= LIVE_LANE_LIMIT);
        dispatches
    }

    /// Report a dispatched request's outcome, freeing its lane slot.
    ///
    /// Unknown coordinates are ignored (the request was pruned or superseded).
    pub fn complete(
        &mut self,
        coord: &TileCoord,
        outcome: Outcome,
        now_ms: f64,
    ) -> Option<Completion> {
        let mut entry = self.active.remove(coord)?;
        match entry.options.lane() {
            Lane::Static => self.active_static = self.active_static.saturating_sub(1),
            Lane::Live => self.active_live = self.active_live.saturating_sub(1),
        }

        match outcome {
            Outcome::Busy => {
                // Transient: back to the head of the queue after the holdoff,
                // options preserved.
                let delay = match &entry.options {
                    LaneOptions::Live { retry_delay_ms, .. } => *retry_delay_ms,
                    LaneOptions::Static { .. } => self.retry_delay_ms,
                };
                entry.status = RequestStatus::Queued;
                entry.boosted = true;
                entry.ready_at_ms = now_ms + delay;
                let ready_at_ms = entry.ready_at_ms;
                self.queue.push(entry);
                self.sort_queue();
                Some(Completion::Retrying { ready_at_ms })
            }
            Outcome::Loaded => {
                if entry.options.lane() == Lane::Live {
                    // Admit the rendered tile so the next visit is static.
                    self.manifest.insert(coord.key());
                }
                Some(Completion::Done)
            }
            Outcome::DecodeFailed | Outcome::Failed { .. } => Some(Completion::Done),
        }
    }

    /// Queue-position badges for live-lane entries, `#1`..`#10` then `#10+`.
    pub fn badges(&self) -> Vec<(TileCoord, String)> {
        self.queue
            .iter()
            .filter(|r| r.options.lane() == Lane::Live)
            .enumerate()
            .map(|(i, r)| {
                let label = if i < BADGE_CAP {
                    format!("#{}", i + 1)
                } else {
                    format!("#{BADGE_CAP}+")
                };
                (r.coord.clone(), label)
            })
            .collect()
    }

    fn sort_queue(&mut self) {
        let view = self.view;
        self.queue.sort_by(|a, b| {
            b.boosted
                .cmp(&a.boosted)
                .then_with(|| {
                    let (area_a, dist_a) = priority_metrics(a, view);
                    let (area_b, dist_b) = priority_metrics(b, view);
                    area_b
                        .total_cmp(&area_a)
                        .then_with(|| dist_a.total_cmp(&dist_b))
                })
                .then_with(|| a.coord.cmp(&b.coord))
        });
    }
}

/// `(visible area, squared center distance)` of a queued tile on screen.
fn priority_metrics(req: &TileRequest, view: Option<ViewState>) -> (f64, f64) {
    let Some(view) = view else {
        return (0.0, 0.0);
    };
    let level_diff = view.camera_level - req.coord.level as f64;
    let tile_px = view.tile_size.max(1) as f64 * level_diff.clamp(-1020.0, 1020.0).exp2();
    let origin = [
        view.view_w * 0.5 + req.placement.rel_x * tile_px,
        view.view_h * 0.5 + req.placement.rel_y * tile_px,
    ];
    let tile = Aabb2::from_origin_size(origin, tile_px, tile_px);
    let viewport = Aabb2::new([0.0, 0.0], [view.view_w, view.view_h]);

    let area = tile.intersection_area(&viewport);
    let vc = viewport.center();
    let tc = tile.center();
    let dist2 = (tc[0] - vc[0]).powi(2) + (tc[1] - vc[1]).powi(2);
    (area, dist2)
}

#[cfg(test)]
mod tests {
    use super::{
        Completion, LIVE_LANE_LIMIT, STATIC_LANE_LIMIT, Scheduler, ViewState,
    };
    use crate::request::{Lane, Outcome, RequestUrls, ScreenPlacement};
    use camera::Camera;
    use formats::TileManifest;
    use foundation::TileCoord;
    use num_bigint::BigUint;

    fn coord(level: u32, x: u64, y: u64) -> TileCoord {
        TileCoord::new(level, BigUint::from(x), BigUint::from(y))
    }

    fn urls(c: &TileCoord) -> RequestUrls {
        RequestUrls {
            static_url: format!("/datasets/d/{}.webp", c.key()),
            live_url: format!("http://backend/live/d/{}.webp", c.key()),
        }
    }

    fn manifest_with(coords: &[&TileCoord]) -> TileManifest {
        TileManifest::from_keys(coords.iter().map(|c| c.key()))
    }

    fn placement(rel_x: f64, rel_y: f64) -> ScreenPlacement {
        ScreenPlacement { rel_x, rel_y }
    }

    fn view(level: f64) -> ViewState {
        ViewState {
            camera_level: level,
            view_w: 800.0,
            view_h: 600.0,
            tile_size: 256,
        }
    }

    #[test]
    fn duplicate_requests_dispatch_once() {
        let c = coord(3, 1, 2);
        let mut s = Scheduler::new(manifest_with(&[&c]), false);
        s.record_view(view(3.0));
        assert_eq!(s.request(c.clone(), placement(0.0, 0.0), &urls(&c)), Some(Lane::Static));
        assert_eq!(s.request(c.clone(), placement(0.1, 0.0), &urls(&c)), Some(Lane::Static));
        assert_eq!(s.queue_len(), 1);

        let dispatches = s.process(0.0);
        assert_eq!(dispatches.len(), 1);
        // Re-requesting an in-flight tile does not enqueue again.
        assert_eq!(s.request(c.clone(), placement(0.2, 0.0), &urls(&c)), Some(Lane::Static));
        assert!(s.process(0.0).is_empty());
    }

    #[test]
    fn lane_limits_hold() {
        let mut coords = Vec::new();
        for i in 0..12u64 {
            coords.push(coord(4, i, 0));
        }
        let refs: Vec<&TileCoord> = coords.iter().take(9).collect();
        // First nine are cached (static lane), the rest go live.
        let mut s = Scheduler::new(manifest_with(&refs), true);
        s.record_view(view(4.0));
        for c in &coords {
            s.request(c.clone(), placement(0.0, 0.0), &urls(c));
        }

        let dispatches = s.process(0.0);
        let statics = dispatches.iter().filter(|d| d.lane == Lane::Static).count();
        let lives = dispatches.iter().filter(|d| d.lane == Lane::Live).count();
        assert_eq!(statics, STATIC_LANE_LIMIT);
        assert_eq!(lives, LIVE_LANE_LIMIT);
        assert_eq!(s.active_count(Lane::Static), STATIC_LANE_LIMIT);
        assert_eq!(s.active_count(Lane::Live), LIVE_LANE_LIMIT);

        // Completing one static frees exactly one slot.
        let done = dispatches
            .iter()
            .find(|d| d.lane == Lane::Static)
            .unwrap()
            .coord
            .clone();
        s.complete(&done, Outcome::Loaded, 10.0);
        let next = s.process(10.0);
        assert_eq!(next.len(), 1);
        assert_eq!(s.active_count(Lane::Static), STATIC_LANE_LIMIT);
    }

    #[test]
    fn prune_drops_offscreen_tiles() {
        let visible = coord(2, 2, 2);
        let offscreen = coord(2, 0, 0);
        let far_level = coord(7, 0, 0);
        let mut s = Scheduler::new(
            manifest_with(&[&visible, &offscreen, &far_level]),
            false,
        );
        s.record_view(view(2.0));
        for c in [&visible, &offscreen, &far_level] {
            s.request(c.clone(), placement(0.0, 0.0), &urls(c));
        }
        assert_eq!(s.queue_len(), 3);

        // Camera over tile (2,2) at level 2 with a small viewport: tile (0,0)
        // and the far level are gone.
        let cam = Camera {
            global_level: 2.0,
            pos: foundation::GlobalPos::new(
                foundation::BigDec::parse("0.625").unwrap(),
                foundation::BigDec::parse("0.625").unwrap(),
            ),
            rotation: 0.0,
        };
        let evicted = s.prune(&cam, 256.0, 256.0, 256);
        assert_eq!(evicted.len(), 2);
        assert!(evicted.contains(&offscreen));
        assert!(evicted.contains(&far_level));
        assert_eq!(s.queue_len(), 1);
        assert!(s.is_pending(&visible));
    }

    #[test]
    fn busy_retries_at_the_head_after_holdoff() {
        let hot = coord(5, 1, 1);
        let other = coord(5, 2, 1);
        let mut s = Scheduler::new(TileManifest::new(), true);
        s.set_retry_delay_ms(200.0);
        s.record_view(view(5.0));
        s.request(hot.clone(), placement(0.0, 0.0), &urls(&hot));

        let d = s.process(1000.0);
        assert_eq!(d.len(), 1);
        let done = s.complete(&hot, Outcome::Busy, 1000.0);
        assert_eq!(done, Some(Completion::Retrying { ready_at_ms: 1200.0 }));

        // A competing live tile arrives; the retry still wins the head.
        s.request(other.clone(), placement(5.0, 5.0), &urls(&other));
        // Inside the holdoff nothing live dispatches from the retry, but the
        // slot is free for the competitor only if it outranks... it does not:
        // the boosted entry blocks nothing, the competitor dispatches.
        let badges = s.badges();
        assert_eq!(badges[0].0, hot);
        assert_eq!(badges[0].1, "#1");

        let d = s.process(1100.0);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].coord, other);
        s.complete(&other, Outcome::Failed { status: Some(500) }, 1150.0);

        // Past the holdoff the boosted entry dispatches, well inside 300ms.
        let d = s.process(1250.0);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].coord, hot);
        assert!(s.manifest().is_empty());

        // Success admits the key into the manifest.
        s.complete(&hot, Outcome::Loaded, 1300.0);
        assert!(s.manifest().contains(&hot.key()));
        assert_eq!(s.route(&hot), Some(Lane::Static));
    }

    #[test]
    fn static_gate_rejects_unknown_tiles_when_live_disabled() {
        let c = coord(6, 3, 3);
        let mut s = Scheduler::new(TileManifest::new(), false);
        assert_eq!(s.route(&c), None);
        assert_eq!(s.request(c.clone(), placement(0.0, 0.0), &urls(&c)), None);
        assert_eq!(s.queue_len(), 0);
    }

    #[test]
    fn priority_prefers_large_then_central() {
        let center = coord(4, 7, 7);
        let edge = coord(4, 9, 7);
        let offscreen = coord(4, 12, 7);
        let mut s = Scheduler::new(manifest_with(&[&center, &edge, &offscreen]), false);
        // Insertion order is worst-first; the sort must not care.
        s.request(offscreen.clone(), placement(6.0, 0.0), &urls(&offscreen));
        s.request(edge.clone(), placement(1.0, -0.5), &urls(&edge));
        s.request(center.clone(), placement(-0.5, -0.5), &urls(&center));
        s.record_view(view(4.0));

        let d = s.process(0.0);
        assert_eq!(d.len(), 3);
        assert_eq!(d[0].coord, center);
        assert_eq!(d[1].coord, edge);
        assert_eq!(d[2].coord, offscreen);
    }

    #[test]
    fn live_badges_label_queue_positions() {
        let mut s = Scheduler::new(TileManifest::new(), true);
        s.record_view(view(3.0));
        let mut coords = Vec::new();
        for i in 0..12u64 {
            let c = coord(3, i % 8, i / 8);
            // Increasing distance from center so order is predictable.
            s.request(c.clone(), placement(i as f64 * 0.5, 0.0), &urls(&c));
            coords.push(c);
        }
        let badges = s.badges();
        assert_eq!(badges.len(), 12);
        assert_eq!(badges[0].1, "#1");
        assert_eq!(badges[9].1, "#10");
        assert_eq!(badges[10].1, "#10+");
        assert_eq!(badges[11].1, "#10+");
    }

    #[test]
    fn completion_for_pruned_tile_is_ignored() {
        let c = coord(2, 1, 1);
        let mut s = Scheduler::new(manifest_with(&[&c]), false);
        assert_eq!(s.complete(&c, Outcome::Loaded, 0.0), None);
    }
}

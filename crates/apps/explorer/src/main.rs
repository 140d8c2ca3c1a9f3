//! Headless viewer driver.
//!
//! Loads a dataset, wires the engine together, and runs the frame loop
//! without a UI: tile elements live in a recording host and "decoding" just
//! mints handles. Useful for smoke-testing datasets, paths, and backends end
//! to end.

use std::time::Duration;

use camera::PathEditor;
use clap::Parser;
use formats::PathSpec;
use foundation::PrecisionContext;
use net::{FetchPayload, FetchPool, Fetcher, LiveClient, spawn_status_poller};
use runtime::{HeadlessHost, ImageHandle, Orchestrator, OrchestratorConfig, TileFetchResult};
use streaming::Scheduler;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Headless deep-zoom tile engine driver")]
struct Args {
    /// Base URL of the static tile store.
    #[arg(long, default_value = "http://localhost:8000")]
    base_url: String,

    /// Dataset id; defaults to the first entry in the index.
    #[arg(long)]
    dataset: Option<String>,

    /// Live-render backend base URL; enables the live lane.
    #[arg(long)]
    live_backend: Option<String>,

    /// Start path playback once every visible tile has loaded.
    #[arg(long)]
    autoplay: bool,

    /// Number of frames to run.
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Frame cadence.
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    #[arg(long, default_value_t = 1920.0)]
    view_width: f64,

    #[arg(long, default_value_t = 1080.0)]
    view_height: f64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if let Err(err) = run(args).await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = Fetcher::new(&args.base_url);

    let index = fetcher.dataset_index().await?;
    let dataset_id = match args.dataset {
        Some(id) => id,
        None => index
            .datasets
            .first()
            .map(|d| d.id.clone())
            .ok_or("dataset index is empty")?,
    };
    info!(%dataset_id, "loading dataset");

    let config = fetcher.dataset_config(&dataset_id).await?;
    let manifest = fetcher.tile_manifest(&dataset_id).await?;
    info!(tiles = manifest.len(), tile_size = config.tile_size, "dataset ready");

    // Prefer a standalone paths.json, fall back to the embedded path.
    let path_spec: Option<PathSpec> = match fetcher.path_file(&dataset_id).await? {
        Some(file) => Some(file.path),
        None => config.render_config.as_ref().and_then(|rc| rc.path.clone()),
    };

    let mut ctx = PrecisionContext::for_max_level(
        config
            .render_config
            .as_ref()
            .and_then(|rc| rc.max_level)
            .unwrap_or(50.0),
    );
    if let Some(spec) = &path_spec {
        ctx.raise_for_level(deepest_keyframe_level(spec));
    }

    let live_enabled = args.live_backend.is_some();
    let live_base = args
        .live_backend
        .clone()
        .unwrap_or_else(|| "http://localhost:8600".to_string());

    let scheduler = Scheduler::new(manifest, live_enabled);
    let mut orch = Orchestrator::new(
        OrchestratorConfig {
            dataset_id: dataset_id.clone(),
            tile_size: config.tile_size,
            tile_base_url: args.base_url.clone(),
            live_base_url: live_base.clone(),
            live_enabled,
        },
        scheduler,
    );

    if let Some(spec) = path_spec {
        let editor = PathEditor::new(spec);
        match editor.rebuild(&ctx) {
            Ok(sampler) => {
                info!(
                    keyframes = editor.len(),
                    total_length = sampler.total_length(),
                    playable = sampler.is_playable(),
                    "path loaded"
                );
                orch.set_sampler(Some(sampler));
            }
            Err(e) => warn!(error = %e, "path rejected, continuing without playback"),
        }
    }
    if args.autoplay {
        orch.request_autoplay();
    }

    let live_client = LiveClient::new(&live_base);
    let mut status_rx = None;
    if live_enabled {
        let (rx, _handle) = spawn_status_poller(live_client.clone());
        status_rx = Some(rx);
    }

    let (pool, mut completions) = FetchPool::new(fetcher.clone(), live_client, &dataset_id);
    let mut host = HeadlessHost::new(args.view_width, args.view_height);
    let frame_dt = 1.0 / args.fps.max(1.0);
    let mut next_image: ImageHandle = 1;

    for i in 0..args.frames {
        let now_s = i as f64 * frame_dt;

        while let Ok(done) = completions.try_recv() {
            let result = match done.payload {
                FetchPayload::Bytes(bytes) if !bytes.is_empty() => {
                    // Decoding is the host's concern; here it just mints a
                    // handle per payload.
                    let handle = next_image;
                    next_image += 1;
                    TileFetchResult::Decoded(handle)
                }
                FetchPayload::Bytes(_) => TileFetchResult::DecodeFailed,
                FetchPayload::Busy => TileFetchResult::Busy,
                FetchPayload::Failed { status } => TileFetchResult::Failed { status },
            };
            orch.apply_completion(&done.coord, result, now_s, &mut host);
        }

        let dispatches = orch.frame(now_s, &mut host);
        for d in dispatches {
            pool.execute(d);
        }

        if i % 60 == 0 {
            let backend = status_rx
                .as_ref()
                .and_then(|rx| rx.borrow().clone())
                .map(|s| format!("up={} renders={}", s.up, s.active_renders))
                .unwrap_or_else(|| "n/a".to_string());
            info!(
                frame = i,
                level = orch.camera.global_level,
                active = orch.active_tile_count(),
                queued = orch.scheduler().queue_len(),
                playing = orch.playback().playing,
                backend = %backend,
                "frame"
            );
        }
        host.clear_ops();

        tokio::time::sleep(Duration::from_secs_f64(frame_dt)).await;
    }

    info!(
        active = orch.active_tile_count(),
        loaded = orch.all_tiles_loaded(),
        "run complete"
    );
    Ok(())
}

fn deepest_keyframe_level(spec: &PathSpec) -> f64 {
    spec.keyframes
        .iter()
        .map(|k| {
            k.camera
                .global_level
                .or(k.camera.level)
                .unwrap_or(0.0)
                .max(0.0)
        })
        .fold(0.0, f64::max)
}

use soundsync::cli::{Args, DuplicateOp, MoveOp, ScaleOp};
use soundsync::config;
use soundsync::core::{CompositionStore, Editor, EventBus, HostClient, OfflineHost};
use soundsync::entities::DragEdge;
use soundsync::timeline::timeline_events::*;
use soundsync::timeline::DragMode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};

fn lock(editor: &Arc<Mutex<Editor>>) -> std::sync::MutexGuard<'_, Editor> {
    editor.lock().unwrap_or_else(|e| e.into_inner())
}

/// Press at `x` on a layer, drag `beats` cells and release, the same way
/// the timeline view would deliver pointer events.
fn scripted_drag(bus: &EventBus, editor: &Arc<Mutex<Editor>>, layer_index: u32, edge: DragEdge, beats: i64) -> bool {
    let target = {
        let ed = lock(editor);
        let store = ed.store();
        store
            .layers()
            .position(|g| g.index == layer_index)
            .and_then(|row| store.layer_at_row(row).map(|g| (row, g.bounds_px())))
            .map(|(row, (left, right))| {
                let x = match edge {
                    DragEdge::Start => left,
                    DragEdge::End => right,
                    DragEdge::Both => (left + right) / 2.0,
                };
                (row, x, store.grid().beat_width_px)
            })
    };
    let Some((row, x, beat_width)) = target else {
        warn!("Layer {} is not on the timeline", layer_index);
        return false;
    };

    let to = x + beats as f64 * beat_width;
    debug!("Scripted drag: layer {} row {} {:?} {:.1} -> {:.1}", layer_index, row, edge, x, to);
    bus.emit(PointerPressedEvent { x, row });
    bus.emit(PointerMovedEvent { x: to });
    bus.emit(PointerReleasedEvent { x: to });
    lock(editor).wait_idle();
    true
}

fn run_moves(bus: &EventBus, editor: &Arc<Mutex<Editor>>, moves: &[MoveOp]) {
    if moves.is_empty() {
        return;
    }
    bus.emit(DragModeChangedEvent(DragMode::Move));
    for op in moves {
        scripted_drag(bus, editor, op.layer_index, DragEdge::Both, op.beats);
    }
}

fn run_scales(bus: &EventBus, editor: &Arc<Mutex<Editor>>, scales: &[ScaleOp]) {
    if scales.is_empty() {
        return;
    }
    bus.emit(DragModeChangedEvent(DragMode::Scale));
    for op in scales {
        scripted_drag(bus, editor, op.layer_index, op.edge, op.beats);
    }
}

fn run_duplicates(bus: &EventBus, editor: &Arc<Mutex<Editor>>, duplicates: &[DuplicateOp]) {
    for op in duplicates {
        bus.emit(DuplicateLayerEvent {
            layer_index: op.layer_index,
            count: op.count,
            mode: op.mode,
        });
        lock(editor).wait_idle();
    }
}

fn print_timeline(store: &CompositionStore) {
    let comp = store.snapshot();
    let grid = store.grid();
    println!(
        "{} | {:.3}s | {} beats, {} bars | {:.2}px/beat",
        if comp.name.is_empty() { "(unnamed)" } else { comp.name.as_str() },
        comp.duration,
        grid.total_beats,
        grid.total_bars,
        grid.beat_width_px
    );
    println!(
        "{:>5}  {:<20} {:>9} {:>9} {:>6} {:>6} {:>7}",
        "index", "name", "in", "out", "start", "end", "scale"
    );
    for g in store.layers() {
        let name = store.record(g.index).map(|r| r.name.as_str()).unwrap_or("");
        println!(
            "{:>5}  {:<20} {:>9.3} {:>9.3} {:>6} {:>6} {:>7.3}",
            g.index, name, g.in_point, g.out_point, g.grid_start, g.grid_end, g.visual_scale_x
        );
    }
}

fn main() -> Result<()> {
    // Parse command-line arguments first (needed for log setup)
    let args = Args::parse();

    // Create path configuration from CLI args and environment
    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());

    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    // Determine log level based on verbosity flags
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, &path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging with specified verbosity level (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }

    info!("SoundSync timeline starting...");
    debug!("Command-line args: {:?}", args);
    info!("Config path: {}", config::config_file(config::SETTINGS_FILE, &path_config).display());

    // Saved settings, then command-line overrides
    let mut settings = config::load_settings(&path_config);
    if let Some(bpm) = args.bpm {
        settings.set_bpm(bpm);
    }
    if let Some(bpb) = args.beats_per_bar {
        settings.set_beats_per_bar(bpb);
    }
    if let Some(width) = args.width.filter(|w| w.is_finite() && *w > 0.0) {
        settings.base_width_px = width;
    }
    match args.zoom {
        Some(steps) if steps > 0 => (0..steps).for_each(|_| settings.zoom_in()),
        Some(steps) if steps < 0 => (steps..0).for_each(|_| settings.zoom_out()),
        _ => {}
    }
    if args.snap {
        settings.snap_enabled = true;
    }

    // Offline host stands in for the authoring application
    let host = match &args.comp_path {
        Some(path) => {
            let mut staging = CompositionStore::default();
            staging.import_from_file(path)?;
            info!("Input composition: {}", path.display());
            OfflineHost::new(staging.snapshot().clone())
        }
        None => {
            info!("No composition given, host has nothing open");
            OfflineHost::empty()
        }
    };

    let editor = Arc::new(Mutex::new(Editor::new(HostClient::new(Arc::new(host)), settings)));
    let bus = EventBus::new();
    let subscriptions = Editor::bind(&editor, &bus);

    bus.emit(FocusGainedEvent);
    lock(&editor).wait_idle();

    run_moves(&bus, &editor, &args.moves);
    run_scales(&bus, &editor, &args.scales);
    run_duplicates(&bus, &editor, &args.duplicates);

    if let Some(path) = &args.export {
        bus.emit(ExportCompositionEvent(path.clone()));
    }

    let mut ed = lock(&editor);
    print_timeline(ed.store());
    let notices = ed.take_notices();
    for notice in &notices {
        eprintln!("Warning: {}", notice);
    }

    if args.save_settings {
        config::save_settings(ed.settings(), &path_config)?;
    }
    drop(ed);
    drop(subscriptions);

    Ok(())
}

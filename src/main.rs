#![forbid(unsafe_code)]

use clap::Parser;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Registry, fmt, reload};

use hyprland_quantum_state::constants::config::env;
use hyprland_quantum_state::constants::paths::ARTIFACT_PREFIX;
use hyprland_quantum_state::events::DesktopEvent;
use hyprland_quantum_state::manager::StateManager;
use hyprland_quantum_state::snapshot::{Snapshot, Window};

/// Capture, validate and restore Hyprland desktop state
#[derive(Parser, Debug)]
#[command(name = "quantum-state-manager", version)]
struct Args {
    /// Capture the current desktop state
    #[arg(long)]
    capture: bool,

    /// Save the captured state (with --capture)
    #[arg(long)]
    save: bool,

    /// Load the latest compatible state
    #[arg(long)]
    load: bool,

    /// Check the loaded state against the live desktop and print a restore plan (with --load)
    #[arg(long)]
    restore: bool,

    /// Run the auto-save daemon until interrupted
    #[arg(long)]
    auto_save: bool,

    /// Validate the latest compatible state
    #[arg(long)]
    validate: bool,

    /// Migrate a legacy state file, or every legacy file in a directory
    #[arg(long, value_name = "PATH")]
    migrate_legacy: Option<PathBuf>,

    /// Session directory (default: ~/.config/hyprland-session-manager)
    #[arg(long, value_name = "DIR")]
    session_dir: Option<PathBuf>,
}

type LevelHandle = reload::Handle<LevelFilter, Registry>;

fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

fn init_logging() -> LevelHandle {
    let level = std::env::var(env::LOG_LEVEL)
        .or_else(|_| std::env::var(env::GENERIC_LOG_LEVEL))
        .map(|level| parse_level(&level))
        .unwrap_or(LevelFilter::INFO);
    let (filter, handle) = reload::Layer::new(level);
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
    handle
}

fn main() -> ExitCode {
    let handle = init_logging();
    let args = Args::parse();

    let manager = StateManager::new(args.session_dir.clone());
    let level = parse_level(&manager.settings().core.log_level);
    if let Err(e) = handle.modify(|filter| *filter = level) {
        warn!(error = %e, "Failed to apply configured log level");
    }
    info!(session_dir = %manager.session_dir().display(), "Quantum state manager starting");

    if args.capture && args.save {
        capture_and_save(&manager)
    } else if args.load && args.restore {
        restore(&manager)
    } else if args.auto_save {
        auto_save(&manager)
    } else if args.validate {
        validate(&manager)
    } else if let Some(path) = &args.migrate_legacy {
        migrate_legacy(&manager, path)
    } else {
        self_test(&manager)
    }
}

fn exit(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn capture_and_save(manager: &StateManager) -> ExitCode {
    println!("Capturing quantum state...");
    match manager.capture_and_save() {
        Ok(path) => {
            println!("Quantum state saved: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Failed to save quantum state");
            println!("Failed to save quantum state: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Latest compatible artifact, loaded; prints the failure and returns `None` otherwise
fn load_latest(manager: &StateManager) -> Option<Snapshot> {
    let Some(name) = manager.latest_compatible_state() else {
        println!("No compatible quantum state found");
        return None;
    };
    match manager.load_quantum_state(&name) {
        Ok(snapshot) => {
            println!("Loaded quantum state: {name}");
            Some(snapshot)
        }
        Err(e) => {
            error!(error = %e, name, "Failed to load quantum state");
            println!("Failed to load {name}: {e:#}");
            None
        }
    }
}

fn restore(manager: &StateManager) -> ExitCode {
    let Some(snapshot) = load_latest(manager) else {
        return ExitCode::FAILURE;
    };
    if !manager.validate_state_compatibility(&snapshot) {
        println!("Quantum state is not compatible with the current desktop");
        return ExitCode::FAILURE;
    }

    println!("Quantum state compatible, restore plan:");
    for (workspace, windows) in restore_plan(&snapshot) {
        println!("  workspace {workspace}:");
        for window in windows {
            println!("    {} {} ({})", window.address, window.class, window.title);
        }
    }
    ExitCode::SUCCESS
}

/// Windows grouped by workspace id
fn restore_plan(snapshot: &Snapshot) -> BTreeMap<i64, Vec<&Window>> {
    let mut plan: BTreeMap<i64, Vec<&Window>> = BTreeMap::new();
    for window in &snapshot.window_states {
        plan.entry(window.workspace.id).or_default().push(window);
    }
    plan
}

fn auto_save(manager: &StateManager) -> ExitCode {
    if let Err(e) = manager.start_auto_save(None) {
        error!(error = %e, "Failed to start auto-save");
        return ExitCode::FAILURE;
    }
    if !manager.is_auto_saving() {
        println!("Auto-save is disabled (core.auto_save_enabled = false)");
        return ExitCode::FAILURE;
    }
    manager.add_event_callback(Arc::new(|event: &DesktopEvent| -> anyhow::Result<()> {
        debug!(event = event.kind(), "Desktop changed");
        Ok(())
    }));
    if let Err(e) = manager.start_event_monitoring() {
        warn!(error = %e, "Event monitoring unavailable");
    }
    println!(
        "Auto-save running every {}s, interrupt to stop",
        manager.settings().core.auto_save_interval
    );

    wait_for_shutdown();
    manager.shutdown();
    println!("Auto-save stopped");
    ExitCode::SUCCESS
}

#[cfg(unix)]
fn wait_for_shutdown() {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "Received shutdown signal");
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to install signal handlers");
        }
    }
}

#[cfg(not(unix))]
fn wait_for_shutdown() {
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
}

fn validate(manager: &StateManager) -> ExitCode {
    let Some(snapshot) = load_latest(manager) else {
        return ExitCode::FAILURE;
    };
    let valid = manager.validate_state(&snapshot);
    println!("Checksum validation: {}", if valid { "PASSED" } else { "FAILED" });
    let compatible = manager.validate_state_compatibility(&snapshot);
    println!("Compatibility check: {}", if compatible { "PASSED" } else { "FAILED" });
    exit(valid && compatible)
}

/// Files in `dir` that look like legacy state rather than current artifacts
fn legacy_candidates(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            let legacy_ext = matches!(path.extension().and_then(|e| e.to_str()), Some("json" | "txt"));
            legacy_ext && !name.starts_with(ARTIFACT_PREFIX)
        })
        .collect();
    found.sort();
    found
}

fn migrate_legacy(manager: &StateManager, path: &Path) -> ExitCode {
    let sources = if path.is_dir() { legacy_candidates(path) } else { vec![path.to_path_buf()] };
    if sources.is_empty() {
        println!("No legacy state found in {}", path.display());
        return ExitCode::FAILURE;
    }

    let mut failed = 0;
    for source in &sources {
        let saved = manager
            .migrate_legacy_state(source)
            .and_then(|snapshot| manager.save_quantum_state(&snapshot, None));
        match saved {
            Ok(target) => println!("Migrated {} -> {}", source.display(), target.display()),
            Err(e) => {
                failed += 1;
                error!(source = %source.display(), error = %e, "Legacy migration failed");
                println!("Failed to migrate {}: {e:#}", source.display());
            }
        }
    }
    println!("Migrated {}/{} legacy states", sources.len() - failed, sources.len());
    exit(failed == 0)
}

/// capture, save, load, validate; one summary line for the lot
fn self_test(manager: &StateManager) -> ExitCode {
    println!("Running quantum state self-test...");
    let snapshot = manager.capture_quantum_state();
    println!(
        "Capture: {} monitors, {} workspaces, {} windows",
        snapshot.monitor_layouts.len(),
        snapshot.workspace_states.len(),
        snapshot.window_states.len()
    );

    let saved = manager.save_quantum_state(&snapshot, None);
    let loaded = match &saved {
        Ok(path) => {
            println!("Save: PASSED ({})", path.display());
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            manager.load_quantum_state(&name)
        }
        Err(e) => {
            println!("Save: FAILED ({e:#})");
            Err(anyhow::anyhow!("nothing saved"))
        }
    };
    let valid = match &loaded {
        Ok(loaded) => {
            println!("Load: PASSED");
            manager.validate_state(loaded)
        }
        Err(e) => {
            println!("Load: FAILED ({e:#})");
            false
        }
    };
    println!("Validate: {}", if valid { "PASSED" } else { "FAILED" });

    let passed = saved.is_ok() && loaded.is_ok() && valid;
    println!("Self-test {}", if passed { "PASSED" } else { "FAILED" });
    exit(passed)
}

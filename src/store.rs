//! Snapshot artifacts and their backups
//!
//! ```text
//! <session dir>/quantum-state/quantum_state_<session_id>.json
//! <session dir>/quantum-state/backups/backup_<artifact>_<unix millis>
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::config::settings::BackupSettings;
use crate::constants::paths::{ARTIFACT_EXTENSION, ARTIFACT_PREFIX, BACKUP_DIR, BACKUP_PREFIX, STATE_DIR};
use crate::snapshot::{Snapshot, validate};

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    state_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(session_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: session_dir.as_ref().join(STATE_DIR),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.state_dir.join(BACKUP_DIR)
    }

    /// `quantum_state_<session_id>.json`
    pub fn artifact_name(session_id: &str) -> String {
        format!("{ARTIFACT_PREFIX}{session_id}{ARTIFACT_EXTENSION}")
    }

    fn is_artifact_name(name: &str) -> bool {
        name.starts_with(ARTIFACT_PREFIX) && name.ends_with(ARTIFACT_EXTENSION)
    }

    /// Write the snapshot as pretty JSON, then back it up
    ///
    /// Snapshots are persisted as-is; integrity is checked on load. A failed
    /// backup is logged and never fails the save.
    pub fn save(&self, snapshot: &Snapshot, name: Option<&str>, backup: &BackupSettings) -> Result<PathBuf> {
        fs::create_dir_all(&self.state_dir)
            .with_context(|| format!("Failed to create state directory: {}", self.state_dir.display()))?;

        let name = name.map_or_else(|| Self::artifact_name(&snapshot.session_id), str::to_string);
        let path = self.state_dir.join(&name);
        let contents = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
        fs::write(&path, contents).with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
        info!(path = %path.display(), session_id = %snapshot.session_id, "Quantum state saved");

        if backup.backup_enabled && backup.backup_on_state_save {
            self.backup(&path);
            self.cleanup_backups(backup.max_backups);
        }
        Ok(path)
    }

    /// Read an artifact by name (or path)
    ///
    /// With `validate_checksums` a mismatch is logged; the snapshot is still
    /// returned.
    pub fn load(&self, name: &str, validate_checksums: bool) -> Result<Snapshot> {
        let path = self.state_dir.join(name);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed snapshot {}", path.display()))?;

        if validate_checksums && !validate(&snapshot) {
            warn!(path = %path.display(), "Loaded snapshot failed checksum validation");
        }
        info!(path = %path.display(), session_id = %snapshot.session_id, "Quantum state loaded");
        Ok(snapshot)
    }

    /// Copy `artifact` into the backup directory; `None` (and a warning) on failure
    pub fn backup(&self, artifact: &Path) -> Option<PathBuf> {
        match self.try_backup(artifact) {
            Ok(path) => {
                info!(path = %path.display(), "Backup created");
                Some(path)
            }
            Err(e) => {
                warn!(artifact = %artifact.display(), error = %e, "Failed to create backup");
                None
            }
        }
    }

    fn try_backup(&self, artifact: &Path) -> Result<PathBuf> {
        let backup_dir = self.backup_dir();
        fs::create_dir_all(&backup_dir)
            .with_context(|| format!("Failed to create backup directory: {}", backup_dir.display()))?;

        let original = artifact
            .file_name()
            .context("Artifact path has no file name")?
            .to_string_lossy();
        let stem = format!("{BACKUP_PREFIX}{original}_{}", Utc::now().timestamp_millis());

        let mut source = File::open(artifact)
            .with_context(|| format!("Failed to open {}", artifact.display()))?;

        // Backups within the same millisecond, from this or another process,
        // get a counter suffix; `create_new` makes the name claim atomic
        let mut counter = 0;
        let (target, mut file) = loop {
            let target = match counter {
                0 => backup_dir.join(&stem),
                n => backup_dir.join(format!("{stem}_{n}")),
            };
            match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(file) => break (target, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => counter += 1,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create backup {}", target.display()));
                }
            }
        };

        io::copy(&mut source, &mut file)
            .with_context(|| format!("Failed to copy {} to {}", artifact.display(), target.display()))?;
        Ok(target)
    }

    /// Delete the oldest backups beyond `max_backups`, returning how many went
    ///
    /// Safe to run repeatedly or concurrently: a missing directory is a no-op
    /// and a file someone else already removed is ignored.
    pub fn cleanup_backups(&self, max_backups: usize) -> usize {
        let mut backups = self.list_backups();
        if backups.len() <= max_backups {
            return 0;
        }

        let excess = backups.len() - max_backups;
        let mut removed = 0;
        for (path, _) in backups.drain(..excess) {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed old backup");
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove old backup"),
            }
        }
        if removed > 0 {
            info!(removed, kept = max_backups, "Pruned old backups");
        }
        removed
    }

    /// Backups oldest first: creation time (modification time where the
    /// filesystem has none), then name
    pub fn list_backups(&self) -> Vec<(PathBuf, SystemTime)> {
        let Ok(entries) = fs::read_dir(self.backup_dir()) else {
            return Vec::new();
        };
        let mut backups: Vec<(PathBuf, SystemTime)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(BACKUP_PREFIX))
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                if !metadata.is_file() {
                    return None;
                }
                let created = metadata.created().or_else(|_| metadata.modified()).ok()?;
                Some((entry.path(), created))
            })
            .collect();
        backups.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        backups
    }

    /// Artifact names that decode as snapshots, sorted oldest session first
    ///
    /// Unreadable or malformed artifacts are left out; checksums are not
    /// checked here.
    pub fn list_compatible(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.state_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| Self::is_artifact_name(name))
            .filter(|name| {
                self.load(name, false)
                    .inspect_err(|e| debug!(name = %name, error = %e, "Skipping incompatible artifact"))
                    .is_ok()
            })
            .collect();
        names.sort();
        names
    }

    /// Most recent loadable artifact
    pub fn latest_compatible(&self) -> Option<String> {
        self.list_compatible().pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Monitor;

    fn sample(session_id: &str) -> Snapshot {
        let mut snapshot = Snapshot::with_session_id(session_id.to_string());
        snapshot.monitor_layouts.push(Monitor {
            id: 1,
            name: "eDP-1".to_string(),
            width: 1920,
            height: 1080,
            refresh_rate: 59.95100021362305,
            ..Default::default()
        });
        snapshot.stamp()
    }

    fn no_backups() -> BackupSettings {
        BackupSettings {
            backup_enabled: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let snapshot = sample("quantum_1700000000000");

        let path = store.save(&snapshot, None, &no_backups()).unwrap();
        assert_eq!(path.file_name().unwrap(), "quantum_state_quantum_1700000000000.json");

        let loaded = store.load("quantum_state_quantum_1700000000000.json", true).unwrap();
        assert_eq!(loaded, snapshot);
        assert!(validate(&loaded));
    }

    #[test]
    fn test_save_with_explicit_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let path = store.save(&sample("quantum_1"), Some("manual.json"), &no_backups()).unwrap();
        assert!(path.ends_with("quantum-state/manual.json"));
        assert!(store.load("manual.json", false).is_ok());
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.load("quantum_state_nope.json", true).is_err());

        fs::create_dir_all(store.state_dir()).unwrap();
        fs::write(store.state_dir().join("quantum_state_bad.json"), "{ not json").unwrap();
        assert!(store.load("quantum_state_bad.json", true).is_err());
    }

    #[test]
    fn test_load_returns_tampered_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let path = store.save(&sample("quantum_2"), None, &no_backups()).unwrap();

        let tampered = fs::read_to_string(&path).unwrap().replace("eDP-1", "DP-9");
        fs::write(&path, tampered).unwrap();

        let loaded = store.load("quantum_state_quantum_2.json", true).unwrap();
        assert_eq!(loaded.monitor_layouts[0].name, "DP-9");
        assert!(!validate(&loaded));
    }

    #[test]
    fn test_backup_retention_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let settings = BackupSettings {
            max_backups: 3,
            ..Default::default()
        };

        let mut created = Vec::new();
        for i in 0..6 {
            store.save(&sample(&format!("quantum_{i}")), None, &no_backups()).unwrap();
            let artifact = store.state_dir().join(SnapshotStore::artifact_name(&format!("quantum_{i}")));
            created.push(store.backup(&artifact).unwrap());
            store.cleanup_backups(settings.max_backups);
        }

        let remaining: Vec<PathBuf> = store.list_backups().into_iter().map(|(p, _)| p).collect();
        assert_eq!(remaining, created[3..].to_vec());
    }

    #[test]
    fn test_save_creates_and_prunes_backups() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let settings = BackupSettings {
            max_backups: 2,
            ..Default::default()
        };
        for i in 0..5 {
            store.save(&sample(&format!("quantum_{i}")), None, &settings).unwrap();
        }
        assert_eq!(store.list_backups().len(), 2);
    }

    #[test]
    fn test_same_millisecond_backups_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let path = store.save(&sample("quantum_3"), None, &no_backups()).unwrap();
        let first = store.backup(&path).unwrap();
        let second = store.backup(&path).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.list_backups().len(), 2);
    }

    #[test]
    fn test_existing_backup_name_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let path = store.save(&sample("quantum_5"), None, &no_backups()).unwrap();

        // Claim the next few names the way another process would
        let stem = format!("{BACKUP_PREFIX}quantum_state_quantum_5.json_{}", Utc::now().timestamp_millis());
        fs::create_dir_all(store.backup_dir()).unwrap();
        fs::write(store.backup_dir().join(&stem), "other").unwrap();
        fs::write(store.backup_dir().join(format!("{stem}_1")), "other").unwrap();

        let created: Vec<PathBuf> = (0..10).map(|_| store.backup(&path).unwrap()).collect();
        assert_eq!(store.list_backups().len(), 12);
        assert_eq!(fs::read_to_string(store.backup_dir().join(&stem)).unwrap(), "other");
        assert_eq!(fs::read_to_string(store.backup_dir().join(format!("{stem}_1"))).unwrap(), "other");
        for backup in &created {
            assert_eq!(fs::read_to_string(backup).unwrap(), fs::read_to_string(&path).unwrap());
        }
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert_eq!(store.cleanup_backups(1), 0);

        let path = store.save(&sample("quantum_4"), None, &no_backups()).unwrap();
        store.backup(&path);
        store.backup(&path);
        assert_eq!(store.cleanup_backups(1), 1);
        assert_eq!(store.cleanup_backups(1), 0);
        assert_eq!(store.list_backups().len(), 1);
    }

    #[test]
    fn test_backup_of_missing_artifact_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.backup(&dir.path().join("gone.json")).is_none());
    }

    #[test]
    fn test_list_compatible_skips_bad_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.save(&sample("quantum_1700000000001"), None, &no_backups()).unwrap();
        store.save(&sample("quantum_1700000000002"), None, &no_backups()).unwrap();
        fs::write(store.state_dir().join("quantum_state_corrupt.json"), r#"{"workspace_states": "not_a_list"}"#).unwrap();
        fs::write(store.state_dir().join("notes.json"), "{}").unwrap();

        assert_eq!(
            store.list_compatible(),
            vec![
                "quantum_state_quantum_1700000000001.json".to_string(),
                "quantum_state_quantum_1700000000002.json".to_string(),
            ]
        );
        assert_eq!(
            store.latest_compatible().as_deref(),
            Some("quantum_state_quantum_1700000000002.json")
        );
    }

    #[test]
    fn test_list_compatible_without_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SnapshotStore::new(dir.path().join("missing")).list_compatible().is_empty());
    }
}

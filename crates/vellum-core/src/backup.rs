//! Snapshot export: renders a [`Snapshot`] as a manifest plus an entries file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::store::Snapshot;

/// One named file of a backup set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub name: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    id: Uuid,
    time: i64,
    version: u32,
    backend: String,
    point_in_time: bool,
    entry_count: usize,
    entries_file: String,
}

fn manifest_name(id: Uuid) -> String {
    format!("backup-{id}.manifest.json")
}

fn entries_name(id: Uuid) -> String {
    format!("backup-{id}.entries.json")
}

pub fn snapshot_files(snapshot: &Snapshot) -> StoreResult<Vec<BackupFile>> {
    let entries_file = entries_name(snapshot.id);
    let manifest = Manifest {
        id: snapshot.id,
        time: snapshot.time,
        version: snapshot.version,
        backend: snapshot.backend.clone(),
        point_in_time: snapshot.point_in_time,
        entry_count: snapshot.entries.len(),
        entries_file: entries_file.clone(),
    };
    Ok(vec![
        BackupFile {
            name: manifest_name(snapshot.id),
            payload: serde_json::to_vec_pretty(&manifest)?,
        },
        BackupFile {
            name: entries_file,
            payload: serde_json::to_vec(&snapshot.entries)?,
        },
    ])
}

/// Writes the backup set into `dir` (created if missing). Returns the written paths.
pub fn write_backup(dir: &Path, snapshot: &Snapshot) -> StoreResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for file in snapshot_files(snapshot)? {
        let path = dir.join(&file.name);
        std::fs::write(&path, &file.payload)?;
        written.push(path);
    }
    tracing::info!(
        target: "vellum::store",
        dir = %dir.display(),
        snapshot_id = %snapshot.id,
        entries = snapshot.entries.len(),
        "backup written"
    );
    Ok(written)
}

/// Reads a backup set back from its manifest path.
pub fn read_backup(manifest_path: &Path) -> StoreResult<Snapshot> {
    let manifest: Manifest = serde_json::from_slice(&std::fs::read(manifest_path)?)?;
    let entries_path = manifest_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&manifest.entries_file);
    let entries: BTreeMap<String, Vec<u8>> = serde_json::from_slice(&std::fs::read(entries_path)?)?;
    Ok(Snapshot {
        id: manifest.id,
        time: manifest.time,
        version: manifest.version,
        backend: manifest.backend,
        point_in_time: manifest.point_in_time,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let mut entries = BTreeMap::new();
        entries.insert("a@x.io".to_string(), b"{\"k\":1}".to_vec());
        entries.insert("b@x.io".to_string(), vec![0, 255, 7]);
        Snapshot {
            id: Uuid::new_v4(),
            time: 1_700_000_000,
            version: 1,
            backend: "sqlite".into(),
            point_in_time: true,
            entries,
        }
    }

    #[test]
    fn manifest_describes_entries() {
        let snap = sample();
        let files = snapshot_files(&snap).unwrap();
        assert_eq!(files.len(), 2);
        let manifest: serde_json::Value = serde_json::from_slice(&files[0].payload).unwrap();
        assert_eq!(manifest["entry_count"], 2);
        assert_eq!(manifest["entries_file"], files[1].name.as_str());
    }

    #[test]
    fn written_backup_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let snap = sample();
        let paths = write_backup(&dir.path().join("nested"), &snap).unwrap();
        let back = read_backup(&paths[0]).unwrap();
        assert_eq!(back.id, snap.id);
        assert_eq!(back.entries, snap.entries);
        assert!(back.point_in_time);
    }
}

//! Durable snapshots of the tracking store.
//!
//! The engine recomputes derived state on every commit, so durability needs
//! no write-ahead log: a snapshot is a pure dump of rows. Snapshots are
//! MessagePack-encoded and written atomically (temp file + rename) so a
//! crash mid-write never leaves a truncated file behind.

use super::memory::StoreState;
use crate::core::{Result, TrackError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub created_at_ms: u64,
    pub state: StoreState,
}

impl StoreSnapshot {
    pub fn new(state: StoreState) -> Self {
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            created_at_ms,
            state,
        }
    }
}

/// Write a snapshot atomically to `path`.
pub fn save(state: StoreState, path: &Path) -> Result<()> {
    let snapshot = StoreSnapshot::new(state);
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let temp = NamedTempFile::new_in(directory)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        rmp_serde::encode::write_named(&mut writer, &snapshot)?;
        writer.flush()?;
    }
    temp.persist(path)
        .map_err(|e| TrackError::SnapshotIo(e.error))?;
    tracing::info!(path = %path.display(), "store snapshot written");
    Ok(())
}

/// Load a snapshot, rejecting unknown format versions.
pub fn load(path: &Path) -> Result<StoreState> {
    let file = File::open(path)?;
    let snapshot: StoreSnapshot = rmp_serde::from_read(BufReader::new(file))?;
    if snapshot.version != SNAPSHOT_FORMAT_VERSION {
        return Err(TrackError::SnapshotCodec(format!(
            "unsupported snapshot format version {}",
            snapshot.version
        )));
    }
    Ok(snapshot.state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContentId, LearnerId};
    use crate::store::TrackingStore;

    #[tokio::test]
    async fn snapshot_round_trips_rows() {
        let store = TrackingStore::new();
        let enrollment = store
            .get_or_create_enrollment(&LearnerId("u1".into()), &ContentId("c1".into()))
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.snap");
        save(store.export_state().await, &path).unwrap();

        let restored = TrackingStore::from_state(load(&path).unwrap());
        let loaded = restored.enrollment(enrollment.id).await.unwrap();
        assert_eq!(loaded.learner, enrollment.learner);
        assert_eq!(loaded.content, enrollment.content);
    }

    #[test]
    fn loading_missing_file_is_an_io_error() {
        let err = load(Path::new("/nonexistent/track.snap")).unwrap_err();
        assert!(matches!(err, TrackError::SnapshotIo(_)));
    }
}

//! JSONL persistence of ready cache entries
//!
//! One entry per line, sorted by key so repeated saves diff cleanly.
//! Failures are never written; entries past the expiry horizon are skipped
//! on load. Saves go to a sibling `.tmp` file renamed over the target, so an
//! interrupted save leaves the previous snapshot intact.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{CacheKey, FetchCache};
use crate::domain::Edge;
use crate::error::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    key: CacheKey,
    edges: Vec<Edge>,
    fetched_at: DateTime<Utc>,
}

impl FetchCache {
    /// Write every ready entry to `path`, returning how many were written
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        let mut entries = self.edges.ready_entries();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let tmp = temp_path(path);
        if let Err(e) = write_records(&tmp, &entries) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, path).map_err(Error::Io)?;

        info!(path = %path.display(), entries = entries.len(), "Saved cache snapshot");
        Ok(entries.len())
    }

    /// Restore entries from `path`, returning how many were loaded
    ///
    /// A missing file loads nothing. A corrupt file loads nothing and
    /// reports the first bad line.
    pub fn load_snapshot(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No cache snapshot to load");
            return Ok(0);
        }

        let file = File::open(path).map_err(Error::Io)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(Error::Io)?;
            if line.trim().is_empty() {
                continue;
            }

            let record: SnapshotRecord = serde_json::from_str(&line).map_err(|e| {
                Error::CacheSnapshot(format!("{}:{}: {}", path.display(), index + 1, e))
            })?;
            records.push(record);
        }

        let now = Utc::now();
        let mut loaded = 0;
        let mut expired = 0;
        for record in records {
            let age = (now - record.fetched_at).to_std().unwrap_or_default();
            if self.options.expiry.is_some_and(|expiry| age >= expiry) {
                expired += 1;
                continue;
            }

            self.edges
                .insert_ready(record.key, Arc::new(record.edges), record.fetched_at);
            loaded += 1;
        }

        info!(path = %path.display(), loaded, expired, "Loaded cache snapshot");
        Ok(loaded)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_records(path: &Path, entries: &[(CacheKey, Arc<Vec<Edge>>, DateTime<Utc>)]) -> Result<()> {
    let file = File::create(path).map_err(Error::Io)?;
    let mut writer = BufWriter::new(file);
    for (key, edges, fetched_at) in entries {
        let record = SnapshotRecord {
            key: key.clone(),
            edges: edges.as_ref().clone(),
            fetched_at: *fetched_at,
        };
        serde_json::to_writer(&mut writer, &record)
            .map_err(|e| Error::CacheSnapshot(format!("JSON serialization error: {}", e)))?;
        writeln!(writer).map_err(Error::Io)?;
    }
    writer.flush().map_err(Error::Io)?;
    writer.get_ref().sync_all().map_err(Error::Io)?;
    Ok(())
}

//! Persisted rosters: the district's own trials and its mirror of the
//! Court's district directory
//!
//! Both follow the same discipline as the trial store: build the successor
//! list, write it to a temp file, rename, then swap it into memory.

use judiciary_core::{DistrictRecord, Error, Result, TrialEntry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::info;

async fn load_vec<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(Error::Io(e)),
    }
}

async fn persist_vec<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(items)?;
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Trial roster
// ---------------------------------------------------------------------------

/// The trials this district owns, in registration order. Insertion order is
/// load-bearing: it is the pipeline's iteration order and the tie-break for
/// free distribution.
pub struct TrialRoster {
    items: RwLock<Vec<TrialEntry>>,
    path: PathBuf,
}

impl TrialRoster {
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = load_vec(&path).await?;
        Ok(Self {
            items: RwLock::new(items),
            path,
        })
    }

    pub async fn all(&self) -> Vec<TrialEntry> {
        self.items.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn find(&self, id: u32) -> Option<TrialEntry> {
        self.items.read().await.iter().find(|t| t.id == id).cloned()
    }

    pub async fn add(&self, address: impl Into<String>) -> Result<TrialEntry> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(Error::validation("trial address must not be blank"));
        }

        let mut guard = self.items.write().await;
        let next_id = guard.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let entry = TrialEntry {
            id: next_id,
            address: address.trim().to_string(),
        };
        let mut next = guard.clone();
        next.push(entry.clone());
        persist_vec(&self.path, &next).await?;
        *guard = next;

        info!(trial_id = entry.id, address = %entry.address, "trial registered");
        Ok(entry)
    }

    pub async fn remove(&self, id: u32) -> Result<TrialEntry> {
        let mut guard = self.items.write().await;
        let pos = guard
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::not_found(format!("trial {id} is not in the roster")))?;
        let mut next = guard.clone();
        let removed = next.remove(pos);
        persist_vec(&self.path, &next).await?;
        *guard = next;

        info!(trial_id = removed.id, "trial removed");
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// District mirror
// ---------------------------------------------------------------------------

/// Local mirror of the Court's district directory, refreshed on demand and
/// kept on disk so the district can still fan out when the Court is down.
pub struct DistrictMirror {
    items: RwLock<Vec<DistrictRecord>>,
    path: PathBuf,
}

impl DistrictMirror {
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = load_vec(&path).await?;
        Ok(Self {
            items: RwLock::new(items),
            path,
        })
    }

    pub async fn all(&self) -> Vec<DistrictRecord> {
        self.items.read().await.clone()
    }

    pub async fn set_all(&self, records: Vec<DistrictRecord>) -> Result<()> {
        let mut guard = self.items.write().await;
        persist_vec(&self.path, &records).await?;
        *guard = records;
        Ok(())
    }

    /// This district's own row, when the Court has one for it.
    pub async fn find_by_name(&self, name: &str) -> Option<DistrictRecord> {
        self.items
            .read()
            .await
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .cloned()
    }
}

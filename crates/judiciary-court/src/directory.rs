//! The persisted district directory
//!
//! Same write discipline as every other store: successor list, temp file,
//! rename, swap. `create` is idempotent by district name so a restarting
//! district can re-register without ceremony.

use judiciary_core::{DistrictRecord, Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::info;

pub struct DistrictDirectory {
    records: RwLock<Vec<DistrictRecord>>,
    path: PathBuf,
}

impl DistrictDirectory {
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Self {
            records: RwLock::new(records),
            path,
        })
    }

    async fn persist(&self, records: &[DistrictRecord]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every district except the one at `caller_addr`.
    pub async fn list_except(&self, caller_addr: &str) -> Vec<DistrictRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|d| d.address != caller_addr)
            .cloned()
            .collect()
    }

    /// Insert a district keyed by name. Returns the record and whether it
    /// was newly created; an existing name is returned as-is.
    pub async fn create(
        &self,
        name: &str,
        address: &str,
        trials: u32,
    ) -> Result<(DistrictRecord, bool)> {
        if name.trim().is_empty() {
            return Err(Error::validation("field 'name' is required"));
        }
        if trials == 0 {
            return Err(Error::validation("field 'trials' must be positive"));
        }

        let mut guard = self.records.write().await;
        if let Some(existing) = guard.iter().find(|d| d.name == name) {
            return Ok((existing.clone(), false));
        }

        let record = DistrictRecord {
            id: guard.iter().map(|d| d.id).max().unwrap_or(0) + 1,
            name: name.trim().to_string(),
            address: address.to_string(),
            trials,
        };
        let mut next = guard.clone();
        next.push(record.clone());
        self.persist(&next).await?;
        *guard = next;

        info!(district_id = record.id, name = %record.name, address = %record.address, "district created");
        Ok((record, true))
    }

    pub async fn remove(&self, name: &str) -> Result<DistrictRecord> {
        let mut guard = self.records.write().await;
        let pos = guard
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| Error::not_found(format!("district {name:?} is not registered")))?;
        let mut next = guard.clone();
        let removed = next.remove(pos);
        self.persist(&next).await?;
        *guard = next;

        info!(name = %removed.name, "district removed");
        Ok(removed)
    }

    pub async fn update_trials(&self, name: &str, trials: u32) -> Result<DistrictRecord> {
        let mut guard = self.records.write().await;
        let mut next = guard.clone();
        let record = next
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| Error::not_found(format!("district {name:?} is not registered")))?;
        record.trials = trials;
        let updated = record.clone();
        self.persist(&next).await?;
        *guard = next;

        info!(name = %updated.name, trials, "trial count updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn path(dir: &TempDir) -> PathBuf {
        dir.path().join("districts.json")
    }

    #[tokio::test]
    async fn create_assigns_ids_and_is_idempotent_by_name() {
        let dir = TempDir::new().unwrap();
        let directory = DistrictDirectory::load(path(&dir)).await.unwrap();

        let (alpha, created) = directory.create("Alpha", "127.0.0.1:9100", 2).await.unwrap();
        assert!(created);
        assert_eq!(alpha.id, 1);

        let (beta, _) = directory.create("Beta", "127.0.0.1:9200", 1).await.unwrap();
        assert_eq!(beta.id, 2);

        // Re-registration returns the existing record, original address kept.
        let (again, created) = directory.create("Alpha", "127.0.0.1:9999", 5).await.unwrap();
        assert!(!created);
        assert_eq!(again.id, 1);
        assert_eq!(again.address, "127.0.0.1:9100");
    }

    #[tokio::test]
    async fn create_validates_name_and_trials() {
        let dir = TempDir::new().unwrap();
        let directory = DistrictDirectory::load(path(&dir)).await.unwrap();
        assert!(directory.create("", "127.0.0.1:9100", 2).await.is_err());
        assert!(directory.create("Alpha", "127.0.0.1:9100", 0).await.is_err());
    }

    #[tokio::test]
    async fn list_excludes_the_caller_address() {
        let dir = TempDir::new().unwrap();
        let directory = DistrictDirectory::load(path(&dir)).await.unwrap();
        directory.create("Alpha", "127.0.0.1:9100", 2).await.unwrap();
        directory.create("Beta", "127.0.0.1:9200", 1).await.unwrap();

        let listed = directory.list_except("127.0.0.1:9100").await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Beta");

        // An ephemeral caller address matches nobody and sees everything.
        assert_eq!(directory.list_except("127.0.0.1:54321").await.len(), 2);
    }

    #[tokio::test]
    async fn remove_and_update_trials_require_the_name_to_exist() {
        let dir = TempDir::new().unwrap();
        let directory = DistrictDirectory::load(path(&dir)).await.unwrap();
        directory.create("Alpha", "127.0.0.1:9100", 2).await.unwrap();

        let updated = directory.update_trials("Alpha", 3).await.unwrap();
        assert_eq!(updated.trials, 3);
        assert!(directory.update_trials("Gamma", 1).await.is_err());

        directory.remove("Alpha").await.unwrap();
        assert!(directory.remove("Alpha").await.is_err());
    }

    #[tokio::test]
    async fn directory_survives_a_reload() {
        let dir = TempDir::new().unwrap();
        {
            let directory = DistrictDirectory::load(path(&dir)).await.unwrap();
            directory.create("Alpha", "127.0.0.1:9100", 2).await.unwrap();
        }
        let directory = DistrictDirectory::load(path(&dir)).await.unwrap();
        let all = directory.list_except("").await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Alpha");
    }
}

//! District identity (name + address), mirrored to disk between runs

use judiciary_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DistrictIdentity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
}

pub fn load(path: &Path) -> Result<DistrictIdentity> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DistrictIdentity::default()),
        Err(e) => Err(Error::Io(e)),
    }
}

pub fn save(path: &Path, identity: &DistrictIdentity) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(identity)?;
    let tmp = path.with_file_name(format!(
        "{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("district.json")
    ));
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn identity_roundtrips_and_tolerates_absence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("district.json");

        let empty = load(&path).unwrap();
        assert!(empty.name.is_empty());

        save(
            &path,
            &DistrictIdentity {
                name: "Alpha".into(),
                address: "127.0.0.1:9100".into(),
            },
        )
        .unwrap();
        let back = load(&path).unwrap();
        assert_eq!(back.name, "Alpha");
        assert_eq!(back.address, "127.0.0.1:9100");
    }
}

//! Snapshot persistence for the citation profile.
//!
//! The profile lives in `<dir>/gs_data.json`. Loading never fails loudly:
//! a missing, unreadable or corrupt file is logged and reported as `None`
//! so that callers can decide whether to fetch or give up.

use crate::error::Result;
use crate::profile::Profile;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// File name of the primary profile document
pub const PROFILE_FILE: &str = "gs_data.json";

/// Reads and writes the persisted profile snapshot
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the primary profile document
    pub fn profile_path(&self) -> PathBuf {
        self.dir.join(PROFILE_FILE)
    }

    /// Load the cached profile
    ///
    /// Returns `None` if the file doesn't exist or is invalid
    pub fn load(&self) -> Option<Profile> {
        let path = self.profile_path();
        if !path.exists() {
            debug!(path = %path.display(), "No cached profile");
            return None;
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Profile>(&content) {
                Ok(profile) => {
                    debug!(
                        path = %path.display(),
                        publications = profile.publications.len(),
                        "Loaded cached profile"
                    );
                    Some(profile)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not parse cached profile");
                    None
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read cached profile");
                None
            }
        }
    }

    /// Persist the profile, replacing any previous snapshot atomically
    pub fn save(&self, profile: &Profile) -> Result<()> {
        let path = self.profile_path();
        info!(path = %path.display(), "Saving profile");
        write_json_atomic(&path, profile)
    }
}

/// Serialize `value` as pretty JSON to `path` via a sibling temp file and
/// rename, creating the parent directory if needed.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let content = serde_json::to_string_pretty(value)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{AuthorDetails, Publication};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_profile() -> Profile {
        let mut publications = BTreeMap::new();
        publications.insert(
            "ABC123:p1".to_string(),
            Publication {
                author_pub_id: "ABC123:p1".to_string(),
                num_citations: Some(5),
                ..Default::default()
            },
        );
        Profile {
            details: AuthorDetails {
                scholar_id: "ABC123".to_string(),
                name: Some("Ada Lovelace".to_string()),
                citedby: Some(42),
                hindex: Some(3),
                ..Default::default()
            },
            publications,
            updated: Some("2024-05-06 07:08:09".to_string()),
        }
    }

    #[test]
    fn test_load_missing() {
        let temp = TempDir::new().expect("temp dir");
        let store = CacheStore::new(temp.path());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp = TempDir::new()?;
        let store = CacheStore::new(temp.path().join("results"));
        let profile = sample_profile();

        store.save(&profile)?;
        assert_eq!(store.load(), Some(profile));
        Ok(())
    }

    #[test]
    fn test_load_corrupt_file() -> Result<()> {
        let temp = TempDir::new()?;
        let store = CacheStore::new(temp.path());
        std::fs::write(store.profile_path(), "{\"scholar_id\": ")?;
        assert!(store.load().is_none());
        Ok(())
    }

    #[test]
    fn test_save_replaces_without_leftovers() -> Result<()> {
        let temp = TempDir::new()?;
        let store = CacheStore::new(temp.path());
        let mut profile = sample_profile();

        store.save(&profile)?;
        profile.details.citedby = Some(43);
        store.save(&profile)?;

        let entries: Vec<_> = std::fs::read_dir(temp.path())?.collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            store.load().and_then(|p| p.details.citedby),
            Some(43)
        );
        Ok(())
    }

    #[test]
    fn test_save_keeps_non_ascii() -> Result<()> {
        let temp = TempDir::new()?;
        let store = CacheStore::new(temp.path());
        let mut profile = sample_profile();
        profile.details.name = Some("José Núñez".to_string());

        store.save(&profile)?;
        let raw = std::fs::read_to_string(store.profile_path())?;
        assert!(raw.contains("José Núñez"));
        Ok(())
    }
}

//! shields.io endpoint badges derived from a profile.
//!
//! Badges are always regenerated from a [`Profile`] and never read back.

use crate::cache::write_json_atomic;
use crate::error::Result;
use crate::profile::Profile;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// File name of the whole-profile badge
pub const PROFILE_BADGE_FILE: &str = "gs_data_shieldsio.json";

/// shields.io endpoint schema version
pub const SCHEMA_VERSION: u32 = 1;

const LABEL: &str = "citations";

/// A shields.io endpoint document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub schema_version: u32,
    pub label: String,
    pub message: String,
}

impl Badge {
    fn citations(count: Option<u64>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            label: LABEL.to_string(),
            message: count.unwrap_or(0).to_string(),
        }
    }
}

/// Badge for the profile's total citation count
pub fn profile_badge(profile: &Profile) -> Badge {
    Badge::citations(profile.details.citedby)
}

/// One badge per publication, in publication id order
pub fn publication_badges(profile: &Profile) -> Vec<(String, Badge)> {
    profile
        .publications
        .iter()
        .map(|(id, publication)| (id.clone(), Badge::citations(publication.num_citations)))
        .collect()
}

/// File name of a publication badge. Path separators in the id are replaced
/// so the file stays inside the output directory.
pub fn publication_badge_file(pub_id: &str) -> String {
    let safe: String = pub_id
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}_shieldsio.json", safe)
}

/// Write the profile badge and every publication badge into `dir`
pub fn write_badges(dir: &Path, profile: &Profile) -> Result<()> {
    let path = dir.join(PROFILE_BADGE_FILE);
    info!(path = %path.display(), "Saving citation badge");
    write_json_atomic(&path, &profile_badge(profile))?;

    let badges = publication_badges(profile);
    info!(count = badges.len(), "Saving publication badges");
    for (pub_id, badge) in &badges {
        write_json_atomic(&dir.join(publication_badge_file(pub_id)), badge)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{key_publications, AuthorDetails, Publication};
    use serde_json::json;
    use tempfile::TempDir;

    fn profile() -> Profile {
        Profile {
            details: AuthorDetails {
                scholar_id: "ABC123".to_string(),
                citedby: Some(42),
                ..Default::default()
            },
            publications: key_publications(vec![
                Publication {
                    author_pub_id: "p1".to_string(),
                    num_citations: Some(5),
                    ..Default::default()
                },
                Publication {
                    author_pub_id: "p2".to_string(),
                    ..Default::default()
                },
            ]),
            updated: None,
        }
    }

    #[test]
    fn test_badge_shape() {
        let value = serde_json::to_value(profile_badge(&profile())).expect("serialize");
        assert_eq!(
            value,
            json!({"schemaVersion": 1, "label": "citations", "message": "42"})
        );
    }

    #[test]
    fn test_missing_counts_default_to_zero() {
        assert_eq!(profile_badge(&Profile::default()).message, "0");

        let badges = publication_badges(&profile());
        assert_eq!(badges.len(), 2);
        assert_eq!(badges[0], ("p1".to_string(), Badge::citations(Some(5))));
        assert_eq!(badges[1].1.message, "0");
    }

    #[test]
    fn test_badge_file_names() {
        assert_eq!(publication_badge_file("p1"), "p1_shieldsio.json");
        assert_eq!(
            publication_badge_file("ABC123:u-x9/Q"),
            "ABC123:u-x9_Q_shieldsio.json"
        );
    }

    #[test]
    fn test_write_badges() -> Result<()> {
        let temp = TempDir::new()?;
        write_badges(temp.path(), &profile())?;

        let main: Badge = serde_json::from_str(&std::fs::read_to_string(
            temp.path().join(PROFILE_BADGE_FILE),
        )?)?;
        assert_eq!(main.message, "42");

        let p1: Badge =
            serde_json::from_str(&std::fs::read_to_string(temp.path().join("p1_shieldsio.json"))?)?;
        assert_eq!(p1.message, "5");
        assert!(temp.path().join("p2_shieldsio.json").exists());
        Ok(())
    }
}

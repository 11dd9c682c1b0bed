//! Citation profile data model.
//!
//! A [`RawProfile`] is what the provider hands back: publications arrive as
//! a list. A [`Profile`] is the persisted record: publications are keyed by
//! their provider-assigned id and the record carries an `updated` stamp.
//! Fields this crate does not know about are kept in `extra` maps so that a
//! snapshot written by another tool survives a load/save cycle untouched.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Wall-clock format of the `updated` field.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Author-level fields shared by raw and persisted profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorDetails {
    /// Google Scholar user id
    pub scholar_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_picture: Option<String>,

    /// Total citations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citedby: Option<u64>,
    /// Citations in the last five years
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citedby5y: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hindex: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hindex5y: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i10index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i10index5y: Option<u64>,

    /// Citations per calendar year, keyed by year
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cites_per_year: BTreeMap<String, u64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single cited work on a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    /// Provider-assigned id, unique within a profile
    pub author_pub_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_citations: Option<u64>,
    /// Title, venue and year as reported by the provider
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub bib: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Profile as returned by a provider, before it is keyed and stamped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProfile {
    #[serde(flatten)]
    pub details: AuthorDetails,
    #[serde(default)]
    pub publications: Vec<Publication>,
}

/// The persisted citation profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(flatten)]
    pub details: AuthorDetails,
    #[serde(default)]
    pub publications: BTreeMap<String, Publication>,
    /// Time of the fetch that produced this record, in [`TIMESTAMP_FORMAT`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

impl Profile {
    /// Build the persisted record from a provider result fetched at `now`.
    pub fn from_raw(raw: RawProfile, now: NaiveDateTime) -> Self {
        Self {
            details: raw.details,
            publications: key_publications(raw.publications),
            updated: Some(now.format(TIMESTAMP_FORMAT).to_string()),
        }
    }

    /// Parse the `updated` stamp. `None` when missing or malformed.
    pub fn last_updated(&self) -> Option<NaiveDateTime> {
        let updated = self.updated.as_deref()?;
        NaiveDateTime::parse_from_str(updated, TIMESTAMP_FORMAT).ok()
    }
}

/// Key publications by `author_pub_id`. A later entry with the same id
/// replaces the earlier one.
pub fn key_publications<I>(publications: I) -> BTreeMap<String, Publication>
where
    I: IntoIterator<Item = Publication>,
{
    publications
        .into_iter()
        .map(|p| (p.author_pub_id.clone(), p))
        .collect()
}

//! Profile provider abstraction.
//!
//! The orchestrator only talks to this trait. [`crate::gscholar::ScholarProvider`]
//! is the HTTP implementation; tests substitute scripted providers.

use crate::error::Result;
use crate::profile::RawProfile;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Detail sections that `fill` can populate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Name, affiliation, interests, homepage, picture
    Basics,
    /// Citation count, h-index, i10-index
    Indices,
    /// Citations per year
    Counts,
    /// Publication list
    Publications,
}

impl Section {
    /// Every section, in fill order
    pub const ALL: [Section; 4] = [
        Section::Basics,
        Section::Indices,
        Section::Counts,
        Section::Publications,
    ];
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Basics => "basics",
            Section::Indices => "indices",
            Section::Counts => "counts",
            Section::Publications => "publications",
        };
        f.write_str(name)
    }
}

/// Resolved author, ready to be filled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorHandle {
    pub scholar_id: String,
    pub name: Option<String>,
}

/// Outcome of proxy setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyStatus {
    /// No proxy was requested
    Direct,
    /// Requests go through this proxy
    Proxied(String),
    /// A proxy was requested but none worked; requests go direct
    Unavailable,
}

/// External source of citation profiles
///
/// Also implemented for `Arc<P>` so a provider can be shared with the caller.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Resolve an opaque scholar id to an author handle
    async fn search_author_id(&self, scholar_id: &str) -> Result<AuthorHandle>;

    /// Expand a handle with the requested sections
    async fn fill(&self, author: &AuthorHandle, sections: &[Section]) -> Result<RawProfile>;
}

#[async_trait]
impl<P: ProfileProvider + ?Sized> ProfileProvider for Arc<P> {
    async fn search_author_id(&self, scholar_id: &str) -> Result<AuthorHandle> {
        (**self).search_author_id(scholar_id).await
    }

    async fn fill(&self, author: &AuthorHandle, sections: &[Section]) -> Result<RawProfile> {
        (**self).fill(author, sections).await
    }
}

//! Cache keys and their on-disk names

use sha2::{Digest, Sha256};
use std::fmt;

/// Encoded names longer than this are replaced by a digest
const MAX_FILE_STEM_LEN: usize = 200;

/// Logical partition of the cache keyspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Query result pages
    Pages,
    /// Binary assets
    Assets,
}

impl Namespace {
    /// Directory name used by the durable tier
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Pages => "pages",
            Self::Assets => "assets",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A namespaced cache key
///
/// Keys render to a stable identity string, so the same inputs always map to
/// the same durable record across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: Namespace,
    rendered: String,
}

impl CacheKey {
    /// Key for page `page` of `query`
    pub fn page(query: &str, page: u32) -> Self {
        Self {
            namespace: Namespace::Pages,
            rendered: format!("{}#page={}", query, page),
        }
    }

    /// Key for the asset at `url`
    pub fn asset(url: &str) -> Self {
        Self {
            namespace: Namespace::Assets,
            rendered: url.to_string(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Stable string form of the identity
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Whether the identity contains `needle` as a substring
    pub fn matches(&self, needle: &str) -> bool {
        self.rendered.contains(needle)
    }

    /// File name for the durable record
    ///
    /// The identity is percent-encoded so it is safe on every filesystem. Names
    /// that would get too long fall back to a SHA-256 digest; records carry
    /// their rendered identity, so enumeration never depends on decoding names.
    pub fn file_name(&self) -> String {
        let encoded = urlencoding::encode(&self.rendered);
        if encoded.len() <= MAX_FILE_STEM_LEN {
            format!("{}.json", encoded)
        } else {
            format!("{:x}.json", Sha256::digest(self.rendered.as_bytes()))
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.rendered)
    }
}

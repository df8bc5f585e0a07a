//! Content-addressed identifiers.
//!
//! Every digest is SHA-256 over a canonical projection of named fields:
//! the fields are placed in a key-sorted map and serialized as compact JSON
//! (`{"a":"x","b":"y"}`, non-ASCII left unescaped). Sorting is by byte
//! order of the field names and nothing in the path consults the locale, so
//! equal inputs hash equally across processes, machines, and insertion
//! orders.
//!
//! Digests are used for equality (dedup, cache keys) and never for
//! similarity.
//!
//! # Example
//!
//! ```rust
//! use trendline_core::identity::stable_hash;
//!
//! let a = stable_hash([("title", "Hello"), ("source", "news")]).unwrap();
//! let b = stable_hash([("source", "news"), ("title", "Hello")]).unwrap();
//! assert_eq!(a, b);
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

/// Maximum number of code points of a title that take part in
/// [`item_identity`].
pub const TITLE_PREFIX_CHARS: usize = 200;

/// Lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Digest of raw text, with no field projection.
    pub fn of_text(text: &str) -> Self {
        Self(sha256_hex(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// SHA-256 of a UTF-8 string as lowercase hex.
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash an ordered set of `(name, value)` fields.
///
/// The result does not depend on the order the fields are given in.
/// Values may be any JSON value; strings are the common case.
///
/// # Errors
///
/// [`ValidationError::EmptyFieldName`] or
/// [`ValidationError::DuplicateField`] when the projection is ambiguous.
pub fn stable_hash<I, K, V>(fields: I) -> Result<ContentHash, ValidationError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let mut map = Map::new();
    for (name, value) in fields {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::EmptyFieldName);
        }
        if map.contains_key(&name) {
            return Err(ValidationError::DuplicateField(name));
        }
        map.insert(name, value.into());
    }
    Ok(hash_map(map))
}

/// serde_json's default `Map` is a `BTreeMap`, so `to_string` emits keys
/// sorted with `,`/`:` separators and no whitespace.
fn hash_map(map: Map<String, Value>) -> ContentHash {
    ContentHash(sha256_hex(&Value::Object(map).to_string()))
}

/// Identity of a collected item.
///
/// The title is trimmed and cut to [`TITLE_PREFIX_CHARS`] code points so
/// whitespace or tail noise past the prefix does not split identities.
/// The URL is hashed verbatim: two URLs for the same resource that differ
/// in scheme or query string produce different identities.
pub fn item_identity(
    source: &str,
    url: &str,
    title: &str,
    published_at: Option<&str>,
) -> ContentHash {
    let title_prefix: String = title.trim().chars().take(TITLE_PREFIX_CHARS).collect();
    let mut map = Map::new();
    map.insert("source".into(), Value::from(source));
    map.insert("url".into(), Value::from(url));
    map.insert("title".into(), Value::from(title_prefix));
    map.insert("published_at".into(), Value::from(published_at.unwrap_or("")));
    hash_map(map)
}

/// Identity of a cluster's membership, independent of member order.
pub fn cluster_identity<S: AsRef<str>>(item_ids: &[S]) -> ContentHash {
    let mut ids: Vec<&str> = item_ids.iter().map(|s| s.as_ref()).collect();
    ids.sort_unstable();
    let mut map = Map::new();
    map.insert("item_ids".into(), Value::from(ids));
    hash_map(map)
}

/// Cache key for an embedding of `text` produced by `model`.
pub fn embedding_key(text: &str, model: &str) -> ContentHash {
    let mut map = Map::new();
    map.insert("model".into(), Value::from(model));
    map.insert("text".into(), Value::from(text.trim()));
    hash_map(map)
}

/// Membership test against a caller-owned set.
///
/// Never inserts: the caller decides when a digest counts as seen.
pub fn is_duplicate(seen: &HashSet<ContentHash>, digest: &ContentHash) -> bool {
    seen.contains(digest)
}

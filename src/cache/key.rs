//! Cache keys derived from document identity

use std::fmt;

use serde::{Deserialize, Serialize};

const KEY_PREFIX: &str = "pdf_";

/// Stable identity of a case document as supplied by the document store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIdentity {
    /// Document id in the case database
    pub id: String,
    /// Display name, e.g. `report.pdf`
    pub name: String,
    /// Retrieval location (URL or local path)
    pub url: String,
}

impl DocumentIdentity {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
        }
    }

    /// Cache key for this document's bytes
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::for_document(&self.id)
    }
}

/// Key of a cached binary object
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an already-derived key verbatim
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Derive the storage-safe key for a document id.
    ///
    /// Path separators and dots are replaced so the key never nests or
    /// carries an extension when it reaches a storage backend.
    #[must_use]
    pub fn for_document(document_id: &str) -> Self {
        let safe: String = document_id
            .chars()
            .map(|c| if matches!(c, '/' | '.') { '_' } else { c })
            .collect();
        Self(format!("{KEY_PREFIX}{safe}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fixed-length file stem used by on-disk stores
    #[must_use]
    pub fn storage_name(&self) -> String {
        format!("{:x}", md5::compute(self.0.as_bytes()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_key_replaces_separators() {
        let key = CacheKey::for_document("cases/42/intake.v2");
        assert_eq!(key.as_str(), "pdf_cases_42_intake_v2");
    }

    #[test]
    fn identity_uses_document_id_only() {
        let a = DocumentIdentity::new("abc", "report.pdf", "https://example.test/a");
        let b = DocumentIdentity::new("abc", "renamed.pdf", "https://example.test/b");
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn storage_name_is_hex_digest() {
        let name = CacheKey::new("doc_abc").storage_name();
        assert_eq!(name.len(), 32);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(name, CacheKey::new("doc_abd").storage_name());
    }
}

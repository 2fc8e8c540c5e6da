//! Bookmark model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque bookmark identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(String);

impl BookmarkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BookmarkId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for BookmarkId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A row of the `bookmarks` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
}

/// Insert payload; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub user_id: String,
}

impl NewBookmark {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            user_id: user_id.into(),
        }
    }
}

/// Partial update of a bookmark's editable columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl BookmarkPatch {
    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: None,
        }
    }

    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            title: None,
            url: Some(url.into()),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.url.is_none()
    }

    /// Apply the patch to a local copy of the row.
    pub fn apply_to(&self, bookmark: &mut Bookmark) {
        if let Some(title) = &self.title {
            bookmark.title.clone_from(title);
        }
        if let Some(url) = &self.url {
            bookmark.url.clone_from(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bookmark_parses_postgrest_row() {
        let raw = r#"{
            "id": "5b7d2c8e-4f0a-4c5e-9b61-0d1f2a3b4c5d",
            "title": "Example",
            "url": "https://example.com",
            "created_at": "2025-02-14T09:30:00.123456+00:00",
            "user_id": "user-1"
        }"#;
        let bookmark: Bookmark = serde_json::from_str(raw).unwrap();
        assert_eq!(bookmark.id.as_str(), "5b7d2c8e-4f0a-4c5e-9b61-0d1f2a3b4c5d");
        assert_eq!(bookmark.title, "Example");
        assert_eq!(bookmark.created_at.timestamp(), 1_739_525_400);
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let patch = BookmarkPatch::title("Example2");
        assert_eq!(
            serde_json::to_string(&patch).unwrap(),
            r#"{"title":"Example2"}"#
        );
        assert!(BookmarkPatch::default().is_empty());
    }

    #[test]
    fn patch_apply_keeps_untouched_fields() {
        let mut bookmark = Bookmark {
            id: "b1".into(),
            title: "Example".to_string(),
            url: "https://example.com".to_string(),
            created_at: Utc::now(),
            user_id: "user-1".to_string(),
        };
        BookmarkPatch::url("https://example.org").apply_to(&mut bookmark);
        assert_eq!(bookmark.title, "Example");
        assert_eq!(bookmark.url, "https://example.org");
    }
}

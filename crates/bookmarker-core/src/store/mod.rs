//! Bookmark store: CRUD on the `bookmarks` table plus its change feed.
//!
//! Row ownership is enforced by the store (row-level security on the hosted
//! backend, an owner check in memory), never by callers.

mod memory;
mod rest;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Bookmark, BookmarkId, BookmarkPatch, NewBookmark};
use crate::realtime::{ChangeFilter, Subscription};

pub use memory::MemoryBookmarkStore;
pub use rest::PostgrestBookmarkStore;

#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// All rows visible to the caller, newest first.
    async fn list(&self) -> Result<Vec<Bookmark>>;

    /// Insert a row; the store assigns `id` and `created_at`.
    async fn insert(&self, bookmark: &NewBookmark) -> Result<Bookmark>;

    /// Update title and/or url of a row.
    async fn update(&self, id: &BookmarkId, patch: &BookmarkPatch) -> Result<Bookmark>;

    async fn delete(&self, id: &BookmarkId) -> Result<()>;

    /// Open a change-event subscription.
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription>;
}

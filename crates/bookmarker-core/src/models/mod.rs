//! Data models for Bookmarker

mod bookmark;

pub use bookmark::{Bookmark, BookmarkId, BookmarkPatch, NewBookmark};

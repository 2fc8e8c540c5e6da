//! bookmarker-core - Core library for Bookmarker
//!
//! This crate contains the bookmark model, the Supabase session gateway, the
//! bookmark store and its change feed, and the live sync view shared by every
//! Bookmarker front end.

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod form;
pub mod models;
pub mod realtime;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Bookmark, BookmarkId, BookmarkPatch, NewBookmark};

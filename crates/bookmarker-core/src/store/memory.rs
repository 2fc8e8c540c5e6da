//! In-process bookmark store with a change feed.
//!
//! Handles created with [`MemoryBookmarkStore::as_user`] share rows and
//! subscribers, so several of them behave like browser tabs of different (or
//! the same) users against one backend.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::BookmarkStore;
use crate::error::{Error, Result};
use crate::models::{Bookmark, BookmarkId, BookmarkPatch, NewBookmark};
use crate::realtime::{ChangeEvent, ChangeFilter, Subscription};

#[derive(Clone, Default)]
pub struct MemoryBookmarkStore {
    shared: Arc<Mutex<Shared>>,
    viewer: Option<String>,
}

#[derive(Default)]
struct Shared {
    rows: Vec<Bookmark>,
    subscribers: Vec<Subscriber>,
    last_created_at: Option<DateTime<Utc>>,
}

struct Subscriber {
    filter: ChangeFilter,
    events: mpsc::UnboundedSender<ChangeEvent>,
}

impl Shared {
    fn publish(&mut self, event: &ChangeEvent) {
        self.subscribers
            .retain(|subscriber| !subscriber.events.is_closed());
        for subscriber in &self.subscribers {
            if subscriber.filter.matches(event) {
                let _ = subscriber.events.send(event.clone());
            }
        }
    }

    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created_at = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(created_at);
        created_at
    }
}

impl MemoryBookmarkStore {
    /// A store handle that sees every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle sharing this store's rows, scoped to one owner.
    #[must_use]
    pub fn as_user(&self, user_id: impl Into<String>) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            viewer: Some(user_id.into()),
        }
    }

    /// Deliver `event` to matching subscribers without touching any row.
    pub fn inject_event(&self, event: &ChangeEvent) -> Result<()> {
        self.lock()?.publish(event);
        Ok(())
    }

    pub fn subscriber_count(&self) -> Result<usize> {
        let mut shared = self.lock()?;
        shared
            .subscribers
            .retain(|subscriber| !subscriber.events.is_closed());
        Ok(shared.subscribers.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Shared>> {
        self.shared
            .lock()
            .map_err(|_| Error::Api("memory store lock poisoned".to_string()))
    }

    fn can_see(&self, bookmark: &Bookmark) -> bool {
        self.viewer
            .as_deref()
            .map_or(true, |viewer| viewer == bookmark.user_id)
    }

    fn position(&self, shared: &Shared, id: &BookmarkId) -> Result<usize> {
        shared
            .rows
            .iter()
            .position(|row| &row.id == id && self.can_see(row))
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

#[async_trait]
impl BookmarkStore for MemoryBookmarkStore {
    async fn list(&self) -> Result<Vec<Bookmark>> {
        let shared = self.lock()?;
        let mut rows = shared
            .rows
            .iter()
            .filter(|row| self.can_see(row))
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert(&self, bookmark: &NewBookmark) -> Result<Bookmark> {
        if bookmark.title.trim().is_empty() {
            return Err(Error::InvalidInput("title must not be empty".to_string()));
        }
        if let Some(viewer) = self.viewer.as_deref() {
            if viewer != bookmark.user_id {
                return Err(Error::Unauthorized(format!(
                    "cannot insert a bookmark owned by {}",
                    bookmark.user_id
                )));
            }
        }

        let mut shared = self.lock()?;
        let row = Bookmark {
            id: BookmarkId::new(Uuid::now_v7().to_string()),
            title: bookmark.title.clone(),
            url: bookmark.url.clone(),
            created_at: shared.next_created_at(),
            user_id: bookmark.user_id.clone(),
        };
        shared.rows.insert(0, row.clone());
        shared.publish(&ChangeEvent::Insert(row.clone()));
        Ok(row)
    }

    async fn update(&self, id: &BookmarkId, patch: &BookmarkPatch) -> Result<Bookmark> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("nothing to update".to_string()));
        }
        if patch
            .title
            .as_deref()
            .is_some_and(|title| title.trim().is_empty())
        {
            return Err(Error::InvalidInput("title must not be empty".to_string()));
        }

        let mut shared = self.lock()?;
        let index = self.position(&shared, id)?;
        patch.apply_to(&mut shared.rows[index]);
        let row = shared.rows[index].clone();
        shared.publish(&ChangeEvent::Update(row.clone()));
        Ok(row)
    }

    async fn delete(&self, id: &BookmarkId) -> Result<()> {
        let mut shared = self.lock()?;
        // Deleting an invisible or missing row matches nothing, as in PostgREST.
        let Ok(index) = self.position(&shared, id) else {
            return Ok(());
        };
        let removed = shared.rows.remove(index);
        shared.publish(&ChangeEvent::Delete { id: removed.id });
        Ok(())
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        let (events, receiver) = mpsc::unbounded_channel();
        self.lock()?.subscribers.push(Subscriber { filter, events });
        Ok(Subscription::new(receiver, None))
    }
}

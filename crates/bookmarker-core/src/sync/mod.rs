//! Live bookmark list kept in step with the store's change feed.
//!
//! The list is event-sourced: local writes go to the store and show up here
//! only when the feed delivers them. Nothing is added optimistically, so the
//! insert dedup below only guards against redelivery.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::{AuthUser, SessionGateway};
use crate::error::Result;
use crate::models::{Bookmark, BookmarkId, BookmarkPatch};
use crate::realtime::{ChangeEvent, ChangeFilter, Subscription};
use crate::state::{Observable, SessionState};
use crate::store::BookmarkStore;

/// What applying one event did to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Inserted,
    Replaced,
    Removed,
    Ignored,
}

impl Reconciled {
    pub const fn changed(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// Apply one change event to a newest-first list in place.
///
/// - insert: prepend unless the id is already present (no re-sort)
/// - update: replace the matching entry at its position
/// - delete: remove the matching entry
///
/// Unknown ids make update and delete no-ops.
pub fn reconcile(bookmarks: &mut Vec<Bookmark>, event: &ChangeEvent) -> Reconciled {
    let position = bookmarks.iter().position(|row| &row.id == event.id());
    match (event, position) {
        (ChangeEvent::Insert(row), None) => {
            bookmarks.insert(0, row.clone());
            Reconciled::Inserted
        }
        (ChangeEvent::Update(row), Some(index)) => {
            bookmarks[index] = row.clone();
            Reconciled::Replaced
        }
        (ChangeEvent::Delete { .. }, Some(index)) => {
            bookmarks.remove(index);
            Reconciled::Removed
        }
        _ => Reconciled::Ignored,
    }
}

/// Pure form of [`reconcile`].
#[must_use]
pub fn apply_event(mut bookmarks: Vec<Bookmark>, event: &ChangeEvent) -> Vec<Bookmark> {
    reconcile(&mut bookmarks, event);
    bookmarks
}

/// What a front end renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub bookmarks: Vec<Bookmark>,
    /// Initial fetch finished (successfully or not).
    pub loaded: bool,
    /// Change feed attached and still delivering.
    pub live: bool,
}

pub struct BookmarkSyncView {
    user: AuthUser,
    store: Arc<dyn BookmarkStore>,
    snapshot: Observable<SyncSnapshot>,
    pump: Option<JoinHandle<()>>,
}

impl BookmarkSyncView {
    /// Resolve the user, fetch their list, then attach the change feed.
    ///
    /// Returns `None` when nobody is signed in. A failed fetch leaves the list
    /// empty but loaded; a failed subscription leaves the view static.
    pub async fn mount(
        gateway: &dyn SessionGateway,
        store: Arc<dyn BookmarkStore>,
    ) -> Option<Self> {
        let user = match gateway.current_user().await {
            Ok(Some(user)) => user,
            Ok(None) => return None,
            Err(error) => {
                tracing::debug!("No session for bookmark view: {}", error);
                return None;
            }
        };

        let bookmarks = match store.list().await {
            Ok(bookmarks) => bookmarks,
            Err(error) => {
                tracing::warn!("Failed to fetch bookmarks: {}", error);
                Vec::new()
            }
        };
        let snapshot = Observable::new(SyncSnapshot {
            bookmarks,
            loaded: true,
            live: false,
        });

        let pump = match store
            .subscribe(ChangeFilter::bookmarks_for_user(&user.id))
            .await
        {
            Ok(subscription) => {
                snapshot.update(|current| {
                    current.live = true;
                    true
                });
                Some(tokio::spawn(pump_events(
                    subscription,
                    gateway.session_state(),
                    snapshot.clone(),
                )))
            }
            Err(error) => {
                tracing::debug!("Bookmark change feed unavailable: {}", error);
                None
            }
        };

        Some(Self {
            user,
            store,
            snapshot,
            pump,
        })
    }

    pub const fn user(&self) -> &AuthUser {
        &self.user
    }

    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.snapshot.get().bookmarks
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshot.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.get().loaded
    }

    pub fn is_live(&self) -> bool {
        self.snapshot.get().live
    }

    /// Receiver notified after every change to the snapshot.
    pub fn watch(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshot.watch()
    }

    /// Replace local state with a full re-fetch.
    pub async fn refresh(&self) -> Result<()> {
        let bookmarks = self.store.list().await?;
        self.snapshot.update(|current| {
            current.bookmarks = bookmarks;
            current.loaded = true;
            true
        });
        Ok(())
    }

    /// Delete in the store; the feed removes the row locally.
    pub async fn delete(&self, id: &BookmarkId) -> Result<()> {
        self.store.delete(id).await
    }

    /// Edit in the store; the feed replaces the row locally.
    pub async fn edit(&self, id: &BookmarkId, patch: &BookmarkPatch) -> Result<Bookmark> {
        self.store.update(id, patch).await
    }

    /// Release the subscription and stop applying events.
    pub fn teardown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            self.snapshot.update(|current| {
                let was_live = current.live;
                current.live = false;
                was_live
            });
        }
    }
}

impl Drop for BookmarkSyncView {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn pump_events(
    mut subscription: Subscription,
    session: SessionState,
    snapshot: Observable<SyncSnapshot>,
) {
    let mut session = session.watch();
    while session.borrow_and_update().is_some() {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else {
                    tracing::debug!("Bookmark change feed closed");
                    break;
                };
                snapshot.update(|current| {
                    let outcome = reconcile(&mut current.bookmarks, &event);
                    tracing::debug!("Applied {:?} for {}: {:?}", event.kind(), event.id(), outcome);
                    outcome.changed()
                });
            }
            changed = session.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!("Releasing bookmark subscription");

    subscription.release();
    snapshot.update(|current| {
        current.live = false;
        true
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::auth::InMemorySessionGateway;
    use crate::error::Error;
    use crate::models::NewBookmark;
    use crate::store::MemoryBookmarkStore;

    fn bookmark(id: &str, title: &str, seconds: i64) -> Bookmark {
        Bookmark {
            id: id.into(),
            title: title.to_string(),
            url: format!("https://{id}.example.com"),
            created_at: Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap(),
            user_id: "alice".to_string(),
        }
    }

    fn ids(rows: &[Bookmark]) -> Vec<&str> {
        rows.iter().map(|row| row.id.as_str()).collect()
    }

    async fn wait_until(
        receiver: &mut watch::Receiver<SyncSnapshot>,
        ready: impl FnMut(&SyncSnapshot) -> bool,
    ) -> SyncSnapshot {
        tokio::time::timeout(Duration::from_secs(2), receiver.wait_for(ready))
            .await
            .expect("timed out waiting for snapshot")
            .expect("snapshot channel closed")
            .clone()
    }

    #[test]
    fn insert_prepends_without_resorting() {
        let state = vec![bookmark("b", "B", 2), bookmark("a", "A", 1)];
        let older = bookmark("z", "Late arrival", 0);

        let state = apply_event(state, &ChangeEvent::Insert(older));
        assert_eq!(ids(&state), vec!["z", "b", "a"]);
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut state = vec![bookmark("a", "A", 1)];
        let outcome = reconcile(&mut state, &ChangeEvent::Insert(bookmark("a", "Other", 5)));

        assert_eq!(outcome, Reconciled::Ignored);
        assert_eq!(state, vec![bookmark("a", "A", 1)]);
    }

    #[test]
    fn update_replaces_in_place() {
        let state = vec![
            bookmark("c", "C", 3),
            bookmark("b", "B", 2),
            bookmark("a", "A", 1),
        ];
        let state = apply_event(state, &ChangeEvent::Update(bookmark("b", "Renamed", 2)));

        assert_eq!(ids(&state), vec!["c", "b", "a"]);
        assert_eq!(state[1].title, "Renamed");
    }

    #[test]
    fn update_and_delete_for_unknown_ids_are_no_ops() {
        let state = vec![bookmark("a", "A", 1)];

        let updated = apply_event(state.clone(), &ChangeEvent::Update(bookmark("x", "X", 9)));
        assert_eq!(updated, state);

        let deleted = apply_event(state.clone(), &ChangeEvent::Delete { id: "x".into() });
        assert_eq!(deleted, state);
    }

    #[test]
    fn delete_removes_matching_entry() {
        let state = vec![bookmark("b", "B", 2), bookmark("a", "A", 1)];
        let state = apply_event(state, &ChangeEvent::Delete { id: "b".into() });
        assert_eq!(ids(&state), vec!["a"]);
    }

    fn arb_event() -> impl Strategy<Value = ChangeEvent> {
        (0u8..3, 0u8..6, "[A-Za-z]{1,8}").prop_map(|(kind, id, title)| {
            let row = bookmark(&format!("id-{id}"), &title, i64::from(id));
            match kind {
                0 => ChangeEvent::Insert(row),
                1 => ChangeEvent::Update(row),
                _ => ChangeEvent::Delete { id: row.id },
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn list_never_holds_duplicate_ids(events in prop::collection::vec(arb_event(), 0..40)) {
            let mut state = Vec::new();
            for event in &events {
                reconcile(&mut state, event);
                let unique = state.iter().map(|row| row.id.clone()).collect::<HashSet<_>>();
                prop_assert_eq!(unique.len(), state.len());
            }
        }

        #[test]
        fn applying_an_insert_twice_equals_applying_it_once(
            events in prop::collection::vec(arb_event(), 0..20),
            extra in arb_event(),
        ) {
            let state = events.iter().fold(Vec::new(), apply_event);
            if let ChangeEvent::Insert(_) = extra {
                let once = apply_event(state.clone(), &extra);
                let twice = apply_event(once.clone(), &extra);
                prop_assert_eq!(once, twice);
            }
        }
    }

    struct UnreachableStore;

    #[async_trait]
    impl BookmarkStore for UnreachableStore {
        async fn list(&self) -> Result<Vec<Bookmark>> {
            Err(Error::Api("connection refused".to_string()))
        }

        async fn insert(&self, _bookmark: &NewBookmark) -> Result<Bookmark> {
            Err(Error::Api("connection refused".to_string()))
        }

        async fn update(&self, _id: &BookmarkId, _patch: &BookmarkPatch) -> Result<Bookmark> {
            Err(Error::Api("connection refused".to_string()))
        }

        async fn delete(&self, _id: &BookmarkId) -> Result<()> {
            Err(Error::Api("connection refused".to_string()))
        }

        async fn subscribe(&self, _filter: ChangeFilter) -> Result<Subscription> {
            Err(Error::Realtime("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn mount_without_session_returns_none() {
        let gateway = InMemorySessionGateway::signed_out();
        let store: Arc<dyn BookmarkStore> = Arc::new(MemoryBookmarkStore::new());
        assert!(BookmarkSyncView::mount(&gateway, store).await.is_none());
    }

    #[tokio::test]
    async fn failed_fetch_still_marks_loaded_with_empty_list() {
        let gateway = InMemorySessionGateway::signed_in(AuthUser::new("alice", None));
        let view = BookmarkSyncView::mount(&gateway, Arc::new(UnreachableStore))
            .await
            .unwrap();

        assert!(view.is_loaded());
        assert!(!view.is_live());
        assert!(view.bookmarks().is_empty());
        assert!(view.refresh().await.is_err());
    }

    #[tokio::test]
    async fn view_follows_the_change_feed() {
        let backend = MemoryBookmarkStore::new();
        let alice = backend.as_user("alice");
        alice
            .insert(&NewBookmark::new("Existing", "https://old.example.com", "alice"))
            .await
            .unwrap();

        let gateway = InMemorySessionGateway::signed_in(AuthUser::new("alice", None));
        let view = BookmarkSyncView::mount(&gateway, Arc::new(alice.clone()))
            .await
            .unwrap();
        let mut snapshots = view.watch();
        assert!(view.is_live());
        assert_eq!(view.bookmarks().len(), 1);

        let created = alice
            .insert(&NewBookmark::new("Example", "https://example.com", "alice"))
            .await
            .unwrap();
        let snapshot = wait_until(&mut snapshots, |s| s.bookmarks.len() == 2).await;
        assert_eq!(snapshot.bookmarks[0], created);

        view.edit(&created.id, &BookmarkPatch::title("Example2"))
            .await
            .unwrap();
        let snapshot =
            wait_until(&mut snapshots, |s| s.bookmarks[0].title == "Example2").await;
        assert_eq!(snapshot.bookmarks[0].id, created.id);

        view.delete(&created.id).await.unwrap();
        let snapshot = wait_until(&mut snapshots, |s| s.bookmarks.len() == 1).await;
        assert_eq!(snapshot.bookmarks[0].title, "Existing");
    }

    #[tokio::test]
    async fn other_users_inserts_never_arrive() {
        let backend = MemoryBookmarkStore::new();
        let gateway = InMemorySessionGateway::signed_in(AuthUser::new("alice", None));
        let view = BookmarkSyncView::mount(&gateway, Arc::new(backend.as_user("alice")))
            .await
            .unwrap();
        let mut snapshots = view.watch();

        backend
            .as_user("bob")
            .insert(&NewBookmark::new("Bob's", "https://b.com", "bob"))
            .await
            .unwrap();
        let mine = backend
            .as_user("alice")
            .insert(&NewBookmark::new("Mine", "https://a.com", "alice"))
            .await
            .unwrap();

        let snapshot = wait_until(&mut snapshots, |s| !s.bookmarks.is_empty()).await;
        assert_eq!(snapshot.bookmarks, vec![mine]);
    }

    #[tokio::test]
    async fn redelivered_insert_does_not_duplicate() {
        let backend = MemoryBookmarkStore::new();
        let gateway = InMemorySessionGateway::signed_in(AuthUser::new("alice", None));
        let view = BookmarkSyncView::mount(&gateway, Arc::new(backend.as_user("alice")))
            .await
            .unwrap();
        let mut snapshots = view.watch();

        let row = backend
            .insert(&NewBookmark::new("Once", "https://once.com", "alice"))
            .await
            .unwrap();
        backend.inject_event(&ChangeEvent::Insert(row.clone())).unwrap();
        let marker = backend
            .insert(&NewBookmark::new("Marker", "https://marker.com", "alice"))
            .await
            .unwrap();

        let snapshot = wait_until(&mut snapshots, |s| {
            s.bookmarks.first().is_some_and(|first| first.id == marker.id)
        })
        .await;
        assert_eq!(snapshot.bookmarks, vec![marker, row]);
    }

    #[tokio::test]
    async fn sign_out_releases_the_subscription() {
        let backend = MemoryBookmarkStore::new();
        let gateway = InMemorySessionGateway::signed_in(AuthUser::new("alice", None));
        let view = BookmarkSyncView::mount(&gateway, Arc::new(backend.as_user("alice")))
            .await
            .unwrap();
        let mut snapshots = view.watch();
        assert_eq!(backend.subscriber_count().unwrap(), 1);

        gateway.sign_out().await.unwrap();
        wait_until(&mut snapshots, |s| !s.live).await;
        assert_eq!(backend.subscriber_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn teardown_stops_applying_events() {
        let backend = MemoryBookmarkStore::new();
        let gateway = InMemorySessionGateway::signed_in(AuthUser::new("alice", None));
        let view = BookmarkSyncView::mount(&gateway, Arc::new(backend.as_user("alice")))
            .await
            .unwrap();
        let snapshots = view.watch();

        view.teardown();
        assert!(!snapshots.borrow().live);

        tokio::time::timeout(Duration::from_secs(2), async {
            while backend.subscriber_count().unwrap() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("subscription was not released");

        backend
            .insert(&NewBookmark::new("After", "https://after.com", "alice"))
            .await
            .unwrap();
        assert!(snapshots.borrow().bookmarks.is_empty());
    }
}

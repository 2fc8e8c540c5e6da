//! Change-event feed types and the realtime websocket client.

mod phoenix;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::models::{Bookmark, BookmarkId};

pub use phoenix::{decode_postgres_change, RealtimeClient};

pub const BOOKMARKS_TABLE: &str = "bookmarks";
pub const PUBLIC_SCHEMA: &str = "public";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// `column = value` filter evaluated by the feed before delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFilter {
    pub column: String,
    pub value: String,
}

impl ColumnFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// PostgREST-style rendering, e.g. `user_id=eq.42`.
    pub fn to_filter_string(&self) -> String {
        format!("{}=eq.{}", self.column, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBinding {
    pub kind: ChangeKind,
    pub filter: Option<ColumnFilter>,
}

/// Which table changes a subscription wants, per event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub schema: String,
    pub table: String,
    pub bindings: Vec<ChangeBinding>,
}

impl ChangeFilter {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            schema: PUBLIC_SCHEMA.to_string(),
            table: table.into(),
            bindings: Vec::new(),
        }
    }

    #[must_use]
    pub fn on(mut self, kind: ChangeKind, filter: Option<ColumnFilter>) -> Self {
        self.bindings.push(ChangeBinding { kind, filter });
        self
    }

    /// The bookmark list's subscription for one user.
    ///
    /// Inserts and updates are scoped to `user_id` by the feed. Deletes carry
    /// only the primary key, so they cannot be filtered server-side and are
    /// reconciled against locally held ids instead.
    pub fn bookmarks_for_user(user_id: &str) -> Self {
        Self::table(BOOKMARKS_TABLE)
            .on(
                ChangeKind::Insert,
                Some(ColumnFilter::eq("user_id", user_id)),
            )
            .on(
                ChangeKind::Update,
                Some(ColumnFilter::eq("user_id", user_id)),
            )
            .on(ChangeKind::Delete, None)
    }

    /// Whether `event` passes any binding of this filter.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.bindings
            .iter()
            .filter(|binding| binding.kind == event.kind())
            .any(|binding| match (&binding.filter, event.record()) {
                (None, _) => true,
                (Some(filter), Some(record)) => record_column(record, &filter.column)
                    .is_some_and(|value| value == filter.value),
                (Some(_), None) => false,
            })
    }
}

fn record_column<'a>(record: &'a Bookmark, column: &str) -> Option<&'a str> {
    match column {
        "id" => Some(record.id.as_str()),
        "user_id" => Some(record.user_id.as_str()),
        "title" => Some(record.title.as_str()),
        "url" => Some(record.url.as_str()),
        _ => None,
    }
}

/// A row change delivered by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert(Bookmark),
    Update(Bookmark),
    Delete { id: BookmarkId },
}

impl ChangeEvent {
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert(_) => ChangeKind::Insert,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete { .. } => ChangeKind::Delete,
        }
    }

    pub const fn id(&self) -> &BookmarkId {
        match self {
            Self::Insert(bookmark) | Self::Update(bookmark) => &bookmark.id,
            Self::Delete { id } => id,
        }
    }

    pub const fn record(&self) -> Option<&Bookmark> {
        match self {
            Self::Insert(bookmark) | Self::Update(bookmark) => Some(bookmark),
            Self::Delete { .. } => None,
        }
    }
}

/// A live change-event subscription.
///
/// Events arrive in delivery order. Dropping the subscription (or calling
/// [`Subscription::release`]) releases the underlying channel.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    release: Option<oneshot::Sender<()>>,
}

impl Subscription {
    pub(crate) const fn new(
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        release: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self { events, release }
    }

    /// Next event, or `None` once the feed has closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    pub fn release(mut self) {
        self.signal_release();
    }

    fn signal_release(&mut self) {
        self.events.close();
        if let Some(release) = self.release.take() {
            let _ = release.send(());
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.signal_release();
    }
}

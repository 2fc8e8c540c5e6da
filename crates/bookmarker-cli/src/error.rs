use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] bookmarker_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Bookmark title cannot be empty")]
    EmptyTitle,
    #[error("Bookmark URL cannot be empty")]
    EmptyUrl,
    #[error("Bookmark ID cannot be empty")]
    EmptyBookmarkId,
    #[error("Nothing to edit; pass --title and/or --url")]
    NothingToEdit,
    #[error("Bookmark not found for id/prefix: {0}")]
    BookmarkNotFound(String),
    #[error("{0}")]
    AmbiguousBookmarkId(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Not signed in. Run `bookmarker auth login --email <email> --password <password>`.")]
    NotSignedIn,
}

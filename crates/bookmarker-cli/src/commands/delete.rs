use bookmarker_core::store::BookmarkStore;

use crate::commands::common::{normalize_bookmark_identifier, open_backend, resolve_bookmark};
use crate::error::CliError;

pub async fn run_delete(id: &str, global_profile: Option<&str>) -> Result<(), CliError> {
    let query = normalize_bookmark_identifier(id)?;
    let backend = open_backend(global_profile).await?;
    let bookmarks = backend.store.list().await?;
    let bookmark = resolve_bookmark(&query, &bookmarks)?;

    backend.store.delete(&bookmark.id).await?;
    tracing::info!(
        "Deleted '{}' from profile '{}'",
        bookmark.title,
        backend.profile_name
    );
    println!("{}", bookmark.id);
    Ok(())
}

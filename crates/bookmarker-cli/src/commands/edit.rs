use bookmarker_core::store::BookmarkStore;
use bookmarker_core::BookmarkPatch;

use crate::commands::common::{
    normalize_bookmark_identifier, normalize_cli_url, open_backend, resolve_bookmark,
};
use crate::error::CliError;

/// Patch from the `--title` / `--url` flags; blank values are rejected.
pub fn build_patch(title: Option<&str>, url: Option<&str>) -> Result<BookmarkPatch, CliError> {
    let title = match title {
        Some(title) if title.trim().is_empty() => return Err(CliError::EmptyTitle),
        Some(title) => Some(title.to_string()),
        None => None,
    };
    let url = match url {
        Some(url) => Some(normalize_cli_url(url).ok_or(CliError::EmptyUrl)?),
        None => None,
    };

    let patch = BookmarkPatch { title, url };
    if patch.is_empty() {
        return Err(CliError::NothingToEdit);
    }
    Ok(patch)
}

pub async fn run_edit(
    id: &str,
    title: Option<&str>,
    url: Option<&str>,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let query = normalize_bookmark_identifier(id)?;
    let patch = build_patch(title, url)?;
    let backend = open_backend(global_profile).await?;
    let bookmarks = backend.store.list().await?;
    let bookmark = resolve_bookmark(&query, &bookmarks)?;

    let unchanged = patch.title.as_ref().is_none_or(|title| *title == bookmark.title)
        && patch.url.as_ref().is_none_or(|url| *url == bookmark.url);
    if unchanged {
        println!("{}", bookmark.id);
        return Ok(());
    }

    let updated = backend.store.update(&bookmark.id, &patch).await?;
    println!("{}", updated.id);
    Ok(())
}

use bookmarker_core::store::BookmarkStore;
use chrono::Utc;

use crate::commands::common::{
    bookmark_to_list_item, format_bookmark_lines, open_backend, BookmarkListItem,
};
use crate::error::CliError;

pub async fn run_list(as_json: bool, global_profile: Option<&str>) -> Result<(), CliError> {
    let backend = open_backend(global_profile).await?;
    let bookmarks = backend.store.list().await?;
    tracing::debug!(
        "Fetched {} bookmarks for {} (profile '{}')",
        bookmarks.len(),
        backend.user.display_name(),
        backend.profile_name
    );
    let now_ms = Utc::now().timestamp_millis();

    if as_json {
        let json_items = bookmarks
            .iter()
            .map(|bookmark| bookmark_to_list_item(bookmark, now_ms))
            .collect::<Vec<BookmarkListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if bookmarks.is_empty() {
        println!("No bookmarks yet.");
    } else {
        for line in format_bookmark_lines(&bookmarks, now_ms) {
            println!("{line}");
        }
    }

    Ok(())
}

use std::sync::Arc;

use bookmarker_core::auth::{AuthError, AuthUser, SupabaseSessionGateway};
use bookmarker_core::config::ClientConfig;
use bookmarker_core::form::UrlField;
use bookmarker_core::store::PostgrestBookmarkStore;
use bookmarker_core::util::compact_text;
use bookmarker_core::{Bookmark, BookmarkId};
use serde::Serialize;

use crate::auth::{auth_client_for_profile, ProfileGateway};
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;
const TITLE_COLUMN_WIDTH: usize = 30;
const URL_COLUMN_WIDTH: usize = 40;

/// Signed-in connection to a profile's Supabase project.
pub struct Backend {
    pub profile_name: String,
    pub gateway: Arc<ProfileGateway>,
    pub store: Arc<PostgrestBookmarkStore>,
    pub user: AuthUser,
}

#[derive(Debug, Serialize)]
pub struct BookmarkListItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub created_at: String,
    pub relative_time: String,
}

pub fn auth_error(error: AuthError) -> CliError {
    CliError::Auth(error.to_string())
}

/// Project settings for the selected profile, falling back to the environment.
pub fn resolve_client_config(
    global_profile: Option<&str>,
) -> Result<(String, ClientConfig), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);

    let from_profile = match config.profile(&profile_name) {
        Some(profile) => profile.client_config()?,
        None => None,
    };
    let client_config = match from_profile {
        Some(client_config) => client_config,
        None => ClientConfig::from_env()?.ok_or_else(|| {
            CliError::Config(format!(
                "Profile '{profile_name}' is not configured. Run `bookmarker config init --profile {profile_name}` or set SUPABASE_URL and SUPABASE_ANON_KEY."
            ))
        })?,
    };

    Ok((profile_name, client_config))
}

pub async fn open_backend(global_profile: Option<&str>) -> Result<Backend, CliError> {
    let (profile_name, client_config) = resolve_client_config(global_profile)?;
    let client = auth_client_for_profile(&profile_name, &client_config).map_err(auth_error)?;
    let gateway = SupabaseSessionGateway::new(client);
    let session = gateway
        .current_session()
        .await
        .map_err(auth_error)?
        .ok_or(CliError::NotSignedIn)?;

    tracing::debug!("Using profile '{}' as {}", profile_name, session.user.id);
    let store = PostgrestBookmarkStore::new(&client_config, gateway.access_token())?;

    Ok(Backend {
        profile_name,
        gateway: Arc::new(gateway),
        store: Arc::new(store),
        user: session.user,
    })
}

pub fn normalize_bookmark_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyBookmarkId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// URL as the form field would store it, or `None` when nothing real was given.
pub fn normalize_cli_url(url: &str) -> Option<String> {
    let mut field = UrlField::default();
    field.on_input(url.trim());
    if field.is_blank() {
        None
    } else {
        Some(field.value().to_string())
    }
}

/// Find a bookmark by exact id or unique id prefix.
pub fn resolve_bookmark(query: &str, bookmarks: &[Bookmark]) -> Result<Bookmark, CliError> {
    if let Some(exact) = bookmarks.iter().find(|bookmark| bookmark.id.as_str() == query) {
        return Ok(exact.clone());
    }

    let matching = bookmarks
        .iter()
        .filter(|bookmark| bookmark.id.as_str().starts_with(query))
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::BookmarkNotFound(query.to_string())),
        [only] => Ok((*only).clone()),
        many => {
            let options = many
                .iter()
                .take(3)
                .map(|bookmark| short_id(&bookmark.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousBookmarkId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &BookmarkId) -> String {
    id.as_str().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_bookmark_lines(bookmarks: &[Bookmark], now_ms: i64) -> Vec<String> {
    bookmarks
        .iter()
        .enumerate()
        .map(|(index, bookmark)| {
            let short_id = short_id(&bookmark.id);
            let title = truncate(&compact_text(&bookmark.title), TITLE_COLUMN_WIDTH);
            let url = truncate(&bookmark.url, URL_COLUMN_WIDTH);
            let relative_time =
                format_relative_time(bookmark.created_at.timestamp_millis(), now_ms);
            format!(
                "{:>3}. {short_id:<13}  {title:<30}  {url:<40}  {relative_time}",
                index + 1
            )
        })
        .collect()
}

pub fn bookmark_to_list_item(bookmark: &Bookmark, now_ms: i64) -> BookmarkListItem {
    BookmarkListItem {
        id: bookmark.id.to_string(),
        title: bookmark.title.clone(),
        url: bookmark.url.clone(),
        created_at: bookmark.created_at.to_rfc3339(),
        relative_time: format_relative_time(bookmark.created_at.timestamp_millis(), now_ms),
    }
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let mut truncated = value
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    const MINUTE: i64 = 60_000;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const WEEK: i64 = 7 * DAY;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;

    let diff = now_ms.saturating_sub(timestamp_ms);
    match diff {
        d if d < MINUTE => "just now".to_string(),
        d if d < HOUR => format!("{}m ago", d / MINUTE),
        d if d < DAY => format!("{}h ago", d / HOUR),
        d if d < WEEK => format!("{}d ago", d / DAY),
        d if d < MONTH => format!("{}w ago", d / WEEK),
        d if d < YEAR => format!("{}mo ago", d / MONTH),
        d => format!("{}y ago", d / YEAR),
    }
}

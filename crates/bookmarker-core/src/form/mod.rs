//! New-bookmark form: title plus a URL field that fills in a scheme while typing.

use crate::auth::SessionGateway;
use crate::error::Error;
use crate::models::{Bookmark, NewBookmark};
use crate::store::BookmarkStore;

/// Pre-filled on focus and added to bare input.
pub const SCHEME_PLACEHOLDER: &str = "https://";

/// Next value of the URL field after the user changes it to `input`.
///
/// `current` is the value before the change. Input that already carries a
/// scheme is kept verbatim, as is anything typed after a `https://` prefix
/// already present in the field.
pub fn normalize_url_input(current: &str, input: &str) -> String {
    if input.starts_with("http://") || input.starts_with("https://") || input.is_empty() {
        return input.to_string();
    }
    if current.starts_with(SCHEME_PLACEHOLDER) {
        return input.to_string();
    }
    format!("{SCHEME_PLACEHOLDER}{input}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlField {
    value: String,
}

impl UrlField {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn on_input(&mut self, input: &str) {
        self.value = normalize_url_input(&self.value, input);
    }

    pub fn on_focus(&mut self) {
        if self.value.is_empty() {
            self.value = SCHEME_PLACEHOLDER.to_string();
        }
    }

    pub fn on_blur(&mut self) {
        if self.value == SCHEME_PLACEHOLDER {
            self.value.clear();
        }
    }

    /// Nothing beyond the placeholder has been entered.
    pub fn is_blank(&self) -> bool {
        let value = self.value.trim();
        value.is_empty() || value == SCHEME_PLACEHOLDER
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }
}

/// Result of [`BookmarkForm::submit`].
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Blank title or URL; no request was made.
    Rejected,
    /// Nobody is signed in; no request was made.
    NoSession,
    /// Stored. The form has been cleared.
    Created(Bookmark),
    /// The store refused or was unreachable. Fields are left as entered.
    Failed(Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkForm {
    title: String,
    url: UrlField,
}

impl BookmarkForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub const fn url(&self) -> &UrlField {
        &self.url
    }

    pub fn url_mut(&mut self) -> &mut UrlField {
        &mut self.url
    }

    pub fn can_submit(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.is_blank()
    }

    /// Create a bookmark for the signed-in user from the current fields.
    pub async fn submit(
        &mut self,
        gateway: &dyn SessionGateway,
        store: &dyn BookmarkStore,
    ) -> SubmitOutcome {
        if !self.can_submit() {
            return SubmitOutcome::Rejected;
        }

        let user = match gateway.current_user().await {
            Ok(Some(user)) => user,
            Ok(None) => return SubmitOutcome::NoSession,
            Err(error) => {
                tracing::debug!("Session lookup failed before submit: {}", error);
                return SubmitOutcome::NoSession;
            }
        };

        let new_bookmark = NewBookmark::new(self.title.clone(), self.url.value(), user.id);
        match store.insert(&new_bookmark).await {
            Ok(created) => {
                self.title.clear();
                self.url.clear();
                SubmitOutcome::Created(created)
            }
            Err(error) => SubmitOutcome::Failed(error),
        }
    }
}

use bookmarker_core::form::{BookmarkForm, SubmitOutcome};

use crate::commands::common::open_backend;
use crate::error::CliError;

pub async fn run_add(title: &str, url: &str, global_profile: Option<&str>) -> Result<(), CliError> {
    let mut form = BookmarkForm::new();
    form.set_title(title);
    form.url_mut().on_input(url.trim());
    if title.trim().is_empty() {
        return Err(CliError::EmptyTitle);
    }
    if form.url().is_blank() {
        return Err(CliError::EmptyUrl);
    }

    let backend = open_backend(global_profile).await?;
    match form
        .submit(backend.gateway.as_ref(), backend.store.as_ref())
        .await
    {
        SubmitOutcome::Created(bookmark) => {
            println!("{}", bookmark.id);
            Ok(())
        }
        SubmitOutcome::NoSession => Err(CliError::NotSignedIn),
        SubmitOutcome::Rejected => Err(CliError::EmptyTitle),
        SubmitOutcome::Failed(error) => Err(error.into()),
    }
}

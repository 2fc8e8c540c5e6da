//! Access-gated dashboard composing the live list and the new-bookmark form.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::{AuthUser, SessionGateway};
use crate::error::Result;
use crate::form::{BookmarkForm, SubmitOutcome};
use crate::models::{Bookmark, BookmarkId, BookmarkPatch};
use crate::store::BookmarkStore;
use crate::sync::{BookmarkSyncView, SyncSnapshot};

/// Sign-in entry point.
pub const LOGIN_ROUTE: &str = "/";
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// Outcome of an access check: go elsewhere, or render `T`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate<T> {
    Redirect(&'static str),
    Render(T),
}

impl<T> Gate<T> {
    pub const fn redirect_target(&self) -> Option<&'static str> {
        match self {
            Self::Redirect(route) => Some(*route),
            Self::Render(_) => None,
        }
    }

    pub fn into_render(self) -> Option<T> {
        match self {
            Self::Redirect(_) => None,
            Self::Render(value) => Some(value),
        }
    }
}

/// Signed-in user, or a redirect to the login route.
///
/// Checked once per navigation. Failing to resolve the session counts as
/// signed out.
pub async fn require_user(gateway: &dyn SessionGateway) -> Gate<AuthUser> {
    match gateway.current_user().await {
        Ok(Some(user)) => Gate::Render(user),
        Ok(None) => Gate::Redirect(LOGIN_ROUTE),
        Err(error) => {
            tracing::debug!("Treating unresolved session as signed out: {}", error);
            Gate::Redirect(LOGIN_ROUTE)
        }
    }
}

/// Landing page gate: signed-in users go straight to the dashboard.
pub async fn entry_route(gateway: &dyn SessionGateway) -> Gate<()> {
    match require_user(gateway).await {
        Gate::Render(_) => Gate::Redirect(DASHBOARD_ROUTE),
        Gate::Redirect(_) => Gate::Render(()),
    }
}

pub struct Dashboard {
    user: AuthUser,
    display_name: String,
    view: BookmarkSyncView,
    form: BookmarkForm,
    gateway: Arc<dyn SessionGateway>,
    store: Arc<dyn BookmarkStore>,
}

impl Dashboard {
    pub async fn open(
        gateway: Arc<dyn SessionGateway>,
        store: Arc<dyn BookmarkStore>,
    ) -> Gate<Self> {
        let user = match require_user(gateway.as_ref()).await {
            Gate::Render(user) => user,
            Gate::Redirect(route) => return Gate::Redirect(route),
        };
        // The session can end between the gate and the mount.
        let Some(view) = BookmarkSyncView::mount(gateway.as_ref(), Arc::clone(&store)).await
        else {
            return Gate::Redirect(LOGIN_ROUTE);
        };

        tracing::info!("Opened dashboard for {}", user.id);
        Gate::Render(Self {
            display_name: user.display_name(),
            user,
            view,
            form: BookmarkForm::new(),
            gateway,
            store,
        })
    }

    pub const fn user(&self) -> &AuthUser {
        &self.user
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub const fn view(&self) -> &BookmarkSyncView {
        &self.view
    }

    pub const fn form(&self) -> &BookmarkForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut BookmarkForm {
        &mut self.form
    }

    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.view.bookmarks()
    }

    pub fn watch(&self) -> watch::Receiver<SyncSnapshot> {
        self.view.watch()
    }

    /// Submit the form. The new row reaches the list through the feed.
    pub async fn submit(&mut self) -> SubmitOutcome {
        self.form
            .submit(self.gateway.as_ref(), self.store.as_ref())
            .await
    }

    pub async fn edit(&self, id: &BookmarkId, patch: &BookmarkPatch) -> Result<Bookmark> {
        self.view.edit(id, patch).await
    }

    pub async fn delete(&self, id: &BookmarkId) -> Result<()> {
        self.view.delete(id).await
    }

    /// Leave the dashboard without ending the session.
    pub fn close(self) {
        self.view.teardown();
    }

    /// End the session, release the live list and return where to go next.
    pub async fn sign_out(self) -> &'static str {
        if let Err(error) = self.gateway.sign_out().await {
            tracing::warn!("Sign out failed: {}", error);
        }
        self.view.teardown();
        LOGIN_ROUTE
    }
}

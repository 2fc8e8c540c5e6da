//! Session gateway: the single "who is signed in" query every component uses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use super::{AuthResult, AuthSession, AuthUser, SessionPersistence, SupabaseAuthClient};
use crate::state::{AccessToken, SessionState};

const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// The signed-in user, or `None` when there is no session.
    async fn current_user(&self) -> AuthResult<Option<AuthUser>>;

    /// End the session. Watchers of [`SessionGateway::session_state`] see `None`.
    async fn sign_out(&self) -> AuthResult<()>;

    /// Observable session used by live views to tear down on sign-out.
    fn session_state(&self) -> SessionState;
}

/// Gateway backed by Supabase auth and a persisted session.
pub struct SupabaseSessionGateway<S: SessionPersistence> {
    client: SupabaseAuthClient<S>,
    state: SessionState,
    access_token: AccessToken,
}

impl<S: SessionPersistence> SupabaseSessionGateway<S> {
    pub fn new(client: SupabaseAuthClient<S>) -> Self {
        Self {
            client,
            state: SessionState::new(None),
            access_token: AccessToken::new(None),
        }
    }

    pub const fn client(&self) -> &SupabaseAuthClient<S> {
        &self.client
    }

    /// Token of the current session, updated on every restore and refresh.
    ///
    /// Hand this to the bookmark store so its requests and realtime channels
    /// follow the session.
    pub fn access_token(&self) -> AccessToken {
        self.access_token.clone()
    }

    /// Restore (and refresh if needed) the persisted session.
    pub async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
        let session = self.client.restore_session().await?;
        self.access_token
            .set_if_changed(session.as_ref().map(|session| session.access_token.clone()));
        self.state.set_if_changed(session.as_ref().map(|session| session.user.clone()));
        Ok(session)
    }

    /// Refresh the session shortly before each expiry until it ends.
    pub fn spawn_token_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let gateway = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match gateway.current_session().await {
                    Ok(Some(session)) => {
                        let delay = session.refresh_in().max(MIN_REFRESH_DELAY);
                        tracing::debug!("Next token refresh in {}s", delay.as_secs());
                        tokio::time::sleep(delay).await;
                    }
                    Ok(None) => {
                        tracing::debug!("Session ended; stopping token refresh");
                        break;
                    }
                    Err(error) => {
                        tracing::warn!("Failed to refresh session token: {}", error);
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl<S: SessionPersistence> SessionGateway for SupabaseSessionGateway<S> {
    async fn current_user(&self) -> AuthResult<Option<AuthUser>> {
        Ok(self.current_session().await?.map(|session| session.user))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let result = match self.client.restore_session().await? {
            Some(session) => self.client.sign_out(&session.access_token).await,
            None => Ok(()),
        };
        if result.is_err() {
            self.client.clear_local_session()?;
        }
        self.access_token.set(None);
        self.state.set(None);
        result
    }

    fn session_state(&self) -> SessionState {
        self.state.clone()
    }
}

/// Gateway holding the session in process memory.
///
/// Used with the in-memory store for demos and tests.
#[derive(Clone)]
pub struct InMemorySessionGateway {
    state: SessionState,
}

impl InMemorySessionGateway {
    pub fn signed_in(user: AuthUser) -> Self {
        Self {
            state: SessionState::new(Some(user)),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            state: SessionState::new(None),
        }
    }
}

#[async_trait]
impl SessionGateway for InMemorySessionGateway {
    async fn current_user(&self) -> AuthResult<Option<AuthUser>> {
        Ok(self.state.get())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.state.set(None);
        Ok(())
    }

    fn session_state(&self) -> SessionState {
        self.state.clone()
    }
}

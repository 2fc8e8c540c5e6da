//! Shared observable state.
//!
//! Components that need to react to process-wide changes (session ended, list
//! reconciled) are handed an `Observable` instead of listening for ad hoc
//! named events.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::AuthUser;

/// A cloneable handle to a value that publishes every change to its watchers.
#[derive(Debug)]
pub struct Observable<T> {
    sender: Arc<watch::Sender<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T: Clone> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Clone of the current value.
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Replace the value and notify watchers.
    pub fn set(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Mutate in place; watchers are only notified when `modify` returns true.
    pub fn update(&self, modify: impl FnOnce(&mut T) -> bool) -> bool {
        self.sender.send_if_modified(modify)
    }

    /// Replace the value, notifying watchers only when it differs.
    pub fn set_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        self.update(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    pub fn watch(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }
}

/// The signed-in user as seen by every component, `None` once signed out.
pub type SessionState = Observable<Option<AuthUser>>;

/// Bearer token for store requests and realtime channels. `None` falls back
/// to the anon key.
pub type AccessToken = Observable<Option<String>>;

//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Owns the signed-in identity and is the only writer of the stored
//! credential. The gateway reads the credential straight from storage on
//! every request, and [`SessionStore::is_authenticated`] does the same, so a
//! sign-out performed by another process is observed on the next check.
//!
//! LIFECYCLE
//! =========
//! [`SessionStore::mount`] rehydrates the identity snapshot and subscribes to
//! [`AuthEvent::Logout`]. The subscription is dropped with the store, so a
//! remounted store never leaves a stale handler behind.
//!
//! Logout is idempotent: once nothing is stored, further logout requests
//! (for example a burst of 401s from concurrent calls) do nothing.

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use super::events::{AuthEvent, AuthEvents, Subscription};
use super::routes::{Route, guard};
use super::storage::{DurableStorage, IDENTITY_KEY, StorageError, TOKEN_KEY};
use crate::net::api::{AccountApi, ApiError};
use crate::net::types::{AuthPayload, Identity, SignInForm, SignUpForm};
use crate::util::notify::{Notice, Notifier};

pub const SIGNED_OUT_MESSAGE: &str = "You have been signed out";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("identity snapshot could not be encoded: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

struct SessionInner {
    storage: Arc<dyn DurableStorage>,
    identity: Mutex<Option<Identity>>,
    route: watch::Sender<Route>,
    notifier: Arc<dyn Notifier>,
}

pub struct SessionStore {
    inner: Arc<SessionInner>,
    _logout: Subscription,
}

impl SessionStore {
    /// Rehydrate from `storage` and start listening for forced logouts.
    pub fn mount(storage: Arc<dyn DurableStorage>, events: &AuthEvents, notifier: Arc<dyn Notifier>) -> Self {
        let identity = rehydrate(storage.as_ref());
        let initial = guard(Route::Posts, has_credential(storage.as_ref()));
        let (route, _) = watch::channel(initial);
        let inner = Arc::new(SessionInner { storage, identity: Mutex::new(identity), route, notifier });

        let weak = Arc::downgrade(&inner);
        let logout = events.subscribe(AuthEvent::Logout, move |_| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Err(err) = inner.logout() {
                tracing::warn!(%err, "forced logout failed");
            }
        });

        Self { inner, _logout: logout }
    }

    /// True iff a credential is currently stored.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        has_credential(self.inner.storage.as_ref())
    }

    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.inner.identity.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The stored credential, read from storage.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn credential(&self) -> Result<Option<String>, SessionError> {
        Ok(self.inner.storage.get(TOKEN_KEY)?)
    }

    /// Store `identity` and `credential` and navigate to the feed.
    ///
    /// # Errors
    ///
    /// Returns an error if either value cannot be persisted.
    pub fn login(&self, identity: Identity, credential: &str) -> Result<(), SessionError> {
        let snapshot = serde_json::to_string(&identity)?;
        {
            let mut current = self.inner.identity.lock().unwrap_or_else(PoisonError::into_inner);
            self.inner.storage.set(IDENTITY_KEY, &snapshot)?;
            if let Err(err) = self.inner.storage.set(TOKEN_KEY, credential) {
                if let Err(cleanup) = self.inner.storage.remove(IDENTITY_KEY) {
                    tracing::warn!(%cleanup, "identity snapshot left without a credential");
                }
                return Err(err.into());
            }
            tracing::info!(user_id = identity.id, "signed in");
            *current = Some(identity);
        }
        self.inner.route.send_replace(Route::Posts);
        Ok(())
    }

    /// Clear identity and credential and navigate to sign-in.
    ///
    /// Returns `false` when nothing was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be cleared.
    pub fn logout(&self) -> Result<bool, SessionError> {
        self.inner.logout()
    }

    #[must_use]
    pub fn route(&self) -> Route {
        *self.inner.route.borrow()
    }

    #[must_use]
    pub fn watch_route(&self) -> watch::Receiver<Route> {
        self.inner.route.subscribe()
    }

    /// Request `route`; the guard decides where the client lands.
    pub fn navigate(&self, route: Route) -> Route {
        let landed = guard(route, self.is_authenticated());
        self.inner.route.send_replace(landed);
        landed
    }

    /// Sign in through `api` and store the returned session.
    ///
    /// # Errors
    ///
    /// Returns the API error, or a storage error if the session cannot be saved.
    pub async fn sign_in(&self, api: &dyn AccountApi, form: &SignInForm) -> Result<Identity, SessionError> {
        let payload = api.sign_in(form).await?;
        self.accept(payload)
    }

    /// Create an account through `api` and store the returned session.
    ///
    /// # Errors
    ///
    /// Returns the API error, or a storage error if the session cannot be saved.
    pub async fn sign_up(&self, api: &dyn AccountApi, form: &SignUpForm) -> Result<Identity, SessionError> {
        let payload = api.sign_up(form).await?;
        self.accept(payload)
    }

    fn accept(&self, payload: AuthPayload) -> Result<Identity, SessionError> {
        let AuthPayload { user, access_token } = payload;
        self.login(user.clone(), &access_token)?;
        Ok(user)
    }
}

impl SessionInner {
    fn logout(&self) -> Result<bool, SessionError> {
        {
            let mut current = self.identity.lock().unwrap_or_else(PoisonError::into_inner);
            let stored = self.storage.get(TOKEN_KEY)?.is_some() || self.storage.get(IDENTITY_KEY)?.is_some();
            if current.is_none() && !stored {
                return Ok(false);
            }
            self.storage.remove(TOKEN_KEY)?;
            self.storage.remove(IDENTITY_KEY)?;
            *current = None;
        }
        tracing::info!("signed out");
        self.route.send_replace(Route::SignIn);
        self.notifier.notify(Notice::success(SIGNED_OUT_MESSAGE));
        Ok(true)
    }
}

fn has_credential(storage: &dyn DurableStorage) -> bool {
    match storage.get(TOKEN_KEY) {
        Ok(token) => token.is_some(),
        Err(err) => {
            tracing::warn!(%err, "credential unreadable; treating as signed out");
            false
        }
    }
}

/// Load the identity snapshot. A corrupt snapshot is discarded together with
/// the credential, leaving the client signed out.
fn rehydrate(storage: &dyn DurableStorage) -> Option<Identity> {
    let raw = match storage.get(IDENTITY_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(%err, "identity snapshot unreadable");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(identity) => Some(identity),
        Err(err) => {
            tracing::warn!(%err, "discarding corrupt identity snapshot");
            for key in [IDENTITY_KEY, TOKEN_KEY] {
                if let Err(err) = storage.remove(key) {
                    tracing::warn!(%err, key, "stale session entry could not be removed");
                }
            }
            None
        }
    }
}

//! Process-wide auth event channel.
//!
//! DESIGN
//! ======
//! The gateway detects an invalid credential but does not own the session;
//! the session owns logout but does not see responses. [`AuthEvents`] sits
//! between them: a cloneable handle passed to both at construction, so there
//! is no hidden global.
//!
//! A handler stays registered for as long as its [`Subscription`] lives.
//! Handlers run synchronously on the publishing task, outside the registry
//! lock, so a handler may itself publish or drop subscriptions.

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;

use std::sync::{Arc, Mutex, PoisonError, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthEvent {
    /// The backend rejected the stored credential.
    Logout,
}

type Handler = Arc<dyn Fn(AuthEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, AuthEvent, Handler)>,
}

#[derive(Clone, Default)]
pub struct AuthEvents {
    registry: Arc<Mutex<Registry>>,
}

impl AuthEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`. Dropping the returned guard unsubscribes.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, event: AuthEvent, handler: F) -> Subscription
    where
        F: Fn(AuthEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.push((id, event, Arc::new(handler)));
        Subscription { registry: Arc::downgrade(&self.registry), id }
    }

    /// Invoke every handler subscribed to `event`. Returns how many ran.
    pub fn publish(&self, event: AuthEvent) -> usize {
        let matching: Vec<Handler> = {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry
                .handlers
                .iter()
                .filter(|(_, e, _)| *e == event)
                .map(|(_, _, h)| Arc::clone(h))
                .collect()
        };
        tracing::debug!(?event, handlers = matching.len(), "auth event published");
        for handler in &matching {
            handler(event);
        }
        matching.len()
    }

    #[must_use]
    pub fn subscriber_count(&self, event: AuthEvent) -> usize {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.handlers.iter().filter(|(_, e, _)| *e == event).count()
    }
}

/// Live registration on an [`AuthEvents`] channel.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    id: u64,
}

impl Subscription {
    /// Remove the handler now. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.handlers.retain(|(id, _, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

//! Client routes and the authentication guard that picks between them.

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    SignIn,
    SignUp,
    Posts,
}

impl Route {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::SignIn => "/sign-in",
            Self::SignUp => "/sign-up",
            Self::Posts => "/posts",
        }
    }

    #[must_use]
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::Posts)
    }
}

/// Where a request for `requested` actually lands.
///
/// The feed needs a credential; the sign-in and sign-up pages bounce an
/// already authenticated user to the feed.
#[must_use]
pub fn guard(requested: Route, authenticated: bool) -> Route {
    match (requested.requires_auth(), authenticated) {
        (true, false) => Route::SignIn,
        (false, true) => Route::Posts,
        _ => requested,
    }
}

//! Wire DTOs for the feed backend.
//!
//! DESIGN
//! ======
//! Every endpoint answers with the same [`Envelope`]. Entities mirror the
//! backend's JSON field names so serde round-trips stay lossless; timestamps
//! are kept as the ISO-8601 strings the server sends and parsed only where a
//! caller needs them (see `util::time_ago`).

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type PostId = i64;
pub type CommentId = i64;

// =============================================================================
// ENVELOPE
// =============================================================================

/// Uniform response wrapper used by success and error responses alike.
///
/// Missing fields default so that partial error bodies still
/// parse and the gateway can decide what to surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub ok: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Vec<String>,
}

impl<T> Envelope<T> {
    /// Envelope for a response with no body.
    #[must_use]
    pub fn empty(ok: bool) -> Self {
        Self { ok, data: None, message: None, details: Vec::new() }
    }

    /// Message text if present and non-blank.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// The authenticated user's profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
    /// Author.
    pub user: Identity,
    /// Oldest first; new comments are appended.
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
    /// Author.
    pub user: Identity,
    pub post_id: PostId,
}

/// Pagination bookkeeping returned alongside a page of posts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_count: u64,
}

/// `data` payload of `GET /posts`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostsPage {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
}

/// `data` payload of the sign-in and sign-up endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub user: Identity,
    pub access_token: String,
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentDraft {
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Account endpoints nest the form under a `user` key.
#[derive(Debug, Serialize)]
pub(crate) struct UserScoped<'a, T> {
    pub user: &'a T,
}

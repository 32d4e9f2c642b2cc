//! REST surface of the feed backend: endpoint paths, errors, and the async
//! traits the session and feed controller are written against.
//!
//! DESIGN
//! ======
//! `HttpGateway` is the production implementation. Tests substitute in-memory
//! fakes, so nothing above this module needs a live server.

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;

use super::types::{
    AuthPayload, Comment, CommentDraft, CommentId, Post, PostDraft, PostId, PostsPage, SignInForm, SignUpForm,
};

pub const USERS_PATH: &str = "/users";
pub const SIGN_IN_PATH: &str = "/users/sign_in";
pub const POSTS_PATH: &str = "/posts";

#[must_use]
pub fn post_path(post_id: PostId) -> String {
    format!("/posts/{post_id}")
}

#[must_use]
pub fn comments_path(post_id: PostId) -> String {
    format!("/posts/{post_id}/comments")
}

#[must_use]
pub fn comment_path(post_id: PostId, comment_id: CommentId) -> String {
    format!("/posts/{post_id}/comments/{comment_id}")
}

/// Query string for one page of the posts list.
#[must_use]
pub fn page_query(page: u32, limit: u32) -> [(&'static str, String); 2] {
    [("page", page.to_string()), ("limit", limit.to_string())]
}

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by gateway calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response was received.
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status or an `ok: false` envelope.
    #[error("server rejected request (status {status}): {}", .message.as_deref().unwrap_or("no message"))]
    Status { status: u16, message: Option<String>, details: Vec<String> },

    /// The body did not match the expected envelope or payload shape.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The stored credential cannot be sent as an `Authorization` header.
    #[error("credential is not a valid header value: {0}")]
    InvalidHeader(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the backend reported the credential invalid.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

// =============================================================================
// TRAITS
// =============================================================================

/// Account endpoints. There is no sign-out call; logout is local.
#[async_trait::async_trait]
pub trait AccountApi: Send + Sync {
    /// `POST /users`
    async fn sign_up(&self, form: &SignUpForm) -> Result<AuthPayload, ApiError>;

    /// `POST /users/sign_in`
    async fn sign_in(&self, form: &SignInForm) -> Result<AuthPayload, ApiError>;
}

/// Post and comment endpoints.
#[async_trait::async_trait]
pub trait FeedApi: Send + Sync {
    async fn list_posts(&self, page: u32, limit: u32) -> Result<PostsPage, ApiError>;
    async fn get_post(&self, post_id: PostId) -> Result<Post, ApiError>;
    async fn create_post(&self, draft: &PostDraft) -> Result<Post, ApiError>;
    async fn update_post(&self, post_id: PostId, patch: &PostDraft) -> Result<Post, ApiError>;
    async fn delete_post(&self, post_id: PostId) -> Result<(), ApiError>;

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError>;
    async fn get_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<Comment, ApiError>;
    async fn create_comment(&self, post_id: PostId, draft: &CommentDraft) -> Result<Comment, ApiError>;
    async fn update_comment(
        &self,
        post_id: PostId,
        comment_id: CommentId,
        patch: &CommentDraft,
    ) -> Result<Comment, ApiError>;
    async fn delete_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<(), ApiError>;
}

#[async_trait::async_trait]
impl<T: FeedApi + ?Sized> FeedApi for std::sync::Arc<T> {
    async fn list_posts(&self, page: u32, limit: u32) -> Result<PostsPage, ApiError> {
        (**self).list_posts(page, limit).await
    }

    async fn get_post(&self, post_id: PostId) -> Result<Post, ApiError> {
        (**self).get_post(post_id).await
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<Post, ApiError> {
        (**self).create_post(draft).await
    }

    async fn update_post(&self, post_id: PostId, patch: &PostDraft) -> Result<Post, ApiError> {
        (**self).update_post(post_id, patch).await
    }

    async fn delete_post(&self, post_id: PostId) -> Result<(), ApiError> {
        (**self).delete_post(post_id).await
    }

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError> {
        (**self).list_comments(post_id).await
    }

    async fn get_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<Comment, ApiError> {
        (**self).get_comment(post_id, comment_id).await
    }

    async fn create_comment(&self, post_id: PostId, draft: &CommentDraft) -> Result<Comment, ApiError> {
        (**self).create_comment(post_id, draft).await
    }

    async fn update_comment(
        &self,
        post_id: PostId,
        comment_id: CommentId,
        patch: &CommentDraft,
    ) -> Result<Comment, ApiError> {
        (**self).update_comment(post_id, comment_id, patch).await
    }

    async fn delete_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<(), ApiError> {
        (**self).delete_comment(post_id, comment_id).await
    }
}

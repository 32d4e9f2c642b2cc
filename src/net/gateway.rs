//! Authenticated HTTP gateway to the feed backend.
//!
//! ARCHITECTURE
//! ============
//! Every call goes through [`HttpGateway::dispatch`], which
//! 1. attaches `Authorization: Bearer <credential>` when one is stored,
//!    refusing to send when the stored value is not a valid header,
//! 2. reads the [`Envelope`] from success and error bodies alike,
//! 3. surfaces the envelope message as a notice (generic text for an error
//!    without one),
//! 4. publishes [`AuthEvent::Logout`] on 401,
//! 5. returns the error to the caller after those side effects.
//!
//! ERROR HANDLING
//! ==============
//! Nothing is retried. A failed call is reported once and handed back.

#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::api::{
    AccountApi, ApiError, FeedApi, POSTS_PATH, SIGN_IN_PATH, USERS_PATH, comment_path, comments_path, page_query,
    post_path,
};
use super::types::{
    AuthPayload, Comment, CommentDraft, CommentId, Envelope, Post, PostDraft, PostId, PostsPage, SignInForm,
    SignUpForm, UserScoped,
};
use crate::config::ClientConfig;
use crate::state::events::{AuthEvent, AuthEvents};
use crate::state::storage::{DurableStorage, TOKEN_KEY};
use crate::util::notify::{Notice, Notifier, UNEXPECTED_ERROR};

pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    storage: Arc<dyn DurableStorage>,
    events: AuthEvents,
    notifier: Arc<dyn Notifier>,
}

impl HttpGateway {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        storage: Arc<dyn DurableStorage>,
        events: AuthEvents,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.clone(), storage, events, notifier })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let request = self.http.request(method, url);
        let token = match self.storage.get(TOKEN_KEY) {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(request),
            Err(err) => {
                tracing::warn!(%err, "credential unreadable; sending anonymously");
                return Ok(request);
            }
        };
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                Ok(request.header(AUTHORIZATION, value))
            }
            Err(err) => {
                tracing::warn!(%err, "stored credential is not a valid header value");
                self.notifier.notify(Notice::error(UNEXPECTED_ERROR));
                Err(ApiError::InvalidHeader(err.to_string()))
            }
        }
    }

    /// Send `request` and return the envelope's `data` on success.
    async fn dispatch(&self, request: RequestBuilder) -> Result<Option<Value>, ApiError> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%err, "request failed before a response");
                self.notifier.notify(Notice::error(UNEXPECTED_ERROR));
                return Err(ApiError::Transport(err.to_string()));
            }
        };

        let status = response.status();
        let url = response.url().path().to_owned();
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(%err, %status, "response body unreadable");
                self.notifier.notify(Notice::error(UNEXPECTED_ERROR));
                return Err(ApiError::Transport(err.to_string()));
            }
        };
        let envelope = parse_envelope(status, &text);
        let succeeded = status.is_success() && envelope.ok;
        tracing::debug!(%status, path = %url, succeeded, "response");

        self.surface(succeeded, envelope.message());

        if status == StatusCode::UNAUTHORIZED {
            self.events.publish(AuthEvent::Logout);
        }

        if !succeeded {
            tracing::warn!(%status, path = %url, "request rejected");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: envelope.message().map(str::to_owned),
                details: envelope.details,
            });
        }
        Ok(envelope.data)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let data = self.dispatch(request).await?;
        serde_json::from_value(data.unwrap_or(Value::Null)).map_err(|err| {
            tracing::warn!(%err, "response data did not match expected shape");
            ApiError::Decode(err.to_string())
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.dispatch(request).await.map(|_| ())
    }

    fn surface(&self, succeeded: bool, message: Option<&str>) {
        match (succeeded, message) {
            (true, Some(text)) => self.notifier.notify(Notice::success(text)),
            (true, None) => {}
            (false, Some(text)) => self.notifier.notify(Notice::error(text)),
            (false, None) => self.notifier.notify(Notice::error(UNEXPECTED_ERROR)),
        }
    }
}

/// A blank body counts as an envelope whose `ok` follows the status; an
/// unparseable body counts as a failed envelope with no message.
fn parse_envelope(status: StatusCode, text: &str) -> Envelope<Value> {
    if text.trim().is_empty() {
        return Envelope::empty(status.is_success());
    }
    serde_json::from_str(text).unwrap_or_else(|_| Envelope::empty(false))
}

#[async_trait::async_trait]
impl AccountApi for HttpGateway {
    async fn sign_up(&self, form: &SignUpForm) -> Result<AuthPayload, ApiError> {
        self.fetch(self.request(Method::POST, USERS_PATH)?.json(&UserScoped { user: form })).await
    }

    async fn sign_in(&self, form: &SignInForm) -> Result<AuthPayload, ApiError> {
        self.fetch(self.request(Method::POST, SIGN_IN_PATH)?.json(&UserScoped { user: form })).await
    }
}

#[async_trait::async_trait]
impl FeedApi for HttpGateway {
    async fn list_posts(&self, page: u32, limit: u32) -> Result<PostsPage, ApiError> {
        let query = page_query(page, limit);
        self.fetch(self.request(Method::GET, POSTS_PATH)?.query(&query[..])).await
    }

    async fn get_post(&self, post_id: PostId) -> Result<Post, ApiError> {
        self.fetch(self.request(Method::GET, &post_path(post_id))?).await
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<Post, ApiError> {
        self.fetch(self.request(Method::POST, POSTS_PATH)?.json(draft)).await
    }

    async fn update_post(&self, post_id: PostId, patch: &PostDraft) -> Result<Post, ApiError> {
        self.fetch(self.request(Method::PUT, &post_path(post_id))?.json(patch)).await
    }

    async fn delete_post(&self, post_id: PostId) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &post_path(post_id))?).await
    }

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError> {
        self.fetch(self.request(Method::GET, &comments_path(post_id))?).await
    }

    async fn get_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<Comment, ApiError> {
        self.fetch(self.request(Method::GET, &comment_path(post_id, comment_id))?).await
    }

    async fn create_comment(&self, post_id: PostId, draft: &CommentDraft) -> Result<Comment, ApiError> {
        self.fetch(self.request(Method::POST, &comments_path(post_id))?.json(draft)).await
    }

    async fn update_comment(
        &self,
        post_id: PostId,
        comment_id: CommentId,
        patch: &CommentDraft,
    ) -> Result<Comment, ApiError> {
        self.fetch(self.request(Method::PUT, &comment_path(post_id, comment_id))?.json(patch)).await
    }

    async fn delete_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &comment_path(post_id, comment_id))?).await
    }
}

//! Paginated post/comment feed state.
//!
//! DESIGN
//! ======
//! The controller holds the posts loaded so far (each with its comments) and
//! the page cursor, and applies each successful mutation to that list
//! locally instead of refetching:
//! - pages append in the order they were requested,
//! - a new post goes to the head, a new comment to its post's tail,
//! - edits replace by id in place, deletes remove by id.
//!
//! In-flight actions are tracked per [`FeedAction`]. Starting an action that
//! is already running (or that needs a fetch while one is running) fails
//! with [`FeedError::Busy`] before any request is sent. The flag is owned by
//! an RAII guard, so it clears when the request finishes or its future is
//! dropped.
//!
//! TRADE-OFFS
//! ==========
//! Mutation responses are trusted as-is. Two racing mutations of the same
//! entity are not reconciled; the last response applied wins.
//! [`FeedController::refresh_post`] re-reads a single post when a caller
//! wants server truth back.

#[cfg(test)]
#[path = "feed_test.rs"]
mod tests;

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::permissions::{can_delete_comment, can_delete_post, can_edit_comment, can_edit_post};
use crate::net::api::{ApiError, FeedApi};
use crate::net::types::{Comment, CommentDraft, CommentId, Identity, Post, PostDraft, PostId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeedAction {
    FetchPage,
    Reload,
    LoadMore,
    RefreshPost,
    CreatePost,
    EditPost,
    DeletePost,
    CreateComment,
    EditComment,
    DeleteComment,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("{0:?} is already in progress")]
    Busy(FeedAction),

    #[error("not permitted for the current viewer")]
    Forbidden,

    #[error("post {0} is not loaded")]
    PostNotFound(PostId),

    #[error("comment {comment_id} is not loaded under post {post_id}")]
    CommentNotFound { post_id: PostId, comment_id: CommentId },

    #[error("comment body is empty")]
    EmptyComment,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Page bookkeeping. `current_page` is 0 until the first page lands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    pub current_page: u32,
    pub total_count: u64,
}

/// What a delete confirmation is being asked about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteTarget {
    Post(Post),
    Comment(Comment),
}

impl DeleteTarget {
    #[must_use]
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Post(_) => "Are you sure you want to delete this post?",
            Self::Comment(_) => "Are you sure you want to delete this comment?",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Declined,
}

#[derive(Default)]
struct FeedState {
    posts: Vec<Post>,
    cursor: Cursor,
    in_flight: HashSet<FeedAction>,
}

impl FeedState {
    fn post(&self, post_id: PostId) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == post_id)
    }

    fn post_mut(&mut self, post_id: PostId) -> Option<&mut Post> {
        self.posts.iter_mut().find(|p| p.id == post_id)
    }

    fn has_more(&self) -> bool {
        (self.posts.len() as u64) < self.cursor.total_count
    }
}

/// Clears its actions from the in-flight set on drop.
struct InFlight<'a> {
    state: &'a Mutex<FeedState>,
    actions: &'static [FeedAction],
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for action in self.actions {
            state.in_flight.remove(action);
        }
    }
}

pub struct FeedController<A> {
    api: A,
    limit: u32,
    viewer: Mutex<Option<Identity>>,
    state: Mutex<FeedState>,
}

impl<A: FeedApi> FeedController<A> {
    #[must_use]
    pub fn new(api: A, limit: u32, viewer: Option<Identity>) -> Self {
        Self { api, limit: limit.max(1), viewer: Mutex::new(viewer), state: Mutex::new(FeedState::default()) }
    }

    pub fn set_viewer(&self, viewer: Option<Identity>) {
        *self.viewer.lock().unwrap_or_else(PoisonError::into_inner) = viewer;
    }

    #[must_use]
    pub fn viewer(&self) -> Option<Identity> {
        self.viewer.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn posts(&self) -> Vec<Post> {
        self.lock().posts.clone()
    }

    #[must_use]
    pub fn post(&self, post_id: PostId) -> Option<Post> {
        self.lock().post(post_id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().posts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().posts.is_empty()
    }

    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.lock().cursor
    }

    /// More posts exist on the server than are loaded.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.lock().has_more()
    }

    #[must_use]
    pub fn is_busy(&self, action: FeedAction) -> bool {
        self.lock().in_flight.contains(&action)
    }

    // =========================================================================
    // PAGINATION
    // =========================================================================

    /// Fetch `page` and append it. Returns how many posts were appended.
    ///
    /// # Errors
    ///
    /// `Busy` if a fetch is running, otherwise the API error.
    pub async fn load_page(&self, page: u32) -> Result<usize, FeedError> {
        let _guard = self.begin(&[FeedAction::FetchPage])?;
        self.fetch_and_append(page).await
    }

    /// Empty the list and load page 1 again.
    ///
    /// # Errors
    ///
    /// `Busy` if a fetch or reload is running, otherwise the API error. The
    /// list stays empty when the fetch fails.
    pub async fn reload(&self) -> Result<usize, FeedError> {
        let _guard = self.begin(&[FeedAction::Reload, FeedAction::FetchPage])?;
        {
            let mut state = self.lock();
            state.posts.clear();
            state.cursor = Cursor::default();
        }
        tracing::debug!("feed reset");
        self.fetch_and_append(1).await
    }

    /// Append the next page if the server has more. Before any page has
    /// loaded this loads page 1.
    ///
    /// # Errors
    ///
    /// `Busy` if a fetch is running, otherwise the API error. The cursor
    /// does not advance on failure.
    pub async fn load_more(&self) -> Result<usize, FeedError> {
        let _guard = self.begin(&[FeedAction::LoadMore, FeedAction::FetchPage])?;
        let next = {
            let state = self.lock();
            if state.cursor.current_page > 0 && !state.has_more() {
                return Ok(0);
            }
            state.cursor.current_page + 1
        };
        self.fetch_and_append(next).await
    }

    async fn fetch_and_append(&self, page: u32) -> Result<usize, FeedError> {
        let fetched = self.api.list_posts(page, self.limit).await?;
        let appended = fetched.posts.len();
        let mut state = self.lock();
        state.posts.extend(fetched.posts);
        state.cursor = Cursor { current_page: page, total_count: fetched.pagination.total_count };
        tracing::debug!(page, appended, total = state.cursor.total_count, "page appended");
        Ok(appended)
    }

    /// Re-read one loaded post from the server and replace it in place.
    ///
    /// # Errors
    ///
    /// `PostNotFound` if the post is not loaded, otherwise the API error.
    pub async fn refresh_post(&self, post_id: PostId) -> Result<Post, FeedError> {
        let _guard = self.begin(&[FeedAction::RefreshPost])?;
        self.require_post(post_id)?;
        let fresh = self.api.get_post(post_id).await?;
        self.replace_post(fresh.clone());
        Ok(fresh)
    }

    /// Fetch one post by id so it can be mutated without paging to it. A
    /// loaded copy is replaced in place, otherwise the post is appended.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn open_post(&self, post_id: PostId) -> Result<Post, FeedError> {
        let _guard = self.begin(&[FeedAction::RefreshPost])?;
        let fresh = self.api.get_post(post_id).await?;
        let mut state = self.lock();
        match state.post_mut(post_id) {
            Some(slot) => *slot = fresh.clone(),
            None => state.posts.push(fresh.clone()),
        }
        Ok(fresh)
    }

    // =========================================================================
    // POSTS
    // =========================================================================

    /// Create a post and put it at the head of the list.
    ///
    /// # Errors
    ///
    /// `Busy` if a create is running, otherwise the API error.
    pub async fn create_post(&self, draft: &PostDraft) -> Result<Post, FeedError> {
        let _guard = self.begin(&[FeedAction::CreatePost])?;
        let created = self.api.create_post(draft).await?;
        tracing::info!(post_id = created.id, "post created");
        self.lock().posts.insert(0, created.clone());
        Ok(created)
    }

    /// Update a post the viewer authored and replace it in place.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the viewer wrote the post, `PostNotFound` if it is
    /// not loaded, otherwise the API error.
    pub async fn edit_post(&self, post_id: PostId, patch: &PostDraft) -> Result<Post, FeedError> {
        let _guard = self.begin(&[FeedAction::EditPost])?;
        let post = self.require_post(post_id)?;
        if !can_edit_post(self.viewer().as_ref(), &post) {
            return Err(FeedError::Forbidden);
        }
        let updated = self.api.update_post(post_id, patch).await?;
        tracing::info!(post_id, "post updated");
        self.replace_post(updated.clone());
        Ok(updated)
    }

    /// Delete a post the viewer authored once `confirm` agrees.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the viewer wrote the post, `PostNotFound` if it is
    /// not loaded, otherwise the API error.
    pub async fn delete_post<F>(&self, post_id: PostId, confirm: F) -> Result<DeleteOutcome, FeedError>
    where
        F: FnOnce(&DeleteTarget) -> bool + Send,
    {
        let _guard = self.begin(&[FeedAction::DeletePost])?;
        let post = self.require_post(post_id)?;
        if !can_delete_post(self.viewer().as_ref(), &post) {
            return Err(FeedError::Forbidden);
        }
        if !confirm(&DeleteTarget::Post(post)) {
            return Ok(DeleteOutcome::Declined);
        }
        self.api.delete_post(post_id).await?;
        tracing::info!(post_id, "post deleted");
        self.lock().posts.retain(|p| p.id != post_id);
        Ok(DeleteOutcome::Deleted)
    }

    // =========================================================================
    // COMMENTS
    // =========================================================================

    /// Add a comment to the tail of a loaded post's comments.
    ///
    /// # Errors
    ///
    /// `EmptyComment` for a blank body, `PostNotFound` if the post is not
    /// loaded, otherwise the API error.
    pub async fn create_comment(&self, post_id: PostId, body: &str) -> Result<Comment, FeedError> {
        if body.trim().is_empty() {
            return Err(FeedError::EmptyComment);
        }
        let _guard = self.begin(&[FeedAction::CreateComment])?;
        self.require_post(post_id)?;
        let draft = CommentDraft { body: body.to_owned() };
        let created = self.api.create_comment(post_id, &draft).await?;
        tracing::info!(post_id, comment_id = created.id, "comment created");
        if let Some(post) = self.lock().post_mut(post_id) {
            post.comments.push(created.clone());
        }
        Ok(created)
    }

    /// Update a comment the viewer authored and replace it in place.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the viewer wrote the comment, `PostNotFound` /
    /// `CommentNotFound` if it is not loaded, otherwise the API error.
    pub async fn edit_comment(
        &self,
        post_id: PostId,
        comment_id: CommentId,
        patch: &CommentDraft,
    ) -> Result<Comment, FeedError> {
        let _guard = self.begin(&[FeedAction::EditComment])?;
        let (_, comment) = self.require_comment(post_id, comment_id)?;
        if !can_edit_comment(self.viewer().as_ref(), &comment) {
            return Err(FeedError::Forbidden);
        }
        let updated = self.api.update_comment(post_id, comment_id, patch).await?;
        tracing::info!(post_id, comment_id, "comment updated");
        if let Some(post) = self.lock().post_mut(post_id) {
            if let Some(slot) = post.comments.iter_mut().find(|c| c.id == comment_id) {
                *slot = updated.clone();
            }
        }
        Ok(updated)
    }

    /// Delete a comment once `confirm` agrees. Allowed for the comment's
    /// author and for the author of the post it belongs to.
    ///
    /// # Errors
    ///
    /// `Forbidden` for anyone else, `PostNotFound` / `CommentNotFound` if it
    /// is not loaded, otherwise the API error.
    pub async fn delete_comment<F>(
        &self,
        post_id: PostId,
        comment_id: CommentId,
        confirm: F,
    ) -> Result<DeleteOutcome, FeedError>
    where
        F: FnOnce(&DeleteTarget) -> bool + Send,
    {
        let _guard = self.begin(&[FeedAction::DeleteComment])?;
        let (post, comment) = self.require_comment(post_id, comment_id)?;
        if !can_delete_comment(self.viewer().as_ref(), &post, &comment) {
            return Err(FeedError::Forbidden);
        }
        if !confirm(&DeleteTarget::Comment(comment)) {
            return Ok(DeleteOutcome::Declined);
        }
        self.api.delete_comment(post_id, comment_id).await?;
        tracing::info!(post_id, comment_id, "comment deleted");
        if let Some(post) = self.lock().post_mut(post_id) {
            post.comments.retain(|c| c.id != comment_id);
        }
        Ok(DeleteOutcome::Deleted)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, actions: &'static [FeedAction]) -> Result<InFlight<'_>, FeedError> {
        let mut state = self.lock();
        if let Some(busy) = actions.iter().find(|a| state.in_flight.contains(a)) {
            return Err(FeedError::Busy(*busy));
        }
        state.in_flight.extend(actions.iter().copied());
        Ok(InFlight { state: &self.state, actions })
    }

    fn require_post(&self, post_id: PostId) -> Result<Post, FeedError> {
        self.lock().post(post_id).cloned().ok_or(FeedError::PostNotFound(post_id))
    }

    fn require_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<(Post, Comment), FeedError> {
        let post = self.require_post(post_id)?;
        let comment = post
            .comments
            .iter()
            .find(|c| c.id == comment_id)
            .cloned()
            .ok_or(FeedError::CommentNotFound { post_id, comment_id })?;
        Ok((post, comment))
    }

    /// Replace the loaded post with the same id. A post removed meanwhile
    /// stays removed.
    fn replace_post(&self, updated: Post) {
        if let Some(slot) = self.lock().post_mut(updated.id) {
            *slot = updated;
        }
    }
}

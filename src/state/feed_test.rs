use super::*;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

use crate::net::types::{Pagination, PostsPage};
use crate::test_helpers::{comment, identity, post};

// =============================================================================
// FAKE BACKEND
// =============================================================================

/// In-memory backend. Posts are kept newest first, like the real list.
struct FakeFeed {
    server: Mutex<Vec<Post>>,
    author: Identity,
    next_id: AtomicI64,
    calls: Mutex<Vec<String>>,
    fail_next: Mutex<Option<u16>>,
    hold_lists: AtomicBool,
    gate: Notify,
}

impl FakeFeed {
    /// `count` posts by `author`, ids `count..=1`.
    fn seeded(author: &Identity, count: i64) -> Arc<Self> {
        let posts = (1..=count).rev().map(|id| post(id, author)).collect();
        Arc::new(Self {
            server: Mutex::new(posts),
            author: author.clone(),
            next_id: AtomicI64::new(1000),
            calls: Mutex::default(),
            fail_next: Mutex::default(),
            hold_lists: AtomicBool::new(false),
            gate: Notify::new(),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn fail_next(&self, status: u16) {
        *self.fail_next.lock().unwrap() = Some(status);
    }

    fn hold_lists(&self) {
        self.hold_lists.store(true, Ordering::SeqCst);
    }

    fn release_lists(&self) {
        self.hold_lists.store(false, Ordering::SeqCst);
        self.gate.notify_one();
    }

    fn add_server_comment(&self, post_id: PostId, c: Comment) {
        let mut server = self.server.lock().unwrap();
        let post = server.iter_mut().find(|p| p.id == post_id).unwrap();
        post.comments.push(c);
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn enter(&self, call: String) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        let failure = self.fail_next.lock().unwrap().take();
        match failure {
            Some(status) => Err(ApiError::Status { status, message: None, details: Vec::new() }),
            None => Ok(()),
        }
    }

    fn missing() -> ApiError {
        ApiError::Status { status: 404, message: Some("Not found".into()), details: Vec::new() }
    }
}

#[async_trait::async_trait]
impl FeedApi for FakeFeed {
    async fn list_posts(&self, page: u32, limit: u32) -> Result<PostsPage, ApiError> {
        if self.hold_lists.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        self.enter(format!("list {page}"))?;
        let server = self.server.lock().unwrap();
        let skip = ((page.max(1) - 1) * limit) as usize;
        let posts = server.iter().skip(skip).take(limit as usize).cloned().collect();
        Ok(PostsPage { posts, pagination: Pagination { current_page: page, total_count: server.len() as u64 } })
    }

    async fn get_post(&self, post_id: PostId) -> Result<Post, ApiError> {
        self.enter(format!("get {post_id}"))?;
        let server = self.server.lock().unwrap();
        server.iter().find(|p| p.id == post_id).cloned().ok_or_else(Self::missing)
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<Post, ApiError> {
        self.enter("create_post".into())?;
        let mut created = post(self.next_id(), &self.author);
        created.title.clone_from(&draft.title);
        created.body.clone_from(&draft.body);
        self.server.lock().unwrap().insert(0, created.clone());
        Ok(created)
    }

    async fn update_post(&self, post_id: PostId, patch: &PostDraft) -> Result<Post, ApiError> {
        self.enter(format!("update_post {post_id}"))?;
        let mut server = self.server.lock().unwrap();
        let post = server.iter_mut().find(|p| p.id == post_id).ok_or_else(Self::missing)?;
        post.title.clone_from(&patch.title);
        post.body.clone_from(&patch.body);
        Ok(post.clone())
    }

    async fn delete_post(&self, post_id: PostId) -> Result<(), ApiError> {
        self.enter(format!("delete_post {post_id}"))?;
        self.server.lock().unwrap().retain(|p| p.id != post_id);
        Ok(())
    }

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError> {
        self.enter(format!("list_comments {post_id}"))?;
        let server = self.server.lock().unwrap();
        server.iter().find(|p| p.id == post_id).map(|p| p.comments.clone()).ok_or_else(Self::missing)
    }

    async fn get_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<Comment, ApiError> {
        self.enter(format!("get_comment {comment_id}"))?;
        let server = self.server.lock().unwrap();
        server
            .iter()
            .find(|p| p.id == post_id)
            .and_then(|p| p.comments.iter().find(|c| c.id == comment_id).cloned())
            .ok_or_else(Self::missing)
    }

    async fn create_comment(&self, post_id: PostId, draft: &CommentDraft) -> Result<Comment, ApiError> {
        self.enter(format!("create_comment {post_id}"))?;
        let mut created = comment(self.next_id(), post_id, &self.author);
        created.body.clone_from(&draft.body);
        let mut server = self.server.lock().unwrap();
        let post = server.iter_mut().find(|p| p.id == post_id).ok_or_else(Self::missing)?;
        post.comments.push(created.clone());
        Ok(created)
    }

    async fn update_comment(
        &self,
        post_id: PostId,
        comment_id: CommentId,
        patch: &CommentDraft,
    ) -> Result<Comment, ApiError> {
        self.enter(format!("update_comment {comment_id}"))?;
        let mut server = self.server.lock().unwrap();
        let found = server
            .iter_mut()
            .find(|p| p.id == post_id)
            .and_then(|p| p.comments.iter_mut().find(|c| c.id == comment_id))
            .ok_or_else(Self::missing)?;
        found.body.clone_from(&patch.body);
        Ok(found.clone())
    }

    async fn delete_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<(), ApiError> {
        self.enter(format!("delete_comment {comment_id}"))?;
        let mut server = self.server.lock().unwrap();
        if let Some(post) = server.iter_mut().find(|p| p.id == post_id) {
            post.comments.retain(|c| c.id != comment_id);
        }
        Ok(())
    }
}

fn ids(ctrl: &FeedController<Arc<FakeFeed>>) -> Vec<PostId> {
    ctrl.posts().iter().map(|p| p.id).collect()
}

fn controller(fake: &Arc<FakeFeed>, viewer: &Identity) -> FeedController<Arc<FakeFeed>> {
    FeedController::new(fake.clone(), 5, Some(viewer.clone()))
}

// =============================================================================
// pagination
// =============================================================================

#[tokio::test]
async fn pages_append_in_request_order() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 12);
    let ctrl = controller(&fake, &ada);

    assert_eq!(ctrl.load_page(1).await.unwrap(), 5);
    assert_eq!(ctrl.load_page(2).await.unwrap(), 5);

    assert_eq!(ids(&ctrl), vec![12, 11, 10, 9, 8, 7, 6, 5, 4, 3]);
    assert_eq!(ctrl.cursor(), Cursor { current_page: 2, total_count: 12 });
    assert!(ctrl.has_more());
}

#[tokio::test]
async fn load_more_before_any_page_loads_first() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 3);
    let ctrl = controller(&fake, &ada);
    assert!(!ctrl.has_more());

    assert_eq!(ctrl.load_more().await.unwrap(), 3);

    assert_eq!(fake.calls(), vec!["list 1".to_owned()]);
    assert!(!ctrl.has_more());
}

#[tokio::test]
async fn load_more_stops_when_everything_is_loaded() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 12);
    let ctrl = controller(&fake, &ada);

    assert_eq!(ctrl.load_more().await.unwrap(), 5);
    assert_eq!(ctrl.load_more().await.unwrap(), 5);
    assert_eq!(ctrl.load_more().await.unwrap(), 2);
    assert!(!ctrl.has_more());
    assert_eq!(ctrl.load_more().await.unwrap(), 0);

    assert_eq!(fake.count_calls("list"), 3);
    assert_eq!(ctrl.len(), 12);
}

#[tokio::test]
async fn reload_discards_loaded_pages() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 12);
    let ctrl = controller(&fake, &ada);
    ctrl.load_more().await.unwrap();
    ctrl.load_more().await.unwrap();

    assert_eq!(ctrl.reload().await.unwrap(), 5);

    assert_eq!(ids(&ctrl), vec![12, 11, 10, 9, 8]);
    assert_eq!(ctrl.cursor().current_page, 1);
}

#[tokio::test]
async fn failed_page_leaves_cursor_in_place() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 12);
    let ctrl = controller(&fake, &ada);
    ctrl.load_more().await.unwrap();

    fake.fail_next(500);
    let err = ctrl.load_more().await.unwrap_err();

    assert!(matches!(err, FeedError::Api(ref e) if e.status() == Some(500)));
    assert_eq!(ctrl.cursor(), Cursor { current_page: 1, total_count: 12 });
    assert_eq!(ctrl.len(), 5);

    ctrl.load_more().await.unwrap();
    assert_eq!(fake.calls().last().map(String::as_str), Some("list 2"));
}

#[tokio::test]
async fn failed_reload_leaves_list_empty() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 7);
    let ctrl = controller(&fake, &ada);
    ctrl.load_more().await.unwrap();

    fake.fail_next(503);
    assert!(ctrl.reload().await.is_err());

    assert!(ctrl.is_empty());
    assert_eq!(ctrl.cursor(), Cursor::default());
}

// =============================================================================
// in-flight tracking
// =============================================================================

#[tokio::test]
async fn overlapping_fetch_is_rejected_as_busy() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 12);
    let ctrl = controller(&fake, &ada);
    fake.hold_lists();

    let (first, (more, reload)) = tokio::join!(ctrl.load_page(1), async {
        tokio::task::yield_now().await;
        assert!(ctrl.is_busy(FeedAction::FetchPage));
        let more = ctrl.load_more().await;
        let reload = ctrl.reload().await;
        fake.release_lists();
        (more, reload)
    });

    assert_eq!(first.unwrap(), 5);
    assert!(matches!(more, Err(FeedError::Busy(FeedAction::FetchPage))));
    assert!(matches!(reload, Err(FeedError::Busy(FeedAction::FetchPage))));
    assert_eq!(fake.count_calls("list"), 1);
    assert!(!ctrl.is_busy(FeedAction::FetchPage));
}

#[tokio::test]
async fn other_actions_proceed_while_fetching() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 3);
    let ctrl = controller(&fake, &ada);
    fake.hold_lists();

    let (loaded, created) = tokio::join!(ctrl.load_page(1), async {
        tokio::task::yield_now().await;
        let draft = PostDraft { title: "Meanwhile".into(), body: "b".into() };
        let created = ctrl.create_post(&draft).await;
        fake.release_lists();
        created
    });

    assert!(created.is_ok());
    assert_eq!(loaded.unwrap(), 4);
}

#[tokio::test]
async fn dropped_request_releases_its_flag() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 3);
    let ctrl = controller(&fake, &ada);
    fake.hold_lists();

    let timed_out = tokio::time::timeout(Duration::from_millis(20), ctrl.load_page(1)).await;

    assert!(timed_out.is_err());
    assert!(!ctrl.is_busy(FeedAction::FetchPage));
    assert!(ctrl.is_empty());

    fake.release_lists();
    assert_eq!(ctrl.load_page(1).await.unwrap(), 3);
}

// =============================================================================
// posts
// =============================================================================

#[tokio::test]
async fn created_post_goes_to_head() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 3);
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();

    let draft = PostDraft { title: "Fresh".into(), body: "New body".into() };
    let created = ctrl.create_post(&draft).await.unwrap();

    assert_eq!(ids(&ctrl), vec![created.id, 3, 2, 1]);
    assert_eq!(ctrl.posts()[0].title, "Fresh");
}

#[tokio::test]
async fn edited_post_keeps_its_position() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 3);
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();

    let patch = PostDraft { title: "Renamed".into(), body: "Edited".into() };
    ctrl.edit_post(2, &patch).await.unwrap();

    assert_eq!(ids(&ctrl), vec![3, 2, 1]);
    assert_eq!(ctrl.post(2).unwrap().title, "Renamed");
    assert_eq!(ctrl.post(2).unwrap().body, "Edited");
}

#[tokio::test]
async fn editing_someone_elses_post_is_forbidden() {
    let ada = identity(1, "Ada");
    let bob = identity(2, "Bob");
    let fake = FakeFeed::seeded(&ada, 3);
    let ctrl = controller(&fake, &bob);
    ctrl.load_page(1).await.unwrap();

    let patch = PostDraft { title: "Hijack".into(), body: String::new() };
    let err = ctrl.edit_post(2, &patch).await.unwrap_err();

    assert!(matches!(err, FeedError::Forbidden));
    assert_eq!(fake.count_calls("update_post"), 0);
    assert_eq!(ctrl.post(2).unwrap().title, "Post 2");
}

#[tokio::test]
async fn anonymous_viewer_cannot_delete() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 2);
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();
    ctrl.set_viewer(None);

    let err = ctrl.delete_post(1, |_| true).await.unwrap_err();

    assert!(matches!(err, FeedError::Forbidden));
    assert_eq!(ctrl.len(), 2);
}

#[tokio::test]
async fn confirmed_delete_removes_post() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 3);
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();

    let outcome = ctrl.delete_post(2, |_| true).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(ids(&ctrl), vec![3, 1]);
}

#[tokio::test]
async fn declined_delete_sends_nothing() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 3);
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();
    let mut asked = None;

    let outcome = ctrl
        .delete_post(2, |target| {
            asked = Some(target.prompt());
            false
        })
        .await
        .unwrap();

    assert_eq!(outcome, DeleteOutcome::Declined);
    assert_eq!(asked, Some("Are you sure you want to delete this post?"));
    assert_eq!(fake.count_calls("delete_post"), 0);
    assert_eq!(ctrl.len(), 3);
}

#[tokio::test]
async fn failed_delete_keeps_post() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 3);
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();

    fake.fail_next(500);
    assert!(ctrl.delete_post(2, |_| true).await.is_err());

    assert_eq!(ids(&ctrl), vec![3, 2, 1]);
    assert!(!ctrl.is_busy(FeedAction::DeletePost));
}

#[tokio::test]
async fn unloaded_post_is_not_found() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 3);
    let ctrl = controller(&fake, &ada);

    let err = ctrl.delete_post(2, |_| true).await.unwrap_err();

    assert!(matches!(err, FeedError::PostNotFound(2)));
}

#[tokio::test]
async fn refresh_replaces_post_with_server_copy() {
    let ada = identity(1, "Ada");
    let bob = identity(2, "Bob");
    let fake = FakeFeed::seeded(&ada, 3);
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();
    fake.add_server_comment(2, comment(50, 2, &bob));

    let fresh = ctrl.refresh_post(2).await.unwrap();

    assert_eq!(fresh.comments.len(), 1);
    assert_eq!(ctrl.post(2).unwrap().comments, fresh.comments);
    assert_eq!(ids(&ctrl), vec![3, 2, 1]);
}

// =============================================================================
// comments
// =============================================================================

#[tokio::test]
async fn new_comment_goes_to_tail() {
    let ada = identity(1, "Ada");
    let bob = identity(2, "Bob");
    let fake = FakeFeed::seeded(&ada, 2);
    fake.add_server_comment(2, comment(50, 2, &bob));
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();

    let created = ctrl.create_comment(2, "Nice post").await.unwrap();

    let comments = ctrl.post(2).unwrap().comments;
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].id, 50);
    assert_eq!(comments[1], created);
    assert_eq!(created.body, "Nice post");
}

#[tokio::test]
async fn blank_comment_is_rejected_locally() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 2);
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();

    let err = ctrl.create_comment(2, "   \n").await.unwrap_err();

    assert!(matches!(err, FeedError::EmptyComment));
    assert_eq!(fake.count_calls("create_comment"), 0);
}

#[tokio::test]
async fn edited_comment_is_replaced_in_place() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 1);
    fake.add_server_comment(1, comment(50, 1, &ada));
    fake.add_server_comment(1, comment(51, 1, &ada));
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();

    let patch = CommentDraft { body: "Reworded".into() };
    ctrl.edit_comment(1, 50, &patch).await.unwrap();

    let comments = ctrl.post(1).unwrap().comments;
    assert_eq!(comments.iter().map(|c| c.id).collect::<Vec<_>>(), vec![50, 51]);
    assert_eq!(comments[0].body, "Reworded");
}

#[tokio::test]
async fn post_author_cannot_edit_others_comment() {
    let ada = identity(1, "Ada");
    let bob = identity(2, "Bob");
    let fake = FakeFeed::seeded(&ada, 1);
    fake.add_server_comment(1, comment(50, 1, &bob));
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();

    let patch = CommentDraft { body: "Edited by Ada".into() };
    let err = ctrl.edit_comment(1, 50, &patch).await.unwrap_err();

    assert!(matches!(err, FeedError::Forbidden));
}

#[tokio::test]
async fn post_author_may_delete_others_comment() {
    let ada = identity(1, "Ada");
    let bob = identity(2, "Bob");
    let fake = FakeFeed::seeded(&ada, 1);
    fake.add_server_comment(1, comment(50, 1, &bob));
    fake.add_server_comment(1, comment(51, 1, &bob));
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();

    let outcome = ctrl.delete_comment(1, 50, |_| true).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted);
    let remaining: Vec<_> = ctrl.post(1).unwrap().comments.iter().map(|c| c.id).collect();
    assert_eq!(remaining, vec![51]);
}

#[tokio::test]
async fn stranger_cannot_delete_comment() {
    let ada = identity(1, "Ada");
    let bob = identity(2, "Bob");
    let eve = identity(3, "Eve");
    let fake = FakeFeed::seeded(&ada, 1);
    fake.add_server_comment(1, comment(50, 1, &bob));
    let ctrl = controller(&fake, &eve);
    ctrl.load_page(1).await.unwrap();

    let err = ctrl.delete_comment(1, 50, |_| true).await.unwrap_err();

    assert!(matches!(err, FeedError::Forbidden));
    assert_eq!(fake.count_calls("delete_comment"), 0);
}

#[tokio::test]
async fn unknown_comment_is_not_found() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 1);
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();

    let err = ctrl.delete_comment(1, 99, |_| true).await.unwrap_err();

    assert!(matches!(err, FeedError::CommentNotFound { post_id: 1, comment_id: 99 }));
}

#[tokio::test]
async fn comment_prompt_names_the_comment() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 1);
    fake.add_server_comment(1, comment(50, 1, &ada));
    let ctrl = controller(&fake, &ada);
    ctrl.load_page(1).await.unwrap();
    let mut asked = None;

    ctrl.delete_comment(1, 50, |target| {
        asked = Some(target.prompt());
        false
    })
    .await
    .unwrap();

    assert_eq!(asked, Some("Are you sure you want to delete this comment?"));
}

#[tokio::test]
async fn open_post_tracks_an_unloaded_post() {
    let ada = identity(1, "Ada");
    let fake = FakeFeed::seeded(&ada, 12);
    let ctrl = controller(&fake, &ada);

    ctrl.open_post(3).await.unwrap();
    let outcome = ctrl.delete_post(3, |_| true).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(fake.calls(), vec!["get 3".to_owned(), "delete_post 3".to_owned()]);
    assert!(ctrl.is_empty());
}

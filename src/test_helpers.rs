//! Shared fixtures for unit tests.

use std::sync::{Mutex, PoisonError};

use crate::net::types::{Comment, CommentId, Identity, Post, PostId, UserId};
use crate::util::notify::{Notice, NoticeLevel, Notifier};

pub const T0: &str = "2024-01-01T00:00:00Z";

pub fn identity(id: UserId, name: &str) -> Identity {
    Identity {
        id,
        name: name.to_owned(),
        email: format!("{}@example.test", name.to_lowercase()),
        created_at: T0.to_owned(),
        updated_at: T0.to_owned(),
    }
}

pub fn post(id: PostId, author: &Identity) -> Post {
    Post {
        id,
        title: format!("Post {id}"),
        body: format!("Body of post {id}"),
        created_at: T0.to_owned(),
        updated_at: T0.to_owned(),
        user: author.clone(),
        comments: Vec::new(),
    }
}

pub fn comment(id: CommentId, post_id: PostId, author: &Identity) -> Comment {
    Comment {
        id,
        body: format!("Comment {id}"),
        created_at: T0.to_owned(),
        updated_at: T0.to_owned(),
        user: author.clone(),
        post_id,
    }
}

/// Collects notices for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn texts(&self, level: NoticeLevel) -> Vec<String> {
        self.notices().into_iter().filter(|n| n.level == level).map(|n| n.text).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner).push(notice);
    }
}

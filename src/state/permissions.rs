//! Who may edit or delete what.
//!
//! A post is edited and deleted only by its author. A comment is edited only
//! by its author, and deleted by its author or by the author of the post it
//! sits under. Anonymous viewers have no rights.

#[cfg(test)]
#[path = "permissions_test.rs"]
mod tests;

use crate::net::types::{Comment, Identity, Post};

fn is_author(viewer: Option<&Identity>, author: &Identity) -> bool {
    viewer.is_some_and(|v| v.id == author.id)
}

#[must_use]
pub fn can_edit_post(viewer: Option<&Identity>, post: &Post) -> bool {
    is_author(viewer, &post.user)
}

#[must_use]
pub fn can_delete_post(viewer: Option<&Identity>, post: &Post) -> bool {
    is_author(viewer, &post.user)
}

#[must_use]
pub fn can_edit_comment(viewer: Option<&Identity>, comment: &Comment) -> bool {
    is_author(viewer, &comment.user)
}

#[must_use]
pub fn can_delete_comment(viewer: Option<&Identity>, post: &Post, comment: &Comment) -> bool {
    is_author(viewer, &comment.user) || is_author(viewer, &post.user)
}


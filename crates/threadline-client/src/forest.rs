//! The in-memory comment forest and its mutations.
//!
//! Top-level comments are newest first, replies oldest first. Every reply's
//! `parent_id` names the comment whose `replies` holds it.

use serde::{Deserialize, Serialize};

use threadline_types::{Comment, CommentId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Forest {
    roots: Vec<Comment>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a server snapshot as-is, restoring `parent_id` on every node.
    pub fn from_snapshot(mut roots: Vec<Comment>) -> Self {
        for root in &mut roots {
            root.parent_id = None;
            let id = root.id;
            adopt(&mut root.replies, id);
        }
        Self { roots }
    }

    pub fn roots(&self) -> &[Comment] {
        &self.roots
    }

    pub fn into_roots(self) -> Vec<Comment> {
        self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of comments at every depth.
    pub fn len(&self) -> usize {
        self.depth_first().count()
    }

    pub fn find(&self, id: CommentId) -> Option<&Comment> {
        self.depth_first().find(|c| c.id == id)
    }

    pub fn contains(&self, id: CommentId) -> bool {
        self.find(id).is_some()
    }

    /// Pre-order walk: each comment, then its replies in order.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            stack: self.roots.iter().rev().collect(),
        }
    }

    /// Put a new top-level comment at the front.
    pub fn insert_root(&mut self, mut comment: Comment) {
        comment.parent_id = None;
        self.roots.insert(0, comment);
    }

    /// Append `comment` to the replies of `parent_id`, wherever that parent
    /// sits. Hands the comment back when the parent isn't in the forest.
    pub fn insert_reply(&mut self, parent_id: CommentId, mut comment: Comment) -> Result<(), Comment> {
        match find_mut(&mut self.roots, parent_id) {
            Some(parent) => {
                comment.parent_id = Some(parent_id);
                parent.replies.push(comment);
                Ok(())
            }
            None => Err(comment),
        }
    }

    /// Detach the comment with `id`. Its replies go with it, so the returned
    /// subtree is everything that left the forest.
    pub fn remove(&mut self, id: CommentId) -> Option<Comment> {
        remove_from(&mut self.roots, id)
    }
}

impl From<Vec<Comment>> for Forest {
    fn from(roots: Vec<Comment>) -> Self {
        Self::from_snapshot(roots)
    }
}

pub struct DepthFirst<'a> {
    stack: Vec<&'a Comment>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = &'a Comment;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.replies.iter().rev());
        Some(next)
    }
}

fn adopt(replies: &mut [Comment], parent_id: CommentId) {
    for reply in replies {
        reply.parent_id = Some(parent_id);
        let id = reply.id;
        adopt(&mut reply.replies, id);
    }
}

fn find_mut(comments: &mut [Comment], id: CommentId) -> Option<&mut Comment> {
    for comment in comments {
        if comment.id == id {
            return Some(comment);
        }
        if let Some(found) = find_mut(&mut comment.replies, id) {
            return Some(found);
        }
    }
    None
}

fn remove_from(comments: &mut Vec<Comment>, id: CommentId) -> Option<Comment> {
    if let Some(pos) = comments.iter().position(|c| c.id == id) {
        return Some(comments.remove(pos));
    }
    comments
        .iter_mut()
        .find_map(|comment| remove_from(&mut comment.replies, id))
}

//! Comment tree store: the forest as last seen by this client, plus the
//! fetch/create/delete operations that keep it current.
//!
//! Mutations are applied locally as soon as the backend accepts them. Callers
//! are expected to follow a successful create or delete with
//! `fetch_comments` to reconcile with the authoritative tree. Results land in
//! the order they arrive, so a create racing a fetch is last-write-wins.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use threadline_types::api::{CommentListResponse, CreateCommentRequest};
use threadline_types::{Comment, CommentId, UserId};

use crate::error::ClientError;
use crate::forest::Forest;
use crate::http::{ApiRequest, COMMENTS_CREATE_PATH, COMMENTS_LIST_PATH, comment_delete_path};
use crate::interceptor::AuthClient;
use crate::validation;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommentState {
    pub comments: Forest,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct CommentStore {
    inner: Arc<CommentInner>,
}

struct CommentInner {
    client: AuthClient,
    state: watch::Sender<CommentState>,
}

impl CommentStore {
    pub fn new(client: AuthClient) -> Self {
        let (state, _) = watch::channel(CommentState::default());
        Self {
            inner: Arc::new(CommentInner { client, state }),
        }
    }

    pub fn state(&self) -> CommentState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CommentState> {
        self.inner.state.subscribe()
    }

    pub fn comments(&self) -> Forest {
        self.inner.state.borrow().comments.clone()
    }

    /// Replace the forest with the server's snapshot. On failure the previous
    /// forest stays visible and `error` is set.
    pub async fn fetch_comments(&self) -> Result<Forest, ClientError> {
        self.inner.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        match self.request_comments().await {
            Ok(forest) => {
                debug!(count = forest.len(), "Fetched comments");
                self.inner.state.send_modify(|s| {
                    s.comments = forest.clone();
                    s.loading = false;
                });
                Ok(forest)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch comments");
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    /// Post a comment, or a reply when `parent_id` is set.
    ///
    /// Text must be 3 to 200 characters after trimming and `user_id` must be
    /// known; otherwise this fails without a request. A reply whose parent is
    /// not in the local forest is still created on the server but leaves the
    /// forest untouched until the next fetch.
    pub async fn create_comment(
        &self,
        text: &str,
        user_id: Option<UserId>,
        parent_id: Option<CommentId>,
    ) -> Result<Comment, ClientError> {
        self.inner.state.send_modify(|s| s.error = None);

        let created = match self.request_create(text, user_id, parent_id).await {
            Ok(created) => created,
            Err(e) => {
                warn!(error = %e, "Failed to create comment");
                self.record_failure(&e);
                return Err(e);
            }
        };

        let mut orphaned = false;
        self.inner.state.send_modify(|s| match parent_id {
            None => s.comments.insert_root(created.clone()),
            Some(pid) => orphaned = s.comments.insert_reply(pid, created.clone()).is_err(),
        });

        if orphaned {
            warn!(
                comment_id = created.id,
                parent_id = parent_id.unwrap_or_default(),
                "Parent not in local forest; reply will appear after the next fetch"
            );
        } else {
            info!(comment_id = created.id, parent_id = ?parent_id, "Comment created");
        }

        Ok(created)
    }

    /// Delete a comment and, with it, every reply below it. Confirmation is
    /// the caller's job. A rejected delete leaves the forest as it was.
    pub async fn delete_comment(&self, comment_id: CommentId) -> Result<(), ClientError> {
        let request = ApiRequest::delete(comment_delete_path(comment_id));
        if let Err(e) = self
            .inner
            .client
            .send_checked(&request, "Failed to delete comment")
            .await
        {
            warn!(comment_id, error = %e, "Failed to delete comment");
            self.record_failure(&e);
            return Err(e);
        }

        let mut removed = None;
        self.inner.state.send_modify(|s| {
            removed = s.comments.remove(comment_id);
            s.error = None;
        });

        match removed {
            Some(subtree) => info!(
                comment_id,
                replies_removed = subtree.descendant_count(),
                "Comment deleted"
            ),
            None => debug!(comment_id, "Deleted comment was not in the local forest"),
        }

        Ok(())
    }

    async fn request_comments(&self) -> Result<Forest, ClientError> {
        let response = self
            .inner
            .client
            .send_checked(&ApiRequest::get(COMMENTS_LIST_PATH), "Failed to fetch comments")
            .await?;
        let CommentListResponse { comments } = response.json()?;
        Ok(Forest::from_snapshot(comments))
    }

    async fn request_create(
        &self,
        text: &str,
        user_id: Option<UserId>,
        parent_id: Option<CommentId>,
    ) -> Result<Comment, ClientError> {
        let text = validation::validate_comment_text(text)?;
        let user_id = user_id
            .ok_or_else(|| ClientError::validation("User not authenticated. Please login first."))?;

        let request = ApiRequest::post(
            COMMENTS_CREATE_PATH,
            &CreateCommentRequest {
                text,
                user_id,
                parent_id,
            },
        )?;
        let response = self
            .inner
            .client
            .send_checked(&request, "Failed to add comment")
            .await?;

        let mut created: Comment = response.json()?;
        created.parent_id = parent_id;
        created.replies.clear();
        Ok(created)
    }

    fn record_failure(&self, error: &ClientError) {
        self.inner.state.send_modify(|s| {
            s.loading = false;
            s.error = Some(error.to_string());
        });
    }
}

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type CommentId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A comment together with its reply subtree.
///
/// The list endpoint nests replies under their parent and does not always
/// repeat `parent_id` on them; `Forest` fills it back in when a snapshot is
/// loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub text: String,
    #[serde(rename = "user_id", alias = "author_id")]
    pub author_id: UserId,
    #[serde(rename = "username", alias = "author_name", default)]
    pub author_name: String,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Oldest first.
    #[serde(default)]
    pub replies: Vec<Comment>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Only the author may delete a comment.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.author_id == user_id
    }

    /// Number of comments below this one, at any depth.
    pub fn descendant_count(&self) -> usize {
        self.replies
            .iter()
            .map(|reply| 1 + reply.descendant_count())
            .sum()
    }

    /// Parse `created_at`. The backend has served RFC 3339, RFC 2822
    /// ("Tue, 15 Nov 1994 08:12:31 GMT") and bare ISO timestamps without a
    /// zone, which are taken as UTC.
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_rfc2822(raw))
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|ndt| ndt.and_utc())
            })
            .ok()
    }
}

use serde::{Deserialize, Serialize};

use crate::models::UserProfile;

/// Session lifecycle notifications for the view layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    /// Login or signup completed
    SignedIn { user: UserProfile },

    /// The user logged out
    SignedOut,

    /// Token refresh failed; the session was cleared and the view should
    /// navigate to its login entry point.
    LoginRequired,
}

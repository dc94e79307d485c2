use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::{AuthorView, UserId};

pub type ThreadId = Uuid;

/// A post or a reply. Replies are threads with `parent_id` set; a thread
/// with no parent is a top-level post.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub text: String,
    pub author: UserId,
    /// Accepted at creation but not persisted yet; always `None`.
    pub community: Option<String>,
    pub parent_id: Option<ThreadId>,
    /// Ids of direct replies, in creation order.
    pub children: Vec<ThreadId>,
    /// User ids that liked this thread. Semantically a set, stored as a
    /// sequence.
    pub likes: Vec<UserId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Thread {
    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CreateThread {
    pub text: String,
    pub author: UserId,
    pub community_id: Option<String>,
}

impl CreateThread {
    pub fn into_thread(self) -> Thread {
        Thread {
            id: Uuid::new_v4(),
            text: self.text,
            author: self.author,
            // Personal account for now, whatever community_id was given.
            community: None,
            parent_id: None,
            children: Vec::new(),
            likes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn into_reply(self, parent_id: ThreadId) -> Thread {
        let mut thread = self.into_thread();
        thread.parent_id = Some(parent_id);
        thread
    }
}

/// A thread with its author resolved and its reply subtree expanded down to
/// some depth.
#[derive(Clone, Debug, Serialize)]
pub struct ThreadView {
    pub id: ThreadId,
    pub text: String,
    pub author: AuthorView,
    pub community: Option<String>,
    pub parent_id: Option<ThreadId>,
    /// Raw reply ids, present at every depth.
    pub children: Vec<ThreadId>,
    /// Resolved replies; empty past the resolution depth.
    pub replies: Vec<ThreadView>,
    pub likes: Vec<UserId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// One page of the top-level feed.
#[derive(Clone, Debug, Serialize)]
pub struct FeedPage {
    pub posts: Vec<ThreadView>,
    /// True when more pages exist past this one.
    pub is_next: bool,
}

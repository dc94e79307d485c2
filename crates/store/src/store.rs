pub mod error;

pub use async_trait::async_trait;
pub use error::StoreError;

use braid_domain::{
    thread::{Thread, ThreadId},
    user::{User, UserId},
};

/// The document database the thread operations are written against.
///
/// Threads and users are separate collections. Users belong to an external
/// collaborator: the store reads them, links threads to them, and accepts
/// upserts from whoever owns the collection, but never creates one on its
/// own initiative.
#[async_trait]
pub trait Store: Send + Sync {
    async fn debug_state(&self) -> Result<serde_json::Value, StoreError>;

    async fn insert_thread(&self, thread: &Thread) -> Result<(), StoreError>;

    async fn get_thread(&self, thread_id: ThreadId) -> Result<Thread, StoreError>;

    /// Full-document upsert.
    async fn save_thread(&self, thread: &Thread) -> Result<(), StoreError>;

    /// Top-level threads only, newest first. Ties in `created_at` are
    /// unordered.
    async fn list_top_level_threads(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Thread>, StoreError>;

    async fn count_top_level_threads(&self) -> Result<usize, StoreError>;

    /// Find-and-update: overwrite the thread's likes with `likes` and return
    /// the updated document.
    async fn update_thread_likes(
        &self,
        thread_id: ThreadId,
        likes: Vec<UserId>,
    ) -> Result<Thread, StoreError>;

    async fn get_user(&self, user_id: &str) -> Result<User, StoreError>;

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn append_user_thread(
        &self,
        user_id: &str,
        thread_id: ThreadId,
    ) -> Result<(), StoreError>;
}

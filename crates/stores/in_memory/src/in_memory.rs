use std::{collections::HashMap, sync::Arc};

use braid_domain::{
    thread::{Thread, ThreadId},
    user::{User, UserId},
};
use braid_store::{Store, StoreError};
use tokio::sync::Mutex;

/// Ephemeral backend over in-process maps. Backs the test suites and is
/// good enough for throwaway deployments.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    threads: Arc<Mutex<HashMap<ThreadId, Thread>>>,
    users: Arc<Mutex<HashMap<UserId, User>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            threads: Arc::new(Mutex::new(HashMap::new())),
            users: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn top_level_sorted(threads: &HashMap<ThreadId, Thread>) -> Vec<Thread> {
        let mut top_level: Vec<Thread> = threads
            .values()
            .filter(|thread| thread.is_top_level())
            .cloned()
            .collect();
        top_level.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        top_level
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn debug_state(&self) -> Result<serde_json::Value, StoreError> {
        let threads = self.threads.lock().await;
        let users = self.users.lock().await;

        Ok(serde_json::json!({
            "threads": threads.clone(),
            "users": users.clone(),
        }))
    }

    async fn insert_thread(&self, thread: &Thread) -> Result<(), StoreError> {
        let mut threads = self.threads.lock().await;
        threads.insert(thread.id(), thread.clone());
        Ok(())
    }

    async fn get_thread(&self, thread_id: ThreadId) -> Result<Thread, StoreError> {
        let threads = self.threads.lock().await;
        threads
            .get(&thread_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn save_thread(&self, thread: &Thread) -> Result<(), StoreError> {
        let mut threads = self.threads.lock().await;
        threads.insert(thread.id(), thread.clone());
        Ok(())
    }

    async fn list_top_level_threads(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Thread>, StoreError> {
        let threads = self.threads.lock().await;
        Ok(Self::top_level_sorted(&threads)
            .into_iter()
            .skip(skip)
            .take(limit)
            .collect())
    }

    async fn count_top_level_threads(&self) -> Result<usize, StoreError> {
        let threads = self.threads.lock().await;
        Ok(threads
            .values()
            .filter(|thread| thread.is_top_level())
            .count())
    }

    async fn update_thread_likes(
        &self,
        thread_id: ThreadId,
        likes: Vec<UserId>,
    ) -> Result<Thread, StoreError> {
        let mut threads = self.threads.lock().await;
        if let Some(thread) = threads.get_mut(&thread_id) {
            thread.likes = likes;
            Ok(thread.clone())
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn get_user(&self, user_id: &str) -> Result<User, StoreError> {
        let users = self.users.lock().await;
        users.get(user_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn append_user_thread(
        &self,
        user_id: &str,
        thread_id: ThreadId,
    ) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        if let Some(user) = users.get_mut(user_id) {
            user.threads.push(thread_id);
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }
}

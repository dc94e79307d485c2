mod heed_ids;

use std::{path::Path, sync::Arc};

use braid_domain::{
    thread::{Thread, ThreadId},
    user::{User, UserId},
};
use braid_store::{Store, StoreError};
use heed::{
    types::{SerdeJson, Str, Unit},
    Database, EnvOpenOptions,
};
use heed_ids::{HeedCreationKey, HeedUuid};
use uuid::Uuid;

/// Persistent backend on LMDB. Three databases: the thread collection, the
/// user collection, and a creation-time index holding only top-level
/// threads so the feed query is a reverse range scan instead of a
/// full-collection sort.
pub struct HeedStore {
    env: Arc<heed::Env>,
    threads_db: Database<HeedUuid, SerdeJson<Thread>>,
    users_db: Database<Str, SerdeJson<User>>,
    feed_db: Database<HeedCreationKey, Unit>,
}

impl HeedStore {
    pub fn new(path: &Path, create_databases: bool) -> Result<Self, StoreError> {
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(10 * 1024 * 1024 * 1024) // 10 GB
                .max_dbs(3)
                .open(path)
                .map_err(|e| StoreError::ConnectionError(e.to_string()))?
        };
        let env = Arc::new(env);

        let mut wtxn = env
            .write_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        let threads_db = if create_databases {
            env.create_database(&mut wtxn, Some("threads"))
                .map_err(|e| StoreError::OperationFailed(e.to_string()))?
        } else {
            env.open_database(&wtxn, Some("threads"))
                .map_err(|e| StoreError::QueryError(e.to_string()))?
                .ok_or(StoreError::NotFound)?
        };
        let users_db = if create_databases {
            env.create_database(&mut wtxn, Some("users"))
                .map_err(|e| StoreError::OperationFailed(e.to_string()))?
        } else {
            env.open_database(&wtxn, Some("users"))
                .map_err(|e| StoreError::QueryError(e.to_string()))?
                .ok_or(StoreError::NotFound)?
        };
        let feed_db = if create_databases {
            env.create_database(&mut wtxn, Some("top_level_by_creation"))
                .map_err(|e| StoreError::OperationFailed(e.to_string()))?
        } else {
            env.open_database(&wtxn, Some("top_level_by_creation"))
                .map_err(|e| StoreError::QueryError(e.to_string()))?
                .ok_or(StoreError::NotFound)?
        };
        wtxn.commit()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        Ok(Self {
            env,
            threads_db,
            users_db,
            feed_db,
        })
    }

    fn feed_key(thread: &Thread) -> HeedCreationKey {
        (thread.created_at().timestamp_millis() as u64, thread.id()).into()
    }

    fn put_thread(&self, wtxn: &mut heed::RwTxn, thread: &Thread) -> Result<(), StoreError> {
        self.threads_db
            .put(wtxn, &thread.id().into(), thread)
            .map_err(|e| StoreError::OperationFailed(e.to_string()))
    }

    fn get_thread_txn(
        &self,
        rtxn: &heed::RoTxn,
        thread_id: ThreadId,
    ) -> Result<Option<Thread>, StoreError> {
        self.threads_db
            .get(rtxn, &thread_id.into())
            .map_err(|e| StoreError::QueryError(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Store for HeedStore {
    async fn debug_state(&self) -> Result<serde_json::Value, StoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        let threads: Vec<(Uuid, Thread)> = self
            .threads_db
            .iter(&rtxn)
            .map_err(|e| StoreError::QueryError(e.to_string()))?
            .flatten()
            .map(|(k, thread)| (k.0, thread))
            .collect();
        let users: Vec<(String, User)> = self
            .users_db
            .iter(&rtxn)
            .map_err(|e| StoreError::QueryError(e.to_string()))?
            .flatten()
            .map(|(k, user)| (k.to_owned(), user))
            .collect();
        let feed: Vec<(u64, Uuid)> = self
            .feed_db
            .iter(&rtxn)
            .map_err(|e| StoreError::QueryError(e.to_string()))?
            .flatten()
            .map(|(k, _)| (k.0 .0, k.0 .1))
            .collect();

        Ok(serde_json::json!({
            "threads": threads,
            "users": users,
            "top_level_by_creation": feed,
        }))
    }

    async fn insert_thread(&self, thread: &Thread) -> Result<(), StoreError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        self.put_thread(&mut wtxn, thread)?;
        if thread.is_top_level() {
            self.feed_db
                .put(&mut wtxn, &Self::feed_key(thread), &())
                .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        }

        wtxn.commit()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        Ok(())
    }

    async fn get_thread(&self, thread_id: ThreadId) -> Result<Thread, StoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        self.get_thread_txn(&rtxn, thread_id)?
            .ok_or(StoreError::NotFound)
    }

    async fn save_thread(&self, thread: &Thread) -> Result<(), StoreError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        // created_at is immutable, so the feed index key never moves.
        self.put_thread(&mut wtxn, thread)?;

        wtxn.commit()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        Ok(())
    }

    async fn list_top_level_threads(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Thread>, StoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        let entries = self
            .feed_db
            .rev_iter(&rtxn)
            .map_err(|e| StoreError::QueryError(e.to_string()))?
            .skip(skip)
            .take(limit);

        let mut threads = Vec::new();
        for entry in entries {
            let (HeedCreationKey((_, thread_id)), _) =
                entry.map_err(|e| StoreError::QueryError(e.to_string()))?;
            if let Some(thread) = self.get_thread_txn(&rtxn, thread_id)? {
                threads.push(thread);
            }
        }
        Ok(threads)
    }

    async fn count_top_level_threads(&self) -> Result<usize, StoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        let count = self
            .feed_db
            .len(&rtxn)
            .map_err(|e| StoreError::QueryError(e.to_string()))?;
        Ok(count as usize)
    }

    async fn update_thread_likes(
        &self,
        thread_id: ThreadId,
        likes: Vec<UserId>,
    ) -> Result<Thread, StoreError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        let mut thread = self
            .threads_db
            .get(&wtxn, &thread_id.into())
            .map_err(|e| StoreError::QueryError(e.to_string()))?
            .ok_or(StoreError::NotFound)?;

        thread.likes = likes;
        self.put_thread(&mut wtxn, &thread)?;

        wtxn.commit()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        Ok(thread)
    }

    async fn get_user(&self, user_id: &str) -> Result<User, StoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        self.users_db
            .get(&rtxn, user_id)
            .map_err(|e| StoreError::QueryError(e.to_string()))?
            .ok_or(StoreError::NotFound)
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        self.users_db
            .put(&mut wtxn, &user.id, user)
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        Ok(())
    }

    async fn append_user_thread(
        &self,
        user_id: &str,
        thread_id: ThreadId,
    ) -> Result<(), StoreError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        let mut user = self
            .users_db
            .get(&wtxn, user_id)
            .map_err(|e| StoreError::QueryError(e.to_string()))?
            .ok_or(StoreError::NotFound)?;

        user.threads.push(thread_id);
        self.users_db
            .put(&mut wtxn, user_id, &user)
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        Ok(())
    }
}

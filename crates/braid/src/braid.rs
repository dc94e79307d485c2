mod revalidate;

use std::sync::Arc;

use async_recursion::async_recursion;
use braid_domain::{
    thread::{CreateThread, FeedPage, Thread, ThreadId, ThreadView},
    user::UserId,
};
use braid_store::{Store, StoreError};
use thiserror::Error;

pub use revalidate::{LogRevalidate, Revalidate};

/// Reply depth `fetch_thread_by_id` resolves to.
pub const DEFAULT_REPLY_DEPTH: usize = 2;

/// Feed page size callers get when they have no opinion.
pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Error, Debug)]
pub enum BraidError {
    #[error("thread not found")]
    NotFound,
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{op} failed: {source}")]
    Store {
        op: &'static str,
        #[source]
        source: StoreError,
    },
}

impl BraidError {
    fn store(op: &'static str) -> impl FnOnce(StoreError) -> BraidError {
        move |source| BraidError::Store { op, source }
    }
}

/// Data-access operations for the threads feature: create a post, page
/// through the top-level feed, fetch one thread with its replies, comment,
/// and toggle likes. Every operation runs to completion within one call
/// against the injected store; there is no cross-call state and no
/// isolation between concurrent operations on the same thread (reads and
/// writes are not versioned, so the last write wins).
#[derive(Clone)]
pub struct Braid {
    store: Arc<dyn Store>,
    revalidate: Arc<dyn Revalidate>,
}

impl Braid {
    pub fn builder() -> BraidBuilder {
        BraidBuilder {
            store: None,
            revalidate: None,
        }
    }

    /// Persist a new top-level thread and link it to its author.
    ///
    /// The community reference is accepted but stored as absent; threads
    /// land on the author's personal account for now.
    pub async fn create_thread(
        &self,
        input: CreateThread,
        path: &str,
    ) -> Result<Thread, BraidError> {
        if input.text.trim().is_empty() {
            return Err(BraidError::Validation(
                "thread text must not be empty".to_owned(),
            ));
        }

        let thread = input.into_thread();
        self.store
            .insert_thread(&thread)
            .await
            .map_err(BraidError::store("create thread"))?;
        self.store
            .append_user_thread(&thread.author, thread.id())
            .await
            .map_err(BraidError::store("create thread"))?;

        self.revalidate.revalidate(path);
        Ok(thread)
    }

    /// One page of the top-level feed, newest first, with each post's
    /// author and immediate replies resolved.
    pub async fn fetch_posts(
        &self,
        page_number: usize,
        page_size: usize,
    ) -> Result<FeedPage, BraidError> {
        // Pages are 1-based; page 0 clamps to the first page instead of
        // underflowing the skip.
        let skip = page_number.saturating_sub(1).saturating_mul(page_size);

        let threads = self
            .store
            .list_top_level_threads(skip, page_size)
            .await
            .map_err(BraidError::store("fetch posts"))?;
        let total = self
            .store
            .count_top_level_threads()
            .await
            .map_err(BraidError::store("fetch posts"))?;

        let mut posts = Vec::with_capacity(threads.len());
        for thread in threads {
            posts.push(self.resolve_thread("fetch posts", thread, 1).await?);
        }

        let is_next = total > skip + posts.len();
        Ok(FeedPage { posts, is_next })
    }

    /// A thread with replies resolved two levels deep, or `None` when the
    /// id matches nothing. Absence is not an error here; callers check.
    pub async fn fetch_thread_by_id(
        &self,
        id: ThreadId,
    ) -> Result<Option<ThreadView>, BraidError> {
        self.fetch_thread_tree(id, DEFAULT_REPLY_DEPTH).await
    }

    /// Same as [`Braid::fetch_thread_by_id`] with the reply depth under the
    /// caller's control.
    pub async fn fetch_thread_tree(
        &self,
        id: ThreadId,
        depth: usize,
    ) -> Result<Option<ThreadView>, BraidError> {
        let thread = match self.store.get_thread(id).await {
            Ok(thread) => thread,
            Err(StoreError::NotFound) => return Ok(None),
            Err(source) => {
                return Err(BraidError::Store {
                    op: "fetch thread",
                    source,
                })
            }
        };

        Ok(Some(self.resolve_thread("fetch thread", thread, depth).await?))
    }

    /// Persist a reply and link it into the parent's children.
    ///
    /// The reply write and the parent update are sequential, not atomic: a
    /// crash between them leaves the reply stored but unlinked.
    pub async fn add_comment_to_thread(
        &self,
        thread_id: ThreadId,
        text: String,
        author: UserId,
        path: &str,
    ) -> Result<Thread, BraidError> {
        let mut parent = match self.store.get_thread(thread_id).await {
            Ok(thread) => thread,
            Err(StoreError::NotFound) => return Err(BraidError::NotFound),
            Err(source) => {
                return Err(BraidError::Store {
                    op: "add comment to thread",
                    source,
                })
            }
        };

        let reply = CreateThread {
            text,
            author,
            community_id: None,
        }
        .into_reply(thread_id);
        self.store
            .insert_thread(&reply)
            .await
            .map_err(BraidError::store("add comment to thread"))?;

        parent.children.push(reply.id());
        self.store
            .save_thread(&parent)
            .await
            .map_err(BraidError::store("add comment to thread"))?;

        self.revalidate.revalidate(path);
        Ok(reply)
    }

    /// Toggle `user_id`'s like on a post and return the final likes.
    ///
    /// The caller-supplied likes overwrite whatever is stored before the
    /// toggle runs; the toggle then works on that array. A blank `user_id`
    /// leaves the overwritten array as the result. Removal takes the first
    /// exact match only, so duplicates past the first survive.
    pub async fn like_post(
        &self,
        post_id: ThreadId,
        user_id: &str,
        likes: Vec<UserId>,
        path: &str,
    ) -> Result<Vec<UserId>, BraidError> {
        let mut thread = self
            .store
            .update_thread_likes(post_id, likes)
            .await
            .map_err(BraidError::store("add like to post"))?;

        // Trimming applies to the blank check only; matching is exact on
        // the id as given.
        if !user_id.trim().is_empty() {
            match thread.likes.iter().position(|like| like == user_id) {
                Some(index) => {
                    thread.likes.remove(index);
                }
                None => thread.likes.push(user_id.to_owned()),
            }
            self.store
                .save_thread(&thread)
                .await
                .map_err(BraidError::store("add like to post"))?;
        }

        self.revalidate.revalidate(path);
        Ok(thread.likes)
    }

    #[async_recursion]
    async fn resolve_thread(
        &self,
        op: &'static str,
        thread: Thread,
        depth: usize,
    ) -> Result<ThreadView, BraidError> {
        let author = self
            .store
            .get_user(&thread.author)
            .await
            .map_err(BraidError::store(op))?
            .author_view();

        let mut replies = Vec::new();
        if depth > 0 {
            for &child_id in &thread.children {
                match self.store.get_thread(child_id).await {
                    Ok(child) => {
                        replies.push(self.resolve_thread(op, child, depth - 1).await?);
                    }
                    Err(StoreError::NotFound) => {
                        // A dangling child id must not fail the read.
                        tracing::warn!(%child_id, "reply listed but missing; skipping");
                    }
                    Err(source) => return Err(BraidError::Store { op, source }),
                }
            }
        }

        Ok(ThreadView {
            id: thread.id,
            text: thread.text,
            author,
            community: thread.community,
            parent_id: thread.parent_id,
            children: thread.children,
            replies,
            likes: thread.likes,
            created_at: thread.created_at,
        })
    }
}

pub struct BraidBuilder {
    store: Option<Arc<dyn Store>>,
    revalidate: Option<Arc<dyn Revalidate>>,
}

impl BraidBuilder {
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_revalidate(mut self, revalidate: Arc<dyn Revalidate>) -> Self {
        self.revalidate = Some(revalidate);
        self
    }

    pub fn build(self) -> Braid {
        Braid {
            store: self.store.expect("store is required"),
            revalidate: self.revalidate.unwrap_or_else(|| Arc::new(LogRevalidate)),
        }
    }
}

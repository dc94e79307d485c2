use std::sync::{Arc, Mutex};

use anyhow::Result;
use braid::{Braid, BraidError, Revalidate, DEFAULT_PAGE_SIZE};
use braid_domain::{
    thread::{CreateThread, Thread},
    user::User,
};
use braid_in_memory_store::InMemoryStore;
use braid_store::Store;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

#[derive(Default)]
struct RecordingRevalidate {
    paths: Mutex<Vec<String>>,
}

impl RecordingRevalidate {
    fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl Revalidate for RecordingRevalidate {
    fn revalidate(&self, path: &str) {
        self.paths.lock().unwrap().push(path.to_owned());
    }
}

struct Fixture {
    braid: Braid,
    store: Arc<InMemoryStore>,
    revalidations: Arc<RecordingRevalidate>,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let revalidations = Arc::new(RecordingRevalidate::default());
    let braid = Braid::builder()
        .with_store(store.clone())
        .with_revalidate(revalidations.clone())
        .build();
    Fixture {
        braid,
        store,
        revalidations,
    }
}

fn user(id: &str, name: &str) -> User {
    User {
        id: id.to_owned(),
        name: name.to_owned(),
        image: Some(format!("https://img.example/{id}.png")),
        threads: Vec::new(),
    }
}

fn post_at(author: &str, text: &str, created_at: DateTime<Utc>) -> Thread {
    let mut thread = CreateThread {
        text: text.to_owned(),
        author: author.to_owned(),
        community_id: None,
    }
    .into_thread();
    thread.created_at = created_at;
    thread
}

async fn stored_thread_count(store: &InMemoryStore) -> usize {
    let state = store.debug_state().await.unwrap();
    state["threads"].as_object().unwrap().len()
}

#[tokio::test]
async fn feed_pagination_and_is_next() -> Result<()> {
    let f = fixture();
    f.store.upsert_user(&user("u-feed", "Ada")).await?;

    let base = Utc::now();
    for i in 0..25i64 {
        f.store
            .insert_thread(&post_at("u-feed", &format!("post {i}"), base + Duration::seconds(i)))
            .await?;
    }

    let page1 = f.braid.fetch_posts(1, DEFAULT_PAGE_SIZE).await?;
    assert_eq!(page1.posts.len(), 20);
    assert!(page1.is_next);
    assert!(page1.posts.iter().all(|p| p.parent_id.is_none()));
    assert_eq!(page1.posts[0].text, "post 24");
    assert!(page1
        .posts
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at));

    let page2 = f.braid.fetch_posts(2, DEFAULT_PAGE_SIZE).await?;
    assert_eq!(page2.posts.len(), 5);
    assert!(!page2.is_next);
    assert_eq!(page2.posts[0].text, "post 4");
    assert_eq!(page2.posts[4].text, "post 0");

    Ok(())
}

#[tokio::test]
async fn feed_page_zero_is_the_first_page() -> Result<()> {
    let f = fixture();
    f.store.upsert_user(&user("u-feed", "Ada")).await?;

    let base = Utc::now();
    for i in 0..3i64 {
        f.store
            .insert_thread(&post_at("u-feed", &format!("post {i}"), base + Duration::seconds(i)))
            .await?;
    }

    let clamped = f.braid.fetch_posts(0, 2).await?;
    let first = f.braid.fetch_posts(1, 2).await?;

    let ids = |page: &braid_domain::thread::FeedPage| {
        page.posts.iter().map(|p| p.id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&clamped), ids(&first));
    assert_eq!(clamped.is_next, first.is_next);

    Ok(())
}

#[tokio::test]
async fn feed_resolves_replies_one_level_deep() -> Result<()> {
    let f = fixture();
    for (id, name) in [("u-root", "Ada"), ("u-a", "Brin"), ("u-b", "Cleo")] {
        f.store.upsert_user(&user(id, name)).await?;
    }

    let root = f
        .braid
        .create_thread(
            CreateThread {
                text: "root".to_owned(),
                author: "u-root".to_owned(),
                community_id: None,
            },
            "/",
        )
        .await?;
    let reply = f
        .braid
        .add_comment_to_thread(root.id(), "reply".to_owned(), "u-a".to_owned(), "/")
        .await?;
    let nested = f
        .braid
        .add_comment_to_thread(reply.id(), "nested".to_owned(), "u-b".to_owned(), "/")
        .await?;

    let page = f.braid.fetch_posts(1, 20).await?;
    assert_eq!(page.posts.len(), 1);

    let post = &page.posts[0];
    assert_eq!(post.author.name, "Ada");
    assert_eq!(post.replies.len(), 1);

    let reply_view = &post.replies[0];
    assert_eq!(reply_view.id, reply.id());
    assert_eq!(reply_view.author.name, "Brin");
    assert_eq!(reply_view.parent_id, Some(root.id()));
    // One level only: the nested reply stays a raw id here.
    assert!(reply_view.replies.is_empty());
    assert_eq!(reply_view.children, [nested.id()]);

    Ok(())
}

#[tokio::test]
async fn thread_fetch_resolves_exactly_two_reply_levels() -> Result<()> {
    let f = fixture();
    for (id, name) in [
        ("u-root", "Ada"),
        ("u-a", "Brin"),
        ("u-b", "Cleo"),
        ("u-c", "Dora"),
    ] {
        f.store.upsert_user(&user(id, name)).await?;
    }

    let root = f
        .braid
        .create_thread(
            CreateThread {
                text: "root".to_owned(),
                author: "u-root".to_owned(),
                community_id: None,
            },
            "/",
        )
        .await?;
    let level1 = f
        .braid
        .add_comment_to_thread(root.id(), "level one".to_owned(), "u-a".to_owned(), "/")
        .await?;
    let level2 = f
        .braid
        .add_comment_to_thread(level1.id(), "level two".to_owned(), "u-b".to_owned(), "/")
        .await?;
    let level3 = f
        .braid
        .add_comment_to_thread(level2.id(), "level three".to_owned(), "u-c".to_owned(), "/")
        .await?;

    let view = f
        .braid
        .fetch_thread_by_id(root.id())
        .await?
        .expect("root thread exists");

    let level1_view = &view.replies[0];
    assert_eq!(level1_view.id, level1.id());
    assert_eq!(level1_view.author.name, "Brin");

    let level2_view = &level1_view.replies[0];
    assert_eq!(level2_view.id, level2.id());
    assert_eq!(level2_view.author.name, "Cleo");
    // Two levels down: the third level keeps its id but is not expanded.
    assert!(level2_view.replies.is_empty());
    assert_eq!(level2_view.children, [level3.id()]);

    let deep = f
        .braid
        .fetch_thread_tree(root.id(), 3)
        .await?
        .expect("root thread exists");
    let level3_view = &deep.replies[0].replies[0].replies[0];
    assert_eq!(level3_view.id, level3.id());
    assert_eq!(level3_view.author.name, "Dora");
    assert!(level3_view.replies.is_empty());

    Ok(())
}

#[tokio::test]
async fn unknown_thread_fetch_is_absent_not_an_error() -> Result<()> {
    let f = fixture();
    assert!(f.braid.fetch_thread_by_id(Uuid::new_v4()).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn create_thread_links_author_and_signals_the_path() -> Result<()> {
    let f = fixture();
    f.store.upsert_user(&user("u1", "Ada")).await?;

    let thread = f
        .braid
        .create_thread(
            CreateThread {
                text: "hello".to_owned(),
                author: "u1".to_owned(),
                community_id: Some("c9".to_owned()),
            },
            "/",
        )
        .await?;

    // The community reference is accepted but not persisted.
    assert_eq!(thread.community, None);
    let stored = f.store.get_thread(thread.id()).await?;
    assert_eq!(stored.community, None);
    assert_eq!(stored.parent_id, None);

    let author = f.store.get_user("u1").await?;
    assert_eq!(author.threads, [thread.id()]);

    assert_eq!(f.revalidations.paths(), ["/"]);
    Ok(())
}

#[tokio::test]
async fn create_thread_rejects_blank_text_without_side_effects() -> Result<()> {
    let f = fixture();
    f.store.upsert_user(&user("u1", "Ada")).await?;

    let err = f
        .braid
        .create_thread(
            CreateThread {
                text: "   ".to_owned(),
                author: "u1".to_owned(),
                community_id: None,
            },
            "/",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BraidError::Validation(_)));
    assert_eq!(stored_thread_count(&f.store).await, 0);
    assert!(f.revalidations.paths().is_empty());
    Ok(())
}

#[tokio::test]
async fn comment_on_missing_thread_fails_and_persists_nothing() -> Result<()> {
    let f = fixture();
    f.store.upsert_user(&user("u1", "Ada")).await?;

    let err = f
        .braid
        .add_comment_to_thread(Uuid::new_v4(), "hi".to_owned(), "u1".to_owned(), "/")
        .await
        .unwrap_err();

    assert!(matches!(err, BraidError::NotFound));
    assert_eq!(err.to_string(), "thread not found");
    assert_eq!(stored_thread_count(&f.store).await, 0);
    assert!(f.revalidations.paths().is_empty());
    Ok(())
}

#[tokio::test]
async fn comment_is_appended_to_the_parent_in_order() -> Result<()> {
    let f = fixture();
    f.store.upsert_user(&user("u1", "Ada")).await?;

    let root = f
        .braid
        .create_thread(
            CreateThread {
                text: "root".to_owned(),
                author: "u1".to_owned(),
                community_id: None,
            },
            "/",
        )
        .await?;
    let first = f
        .braid
        .add_comment_to_thread(root.id(), "first".to_owned(), "u1".to_owned(), "/thread/1")
        .await?;
    let second = f
        .braid
        .add_comment_to_thread(root.id(), "second".to_owned(), "u1".to_owned(), "/thread/1")
        .await?;

    assert_eq!(first.parent_id, Some(root.id()));
    assert_eq!(second.parent_id, Some(root.id()));

    let parent = f.store.get_thread(root.id()).await?;
    assert_eq!(parent.children, [first.id(), second.id()]);

    assert_eq!(f.revalidations.paths(), ["/", "/thread/1", "/thread/1"]);
    Ok(())
}

#[tokio::test]
async fn like_toggles_off_when_present() -> Result<()> {
    let f = fixture();
    let thread = post_at("u1", "post", Utc::now());
    f.store.insert_thread(&thread).await?;

    let likes = f
        .braid
        .like_post(
            thread.id(),
            "u1",
            vec!["u1".to_owned(), "u2".to_owned()],
            "/",
        )
        .await?;
    assert_eq!(likes, ["u2"]);
    assert_eq!(f.store.get_thread(thread.id()).await?.likes, ["u2"]);
    Ok(())
}

#[tokio::test]
async fn like_appends_when_absent() -> Result<()> {
    let f = fixture();
    let thread = post_at("u1", "post", Utc::now());
    f.store.insert_thread(&thread).await?;

    let likes = f
        .braid
        .like_post(thread.id(), "u1", vec!["u2".to_owned()], "/")
        .await?;
    assert_eq!(likes, ["u2", "u1"]);
    assert_eq!(f.store.get_thread(thread.id()).await?.likes, ["u2", "u1"]);
    Ok(())
}

#[tokio::test]
async fn like_with_blank_user_persists_the_caller_array_unchanged() -> Result<()> {
    let f = fixture();
    let mut thread = post_at("u1", "post", Utc::now());
    thread.likes = vec!["seeded".to_owned()];
    f.store.insert_thread(&thread).await?;

    let likes = f
        .braid
        .like_post(thread.id(), "   ", vec!["u9".to_owned()], "/")
        .await?;

    // The caller's array replaces whatever was stored even when no toggle
    // happens.
    assert_eq!(likes, ["u9"]);
    assert_eq!(f.store.get_thread(thread.id()).await?.likes, ["u9"]);
    assert_eq!(f.revalidations.paths(), ["/"]);
    Ok(())
}

#[tokio::test]
async fn like_removes_only_the_first_duplicate() -> Result<()> {
    let f = fixture();
    let thread = post_at("u1", "post", Utc::now());
    f.store.insert_thread(&thread).await?;

    let likes = f
        .braid
        .like_post(
            thread.id(),
            "u1",
            vec!["u1".to_owned(), "x".to_owned(), "u1".to_owned()],
            "/",
        )
        .await?;
    assert_eq!(likes, ["x", "u1"]);
    Ok(())
}

#[tokio::test]
async fn like_on_missing_post_is_a_store_error() -> Result<()> {
    let f = fixture();

    let err = f
        .braid
        .like_post(Uuid::new_v4(), "u1", vec![], "/")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BraidError::Store {
            op: "add like to post",
            ..
        }
    ));
    assert_eq!(err.to_string(), "add like to post failed: Item not found");
    assert!(f.revalidations.paths().is_empty());
    Ok(())
}

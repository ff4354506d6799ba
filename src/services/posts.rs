//! Post persistence.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: u64,
    pub user_id: u64,
    pub title: String,
}

pub trait PostRepository: Send + Sync {
    fn insert(&self, user_id: u64, title: &str) -> Post;
    fn find(&self, id: u64) -> Option<Post>;
    /// Returns the updated post, or None when it does not exist.
    fn update_title(&self, id: u64, title: &str) -> Option<Post>;
}

#[derive(Default)]
pub struct InMemoryPosts {
    posts: DashMap<u64, Post>,
    next_id: AtomicU64,
}

impl InMemoryPosts {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PostRepository for InMemoryPosts {
    fn insert(&self, user_id: u64, title: &str) -> Post {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let post = Post {
            id,
            user_id,
            title: title.to_string(),
        };
        self.posts.insert(id, post.clone());
        post
    }

    fn find(&self, id: u64) -> Option<Post> {
        self.posts.get(&id).map(|p| p.value().clone())
    }

    fn update_title(&self, id: u64, title: &str) -> Option<Post> {
        let mut post = self.posts.get_mut(&id)?;
        post.title = title.to_string();
        Some(post.clone())
    }
}

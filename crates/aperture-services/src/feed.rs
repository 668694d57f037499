//! Read side of the feed: raw post rows enriched with author display data
//! and like aggregates.
//!
//! The backing store exposes each table independently with no join
//! capability, so the join runs here: one primary query, then a concurrent
//! per-post fan-out. A failure in the primary query is fatal for the call;
//! a failure in any per-post lookup only degrades that post to zero-valued
//! defaults and is logged, never surfaced.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::warn;
use uuid::Uuid;

use aperture_core::{DataGateway, Error, FeedPost, Post, Profile};

pub struct Feed<G> {
    gateway: Arc<G>,
}

impl<G: DataGateway> Feed<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Every post, newest first, enriched for `viewer`.
    pub async fn fetch_all(&self, viewer: Uuid) -> Result<Vec<FeedPost>, Error> {
        let posts = self.gateway.list_posts().await?;
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        // Scatter/gather: all per-post lookups run concurrently, and the
        // gather preserves the primary query's order regardless of which
        // lookups settle first.
        Ok(join_all(posts.into_iter().map(|post| self.enrich(post, viewer))).await)
    }

    /// One user's posts (the viewer's own when `target` is `None`), newest
    /// first. All posts share an author, so the profile is fetched once.
    pub async fn fetch_for_user(
        &self,
        viewer: Uuid,
        target: Option<Uuid>,
    ) -> Result<Vec<FeedPost>, Error> {
        let target = target.unwrap_or(viewer);
        let posts = self.gateway.list_posts_by_user(target).await?;
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        let author = self.author_of(target).await;
        Ok(join_all(posts.into_iter().map(|post| {
            let author = author.as_ref();
            async move {
                let (likes_count, has_liked) =
                    tokio::join!(self.count_of(post.id), self.viewer_liked(post.id, viewer));
                FeedPost::from_parts(post, author, likes_count, has_liked)
            }
        }))
        .await)
    }

    async fn enrich(&self, post: Post, viewer: Uuid) -> FeedPost {
        let (author, likes_count, has_liked) = tokio::join!(
            self.author_of(post.user_id),
            self.count_of(post.id),
            self.viewer_liked(post.id, viewer),
        );
        FeedPost::from_parts(post, author.as_ref(), likes_count, has_liked)
    }

    /// Author display data; a missing row and a failed lookup both come
    /// back as `None`, and the post renders without a name either way.
    async fn author_of(&self, user_id: Uuid) -> Option<Profile> {
        match self.gateway.profile_by_user(user_id).await {
            Ok(profile) => profile,
            Err(error) => {
                warn!(%user_id, %error, "author lookup failed");
                None
            }
        }
    }

    async fn count_of(&self, post_id: Uuid) -> u64 {
        match self.gateway.like_count(post_id).await {
            Ok(count) => count,
            Err(error) => {
                warn!(%post_id, %error, "like count failed; defaulting to zero");
                0
            }
        }
    }

    async fn viewer_liked(&self, post_id: Uuid, viewer: Uuid) -> bool {
        match self.gateway.has_liked(post_id, viewer).await {
            Ok(liked) => liked,
            Err(error) => {
                warn!(%post_id, %error, "viewer like lookup failed; defaulting to false");
                false
            }
        }
    }
}

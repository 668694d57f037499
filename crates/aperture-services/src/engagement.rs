//! Like and comment mutators. Each call is independent, with no cross-post
//! locking; optimistic UI state belongs to the caller, with
//! `toggle_like_optimistic` as the supported apply/confirm/revert wrapper.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::warn;
use uuid::Uuid;

use aperture_core::{Comment, CommentView, DataGateway, Error, NewComment};

use crate::session::SessionSnapshot;

pub struct Engagement<G> {
    gateway: Arc<G>,
}

impl<G: DataGateway> Engagement<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Insert or delete the viewer's like row for `post_id`; `target`
    /// true means "ensure liked". This layer does not deduplicate: a
    /// front end disables the toggle while one is outstanding, and the
    /// store's unique key is the backstop.
    pub async fn toggle_like(
        &self,
        viewer: &SessionSnapshot,
        post_id: Uuid,
        target: bool,
    ) -> Result<(), Error> {
        let user_id = viewer.user_id().ok_or(Error::NotAuthenticated)?;
        if target {
            self.gateway.insert_like(post_id, user_id).await
        } else {
            self.gateway.delete_like(post_id, user_id).await
        }
    }

    /// Apply the toggle to `state` immediately, confirm it remotely, and
    /// revert `state` to its pre-toggle values if the store rejects it.
    pub async fn toggle_like_optimistic(
        &self,
        viewer: &SessionSnapshot,
        post_id: Uuid,
        state: &mut LikeState,
    ) -> Result<(), Error> {
        let previous = *state;
        *state = previous.toggled();
        match self.toggle_like(viewer, post_id, state.has_liked).await {
            Ok(()) => Ok(()),
            Err(error) => {
                *state = previous;
                Err(error)
            }
        }
    }

    /// Append a comment. Empty and whitespace-only content is rejected
    /// locally, before any remote call. Author display fields come from
    /// the viewer's own profile; the author is always the viewer, so no
    /// lookup is needed.
    pub async fn add_comment(
        &self,
        viewer: &SessionSnapshot,
        post_id: Uuid,
        content: &str,
    ) -> Result<CommentView, Error> {
        let user_id = viewer.user_id().ok_or(Error::NotAuthenticated)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::validation("comment cannot be empty"));
        }
        let row = self
            .gateway
            .insert_comment(&NewComment {
                post_id,
                user_id,
                content: content.to_string(),
            })
            .await?;
        Ok(CommentView::from_parts(row, viewer.profile.as_ref()))
    }

    /// A post's comments, oldest first, each with author display data
    /// attached. Author lookups degrade like feed enrichment: a failure
    /// leaves the name absent, never errors the listing.
    pub async fn comments(&self, post_id: Uuid) -> Result<Vec<CommentView>, Error> {
        let rows = self.gateway.list_comments(post_id).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        Ok(join_all(rows.into_iter().map(|row| self.with_author(row))).await)
    }

    async fn with_author(&self, row: Comment) -> CommentView {
        let author = match self.gateway.profile_by_user(row.user_id).await {
            Ok(profile) => profile,
            Err(error) => {
                warn!(comment_id = %row.id, %error, "commenter lookup failed");
                None
            }
        };
        CommentView::from_parts(row, author.as_ref())
    }
}

/// Viewer-local like state for one post, as a feed card renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LikeState {
    pub likes_count: u64,
    pub has_liked: bool,
}

impl LikeState {
    pub fn new(likes_count: u64, has_liked: bool) -> Self {
        Self {
            likes_count,
            has_liked,
        }
    }

    /// The state after the viewer toggles. The count never goes negative,
    /// even if it was already out of sync with the store.
    pub fn toggled(self) -> Self {
        if self.has_liked {
            Self {
                likes_count: self.likes_count.saturating_sub(1),
                has_liked: false,
            }
        } else {
            Self {
                likes_count: self.likes_count + 1,
                has_liked: true,
            }
        }
    }
}

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{Comment, NewComment, NewPost, NewProfile, Post, Profile};

/// CRUD surface of the hosted relational store and blob container.
///
/// One method per query the client issues; implementations own filtering,
/// ordering, and serialization. The store has no cross-table join
/// capability, so composition of posts, profiles, and likes happens in the
/// services layer, never here.
#[async_trait]
pub trait DataGateway: Send + Sync {
    // -- posts --

    /// All posts, newest first (ties broken by id).
    async fn list_posts(&self) -> Result<Vec<Post>, Error>;

    /// One user's posts, newest first.
    async fn list_posts_by_user(&self, user_id: Uuid) -> Result<Vec<Post>, Error>;

    async fn insert_post(&self, row: &NewPost) -> Result<Post, Error>;

    /// Point a post at its uploaded image. Returns the updated row when
    /// the store reports one.
    async fn update_image_path(
        &self,
        post_id: Uuid,
        image_path: &str,
    ) -> Result<Option<Post>, Error>;

    async fn delete_post(&self, post_id: Uuid) -> Result<(), Error>;

    // -- profiles --

    async fn profile_by_user(&self, user_id: Uuid) -> Result<Option<Profile>, Error>;
    async fn profile_by_user_name(&self, user_name: &str) -> Result<Option<Profile>, Error>;
    async fn insert_profile(&self, row: &NewProfile) -> Result<Profile, Error>;

    // -- likes --

    async fn like_count(&self, post_id: Uuid) -> Result<u64, Error>;
    async fn has_liked(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, Error>;

    /// Record a like. The store's composite unique key on
    /// `(post_id, user_id)` rejects duplicates.
    async fn insert_like(&self, post_id: Uuid, user_id: Uuid) -> Result<(), Error>;
    async fn delete_like(&self, post_id: Uuid, user_id: Uuid) -> Result<(), Error>;

    // -- comments --

    /// A post's comments, oldest first.
    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, Error>;
    async fn insert_comment(&self, row: &NewComment) -> Result<Comment, Error>;

    // -- blob container --

    /// Store an object under `key`. With `overwrite` set, an existing
    /// object at that key is replaced, which keeps retries idempotent.
    async fn upload_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), Error>;

    /// Public URL for an object. Pure derivation, no request.
    fn public_url(&self, key: &str) -> String;

    /// Time-limited URL for an object in a non-public bucket.
    async fn signed_url(&self, key: &str, ttl_secs: u32) -> Result<String, Error>;
}

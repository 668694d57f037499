//! In-memory stand-in for the hosted backend: every table and the blob
//! container as plain maps, plus per-call failure injection, lookup
//! counters, and a gate for holding an upload open mid-flight.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use tokio::sync::{Notify, broadcast};
use uuid::Uuid;

use aperture_core::{
    AuthGateway, Comment, DataGateway, Error, NewComment, NewPost, NewProfile, Post, Profile,
    Session, SessionChange,
};
use aperture_services::SessionSnapshot;
use aperture_services::media::ConnectivityProbe;

pub struct FakeBackend {
    pub posts: Mutex<Vec<Post>>,
    pub profiles: Mutex<HashMap<Uuid, Profile>>,
    pub likes: Mutex<Vec<(Uuid, Uuid)>>,
    pub comments: Mutex<Vec<Comment>>,
    pub objects: Mutex<HashMap<String, Vec<u8>>>,

    accounts: Mutex<HashMap<String, Uuid>>,
    session: Mutex<Option<Session>>,
    changes: broadcast::Sender<SessionChange>,

    // Failure injection: flip a flag and the matching call errors.
    pub fail_list_posts: AtomicBool,
    pub fail_profiles: AtomicBool,
    pub fail_like_counts: AtomicBool,
    pub fail_has_liked: AtomicBool,
    pub fail_upload: AtomicBool,
    pub fail_update_image_path: AtomicBool,
    pub fail_delete_post: AtomicBool,
    pub fail_insert_like: AtomicBool,
    pub fail_delete_like: AtomicBool,

    /// Calls to `profile_by_user`, for asserting batched lookups.
    pub profile_lookups: AtomicUsize,
    /// Per-post artificial latency on the like count, for scrambling
    /// enrichment completion order.
    pub like_count_delays_ms: Mutex<HashMap<Uuid, u64>>,
    /// When set, `upload_object` blocks until the gate is notified.
    pub upload_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            posts: Mutex::new(Vec::new()),
            profiles: Mutex::new(HashMap::new()),
            likes: Mutex::new(Vec::new()),
            comments: Mutex::new(Vec::new()),
            objects: Mutex::new(HashMap::new()),
            accounts: Mutex::new(HashMap::new()),
            session: Mutex::new(None),
            changes,
            fail_list_posts: AtomicBool::new(false),
            fail_profiles: AtomicBool::new(false),
            fail_like_counts: AtomicBool::new(false),
            fail_has_liked: AtomicBool::new(false),
            fail_upload: AtomicBool::new(false),
            fail_update_image_path: AtomicBool::new(false),
            fail_delete_post: AtomicBool::new(false),
            fail_insert_like: AtomicBool::new(false),
            fail_delete_like: AtomicBool::new(false),
            profile_lookups: AtomicUsize::new(0),
            like_count_delays_ms: Mutex::new(HashMap::new()),
            upload_gate: Mutex::new(None),
        })
    }

    // -- seeding --

    pub fn seed_account(&self, email: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), user_id);
        user_id
    }

    /// Register an account and make it the gateway's current session.
    pub fn seed_session(&self, email: &str) -> Session {
        let user_id = self.seed_account(email);
        let session = make_session(user_id, email);
        *self.session.lock().unwrap() = Some(session.clone());
        session
    }

    pub fn seed_profile(&self, user_id: Uuid, user_name: &str) -> Profile {
        let profile = Profile {
            user_id,
            user_name: user_name.to_string(),
            name: None,
            bio: None,
            created_at: Utc::now(),
        };
        self.profiles.lock().unwrap().insert(user_id, profile.clone());
        profile
    }

    /// Seed a post `age_secs` in the past; smaller ages are newer.
    pub fn seed_post(&self, user_id: Uuid, age_secs: i64) -> Post {
        let post = Post {
            id: Uuid::new_v4(),
            user_id,
            image_path: format!("{user_id}/seeded.jpeg"),
            caption: None,
            created_at: Utc::now() - Duration::seconds(age_secs),
        };
        self.posts.lock().unwrap().push(post.clone());
        post
    }

    pub fn seed_like(&self, post_id: Uuid, user_id: Uuid) {
        self.likes.lock().unwrap().push((post_id, user_id));
    }

    pub fn seed_comment(&self, post_id: Uuid, user_id: Uuid, content: &str, age_secs: i64) -> Comment {
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            user_id,
            content: content.to_string(),
            created_at: Utc::now() - Duration::seconds(age_secs),
        };
        self.comments.lock().unwrap().push(comment.clone());
        comment
    }

    /// Simulate an externally observed session transition (token refresh,
    /// expiry) without going through sign-in.
    pub fn emit(&self, change: SessionChange) {
        if let SessionChange::SignedOut = change {
            *self.session.lock().unwrap() = None;
        }
        let _ = self.changes.send(change);
    }

    pub fn likes_for(&self, post_id: Uuid, user_id: Uuid) -> usize {
        self.likes
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, u)| *p == post_id && *u == user_id)
            .count()
    }
}

fn make_session(user_id: Uuid, email: &str) -> Session {
    Session {
        user_id,
        email: email.to_string(),
        access_token: format!("token-{user_id}"),
        refresh_token: Some(format!("refresh-{user_id}")),
    }
}

fn rejected(op: &str) -> Error {
    Error::remote(format!("{op} rejected"), Some(500))
}

#[async_trait]
impl DataGateway for FakeBackend {
    async fn list_posts(&self) -> Result<Vec<Post>, Error> {
        if self.fail_list_posts.load(Ordering::Relaxed) {
            return Err(rejected("list posts"));
        }
        let mut posts = self.posts.lock().unwrap().clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn list_posts_by_user(&self, user_id: Uuid) -> Result<Vec<Post>, Error> {
        let mut posts = self.list_posts().await?;
        posts.retain(|p| p.user_id == user_id);
        Ok(posts)
    }

    async fn insert_post(&self, row: &NewPost) -> Result<Post, Error> {
        let post = Post {
            id: Uuid::new_v4(),
            user_id: row.user_id,
            image_path: row.image_path.clone(),
            caption: row.caption.clone(),
            created_at: Utc::now(),
        };
        self.posts.lock().unwrap().push(post.clone());
        Ok(post)
    }

    async fn update_image_path(
        &self,
        post_id: Uuid,
        image_path: &str,
    ) -> Result<Option<Post>, Error> {
        if self.fail_update_image_path.load(Ordering::Relaxed) {
            return Err(rejected("update post"));
        }
        let mut posts = self.posts.lock().unwrap();
        Ok(posts.iter_mut().find(|p| p.id == post_id).map(|post| {
            post.image_path = image_path.to_string();
            post.clone()
        }))
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<(), Error> {
        if self.fail_delete_post.load(Ordering::Relaxed) {
            return Err(rejected("delete post"));
        }
        self.posts.lock().unwrap().retain(|p| p.id != post_id);
        Ok(())
    }

    async fn profile_by_user(&self, user_id: Uuid) -> Result<Option<Profile>, Error> {
        self.profile_lookups.fetch_add(1, Ordering::Relaxed);
        if self.fail_profiles.load(Ordering::Relaxed) {
            return Err(rejected("profile lookup"));
        }
        Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
    }

    async fn profile_by_user_name(&self, user_name: &str) -> Result<Option<Profile>, Error> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .values()
            .find(|p| p.user_name == user_name)
            .cloned())
    }

    async fn insert_profile(&self, row: &NewProfile) -> Result<Profile, Error> {
        let profile = Profile {
            user_id: row.user_id,
            user_name: row.user_name.clone(),
            name: row.name.clone(),
            bio: row.bio.clone(),
            created_at: Utc::now(),
        };
        self.profiles
            .lock()
            .unwrap()
            .insert(row.user_id, profile.clone());
        Ok(profile)
    }

    async fn like_count(&self, post_id: Uuid) -> Result<u64, Error> {
        let delay = self
            .like_count_delays_ms
            .lock()
            .unwrap()
            .get(&post_id)
            .copied();
        if let Some(ms) = delay {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        }
        if self.fail_like_counts.load(Ordering::Relaxed) {
            return Err(rejected("like count"));
        }
        Ok(self
            .likes
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == post_id)
            .count() as u64)
    }

    async fn has_liked(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, Error> {
        if self.fail_has_liked.load(Ordering::Relaxed) {
            return Err(rejected("like lookup"));
        }
        Ok(self.likes_for(post_id, user_id) > 0)
    }

    async fn insert_like(&self, post_id: Uuid, user_id: Uuid) -> Result<(), Error> {
        if self.fail_insert_like.load(Ordering::Relaxed) {
            return Err(rejected("insert like"));
        }
        let mut likes = self.likes.lock().unwrap();
        if likes.contains(&(post_id, user_id)) {
            return Err(Error::remote(
                "duplicate key value violates unique constraint",
                Some(409),
            ));
        }
        likes.push((post_id, user_id));
        Ok(())
    }

    async fn delete_like(&self, post_id: Uuid, user_id: Uuid) -> Result<(), Error> {
        if self.fail_delete_like.load(Ordering::Relaxed) {
            return Err(rejected("delete like"));
        }
        self.likes
            .lock()
            .unwrap()
            .retain(|(p, u)| !(*p == post_id && *u == user_id));
        Ok(())
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, Error> {
        let mut comments = self.comments.lock().unwrap().clone();
        comments.retain(|c| c.post_id == post_id);
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    async fn insert_comment(&self, row: &NewComment) -> Result<Comment, Error> {
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id: row.post_id,
            user_id: row.user_id,
            content: row.content.clone(),
            created_at: Utc::now(),
        };
        self.comments.lock().unwrap().push(comment.clone());
        Ok(comment)
    }

    async fn upload_object(
        &self,
        key: &str,
        bytes: Bytes,
        _content_type: &str,
        _overwrite: bool,
    ) -> Result<(), Error> {
        let gate = self.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_upload.load(Ordering::Relaxed) {
            return Err(rejected("upload"));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("fake://objects/{key}")
    }

    async fn signed_url(&self, key: &str, ttl_secs: u32) -> Result<String, Error> {
        Ok(format!("fake://signed/{key}?ttl={ttl_secs}"))
    }
}

#[async_trait]
impl AuthGateway for FakeBackend {
    async fn sign_in(&self, email: &str, _password: &str) -> Result<Session, Error> {
        let user_id = self
            .accounts
            .lock()
            .unwrap()
            .get(email)
            .copied()
            .ok_or_else(|| Error::remote("invalid login credentials", Some(400)))?;
        let session = make_session(user_id, email);
        *self.session.lock().unwrap() = Some(session.clone());
        let _ = self.changes.send(SessionChange::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, _password: &str) -> Result<Session, Error> {
        if self.accounts.lock().unwrap().contains_key(email) {
            return Err(Error::remote("user already registered", Some(422)));
        }
        let user_id = self.seed_account(email);
        let session = make_session(user_id, email);
        *self.session.lock().unwrap() = Some(session.clone());
        let _ = self.changes.send(SessionChange::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), Error> {
        *self.session.lock().unwrap() = None;
        let _ = self.changes.send(SessionChange::SignedOut);
        Ok(())
    }

    async fn current_session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }

    fn session_changes(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }
}

/// A snapshot the way the session manager would hand it to a view.
pub fn viewer(session: &Session, profile: Option<&Profile>) -> SessionSnapshot {
    SessionSnapshot {
        session: Some(session.clone()),
        profile: profile.cloned(),
    }
}

/// Probe that always reports offline.
pub struct Offline;

#[async_trait]
impl ConnectivityProbe for Offline {
    async fn is_connected(&self) -> bool {
        false
    }
}

/// Write `bytes` to a temp file with the given extension and keep the
/// handle alive for the test's duration.
pub fn image_file(bytes: &[u8], ext: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(&format!(".{ext}"))
        .tempfile()
        .unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

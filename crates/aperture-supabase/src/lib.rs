//! Typed client for a Supabase-style hosted backend: PostgREST table CRUD,
//! Storage objects, and GoTrue password auth. This is the concrete Remote
//! Data Gateway behind the `aperture-core` traits; everything above it is
//! backend-agnostic.

mod auth;
mod rest;
mod storage;

use serde::Deserialize;
use tokio::sync::{RwLock, broadcast};

use aperture_core::{Session, SessionChange};

/// Project coordinates for a hosted backend instance.
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`.
    pub url: String,
    /// Public anon key; doubles as the bearer token for anonymous calls.
    pub anon_key: String,
}

pub struct Supabase {
    http: reqwest::Client,
    config: SupabaseConfig,
    session: RwLock<Option<Session>>,
    changes: broadcast::Sender<SessionChange>,
}

impl Supabase {
    pub fn new(mut config: SupabaseConfig) -> Self {
        config.url = config.url.trim_end_matches('/').to_string();
        let (changes, _) = broadcast::channel(16);
        Self {
            http: reqwest::Client::new(),
            config,
            session: RwLock::new(None),
            changes,
        }
    }

    /// Seed a previously persisted session (app-start restore) and notify
    /// subscribers as if it had just been signed in.
    pub async fn restore_session(&self, session: Session) {
        *self.session.write().await = Some(session.clone());
        let _ = self.changes.send(SessionChange::SignedIn(session));
    }

    /// Bearer token for the next request: the session's access token when
    /// signed in, the anon key otherwise.
    async fn bearer(&self) -> String {
        match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.config.anon_key.clone(),
        }
    }
}

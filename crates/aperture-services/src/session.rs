//! Process-wide session and profile state.
//!
//! The manager is the only writer; everything else reads snapshots or
//! subscribes to updates. On every session transition the profile row is
//! re-derived with a single lookup keyed on the new identity, and cleared
//! immediately on sign-out or session loss.

use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use aperture_core::{
    AuthGateway, DataGateway, Error, NewProfile, Profile, Session, SessionChange,
};

/// Point-in-time view of the signed-in identity and its profile row.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
}

impl SessionSnapshot {
    /// A session is profile-complete once a profile row exists for it.
    /// Navigation gating routes incomplete sessions to profile setup.
    pub fn profile_complete(&self) -> bool {
        self.session.is_some() && self.profile.is_some()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.user_id)
    }
}

pub struct SessionManager<G> {
    inner: Arc<Inner<G>>,
}

struct Inner<G> {
    gateway: Arc<G>,
    state: RwLock<SessionSnapshot>,
    updates: broadcast::Sender<SessionSnapshot>,
}

impl<G> Clone for SessionManager<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G> SessionManager<G>
where
    G: AuthGateway + DataGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        let (updates, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Inner {
                gateway,
                state: RwLock::new(SessionSnapshot::default()),
                updates,
            }),
        }
    }

    /// App-start restore: adopt whatever session the gateway already holds
    /// and derive its profile.
    pub async fn bootstrap(&self) -> SessionSnapshot {
        let session = self.inner.gateway.current_session().await;
        self.adopt(session).await
    }

    /// Keep this state in sync with the gateway's session notifications,
    /// external refreshes and expiry included, until the gateway goes
    /// away.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let mut changes = self.inner.gateway.session_changes();
        let manager = self.clone();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(SessionChange::SignedIn(session))
                    | Ok(SessionChange::Refreshed(session)) => {
                        manager.adopt(Some(session)).await;
                    }
                    Ok(SessionChange::SignedOut) => {
                        manager.adopt(None).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session listener lagged; resyncing from gateway");
                        let session = manager.inner.gateway.current_session().await;
                        manager.adopt(session).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.read().await.clone()
    }

    pub async fn profile_complete(&self) -> bool {
        self.inner.state.read().await.profile_complete()
    }

    /// Observe snapshot updates: sign-in/out, refresh, profile creation.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.inner.updates.subscribe()
    }

    // -- auth passthrough --

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionSnapshot, Error> {
        let session = self.inner.gateway.sign_in(email, password).await?;
        Ok(self.adopt(Some(session)).await)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SessionSnapshot, Error> {
        let session = self.inner.gateway.sign_up(email, password).await?;
        Ok(self.adopt(Some(session)).await)
    }

    /// Sign out. Local state is cleared immediately; the gateway's own
    /// error, if any, is surfaced verbatim afterwards.
    pub async fn sign_out(&self) -> Result<(), Error> {
        let result = self.inner.gateway.sign_out().await;
        self.adopt(None).await;
        result
    }

    /// Create the viewer's profile row. Usernames are stored lowercase
    /// and must be unique; this layer checks first so a duplicate reads
    /// as a validation problem rather than a constraint violation.
    pub async fn create_profile(
        &self,
        user_name: &str,
        name: Option<String>,
        bio: Option<String>,
    ) -> Result<Profile, Error> {
        let user_id = self
            .inner
            .state
            .read()
            .await
            .user_id()
            .ok_or(Error::NotAuthenticated)?;
        validate_user_name(user_name)?;
        let user_name = user_name.to_lowercase();
        if self
            .inner
            .gateway
            .profile_by_user_name(&user_name)
            .await?
            .is_some()
        {
            return Err(Error::validation("this username is already taken"));
        }
        let profile = self
            .inner
            .gateway
            .insert_profile(&NewProfile {
                user_id,
                user_name,
                name: none_if_blank(name),
                bio: none_if_blank(bio),
            })
            .await?;

        let snapshot = {
            let mut state = self.inner.state.write().await;
            state.profile = Some(profile.clone());
            state.clone()
        };
        let _ = self.inner.updates.send(snapshot);
        Ok(profile)
    }

    async fn adopt(&self, session: Option<Session>) -> SessionSnapshot {
        let profile = match &session {
            Some(session) => match self.inner.gateway.profile_by_user(session.user_id).await {
                Ok(profile) => profile,
                Err(error) => {
                    warn!(user_id = %session.user_id, %error,
                        "profile lookup failed on session change");
                    None
                }
            },
            None => None,
        };
        let snapshot = SessionSnapshot { session, profile };
        *self.inner.state.write().await = snapshot.clone();
        let _ = self.inner.updates.send(snapshot.clone());
        snapshot
    }
}

/// Usernames: required; letters, digits, underscores, and periods only.
pub fn validate_user_name(user_name: &str) -> Result<(), Error> {
    if user_name.trim().is_empty() {
        return Err(Error::validation("username is required"));
    }
    if !user_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(Error::validation(
            "username can only contain letters, numbers, periods and underscores",
        ));
    }
    Ok(())
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let v = v.trim();
        if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    })
}

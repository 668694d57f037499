use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Error;

/// An authenticated identity as issued by the hosted auth provider. The
/// tokens are opaque; this layer only stores and forwards them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Session lifecycle notifications, mirroring the provider's auth-state
/// change callback. `SignedOut` also covers token expiry detected through
/// a failed refresh.
#[derive(Debug, Clone)]
pub enum SessionChange {
    SignedIn(Session),
    Refreshed(Session),
    SignedOut,
}

/// Session-scoped operations of the hosted auth provider.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, Error>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, Error>;
    async fn sign_out(&self) -> Result<(), Error>;

    /// The session currently held by the gateway, if any.
    async fn current_session(&self) -> Option<Session>;

    /// Subscribe to session transitions. Every sign-in, sign-up, refresh,
    /// and sign-out is delivered to all subscribers.
    fn session_changes(&self) -> broadcast::Receiver<SessionChange>;
}

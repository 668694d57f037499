//! GoTrue password auth: sign-in, sign-up, sign-out, refresh. Session
//! state lives on the client struct; every transition is broadcast so the
//! services layer can re-derive the profile.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use aperture_core::{AuthGateway, Error, Session, SessionChange};

use crate::Supabase;
use crate::rest::{check, transport};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<AuthUser>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    email: Option<String>,
}

impl Supabase {
    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.url, path)
    }

    /// POST to an auth endpoint with the anon key only. No bearer: these
    /// calls establish the session rather than use one.
    async fn token_request(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<Session, Error> {
        let resp = self
            .http
            .post(self.auth_url(path))
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let resp = check(resp).await?;
        let token: TokenResponse = resp.json().await.map_err(transport)?;
        match (token.access_token, token.user) {
            (Some(access_token), Some(user)) => Ok(Session {
                user_id: user.id,
                email: user.email.unwrap_or_default(),
                access_token,
                refresh_token: token.refresh_token,
            }),
            // Providers with email confirmation enabled answer sign-up
            // with a user but no tokens.
            _ => Err(Error::remote(
                "no session issued; confirm your email and sign in",
                None,
            )),
        }
    }

    async fn adopt_session(&self, session: Session, change: SessionChange) -> Session {
        *self.session.write().await = Some(session.clone());
        let _ = self.changes.send(change);
        session
    }

    /// Exchange the refresh token for a new access token. A failed
    /// refresh means the session is gone: local state is cleared and
    /// subscribers see `SignedOut`, the same signal as token expiry.
    pub async fn refresh_session(&self) -> Result<Session, Error> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
            .ok_or(Error::NotAuthenticated)?;
        match self
            .token_request(
                "token?grant_type=refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await
        {
            Ok(session) => Ok(self
                .adopt_session(session.clone(), SessionChange::Refreshed(session))
                .await),
            Err(error) => {
                warn!(%error, "session refresh failed; signing out locally");
                *self.session.write().await = None;
                let _ = self.changes.send(SessionChange::SignedOut);
                Err(error)
            }
        }
    }
}

#[async_trait]
impl AuthGateway for Supabase {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, Error> {
        let session = self
            .token_request(
                "token?grant_type=password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        Ok(self
            .adopt_session(session.clone(), SessionChange::SignedIn(session))
            .await)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, Error> {
        let session = self
            .token_request(
                "signup",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        Ok(self
            .adopt_session(session.clone(), SessionChange::SignedIn(session))
            .await)
    }

    async fn sign_out(&self) -> Result<(), Error> {
        // Local session goes away first; the revoke call is surfaced but
        // cannot bring it back.
        let session = self.session.write().await.take();
        let _ = self.changes.send(SessionChange::SignedOut);

        if let Some(session) = session {
            let resp = self
                .http
                .post(self.auth_url("logout"))
                .header("apikey", &self.config.anon_key)
                .bearer_auth(session.access_token)
                .send()
                .await
                .map_err(transport)?;
            check(resp).await?;
        }
        Ok(())
    }

    async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    fn session_changes(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }
}

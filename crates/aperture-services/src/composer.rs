//! The upload pipeline: turns a local image plus caption into a persisted
//! post.
//!
//! The store has no multi-table transaction, and the blob key depends on
//! the record id, so creation is a strict record → blob → patch sequence
//! with an explicit compensating delete when the blob step fails. Losing
//! the final patch is the one tolerated inconsistency: at that point the
//! blob and the record are both durable, and the caller already holds the
//! real path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use aperture_core::{DataGateway, Error, FeedPost, NewPost, PENDING_IMAGE_PATH, Post};

use crate::media::{self, ConnectivityProbe};
use crate::session::SessionSnapshot;

/// Progress of a post submission, published for front ends to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Validating,
    CreatingRecord,
    Uploading,
    Reconciling,
    Done,
    RolledBack,
}

/// A post submission: a local image plus an optional caption.
#[derive(Debug, Clone)]
pub struct Draft {
    pub image: PathBuf,
    pub caption: Option<String>,
}

pub struct Composer<G> {
    gateway: Arc<G>,
    connectivity: Arc<dyn ConnectivityProbe>,
    in_flight: AtomicBool,
    phase: watch::Sender<UploadPhase>,
}

impl<G: DataGateway> Composer<G> {
    pub fn new(gateway: Arc<G>, connectivity: Arc<dyn ConnectivityProbe>) -> Self {
        let (phase, _) = watch::channel(UploadPhase::Idle);
        Self {
            gateway,
            connectivity,
            in_flight: AtomicBool::new(false),
            phase,
        }
    }

    /// Observe submission progress.
    pub fn phases(&self) -> watch::Receiver<UploadPhase> {
        self.phase.subscribe()
    }

    pub fn is_uploading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submit a draft on behalf of the signed-in viewer.
    ///
    /// Returns `Ok(None)` when another submission is already in flight:
    /// the request is dropped, not queued, so a double-tap cannot create a
    /// second record.
    pub async fn submit(
        &self,
        viewer: &SessionSnapshot,
        draft: Draft,
    ) -> Result<Option<FeedPost>, Error> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("submission already in flight; dropping this one");
            return Ok(None);
        }
        let _guard = InFlightGuard(&self.in_flight);

        match self.run(viewer, draft).await {
            Ok(post) => {
                self.set_phase(UploadPhase::Done);
                Ok(Some(post))
            }
            Err(error) => {
                self.set_phase(UploadPhase::RolledBack);
                Err(error)
            }
        }
    }

    async fn run(&self, viewer: &SessionSnapshot, draft: Draft) -> Result<FeedPost, Error> {
        let (session, profile) = match (&viewer.session, &viewer.profile) {
            (Some(session), Some(profile)) => (session, profile),
            _ => return Err(Error::NotAuthenticated),
        };

        // Validating: fail fast, before any remote effect.
        self.set_phase(UploadPhase::Validating);
        if !self.connectivity.is_connected().await {
            return Err(Error::NetworkUnavailable);
        }
        media::probe_image(&draft.image).await?;

        // CreatingRecord: provisional row carrying the pending sentinel.
        self.set_phase(UploadPhase::CreatingRecord);
        let record = self
            .gateway
            .insert_post(&NewPost {
                user_id: session.user_id,
                image_path: PENDING_IMAGE_PATH.to_string(),
                caption: draft.caption.clone(),
            })
            .await?;
        info!(post_id = %record.id, "created provisional post record");

        // Uploading: the blob key derives from the record id, which is why
        // the record has to exist first.
        self.set_phase(UploadPhase::Uploading);
        let key = blob_key(session.user_id, record.id, &draft.image);
        if let Err(error) = self.upload_image(&draft.image, &key).await {
            self.roll_back(record.id).await;
            return Err(error);
        }

        // Reconciling: point the record at the uploaded blob.
        self.set_phase(UploadPhase::Reconciling);
        let reconciled = match self.gateway.update_image_path(record.id, &key).await {
            Ok(updated) => updated,
            Err(error) => {
                // No rollback here: the blob and record are durable, and
                // the caller gets the real path below either way.
                warn!(post_id = %record.id, %error,
                    "image path update failed; returning locally reconciled post");
                None
            }
        };
        let post = match reconciled {
            Some(updated) => updated,
            None => Post {
                image_path: key,
                ..record
            },
        };

        // A just-created post necessarily has zero engagement, and its
        // author is the viewer, so no enrichment fetches are needed.
        Ok(FeedPost::from_parts(post, Some(profile), 0, false))
    }

    async fn upload_image(&self, image: &Path, key: &str) -> Result<(), Error> {
        let bytes = tokio::fs::read(image)
            .await
            .map_err(|_| Error::validation("could not read the selected image"))?;
        let ext = media::image_extension(image);
        self.gateway
            .upload_object(key, Bytes::from(bytes), &media::image_content_type(&ext), true)
            .await
    }

    /// Compensating action: drop the provisional record after a failed
    /// upload. Best effort; a failed delete is logged, not escalated.
    async fn roll_back(&self, post_id: Uuid) {
        match self.gateway.delete_post(post_id).await {
            Ok(()) => info!(%post_id, "rolled back provisional post record"),
            Err(error) => {
                warn!(%post_id, %error, "failed to roll back provisional post record");
            }
        }
    }

    fn set_phase(&self, phase: UploadPhase) {
        // send_replace, not send: the value must land even while nobody
        // is watching yet.
        self.phase.send_replace(phase);
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// `{owner}/{post}.{ext}`. Deterministic, so a retried upload overwrites
/// its own half-written object instead of orphaning a new one.
pub fn blob_key(owner: Uuid, post_id: Uuid, image: &Path) -> String {
    format!("{owner}/{post_id}.{}", media::image_extension(image))
}

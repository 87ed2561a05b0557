//! Profile image lifecycle.
//!
//! [`ProfileImageManager`] replaces or removes a user's profile image
//! across three places that can each fail on their own: the local spool
//! ([`TempStorage`]), the remote content store ([`ObjectStore`]) and the
//! user record. The record is authoritative; external cleanup is
//! best-effort and a stale remote object is an acceptable, recoverable
//! leak. A one-time wallet reward is granted on the first successful
//! upload, and per-user locking keeps two racing first uploads from both
//! crediting it.

mod object_store;
mod temp;

pub use object_store::*;
pub use temp::*;

use std::collections::HashMap;
use std::io::{Error as IoError, ErrorKind};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::config;
use crate::error::StoreError;
use crate::user::{ImageRef, User, UserStore};
use crate::wallet::WalletStore;

/// Error type.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Empty payload, disallowed content type or oversized image.
    #[error("invalid image payload: {0}")]
    Validation(String),

    /// Local spool write failure.
    #[error("failed to persist image locally")]
    Storage(#[source] IoError),

    /// Remote store unreachable or rejecting the upload.
    #[error("failed to upload image to remote store: {0}")]
    Upload(String),

    /// Remote delete failure. Never aborts an operation.
    #[error("failed to delete remote object {id}: {reason}")]
    RemoteDelete { id: String, reason: String },

    /// Nothing to delete.
    #[error("no profile image to delete")]
    NotFound,

    /// Record store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ImageError {
    /// Whether the orchestrator may log this error and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ImageError::RemoteDelete { .. })
    }
}

/// Upload constraints and reward rule, from configuration.
#[derive(Clone, Debug)]
pub struct UploadPolicy {
    pub allowed_types: Vec<String>,
    pub max_size_bytes: usize,
    /// Remote folder receiving profile images.
    pub folder: String,
    /// Amount credited on the first successful upload.
    pub reward: i64,
    pub currency: String,
    /// Bound on every local or remote I/O call.
    pub io_timeout: Duration,
}

impl UploadPolicy {
    pub fn from_config(
        upload: &config::Upload,
        wallet: &config::Wallet,
        folder: Option<String>,
    ) -> Self {
        Self {
            allowed_types: upload.allowed_types.clone(),
            max_size_bytes: upload.max_size_bytes,
            folder: folder.unwrap_or_else(|| "profile_images".to_owned()),
            reward: wallet.reward,
            currency: wallet.currency.clone(),
            io_timeout: Duration::from_secs(upload.timeout_secs),
        }
    }

    fn check(
        &self,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Validation("empty payload".to_owned()));
        }
        if !self.allowed_types.iter().any(|t| t == content_type) {
            return Err(ImageError::Validation(format!(
                "content type `{content_type}` is not accepted"
            )));
        }
        if bytes.len() > self.max_size_bytes {
            return Err(ImageError::Validation(format!(
                "image exceeds {} bytes",
                self.max_size_bytes
            )));
        }
        Ok(())
    }
}

/// Wallet state returned alongside a successful upload.
#[derive(Clone, Debug, PartialEq)]
pub struct WalletSnapshot {
    pub balance: i64,
    pub currency: String,
}

/// Result of a successful [`ProfileImageManager::replace_image`].
///
/// `wallet` is absent when the image was installed but the wallet step
/// failed afterwards (partial success, reported not rolled back).
#[derive(Clone, Debug)]
pub struct UploadOutcome {
    pub url: String,
    pub wallet: Option<WalletSnapshot>,
}

/// Orchestrates profile image replacement and removal.
pub struct ProfileImageManager {
    users: Arc<dyn UserStore>,
    wallets: Arc<dyn WalletStore>,
    objects: Arc<dyn ObjectStore>,
    temp: TempStorage,
    policy: UploadPolicy,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProfileImageManager {
    /// Create a new [`ProfileImageManager`].
    pub fn new(
        users: Arc<dyn UserStore>,
        wallets: Arc<dyn WalletStore>,
        objects: Arc<dyn ObjectStore>,
        temp: TempStorage,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            users,
            wallets,
            objects,
            temp,
            policy,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Replace `target`'s profile image with `bytes`.
    ///
    /// Steps, in order: validate, serialize on the user, best-effort
    /// cleanup of the previous image, spool locally, upload remotely,
    /// install the new [`ImageRef`] with a single record update, then
    /// settle the wallet. The first hard failure (spool or upload)
    /// aborts with the record untouched by this call; cleanup failures
    /// never abort.
    pub async fn replace_image(
        &self,
        target: &User,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<UploadOutcome, ImageError> {
        self.policy.check(bytes, content_type)?;

        let lock = self.user_lock(&target.id);
        let _guard = lock.lock().await;

        // re-read under the lock: the reward decision must see the
        // latest committed image state.
        let current = self.users.find_by_id(&target.id).await?;
        let had_image_previously = current.image.is_some();

        if let Some(previous) = &current.image {
            self.discard_remote(&previous.remote_id).await;
            if let Some(path) = &previous.local_path {
                self.discard_local(path).await;
            }
        }

        let local_path = timeout(
            self.policy.io_timeout,
            self.temp.write(bytes),
        )
        .await
        .map_err(|_| {
            ImageError::Storage(IoError::new(
                ErrorKind::TimedOut,
                "local write timed out",
            ))
        })??;

        // on failure the spooled file may remain; the next successful
        // upload removes it.
        let remote = timeout(
            self.policy.io_timeout,
            self.objects.upload(&local_path, &self.policy.folder),
        )
        .await
        .map_err(|_| ImageError::Upload("remote store timed out".to_owned()))??;

        let image = ImageRef {
            remote_url: remote.url.clone(),
            remote_id: remote.id.clone(),
            local_path: Some(local_path.to_string_lossy().into_owned()),
        };

        if let Err(err) =
            self.users.set_image_ref(&target.id, Some(&image)).await
        {
            // the record never pointed at the new object; compensate.
            self.discard_remote(&remote.id).await;
            self.discard_local(&local_path).await;
            return Err(err.into());
        }

        let wallet =
            self.settle_reward(&target.id, had_image_previously).await;

        Ok(UploadOutcome {
            url: remote.url,
            wallet,
        })
    }

    /// Remove `target`'s profile image.
    ///
    /// External deletions are best-effort; only clearing the record can
    /// fail the operation. Afterwards the authoritative state is "no
    /// image" whether or not every external copy is gone.
    pub async fn remove_image(
        &self,
        target: &User,
    ) -> Result<(), ImageError> {
        let lock = self.user_lock(&target.id);
        let _guard = lock.lock().await;

        let current = self.users.find_by_id(&target.id).await?;
        let Some(image) = current.image else {
            return Err(ImageError::NotFound);
        };

        self.discard_remote(&image.remote_id).await;
        if let Some(path) = &image.local_path {
            self.discard_local(path).await;
        }

        self.users.set_image_ref(&target.id, None).await?;
        Ok(())
    }

    /// Fetch-or-create the wallet and credit the one-time reward iff the
    /// user had no image before this upload. Failures here are a partial
    /// success: the image is live and recorded, so they are reported
    /// through the missing snapshot rather than rolled back.
    async fn settle_reward(
        &self,
        user_id: &str,
        had_image_previously: bool,
    ) -> Option<WalletSnapshot> {
        let wallet = match self
            .wallets
            .get_or_create(user_id, &self.policy.currency)
            .await
        {
            Ok(wallet) => wallet,
            Err(err) => {
                tracing::error!(
                    %user_id,
                    error = %err,
                    "wallet lookup failed after image commit"
                );
                return None;
            },
        };

        if had_image_previously {
            return Some(WalletSnapshot {
                balance: wallet.balance,
                currency: wallet.currency,
            });
        }

        match self.wallets.credit(user_id, self.policy.reward).await {
            Ok(balance) => Some(WalletSnapshot {
                balance,
                currency: wallet.currency,
            }),
            Err(err) => {
                tracing::error!(
                    %user_id,
                    error = %err,
                    "reward credit failed after image commit"
                );
                None
            },
        }
    }

    async fn discard_remote(&self, remote_id: &str) {
        let result = match timeout(
            self.policy.io_timeout,
            self.objects.delete(remote_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ImageError::RemoteDelete {
                id: remote_id.to_owned(),
                reason: "timed out".to_owned(),
            }),
        };

        if let Err(err) = result {
            log_best_effort("remote object delete", &err);
        }
    }

    async fn discard_local(&self, path: impl AsRef<std::path::Path>) {
        if let Err(err) = self.temp.remove(path).await {
            log_best_effort("local file removal", &err);
        }
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut registry = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        registry.entry(user_id.to_owned()).or_default().clone()
    }
}

fn log_best_effort(step: &str, err: &ImageError) {
    if err.is_recoverable() {
        tracing::warn!(error = %err, "{step} failed; continuing");
    } else {
        tracing::error!(error = %err, "{step} failed; continuing");
    }
}

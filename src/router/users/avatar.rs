//! Profile image upload and deletion endpoints.
//!
//! Thin wrappers around [`crate::image::ProfileImageManager`]: the
//! handlers decide who the target is and whether the caller may touch
//! it, the manager does everything else.

use axum::extract::{Multipart, Path, State};
use axum::{Extension, Json};
use serde::Serialize;

use crate::error::{Result, ServerError};
use crate::image::{ImageError, UploadOutcome};
use crate::router::Envelope;
use crate::user::User;
use crate::AppState;

/// Multipart field carrying the image.
const FIELD: &str = "profile_image";

#[derive(Debug, Serialize)]
pub struct UploadData {
    pub cloudinary_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_balance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl From<UploadOutcome> for UploadData {
    fn from(outcome: UploadOutcome) -> Self {
        let (wallet_balance, currency) = match outcome.wallet {
            Some(wallet) => (Some(wallet.balance), Some(wallet.currency)),
            None => (None, None),
        };

        Self {
            cloudinary_url: outcome.url,
            wallet_balance,
            currency,
        }
    }
}

/// `POST /profile/image`: replace the caller's profile image.
pub async fn upload_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<UploadData>>> {
    let mut file: Option<(Vec<u8>, String)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FIELD) {
            let content_type =
                field.content_type().unwrap_or_default().to_owned();
            let bytes = field.bytes().await?;
            file = Some((bytes.to_vec(), content_type));
        }
    }

    let Some((bytes, content_type)) = file else {
        return Err(ServerError::Image(ImageError::Validation(format!(
            "missing `{FIELD}` field"
        ))));
    };

    let outcome = state
        .images
        .replace_image(&user, &bytes, &content_type)
        .await?;

    let message = if outcome.wallet.is_some() {
        "profile image uploaded"
    } else {
        "profile image uploaded; wallet update pending"
    };

    Ok(Json(Envelope::success(message, UploadData::from(outcome))))
}

/// `DELETE /profile/image`: remove the caller's profile image.
pub async fn delete_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Envelope<()>>> {
    state.images.remove_image(&user).await?;
    Ok(Json(Envelope::message_only("profile image deleted")))
}

/// `DELETE /users/{user_id}/image`: admin-targeted removal.
pub async fn admin_delete_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<User>,
    Path(user_id): Path<String>,
) -> Result<Json<Envelope<()>>> {
    if !caller.is_admin() {
        return Err(ServerError::Forbidden);
    }

    let target = state.users.find_by_id(&user_id).await?;
    state.images.remove_image(&target).await?;
    Ok(Json(Envelope::message_only("profile image deleted")))
}

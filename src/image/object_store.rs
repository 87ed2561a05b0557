//! Remote content store client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};

use crate::config::Cloudinary as CloudinaryConfig;
use crate::image::ImageError;

/// Uploaded object: public URL plus the opaque content id used to delete
/// it later.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteObject {
    pub url: String,
    pub id: String,
}

/// Remote object store consumed by the image manager.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file into `folder`.
    async fn upload(
        &self,
        local_path: &Path,
        folder: &str,
    ) -> Result<RemoteObject, ImageError>;

    /// Delete an uploaded object by content id.
    async fn delete(&self, remote_id: &str) -> Result<(), ImageError>;
}

/// Cloudinary REST client with SHA-1 request signing.
pub struct Cloudinary {
    http: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl Cloudinary {
    /// Create a new [`Cloudinary`] client with a bounded request timeout.
    pub fn new(
        config: &CloudinaryConfig,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            cloud_name: config.cloud_name.clone(),
            api_key: config.key.clone(),
            api_secret: config.secret.clone(),
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/{action}",
            self.cloud_name
        )
    }

    /// Sign request parameters: SHA-1 over the alphabetically sorted
    /// `key=value` pairs joined with `&`, with the API secret appended.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut params = params
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .collect::<Vec<_>>();
        params.sort_by_key(|(key, _)| *key);

        let to_sign = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha1::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl ObjectStore for Cloudinary {
    async fn upload(
        &self,
        local_path: &Path,
        folder: &str,
    ) -> Result<RemoteObject, ImageError> {
        let buffer = tokio::fs::read(local_path)
            .await
            .map_err(ImageError::Storage)?;

        // buffer hash as unique identifier.
        let public_id = hex::encode(Sha1::digest(&buffer));
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("folder", folder),
            ("public_id", &public_id),
            ("timestamp", &timestamp),
        ]);

        let part = Part::bytes(buffer)
            .file_name("profile_image")
            .mime_str("application/octet-stream")
            .map_err(|err| ImageError::Upload(err.to_string()))?;
        let mut form = Form::new()
            .text("api_key", self.api_key.clone())
            .text("public_id", public_id)
            .text("timestamp", timestamp)
            .text("signature", signature)
            .part("file", part);
        if !folder.is_empty() {
            form = form.text("folder", folder.to_owned());
        }

        let response = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|err| ImageError::Upload(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ImageError::Upload(format!(
                "cloudinary responded with {}",
                response.status()
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|err| ImageError::Upload(err.to_string()))?;

        Ok(RemoteObject {
            url: uploaded.secure_url,
            id: uploaded.public_id,
        })
    }

    async fn delete(&self, remote_id: &str) -> Result<(), ImageError> {
        let remote_delete = |reason: String| ImageError::RemoteDelete {
            id: remote_id.to_owned(),
            reason,
        };

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self
            .sign(&[("public_id", remote_id), ("timestamp", &timestamp)]);

        let form = Form::new()
            .text("api_key", self.api_key.clone())
            .text("public_id", remote_id.to_owned())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let response = self
            .http
            .post(self.endpoint("destroy"))
            .multipart(form)
            .send()
            .await
            .map_err(|err| remote_delete(err.to_string()))?;

        if !response.status().is_success() {
            return Err(remote_delete(format!(
                "cloudinary responded with {}",
                response.status()
            )));
        }

        let destroyed: DestroyResponse = response
            .json()
            .await
            .map_err(|err| remote_delete(err.to_string()))?;

        // an object that is already gone counts as deleted.
        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(remote_delete(format!("result `{other}`"))),
        }
    }
}

mod repository;

pub use repository::*;

use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Flag bit granting administrative rights.
pub const ADMIN_FLAG: i32 = 1;

const ID_BYTES: usize = 12;

/// User as saved on database.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    #[serde(skip)]
    pub password: String,
    pub flags: i32,
    /// Current profile image, absent when the user has none.
    pub image: Option<ImageRef>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.flags & ADMIN_FLAG != 0
    }
}

/// Pointer to a user's current profile image.
///
/// Remote url and id always travel together; the local spool path may be
/// absent when the file has already been reclaimed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub remote_url: String,
    pub remote_id: String,
    pub local_path: Option<String>,
}

/// Mutable profile fields. `id` and `email` are immutable identity keys.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Generate an opaque user identifier.
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// User record store.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Duplicate email is [`StoreError::Conflict`].
    async fn insert(&self, user: &User) -> Result<(), StoreError>;

    async fn find_by_id(&self, user_id: &str) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Update mutable profile fields.
    async fn update_profile(
        &self,
        user_id: &str,
        fields: &ProfileUpdate,
    ) -> Result<(), StoreError>;

    /// Install or clear the profile image reference with a single call.
    async fn set_image_ref(
        &self,
        user_id: &str,
        image: Option<&ImageRef>,
    ) -> Result<(), StoreError>;

    async fn insert_refresh_token(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<(), StoreError>;

    /// Resolve a refresh token back to its user id.
    async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<String, StoreError>;
}

//! In-memory collaborators and request helpers for tests.
//!
//! MUST NEVER be used in production.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, header};
use tower::util::ServiceExt;

use crate::config::Configuration;
use crate::crypto::PasswordManager;
use crate::error::StoreError;
use crate::image::{
    ImageError, ObjectStore, ProfileImageManager, RemoteObject, TempStorage,
    UploadPolicy,
};
use crate::token::TokenManager;
use crate::user::{ImageRef, ProfileUpdate, User, UserStore};
use crate::wallet::{Wallet, WalletStore};
use crate::{AppState, app};

pub const TEST_PASSWORD: &str = "Sup3r$trong";

/// A stored user with a hashed [`TEST_PASSWORD`]-like placeholder.
pub fn some_user(id: &str) -> User {
    User {
        id: id.to_owned(),
        name: "Test User".to_owned(),
        email: format!("{id}@example.com"),
        phone: "0000000000".to_owned(),
        address: None,
        password: String::default(),
        flags: 0,
        image: None,
        created_at: chrono::Utc::now(),
    }
}

/// User record store backed by an in-memory HashMap.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
    refresh_tokens: RwLock<HashMap<String, String>>,
    fail_image_updates: AtomicBool,
    image_update_calls: AtomicUsize,
}

impl MemoryUserStore {
    pub fn seed(&self, user: User) {
        self.users.write().unwrap().insert(user.id.clone(), user);
    }

    pub fn fail_image_updates(&self, fail: bool) {
        self.fail_image_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set_image_ref` calls.
    pub fn image_updates(&self) -> usize {
        self.image_update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().unwrap();
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict);
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<User, StoreError> {
        self.users
            .read()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.users
            .read()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        fields: &ProfileUpdate,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write().unwrap();
        let user = users.get_mut(user_id).ok_or(StoreError::NotFound)?;
        if let Some(name) = &fields.name {
            user.name = name.clone();
        }
        if let Some(phone) = &fields.phone {
            user.phone = phone.clone();
        }
        if let Some(address) = &fields.address {
            user.address = Some(address.clone());
        }
        Ok(())
    }

    async fn set_image_ref(
        &self,
        user_id: &str,
        image: Option<&ImageRef>,
    ) -> Result<(), StoreError> {
        if self.fail_image_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected failure".to_owned()));
        }
        let mut users = self.users.write().unwrap();
        let user = users.get_mut(user_id).ok_or(StoreError::NotFound)?;
        user.image = image.cloned();
        self.image_update_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn insert_refresh_token(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<(), StoreError> {
        self.refresh_tokens
            .write()
            .unwrap()
            .insert(token.to_owned(), user_id.to_owned());
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<String, StoreError> {
        self.refresh_tokens
            .read()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

/// Wallet store backed by an in-memory HashMap.
#[derive(Default)]
pub struct MemoryWalletStore {
    wallets: RwLock<HashMap<String, Wallet>>,
    credit_call_count: AtomicUsize,
    fail_credits: AtomicBool,
}

impl MemoryWalletStore {
    pub fn fail_credits(&self, fail: bool) {
        self.fail_credits.store(fail, Ordering::SeqCst);
    }

    pub fn credit_calls(&self) -> usize {
        self.credit_call_count.load(Ordering::SeqCst)
    }

    pub fn balance(&self, user_id: &str) -> i64 {
        self.wallets
            .read()
            .unwrap()
            .get(user_id)
            .map(|w| w.balance)
            .unwrap_or_default()
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn get_or_create(
        &self,
        user_id: &str,
        currency: &str,
    ) -> Result<Wallet, StoreError> {
        let mut wallets = self.wallets.write().unwrap();
        Ok(wallets
            .entry(user_id.to_owned())
            .or_insert_with(|| Wallet {
                user_id: user_id.to_owned(),
                balance: 0,
                currency: currency.to_owned(),
            })
            .clone())
    }

    async fn credit(
        &self,
        user_id: &str,
        amount: i64,
    ) -> Result<i64, StoreError> {
        if self.fail_credits.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected failure".to_owned()));
        }
        let mut wallets = self.wallets.write().unwrap();
        let wallet =
            wallets.get_mut(user_id).ok_or(StoreError::NotFound)?;
        wallet.balance += amount;
        self.credit_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(wallet.balance)
    }
}

/// Object store recording uploads and deletes instead of talking to
/// Cloudinary.
#[derive(Default)]
pub struct MemoryObjectStore {
    uploaded: RwLock<Vec<String>>,
    deleted: RwLock<Vec<String>>,
    upload_call_count: AtomicUsize,
    delete_call_count: AtomicUsize,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Content ids uploaded so far.
    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.read().unwrap().clone()
    }

    /// Content ids whose delete succeeded.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.read().unwrap().clone()
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_call_count.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        local_path: &Path,
        folder: &str,
    ) -> Result<RemoteObject, ImageError> {
        self.upload_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(ImageError::Upload(
                "object store offline (test)".to_owned(),
            ));
        }

        // the spool file must exist, like a real upload would require.
        tokio::fs::read(local_path)
            .await
            .map_err(ImageError::Storage)?;

        let mut uploaded = self.uploaded.write().unwrap();
        let id = format!("{folder}/obj-{}", uploaded.len());
        uploaded.push(id.clone());

        Ok(RemoteObject {
            url: format!("https://res.cloudinary.example/{id}"),
            id,
        })
    }

    async fn delete(&self, remote_id: &str) -> Result<(), ImageError> {
        self.delete_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ImageError::RemoteDelete {
                id: remote_id.to_owned(),
                reason: "unreachable (test)".to_owned(),
            });
        }
        self.deleted.write().unwrap().push(remote_id.to_owned());
        Ok(())
    }
}

/// Everything an HTTP-level test needs to poke at the app.
pub struct TestContext {
    pub state: AppState,
    pub users: Arc<MemoryUserStore>,
    pub wallets: Arc<MemoryWalletStore>,
    pub objects: Arc<MemoryObjectStore>,
    _spool: tempfile::TempDir,
}

/// Build an [`AppState`] wired to in-memory collaborators.
pub fn state() -> TestContext {
    let users = Arc::new(MemoryUserStore::default());
    let wallets = Arc::new(MemoryWalletStore::default());
    let objects = Arc::new(MemoryObjectStore::default());
    let spool = tempfile::tempdir().unwrap();

    let config = Arc::new(Configuration::default());
    let policy = UploadPolicy::from_config(
        &config.upload,
        &config.wallet,
        None,
    );
    let images = Arc::new(ProfileImageManager::new(
        users.clone(),
        wallets.clone(),
        objects.clone(),
        TempStorage::new(spool.path()),
        policy,
    ));

    let state = AppState {
        config,
        users: users.clone(),
        images,
        token: TokenManager::new("test-secret", "https://account.test/"),
        crypto: Arc::new(
            PasswordManager::new(Some(crate::config::Argon2 {
                memory_cost: 1024,
                iterations: 1,
                parallelism: 1,
                hash_length: 32,
            }))
            .unwrap(),
        ),
    };

    TestContext {
        state,
        users,
        wallets,
        objects,
        _spool: spool,
    }
}

impl TestContext {
    /// Seed a user whose password is [`TEST_PASSWORD`], returning a valid
    /// bearer token for it.
    pub fn seed_user(&self, id: &str, flags: i32) -> String {
        let mut user = some_user(id);
        user.flags = flags;
        user.password =
            self.state.crypto.hash_password(TEST_PASSWORD).unwrap();
        self.users.seed(user);
        self.state.token.create(id).unwrap()
    }
}

pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: String,
) -> Response<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request =
            request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

const BOUNDARY: &str = "test-boundary-0c1f";

/// Build and send a `multipart/form-data` request with a single file
/// field.
pub async fn make_multipart_request(
    app: Router,
    path: &str,
    token: Option<&str>,
    field: &str,
    content_type: &str,
    bytes: &[u8],
) -> Response<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; \
             filename=\"photo.jpg\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("Content-Type: {content_type}\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut request = Request::builder().method(Method::POST).uri(path).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        request =
            request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

//! Handle database requests.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Pool, Postgres, Row};

use crate::error::StoreError;
use crate::user::{ImageRef, ProfileUpdate, User, UserStore};

const USER_COLUMNS: &str = "id, name, email, phone, address, password, \
     flags, avatar_url, avatar_id, avatar_local_path, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    pool: Pool<Postgres>,
}

impl PgUserStore {
    /// Create a new [`PgUserStore`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

impl FromRow<'_, PgRow> for User {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let remote_url: Option<String> = row.try_get("avatar_url")?;
        let remote_id: Option<String> = row.try_get("avatar_id")?;
        let local_path: Option<String> = row.try_get("avatar_local_path")?;

        // url and id are written together; anything else is treated as
        // "no image".
        let image = match (remote_url, remote_id) {
            (Some(remote_url), Some(remote_id)) => Some(ImageRef {
                remote_url,
                remote_id,
                local_path,
            }),
            _ => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
            password: row.try_get("password")?,
            flags: row.try_get("flags")?,
            image,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO users (id, name, email, phone, address, password, flags)
                VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.password)
        .bind(user.flags)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<User, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        fields: &ProfileUpdate,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"UPDATE users
                SET name = COALESCE($2, name),
                    phone = COALESCE($3, phone),
                    address = COALESCE($4, address)
                WHERE id = $1"#,
        )
        .bind(user_id)
        .bind(&fields.name)
        .bind(&fields.phone)
        .bind(&fields.address)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn set_image_ref(
        &self,
        user_id: &str,
        image: Option<&ImageRef>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"UPDATE users
                SET avatar_url = $2, avatar_id = $3, avatar_local_path = $4
                WHERE id = $1"#,
        )
        .bind(user_id)
        .bind(image.map(|i| i.remote_url.as_str()))
        .bind(image.map(|i| i.remote_id.as_str()))
        .bind(image.and_then(|i| i.local_path.as_deref()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn insert_refresh_token(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(r#"INSERT INTO tokens (token, user_id) VALUES ($1, $2)"#)
            .bind(token)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<String, StoreError> {
        let row = sqlx::query(r#"SELECT user_id FROM tokens WHERE token = $1"#)
            .bind(token)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("user_id").map_err(StoreError::from)?)
    }
}

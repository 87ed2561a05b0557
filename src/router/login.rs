//! Credential check and token issuance.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Result, ServerError, StoreError};
use crate::router::Valid;
use crate::token::{EXPIRATION_TIME, TOKEN_TYPE, refresh_token};
use crate::{AppState, user::User};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: UserSummary,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Handler to log a user in.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let email = body.email.trim().to_lowercase();
    let user = match state.users.find_by_email(&email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(ServerError::BadCredentials),
        Err(err) => return Err(err.into()),
    };

    if !state
        .crypto
        .verify_password(&body.password, &user.password)?
    {
        return Err(ServerError::BadCredentials);
    }

    let access_token = state.token.create(&user.id)?;
    let refresh_token = refresh_token();
    state
        .users
        .insert_refresh_token(&user.id, &refresh_token)
        .await?;

    Ok(Json(Response {
        token_type: TOKEN_TYPE.to_owned(),
        access_token,
        refresh_token,
        expires_in: EXPIRATION_TIME,
        user: UserSummary::from(&user),
    }))
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RefreshBody {
    #[validate(length(min = 1, message = "refresh_token is required."))]
    pub refresh_token: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub token_type: String,
    pub access_token: String,
    pub expires_in: u64,
}

/// Handler to exchange a refresh token for a fresh access token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Valid(body): Valid<RefreshBody>,
) -> Result<Json<RefreshResponse>> {
    let user_id = state
        .users
        .find_refresh_token(&body.refresh_token)
        .await
        .map_err(|_| ServerError::Unauthorized)?;

    Ok(Json(RefreshResponse {
        token_type: TOKEN_TYPE.to_owned(),
        access_token: state.token.create(&user_id)?,
        expires_in: EXPIRATION_TIME,
    }))
}

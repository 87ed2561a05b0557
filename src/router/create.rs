//! Account registration.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::{User, generate_id};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(
        min = 2,
        max = 100,
        message = "Name must be 2 to 100 characters long."
    ))]
    pub name: String,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(
        length(
            min = 6,
            max = 255,
            message = "Password must be at least 6 characters long."
        ),
        custom(function = "crate::router::validate_password")
    )]
    pub password: String,
    #[validate(length(max = 20, message = "Phone must be at most 20 digits."))]
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
}

/// Handler to create user.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<Response>)> {
    let user = User {
        id: generate_id(),
        name: body.name,
        email: body.email.trim().to_lowercase(),
        phone: body.phone.unwrap_or_default(),
        address: body.address,
        password: state.crypto.hash_password(&body.password)?,
        flags: 0,
        image: None,
        created_at: chrono::Utc::now(),
    };

    state.users.insert(&user).await?;

    Ok((
        StatusCode::CREATED,
        Json(Response {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            address: user.address,
        }),
    ))
}

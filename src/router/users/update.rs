//! Update own profile fields.

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;
use crate::router::Valid;
use crate::user::{ProfileUpdate, User};
use crate::{AppState, router::users::get};

#[derive(Debug, Validate, Serialize, Deserialize)]
pub struct Body {
    #[validate(length(
        min = 2,
        max = 100,
        message = "Name must be 2 to 100 characters long."
    ))]
    name: Option<String>,
    #[validate(length(max = 20, message = "Phone must be at most 20 digits."))]
    phone: Option<String>,
    address: Option<String>,
}

pub async fn handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<Body>,
) -> Result<Json<get::Response>> {
    let fields = ProfileUpdate {
        name: body.name,
        phone: body.phone,
        address: body.address,
    };
    state.users.update_profile(&user.id, &fields).await?;

    let user = state.users.find_by_id(&user.id).await?;
    Ok(Json(get::Response::from(user)))
}

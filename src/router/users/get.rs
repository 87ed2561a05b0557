//! Get own profile.

use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::user::User;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<User> for Response {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            address: user.address,
            image_url: user.image.map(|image| image.remote_url),
        }
    }
}

pub async fn handler(
    Extension(user): Extension<User>,
) -> Result<Json<Response>> {
    Ok(Json(Response::from(user)))
}

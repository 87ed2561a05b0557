//! Authenticated user HTTP API.

pub mod avatar;
pub mod get;
pub mod update;

use axum::extract::{Request, State};
use axum::http::header;
use axum::response::Response;
use axum::routing::{delete, get as get_method, patch, post};
use axum::{Router, middleware};

use crate::user::User;
use crate::{AppState, ServerError};

const BEARER: &str = "Bearer ";

/// Custom middleware for authentification.
///
/// Resolves the bearer token to a [`User`] and stores it in the request
/// extensions; authorization decisions stay in the handlers.
async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: middleware::Next,
) -> Result<Response, ServerError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(ServerError::Unauthorized)?;
    let token = token.strip_prefix(BEARER).unwrap_or(token);

    let claims = state.token.decode(token)?;
    let user = state
        .users
        .find_by_id(&claims.sub)
        .await
        .map_err(|_| ServerError::Unauthorized)?;

    req.extensions_mut().insert::<User>(user);
    Ok(next.run(req).await)
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // `GET /profile` goes to `get`.
        .route("/profile", get_method(get::handler))
        // `PATCH /profile/edit` goes to `update`.
        .route("/profile/edit", patch(update::handler))
        // `POST`/`DELETE /profile/image` go to the image manager.
        .route(
            "/profile/image",
            post(avatar::upload_handler).delete(avatar::delete_handler),
        )
        // `DELETE /users/{user_id}/image`: admin-targeted variant.
        .route("/users/{user_id}/image", delete(avatar::admin_delete_handler))
        .route_layer(middleware::from_fn_with_state(state, auth))
}

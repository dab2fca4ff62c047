//! API endpoints
//!
//! Este módulo contiene los endpoints de la API.

pub mod archives;
pub mod auth;
pub mod cars;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::{middleware::auth::auth_middleware, state::AppState};

/// Endpoint raíz de la API
async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Car Dealership Inventory API" }))
}

/// Crear el router principal de la API
///
/// El login es la única ruta pública; todo lo demás pasa por el
/// middleware de autenticación JWT.
pub fn create_api_router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(root))
        .route("/auth/login", post(auth::login));

    let protected = Router::new()
        .nest("/auth", auth::create_auth_router())
        .nest("/cars", cars::create_cars_router())
        .nest("/archives", archives::create_archives_router())
        .route_layer(from_fn_with_state(state, auth_middleware));

    public.merge(protected)
}

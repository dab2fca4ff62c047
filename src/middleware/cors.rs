//! Middleware de CORS
//!
//! Este módulo maneja la configuración de CORS para permitir
//! requests desde diferentes orígenes.

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

/// Crear middleware de CORS configurado para desarrollo
/// NOTA: Permite cualquier origen - solo para desarrollo
pub fn cors_middleware() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Crear middleware de CORS con orígenes específicos
///
/// Un `*` en la lista degrada a la variante permisiva: tower-http no
/// admite combinar el comodín literal con `allow_credentials`.
pub fn cors_middleware_with_origins(origins: Vec<String>) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return cors_middleware();
    }

    let mut cors = CorsLayer::new();

    for origin in origins {
        if let Ok(header_value) = HeaderValue::from_str(&origin) {
            cors = cors.allow_origin(header_value);
        }
    }

    cors.allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::OPTIONS,
    ])
    .allow_headers([
        HeaderName::from_static("authorization"),
        HeaderName::from_static("content-type"),
        HeaderName::from_static("accept"),
        HeaderName::from_static("origin"),
        HeaderName::from_static("x-requested-with"),
    ])
    .allow_credentials(true)
    .max_age(std::time::Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn ping() -> &'static str {
        "ok"
    }

    #[tokio::test]
    async fn test_wildcard_origin_serves_requests() {
        // CORS_ORIGINS=* es la configuración por defecto
        let app = Router::new()
            .route("/ping", get(ping))
            .layer(cors_middleware_with_origins(vec!["*".to_string()]));

        let response = app
            .oneshot(
                Request::get("/ping")
                    .header("Origin", "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_explicit_origin_is_echoed() {
        let app = Router::new()
            .route("/ping", get(ping))
            .layer(cors_middleware_with_origins(vec![
                "http://localhost:5173".to_string(),
            ]));

        let response = app
            .oneshot(
                Request::get("/ping")
                    .header("Origin", "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost:5173")
        );
    }
}

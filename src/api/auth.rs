//! Handlers de autenticación
//!
//! Este módulo maneja el login, la gestión de usuarios y el
//! bootstrap del admin inicial.

use axum::{
    extract::{Extension, Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

use crate::{
    middleware::auth::{require_admin, AuthenticatedUser},
    models::user::{CreateUserRequest, LoginRequest, LoginResponse, User, UserResponse, UserRow},
    state::AppState,
    utils::errors::{AppError, AppResult},
    utils::jwt::{generate_token, JwtConfig},
};

/// Usuario admin por defecto que se siembra en el primer arranque
///
/// Debilidad de seguridad deliberada y documentada: las credenciales
/// deben rotarse inmediatamente después del despliegue.
const BOOTSTRAP_USERNAME: &str = "admin";
const BOOTSTRAP_PASSWORD: &str = "admin123";

/// Sembrar el admin inicial si la tabla de usuarios está vacía
pub async fn seed_default_admin(pool: &PgPool) -> Result<(), AppError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

    if count > 0 {
        return Ok(());
    }

    let password_hash = hash(BOOTSTRAP_PASSWORD, DEFAULT_COST)
        .map_err(|e| AppError::Hash(format!("Error hasheando password: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO users (id, username, password_hash, role, created_at, created_by)
        VALUES ($1, $2, $3, 'admin', $4, NULL)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(BOOTSTRAP_USERNAME)
    .bind(password_hash)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(AppError::Database)?;

    warn!(
        "⚠️ Usuario admin por defecto creado ('{}'); rotar credenciales tras el despliegue",
        BOOTSTRAP_USERNAME
    );

    Ok(())
}

/// Handler de login
pub async fn login(
    State(state): State<AppState>,
    Json(login_data): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
        .bind(&login_data.username)
        .fetch_optional(&state.pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::Unauthorized("Credenciales inválidas".to_string()))?;

    let user = User::from(row);

    let password_valid = verify(&login_data.password, &user.password_hash)
        .map_err(|e| AppError::Hash(format!("Error verificando password: {}", e)))?;

    if !password_valid {
        return Err(AppError::Unauthorized("Credenciales inválidas".to_string()));
    }

    let jwt_config = JwtConfig::from(&state.config);
    let access_token = generate_token(&user.username, &jwt_config)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: UserResponse::from(user),
    }))
}

/// Handler para obtener información del usuario autenticado
pub async fn me(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> AppResult<Json<UserResponse>> {
    let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_one(&state.pool)
        .await
        .map_err(AppError::Database)?;

    Ok(Json(UserResponse::from(User::from(row))))
}

/// Crear un nuevo usuario (solo admins)
pub async fn create_user(
    Extension(admin): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Json(user_data): Json<CreateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    require_admin(&admin)?;
    user_data.validate().map_err(AppError::Validation)?;

    let existing = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
        .bind(&user_data.username)
        .fetch_optional(&state.pool)
        .await
        .map_err(AppError::Database)?;

    if existing.is_some() {
        return Err(AppError::BadRequest("El username ya está en uso".to_string()));
    }

    let password_hash = hash(&user_data.password, DEFAULT_COST)
        .map_err(|e| AppError::Hash(format!("Error hasheando password: {}", e)))?;

    let row = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (id, username, password_hash, role, created_at, created_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&user_data.username)
    .bind(password_hash)
    .bind(user_data.role.as_str())
    .bind(Utc::now())
    .bind(admin.id)
    .fetch_one(&state.pool)
    .await
    .map_err(AppError::Database)?;

    Ok(Json(UserResponse::from(User::from(row))))
}

/// Listar todos los usuarios (solo admins)
pub async fn list_users(
    Extension(admin): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<UserResponse>>> {
    require_admin(&admin)?;

    let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at")
        .fetch_all(&state.pool)
        .await
        .map_err(AppError::Database)?;

    let users = rows
        .into_iter()
        .map(|row| UserResponse::from(User::from(row)))
        .collect();

    Ok(Json(users))
}

/// Eliminar un usuario (solo admins, nunca a sí mismo)
pub async fn delete_user(
    Extension(admin): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    require_admin(&admin)?;

    if id == admin.id {
        return Err(AppError::BadRequest(
            "Un admin no puede eliminarse a sí mismo".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(AppError::Database)?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Usuario no encontrado".to_string()));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Usuario eliminado exitosamente"
    })))
}

/// Crear el router de autenticación (rutas protegidas)
pub fn create_auth_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/create-user", post(create_user))
        .route("/users", get(list_users))
        .route("/users/:id", delete(delete_user))
}

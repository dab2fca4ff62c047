//! Handlers de Archives
//!
//! Este módulo maneja los snapshots mensuales del inventario:
//! creación, consulta y borrado.

use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    middleware::auth::{require_admin, AuthenticatedUser},
    models::archive::{ArchiveSummary, CreateArchiveRequest, MonthlyArchive, MonthlyArchiveRow},
    models::car::DeletedCountResponse,
    services::archive_service,
    state::AppState,
    utils::errors::{AppError, AppResult},
};

/// Máximo de archives que devuelve el listado, aunque el barrido
/// de retención aún no haya corrido
const MAX_LISTED_ARCHIVES: i64 = 6;

/// Listar los archives más recientes
pub async fn list_archives(State(state): State<AppState>) -> AppResult<Json<Vec<ArchiveSummary>>> {
    let archives = sqlx::query_as::<_, ArchiveSummary>(
        r#"
        SELECT id, archive_name, month, year, total_cars, present_cars,
               absent_cars, archived_at, archived_by
        FROM monthly_archives
        ORDER BY archived_at DESC
        LIMIT $1
        "#,
    )
    .bind(MAX_LISTED_ARCHIVES)
    .fetch_all(&state.pool)
    .await
    .map_err(AppError::Database)?;

    Ok(Json(archives))
}

/// Crear el archive mensual de un (mes, año) (solo admins)
pub async fn create_monthly_archive(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Json(archive_data): Json<CreateArchiveRequest>,
) -> AppResult<Json<MonthlyArchive>> {
    require_admin(&user)?;
    archive_data.validate().map_err(AppError::Validation)?;

    if archive_data.archive_name.trim().is_empty() {
        return Err(AppError::UnprocessableEntity(
            "archive_name es requerido".to_string(),
        ));
    }

    let archive =
        archive_service::create_monthly_archive(&state.pool, user.id, &archive_data).await?;

    Ok(Json(archive))
}

/// Obtener un archive por ID, con el snapshot completo
pub async fn get_archive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MonthlyArchive>> {
    let row = sqlx::query_as::<_, MonthlyArchiveRow>("SELECT * FROM monthly_archives WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("Archive no encontrado".to_string()))?;

    Ok(Json(MonthlyArchive::from(row)))
}

/// Eliminar un archive (solo admins)
pub async fn delete_archive(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    require_admin(&user)?;

    let result = sqlx::query("DELETE FROM monthly_archives WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(AppError::Database)?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Archive no encontrado".to_string()));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Archive eliminado exitosamente"
    })))
}

/// Eliminar todos los archives (solo admins)
pub async fn delete_all_archives(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> AppResult<Json<DeletedCountResponse>> {
    require_admin(&user)?;

    let result = sqlx::query("DELETE FROM monthly_archives")
        .execute(&state.pool)
        .await
        .map_err(AppError::Database)?;

    Ok(Json(DeletedCountResponse {
        deleted_count: result.rows_affected(),
    }))
}

/// Crear el router de archives
pub fn create_archives_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_archives).delete(delete_all_archives))
        .route("/create-monthly", post(create_monthly_archive))
        .route("/:id", get(get_archive).delete(delete_archive))
}

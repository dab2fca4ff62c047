//! Handlers de Cars
//!
//! Este módulo maneja las operaciones CRUD para coches del inventario,
//! las transiciones de estado con evidencia fotográfica, estadísticas
//! y el import CSV.

use axum::{
    extract::{Extension, Multipart, Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{Datelike, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    middleware::auth::{require_admin, AuthenticatedUser},
    models::car::{
        Car, CarFilters, CarRow, CarStatus, CreateCarRequest, DeletedCountResponse, MonthBucket,
        StatsPool, StatsSummary, UpdateCarRequest, UpdateStatusRequest,
    },
    services::csv_import::{import_cars_csv, CsvImportResult},
    state::AppState,
    utils::errors::{AppError, AppResult},
};

/// Resolver una transición de estado con su evidencia fotográfica
///
/// Pasar a presente exige ambas fotos en la misma llamada; pasar a
/// ausente vacía siempre ambas, ignorando lo que venga en la petición.
fn apply_status_transition(
    request: &UpdateStatusRequest,
) -> Result<(CarStatus, Option<String>, Option<String>), AppError> {
    match request.status {
        CarStatus::Present => {
            let car_photo = request
                .car_photo
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty());
            let vin_photo = request
                .vin_photo
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty());

            match (car_photo, vin_photo) {
                (Some(car), Some(vin)) => Ok((
                    CarStatus::Present,
                    Some(car.to_string()),
                    Some(vin.to_string()),
                )),
                _ => Err(AppError::BadRequest(
                    "Para marcar un coche como presente se requieren car_photo y vin_photo"
                        .to_string(),
                )),
            }
        }
        CarStatus::Absent => Ok((CarStatus::Absent, None, None)),
    }
}

/// Comprobar si un VIN ya pertenece a un coche activo
async fn active_vin_exists(
    pool: &sqlx::PgPool,
    vin: &str,
    exclude_id: Option<Uuid>,
) -> Result<bool, AppError> {
    let (exists,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM cars
            WHERE vin = $1 AND archive_status = 'active' AND ($2::uuid IS NULL OR id <> $2)
        )
        "#,
    )
    .bind(vin)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
    .map_err(AppError::Database)?;

    Ok(exists)
}

/// Crear un nuevo coche
pub async fn create_car(
    State(state): State<AppState>,
    Json(car_data): Json<CreateCarRequest>,
) -> AppResult<Json<Car>> {
    car_data.validate().map_err(AppError::Validation)?;

    let vin = car_data
        .vin
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    // La unicidad de VIN se aplica igual que en el import
    if let Some(vin) = &vin {
        if active_vin_exists(&state.pool, vin, None).await? {
            return Err(AppError::BadRequest(format!(
                "Ya existe un coche activo con el VIN '{}'",
                vin
            )));
        }
    }

    let now = Utc::now();
    let row = sqlx::query_as::<_, CarRow>(
        r#"
        INSERT INTO cars (
            id, make, model, number, purchase_date, vin, image_url,
            status, car_photo, vin_photo, archive_status,
            current_month, current_year, is_consignment, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7,
            'absent', NULL, NULL, 'active',
            $8, $9, $10, $11, $11
        )
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(car_data.make.trim())
    .bind(car_data.model.trim())
    .bind(car_data.number.trim())
    .bind(car_data.purchase_date)
    .bind(vin)
    .bind(car_data.image_url)
    .bind(now.month() as i32)
    .bind(now.year())
    .bind(car_data.is_consignment.unwrap_or(false))
    .bind(now)
    .fetch_one(&state.pool)
    .await
    .map_err(AppError::Database)?;

    Ok(Json(Car::from(row)))
}

/// Obtener todos los coches con filtros
///
/// Sin `archive_status` explícito solo se devuelven coches activos.
pub async fn list_cars(
    State(state): State<AppState>,
    Query(filters): Query<CarFilters>,
) -> AppResult<Json<Vec<Car>>> {
    let archive_status = match filters.archive_status.as_deref() {
        None => Some("active"),
        Some("all") => None,
        Some(s @ "active") | Some(s @ "archived") => Some(s),
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "archive_status inválido: '{}' (se acepta active, archived o all)",
                other
            )))
        }
    };

    let rows = sqlx::query_as::<_, CarRow>(
        r#"
        SELECT * FROM cars
        WHERE ($1::text IS NULL OR make ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR model ILIKE '%' || $2 || '%')
          AND ($3::text IS NULL OR status = $3)
          AND ($4::boolean IS NULL OR is_consignment = $4)
          AND ($5::int IS NULL OR current_month = $5)
          AND ($6::int IS NULL OR current_year = $6)
          AND ($7::text IS NULL
               OR make ILIKE '%' || $7 || '%'
               OR model ILIKE '%' || $7 || '%'
               OR vin ILIKE '%' || $7 || '%')
          AND ($8::text IS NULL OR archive_status = $8)
        ORDER BY created_at DESC
        "#,
    )
    .bind(&filters.make)
    .bind(&filters.model)
    .bind(filters.status.map(|s| s.as_str()))
    .bind(filters.is_consignment)
    .bind(filters.month)
    .bind(filters.year)
    .bind(&filters.search)
    .bind(archive_status)
    .fetch_all(&state.pool)
    .await
    .map_err(AppError::Database)?;

    Ok(Json(rows.into_iter().map(Car::from).collect()))
}

/// Obtener un coche por ID
pub async fn get_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Car>> {
    let row = sqlx::query_as::<_, CarRow>("SELECT * FROM cars WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("Coche no encontrado".to_string()))?;

    Ok(Json(Car::from(row)))
}

/// Actualizar parcialmente un coche existente
///
/// Solo se aplican los campos presentes en el body; `updated_at`
/// se refresca siempre.
pub async fn update_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(car_data): Json<UpdateCarRequest>,
) -> AppResult<Json<Car>> {
    car_data.validate().map_err(AppError::Validation)?;

    let current = sqlx::query_as::<_, CarRow>("SELECT * FROM cars WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("Coche no encontrado".to_string()))?;
    let current = Car::from(current);

    let vin = match &car_data.vin {
        Some(new_vin) => new_vin
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        None => current.vin.clone(),
    };

    if let Some(vin) = &vin {
        if active_vin_exists(&state.pool, vin, Some(id)).await? {
            return Err(AppError::BadRequest(format!(
                "Ya existe un coche activo con el VIN '{}'",
                vin
            )));
        }
    }

    let row = sqlx::query_as::<_, CarRow>(
        r#"
        UPDATE cars
        SET make = $2, model = $3, number = $4, purchase_date = $5,
            vin = $6, image_url = $7, is_consignment = $8, updated_at = $9
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(car_data.make.unwrap_or(current.make))
    .bind(car_data.model.unwrap_or(current.model))
    .bind(car_data.number.unwrap_or(current.number))
    .bind(car_data.purchase_date.unwrap_or(current.purchase_date))
    .bind(vin)
    .bind(car_data.image_url.unwrap_or(current.image_url))
    .bind(car_data.is_consignment.unwrap_or(current.is_consignment))
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await
    .map_err(AppError::Database)?;

    Ok(Json(Car::from(row)))
}

/// Actualizar el estado de presencia de un coche
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(status_data): Json<UpdateStatusRequest>,
) -> AppResult<Json<Car>> {
    let (status, car_photo, vin_photo) = apply_status_transition(&status_data)?;

    let row = sqlx::query_as::<_, CarRow>(
        r#"
        UPDATE cars
        SET status = $2, car_photo = $3, vin_photo = $4, updated_at = $5
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(car_photo)
    .bind(vin_photo)
    .bind(Utc::now())
    .fetch_optional(&state.pool)
    .await
    .map_err(AppError::Database)?
    .ok_or_else(|| AppError::NotFound("Coche no encontrado".to_string()))?;

    Ok(Json(Car::from(row)))
}

/// Eliminar un coche (solo admins)
pub async fn delete_car(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    require_admin(&user)?;

    let result = sqlx::query("DELETE FROM cars WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(AppError::Database)?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Coche no encontrado".to_string()));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Coche eliminado exitosamente"
    })))
}

/// Eliminar todos los coches (solo admins)
pub async fn delete_all_cars(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> AppResult<Json<DeletedCountResponse>> {
    require_admin(&user)?;

    let result = sqlx::query("DELETE FROM cars")
        .execute(&state.pool)
        .await
        .map_err(AppError::Database)?;

    Ok(Json(DeletedCountResponse {
        deleted_count: result.rows_affected(),
    }))
}

/// Resumen de estadísticas del inventario activo
///
/// Dos pools independientes según `is_consignment`, cada uno con su
/// porcentaje de presentes.
pub async fn stats_summary(State(state): State<AppState>) -> AppResult<Json<StatsSummary>> {
    let counts = sqlx::query_as::<_, (bool, String, i64)>(
        r#"
        SELECT is_consignment, status, COUNT(*)
        FROM cars
        WHERE archive_status = 'active'
        GROUP BY is_consignment, status
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .map_err(AppError::Database)?;

    let mut regular_total = 0i64;
    let mut regular_present = 0i64;
    let mut consignment_total = 0i64;
    let mut consignment_present = 0i64;

    for (is_consignment, status, count) in counts {
        let present = status == "present";
        if is_consignment {
            consignment_total += count;
            if present {
                consignment_present += count;
            }
        } else {
            regular_total += count;
            if present {
                regular_present += count;
            }
        }
    }

    Ok(Json(StatsSummary {
        regular: StatsPool::from_counts(regular_total, regular_present),
        consignment: StatsPool::from_counts(consignment_total, consignment_present),
        total_cars: regular_total + consignment_total,
    }))
}

/// Buckets (mes, año) disponibles entre los coches activos
pub async fn available_months(State(state): State<AppState>) -> AppResult<Json<Vec<MonthBucket>>> {
    let buckets = sqlx::query_as::<_, MonthBucket>(
        r#"
        SELECT current_month AS month, current_year AS year, COUNT(*) AS count
        FROM cars
        WHERE archive_status = 'active'
        GROUP BY current_month, current_year
        ORDER BY current_year DESC, current_month DESC
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .map_err(AppError::Database)?;

    Ok(Json(buckets))
}

/// Importar un CSV de coches (multipart, solo admins)
pub async fn import_csv(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<CsvImportResult>> {
    require_admin(&user)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart inválido: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        if !filename.to_lowercase().ends_with(".csv") {
            return Err(AppError::BadRequest(
                "El fichero subido debe tener extensión .csv".to_string(),
            ));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Error leyendo el fichero: {}", e)))?;

        let result = import_cars_csv(&state.pool, &bytes).await?;
        return Ok(Json(result));
    }

    Err(AppError::BadRequest(
        "No se encontró ningún fichero en la petición".to_string(),
    ))
}

/// Crear el router de coches
pub fn create_cars_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_car).get(list_cars).delete(delete_all_cars))
        .route("/stats/summary", get(stats_summary))
        .route("/available-months", get(available_months))
        .route("/import-csv", post(import_csv))
        .route("/:id", get(get_car).put(update_car).delete(delete_car))
        .route("/:id/status", patch(set_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_to_present_requires_both_photos() {
        let request = UpdateStatusRequest {
            status: CarStatus::Present,
            car_photo: Some("Zm90bzE=".to_string()),
            vin_photo: None,
        };
        assert!(apply_status_transition(&request).is_err());

        let request = UpdateStatusRequest {
            status: CarStatus::Present,
            car_photo: Some("Zm90bzE=".to_string()),
            vin_photo: Some("   ".to_string()),
        };
        assert!(apply_status_transition(&request).is_err());
    }

    #[test]
    fn test_transition_to_present_keeps_photos() {
        let request = UpdateStatusRequest {
            status: CarStatus::Present,
            car_photo: Some("Zm90bzE=".to_string()),
            vin_photo: Some("Zm90bzI=".to_string()),
        };
        let (status, car_photo, vin_photo) = apply_status_transition(&request).unwrap();

        assert_eq!(status, CarStatus::Present);
        assert_eq!(car_photo.as_deref(), Some("Zm90bzE="));
        assert_eq!(vin_photo.as_deref(), Some("Zm90bzI="));
    }

    #[test]
    fn test_transition_to_absent_always_clears_photos() {
        // Las fotos de la petición se ignoran al pasar a ausente
        let request = UpdateStatusRequest {
            status: CarStatus::Absent,
            car_photo: Some("Zm90bzE=".to_string()),
            vin_photo: Some("Zm90bzI=".to_string()),
        };
        let (status, car_photo, vin_photo) = apply_status_transition(&request).unwrap();

        assert_eq!(status, CarStatus::Absent);
        assert_eq!(car_photo, None);
        assert_eq!(vin_photo, None);
    }
}

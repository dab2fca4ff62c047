//! Servicio de archivado mensual y retención
//!
//! Snapshot inmutable de los coches activos de un (mes, año) y limpieza
//! de archives que superan la ventana de retención.

use chrono::{Duration, Utc};
use sqlx::{types::Json, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    models::archive::{CreateArchiveRequest, MonthlyArchive},
    models::car::{Car, CarRow, CarStatus},
    utils::errors::AppError,
};

/// Ventana de retención de archives
const RETENTION_DAYS: i64 = 180;

/// Contadores derivados de un snapshot: (total, presentes, ausentes)
///
/// Se calculan una sola vez al crear el archive y nunca se recalculan.
fn compute_counters(cars: &[Car]) -> (i32, i32, i32) {
    let total = cars.len() as i32;
    let present = cars
        .iter()
        .filter(|c| c.status == CarStatus::Present)
        .count() as i32;
    (total, present, total - present)
}

/// Crear el archive mensual de un (mes, año)
///
/// Copia el set completo de campos (fotos incluidas) de cada coche
/// activo del periodo, persiste el archive y marca los coches como
/// archivados. Todo dentro de una transacción: un crash no puede dejar
/// coches snapshotted pero todavía activos.
pub async fn create_monthly_archive(
    pool: &PgPool,
    admin_id: Uuid,
    request: &CreateArchiveRequest,
) -> Result<MonthlyArchive, AppError> {
    let mut tx = pool.begin().await.map_err(AppError::Database)?;

    let rows = sqlx::query_as::<_, CarRow>(
        r#"
        SELECT * FROM cars
        WHERE archive_status = 'active'
          AND current_month = $1
          AND current_year = $2
        ORDER BY created_at
        "#,
    )
    .bind(request.month)
    .bind(request.year)
    .fetch_all(&mut *tx)
    .await
    .map_err(AppError::Database)?;

    if rows.is_empty() {
        return Err(AppError::NotFound(format!(
            "No hay coches activos para el periodo {}/{}",
            request.month, request.year
        )));
    }

    let cars: Vec<Car> = rows.into_iter().map(Car::from).collect();
    let (total_cars, present_cars, absent_cars) = compute_counters(&cars);

    let archive = MonthlyArchive {
        id: Uuid::new_v4(),
        archive_name: request.archive_name.clone(),
        month: request.month,
        year: request.year,
        cars_data: cars,
        total_cars,
        present_cars,
        absent_cars,
        archived_at: Utc::now(),
        archived_by: admin_id,
    };

    sqlx::query(
        r#"
        INSERT INTO monthly_archives (
            id, archive_name, month, year, cars_data,
            total_cars, present_cars, absent_cars, archived_at, archived_by
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(archive.id)
    .bind(&archive.archive_name)
    .bind(archive.month)
    .bind(archive.year)
    .bind(Json(&archive.cars_data))
    .bind(archive.total_cars)
    .bind(archive.present_cars)
    .bind(archive.absent_cars)
    .bind(archive.archived_at)
    .bind(archive.archived_by)
    .execute(&mut *tx)
    .await
    .map_err(AppError::Database)?;

    // Solo cambia archive_status; el resto de campos queda intacto
    let ids: Vec<Uuid> = archive.cars_data.iter().map(|c| c.id).collect();
    sqlx::query("UPDATE cars SET archive_status = 'archived' WHERE id = ANY($1)")
        .bind(&ids)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

    tx.commit().await.map_err(AppError::Database)?;

    info!(
        "📦 Archive '{}' creado para {}/{}: {} coches",
        archive.archive_name, archive.month, archive.year, archive.total_cars
    );

    Ok(archive)
}

/// Barrido de retención: borrar archives más viejos que la ventana
///
/// Se ejecuta una sola vez al arrancar el proceso. Solo toca la tabla
/// de archives, nunca los coches.
pub async fn retention_sweep(pool: &PgPool) -> Result<u64, AppError> {
    let cutoff = Utc::now() - Duration::days(RETENTION_DAYS);

    let result = sqlx::query("DELETE FROM monthly_archives WHERE archived_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

    let deleted = result.rows_affected();
    if deleted > 0 {
        warn!(
            "🧹 Retención: {} archives con más de {} días eliminados",
            deleted, RETENTION_DAYS
        );
    } else {
        info!("🧹 Retención: ningún archive supera los {} días", RETENTION_DAYS);
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::car::ArchiveStatus;
    use chrono::Utc;

    fn snapshot_car(status: CarStatus) -> Car {
        let now = Utc::now();
        Car {
            id: Uuid::new_v4(),
            make: "Toyota".to_string(),
            model: "Camry".to_string(),
            number: "T1".to_string(),
            purchase_date: None,
            vin: None,
            image_url: None,
            status,
            car_photo: match status {
                CarStatus::Present => Some("Zm90bw==".to_string()),
                CarStatus::Absent => None,
            },
            vin_photo: match status {
                CarStatus::Present => Some("Zm90bw==".to_string()),
                CarStatus::Absent => None,
            },
            archive_status: ArchiveStatus::Active,
            current_month: 3,
            current_year: 2024,
            is_consignment: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_counters_match_snapshot() {
        let cars = vec![
            snapshot_car(CarStatus::Present),
            snapshot_car(CarStatus::Absent),
            snapshot_car(CarStatus::Present),
        ];
        let (total, present, absent) = compute_counters(&cars);

        assert_eq!(total, cars.len() as i32);
        assert_eq!(
            present,
            cars.iter().filter(|c| c.status == CarStatus::Present).count() as i32
        );
        assert_eq!(
            absent,
            cars.iter().filter(|c| c.status == CarStatus::Absent).count() as i32
        );
    }

    #[test]
    fn test_counters_empty_snapshot() {
        assert_eq!(compute_counters(&[]), (0, 0, 0));
    }
}

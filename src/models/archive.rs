//! Modelo de MonthlyArchive
//!
//! Snapshot mensual inmutable del inventario activo con sus
//! contadores derivados.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;
use validator::Validate;

use crate::models::car::Car;

/// Fila de la tabla `monthly_archives` con el payload JSONB completo
#[derive(Debug, FromRow)]
pub struct MonthlyArchiveRow {
    pub id: Uuid,
    pub archive_name: String,
    pub month: i32,
    pub year: i32,
    pub cars_data: Json<Vec<Car>>,
    pub total_cars: i32,
    pub present_cars: i32,
    pub absent_cars: i32,
    pub archived_at: DateTime<Utc>,
    pub archived_by: Uuid,
}

/// Archive mensual completo, incluyendo el snapshot de coches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyArchive {
    pub id: Uuid,
    pub archive_name: String,
    pub month: i32,
    pub year: i32,
    pub cars_data: Vec<Car>,
    pub total_cars: i32,
    pub present_cars: i32,
    pub absent_cars: i32,
    pub archived_at: DateTime<Utc>,
    pub archived_by: Uuid,
}

impl From<MonthlyArchiveRow> for MonthlyArchive {
    fn from(row: MonthlyArchiveRow) -> Self {
        Self {
            id: row.id,
            archive_name: row.archive_name,
            month: row.month,
            year: row.year,
            cars_data: row.cars_data.0,
            total_cars: row.total_cars,
            present_cars: row.present_cars,
            absent_cars: row.absent_cars,
            archived_at: row.archived_at,
            archived_by: row.archived_by,
        }
    }
}

/// Resumen de archive para listados - sin el payload de coches
#[derive(Debug, Serialize, FromRow)]
pub struct ArchiveSummary {
    pub id: Uuid,
    pub archive_name: String,
    pub month: i32,
    pub year: i32,
    pub total_cars: i32,
    pub present_cars: i32,
    pub absent_cars: i32,
    pub archived_at: DateTime<Utc>,
    pub archived_by: Uuid,
}

/// Request para crear un archive mensual
#[derive(Debug, Deserialize, Validate)]
pub struct CreateArchiveRequest {
    pub archive_name: String,

    #[validate(range(min = 1, max = 12))]
    pub month: i32,

    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
}

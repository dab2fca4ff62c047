//! Modelo de Car
//!
//! Este módulo contiene el struct Car y sus variantes para CRUD operations.
//! Mapea exactamente a la tabla `cars` del schema.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Estado de presencia del coche en el concesionario
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CarStatus {
    Present,
    Absent,
}

impl CarStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarStatus::Present => "present",
            CarStatus::Absent => "absent",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "present" => CarStatus::Present,
            _ => CarStatus::Absent,
        }
    }
}

/// Estado de archivado del coche
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveStatus {
    Active,
    Archived,
}

impl ArchiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveStatus::Active => "active",
            ArchiveStatus::Archived => "archived",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "archived" => ArchiveStatus::Archived,
            _ => ArchiveStatus::Active,
        }
    }
}

/// Fila de la tabla `cars` tal como la devuelve PostgreSQL
#[derive(Debug, FromRow)]
pub struct CarRow {
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub number: String,
    pub purchase_date: Option<NaiveDate>,
    pub vin: Option<String>,
    pub image_url: Option<String>,
    pub status: String,
    pub car_photo: Option<String>,
    pub vin_photo: Option<String>,
    pub archive_status: String,
    pub current_month: i32,
    pub current_year: i32,
    pub is_consignment: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Car principal - también es el payload que se congela en los archives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Car {
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub number: String,
    pub purchase_date: Option<NaiveDate>,
    pub vin: Option<String>,
    pub image_url: Option<String>,
    pub status: CarStatus,
    pub car_photo: Option<String>,
    pub vin_photo: Option<String>,
    pub archive_status: ArchiveStatus,
    pub current_month: i32,
    pub current_year: i32,
    pub is_consignment: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CarRow> for Car {
    fn from(row: CarRow) -> Self {
        Self {
            id: row.id,
            make: row.make,
            model: row.model,
            number: row.number,
            purchase_date: row.purchase_date,
            vin: row.vin,
            image_url: row.image_url,
            status: CarStatus::from_db(&row.status),
            car_photo: row.car_photo,
            vin_photo: row.vin_photo,
            archive_status: ArchiveStatus::from_db(&row.archive_status),
            current_month: row.current_month,
            current_year: row.current_year,
            is_consignment: row.is_consignment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Request para crear un nuevo coche
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCarRequest {
    #[validate(length(min = 1, max = 100))]
    pub make: String,

    #[validate(length(min = 1, max = 100))]
    pub model: String,

    #[validate(length(min = 1, max = 100))]
    pub number: String,

    pub purchase_date: Option<NaiveDate>,

    #[validate(length(max = 50))]
    pub vin: Option<String>,

    pub image_url: Option<String>,

    pub is_consignment: Option<bool>,
}

/// Deserializar distinguiendo "campo ausente" de "campo en null"
///
/// `None` exterior = no tocar el campo; `Some(None)` = poner a NULL.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Request para actualizar parcialmente un coche existente
///
/// El estado de presencia y las fotos no se tocan por esta vía:
/// esas transiciones pasan por el endpoint de status con su validación.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCarRequest {
    #[validate(length(min = 1, max = 100))]
    pub make: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub model: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub number: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub purchase_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "double_option")]
    pub vin: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,

    pub is_consignment: Option<bool>,
}

/// Request para cambiar el estado de presencia de un coche
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: CarStatus,
    pub car_photo: Option<String>,
    pub vin_photo: Option<String>,
}

/// Filtros para búsqueda de coches
///
/// Todos los filtros son opcionales y se combinan con semántica AND.
/// Sin `archive_status` explícito, el listado devuelve solo coches activos;
/// `archive_status=all` desactiva ese filtro.
#[derive(Debug, Default, Deserialize)]
pub struct CarFilters {
    pub make: Option<String>,
    pub model: Option<String>,
    pub status: Option<CarStatus>,
    pub is_consignment: Option<bool>,
    pub month: Option<i32>,
    pub year: Option<i32>,
    pub search: Option<String>,
    pub archive_status: Option<String>,
}

/// Contadores de un pool de inventario (regular o consignación)
#[derive(Debug, Serialize, PartialEq)]
pub struct StatsPool {
    pub total: i64,
    pub present: i64,
    pub absent: i64,
    pub present_percentage: f64,
}

impl StatsPool {
    /// Construir el pool a partir de los contadores crudos
    ///
    /// `present_percentage` se redondea a 1 decimal y vale 0 con total 0.
    pub fn from_counts(total: i64, present: i64) -> Self {
        let present_percentage = if total > 0 {
            (present as f64 / total as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Self {
            total,
            present,
            absent: total - present,
            present_percentage,
        }
    }
}

/// Resumen de estadísticas del inventario, dividido en dos pools
/// independientes según `is_consignment`
#[derive(Debug, Serialize)]
pub struct StatsSummary {
    pub regular: StatsPool,
    pub consignment: StatsPool,
    pub total_cars: i64,
}

/// Bucket (mes, año) con su número de coches activos
#[derive(Debug, Serialize, FromRow)]
pub struct MonthBucket {
    pub month: i32,
    pub year: i32,
    pub count: i64,
}

/// Respuesta de los borrados masivos
#[derive(Debug, Serialize)]
pub struct DeletedCountResponse {
    pub deleted_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_pool_percentage_rounding() {
        let pool = StatsPool::from_counts(3, 1);
        assert_eq!(pool.present_percentage, 33.3);
        assert_eq!(pool.absent, 2);

        let pool = StatsPool::from_counts(4, 3);
        assert_eq!(pool.present_percentage, 75.0);
    }

    #[test]
    fn test_stats_pool_zero_total() {
        let pool = StatsPool::from_counts(0, 0);
        assert_eq!(pool.total, 0);
        assert_eq!(pool.present_percentage, 0.0);
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(CarStatus::from_db("present"), CarStatus::Present);
        assert_eq!(CarStatus::from_db("absent"), CarStatus::Absent);
        assert_eq!(CarStatus::from_db("garbage"), CarStatus::Absent);
        assert_eq!(ArchiveStatus::from_db("archived"), ArchiveStatus::Archived);
        assert_eq!(ArchiveStatus::from_db("active"), ArchiveStatus::Active);
    }

    #[test]
    fn test_update_request_distinguishes_missing_from_null() {
        let patch: UpdateCarRequest = serde_json::from_str(r#"{"vin": null}"#).unwrap();
        assert_eq!(patch.vin, Some(None));
        assert!(patch.purchase_date.is_none());

        let patch: UpdateCarRequest = serde_json::from_str(r#"{"vin": "V123"}"#).unwrap();
        assert_eq!(patch.vin, Some(Some("V123".to_string())));
    }
}

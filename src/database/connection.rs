//! Configuración de conexión a PostgreSQL
//!
//! Este módulo maneja la conexión a la base de datos PostgreSQL
//! y la creación del schema al arrancar el proceso.

use anyhow::Result;
use sqlx::PgPool;

/// Conexión a la base de datos con su pool asociado
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Crear la conexión a partir de una URL explícita
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Crear las tablas si no existen
///
/// El schema se mantiene aquí en lugar de usar migraciones externas:
/// las tres tablas son estables y el arranque debe ser autosuficiente.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            created_by UUID
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cars (
            id UUID PRIMARY KEY,
            make TEXT NOT NULL,
            model TEXT NOT NULL,
            number TEXT NOT NULL,
            purchase_date DATE,
            vin TEXT,
            image_url TEXT,
            status TEXT NOT NULL DEFAULT 'absent',
            car_photo TEXT,
            vin_photo TEXT,
            archive_status TEXT NOT NULL DEFAULT 'active',
            current_month INT NOT NULL,
            current_year INT NOT NULL,
            is_consignment BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cars_vin ON cars (vin) WHERE vin IS NOT NULL")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS monthly_archives (
            id UUID PRIMARY KEY,
            archive_name TEXT NOT NULL,
            month INT NOT NULL,
            year INT NOT NULL,
            cars_data JSONB NOT NULL,
            total_cars INT NOT NULL,
            present_cars INT NOT NULL,
            absent_cars INT NOT NULL,
            archived_at TIMESTAMPTZ NOT NULL,
            archived_by UUID NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};

use dealership_inventory::api;
use dealership_inventory::config::environment::EnvironmentConfig;
use dealership_inventory::database::connection::{init_schema, DatabaseConnection};
use dealership_inventory::middleware::cors::cors_middleware_with_origins;
use dealership_inventory::services;
use dealership_inventory::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("🚗 Car Dealership Inventory - API de inventario");
    info!("===============================================");

    let config = EnvironmentConfig::default();

    // Inicializar base de datos
    let db_connection = match DatabaseConnection::new(&config.database_url).await {
        Ok(conn) => conn,
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(anyhow::anyhow!("Error de base de datos: {}", e));
        }
    };

    let pool = db_connection.pool().clone();
    init_schema(&pool).await?;
    info!("✅ Schema de base de datos verificado");

    // Bootstrap del admin inicial si no hay usuarios
    if let Err(e) = api::auth::seed_default_admin(&pool).await {
        error!("❌ Error sembrando el admin inicial: {}", e);
        return Err(anyhow::anyhow!("Error de bootstrap: {}", e));
    }

    // Barrido de retención de archives, una sola vez al arrancar
    match services::archive_service::retention_sweep(&pool).await {
        Ok(deleted) => info!("✅ Barrido de retención completado ({} eliminados)", deleted),
        Err(e) => warn!("⚠️ Barrido de retención falló: {}", e),
    }

    // Crear router de la API
    let app_state = AppState::new(pool, config.clone());

    let app = Router::new()
        .nest("/api", api::create_api_router(app_state.clone()))
        .layer(cors_middleware_with_origins(config.cors_origins.clone()))
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("🔑 Auth:");
    info!("   POST   /api/auth/login - Login");
    info!("   GET    /api/auth/me - Usuario actual");
    info!("   POST   /api/auth/create-user - Crear usuario (admin)");
    info!("   GET    /api/auth/users - Listar usuarios (admin)");
    info!("   DELETE /api/auth/users/:id - Eliminar usuario (admin)");
    info!("🚗 Cars:");
    info!("   POST   /api/cars - Crear coche");
    info!("   GET    /api/cars - Listar coches con filtros");
    info!("   GET    /api/cars/:id - Obtener coche");
    info!("   PUT    /api/cars/:id - Actualizar coche");
    info!("   PATCH  /api/cars/:id/status - Cambiar estado con fotos");
    info!("   DELETE /api/cars/:id - Eliminar coche (admin)");
    info!("   DELETE /api/cars - Eliminar todos (admin)");
    info!("   GET    /api/cars/stats/summary - Estadísticas");
    info!("   GET    /api/cars/available-months - Meses disponibles");
    info!("   POST   /api/cars/import-csv - Import CSV (admin)");
    info!("📦 Archives:");
    info!("   GET    /api/archives - Listar archives recientes");
    info!("   POST   /api/archives/create-monthly - Crear archive (admin)");
    info!("   GET    /api/archives/:id - Obtener archive");
    info!("   DELETE /api/archives/:id - Eliminar archive (admin)");
    info!("   DELETE /api/archives - Eliminar todos (admin)");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("❌ Error del servidor: {}", e);
            e
        })?;

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}

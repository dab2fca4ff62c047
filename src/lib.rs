//! Car Dealership Inventory API
//!
//! Backend de inventario para un concesionario: CRUD de coches con
//! evidencia fotográfica, import CSV, archivado mensual y autenticación
//! JWT con rol de admin.

pub mod api;
pub mod config;
pub mod database;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

//! Services module
//!
//! Este módulo contiene la lógica de negocio de la aplicación:
//! reconciliación CSV y archivado mensual con retención.

pub mod archive_service;
pub mod csv_import;

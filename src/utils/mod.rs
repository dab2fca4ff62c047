//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, JWT
//! y parsing de fechas.

pub mod dates;
pub mod errors;
pub mod jwt;

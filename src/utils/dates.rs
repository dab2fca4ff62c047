//! Utilidades de fechas
//!
//! Parsing flexible de fechas de compra que llegan en los CSV de los
//! concesionarios: ISO y dos variantes europeas con delimitador.

use chrono::NaiveDate;

/// Formatos aceptados para `purchase_date`, en orden de prioridad
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];

/// Parsear una fecha en cualquiera de los formatos soportados
///
/// El resultado se normaliza a `NaiveDate` (ISO al serializar).
pub fn parse_flexible_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_date() {
        assert_eq!(
            parse_flexible_date("2024-03-15"),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
    }

    #[test]
    fn test_dotted_date() {
        assert_eq!(
            parse_flexible_date("15.03.2024"),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
    }

    #[test]
    fn test_slashed_date() {
        assert_eq!(
            parse_flexible_date("15/03/2024"),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
    }

    #[test]
    fn test_surrounding_whitespace() {
        assert_eq!(
            parse_flexible_date("  2024-01-02  "),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
    }

    #[test]
    fn test_invalid_dates() {
        assert_eq!(parse_flexible_date(""), None);
        assert_eq!(parse_flexible_date("not-a-date"), None);
        assert_eq!(parse_flexible_date("2024-13-40"), None);
        assert_eq!(parse_flexible_date("03-15-2024"), None);
    }
}

//! Servicio de importación CSV
//!
//! Reconciliación del inventario contra un CSV subido: validación de
//! cabeceras, errores por fila sin abortar el batch, y decisión
//! insert-vs-update usando el VIN como clave natural.

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::{utils::dates::parse_flexible_date, utils::errors::AppError};

/// Cabeceras que el CSV debe traer obligatoriamente
const REQUIRED_HEADERS: [&str; 4] = ["make", "model", "number", "purchase_date"];

/// Cabeceras opcionales reconocidas
const VIN_HEADER: &str = "vin";
const IMAGE_URL_HEADER: &str = "image_url";

/// Máximo de errores por fila que se devuelven al cliente
const MAX_REPORTED_ERRORS: usize = 10;

/// Resultado estructurado de un import
///
/// Los errores por fila son datos, no fallos: el batch reporta
/// `success: true` aunque algunas filas se hayan saltado.
#[derive(Debug, Serialize)]
pub struct CsvImportResult {
    pub success: bool,
    pub imported_count: u32,
    pub updated_count: u32,
    pub errors: Vec<String>,
    pub message: String,
}

/// Posición de cada columna reconocida dentro del CSV
struct HeaderIndex {
    make: usize,
    model: usize,
    number: usize,
    purchase_date: usize,
    vin: Option<usize>,
    image_url: Option<usize>,
}

impl HeaderIndex {
    /// Localizar las columnas, fallando si falta alguna requerida
    fn build(headers: &[String]) -> Result<Self, AppError> {
        let find = |name: &str| headers.iter().position(|h| h == name);

        let missing: Vec<&str> = REQUIRED_HEADERS
            .iter()
            .filter(|name| find(name).is_none())
            .copied()
            .collect();

        if !missing.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Faltan cabeceras requeridas en el CSV: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            make: find("make").unwrap(),
            model: find("model").unwrap(),
            number: find("number").unwrap(),
            purchase_date: find("purchase_date").unwrap(),
            vin: find(VIN_HEADER),
            image_url: find(IMAGE_URL_HEADER),
        })
    }
}

/// Fila ya validada, lista para reconciliar contra la base de datos
#[derive(Debug, PartialEq)]
struct ParsedCsvRow {
    row_number: usize,
    make: String,
    model: String,
    number: String,
    purchase_date: Option<NaiveDate>,
    vin: Option<String>,
    image_url: Option<String>,
}

/// Resultado del parsing puro, previo a tocar la base de datos
///
/// `error_count` lleva el total real de filas fallidas; `errors` solo
/// conserva los primeros `MAX_REPORTED_ERRORS` mensajes.
#[derive(Debug)]
struct ParsedCsv {
    rows: Vec<ParsedCsvRow>,
    errors: Vec<String>,
    error_count: usize,
}

/// Decisión de reconciliación para una fila ya parseada
#[derive(Debug, PartialEq)]
enum RowAction {
    Insert,
    Update(Uuid),
}

/// Decidir insert-vs-update para una fila, dado el coche activo que
/// comparte su VIN (si existe)
///
/// Sin VIN no hay clave natural y la fila siempre inserta. La misma
/// fila importada dos veces inserta la primera y actualiza la segunda.
fn resolve_row_action(row: &ParsedCsvRow, existing_id: Option<Uuid>) -> RowAction {
    match (&row.vin, existing_id) {
        (Some(_), Some(id)) => RowAction::Update(id),
        _ => RowAction::Insert,
    }
}

/// Decodificar los bytes del fichero: UTF-8 (con o sin BOM) o
/// WINDOWS-1252 como fallback Latin-1
fn decode_csv_bytes(bytes: &[u8]) -> Result<String, AppError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.trim_start_matches('\u{feff}').to_string());
    }

    let (text, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
    if had_errors {
        return Err(AppError::Internal(
            "No se pudo decodificar el fichero CSV".to_string(),
        ));
    }
    Ok(text.into_owned())
}

/// Limpiar una cabecera: BOM residual y espacios alrededor
fn clean_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').trim().to_string()
}

/// Extraer un campo de la fila, recortado; None si está vacío o no existe
fn field<'a>(record: &'a csv::StringRecord, index: usize) -> Option<&'a str> {
    record
        .get(index)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Parsear una fila de datos; el error resultante se acumula en el batch
fn parse_row(
    record: &csv::StringRecord,
    index: &HeaderIndex,
    row_number: usize,
) -> Result<ParsedCsvRow, String> {
    let make = field(record, index.make);
    let model = field(record, index.model);
    let number = field(record, index.number);

    let mut missing = Vec::new();
    if make.is_none() {
        missing.push("make");
    }
    if model.is_none() {
        missing.push("model");
    }
    if number.is_none() {
        missing.push("number");
    }
    if !missing.is_empty() {
        return Err(format!(
            "Row {}: Missing required fields: {}",
            row_number,
            missing.join(", ")
        ));
    }

    let purchase_date = match field(record, index.purchase_date) {
        Some(raw) => Some(parse_flexible_date(raw).ok_or_else(|| {
            format!("Row {}: Invalid purchase_date '{}'", row_number, raw)
        })?),
        None => None,
    };

    let vin = index.vin.and_then(|i| field(record, i)).map(str::to_string);
    let image_url = index
        .image_url
        .and_then(|i| field(record, i))
        .map(str::to_string);

    Ok(ParsedCsvRow {
        row_number,
        make: make.unwrap().to_string(),
        model: model.unwrap().to_string(),
        number: number.unwrap().to_string(),
        purchase_date,
        vin,
        image_url,
    })
}

/// Parsing puro del fichero completo
///
/// La fila de cabeceras cuenta como fila 1, así que los datos empiezan
/// en la 2. Los errores por fila se acumulan hasta `MAX_REPORTED_ERRORS`.
fn parse_csv(bytes: &[u8]) -> Result<ParsedCsv, AppError> {
    let text = decode_csv_bytes(bytes)?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::BadRequest(format!("CSV inválido: {}", e)))?
        .iter()
        .map(clean_header)
        .collect();

    let index = HeaderIndex::build(&headers)?;

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    let mut error_count = 0usize;

    for (i, record) in reader.records().enumerate() {
        let row_number = i + 2;

        let outcome = match record {
            Ok(record) => parse_row(&record, &index, row_number),
            Err(e) => Err(format!("Row {}: {}", row_number, e)),
        };

        match outcome {
            Ok(row) => rows.push(row),
            Err(msg) => {
                error_count += 1;
                if errors.len() < MAX_REPORTED_ERRORS {
                    errors.push(msg);
                }
            }
        }
    }

    Ok(ParsedCsv {
        rows,
        errors,
        error_count,
    })
}

/// Importar un CSV de coches contra el inventario
///
/// Cada fila con VIN que coincida con un coche activo sobreescribe sus
/// campos descriptivos; el resto se insertan como coches nuevos. Las
/// filas ya escritas se mantienen aunque filas posteriores fallen.
pub async fn import_cars_csv(pool: &PgPool, bytes: &[u8]) -> Result<CsvImportResult, AppError> {
    let parsed = parse_csv(bytes)?;

    let mut imported_count: u32 = 0;
    let mut updated_count: u32 = 0;

    for row in &parsed.rows {
        let existing_id = match &row.vin {
            Some(vin) => sqlx::query_as::<_, (Uuid,)>(
                "SELECT id FROM cars WHERE vin = $1 AND archive_status = 'active'",
            )
            .bind(vin)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?
            .map(|(id,)| id),
            None => None,
        };

        match resolve_row_action(row, existing_id) {
            RowAction::Update(id) => {
                // El estado de presencia, las fotos y el bookkeeping de
                // archivado no se tocan en un update por reconciliación.
                sqlx::query(
                    r#"
                    UPDATE cars
                    SET make = $2, model = $3, number = $4, purchase_date = $5,
                        image_url = $6, updated_at = $7
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&row.make)
                .bind(&row.model)
                .bind(&row.number)
                .bind(row.purchase_date)
                .bind(&row.image_url)
                .bind(Utc::now())
                .execute(pool)
                .await
                .map_err(AppError::Database)?;

                updated_count += 1;
            }
            RowAction::Insert => {
                let now = Utc::now();
                sqlx::query(
                    r#"
                    INSERT INTO cars (
                        id, make, model, number, purchase_date, vin, image_url,
                        status, car_photo, vin_photo, archive_status,
                        current_month, current_year, is_consignment,
                        created_at, updated_at
                    ) VALUES (
                        $1, $2, $3, $4, $5, $6, $7,
                        'absent', NULL, NULL, 'active',
                        $8, $9, FALSE, $10, $10
                    )
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&row.make)
                .bind(&row.model)
                .bind(&row.number)
                .bind(row.purchase_date)
                .bind(&row.vin)
                .bind(&row.image_url)
                .bind(now.month() as i32)
                .bind(now.year())
                .bind(now)
                .execute(pool)
                .await
                .map_err(AppError::Database)?;

                imported_count += 1;
            }
        }
    }

    info!(
        "📥 Import CSV completado: {} creados, {} actualizados, {} errores",
        imported_count, updated_count, parsed.error_count
    );

    let message = format!(
        "Importación completada: {} coches creados, {} actualizados, {} filas con errores",
        imported_count, updated_count, parsed.error_count
    );

    Ok(CsvImportResult {
        success: true,
        imported_count,
        updated_count,
        errors: parsed.errors,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_valid_file() {
        let csv = "make,model,number,purchase_date,vin\n\
                   Toyota,Camry,T1,2024-03-15,VIN001\n\
                   Honda,Civic,H1,15.03.2024,VIN002\n\
                   Ford,Focus,F1,,\n";
        let parsed = parse_csv(csv.as_bytes()).unwrap();

        assert_eq!(parsed.rows.len(), 3);
        assert!(parsed.errors.is_empty());

        assert_eq!(parsed.rows[0].make, "Toyota");
        assert_eq!(
            parsed.rows[0].purchase_date,
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
        assert_eq!(parsed.rows[0].vin.as_deref(), Some("VIN001"));

        // Formato europeo normalizado al mismo día
        assert_eq!(
            parsed.rows[1].purchase_date,
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );

        // Fecha y VIN vacíos son opcionales
        assert_eq!(parsed.rows[2].purchase_date, None);
        assert_eq!(parsed.rows[2].vin, None);
    }

    #[test]
    fn test_missing_required_header_fails_whole_import() {
        let csv = "make,model,purchase_date\nToyota,Camry,2024-01-01\n";
        let err = parse_csv(csv.as_bytes()).unwrap_err();
        match err {
            AppError::BadRequest(msg) => assert!(msg.contains("number")),
            other => panic!("expected BadRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_bom_and_padding_in_headers() {
        let csv = "\u{feff}make, model ,number,purchase_date\nToyota,Camry,T1,\n";
        let parsed = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].model, "Camry");
    }

    #[test]
    fn test_bad_rows_do_not_abort_batch() {
        let csv = "make,model,number,purchase_date\n\
                   Toyota,Camry,T1,\n\
                   ,Civic,H1,\n\
                   Ford,Focus,F1,garbage-date\n\
                   Mazda,3,M1,2024-05-01\n";
        let parsed = parse_csv(csv.as_bytes()).unwrap();

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.errors.len(), 2);
        assert!(parsed.errors[0].starts_with("Row 3: Missing required fields: make"));
        assert!(parsed.errors[1].starts_with("Row 4: Invalid purchase_date"));
    }

    #[test]
    fn test_errors_capped_to_first_ten() {
        let mut csv = String::from("make,model,number,purchase_date\n");
        for _ in 0..15 {
            csv.push_str(",missing,make,\n");
        }
        let parsed = parse_csv(csv.as_bytes()).unwrap();

        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.errors.len(), MAX_REPORTED_ERRORS);
        assert!(parsed.errors[0].starts_with("Row 2:"));
        // El total real de filas fallidas no se capa
        assert_eq!(parsed.error_count, 15);
    }

    #[test]
    fn test_same_vin_inserts_then_updates() {
        let csv = "make,model,number,purchase_date,vin\n\
                   Toyota,Camry,T1,2024-03-15,VIN001\n";
        let parsed = parse_csv(csv.as_bytes()).unwrap();
        let row = &parsed.rows[0];

        // Primera pasada: ningún coche activo comparte el VIN
        assert_eq!(resolve_row_action(row, None), RowAction::Insert);

        // Segunda pasada del mismo fichero: el coche ya existe
        let id = Uuid::new_v4();
        assert_eq!(resolve_row_action(row, Some(id)), RowAction::Update(id));
    }

    #[test]
    fn test_row_without_vin_always_inserts() {
        let csv = "make,model,number,purchase_date\nToyota,Camry,T1,\n";
        let parsed = parse_csv(csv.as_bytes()).unwrap();
        let row = &parsed.rows[0];

        assert_eq!(resolve_row_action(row, None), RowAction::Insert);
        assert_eq!(
            resolve_row_action(row, Some(Uuid::new_v4())),
            RowAction::Insert
        );
    }

    #[test]
    fn test_latin1_fallback_decoding() {
        // "Citroën" en Latin-1: la ë es 0xEB, inválida como UTF-8
        let mut bytes = b"make,model,number,purchase_date\nCitro".to_vec();
        bytes.push(0xEB);
        bytes.extend_from_slice(b"n,C3,N1,2024-01-01\n");

        let parsed = parse_csv(&bytes).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].make, "Citroën");
    }

    #[test]
    fn test_fields_are_trimmed() {
        let csv = "make,model,number,purchase_date\n  Toyota , Camry ,T1 ,\n";
        let parsed = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(parsed.rows[0].make, "Toyota");
        assert_eq!(parsed.rows[0].model, "Camry");
        assert_eq!(parsed.rows[0].number, "T1");
    }
}

pub mod config;
pub mod logging;
pub mod error;
pub mod validation;
pub mod text;
pub mod units;
pub mod spreadsheet;

pub use config::*;
pub use logging::*;
pub use error::*;
pub use validation::*;
pub use text::*;
pub use units::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_loading() {
        let config = AppConfig::default();
        assert_eq!(config.matching.strong_overlap_min_intersection, 3);
        assert_eq!(config.matching.min_score, 0.35);
        assert_eq!(config.import.max_section_depth, 4);
    }

    #[test]
    fn test_error_handling() {
        let error = CotizaError::validation("test_field", "test message");
        assert_eq!(error.error_code(), "VALIDATION_ERROR");
        assert_eq!(error.http_status_code(), 400);

        let error = CotizaError::referential("baseline item belongs to another process");
        assert_eq!(error.error_code(), "REFERENTIAL_ERROR");
    }

    #[test]
    fn test_csv_baseline_end_to_end() {
        let data = "ITEM;DESCRIPCION;UND;CANT;P.U.\n01;Cemento;BLS;10;25\n";
        let parsed = spreadsheet::BaselineReader::default()
            .read_bytes("presupuesto.csv", data.as_bytes())
            .unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].total_price, Some(250.0));
    }
}

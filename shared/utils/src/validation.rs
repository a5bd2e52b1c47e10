use crate::error::{CotizaError, CotizaResult};
use regex::Regex;
use validator::{Validate, ValidationErrors};

pub fn validate_model<T: Validate>(model: &T) -> CotizaResult<()> {
    match model.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let error_messages = format_validation_errors(&errors);
            Err(CotizaError::validation("model", error_messages))
        }
    }
}

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();

    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            let message = match &error.code {
                std::borrow::Cow::Borrowed("length") => {
                    format!("Length validation failed for field '{}'", field)
                }
                std::borrow::Cow::Borrowed("range") => {
                    format!("Value out of range for field '{}'", field)
                }
                std::borrow::Cow::Borrowed("required") => {
                    format!("Field '{}' is required", field)
                }
                _ => format!("Validation failed for field '{}': {}", field, error.code),
            };
            messages.push(message);
        }
    }

    messages.join(", ")
}

pub fn validate_currency_code(code: &str) -> CotizaResult<()> {
    let currency_regex = Regex::new(r"^[A-Z]{3}$").expect("static currency regex");

    if !currency_regex.is_match(code) {
        return Err(CotizaError::validation(
            "currency",
            format!("Invalid currency code '{}'. Expected a 3-letter ISO code", code),
        ));
    }

    Ok(())
}

pub fn validate_exchange_rate(rate: Option<f64>) -> CotizaResult<()> {
    match rate {
        Some(r) if !r.is_finite() || r <= 0.0 => Err(CotizaError::validation(
            "exchange_rate",
            "Exchange rate must be a positive number",
        )),
        _ => Ok(()),
    }
}

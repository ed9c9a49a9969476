//! Applicant input validation.
//!
//! Format invariants are enforced here, at the boundary, before a
//! consultation row is created. The orchestrator never re-validates.

use crate::errors::AppError;
use crate::models::ApplicantData;
use chrono::NaiveDate;
use regex::Regex;

/// Validate an RFC (Mexican tax id): 3-4 letters, 6 date digits,
/// 3 alphanumeric homoclave characters.
pub fn is_valid_rfc(rfc: &str) -> bool {
    let rfc_regex = Regex::new(r"^[A-ZÑ&]{3,4}\d{6}[A-Z0-9]{3}$").unwrap();
    rfc_regex.is_match(rfc)
}

/// Validate a Mexican postal code (exactly 5 digits).
pub fn is_valid_postal_code(postal_code: &str) -> bool {
    let cp_regex = Regex::new(r"^\d{5}$").unwrap();
    cp_regex.is_match(postal_code)
}

/// Parse a YYYY-MM-DD birth date.
pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Validate the full applicant payload, returning the parsed birth date.
///
/// Rejects before any external call or persistence happens.
pub fn validate_applicant(applicant: &ApplicantData) -> Result<NaiveDate, AppError> {
    let required = [
        ("nombre", &applicant.nombre),
        ("apellidoPaterno", &applicant.apellido_paterno),
        ("apellidoMaterno", &applicant.apellido_materno),
        ("calle", &applicant.calle),
        ("numero", &applicant.numero),
        ("ciudad", &applicant.ciudad),
        ("estado", &applicant.estado),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(AppError::BadRequest(format!("{} requerido", field)));
        }
    }

    if !is_valid_rfc(&applicant.rfc) {
        tracing::warn!("Rejected applicant with invalid RFC format");
        return Err(AppError::BadRequest("RFC inválido".to_string()));
    }

    if !is_valid_postal_code(&applicant.codigo_postal) {
        return Err(AppError::BadRequest(
            "Código postal debe tener 5 dígitos".to_string(),
        ));
    }

    parse_birth_date(&applicant.fecha_nacimiento).ok_or_else(|| {
        AppError::BadRequest("Fecha de nacimiento debe ser YYYY-MM-DD".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applicant() -> ApplicantData {
        ApplicantData {
            nombre: "Juan".into(),
            apellido_paterno: "García".into(),
            apellido_materno: "López".into(),
            rfc: "GAGL800101AB1".into(),
            fecha_nacimiento: "1980-01-01".into(),
            calle: "Reforma".into(),
            numero: "123".into(),
            ciudad: "México".into(),
            estado: "CDMX".into(),
            codigo_postal: "06500".into(),
        }
    }

    #[test]
    fn accepts_valid_applicant() {
        let birth = validate_applicant(&applicant()).unwrap();
        assert_eq!(birth, NaiveDate::from_ymd_opt(1980, 1, 1).unwrap());
    }

    #[test]
    fn rfc_format() {
        assert!(is_valid_rfc("GAGL800101AB1"));
        assert!(is_valid_rfc("XAXX010101000"));
        // 4-letter moral variant with Ñ
        assert!(is_valid_rfc("ÑAÑA010101AA1"));

        assert!(!is_valid_rfc("gagl800101ab1"));
        assert!(!is_valid_rfc("GAGL80010AB1"));
        assert!(!is_valid_rfc("GAGL800101AB12"));
        assert!(!is_valid_rfc(""));
    }

    #[test]
    fn postal_code_format() {
        assert!(is_valid_postal_code("06500"));
        assert!(!is_valid_postal_code("6500"));
        assert!(!is_valid_postal_code("065000"));
        assert!(!is_valid_postal_code("06-50"));
    }

    #[test]
    fn rejects_bad_rfc() {
        let mut a = applicant();
        a.rfc = "NOPE".into();
        assert!(matches!(
            validate_applicant(&a),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn rejects_bad_birth_date() {
        let mut a = applicant();
        a.fecha_nacimiento = "01/01/1980".into();
        assert!(matches!(
            validate_applicant(&a),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn rejects_blank_required_field() {
        let mut a = applicant();
        a.ciudad = "  ".into();
        assert!(matches!(
            validate_applicant(&a),
            Err(AppError::BadRequest(_))
        ));
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

// ============ Database Models ============

/// Lifecycle status of a consultation.
///
/// Only advances forward or into `Failed`; nothing resurrects a failed
/// consultation automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "consultation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    Pending,
    Authenticated,
    Completed,
    Failed,
}

impl std::fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConsultationStatus::Pending => "pending",
            ConsultationStatus::Authenticated => "authenticated",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One applicant's credit-bureau inquiry record.
///
/// Payload slots hold the raw JSON envelope of one bureau stage each and are
/// only populated after that stage's external call succeeded.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    pub id: Uuid,
    /// Owning user. Immutable after creation; scopes every read and write.
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub rfc: String,
    pub birth_date: NaiveDate,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub status: ConsultationStatus,
    pub authentication_data: Option<Value>,
    pub prospector_data: Option<Value>,
    pub income_estimate: Option<Value>,
    pub report_data: Option<Value>,
    pub monitor_data: Option<Value>,
    pub credit_report_data: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============ API Request Models ============

/// Applicant identity fields as submitted by the caller.
///
/// Field names match the original capture form (Spanish, camelCase).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantData {
    pub nombre: String,
    pub apellido_paterno: String,
    pub apellido_materno: String,
    pub rfc: String,
    /// YYYY-MM-DD
    pub fecha_nacimiento: String,
    pub calle: String,
    pub numero: String,
    pub ciudad: String,
    pub estado: String,
    pub codigo_postal: String,
}

impl ApplicantData {
    pub fn full_last_name(&self) -> String {
        format!("{} {}", self.apellido_paterno, self.apellido_materno)
    }

    pub fn full_address(&self) -> String {
        format!("{} {}", self.calle, self.numero)
    }
}

// ============ Bureau Wire Types ============

/// Request body shape every bureau endpoint expects:
/// `{ "consulta": { "persona": { ... } } }`.
#[derive(Debug, Clone, Serialize)]
pub struct BureauRequest {
    pub consulta: BureauConsulta,
}

#[derive(Debug, Clone, Serialize)]
pub struct BureauConsulta {
    pub persona: Persona,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub nombres: String,
    pub apellido_paterno: String,
    pub apellido_materno: String,
    pub rfc: String,
    pub fecha_nacimiento: String,
    pub direccion: Direccion,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Direccion {
    pub calle: String,
    pub num_ext: String,
    pub ciudad: String,
    pub estado: String,
    pub cod_pais: String,
    pub cod_postal: String,
}

impl BureauRequest {
    pub fn from_applicant(applicant: &ApplicantData) -> Self {
        Self {
            consulta: BureauConsulta {
                persona: Persona {
                    nombres: applicant.nombre.clone(),
                    apellido_paterno: applicant.apellido_paterno.clone(),
                    apellido_materno: applicant.apellido_materno.clone(),
                    rfc: applicant.rfc.clone(),
                    fecha_nacimiento: applicant.fecha_nacimiento.clone(),
                    direccion: Direccion {
                        calle: applicant.calle.clone(),
                        num_ext: applicant.numero.clone(),
                        ciudad: applicant.ciudad.clone(),
                        estado: applicant.estado.clone(),
                        cod_pais: "MX".to_string(),
                        cod_postal: applicant.codigo_postal.clone(),
                    },
                },
            },
        }
    }
}

/// Raw bureau response envelope. Upstream shapes are not contractually
/// stable, so payloads stay opaque JSON; only the fields the orchestrator
/// and renderer actually read get accessors.
pub type BureauEnvelope = Value;

/// True when the bureau explicitly reported the subject as not authenticated
/// inside a successful response. A business rejection, not an error: the
/// consultation stays `pending` and the caller must collect more information.
pub fn subject_not_authenticated(envelope: &BureauEnvelope) -> bool {
    envelope
        .get("respuesta")
        .and_then(|r| r.get("errores"))
        .and_then(|e| e.get("sujetoNoAutenticado"))
        .map(|flag| match flag {
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty() && s != "false" && s != "0",
            Value::Null => false,
            _ => true,
        })
        .unwrap_or(false)
}

pub fn respuesta_autenticador(envelope: &BureauEnvelope) -> Option<String> {
    envelope
        .get("respuestaAutenticador")
        .and_then(|v| v.as_str())
        .map(String::from)
}

// ============ API Response Models ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub consultation_id: Uuid,
    pub status: ConsultationStatus,
    /// Present (true) only when the bureau reported the subject as not
    /// authenticated and the consultation stayed pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_auth: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateResponse {
    pub success: bool,
    pub consultation_id: Uuid,
    pub auth_response: BureauEnvelope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_auth: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchReportResponse {
    pub success: bool,
    pub consultation_id: Uuid,
    pub prospector: BureauEnvelope,
    pub estimador: BureauEnvelope,
    pub informe: BureauEnvelope,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub rfc: String,
    pub first_name: String,
    pub last_name: String,
    pub status: ConsultationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Consultation> for HistoryEntry {
    fn from(c: &Consultation) -> Self {
        Self {
            id: c.id,
            rfc: c.rfc.clone(),
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
            status: c.status,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Applicant summary handed to the report renderer.
#[derive(Debug, Clone)]
pub struct ApplicantSummary {
    pub first_name: String,
    pub last_name: String,
    pub rfc: String,
    pub birth_date: NaiveDate,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl From<&Consultation> for ApplicantSummary {
    fn from(c: &Consultation) -> Self {
        Self {
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
            rfc: c.rfc.clone(),
            birth_date: c.birth_date,
            address: c.address.clone(),
            city: c.city.clone(),
            state: c.state.clone(),
            postal_code: c.postal_code.clone(),
        }
    }
}

pub fn sample_acceptance_envelope() -> BureauEnvelope {
    json!({
        "respuesta": {
            "autenticacion": { "tipoReporte": "RCN" }
        },
        "respuestaAutenticador": "01"
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_subject_not_authenticated_string_flag() {
        let envelope = json!({
            "respuesta": { "errores": { "sujetoNoAutenticado": "true" } },
            "respuestaAutenticador": "02"
        });
        assert!(subject_not_authenticated(&envelope));
    }

    #[test]
    fn acceptance_envelope_is_not_a_rejection() {
        assert!(!subject_not_authenticated(&sample_acceptance_envelope()));
    }

    #[test]
    fn explicit_false_flag_is_not_a_rejection() {
        let envelope = json!({
            "respuesta": { "errores": { "sujetoNoAutenticado": "false" } }
        });
        assert!(!subject_not_authenticated(&envelope));
        let envelope = json!({
            "respuesta": { "errores": { "sujetoNoAutenticado": null } }
        });
        assert!(!subject_not_authenticated(&envelope));
    }

    #[test]
    fn bureau_request_carries_persona_and_address() {
        let applicant = ApplicantData {
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
        };
        let body = serde_json::to_value(BureauRequest::from_applicant(&applicant)).unwrap();
        assert_eq!(body["consulta"]["persona"]["nombres"], "Juan");
        assert_eq!(body["consulta"]["persona"]["rfc"], "GAGL800101AB1");
        assert_eq!(body["consulta"]["persona"]["direccion"]["numExt"], "123");
        assert_eq!(body["consulta"]["persona"]["direccion"]["codPais"], "MX");
    }
}

use crate::config::{BureauEndpoints, Config};
use crate::errors::AppError;
use crate::models::{ApplicantData, BureauEnvelope, BureauRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Fixed request timeout for every bureau call.
const BUREAU_TIMEOUT: Duration = Duration::from_secs(30);

/// Uniform error produced for transport-level bureau failures.
///
/// Business errors embedded in a 2xx envelope are *not* represented here;
/// those come back as part of the envelope itself.
#[derive(Debug, Clone)]
pub struct BureauApiError {
    /// e.g. `BURO_API_ERROR_AUTENTICADOR`
    pub code: String,
    pub message: String,
    /// Upstream status/body when available, for diagnosis.
    pub details: Option<Value>,
}

impl BureauApiError {
    fn new(endpoint: &str, message: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            code: format!("BURO_API_ERROR_{}", endpoint),
            message: message.into(),
            details,
        }
    }
}

impl std::fmt::Display for BureauApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {} ({})", self.code, self.message, details),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl From<BureauApiError> for AppError {
    fn from(err: BureauApiError) -> Self {
        AppError::ExternalApiError(err.to_string())
    }
}

/// One operation per bureau endpoint.
///
/// The orchestrator takes this as an injected dependency so tests can
/// substitute a scripted double for the HTTP client.
#[async_trait]
pub trait BureauApi: Send + Sync {
    /// Identity authentication (Autenticador).
    async fn authenticate(&self, applicant: &ApplicantData) -> Result<BureauEnvelope, AppError>;
    /// Credit history prospecting (Prospector).
    async fn prospect(&self, applicant: &ApplicantData) -> Result<BureauEnvelope, AppError>;
    /// Income estimation (Estimador de Ingresos).
    async fn estimate_income(&self, applicant: &ApplicantData) -> Result<BureauEnvelope, AppError>;
    /// Full bureau report (Informe de Buró).
    async fn full_report(&self, applicant: &ApplicantData) -> Result<BureauEnvelope, AppError>;
    /// Monitoring subscription (Monitor).
    async fn monitor(&self, applicant: &ApplicantData) -> Result<BureauEnvelope, AppError>;
    /// Raw credit report (Reporte de Crédito).
    async fn credit_report(&self, applicant: &ApplicantData) -> Result<BureauEnvelope, AppError>;
}

/// HTTP client for the credit-bureau REST APIs.
#[derive(Clone)]
pub struct HttpBureauClient {
    client: reqwest::Client,
    endpoints: BureauEndpoints,
    api_key: String,
}

impl HttpBureauClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(BUREAU_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create bureau client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoints: config.endpoints.clone(),
            api_key: config.buro_api_key.clone(),
        })
    }

    /// POST the `{consulta: {persona}}` request to one endpoint and return
    /// the raw envelope. Only transport failures become errors here.
    async fn call(
        &self,
        endpoint: &str,
        url: &str,
        applicant: &ApplicantData,
    ) -> Result<BureauEnvelope, AppError> {
        let body = BureauRequest::from_applicant(applicant);
        tracing::info!("Calling bureau endpoint {}: {}", endpoint, url);

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-API-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                BureauApiError::new(endpoint, format!("request failed: {}", e), None)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BureauApiError::new(
                endpoint,
                format!("upstream returned {}", status),
                Some(Value::String(error_text)),
            )
            .into());
        }

        let envelope: BureauEnvelope = response.json().await.map_err(|e| {
            BureauApiError::new(endpoint, format!("malformed response body: {}", e), None)
        })?;

        tracing::info!("Bureau endpoint {} answered", endpoint);
        Ok(envelope)
    }
}

#[async_trait]
impl BureauApi for HttpBureauClient {
    async fn authenticate(&self, applicant: &ApplicantData) -> Result<BureauEnvelope, AppError> {
        self.call("AUTENTICADOR", &self.endpoints.autenticador_url, applicant)
            .await
    }

    async fn prospect(&self, applicant: &ApplicantData) -> Result<BureauEnvelope, AppError> {
        self.call("PROSPECTOR", &self.endpoints.prospector_url, applicant)
            .await
    }

    async fn estimate_income(&self, applicant: &ApplicantData) -> Result<BureauEnvelope, AppError> {
        self.call(
            "ESTIMADOR_INGRESOS",
            &self.endpoints.estimador_ingresos_url,
            applicant,
        )
        .await
    }

    async fn full_report(&self, applicant: &ApplicantData) -> Result<BureauEnvelope, AppError> {
        self.call("INFORME_BURO", &self.endpoints.informe_buro_url, applicant)
            .await
    }

    async fn monitor(&self, applicant: &ApplicantData) -> Result<BureauEnvelope, AppError> {
        self.call("MONITOR", &self.endpoints.monitor_url, applicant)
            .await
    }

    async fn credit_report(&self, applicant: &ApplicantData) -> Result<BureauEnvelope, AppError> {
        self.call(
            "REPORTE_CREDITO",
            &self.endpoints.reporte_credito_url,
            applicant,
        )
        .await
    }
}

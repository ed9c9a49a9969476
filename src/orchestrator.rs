//! Consultation pipeline orchestration.
//!
//! Drives one consultation through its lifecycle: create, authenticate,
//! fetch the three report payloads in parallel, complete or fail. Every
//! outcome is persisted through the store before it is reported to the
//! caller, and each stage re-fetches the row instead of caching it across
//! retries. A keyed advisory mutex serializes concurrent stage invocations
//! for the same consultation so duplicate retries cannot interleave writes.

use crate::bureau_client::BureauApi;
use crate::errors::{AppError, ResultExt};
use crate::models::{
    respuesta_autenticador, subject_not_authenticated, ApplicantData, AuthenticateResponse,
    Consultation, ConsultationStatus, FetchReportResponse, HistoryEntry, SubmitResponse,
};
use crate::report;
use crate::state_machine::{can_start, transition, Event, Stage, TransitionError};
use crate::store::{ConsultationStore, ConsultationUpdate, NewConsultation};
use crate::validation::validate_applicant;
use chrono::Utc;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

pub struct Orchestrator<S, B> {
    store: S,
    bureau: B,
    /// Advisory single-flight guard, one async mutex per consultation id.
    locks: Cache<Uuid, Arc<Mutex<()>>>,
}

fn stage_order_error(err: TransitionError) -> AppError {
    AppError::BadRequest(err.to_string())
}

impl<S: ConsultationStore, B: BureauApi> Orchestrator<S, B> {
    pub fn new(store: S, bureau: B) -> Self {
        Self {
            store,
            bureau,
            locks: Cache::builder()
                .time_to_live(Duration::from_secs(300))
                .max_capacity(10_000)
                .build(),
        }
    }

    async fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .get_with(id, async { Arc::new(Mutex::new(())) })
            .await
    }

    /// Fetch a consultation scoped to its owner.
    ///
    /// Absence and ownership mismatch produce the same opaque denial so the
    /// caller cannot probe for other users' records.
    async fn fetch_owned(&self, id: Uuid, user_id: Uuid) -> Result<Consultation, AppError> {
        match self.store.get_by_id(id).await? {
            Some(c) if c.user_id == user_id => Ok(c),
            _ => Err(AppError::NotFound("Consultation not found".to_string())),
        }
    }

    /// Create a consultation in `pending` and invoke the authentication call
    /// exactly once.
    ///
    /// The row exists before any external call, so even a transport failure
    /// leaves an inspectable `failed` record; the response always carries the
    /// new id and the resulting status.
    pub async fn submit(
        &self,
        user_id: Uuid,
        applicant: ApplicantData,
    ) -> Result<SubmitResponse, AppError> {
        let birth_date = validate_applicant(&applicant)?;

        let consultation = self
            .store
            .create(NewConsultation {
                user_id,
                first_name: applicant.nombre.clone(),
                last_name: applicant.full_last_name(),
                rfc: applicant.rfc.clone(),
                birth_date,
                address: applicant.full_address(),
                city: applicant.ciudad.clone(),
                state: applicant.estado.clone(),
                postal_code: applicant.codigo_postal.clone(),
            })
            .await?;

        let lock = self.lock_for(consultation.id).await;
        let _guard = lock.lock().await;

        match self
            .run_authentication(&consultation, &applicant)
            .await?
        {
            AuthOutcome::Accepted(_) => Ok(SubmitResponse {
                consultation_id: consultation.id,
                status: ConsultationStatus::Authenticated,
                requires_auth: None,
            }),
            AuthOutcome::SubjectRejected(_) => Ok(SubmitResponse {
                consultation_id: consultation.id,
                status: ConsultationStatus::Pending,
                requires_auth: Some(true),
            }),
            AuthOutcome::TransportFailure(message) => {
                tracing::warn!(
                    "Consultation {} failed during submit authentication: {}",
                    consultation.id,
                    message
                );
                Ok(SubmitResponse {
                    consultation_id: consultation.id,
                    status: ConsultationStatus::Failed,
                    requires_auth: None,
                })
            }
        }
    }

    /// Re-invoke the authentication stage for an existing consultation.
    ///
    /// Idempotent from the caller's view: each invocation overwrites the
    /// authentication slot and re-evaluates the status. Never silently
    /// retries; a transport failure is final for this invocation.
    pub async fn authenticate(
        &self,
        user_id: Uuid,
        consultation_id: Uuid,
        applicant: ApplicantData,
    ) -> Result<AuthenticateResponse, AppError> {
        let lock = self.lock_for(consultation_id).await;
        let _guard = lock.lock().await;

        let consultation = self.fetch_owned(consultation_id, user_id).await?;
        can_start(consultation.status, Stage::Authenticate).map_err(stage_order_error)?;

        match self.run_authentication(&consultation, &applicant).await? {
            AuthOutcome::Accepted(envelope) => Ok(AuthenticateResponse {
                success: true,
                consultation_id,
                auth_response: envelope,
                requires_auth: None,
            }),
            AuthOutcome::SubjectRejected(envelope) => Ok(AuthenticateResponse {
                success: true,
                consultation_id,
                auth_response: envelope,
                requires_auth: Some(true),
            }),
            AuthOutcome::TransportFailure(message) => Err(AppError::ExternalApiError(message)),
        }
    }

    /// Issue the prospector, income-estimation and full-report calls
    /// concurrently and wait for all three.
    ///
    /// The stage is all-or-nothing: the three payloads and the `completed`
    /// status land in one atomic update, or none of them are persisted and
    /// the consultation fails with the first surfaced error. A partially
    /// completed report is as untrustworthy as a fully failed one.
    pub async fn fetch_report(
        &self,
        user_id: Uuid,
        consultation_id: Uuid,
        applicant: ApplicantData,
    ) -> Result<FetchReportResponse, AppError> {
        let lock = self.lock_for(consultation_id).await;
        let _guard = lock.lock().await;

        let consultation = self.fetch_owned(consultation_id, user_id).await?;
        can_start(consultation.status, Stage::FetchReport).map_err(stage_order_error)?;

        tracing::info!(
            "Fetching report stage for consultation {} (3 parallel calls)",
            consultation_id
        );

        // Fire-and-await-all: no sibling cancellation on first failure.
        let (prospector, estimador, informe) = tokio::join!(
            self.bureau.prospect(&applicant),
            self.bureau.estimate_income(&applicant),
            self.bureau.full_report(&applicant),
        );

        match (prospector, estimador, informe) {
            (Ok(prospector), Ok(estimador), Ok(informe)) => {
                let status = transition(consultation.status, Event::ReportFetched)
                    .map_err(|e| AppError::InternalError(e.to_string()))?;
                self.store
                    .update(
                        consultation_id,
                        ConsultationUpdate {
                            status: Some(status),
                            prospector_data: Some(prospector.clone()),
                            income_estimate: Some(estimador.clone()),
                            report_data: Some(informe.clone()),
                            ..Default::default()
                        },
                    )
                    .await
                    .context("Failed to persist completed report stage")?;

                tracing::info!("Consultation {} completed", consultation_id);
                Ok(FetchReportResponse {
                    success: true,
                    consultation_id,
                    prospector,
                    estimador,
                    informe,
                })
            }
            (prospector, estimador, informe) => {
                let first_error = [prospector.err(), estimador.err(), informe.err()]
                    .into_iter()
                    .flatten()
                    .next()
                    .unwrap_or_else(|| {
                        AppError::InternalError("report stage failed without error".to_string())
                    });

                self.fail_consultation(consultation.status, consultation_id, &first_error)
                    .await?;
                Err(first_error)
            }
        }
    }

    /// Ownership-checked point read with payload slots already parsed
    /// (slots are stored as jsonb).
    pub async fn get_consultation(
        &self,
        user_id: Uuid,
        consultation_id: Uuid,
    ) -> Result<Consultation, AppError> {
        self.fetch_owned(consultation_id, user_id).await
    }

    /// The caller's consultations, newest first.
    pub async fn list_history(&self, user_id: Uuid) -> Result<Vec<HistoryEntry>, AppError> {
        let consultations = self.store.list_by_owner(user_id).await?;
        Ok(consultations.iter().map(HistoryEntry::from).collect())
    }

    /// Render the completed consultation as a PDF.
    ///
    /// Fails with a not-ready condition before touching the renderer unless
    /// the status is `completed`.
    pub async fn download_report(
        &self,
        user_id: Uuid,
        consultation_id: Uuid,
    ) -> Result<(String, Vec<u8>), AppError> {
        let consultation = self.fetch_owned(consultation_id, user_id).await?;

        if consultation.status != ConsultationStatus::Completed {
            return Err(AppError::NotReady(
                "La consulta no está completa".to_string(),
            ));
        }

        let generated_at = Utc::now();
        let bytes = report::render_pdf(
            &(&consultation).into(),
            consultation.prospector_data.as_ref(),
            consultation.income_estimate.as_ref(),
            consultation.report_data.as_ref(),
            generated_at,
        )?;

        let file_name = format!(
            "buro-{}-{}.pdf",
            consultation.rfc,
            generated_at.timestamp_millis()
        );
        Ok((file_name, bytes))
    }

    /// Run the authenticator call and persist its outcome.
    async fn run_authentication(
        &self,
        consultation: &Consultation,
        applicant: &ApplicantData,
    ) -> Result<AuthOutcome, AppError> {
        match self.bureau.authenticate(applicant).await {
            Ok(envelope) => {
                let event = if subject_not_authenticated(&envelope) {
                    Event::AuthRejected
                } else {
                    Event::AuthAccepted
                };
                let status = transition(consultation.status, event)
                    .map_err(|e| AppError::InternalError(e.to_string()))?;

                self.store
                    .update(
                        consultation.id,
                        ConsultationUpdate {
                            status: Some(status),
                            authentication_data: Some(envelope.clone()),
                            ..Default::default()
                        },
                    )
                    .await
                    .context("Failed to persist authentication outcome")?;

                if event == Event::AuthRejected {
                    tracing::info!(
                        "Consultation {}: subject not authenticated (respuestaAutenticador={:?})",
                        consultation.id,
                        respuesta_autenticador(&envelope)
                    );
                    Ok(AuthOutcome::SubjectRejected(envelope))
                } else {
                    tracing::info!("Consultation {} authenticated", consultation.id);
                    Ok(AuthOutcome::Accepted(envelope))
                }
            }
            Err(err) => {
                self.fail_consultation(consultation.status, consultation.id, &err)
                    .await?;
                Ok(AuthOutcome::TransportFailure(err.to_string()))
            }
        }
    }

    /// Move the consultation to `failed` and capture the error message.
    async fn fail_consultation(
        &self,
        current: ConsultationStatus,
        consultation_id: Uuid,
        error: &AppError,
    ) -> Result<(), AppError> {
        let status = transition(current, Event::StageFailed)
            .unwrap_or(ConsultationStatus::Failed);
        self.store
            .update(
                consultation_id,
                ConsultationUpdate {
                    status: Some(status),
                    error_message: Some(error.to_string()),
                    ..Default::default()
                },
            )
            .await?;
        tracing::error!("Consultation {} failed: {}", consultation_id, error);
        Ok(())
    }
}

enum AuthOutcome {
    Accepted(crate::models::BureauEnvelope),
    SubjectRejected(crate::models::BureauEnvelope),
    TransportFailure(String),
}

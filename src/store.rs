use crate::errors::AppError;
use crate::models::{Consultation, ConsultationStatus};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// Fields captured when a consultation row is created.
#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub rfc: String,
    pub birth_date: NaiveDate,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

/// Partial update applied to one consultation row.
///
/// `None` fields are left untouched; all `Some` fields land in a single
/// UPDATE statement, so a stage's payload slots and status commit atomically.
#[derive(Debug, Clone, Default)]
pub struct ConsultationUpdate {
    pub status: Option<ConsultationStatus>,
    pub authentication_data: Option<Value>,
    pub prospector_data: Option<Value>,
    pub income_estimate: Option<Value>,
    pub report_data: Option<Value>,
    pub monitor_data: Option<Value>,
    pub credit_report_data: Option<Value>,
    pub error_message: Option<String>,
}

/// Row store for consultations.
///
/// Each operation touches exactly one logical record; no cross-record
/// transactions exist. The Postgres implementation below is the production
/// one; tests substitute an in-memory double.
#[async_trait]
pub trait ConsultationStore: Send + Sync {
    async fn create(&self, data: NewConsultation) -> Result<Consultation, AppError>;
    /// Fails with NotFound if the id does not exist.
    async fn update(&self, id: Uuid, data: ConsultationUpdate) -> Result<Consultation, AppError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Consultation>, AppError>;
    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Consultation>, AppError>;
}

pub struct PgConsultationStore {
    pool: PgPool,
}

impl PgConsultationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConsultationStore for PgConsultationStore {
    async fn create(&self, data: NewConsultation) -> Result<Consultation, AppError> {
        let consultation = sqlx::query_as::<_, Consultation>(
            r#"
            INSERT INTO buro_consultations (
                user_id, first_name, last_name, rfc, birth_date,
                address, city, state, postal_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(data.user_id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.rfc)
        .bind(data.birth_date)
        .bind(&data.address)
        .bind(&data.city)
        .bind(&data.state)
        .bind(&data.postal_code)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            "Created consultation {} for user {}",
            consultation.id,
            consultation.user_id
        );
        Ok(consultation)
    }

    async fn update(&self, id: Uuid, data: ConsultationUpdate) -> Result<Consultation, AppError> {
        let consultation = sqlx::query_as::<_, Consultation>(
            r#"
            UPDATE buro_consultations
            SET status = COALESCE($2, status),
                authentication_data = COALESCE($3, authentication_data),
                prospector_data = COALESCE($4, prospector_data),
                income_estimate = COALESCE($5, income_estimate),
                report_data = COALESCE($6, report_data),
                monitor_data = COALESCE($7, monitor_data),
                credit_report_data = COALESCE($8, credit_report_data),
                error_message = COALESCE($9, error_message),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.status)
        .bind(data.authentication_data)
        .bind(data.prospector_data)
        .bind(data.income_estimate)
        .bind(data.report_data)
        .bind(data.monitor_data)
        .bind(data.credit_report_data)
        .bind(data.error_message)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Consultation {} not found", id)))?;

        Ok(consultation)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Consultation>, AppError> {
        let consultation = sqlx::query_as::<_, Consultation>(
            "SELECT * FROM buro_consultations WHERE id = $1 LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(consultation)
    }

    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Consultation>, AppError> {
        let consultations = sqlx::query_as::<_, Consultation>(
            "SELECT * FROM buro_consultations WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(consultations)
    }
}

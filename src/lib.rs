//! Credit-Bureau Consultation API Library
//!
//! Core functionality for the buro consultation service: the consultation
//! state machine and orchestration pipeline, the bureau HTTP client, the
//! Postgres-backed consultation store, and the PDF report renderer.
//!
//! # Modules
//!
//! - `bureau_client`: Credit-bureau REST API client (`BureauApi` trait).
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models and bureau wire shapes.
//! - `orchestrator`: Consultation pipeline orchestration.
//! - `report`: PDF report rendering.
//! - `state_machine`: Explicit consultation lifecycle transitions.
//! - `store`: Consultation row store.
//! - `validation`: Applicant input validation.

pub mod bureau_client;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod report;
pub mod state_machine;
pub mod store;
pub mod validation;

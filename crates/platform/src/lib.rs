//! Adapters for the hosted platform
//!
//! Each concern sits behind a trait with an HTTP implementation and an
//! in-memory one:
//!
//! - [`db::Database`]: PostgREST tables and RPCs
//! - [`storage::ObjectStorage`]: buckets
//! - [`identity::UserDirectory`] and [`identity::HostedIdentity`]: auth
//! - [`mail::Mailer`]: Resend
//! - [`models::VisionModel`] / [`models::TextModel`]: Gemini and OpenAI

pub mod db;
pub mod error;
pub mod identity;
pub mod mail;
pub mod models;
pub mod storage;

pub use db::{fetch, fetch_one, insert_one, Database, Filter, MemoryDatabase, Query, RestDatabase};
pub use error::{PlatformError, Result};
pub use identity::{HostedIdentity, MemoryUserDirectory, RestAuth, UserDirectory};
pub use mail::{EmailMessage, EmailSendResult, Mailer, MemoryMailer, ResendMailer, SYSTEM_SENDER};
pub use models::{
    text_model_for_key, CapabilityTable, GeminiClient, MockTextModel, ModelError, OpenAiClient, TextModel,
    VisionModel,
};
pub use storage::{
    MemoryObjectStorage, ObjectEntry, ObjectStorage, RestObjectStorage, COMPLIANCE_BUCKET, TEMPLATES_BUCKET,
    TENDER_DOCUMENTS_BUCKET,
};

use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the exam/results engine.
///
/// Every variant is recoverable at the request boundary; handlers turn it
/// into an `{ ok: false, error }` response via [`EngineError::code`].
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("exam {exam_id} is published and locked")]
    ExamLocked { exam_id: String },

    #[error("exam {exam_id} is not published yet")]
    ResultNotPublished { exam_id: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("duplicate subject in exam definition: {subject}")]
    DuplicateSubject { subject: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: serde_json::Value) -> Self {
        EngineError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation { .. } => "validation_error",
            EngineError::ExamLocked { .. } => "exam_locked",
            EngineError::ResultNotPublished { .. } => "result_not_published",
            EngineError::NotFound { .. } => "not_found",
            EngineError::DuplicateSubject { .. } => "duplicate_subject",
            EngineError::Database(_) => "db_query_failed",
            EngineError::Io(_) => "io_failed",
            EngineError::Internal(_) => "internal",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            EngineError::Validation { details, .. } => details.clone(),
            EngineError::ExamLocked { exam_id } | EngineError::ResultNotPublished { exam_id } => {
                Some(json!({ "examId": exam_id }))
            }
            EngineError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            EngineError::DuplicateSubject { subject } => Some(json!({ "subject": subject })),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl From<zip::result::ZipError> for EngineError {
    fn from(e: zip::result::ZipError) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Internal(e.to_string())
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(e: anyhow::Error) -> Self {
        EngineError::Internal(format!("{e:#}"))
    }
}

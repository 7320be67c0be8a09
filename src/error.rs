//! Error types for the pitch store and its collaborators
//!
//! Errors are classified by who can act on them:
//! - Persistence: the remote row could not be read, written or deleted
//! - Store: a caller asked for something the store cannot do (bad block, no identity)
//! - Draft: the draft generator failed; categorized as rate limit, quota, or other

use thiserror::Error;

/// Failures raised by a persistence collaborator.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        PersistenceError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

/// Failures surfaced by the pitch store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No authenticated identity")]
    NoIdentity,

    #[error("Block number {0} is outside 1..=9")]
    InvalidBlock(u8),

    #[error("Failed to load pitch data: {0}")]
    Load(String),

    #[error("Failed to save pitch data: {0}")]
    Save(String),

    #[error("Failed to reset pitch data: {0}")]
    Reset(String),

    #[error("Identity changed before the write could be applied")]
    IdentityChanged,
}

/// Coarse category used by presentation layers to pick a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DraftErrorCategory {
    RateLimit,
    Quota,
    Other,
}

/// Failures from a draft generator.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("Draft gateway rate limit exceeded")]
    RateLimited,

    #[error("Draft gateway credits exhausted")]
    QuotaExceeded,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Draft gateway error {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error("Draft generator returned an empty draft")]
    EmptyDraft,

    #[error("Unknown block {0}")]
    UnknownBlock(u8),

    #[error("Identity changed before the draft arrived")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DraftError {
    pub fn category(&self) -> DraftErrorCategory {
        match self {
            DraftError::RateLimited => DraftErrorCategory::RateLimit,
            DraftError::QuotaExceeded => DraftErrorCategory::Quota,
            _ => DraftErrorCategory::Other,
        }
    }

    /// Returns true if trying again later may succeed without user changes
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DraftError::RateLimited | DraftError::Network(_) | DraftError::EmptyDraft
        )
    }

    /// Message shown to the person writing the pitch.
    pub fn user_message(&self) -> &'static str {
        match self {
            DraftError::RateLimited => "Demasiadas solicitudes. Intenta de nuevo en unos segundos.",
            DraftError::QuotaExceeded => "Créditos agotados. Agrega créditos en tu workspace.",
            DraftError::Network(_) => "No se pudo conectar. Revisa tu conexión e intenta de nuevo.",
            DraftError::EmptyDraft => "No se pudo generar el borrador. Intenta de nuevo.",
            DraftError::Gateway { .. } | DraftError::UnknownBlock(_) => {
                "Error al generar el borrador."
            }
            DraftError::Configuration(_) => {
                "La generación de borradores no está configurada."
            }
            DraftError::Cancelled => "La sesión cambió y el borrador se descartó.",
        }
    }
}

impl From<reqwest::Error> for DraftError {
    fn from(err: reqwest::Error) -> Self {
        DraftError::Network(err.to_string())
    }
}

/// Serializable error representation for UI layers
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiError {
    pub message: String,
    pub category: DraftErrorCategory,
    pub can_retry: bool,
    pub user_message: String,
}

impl From<&DraftError> for UiError {
    fn from(err: &DraftError) -> Self {
        UiError {
            message: err.to_string(),
            category: err.category(),
            can_retry: err.is_retryable(),
            user_message: err.user_message().to_string(),
        }
    }
}

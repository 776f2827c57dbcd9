use serde::{Deserialize, Serialize};

/// How a failure must be handled by the caller.
///
/// - `Transient`: retried at the next user-initiated action; prior UI state
///   is restored first.
/// - `Denied`: terminal for the current attempt; surfaced as an upsell or
///   wait prompt, never retried as-is.
/// - `AuthExpired`: the whole session is invalid; synchronizers stop and
///   cached state is discarded.
/// - `Conflict`: the action already happened; treated as idempotent success.
/// - `InvalidInput`: rejected locally before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Denied,
    AuthExpired,
    Conflict,
    InvalidInput,
}

/// Stable error codes shared with the collaborator API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    ServiceUnavailable,

    // Entitlements
    QuotaExhausted,
    ProRequired,

    // Matching
    AlreadyDecided,
    ProfileNotFound,

    // Messaging
    MatchNotFound,
    MessageNotFound,
    NotMatchParticipant,

    // Moderation
    Blocked,
    CannotReportSelf,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::ServiceUnavailable => "service_unavailable",
            Self::QuotaExhausted => "quota_exhausted",
            Self::ProRequired => "pro_required",
            Self::AlreadyDecided => "already_decided",
            Self::ProfileNotFound => "profile_not_found",
            Self::MatchNotFound => "match_not_found",
            Self::MessageNotFound => "message_not_found",
            Self::NotMatchParticipant => "not_match_participant",
            Self::Blocked => "blocked",
            Self::CannotReportSelf => "cannot_report_self",
        }
    }

    /// Reverse lookup for codes arriving over the wire.
    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "validation_error" => Self::ValidationError,
            "not_found" => Self::NotFound,
            "unauthorized" => Self::Unauthorized,
            "forbidden" => Self::Forbidden,
            "service_unavailable" => Self::ServiceUnavailable,
            "quota_exhausted" => Self::QuotaExhausted,
            "pro_required" => Self::ProRequired,
            "already_decided" => Self::AlreadyDecided,
            "profile_not_found" => Self::ProfileNotFound,
            "match_not_found" => Self::MatchNotFound,
            "message_not_found" => Self::MessageNotFound,
            "not_match_participant" => Self::NotMatchParticipant,
            "blocked" => Self::Blocked,
            "cannot_report_self" => Self::CannotReportSelf,
            _ => return None,
        })
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ValidationError | Self::CannotReportSelf => ErrorClass::InvalidInput,
            Self::Unauthorized => ErrorClass::AuthExpired,
            Self::QuotaExhausted
            | Self::ProRequired
            | Self::Forbidden
            | Self::NotMatchParticipant
            | Self::Blocked => ErrorClass::Denied,
            Self::AlreadyDecided => ErrorClass::Conflict,
            Self::NotFound
            | Self::ServiceUnavailable
            | Self::ProfileNotFound
            | Self::MatchNotFound
            | Self::MessageNotFound => ErrorClass::Transient,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{message}")]
    Known { code: ErrorCode, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
        }
    }

    pub fn quota_exhausted() -> Self {
        Self::new(
            ErrorCode::QuotaExhausted,
            "daily swipe limit reached, resets at the next day boundary",
        )
    }

    pub fn pro_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProRequired, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Known { code, .. } => code.class(),
            Self::Network(_) | Self::Timeout | Self::Storage(_) => ErrorClass::Transient,
            Self::Validation(_) => ErrorClass::InvalidInput,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Known { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        self.class() == ErrorClass::AuthExpired
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

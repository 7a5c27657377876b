use miette::Diagnostic;
use thiserror::Error;

use crate::config::{BackendKind, PatternField};

/// Boxed error returned by backend client handles.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classified outcome of the address filter when something was rejected.
#[derive(Debug, Error, Diagnostic, Clone, Copy, PartialEq, Eq)]
pub enum FilterError {
    #[error("denied sender: sender does not match the allowed emails regexp")]
    #[diagnostic(code(relay::filter::denied_sender))]
    DeniedSender,

    #[error("denied recipients: recipients match the denied emails regexp")]
    #[diagnostic(code(relay::filter::denied_recipients))]
    DeniedRecipients,

    #[error("denied recipients: recipients do not match the allowed emails regexp or domains")]
    #[diagnostic(code(relay::filter::not_allowed))]
    DeniedRecipientsNotAllowed,
}

#[derive(Debug, Error, Diagnostic)]
pub enum RelayError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Denied(#[from] FilterError),

    #[error("message exceeds the maximum size of {limit} bytes")]
    #[diagnostic(code(relay::message_too_large))]
    MessageTooLarge { limit: usize },

    #[error("IO error while reading message")]
    #[diagnostic(code(relay::io_error))]
    Io(#[from] std::io::Error),

    #[error("{backend} send failed: {source}")]
    #[diagnostic(code(relay::backend_error))]
    Backend {
        backend: BackendKind,
        #[source]
        source: BoxError,
    },
}

impl RelayError {
    pub fn backend(backend: BackendKind, err: BoxError) -> Self {
        RelayError::Backend {
            backend,
            source: err,
        }
    }

    /// True for the per-message policy rejections produced by the address filter.
    pub fn is_policy_denial(&self) -> bool {
        matches!(self, RelayError::Denied(_))
    }

    /// SMTP reply code a listener should answer with for this error.
    pub fn reply_code(&self) -> u16 {
        match self {
            RelayError::Denied(_) => 550,
            RelayError::MessageTooLarge { .. } => 552,
            RelayError::Io(_) | RelayError::Backend { .. } => 451,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid {field} {pattern:?}")]
    #[diagnostic(
        code(relay::config::invalid_pattern),
        help("the pattern must be a valid regular expression")
    )]
    InvalidPattern {
        field: PatternField,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid relay API: {0}")]
    #[diagnostic(code(relay::config::unknown_backend), help("use one of: ses, pinpoint"))]
    UnknownBackend(String),

    #[error("error loading configuration: {0}")]
    #[diagnostic(code(relay::config::file))]
    File(String),

    #[error("{} configuration errors", .0.len())]
    #[diagnostic(code(relay::config::multiple))]
    Multiple(#[related] Vec<ConfigError>),
}

//! Error types surfaced by the dispatch pipeline.

use axum::http::StatusCode;
use thiserror::Error;

/// Message sent to clients in place of any internal error text.
pub const GENERIC_INTERNAL_MESSAGE: &str = "Internal server error.";

/// Who caused a domain error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorOrigin {
    User = 0,
    FrontEnd = 1,
    Unhandled = 2,
}

impl ErrorOrigin {
    /// Numeric value sent in the `origin.value` field.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Human readable name sent in the `origin.readable` field.
    pub fn readable(self) -> &'static str {
        match self {
            ErrorOrigin::User => "User",
            ErrorOrigin::FrontEnd => "Front End",
            ErrorOrigin::Unhandled => "Unhandled",
        }
    }
}

/// The typed kind of a domain error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NullOrUndefined = 0,
    ParameterNotFound = 1,
    ParameterIncorrectFormat = 2,
    ParameterDoesNotMatchRegex = 3,
    ParameterIncorrectType = 4,
    AnswerNotValid = 5,
    PasswordRequired = 6,
    PasswordIncorrect = 7,
    PermissionDenied = 8,
    FileNotFound = 9,
    FileTooLarge = 10,
    FileIncorrectType = 11,
    FailedToParseJson = 12,
    InternalUnhandled = 13,
}

impl ErrorKind {
    /// Numeric value sent in the `type.value` field.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Human readable name sent in the `type.readable` field.
    pub fn readable(self) -> &'static str {
        match self {
            ErrorKind::NullOrUndefined => "Null Or Undefined",
            ErrorKind::ParameterNotFound => "Parameter Not Found",
            ErrorKind::ParameterIncorrectFormat => "Parameter Incorrect Format",
            ErrorKind::ParameterDoesNotMatchRegex => "Parameter Does Not Match Regex",
            ErrorKind::ParameterIncorrectType => "Parameter Incorrect Type",
            ErrorKind::AnswerNotValid => "Answer Not Valid",
            ErrorKind::PasswordRequired => "Password Required",
            ErrorKind::PasswordIncorrect => "Password Incorrect",
            ErrorKind::PermissionDenied => "Permission Denied",
            ErrorKind::FileNotFound => "File Not Found",
            ErrorKind::FileTooLarge => "File Too Large",
            ErrorKind::FileIncorrectType => "File Incorrect Type",
            ErrorKind::FailedToParseJson => "Failed To Parse JSON",
            ErrorKind::InternalUnhandled => "Internal Unhandled",
        }
    }

    /// Broad class used for metrics and log routing.
    pub fn class(self) -> ErrorClass {
        match self {
            ErrorKind::NullOrUndefined
            | ErrorKind::ParameterNotFound
            | ErrorKind::ParameterIncorrectFormat
            | ErrorKind::ParameterDoesNotMatchRegex
            | ErrorKind::ParameterIncorrectType
            | ErrorKind::AnswerNotValid => ErrorClass::UserInput,
            ErrorKind::PasswordRequired
            | ErrorKind::PasswordIncorrect
            | ErrorKind::PermissionDenied => ErrorClass::Authorization,
            ErrorKind::FileNotFound | ErrorKind::FileTooLarge | ErrorKind::FileIncorrectType => {
                ErrorClass::Resource
            }
            ErrorKind::FailedToParseJson => ErrorClass::TransportParse,
            ErrorKind::InternalUnhandled => ErrorClass::Internal,
        }
    }
}

/// Coarse failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    UserInput,
    Authorization,
    Resource,
    TransportParse,
    /// A message+status error raised by application code.
    Status,
    Internal,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::UserInput => "user_input",
            ErrorClass::Authorization => "authorization",
            ErrorClass::Resource => "resource",
            ErrorClass::TransportParse => "transport_parse",
            ErrorClass::Status => "status",
            ErrorClass::Internal => "internal",
        }
    }
}

/// A structured error with an origin and a typed kind.
///
/// Translated to HTTP 400 with the full `{error, origin, type, timeStamp}` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DomainError {
    origin: ErrorOrigin,
    kind: ErrorKind,
    message: String,
}

fn location_suffix(location: Option<&str>) -> String {
    match location {
        Some(location) => format!(" in {}.", location),
        None => ".".to_string(),
    }
}

impl DomainError {
    pub fn new(origin: ErrorOrigin, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            origin,
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a user-originated error.
    pub fn user(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(ErrorOrigin::User, kind, message)
    }

    pub fn origin(&self) -> ErrorOrigin {
        self.origin
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn parameter_not_found(parameter: &str, location: Option<&str>) -> Self {
        Self::user(
            ErrorKind::ParameterNotFound,
            format!("You must specify a '{}'{}", parameter, location_suffix(location)),
        )
    }

    pub fn file_not_found() -> Self {
        Self::new(
            ErrorOrigin::FrontEnd,
            ErrorKind::FileNotFound,
            "The file you are trying to access does not exist.",
        )
    }

    pub fn invalid_date(key: &str) -> Self {
        Self::new(
            ErrorOrigin::FrontEnd,
            ErrorKind::AnswerNotValid,
            format!("The {} date you supplied was not valid.", key),
        )
    }

    pub fn parameter_incorrect_format(parameter: &str, location: Option<&str>) -> Self {
        Self::user(
            ErrorKind::ParameterIncorrectFormat,
            format!("'{}' incorrect format{}", parameter, location_suffix(location)),
        )
    }

    pub fn parameter_does_not_match_regex(parameter: &str, location: Option<&str>) -> Self {
        Self::user(
            ErrorKind::ParameterDoesNotMatchRegex,
            format!("'{}' does not match regex{}", parameter, location_suffix(location)),
        )
    }

    pub fn parameter_incorrect_type(parameter: &str, expected: &str, location: &str) -> Self {
        Self::user(
            ErrorKind::ParameterIncorrectType,
            format!(
                "{} in {} is incorrect type. Should be '{}'.",
                parameter, location, expected
            ),
        )
    }

    pub fn password_required() -> Self {
        Self::user(
            ErrorKind::PasswordRequired,
            "You must specify \"password\" to make this request.",
        )
    }

    pub fn password_incorrect() -> Self {
        Self::user(
            ErrorKind::PasswordIncorrect,
            "The \"password\" you specified is incorrect.",
        )
    }

    pub fn permission_denied(object: &str) -> Self {
        Self::user(
            ErrorKind::PermissionDenied,
            format!("You do not have access to this {}.", object),
        )
    }
}

/// A plain message+status error.
///
/// The message is hidden from clients unless [`HttpError::show`] is called.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({status})")]
pub struct HttpError {
    message: String,
    status: StatusCode,
    obfuscate: bool,
}

impl HttpError {
    /// Create an error with status 500 and obfuscation on.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            obfuscate: true,
        }
    }

    /// Set the status code. Codes outside 100..=999 fall back to 500.
    pub fn code(mut self, status: u16) -> Self {
        self.status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self
    }

    /// Send the real message to the client.
    pub fn show(mut self) -> Self {
        self.obfuscate = false;
        self
    }

    /// Replace the message with the generic one when sent (default).
    pub fn hide(mut self) -> Self {
        self.obfuscate = true;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The true message, for logs only.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_obfuscated(&self) -> bool {
        self.obfuscate
    }

    /// The message as a client should see it.
    pub fn client_message(&self) -> &str {
        if self.obfuscate {
            GENERIC_INTERNAL_MESSAGE
        } else {
            &self.message
        }
    }
}

/// An error raised while reading or parsing the request body.
///
/// Classified by message text in the translator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    /// Message used when a body exceeds its byte limit.
    pub const ENTITY_TOO_LARGE: &'static str = "request entity too large";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn entity_too_large() -> Self {
        Self::new(Self::ENTITY_TOO_LARGE)
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Every failure the pipeline can surface.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Anything else. Always answered with a generic 500.
    #[error("{0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl ServerError {
    pub fn internal(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ServerError::Internal(error.into())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(error: serde_json::Error) -> Self {
        ServerError::Internal(Box::new(error))
    }
}

/// Result type for pipeline operations.
pub type ServerResult<T> = Result<T, ServerError>;

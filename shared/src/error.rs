use thiserror::Error;

/// Failure to establish an authenticated Otter session.
///
/// None of these are worth retrying: bad credentials stay bad and a login
/// response without the expected cookies will not grow them on a second try.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Email and/or password were not given. Can't perform authentication to otter.ai")]
    MissingCredentials,
    #[error("Response did not set the `{0}` cookie")]
    MissingCsrfCookie(String),
    #[error("Login response did not set a session cookie")]
    MissingSessionCookie,
    #[error("Login response did not include a user id")]
    MissingUserId,
    #[error("Login rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("Transport error during login: {0}")]
    Transport(String),
}

/// Failure of a listing, fetch or forwarding call.
///
/// `message` is the upstream-provided message when there was one, otherwise
/// the transport error text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::Rejected { status, .. } => Some(*status),
            _ => None,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

//! Error taxonomy for client operations.

/// Errors returned by [`Client`](crate::Client) operations.
///
/// The four kinds map to the failure classes callers branch on: rejected
/// input, a failed login exchange, a missing remote path or file, and
/// anything that goes wrong while moving bytes (non-success statuses,
/// network failures, exhausted retry budgets).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or malformed caller input.
    #[error("{0}")]
    Validation(String),

    /// Login was rejected or the token response could not be read.
    #[error("authentication failed (status {status}): {body}")]
    Authentication { status: u16, body: String },

    /// A remote path, directory, or file does not exist.
    #[error("{path} does not exist on TransfertPro")]
    NotFound { path: String },

    /// A data call failed. `status` and `body` carry the server response
    /// when one was received.
    #[error("transfer failed: {context}")]
    Transfer {
        context: String,
        status: Option<u16>,
        body: String,
    },
}

impl Error {
    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound { path: path.into() }
    }

    pub(crate) fn transfer(context: impl Into<String>) -> Self {
        Error::Transfer {
            context: context.into(),
            status: None,
            body: String::new(),
        }
    }

    /// Re-tags a transfer failure with the file it interrupted.
    pub(crate) fn with_file_context(self, file_name: &str) -> Self {
        match self {
            Error::Transfer {
                context,
                status,
                body,
            } => Error::Transfer {
                context: format!("{file_name}: {context}"),
                status,
                body,
            },
            other => other,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transfer {
            context: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
            body: String::new(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transfer {
            context: format!("I/O error: {err}"),
            status: None,
            body: String::new(),
        }
    }
}

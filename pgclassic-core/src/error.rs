use thiserror::Error;

/// Classified failures surfaced by this layer.
///
/// Errors travel as [`anyhow::Error`] (see the crate level `Result` alias);
/// callers that need the classification recover it with
/// [`anyhow::Error::downcast_ref`]. Timeouts are deliberately absent: a
/// notification wait that expires is a normal termination path, not an error.
#[derive(Error, Debug)]
pub enum DbError {
    /// The caller misused the API: malformed relation name, missing key
    /// columns, notifying on the listening connection, and similar. Never
    /// retried.
    #[error("usage error: {0}")]
    Usage(String),

    /// The engine rejected a statement. Carries the SQLSTATE code the driver
    /// reported (e.g. `23505` for a unique violation) so callers can match on
    /// the error class without parsing messages.
    #[error("database error [{sqlstate}]: {message}")]
    Database { sqlstate: String, message: String },

    /// The connection dropped underneath a statement or a notification wait.
    /// Fatal to the subscription task it happens on.
    #[error("connection fault: {0}")]
    Connection(String),
}

impl DbError {
    pub fn usage(message: impl Into<String>) -> Self {
        DbError::Usage(message.into())
    }

    pub fn database(sqlstate: impl Into<String>, message: impl Into<String>) -> Self {
        DbError::Database {
            sqlstate: sqlstate.into(),
            message: message.into(),
        }
    }

    /// The SQLSTATE code, when the engine reported one.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            DbError::Database { sqlstate, .. } => Some(sqlstate),
            _ => None,
        }
    }
}

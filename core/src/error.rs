use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    /// The destination schema could not be ensured. Aborts the run before extraction.
    #[error("schema error: {details}")]
    Schema {
        details: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    #[error("source not ready after {attempts} attempts in {elapsed_ms}ms (last failure: {last_failure})")]
    PollTimeout {
        attempts: u32,
        elapsed_ms: u128,
        last_failure: String,
    },

    /// A single fetch went wrong. Absorbed by the poll loop, never surfaced on its own.
    #[error("fetch failed (status {}): {details}", .status.map_or_else(|| "none".to_string(), |s| s.to_string()))]
    Fetch { status: Option<u16>, details: String },

    #[error("datastore connection lost after {succeeded} upserts, {remaining} records left unloaded: {details}")]
    ConnectionLost {
        succeeded: usize,
        remaining: usize,
        details: String,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether re-running the whole pipeline may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::PollTimeout { .. }
                | Error::ConnectionLost { .. }
                | Error::Fetch { .. }
                | Error::Http(_)
                | Error::Io(_)
        ) || self.is_connection_loss()
            || matches!(self, Error::Schema { source: Some(e), .. } if is_connection_error(e))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Validation(_))
    }

    /// True when the error means the datastore connection itself failed,
    /// as opposed to a statement being rejected.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            Error::ConnectionLost { .. } => true,
            Error::Database(e) => is_connection_error(e),
            _ => false,
        }
    }
}

fn is_connection_error(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_class_errors_are_detected() {
        assert!(Error::Database(sqlx::Error::PoolClosed).is_connection_loss());
        assert!(Error::Database(sqlx::Error::PoolTimedOut).is_connection_loss());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_connection_loss());
        assert!(!Error::Validation("null product_id".into()).is_connection_loss());
    }

    #[test]
    fn run_level_retry_classification() {
        let timeout = Error::PollTimeout {
            attempts: 11,
            elapsed_ms: 300_000,
            last_failure: "HTTP 503".into(),
        };
        assert!(timeout.is_retryable());
        assert!(!timeout.is_fatal());
        assert!(Error::Config("bad".into()).is_fatal());
    }

    #[test]
    fn schema_failure_is_retryable_only_when_the_database_was_unreachable() {
        let unreachable = Error::Schema {
            details: "failed to create destination table".into(),
            source: Some(sqlx::Error::PoolTimedOut),
        };
        assert!(unreachable.is_retryable());
        assert!(!unreachable.is_connection_loss());

        let rejected = Error::Schema {
            details: "permission denied for schema public".into(),
            source: None,
        };
        assert!(!rejected.is_retryable());

        let rejected_by_server = Error::Schema {
            details: "failed to create destination table".into(),
            source: Some(sqlx::Error::RowNotFound),
        };
        assert!(!rejected_by_server.is_retryable());
    }

    #[test]
    fn schema_error_keeps_its_cause() {
        use std::error::Error as _;

        let err = Error::Schema {
            details: "failed to create destination table".into(),
            source: Some(sqlx::Error::PoolClosed),
        };
        assert_eq!(err.to_string(), "schema error: failed to create destination table");
        assert!(err.source().is_some());
    }

    #[test]
    fn poll_timeout_message_includes_last_failure() {
        let err = Error::PollTimeout {
            attempts: 3,
            elapsed_ms: 90,
            last_failure: "HTTP 503".into(),
        };
        assert_eq!(
            err.to_string(),
            "source not ready after 3 attempts in 90ms (last failure: HTTP 503)"
        );
    }
}

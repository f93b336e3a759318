use thiserror::Error;

/// Terminal outcome of a task submitted to the worker pool.
///
/// Exactly one of resolve/reject fires per accepted task; these are the
/// reject cases.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("no worker response within {ms} ms")]
    Timeout { ms: u64 },

    #[error("worker pool terminated")]
    PoolTerminated,

    #[error("overflow queue full (capacity {capacity})")]
    QueueFull { capacity: usize },
}

/// Errors surfaced by the upstream HTTP fetch layer.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("retries exhausted after {attempts} attempts (last status: {last_status:?})")]
    RetriesExhausted {
        attempts: u32,
        last_status: Option<u16>,
    },
}

impl FetchError {
    /// 5xx responses and transport-level failures are retryable;
    /// 4xx responses are terminal for the attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Http(e) => match e.status() {
                Some(s) => s.is_server_error(),
                None => true,
            },
            FetchError::Status(code) => (500..600).contains(code),
            FetchError::RetriesExhausted { .. } => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http(e) => e.status().map(|s| s.as_u16()),
            FetchError::Status(code) => Some(*code),
            FetchError::RetriesExhausted { last_status, .. } => *last_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        assert!(FetchError::Status(500).is_retryable());
        assert!(FetchError::Status(503).is_retryable());
    }

    #[test]
    fn client_errors_are_terminal() {
        assert!(!FetchError::Status(404).is_retryable());
        assert!(!FetchError::Status(429).is_retryable());
    }

    #[test]
    fn exhausted_is_terminal() {
        let e = FetchError::RetriesExhausted {
            attempts: 3,
            last_status: Some(503),
        };
        assert!(!e.is_retryable());
        assert_eq!(e.status(), Some(503));
    }
}

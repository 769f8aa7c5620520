use thiserror::Error;

/// Failure taxonomy for a scan run. The first error a fetch task reports wins;
/// there is no partial-success mode.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range input, rejected before any fetch begins.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Transient failure reaching the RPC endpoint, surfaced once the retry
    /// budget is exhausted.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Non-transient rejection from the RPC endpoint, never retried.
    #[error("request rejected: {0}")]
    Client(String),

    /// Response could not be interpreted as the expected block/transaction shape.
    #[error("malformed response: {0}")]
    Decode(String),

    /// A fetch task ended abnormally instead of returning a result.
    #[error("fetch task failed: {0}")]
    Task(String),
}
